//! Filtering, stable ordering and slicing of store results.

use std::collections::BTreeMap;

use configs::PaginationConfig;
use tracing::debug;

use crate::pagination::{ListQuery, ListResult, PageRequest};
use crate::storage::Entity;

/// How an entity exposes one field to the filter.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    /// Case-insensitive substring match.
    Text(&'a str),
    /// Exact match on the rendered value (numbers, ids).
    Exact(String),
    /// Membership: matches when any element equals the filter value.
    Set(Vec<String>),
}

impl FieldValue<'_> {
    pub fn matches(&self, wanted: &str) -> bool {
        match self {
            FieldValue::Text(t) => t.to_lowercase().contains(&wanted.to_lowercase()),
            FieldValue::Exact(v) => v == wanted,
            FieldValue::Set(vs) => vs.iter().any(|v| v == wanted),
        }
    }
}

/// Field → value predicates, all of which must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter(BTreeMap<String, String>);

impl Filter {
    pub fn new() -> Self { Self::default() }

    pub fn eq(field: &str, value: impl Into<String>) -> Self {
        Self::new().with(field, value)
    }

    pub fn with(mut self, field: &str, value: impl Into<String>) -> Self {
        self.0.insert(field.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, field: &str, value: impl Into<String>) {
        self.0.insert(field.to_string(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> { self.0.get(field).map(String::as_str) }

    pub fn remove(&mut self, field: &str) -> Option<String> { self.0.remove(field) }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// An entity that does not expose a filtered field never matches.
    pub fn matches<E: Entity>(&self, entity: &E) -> bool {
        self.0
            .iter()
            .all(|(k, v)| entity.field(k).map(|f| f.matches(v)).unwrap_or(false))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QueryEngine {
    cfg: PaginationConfig,
}

impl QueryEngine {
    pub fn new(cfg: PaginationConfig) -> Self { Self { cfg } }

    pub fn page_request(&self, q: &ListQuery) -> PageRequest {
        PageRequest::normalize(q.page, q.page_size, self.cfg)
    }

    /// Keep only non-empty values for fields the entity declares filterable.
    /// Keys are matched case-insensitively and rewritten to their declared
    /// spelling; anything else is dropped.
    pub fn normalize_filter<E: Entity>(&self, q: &ListQuery) -> Filter {
        let mut out = Filter::new();
        for (k, v) in &q.filter {
            if v.trim().is_empty() {
                continue;
            }
            match E::FILTERABLE.iter().find(|f| f.eq_ignore_ascii_case(k)) {
                Some(field) => out.insert(field, v.trim()),
                None => debug!(entity = E::NAME, field = %k, "ignoring unknown filter field"),
            }
        }
        out
    }

    /// Filter, count, order by (created_at, id) and slice one page.
    pub fn execute<E: Entity>(&self, candidates: Vec<E>, filter: &Filter, page: PageRequest) -> ListResult<E> {
        let mut matched: Vec<E> = candidates.into_iter().filter(|e| filter.matches(e)).collect();
        let total = matched.len() as u64;
        matched.sort_by(|a, b| a.created_at().cmp(&b.created_at()).then_with(|| a.id().cmp(&b.id())));
        let items: Vec<E> = matched
            .into_iter()
            .skip(page.offset())
            .take(page.page_size as usize)
            .collect();
        ListResult { items, page: page.page, total_count: total, page_count: page.page_count(total) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{cars, Car};
    use std::collections::HashSet;

    fn engine() -> QueryEngine {
        QueryEngine::new(PaginationConfig { default_page_size: 20, max_page_size: 100 })
    }

    #[test]
    fn ten_cars_four_per_page() {
        let all = cars(10);
        let e = engine();
        let f = e.normalize_filter::<Car>(&ListQuery::new(1, 4).with("manufacture", ""));
        assert!(f.is_empty());

        let p1 = e.execute(all.clone(), &f, e.page_request(&ListQuery::new(1, 4)));
        assert_eq!((p1.items.len(), p1.total_count, p1.page_count), (4, 10, 3));
        let p3 = e.execute(all.clone(), &f, e.page_request(&ListQuery::new(3, 4)));
        assert_eq!(p3.items.len(), 2);
        let p4 = e.execute(all, &f, e.page_request(&ListQuery::new(4, 4)));
        assert_eq!((p4.items.len(), p4.total_count, p4.page_count, p4.page), (0, 10, 3, 4));
    }

    #[test]
    fn pages_partition_the_filtered_set() {
        let all = cars(23);
        let e = engine();
        for size in 1..=9u32 {
            let first = e.execute(all.clone(), &Filter::new(), e.page_request(&ListQuery::new(1, size)));
            let mut seen = HashSet::new();
            let mut sum = 0;
            for page in 1..=first.page_count as u32 {
                let r = e.execute(all.clone(), &Filter::new(), e.page_request(&ListQuery::new(page, size)));
                assert!(r.items.len() <= size as usize);
                sum += r.items.len();
                for c in r.items {
                    assert!(seen.insert(c.id), "duplicate id across pages");
                }
            }
            assert_eq!(sum, 23);
            assert_eq!(first.page_count, (23 + size as u64 - 1) / size as u64);
        }
    }

    #[test]
    fn ordering_is_stable_across_calls() {
        let mut all = cars(6);
        let e = engine();
        let a = e.execute(all.clone(), &Filter::new(), e.page_request(&ListQuery::new(1, 6)));
        all.reverse();
        let b = e.execute(all, &Filter::new(), e.page_request(&ListQuery::new(1, 6)));
        let ids = |r: &ListResult<Car>| r.items.iter().map(|c| c.id).collect::<Vec<_>>();
        assert_eq!(ids(&a), ids(&b));
    }

    #[test]
    fn substring_and_equality_filters() {
        let all = cars(10);
        let e = engine();
        let q = ListQuery::new(1, 50).with("BRAND", "BRAND-1").with("bogus", "x");
        let f = e.normalize_filter::<Car>(&q);
        assert_eq!(f.get("brand"), Some("BRAND-1"));
        assert!(f.get("bogus").is_none());
        // brand-1 only; "brand-10" does not exist with 10 cars (0..9)
        let r = e.execute(all.clone(), &f, e.page_request(&q));
        assert_eq!(r.total_count, 1);

        let f = Filter::eq("year", "2003");
        let r = e.execute(all, &f, e.page_request(&q));
        assert_eq!(r.total_count, 1);
        assert_eq!(r.items[0].year, 2003);
    }

    #[test]
    fn empty_store_echoes_requested_page() {
        let e = engine();
        let r = e.execute(Vec::<Car>::new(), &Filter::new(), e.page_request(&ListQuery::new(7, 5)));
        assert_eq!((r.page, r.total_count, r.page_count, r.items.len()), (7, 0, 0, 0));
    }
}
