//! Pagination types for list operations
//!
//! `ListQuery` is what the caller sends; `PageRequest` is the normalized
//! page window; `ListResult` is what comes back.

use std::collections::BTreeMap;

use configs::PaginationConfig;
use serde::Serialize;

/// Raw list request: page window plus free-form field filters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub filter: BTreeMap<String, String>,
}

impl ListQuery {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page: Some(page), page_size: Some(page_size), filter: BTreeMap::new() }
    }

    pub fn with(mut self, field: &str, value: &str) -> Self {
        self.filter.insert(field.to_string(), value.to_string());
        self
    }

    /// Build from query-string pairs. `page`/`pageSize` are matched
    /// case-insensitively; unparsable numbers become `None` and fall back
    /// to defaults on normalization. Everything else is a filter.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut q = ListQuery::default();
        for (k, v) in pairs {
            let (k, v) = (k.as_ref().trim(), v.as_ref().trim());
            match k.to_ascii_lowercase().as_str() {
                "page" => q.page = v.parse().ok(),
                "pagesize" | "page_size" => q.page_size = v.parse().ok(),
                _ => {
                    q.filter.insert(k.to_string(), v.to_string());
                }
            }
        }
        q
    }
}

/// Normalized page window
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page index
    pub page: u32,
    /// items per page
    pub page_size: u32,
}

impl PageRequest {
    /// Missing or zero values become defaults; page size is clamped to the
    /// configured maximum.
    pub fn normalize(page: Option<u32>, page_size: Option<u32>, cfg: PaginationConfig) -> Self {
        let page = page.filter(|p| *p >= 1).unwrap_or(1);
        let page_size = page_size
            .filter(|s| *s >= 1)
            .unwrap_or(cfg.default_page_size)
            .min(cfg.max_page_size);
        Self { page, page_size }
    }

    /// Zero-based offset of the first item; saturates instead of overflowing.
    pub fn offset(&self) -> usize {
        (self.page as usize - 1).saturating_mul(self.page_size as usize)
    }

    pub fn page_count(&self, total: u64) -> u64 {
        total.div_ceil(self.page_size as u64)
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListResult<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub total_count: u64,
    pub page_count: u64,
}

impl<T> ListResult<T> {
    pub fn empty(page: u32) -> Self {
        Self { items: Vec::new(), page, total_count: 0, page_count: 0 }
    }
}
