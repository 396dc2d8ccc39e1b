use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use configs::PaginationConfig;
use uuid::Uuid;

use service::auth::password::{hash_password, verify_password};
use service::pagination::ListQuery;
use service::query::QueryEngine;
use service::resources::Car;

fn fleet(n: usize) -> Vec<Car> {
    let base = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let at = base + Duration::seconds((n - i) as i64);
            Car {
                id: Uuid::new_v4(),
                brand: if i % 3 == 0 { "Toyota".into() } else { "Ford".into() },
                model: format!("model-{i}"),
                year: 1990 + (i % 30) as i32,
                price: 1000.0 + i as f64,
                color: "red".into(),
                gearbox: "manual".into(),
                manufacture_id: None,
                images: Vec::new(),
                created_at: at,
                updated_at: at,
            }
        })
        .collect()
}

fn bench_list(c: &mut Criterion) {
    let cars = fleet(10_000);
    let engine = QueryEngine::new(PaginationConfig { default_page_size: 20, max_page_size: 100 });
    let query = ListQuery::new(7, 50).with("BRAND", "toy");
    let filter = engine.normalize_filter::<Car>(&query);
    let page = engine.page_request(&query);

    c.bench_function("car_list_filtered_page", |b| {
        b.iter(|| black_box(engine.execute(cars.clone(), &filter, page)));
    });
}

fn bench_password(c: &mut Criterion) {
    let hash = hash_password("Benchmark1").unwrap();
    c.bench_function("password_verify", |b| {
        b.iter(|| verify_password(black_box("Benchmark1"), &hash).unwrap());
    });
}

criterion_group!(benches, bench_list, bench_password);
criterion_main!(benches);
