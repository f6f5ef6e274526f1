use std::sync::Arc;

use common::IdempotencyKey;
use criterion::{Criterion, criterion_group, criterion_main};
use saga_store::{
    IdempotencyGuard, InMemorySagaStateCache, InMemorySagaStateRepository, SagaStateCache,
    SagaStateStore,
};
use serde_json::json;

fn payload() -> serde_json::Value {
    json!({
        "buyerId": "00000000-0000-0000-0000-000000000001",
        "total": 2000,
        "cartItems": [{"productId": "00000000-0000-0000-0000-000000000002", "quantity": 2}],
        "orderId": null
    })
}

fn bench_get_cache_hit(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = SagaStateStore::in_memory();
    let id = rt.block_on(store.create(&payload())).unwrap();

    c.bench_function("saga_store/get_cache_hit", |b| {
        b.iter(|| {
            rt.block_on(async {
                let _: serde_json::Value = store.get(id).await.unwrap();
            });
        });
    });
}

fn bench_get_cache_miss(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let cache = InMemorySagaStateCache::default();
    let store = SagaStateStore::new(
        Arc::new(InMemorySagaStateRepository::new()),
        Arc::new(cache.clone()),
    );
    let id = rt.block_on(store.create(&payload())).unwrap();

    c.bench_function("saga_store/get_cache_miss", |b| {
        b.iter(|| {
            rt.block_on(async {
                cache.evict(id).await.unwrap();
                let _: serde_json::Value = store.get(id).await.unwrap();
            });
        });
    });
}

fn bench_apply_once(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let guard = IdempotencyGuard::new(0_i64);

    c.bench_function("idempotency/apply_once_fresh", |b| {
        b.iter(|| {
            rt.block_on(async {
                guard
                    .apply_once(IdempotencyKey::new(), |total| {
                        *total += 1;
                        Ok::<_, ()>(())
                    })
                    .await
                    .unwrap();
            });
        });
    });

    let key = IdempotencyKey::new();
    rt.block_on(guard.apply_once(key, |_| Ok::<_, ()>(())))
        .unwrap();

    c.bench_function("idempotency/apply_once_duplicate", |b| {
        b.iter(|| {
            rt.block_on(async {
                guard
                    .apply_once(key, |total| {
                        *total += 1;
                        Ok::<_, ()>(())
                    })
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_get_cache_hit,
    bench_get_cache_miss,
    bench_apply_once
);
criterion_main!(benches);
