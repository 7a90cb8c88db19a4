#[macro_use]
extern crate criterion;

use criterion::Criterion;
use readthrough::{Cancel, CoordinatorBuilder};
use readthrough_lru::LruStorage;
use std::{sync::Arc, time::Duration};

/// The cost of a lone cache hit: storage.get succeeds, no single-flight
/// machinery is touched at all.
fn cache_hit(c: &mut Criterion) {
    let storage: LruStorage<u32, u32> = LruStorage::builder().default_ttl(Duration::from_secs(60)).build();
    let querier = |n: &u32, _: &Cancel| -> Result<u32, readthrough_lru::Error<u32>> { Ok(*n) };
    let coordinator = CoordinatorBuilder::<u32, _, _>::new(storage, querier).build();
    let cancel = Cancel::new();
    coordinator.get(&cancel, &1).unwrap();

    c.bench_function("cache hit", |b| {
        b.iter(|| coordinator.get(&cancel, &1).unwrap());
    });
}

/// A stampede of threads racing to populate the same missing key: all but
/// one join the leader's sentinel instead of re-querying.
fn stampede_single_key(c: &mut Criterion) {
    c.bench_function("stampede on one key, 16 threads", |b| {
        b.iter(|| {
            let storage: LruStorage<u32, u32> = LruStorage::builder().build();
            let querier = |n: &u32, _: &Cancel| -> Result<u32, readthrough_lru::Error<u32>> {
                std::thread::sleep(Duration::from_micros(50));
                Ok(*n)
            };
            let coordinator = Arc::new(CoordinatorBuilder::<u32, _, _>::new(storage, querier).build());

            std::thread::scope(|scope| {
                for _ in 0..16 {
                    let coordinator = coordinator.clone();
                    scope.spawn(move || {
                        let cancel = Cancel::new();
                        coordinator.get(&cancel, &1).unwrap();
                    });
                }
            });
        });
    });
}

criterion::criterion_group!(benches, cache_hit, stampede_single_key);
criterion::criterion_main!(benches);
