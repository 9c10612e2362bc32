//! Benchmark for pool and dock resolution
//!
//! Resolution is a linear scan over the full pool listing, so cost grows
//! with the number of registered pools.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sds_orchestrator::{BaseModel, DockSpec, ExtraSpec, PoolSpec, ResourceRepository, Scheduler};
use serde_json::json;
use std::collections::BTreeMap;
use tokio::runtime::Runtime;

fn populate(rt: &Runtime, pools: usize) -> Scheduler {
    let repo = ResourceRepository::in_memory();
    rt.block_on(async {
        repo.create_dock(&DockSpec {
            base: BaseModel {
                id: "dock-0".into(),
                ..Default::default()
            },
            endpoint: "127.0.0.1:50050".into(),
            driver_name: "sample".into(),
        })
        .await
        .unwrap();

        // Only the last pool carries the requested tag
        for i in 0..pools {
            let ssd = if i + 1 == pools { "true" } else { "false" };
            repo.create_pool(&PoolSpec {
                base: BaseModel {
                    id: format!("pool-{:05}", i),
                    ..Default::default()
                },
                dock_id: "dock-0".into(),
                total_capacity: 1024,
                free_capacity: 1024,
                parameters: BTreeMap::from([
                    ("ssd".to_string(), ssd.to_string()),
                    ("thin".to_string(), "true".to_string()),
                ]),
                ..Default::default()
            })
            .await
            .unwrap();
        }
    });
    Scheduler::new(repo)
}

fn bench_resolve_supporting_pool(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let tags = ExtraSpec::from([
        ("ssd".to_string(), json!(true)),
        ("thin".to_string(), json!(true)),
    ]);

    let mut group = c.benchmark_group("scheduler");
    group.throughput(Throughput::Elements(1));

    for pools in [10usize, 100, 1000] {
        let scheduler = populate(&rt, pools);
        group.bench_with_input(
            BenchmarkId::new("resolve_supporting_pool", pools),
            &pools,
            |b, _| {
                b.iter(|| {
                    rt.block_on(scheduler.resolve_supporting_pool(black_box(&tags)))
                        .unwrap()
                });
            },
        );
    }

    group.finish();
}

fn bench_schedule(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let scheduler = populate(&rt, 100);
    rt.block_on(async {
        scheduler
            .repository()
            .create_profile(&sds_orchestrator::ProfileSpec {
                base: BaseModel {
                    id: "gold".into(),
                    name: "gold".into(),
                    ..Default::default()
                },
                extra: ExtraSpec::from([("ssd".to_string(), json!(true))]),
            })
            .await
            .unwrap();
    });

    let mut group = c.benchmark_group("scheduler");
    group.throughput(Throughput::Elements(1));
    group.bench_function("schedule_100_pools", |b| {
        b.iter(|| rt.block_on(scheduler.schedule(black_box("gold"))).unwrap());
    });
    group.finish();
}

criterion_group!(benches, bench_resolve_supporting_pool, bench_schedule);
criterion_main!(benches);
