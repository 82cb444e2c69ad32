//! Benchmarks for the handle allocator and DenseComponentStore

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use kiln_core::alloc::{DenseComponentStore, Handle, HandleAllocator};

#[derive(Clone, Copy, Debug)]
struct EntityData {
    position: (f32, f32, f32),
    velocity: (f32, f32, f32),
    health: f32,
    flags: u32,
}

impl Default for EntityData {
    fn default() -> Self {
        Self {
            position: (0.0, 0.0, 0.0),
            velocity: (1.0, 0.5, 0.25),
            health: 100.0,
            flags: 0,
        }
    }
}

fn populated(size: usize) -> (HandleAllocator, DenseComponentStore<EntityData>, Vec<Handle>) {
    let mut handles = HandleAllocator::new();
    let mut store = DenseComponentStore::new();
    let owners: Vec<_> = (0..size)
        .map(|_| {
            let handle = handles.allocate();
            store.add(handle, EntityData::default());
            handle
        })
        .collect();
    (handles, store, owners)
}

fn bench_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("dense_store_add");

    for size in [10, 100, 1000, 10000] {
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| populated(black_box(size)));
        });
    }

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("dense_store_lookup");

    for size in [100, 1000, 10000] {
        group.throughput(Throughput::Elements(size as u64));
        let (_handles, store, owners) = populated(size);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let mut sum = 0.0;
                for &owner in &owners {
                    sum += store.get(black_box(owner)).health;
                }
                black_box(sum)
            });
        });
    }

    group.finish();
}

fn bench_raw_iteration(c: &mut Criterion) {
    let mut group = c.benchmark_group("dense_store_raw_iteration");

    for size in [100, 1000, 10000] {
        group.throughput(Throughput::Elements(size as u64));
        let (_handles, mut store, _owners) = populated(size);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                for data in store.raw_data_mut() {
                    data.position.0 += data.velocity.0;
                    data.position.1 += data.velocity.1;
                    data.position.2 += data.velocity.2;
                    data.flags = data.flags.wrapping_add(1);
                }
                black_box(store.raw_data().len())
            });
        });
    }

    group.finish();
}

fn bench_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("dense_store_remove");

    for size in [100, 1000, 10000] {
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                || populated(size),
                |(mut handles, mut store, owners)| {
                    for owner in owners.into_iter().step_by(2) {
                        store.remove(owner);
                        handles.release(owner);
                    }
                    store
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_add, bench_lookup, bench_raw_iteration, bench_remove);
criterion_main!(benches);
