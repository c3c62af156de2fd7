//! # Free-List Heap Benchmark
//!
//! Cost of first-fit allocation and coalescing release, and of pool strings
//! built on top of it.
//!
//! Run with: `cargo bench --package strata_memory --bench free_list_benchmark`

// Benchmarks don't need docs
#![allow(missing_docs)]
#![allow(unsafe_code)]

use std::fmt::Write;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use strata_memory::{FreeListHeap, HeapAllocator, PoolString, PoolStringStream};

/// Size of the string pool in the default layout.
const POOL_SIZE: usize = 1000 * 1000;

/// Benchmark: allocate a batch, release it in reverse, let ranges coalesce.
fn bench_allocate_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("free_list_allocate_release");

    for count in [64usize, 512, 2048] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let heap = FreeListHeap::new(POOL_SIZE).unwrap();
            let mut live = Vec::with_capacity(count);
            b.iter(|| {
                for i in 0..count {
                    live.push(heap.allocate_bytes(16 + (i % 7) * 8).unwrap());
                }
                while let Some(ptr) = live.pop() {
                    // SAFETY: every pointer was issued above and is released once.
                    unsafe { heap.deallocate_bytes(ptr) };
                }
                black_box(heap.free_range_count())
            });
        });
    }

    group.finish();
}

/// Benchmark: interned-name style string building.
fn bench_pool_strings(c: &mut Criterion) {
    let heap = FreeListHeap::new(POOL_SIZE).unwrap();

    c.bench_function("pool_string_build_1k", |b| {
        b.iter(|| {
            for i in 0..1000 {
                let mut name = PoolString::with_capacity_in(32, HeapAllocator::new(&heap));
                name.push_str("mesh_");
                let _ = write!(name, "{i}");
                black_box(name.len());
            }
        });
    });

    c.bench_function("pool_string_stream_format", |b| {
        let mut stream = PoolStringStream::with_capacity_in(256, HeapAllocator::new(&heap));
        b.iter(|| {
            stream.clear();
            let _ = write!(stream, "{}:{} {:.3}ms", "render", 42, 1.234_f32);
            black_box(stream.len())
        });
    });
}

criterion_group!(benches, bench_allocate_release, bench_pool_strings);
criterion_main!(benches);
