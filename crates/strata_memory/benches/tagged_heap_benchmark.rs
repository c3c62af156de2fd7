//! # Tagged Heap Benchmark
//!
//! Frame-loop cost of the tagged heap:
//! - bump allocation inside owned blocks
//! - O(1) bulk reclaim per category
//! - container growth on a tagged allocator
//!
//! Run with: `cargo bench --package strata_memory --bench tagged_heap_benchmark`

// Benchmarks don't need docs
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use strata_memory::{vec_in, Frame, Tag, TaggedAllocator, TaggedHeap};

/// Block size used by the default region layout.
const BLOCK_SIZE: usize = 500 * 1000;

/// Block count used by the default region layout.
const BLOCK_COUNT: usize = 15;

/// Benchmark: small allocations until a frame's worth is used, then reclaim.
fn bench_allocate_and_free(c: &mut Criterion) {
    let mut group = c.benchmark_group("tagged_allocate_free");

    for size in [16usize, 64, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let mut heap = TaggedHeap::new(BLOCK_SIZE, BLOCK_COUNT).unwrap();
            b.iter(|| {
                for _ in 0..1000 {
                    black_box(heap.allocate(Tag::FRAME, size).unwrap());
                }
                heap.free_blocks(Tag::FRAME)
            });
        });
    }

    group.finish();
}

/// Benchmark: many categories interleaved across the pool.
fn bench_interleaved_tags(c: &mut Criterion) {
    let tags = [Tag::FRAME, Tag::GEOMETRY, Tag::STAGE, Tag::GRAPHICS];
    let mut heap = TaggedHeap::new(BLOCK_SIZE, BLOCK_COUNT).unwrap();

    c.bench_function("tagged_interleaved_4_tags", |b| {
        b.iter(|| {
            for i in 0..4000 {
                black_box(heap.allocate(tags[i % tags.len()], 48).unwrap());
            }
            for tag in tags {
                heap.free_blocks(tag);
            }
        });
    });
}

/// Benchmark: growing a frame vector from empty.
fn bench_frame_vec_push(c: &mut Criterion) {
    let mut heap = TaggedHeap::new(BLOCK_SIZE, BLOCK_COUNT).unwrap();

    c.bench_function("frame_vec_push_10k", |b| {
        b.iter(|| {
            {
                let mut draws = vec_in::<u64, _>(TaggedAllocator::<Frame>::deferred(&heap));
                for i in 0..10_000u64 {
                    draws.push(i);
                }
                black_box(draws.len());
            }
            heap.free_blocks(Tag::FRAME)
        });
    });
}

criterion_group!(
    benches,
    bench_allocate_and_free,
    bench_interleaved_tags,
    bench_frame_vec_push,
);
criterion_main!(benches);
