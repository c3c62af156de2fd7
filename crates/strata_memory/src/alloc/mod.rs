//! # Allocator Adapters
//!
//! Bridges between the heaps and the container allocator interface
//! ([`allocator_api2::alloc::Allocator`]), which `Vec`, `hashbrown::HashMap`
//! and the crate's strings are generic over.
//!
//! - [`TaggedAllocator`]: routes to a [`TaggedHeap`](crate::heap::TaggedHeap)
//!   under a compile-time category. Releasing storage reclaims the category.
//! - [`TypedAllocator`]: element-typed view of a tagged allocator, with
//!   explicit rebinding to other element types.
//! - [`HeapAllocator`]: routes to any untagged [`Heap`](crate::heap::Heap).
//! - [`DeferredFree`]: wraps an allocator and defers every release to the
//!   owner's next bulk reclaim.

#![allow(unsafe_code)]

mod deferred;
mod heap;
mod tagged;

use std::alloc::Layout;
use std::ptr::NonNull;

pub use allocator_api2::alloc::{AllocError, Allocator};

pub use deferred::DeferredFree;
pub use heap::HeapAllocator;
pub use tagged::{DeferredTaggedAllocator, TaggedAllocator, TypedAllocator};

/// Well-aligned, empty allocation for zero-sized requests.
#[inline]
pub(crate) fn dangling(layout: Layout) -> NonNull<[u8]> {
    // SAFETY: alignments are non-zero powers of two.
    let ptr = unsafe { NonNull::new_unchecked(layout.align() as *mut u8) };
    NonNull::slice_from_raw_parts(ptr, 0)
}
