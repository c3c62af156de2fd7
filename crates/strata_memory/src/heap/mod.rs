//! # Heaps
//!
//! All backing memory is acquired once at startup. After that:
//! - No system allocator calls
//! - Categories are reclaimed in bulk
//! - Predictable, flat latency
//!
//! ```text
//!  TaggedHeap ──► [HeapBlock][HeapBlock][HeapBlock] ...   (bump per block, freed per tag)
//!                      │
//!                      └── LinearHeap (bump offset over one RawRegion)
//!
//!  FreeListHeap ──► [RawRegion][RawRegion] ...            (first-fit, per-object free)
//!
//!  StackHeap ──► RawRegion                                 (LIFO, previous-offset header)
//!
//!  DoubleBufferedHeap ──► [LinearHeap][LinearHeap]        (swap and clear per frame)
//! ```

#![allow(unsafe_code)]

mod block;
mod double_buffered;
mod free_list;
mod linear;
mod raw;
mod stack;
mod tagged;

use std::alloc::Layout;
use std::ptr::NonNull;

use crate::error::MemoryResult;

pub use block::HeapBlock;
pub use double_buffered::DoubleBufferedHeap;
pub use free_list::FreeListHeap;
pub use linear::LinearHeap;
pub use raw::MAX_ALIGN;
pub use stack::StackHeap;
pub use tagged::TaggedHeap;

pub(crate) use raw::RawRegion;

/// Common interface of the untagged heaps.
///
/// Implementors use interior mutability so that allocators can share a heap
/// by reference. Operations that invalidate every outstanding allocation take
/// `&mut self`, which the borrow checker only grants once all borrowing
/// allocators and containers are gone.
pub trait Heap {
    /// Allocates memory for `layout`.
    ///
    /// # Errors
    ///
    /// Returns an error if no memory is left or the layout is unsupported.
    fn allocate(&self, layout: Layout) -> MemoryResult<NonNull<u8>>;

    /// Releases an allocation.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by [`Heap::allocate`] on this heap with
    /// the same `layout`, and must not have been released already.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);

    /// Resets the heap, releasing every allocation at once.
    fn free(&mut self);

    /// Returns true if an allocation for `layout` would currently succeed.
    fn can_alloc(&self, layout: Layout) -> bool;

    /// Total bytes managed by this heap.
    fn total_memory(&self) -> usize;

    /// Bytes currently in use (including per-allocation overhead).
    fn current_memory(&self) -> usize;
}
