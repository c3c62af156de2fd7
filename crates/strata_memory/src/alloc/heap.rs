//! Container allocator over an untagged heap.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::fmt;
use std::ptr::NonNull;

use allocator_api2::alloc::{AllocError, Allocator};

use super::dangling;
use crate::heap::Heap;

/// Forwards container allocations to a borrowed [`Heap`].
///
/// Used for the string pool and scratch containers over a
/// [`FreeListHeap`](crate::heap::FreeListHeap), where releases are per
/// object, and for frame-temporary containers over a
/// [`LinearHeap`](crate::heap::LinearHeap), where releases are no-ops until
/// the heap is reset.
///
/// Two heap allocators are equal iff they borrow the same heap.
pub struct HeapAllocator<'h, H: Heap + ?Sized> {
    heap: &'h H,
}

impl<'h, H: Heap + ?Sized> HeapAllocator<'h, H> {
    /// Creates an allocator over `heap`.
    #[inline]
    #[must_use]
    pub const fn new(heap: &'h H) -> Self {
        Self { heap }
    }

    /// The heap this allocator forwards to.
    #[inline]
    #[must_use]
    pub const fn heap(&self) -> &'h H {
        self.heap
    }
}

impl<H: Heap + ?Sized> Clone for HeapAllocator<'_, H> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<H: Heap + ?Sized> Copy for HeapAllocator<'_, H> {}

impl<H: Heap + ?Sized> fmt::Debug for HeapAllocator<'_, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeapAllocator")
            .field("heap", &(self.heap as *const H).cast::<()>())
            .field("current_memory", &self.heap.current_memory())
            .finish()
    }
}

impl<H: Heap + ?Sized> PartialEq for HeapAllocator<'_, H> {
    fn eq(&self, other: &Self) -> bool {
        (self.heap as *const H).cast::<()>() == (other.heap as *const H).cast::<()>()
    }
}

impl<H: Heap + ?Sized> Eq for HeapAllocator<'_, H> {}

// SAFETY: allocations stay valid until released through `deallocate` or until
// the heap is reset, and resetting requires `&mut H`, which cannot coexist
// with the shared borrow held here.
unsafe impl<H: Heap + ?Sized> Allocator for HeapAllocator<'_, H> {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        if layout.size() == 0 {
            return Ok(dangling(layout));
        }

        self.heap
            .allocate(layout)
            .map(|ptr| NonNull::slice_from_raw_parts(ptr, layout.size()))
            .map_err(|_| AllocError)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() != 0 {
            // SAFETY: `ptr` came from `allocate` above with this layout.
            unsafe { self.heap.deallocate(ptr, layout) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::{FreeListHeap, LinearHeap};
    use allocator_api2::vec::Vec;

    #[test]
    fn test_vec_on_free_list_returns_memory() {
        let heap = FreeListHeap::new(4096).unwrap();
        let alloc = HeapAllocator::new(&heap);

        let mut values: Vec<u32, _> = Vec::new_in(alloc);
        for i in 0..100 {
            values.push(i);
        }
        assert!(heap.current_memory() >= 400);

        drop(values);
        assert_eq!(heap.current_memory(), 0);
        assert_eq!(heap.free_range_count(), 1);
    }

    #[test]
    fn test_vec_on_linear_heap_holds_until_reset() {
        let mut heap = LinearHeap::new(1024).unwrap();
        {
            let values: Vec<u64, _> = Vec::with_capacity_in(16, HeapAllocator::new(&heap));
            drop(values);
        }
        assert_eq!(heap.used(), 128);

        heap.free();
        assert_eq!(heap.used(), 0);
    }

    #[test]
    fn test_equality_is_heap_identity() {
        let a = FreeListHeap::new(256).unwrap();
        let b = FreeListHeap::new(256).unwrap();

        assert_eq!(HeapAllocator::new(&a), HeapAllocator::new(&a));
        assert_ne!(HeapAllocator::new(&a), HeapAllocator::new(&b));
    }
}
