//! Release deferral.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::ptr::NonNull;

use allocator_api2::alloc::{AllocError, Allocator};

/// Allocator wrapper whose `deallocate` does nothing.
///
/// Memory obtained through it is reclaimed only when the owner of the
/// underlying storage resets it: [`TaggedHeap::free_blocks`] for a tagged
/// category, [`Heap::free`] for a linear heap. Growing a container still
/// works; the superseded storage simply stays allocated until that reset.
///
/// [`TaggedHeap::free_blocks`]: crate::heap::TaggedHeap::free_blocks
/// [`Heap::free`]: crate::heap::Heap::free
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeferredFree<A>(A);

impl<A> DeferredFree<A> {
    /// Wraps `inner`.
    #[inline]
    #[must_use]
    pub const fn new(inner: A) -> Self {
        Self(inner)
    }

    /// The wrapped allocator.
    #[inline]
    #[must_use]
    pub const fn inner(&self) -> &A {
        &self.0
    }
}

// SAFETY: allocation is delegated unchanged; never releasing is always sound.
unsafe impl<A: Allocator> Allocator for DeferredFree<A> {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        self.0.allocate(layout)
    }

    #[inline]
    fn allocate_zeroed(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        self.0.allocate_zeroed(layout)
    }

    #[inline]
    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::TaggedAllocator;
    use crate::heap::TaggedHeap;
    use crate::tags::{Geometry, Tag};
    use allocator_api2::vec::Vec;

    #[test]
    fn test_drop_leaves_category_until_free_blocks() {
        let mut heap = TaggedHeap::new(256, 2).unwrap();
        {
            let mut first: Vec<u16, _> = Vec::new_in(TaggedAllocator::<Geometry>::deferred(&heap));
            let second: Vec<u16, _> =
                Vec::with_capacity_in(4, TaggedAllocator::<Geometry>::deferred(&heap));
            first.extend([1, 2, 3]);
            drop(second);
            assert_eq!(first.as_slice(), &[1, 2, 3]);
        }
        assert_eq!(heap.blocks_owned_by(Tag::GEOMETRY), 1);

        assert_eq!(heap.free_blocks(Tag::GEOMETRY), 1);
        assert_eq!(heap.current_memory(), 0);
    }
}
