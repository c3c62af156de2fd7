//! # Owning Handles
//!
//! A single value constructed in heap memory, destroyed exactly once when
//! the handle drops.
//!
//! ```rust,ignore
//! let mesh = tagged_new::<Geometry, _>(region.tagged_heap(), Mesh::default())?;
//! let config = global_new(region.global_heap(), LoaderState::new())?;
//! ```
//!
//! Tagged handles run the value's destructor on drop but leave the bytes to
//! the category's next bulk reclaim. Global handles return their bytes to
//! the free list immediately.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::fmt;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};

use allocator_api2::alloc::Allocator;

use crate::alloc::{DeferredTaggedAllocator, HeapAllocator, TaggedAllocator};
use crate::error::{MemoryError, MemoryResult};
use crate::heap::{FreeListHeap, TaggedHeap};
use crate::tags::{HasMemoryTag, MemoryTag};

/// A value of type `T` placed in memory from `A`.
pub struct Owned<T, A: Allocator> {
    ptr: NonNull<T>,
    alloc: A,
    _owns: PhantomData<T>,
}

impl<T, A: Allocator> Owned<T, A> {
    /// Allocates room for `value` through `alloc` and moves it there.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::AllocationFailed`] if the allocator refuses the
    /// request; the value is dropped.
    pub fn new_in(value: T, alloc: A) -> MemoryResult<Self> {
        let layout = Layout::new::<T>();
        let ptr = alloc
            .allocate(layout)
            .map_err(|_| MemoryError::AllocationFailed {
                size: layout.size(),
                align: layout.align(),
            })?
            .cast::<T>();

        // SAFETY: fresh allocation sized and aligned for `T`.
        unsafe { ptr.as_ptr().write(value) };

        Ok(Self {
            ptr,
            alloc,
            _owns: PhantomData,
        })
    }

    /// Moves the value out, releasing its storage.
    pub fn into_inner(this: Self) -> T {
        let this = ManuallyDrop::new(this);
        // SAFETY: the value is initialized and read exactly once; `Drop` is
        // suppressed, so neither the value nor the allocator is touched again.
        unsafe {
            let value = this.ptr.as_ptr().read();
            let alloc = ptr::read(&this.alloc);
            alloc.deallocate(this.ptr.cast(), Layout::new::<T>());
            value
        }
    }

    /// The allocator the value was placed with.
    #[inline]
    pub fn allocator(this: &Self) -> &A {
        &this.alloc
    }

    /// Address of the value.
    #[inline]
    pub fn as_ptr(this: &Self) -> NonNull<T> {
        this.ptr
    }
}

impl<T, A: Allocator> Drop for Owned<T, A> {
    fn drop(&mut self) {
        // SAFETY: the value is initialized and dropped only here.
        unsafe {
            ptr::drop_in_place(self.ptr.as_ptr());
            self.alloc.deallocate(self.ptr.cast(), Layout::new::<T>());
        }
    }
}

impl<T, A: Allocator> Deref for Owned<T, A> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: initialized for the handle's whole life.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T, A: Allocator> DerefMut for Owned<T, A> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: initialized, and uniquely owned by the handle.
        unsafe { self.ptr.as_mut() }
    }
}

impl<T: fmt::Debug, A: Allocator> fmt::Debug for Owned<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: fmt::Display, A: Allocator> fmt::Display for Owned<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}

/// Handle to a value in category `C` of a tagged heap.
pub type TaggedOwned<'h, T, C> = Owned<T, DeferredTaggedAllocator<'h, C>>;

/// Handle to a value on a free-list heap.
pub type GlobalOwned<'h, T> = Owned<T, HeapAllocator<'h, FreeListHeap>>;

/// Constructs `value` in category `C` of `heap`.
///
/// # Errors
///
/// Fails if the tagged heap cannot serve `size_of::<T>()` bytes for the
/// category.
pub fn tagged_new<C: MemoryTag, T>(heap: &TaggedHeap, value: T) -> MemoryResult<TaggedOwned<'_, T, C>> {
    Owned::new_in(value, TaggedAllocator::<C>::deferred(heap))
}

/// Constructs `value` in its type's default category.
///
/// # Errors
///
/// As [`tagged_new`].
pub fn tagged_new_default<T: HasMemoryTag>(
    heap: &TaggedHeap,
    value: T,
) -> MemoryResult<TaggedOwned<'_, T, T::Category>> {
    tagged_new::<T::Category, T>(heap, value)
}

/// Constructs `value` on a free-list heap.
///
/// # Errors
///
/// Fails if the heap has no free range large enough.
pub fn global_new<T>(heap: &FreeListHeap, value: T) -> MemoryResult<GlobalOwned<'_, T>> {
    Owned::new_in(value, HeapAllocator::new(heap))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::Heap;
    use crate::tags::{Frame, Global, Resources, Tag};
    use std::cell::Cell;
    use std::rc::Rc;

    struct DropCounter {
        drops: Rc<Cell<u32>>,
        payload: [u64; 4],
    }

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    struct Texture {
        id: u32,
    }

    impl HasMemoryTag for Texture {
        type Category = Resources;
    }

    #[test]
    fn test_tagged_destroys_exactly_once() {
        let mut heap = TaggedHeap::new(256, 2).unwrap();
        let drops = Rc::new(Cell::new(0));

        {
            let handle = tagged_new::<Frame, _>(
                &heap,
                DropCounter {
                    drops: Rc::clone(&drops),
                    payload: [1, 2, 3, 4],
                },
            )
            .unwrap();
            assert_eq!(handle.payload.iter().sum::<u64>(), 10);
            assert_eq!(heap.block_tag(0), Some(Tag::FRAME));
        }

        assert_eq!(drops.get(), 1);
        assert_eq!(heap.blocks_owned_by(Tag::FRAME), 1);

        heap.free_blocks(Tag::FRAME);
        assert_eq!(drops.get(), 1);
        assert_eq!(heap.current_memory(), 0);
    }

    #[test]
    fn test_default_category_comes_from_type() {
        let heap = TaggedHeap::new(64, 1).unwrap();
        let texture = tagged_new_default(&heap, Texture { id: 9 }).unwrap();

        assert_eq!(texture.id, 9);
        assert_eq!(heap.block_tag(0), Some(Tag::RESOURCES));
        assert_eq!(Owned::allocator(&texture).inner().tag(), Tag::RESOURCES);
    }

    #[test]
    fn test_global_returns_bytes_on_drop() {
        let heap = FreeListHeap::new(512).unwrap();
        let drops = Rc::new(Cell::new(0));

        let handle = global_new(
            &heap,
            DropCounter {
                drops: Rc::clone(&drops),
                payload: [0; 4],
            },
        )
        .unwrap();
        assert!(heap.current_memory() > 0);

        drop(handle);
        assert_eq!(drops.get(), 1);
        assert_eq!(heap.current_memory(), 0);
    }

    #[test]
    fn test_into_inner_skips_drop() {
        let heap = FreeListHeap::new(512).unwrap();
        let drops = Rc::new(Cell::new(0));

        let handle = global_new(
            &heap,
            DropCounter {
                drops: Rc::clone(&drops),
                payload: [7; 4],
            },
        )
        .unwrap();
        let value = Owned::into_inner(handle);

        assert_eq!(drops.get(), 0);
        assert_eq!(value.payload, [7; 4]);
        assert_eq!(heap.current_memory(), 0);
        drop(value);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_zero_sized_values() {
        let heap = TaggedHeap::new(64, 1).unwrap();
        let unit = tagged_new::<Global, _>(&heap, ()).unwrap();
        assert_eq!(std::mem::size_of_val(&*unit), 0);
        assert_eq!(heap.block_tag(0), None);
    }

    #[test]
    fn test_exhaustion_is_an_error() {
        let heap = TaggedHeap::new(16, 1).unwrap();
        assert!(matches!(
            tagged_new::<Frame, _>(&heap, [0u64; 4]),
            Err(MemoryError::AllocationFailed { size: 32, .. })
        ));
    }
}
