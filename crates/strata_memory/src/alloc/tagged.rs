//! # Tagged Allocator
//!
//! The container-facing side of the tagged heap.
//!
//! ## Reclamation contract
//!
//! Releasing storage through a [`TaggedAllocator`] calls
//! [`TaggedHeap::deallocate`], which reclaims *every* block owned by the
//! category, not just the released bytes. Dropping one `FrameVec` therefore
//! ends the frame for every other frame container sharing the heap. This is
//! why creating the allocator is `unsafe`: the creator promises that all
//! containers of the category are retired together.
//!
//! Growing a container is not a release. Reallocation copies into fresh
//! memory and leaves the stale range in place until the category is
//! reclaimed, so `push` beyond capacity is safe.

// Allocator implementations are unsafe by contract.
#![allow(unsafe_code)]

use std::alloc::Layout;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::{self, NonNull};

use allocator_api2::alloc::{AllocError, Allocator};

use super::{dangling, DeferredFree};
use crate::error::{MemoryError, MemoryResult};
use crate::heap::TaggedHeap;
use crate::tags::{MemoryTag, Tag};

/// Container allocator bound to a tagged heap and a memory category.
///
/// Two tagged allocators are equal iff their tags are equal, whatever heap
/// reference or element type they were produced for.
///
/// # Example
///
/// ```rust,ignore
/// let heap = TaggedHeap::new(64 * 1024, 8)?;
/// // SAFETY: all frame containers are dropped together at end of frame.
/// let alloc = unsafe { TaggedAllocator::<Frame>::new(&heap) };
///
/// let mut items: FrameVec<'_, RenderItem> = FrameVec::with_capacity_in(256, alloc);
/// items.push(item);
/// ```
pub struct TaggedAllocator<'h, C: MemoryTag> {
    heap: &'h TaggedHeap,
    _category: PhantomData<fn() -> C>,
}

impl<'h, C: MemoryTag> TaggedAllocator<'h, C> {
    /// Creates an allocator for category `C` on `heap`.
    ///
    /// # Safety
    ///
    /// Any release of storage through this allocator (or a copy of it),
    /// such as dropping a container, shrinking it to nothing or a hash map
    /// rehash, reclaims every block owned by `C::TAG`. The caller must
    /// guarantee that no memory of the category is used after such a
    /// release, which in practice means retiring all containers of the
    /// category together at the category's lifecycle boundary.
    #[inline]
    #[must_use]
    pub const unsafe fn new(heap: &'h TaggedHeap) -> Self {
        Self {
            heap,
            _category: PhantomData,
        }
    }

    /// Creates an allocator for category `C` whose releases are deferred to
    /// the next [`TaggedHeap::free_blocks`] of the category.
    ///
    /// Safe, since nothing is reclaimed behind the borrow checker's back.
    #[inline]
    #[must_use]
    pub const fn deferred(heap: &'h TaggedHeap) -> DeferredTaggedAllocator<'h, C> {
        DeferredFree::new(Self {
            heap,
            _category: PhantomData,
        })
    }

    /// The tag this allocator allocates under.
    #[inline]
    #[must_use]
    pub const fn tag(&self) -> Tag {
        C::TAG
    }

    /// The heap this allocator forwards to.
    #[inline]
    #[must_use]
    pub const fn heap(&self) -> &'h TaggedHeap {
        self.heap
    }

    /// Element-typed view of this allocator.
    #[inline]
    #[must_use]
    pub const fn typed<T>(self) -> TypedAllocator<'h, T, C> {
        TypedAllocator {
            family: self,
            _element: PhantomData,
        }
    }
}

impl<C: MemoryTag> Clone for TaggedAllocator<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: MemoryTag> Copy for TaggedAllocator<'_, C> {}

impl<C: MemoryTag> fmt::Debug for TaggedAllocator<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaggedAllocator")
            .field("category", &C::NAME)
            .field("tag", &C::TAG)
            .finish()
    }
}

impl<'b, C: MemoryTag, D: MemoryTag> PartialEq<TaggedAllocator<'b, D>> for TaggedAllocator<'_, C> {
    fn eq(&self, _other: &TaggedAllocator<'b, D>) -> bool {
        C::TAG == D::TAG
    }
}

impl<C: MemoryTag> Eq for TaggedAllocator<'_, C> {}

// SAFETY: memory handed out stays valid until the category is reclaimed,
// which only happens through `deallocate`, whose consequences the creator of
// the allocator accepted in `TaggedAllocator::new`. Copies share the heap and
// tag, so memory from one copy may be released through another.
unsafe impl<C: MemoryTag> Allocator for TaggedAllocator<'_, C> {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        if layout.size() == 0 {
            return Ok(dangling(layout));
        }

        self.heap
            .allocate_layout(C::TAG, layout)
            .map(|ptr| NonNull::slice_from_raw_parts(ptr, layout.size()))
            .map_err(|_| AllocError)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() != 0 {
            // SAFETY: accepted by the creator of this allocator.
            unsafe { self.heap.deallocate(C::TAG, ptr) }
        }
    }

    unsafe fn grow(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> Result<NonNull<[u8]>, AllocError> {
        let new_ptr = self.allocate(new_layout)?;
        // SAFETY: the old range is live for `old_layout.size()` bytes and the
        // fresh range is at least that large; bump ranges never overlap.
        unsafe {
            ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.cast::<u8>().as_ptr(), old_layout.size());
        }
        Ok(new_ptr)
    }

    unsafe fn grow_zeroed(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> Result<NonNull<[u8]>, AllocError> {
        let new_ptr = self.allocate_zeroed(new_layout)?;
        // SAFETY: as in `grow`.
        unsafe {
            ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.cast::<u8>().as_ptr(), old_layout.size());
        }
        Ok(new_ptr)
    }

    unsafe fn shrink(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> Result<NonNull<[u8]>, AllocError> {
        if new_layout.align() <= old_layout.align() {
            return Ok(NonNull::slice_from_raw_parts(ptr, new_layout.size()));
        }

        let new_ptr = self.allocate(new_layout)?;
        // SAFETY: the new size is at most the old size.
        unsafe {
            ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.cast::<u8>().as_ptr(), new_layout.size());
        }
        Ok(new_ptr)
    }
}

/// Tagged allocator whose releases wait for the category's bulk reclaim.
pub type DeferredTaggedAllocator<'h, C> = DeferredFree<TaggedAllocator<'h, C>>;

/// Element-typed view of a [`TaggedAllocator`].
///
/// Allocation sizes are computed as `n * size_of::<T>()`. [`rebind`]
/// produces the view for another element type with the same tag; views
/// compare equal iff their tags are equal.
///
/// [`rebind`]: TypedAllocator::rebind
pub struct TypedAllocator<'h, T, C: MemoryTag> {
    family: TaggedAllocator<'h, C>,
    _element: PhantomData<fn() -> T>,
}

impl<'h, T, C: MemoryTag> TypedAllocator<'h, T, C> {
    /// Allocates uninitialized storage for `n` values of `T`.
    ///
    /// # Errors
    ///
    /// Returns the tagged heap's error if the request cannot be served.
    pub fn allocate(&self, n: usize) -> MemoryResult<NonNull<T>> {
        let layout = Layout::array::<T>(n).map_err(|_| MemoryError::InvalidLayout {
            size: n.saturating_mul(std::mem::size_of::<T>()),
            align: std::mem::align_of::<T>(),
        })?;
        if layout.size() == 0 {
            return Ok(NonNull::dangling());
        }

        self.family
            .heap
            .allocate_layout(C::TAG, layout)
            .map(NonNull::cast)
    }

    /// Releases storage: reclaims every block owned by the category.
    ///
    /// `n` is accepted for symmetry with [`TypedAllocator::allocate`] and is
    /// only used to skip zero-sized releases.
    ///
    /// # Safety
    ///
    /// Same contract as [`TaggedHeap::deallocate`].
    pub unsafe fn deallocate(&self, ptr: NonNull<T>, n: usize) {
        if n.saturating_mul(std::mem::size_of::<T>()) != 0 {
            // SAFETY: forwarded caller contract.
            unsafe { self.family.heap.deallocate(C::TAG, ptr.cast()) }
        }
    }

    /// Same allocator, typed for `U`.
    #[inline]
    #[must_use]
    pub fn rebind<U>(self) -> TypedAllocator<'h, U, C> {
        self.family.typed()
    }

    /// The untyped allocator family this view belongs to.
    #[inline]
    #[must_use]
    pub fn family(self) -> TaggedAllocator<'h, C> {
        self.family
    }

    /// The tag this allocator allocates under.
    #[inline]
    #[must_use]
    pub const fn tag(&self) -> Tag {
        C::TAG
    }
}

impl<T, C: MemoryTag> Clone for TypedAllocator<'_, T, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, C: MemoryTag> Copy for TypedAllocator<'_, T, C> {}

impl<T, C: MemoryTag> fmt::Debug for TypedAllocator<'_, T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedAllocator")
            .field("element", &std::any::type_name::<T>())
            .field("category", &C::NAME)
            .finish()
    }
}

impl<'b, T, U, C: MemoryTag, D: MemoryTag> PartialEq<TypedAllocator<'b, U, D>>
    for TypedAllocator<'_, T, C>
{
    fn eq(&self, _other: &TypedAllocator<'b, U, D>) -> bool {
        C::TAG == D::TAG
    }
}

impl<T, C: MemoryTag> Eq for TypedAllocator<'_, T, C> {}
