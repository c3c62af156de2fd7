//! # Stack Heap
//!
//! LIFO allocator over one backing region. Every allocation is preceded by
//! a one-word header holding the offset the stack had before it, so popping
//! the most recent allocation restores that offset exactly.
//!
//! ```text
//!  region: [pad|prev|payload A][pad|prev|payload B][ free ...... ]
//!                                                  ^ offset
//! ```

// Headers are read and written in place inside the backing region.
#![allow(unsafe_code)]

use std::alloc::Layout;
use std::cell::Cell;
use std::mem::{align_of, size_of};
use std::ptr::NonNull;

use super::{Heap, RawRegion};
use crate::error::{MemoryError, MemoryResult};

/// Bytes reserved in front of every allocation for the previous offset.
const HEADER_SIZE: usize = size_of::<usize>();

/// A last-in, first-out heap.
///
/// Releasing the most recent allocation rewinds the stack. A release that is
/// not on top is ignored; its bytes stay reserved until everything above it
/// has been popped past, or until the heap is freed.
///
/// # Thread Safety
///
/// NOT thread-safe. The heap is `!Sync`; confine it to one thread.
///
/// # Example
///
/// ```rust,ignore
/// let stack = StackHeap::new(64 * 1024)?;
///
/// let outer = stack.allocate(Layout::new::<[u32; 64]>())?;
/// let inner = stack.allocate(Layout::new::<[u32; 16]>())?;
/// unsafe {
///     stack.deallocate(inner, Layout::new::<[u32; 16]>());
///     stack.deallocate(outer, Layout::new::<[u32; 64]>());
/// }
/// assert_eq!(stack.used(), 0);
/// ```
pub struct StackHeap {
    region: RawRegion,
    /// First free byte.
    offset: Cell<usize>,
}

impl StackHeap {
    /// Creates a stack heap of `capacity` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing memory cannot be acquired.
    pub fn new(capacity: usize) -> MemoryResult<Self> {
        Ok(Self {
            region: RawRegion::new(capacity)?,
            offset: Cell::new(0),
        })
    }

    /// Capacity in bytes.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.region.size()
    }

    /// Bytes reserved, headers and padding included.
    #[inline]
    #[must_use]
    pub fn used(&self) -> usize {
        self.offset.get()
    }

    /// Payload offset and new stack offset for `layout`.
    fn placement(&self, layout: Layout) -> Option<(usize, usize)> {
        let align = layout.align().max(align_of::<usize>());
        let base = self.region.base().as_ptr() as usize;

        let earliest = base
            .checked_add(self.offset.get())?
            .checked_add(HEADER_SIZE)?;
        let payload = earliest.checked_add(align - 1)? & !(align - 1);
        let start = payload - base;
        let end = start.checked_add(layout.size())?;

        (end <= self.capacity()).then_some((start, end))
    }

    /// Returns true if `layout` fits on top of the stack.
    #[inline]
    #[must_use]
    pub fn fits(&self, layout: Layout) -> bool {
        self.placement(layout).is_some()
    }
}

impl Heap for StackHeap {
    fn allocate(&self, layout: Layout) -> MemoryResult<NonNull<u8>> {
        let Some((start, end)) = self.placement(layout) else {
            let remaining = self.capacity() - self.used();
            tracing::error!(size = layout.size(), remaining, "stack heap exhausted");
            return Err(MemoryError::OutOfMemory {
                size: layout.size(),
                largest_free: remaining.saturating_sub(HEADER_SIZE),
            });
        };

        let payload = self.region.at(start);
        // SAFETY: `start` is aligned to at least `usize` and sits at least
        // HEADER_SIZE bytes past the previous offset, so the word in front
        // of the payload lies inside the region and belongs to this call.
        unsafe {
            payload
                .as_ptr()
                .sub(HEADER_SIZE)
                .cast::<usize>()
                .write(self.offset.get());
        }

        self.offset.set(end);
        Ok(payload)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        let Some(start) = self.region.offset_of(ptr) else {
            debug_assert!(layout.size() == 0, "pointer does not belong to this stack heap");
            return;
        };
        if start + layout.size() != self.offset.get() {
            return;
        }

        // SAFETY: `ptr` came from `allocate`, which wrote the header.
        let previous = unsafe { ptr.as_ptr().sub(HEADER_SIZE).cast::<usize>().read() };
        self.offset.set(previous);
    }

    fn free(&mut self) {
        self.offset.set(0);
    }

    fn can_alloc(&self, layout: Layout) -> bool {
        self.fits(layout)
    }

    fn total_memory(&self) -> usize {
        self.capacity()
    }

    fn current_memory(&self) -> usize {
        self.used()
    }
}
