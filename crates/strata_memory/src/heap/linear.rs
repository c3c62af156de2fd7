//! # Linear Heap
//!
//! A bump allocator over one backing region. Individual allocations are never
//! released; the whole heap is reset at once.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::cell::Cell;
use std::ptr::NonNull;

use super::{Heap, RawRegion};
use crate::error::{MemoryError, MemoryResult};

/// A bump-pointer heap.
///
/// Allocations are fast (just bump an offset). Memory is reclaimed all at
/// once when the heap is freed.
///
/// # Thread Safety
///
/// This heap is NOT thread-safe. It is `!Sync` by construction.
///
/// # Example
///
/// ```rust,ignore
/// let mut frame = LinearHeap::new(1024 * 1024)?; // 1MB
///
/// let ptr = frame.allocate(Layout::new::<[f32; 16]>())?;
///
/// // End of frame: reclaim everything
/// frame.free();
/// ```
pub struct LinearHeap {
    /// The backing storage.
    region: RawRegion,
    /// Current allocation offset.
    offset: Cell<usize>,
}

impl LinearHeap {
    /// Creates a new linear heap with the specified capacity in bytes.
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

    /// Returns the total capacity in bytes.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.region.size()
    }

    /// Returns the current used space in bytes.
    #[inline]
    #[must_use]
    pub fn used(&self) -> usize {
        self.offset.get()
    }

    /// Returns the remaining free space in bytes.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity() - self.used()
    }

    /// Offset at which an allocation aligned to `align` would start.
    fn aligned_offset(&self, align: usize) -> Option<usize> {
        let base = self.region.base().as_ptr() as usize;
        let addr = base.checked_add(self.offset.get())?;
        let aligned = addr.checked_add(align - 1)? & !(align - 1);
        Some(aligned - base)
    }

    /// Range `[start, end)` an allocation for `layout` would occupy.
    fn placement(&self, layout: Layout) -> Option<(usize, usize)> {
        let start = self.aligned_offset(layout.align())?;
        let end = start.checked_add(layout.size())?;
        (end <= self.capacity()).then_some((start, end))
    }

    /// Returns true if `layout` fits in the remaining space.
    #[inline]
    #[must_use]
    pub fn fits(&self, layout: Layout) -> bool {
        self.placement(layout).is_some()
    }

    /// Bumps the offset past a fresh allocation for `layout`.
    ///
    /// Returns `None` without changing anything if it does not fit.
    #[inline]
    pub(crate) fn bump(&self, layout: Layout) -> Option<NonNull<u8>> {
        let (start, end) = self.placement(layout)?;
        self.offset.set(end);
        Some(self.region.at(start))
    }

    /// Resets the offset, invalidating all previous allocations.
    #[inline]
    pub(crate) fn reset(&self) {
        self.offset.set(0);
    }
}

impl Heap for LinearHeap {
    fn allocate(&self, layout: Layout) -> MemoryResult<NonNull<u8>> {
        self.bump(layout).ok_or_else(|| {
            tracing::error!(
                size = layout.size(),
                remaining = self.remaining(),
                "linear heap exhausted"
            );
            MemoryError::OutOfMemory {
                size: layout.size(),
                largest_free: self.remaining(),
            }
        })
    }

    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {
        // Reclaimed all at once by `free`.
    }

    fn free(&mut self) {
        self.reset();
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_allocation() {
        let heap = LinearHeap::new(1024).unwrap();
        let ptr = heap.allocate(Layout::new::<[f32; 10]>()).unwrap();
        assert_eq!(ptr.as_ptr() as usize % std::mem::align_of::<f32>(), 0);
        assert_eq!(heap.used(), 40);
    }

    #[test]
    fn test_linear_alignment_padding() {
        let heap = LinearHeap::new(64).unwrap();
        heap.allocate(Layout::from_size_align(3, 1).unwrap()).unwrap();
        let ptr = heap.allocate(Layout::new::<u64>()).unwrap();
        assert_eq!(ptr.as_ptr() as usize % 8, 0);
        assert_eq!(heap.used(), 16);
    }

    #[test]
    fn test_linear_exhaustion_leaves_offset() {
        let heap = LinearHeap::new(32).unwrap();
        heap.allocate(Layout::from_size_align(24, 1).unwrap()).unwrap();

        let result = heap.allocate(Layout::from_size_align(16, 1).unwrap());
        assert!(matches!(
            result,
            Err(MemoryError::OutOfMemory { size: 16, largest_free: 8 })
        ));
        assert_eq!(heap.used(), 24);
    }

    #[test]
    fn test_linear_free() {
        let mut heap = LinearHeap::new(1024).unwrap();
        heap.allocate(Layout::new::<[u8; 100]>()).unwrap();
        assert!(heap.current_memory() > 0);

        heap.free();
        assert_eq!(heap.current_memory(), 0);
        assert_eq!(heap.total_memory(), 1024);
    }
}
