//! Backing memory acquired from the system allocator once, at startup.

// Owns memory obtained directly from the system allocator.
#![allow(unsafe_code)]

use std::alloc::{alloc, dealloc, Layout};
use std::ptr::NonNull;

use crate::error::{MemoryError, MemoryResult};

/// Alignment of every backing region, and the strongest alignment the
/// free-list heap hands out.
pub const MAX_ALIGN: usize = 16;

/// An owned, fixed-size byte region aligned to [`MAX_ALIGN`].
///
/// The bytes are never touched by the region itself; the heaps built on top
/// decide what lives where.
pub(crate) struct RawRegion {
    ptr: NonNull<u8>,
    layout: Layout,
    size: usize,
}

impl RawRegion {
    /// Acquires `size` bytes from the system allocator.
    pub(crate) fn new(size: usize) -> MemoryResult<Self> {
        let layout = Layout::from_size_align(size.max(1), MAX_ALIGN).map_err(|_| {
            MemoryError::InvalidLayout {
                size,
                align: MAX_ALIGN,
            }
        })?;

        // SAFETY: layout has a non-zero size.
        let raw = unsafe { alloc(layout) };
        let ptr = NonNull::new(raw).ok_or(MemoryError::BackingAllocationFailed { size })?;

        Ok(Self { ptr, layout, size })
    }

    /// Base address of the region.
    #[inline]
    pub(crate) fn base(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Usable size in bytes.
    #[inline]
    pub(crate) fn size(&self) -> usize {
        self.size
    }

    /// Address of the byte at `offset`. `offset` may equal `size()`.
    #[inline]
    pub(crate) fn at(&self, offset: usize) -> NonNull<u8> {
        debug_assert!(offset <= self.size);
        // SAFETY: offset stays within (or one past) the allocation.
        unsafe { NonNull::new_unchecked(self.ptr.as_ptr().add(offset)) }
    }

    /// Returns the offset of `ptr` if it points into this region.
    #[inline]
    pub(crate) fn offset_of(&self, ptr: NonNull<u8>) -> Option<usize> {
        let base = self.ptr.as_ptr() as usize;
        let addr = ptr.as_ptr() as usize;
        (addr >= base && addr < base + self.size).then(|| addr - base)
    }
}

impl Drop for RawRegion {
    fn drop(&mut self) {
        // SAFETY: allocated in `new` with this exact layout.
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_alignment_and_offsets() {
        let region = RawRegion::new(128).unwrap();
        assert_eq!(region.base().as_ptr() as usize % MAX_ALIGN, 0);
        assert_eq!(region.size(), 128);

        let p = region.at(32);
        assert_eq!(region.offset_of(p), Some(32));
        assert_eq!(region.offset_of(region.at(128)), None);
    }
}
