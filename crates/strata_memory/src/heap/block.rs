//! # Heap Block
//!
//! One fixed-capacity block of the tagged heap: a bump offset plus the tag
//! that currently owns it.

use std::alloc::Layout;
use std::cell::Cell;
use std::ptr::NonNull;

use super::LinearHeap;
use crate::error::MemoryResult;
use crate::tags::Tag;

/// A fixed-capacity block owned by at most one tag at a time.
///
/// An unowned block is claimed by the first tag that allocates from it and
/// stays with that tag until it is freed. Freeing resets the offset and
/// releases ownership; nothing else is notified.
pub struct HeapBlock {
    /// Owning tag, `None` while the block is free for any tag.
    tag: Cell<Option<Tag>>,
    /// Bump state over the block's bytes.
    linear: LinearHeap,
}

impl HeapBlock {
    /// Creates an unowned block of `capacity` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing memory cannot be acquired.
    pub fn new(capacity: usize) -> MemoryResult<Self> {
        Ok(Self {
            tag: Cell::new(None),
            linear: LinearHeap::new(capacity)?,
        })
    }

    /// Returns the owning tag, or `None` if the block is unowned.
    #[inline]
    #[must_use]
    pub fn tag(&self) -> Option<Tag> {
        self.tag.get()
    }

    /// Returns true if the block is unowned or owned by `tag`.
    #[inline]
    #[must_use]
    pub fn accepts(&self, tag: Tag) -> bool {
        self.tag.get().map_or(true, |owner| owner == tag)
    }

    /// Returns true if `size` more bytes fit in the block.
    #[inline]
    #[must_use]
    pub fn can_alloc(&self, size: usize) -> bool {
        Layout::from_size_align(size, 1).is_ok_and(|layout| self.linear.fits(layout))
    }

    /// Returns true if an allocation for `layout` fits in the block.
    #[inline]
    #[must_use]
    pub fn can_alloc_layout(&self, layout: Layout) -> bool {
        self.linear.fits(layout)
    }

    /// Allocates `size` bytes for `tag` at the current offset.
    ///
    /// Returns `None` if the block belongs to another tag or is too full.
    pub fn allocate(&self, tag: Tag, size: usize) -> Option<NonNull<u8>> {
        let layout = Layout::from_size_align(size, 1).ok()?;
        self.allocate_layout(tag, layout)
    }

    /// Allocates for `layout` on behalf of `tag`, claiming the block if it
    /// was unowned.
    pub fn allocate_layout(&self, tag: Tag, layout: Layout) -> Option<NonNull<u8>> {
        if !self.accepts(tag) {
            return None;
        }

        let ptr = self.linear.bump(layout)?;
        self.tag.set(Some(tag));
        Some(ptr)
    }

    /// Bytes used so far.
    #[inline]
    #[must_use]
    pub fn current_size(&self) -> usize {
        self.linear.used()
    }

    /// Capacity of the block in bytes.
    #[inline]
    #[must_use]
    pub fn total_size(&self) -> usize {
        self.linear.capacity()
    }

    /// Resets the block to unowned and empty.
    pub fn free(&mut self) {
        self.reset();
    }

    /// Shared-reference reset used by the tagged heap's bulk release.
    ///
    /// Every pointer previously issued from this block becomes dangling.
    #[inline]
    pub(crate) fn reset(&self) {
        self.tag.set(None);
        self.linear.reset();
    }
}
