//! # Tagged Heap
//!
//! A fixed pool of equally sized blocks shared by every memory category.
//!
//! ## Allocation
//!
//! Blocks are scanned in index order. The first block that is unowned or
//! already owned by the requesting tag, and that still has room, serves the
//! request. There is no growth: when no block qualifies the request fails
//! with [`MemoryError::OutOfCapacity`].
//!
//! ## Reclamation
//!
//! Memory is never released per object. Releasing anything under a tag
//! resets *every* block owned by that tag:
//!
//! - [`TaggedHeap::free_blocks`] is the normal end-of-cycle entry point. It
//!   takes `&mut self`, so the borrow checker guarantees nothing still points
//!   into the heap.
//! - [`TaggedHeap::deallocate`] is what allocators call. It ignores the
//!   pointer it is given and reclaims the whole tag, which is why it is
//!   `unsafe`.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::ptr::NonNull;

use bytemuck::Pod;

use super::{HeapBlock, MAX_ALIGN};
use crate::error::{MemoryError, MemoryResult};
use crate::tags::Tag;

/// Pool of [`HeapBlock`]s partitioned among memory tags.
///
/// # Thread Safety
///
/// NOT thread-safe. The heap is `!Sync`; confine it to one thread.
///
/// # Example
///
/// ```rust,ignore
/// let mut heap = TaggedHeap::new(500 * 1000, 15)?;
///
/// let vertices = heap.alloc_slice::<[f32; 3]>(Tag::GEOMETRY, 1024)?;
/// // ... build geometry ...
///
/// // End of the build: reclaim the whole category
/// heap.free_blocks(Tag::GEOMETRY);
/// ```
pub struct TaggedHeap {
    /// The blocks, in scan order.
    blocks: Vec<HeapBlock>,
    /// Capacity of each block.
    block_size: usize,
}

impl TaggedHeap {
    /// Creates a heap of `block_count` blocks of `block_size` bytes each.
    ///
    /// A zero size or count yields a heap with no blocks, on which every
    /// allocation fails with [`MemoryError::NoBlocks`].
    ///
    /// # Errors
    ///
    /// Returns an error if the backing memory cannot be acquired.
    pub fn new(block_size: usize, block_count: usize) -> MemoryResult<Self> {
        let blocks = if block_size > 0 && block_count > 0 {
            (0..block_count)
                .map(|_| HeapBlock::new(block_size))
                .collect::<MemoryResult<Vec<_>>>()?
        } else {
            Vec::new()
        };

        tracing::debug!(block_size, block_count = blocks.len(), "tagged heap created");

        Ok(Self { blocks, block_size })
    }

    /// Allocates `size` bytes under `tag`.
    ///
    /// The returned pointer sits exactly at the serving block's previous
    /// offset; no alignment is applied. Use [`TaggedHeap::allocate_layout`]
    /// for typed memory.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::NoBlocks`] if the heap has no blocks
    /// - [`MemoryError::RequestTooLarge`] if `size` exceeds one block
    /// - [`MemoryError::OutOfCapacity`] if no block can take the request
    pub fn allocate(&self, tag: Tag, size: usize) -> MemoryResult<NonNull<u8>> {
        let layout = Layout::from_size_align(size, 1)
            .map_err(|_| MemoryError::InvalidLayout { size, align: 1 })?;
        self.allocate_layout(tag, layout)
    }

    /// Allocates memory for `layout` under `tag`.
    ///
    /// # Errors
    ///
    /// Same as [`TaggedHeap::allocate`]. Any power-of-two alignment is
    /// accepted; a request is too large when it cannot fit an empty block
    /// even after alignment padding.
    pub fn allocate_layout(&self, tag: Tag, layout: Layout) -> MemoryResult<NonNull<u8>> {
        if self.blocks.is_empty() {
            return Err(MemoryError::NoBlocks);
        }
        if Self::worst_case_footprint(layout).map_or(true, |needed| needed > self.block_size) {
            return Err(MemoryError::RequestTooLarge {
                size: layout.size(),
                block_size: self.block_size,
            });
        }

        let served = self
            .blocks
            .iter()
            .find_map(|block| block.allocate_layout(tag, layout));

        served.ok_or_else(|| {
            tracing::error!(%tag, size = layout.size(), "tagged heap out of capacity");
            MemoryError::OutOfCapacity {
                tag,
                size: layout.size(),
            }
        })
    }

    /// Bytes `layout` can occupy in an empty block. Block bases are
    /// [`MAX_ALIGN`]-aligned, so only stronger alignments can add padding.
    fn worst_case_footprint(layout: Layout) -> Option<usize> {
        layout
            .size()
            .checked_add(layout.align().saturating_sub(MAX_ALIGN))
    }

    /// Allocates a zeroed slice of `count` plain-old-data values under `tag`.
    ///
    /// The slice stays borrowed from the heap, so the safe reclaim paths
    /// ([`TaggedHeap::free_blocks`], [`TaggedHeap::free`]) cannot run while
    /// it is alive.
    ///
    /// # Errors
    ///
    /// Same as [`TaggedHeap::allocate_layout`].
    #[allow(clippy::mut_from_ref)] // every call hands out a fresh, disjoint range
    pub fn alloc_slice<T: Pod>(&self, tag: Tag, count: usize) -> MemoryResult<&mut [T]> {
        let layout = Layout::array::<T>(count).map_err(|_| MemoryError::InvalidLayout {
            size: count.saturating_mul(std::mem::size_of::<T>()),
            align: std::mem::align_of::<T>(),
        })?;
        if layout.size() == 0 {
            return Ok(&mut []);
        }

        let ptr = self.allocate_layout(tag, layout)?;

        // SAFETY: the range is freshly bumped, exclusive to this call and
        // `layout.size()` bytes long. Zeroing makes it initialized.
        let bytes = unsafe {
            std::ptr::write_bytes(ptr.as_ptr(), 0, layout.size());
            std::slice::from_raw_parts_mut(ptr.as_ptr(), layout.size())
        };

        bytemuck::try_cast_slice_mut(bytes).map_err(|_| MemoryError::InvalidLayout {
            size: layout.size(),
            align: layout.align(),
        })
    }

    /// Reclaims every block owned by `tag`. The pointer is ignored.
    ///
    /// This is the allocator-facing form of [`TaggedHeap::free_blocks`]: a
    /// bulk operation disguised as a per-pointer call. A tag that owns no
    /// block is a no-op.
    ///
    /// # Safety
    ///
    /// After this call every allocation ever made under `tag` on this heap is
    /// invalid. The caller must guarantee that none of them is used again,
    /// including memory still held by containers of the same category.
    pub unsafe fn deallocate(&self, tag: Tag, _ptr: NonNull<u8>) {
        self.release(tag);
    }

    /// Reclaims every block owned by `tag`, returning how many were reset.
    ///
    /// Blocks owned by other tags are untouched. Freeing a tag that owns
    /// nothing is a no-op.
    pub fn free_blocks(&mut self, tag: Tag) -> usize {
        self.release(tag)
    }

    fn release(&self, tag: Tag) -> usize {
        let mut released = 0;
        for block in self.blocks.iter().filter(|block| block.tag() == Some(tag)) {
            block.reset();
            released += 1;
        }

        tracing::trace!(%tag, released, "tagged blocks reclaimed");
        released
    }

    /// Resets and releases every block regardless of tag.
    ///
    /// The heap has no blocks afterwards.
    pub fn free(&mut self) {
        for block in &mut self.blocks {
            block.free();
        }
        self.blocks.clear();
        tracing::debug!("tagged heap released");
    }

    /// Returns true if some block (of any owner) has room for `size` bytes.
    #[must_use]
    pub fn can_alloc(&self, size: usize) -> bool {
        self.blocks.iter().any(|block| block.can_alloc(size))
    }

    /// Returns true if an allocation of `size` bytes under `tag` would succeed.
    #[must_use]
    pub fn can_alloc_tagged(&self, tag: Tag, size: usize) -> bool {
        self.blocks
            .iter()
            .any(|block| block.accepts(tag) && block.can_alloc(size))
    }

    /// Bytes in use across all blocks.
    #[must_use]
    pub fn current_memory(&self) -> usize {
        self.blocks.iter().map(HeapBlock::current_size).sum()
    }

    /// Total capacity across all blocks.
    #[must_use]
    pub fn total_memory(&self) -> usize {
        self.blocks.len() * self.block_size
    }

    /// Number of blocks.
    #[inline]
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Capacity of one block, or 0 once the heap has been freed.
    #[inline]
    #[must_use]
    pub fn block_size(&self) -> usize {
        if self.blocks.is_empty() {
            0
        } else {
            self.block_size
        }
    }

    /// Owner of block `index`; `None` if unowned or out of range.
    #[must_use]
    pub fn block_tag(&self, index: usize) -> Option<Tag> {
        self.blocks.get(index).and_then(HeapBlock::tag)
    }

    /// Bytes used in block `index`; 0 if out of range.
    #[must_use]
    pub fn block_current_size(&self, index: usize) -> usize {
        self.blocks.get(index).map_or(0, HeapBlock::current_size)
    }

    /// Capacity of block `index`; 0 if out of range.
    #[must_use]
    pub fn block_total_size(&self, index: usize) -> usize {
        self.blocks.get(index).map_or(0, HeapBlock::total_size)
    }

    /// Direct access to a block for diagnostics.
    #[must_use]
    pub fn block(&self, index: usize) -> Option<&HeapBlock> {
        self.blocks.get(index)
    }

    /// Number of blocks currently owned by `tag`.
    #[must_use]
    pub fn blocks_owned_by(&self, tag: Tag) -> usize {
        self.blocks
            .iter()
            .filter(|block| block.tag() == Some(tag))
            .count()
    }
}

impl Drop for TaggedHeap {
    fn drop(&mut self) {
        self.free();
    }
}

impl std::fmt::Debug for TaggedHeap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaggedHeap")
            .field("block_size", &self.block_size)
            .field("block_count", &self.blocks.len())
            .field("current_memory", &self.current_memory())
            .finish()
    }
}
