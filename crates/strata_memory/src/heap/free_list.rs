//! # Free-List Heap
//!
//! Variable-size allocator for long-lived, individually released memory
//! (interned strings, scratch buffers, untagged global objects).
//!
//! ## Layout
//!
//! ```text
//!  region: [hdr|payload....][hdr|payload..][ free ........ ][hdr|payload]
//!           ^ 16 bytes: granted size + check word
//! ```
//!
//! - First-fit over free ranges kept in address order
//! - A range is split when the remainder can still hold a header
//! - Released ranges coalesce with free neighbours of the same region

// Headers are read and written in place inside the backing regions.
#![allow(unsafe_code)]

use std::alloc::Layout;
use std::cell::RefCell;
use std::ptr::NonNull;

use super::{Heap, RawRegion, MAX_ALIGN};
use crate::error::{MemoryError, MemoryResult};

/// Bytes reserved in front of every allocation.
const HEADER_SIZE: usize = MAX_ALIGN;

/// Mixed into the header's second word to catch foreign pointers in debug builds.
const HEADER_CHECK: usize = 0x5eed_f00d;

/// A free byte range inside one backing region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct FreeRange {
    region: usize,
    offset: usize,
    size: usize,
}

impl FreeRange {
    #[inline]
    fn end(&self) -> usize {
        self.offset + self.size
    }

    #[inline]
    fn key(&self) -> (usize, usize) {
        (self.region, self.offset)
    }
}

/// First-fit free-list heap over one or more donated regions.
///
/// # Thread Safety
///
/// NOT thread-safe. The heap is `!Sync`; confine it to one thread.
///
/// # Example
///
/// ```rust,ignore
/// let scratch = FreeListHeap::new(10 * 1000 * 1000)?; // 10MB
///
/// let buffer = scratch.allocate_bytes(4096)?;
/// // ... use buffer ...
/// unsafe { scratch.deallocate_bytes(buffer) };
/// ```
pub struct FreeListHeap {
    /// Backing regions, in donation order.
    regions: Vec<RawRegion>,
    /// Free ranges, sorted by (region, offset).
    free_list: RefCell<Vec<FreeRange>>,
    /// Usable bytes across all regions.
    total: usize,
}

impl FreeListHeap {
    /// Creates a heap backed by one region of `size` bytes.
    ///
    /// A zero size creates a heap without regions; donate memory with
    /// [`FreeListHeap::add_region`].
    ///
    /// # Errors
    ///
    /// Returns an error if the backing memory cannot be acquired.
    pub fn new(size: usize) -> MemoryResult<Self> {
        let mut heap = Self {
            regions: Vec::new(),
            free_list: RefCell::new(Vec::new()),
            total: 0,
        };
        if size > 0 {
            heap.add_region(size)?;
        }
        Ok(heap)
    }

    /// Donates another backing region of `size` bytes.
    ///
    /// Ranges of different regions never coalesce.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing memory cannot be acquired.
    pub fn add_region(&mut self, size: usize) -> MemoryResult<()> {
        let region = RawRegion::new(size)?;
        let usable = size - size % MAX_ALIGN;

        self.free_list.get_mut().push(FreeRange {
            region: self.regions.len(),
            offset: 0,
            size: usable,
        });
        self.regions.push(region);
        self.total += usable;

        tracing::debug!(size = usable, regions = self.regions.len(), "free-list region donated");
        Ok(())
    }

    /// Number of backing regions.
    #[inline]
    #[must_use]
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Number of disjoint free ranges.
    #[must_use]
    pub fn free_range_count(&self) -> usize {
        self.free_list.borrow().len()
    }

    /// Largest payload a single allocation could currently receive.
    #[must_use]
    pub fn largest_free_range(&self) -> usize {
        self.free_list
            .borrow()
            .iter()
            .map(|range| range.size.saturating_sub(HEADER_SIZE))
            .max()
            .unwrap_or(0)
    }

    /// Allocates `size` bytes aligned to [`MAX_ALIGN`].
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfMemory`] if no free range is large enough.
    pub fn allocate_bytes(&self, size: usize) -> MemoryResult<NonNull<u8>> {
        let layout = Layout::from_size_align(size, MAX_ALIGN)
            .map_err(|_| MemoryError::InvalidLayout { size, align: MAX_ALIGN })?;
        self.allocate(layout)
    }

    /// Returns an allocation to the free list at the size it was issued.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by this heap and not released since.
    pub unsafe fn deallocate_bytes(&self, ptr: NonNull<u8>) {
        // SAFETY: forwarded caller contract; the layout is not consulted.
        unsafe { self.release(ptr) }
    }

    /// Full range size (header included) for a payload of `size` bytes.
    fn range_size_for(size: usize) -> Option<usize> {
        let payload = size.max(1).checked_add(MAX_ALIGN - 1)? & !(MAX_ALIGN - 1);
        payload.checked_add(HEADER_SIZE)
    }

    /// Locates the region and offset of a range start.
    fn locate(&self, start: NonNull<u8>) -> Option<(usize, usize)> {
        self.regions
            .iter()
            .enumerate()
            .find_map(|(index, region)| region.offset_of(start).map(|offset| (index, offset)))
    }

    unsafe fn release(&self, ptr: NonNull<u8>) {
        // SAFETY: every payload is preceded by its header inside the region.
        let start = unsafe { NonNull::new_unchecked(ptr.as_ptr().sub(HEADER_SIZE)) };
        let header = start.as_ptr().cast::<usize>();
        // SAFETY: the header was written by `allocate` and is 16-aligned.
        let (size, check) = unsafe { (header.read(), header.add(1).read()) };
        debug_assert_eq!(check, HEADER_CHECK ^ size, "pointer was not issued by this heap");

        let Some((region, offset)) = self.locate(start) else {
            debug_assert!(false, "pointer outside every region");
            return;
        };

        self.insert_and_coalesce(FreeRange { region, offset, size });
    }

    fn insert_and_coalesce(&self, range: FreeRange) {
        let mut free = self.free_list.borrow_mut();

        let mut index = free.partition_point(|r| r.key() < range.key());
        free.insert(index, range);

        if index + 1 < free.len() {
            let next = free[index + 1];
            if next.region == range.region && free[index].end() == next.offset {
                free[index].size += next.size;
                free.remove(index + 1);
            }
        }

        if index > 0 {
            let prev = free[index - 1];
            if prev.region == range.region && prev.end() == free[index].offset {
                free[index - 1].size += free[index].size;
                free.remove(index);
                index -= 1;
            }
        }

        tracing::trace!(
            offset = free[index].offset,
            size = free[index].size,
            ranges = free.len(),
            "free-list range returned"
        );
    }
}

impl Heap for FreeListHeap {
    fn allocate(&self, layout: Layout) -> MemoryResult<NonNull<u8>> {
        if layout.align() > MAX_ALIGN {
            return Err(MemoryError::UnsupportedAlignment {
                align: layout.align(),
                max: MAX_ALIGN,
            });
        }
        let needed = Self::range_size_for(layout.size()).ok_or(MemoryError::InvalidLayout {
            size: layout.size(),
            align: layout.align(),
        })?;

        let mut free = self.free_list.borrow_mut();
        let Some(index) = free.iter().position(|range| range.size >= needed) else {
            drop(free);
            let largest_free = self.largest_free_range();
            tracing::error!(size = layout.size(), largest_free, "free-list heap exhausted");
            return Err(MemoryError::OutOfMemory {
                size: layout.size(),
                largest_free,
            });
        };

        let range = free[index];
        let granted = if range.size - needed > HEADER_SIZE {
            free[index] = FreeRange {
                offset: range.offset + needed,
                size: range.size - needed,
                ..range
            };
            needed
        } else {
            free.remove(index);
            range.size
        };
        drop(free);

        let start = self.regions[range.region].at(range.offset);
        let header = start.as_ptr().cast::<usize>();

        // SAFETY: `start` is 16-aligned, inside the region, and the range is
        // at least HEADER_SIZE + MAX_ALIGN bytes long.
        unsafe {
            header.write(granted);
            header.add(1).write(HEADER_CHECK ^ granted);
            Ok(NonNull::new_unchecked(start.as_ptr().add(HEADER_SIZE)))
        }
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, _layout: Layout) {
        // SAFETY: forwarded caller contract.
        unsafe { self.release(ptr) }
    }

    fn free(&mut self) {
        let free = self.free_list.get_mut();
        free.clear();
        free.extend(self.regions.iter().enumerate().map(|(region, raw)| FreeRange {
            region,
            offset: 0,
            size: raw.size() - raw.size() % MAX_ALIGN,
        }));
    }

    fn can_alloc(&self, layout: Layout) -> bool {
        layout.align() <= MAX_ALIGN
            && Self::range_size_for(layout.size()).is_some_and(|needed| {
                self.free_list.borrow().iter().any(|range| range.size >= needed)
            })
    }

    fn total_memory(&self) -> usize {
        self.total
    }

    fn current_memory(&self) -> usize {
        let free: usize = self.free_list.borrow().iter().map(|range| range.size).sum();
        self.total - free
    }
}
