//! # Double-Buffered Heap
//!
//! Two linear heaps used in turn. Freeing flips to the other buffer and
//! clears it, so whatever was written during the previous frame is still
//! readable for exactly one more frame.
//!
//! ```text
//!  frame N:    [active: writes ........ ]  [previous: frame N-1 data]
//!  free()
//!  frame N+1:  [previous: frame N data  ]  [active: cleared ........]
//! ```

use std::alloc::Layout;
use std::ptr::NonNull;

use super::{Heap, LinearHeap};
use crate::error::MemoryResult;

/// Pair of [`LinearHeap`]s swapped at every [`Heap::free`].
///
/// # Thread Safety
///
/// NOT thread-safe. The heap is `!Sync`; confine it to one thread.
///
/// # Example
///
/// ```rust,ignore
/// let mut history = DoubleBufferedHeap::new(256 * 1024)?;
///
/// let visible = history.allocate(Layout::new::<[u32; 1024]>())?;
/// // ... fill with this frame's visibility results ...
///
/// history.free(); // `visible` stays readable until the next free
/// ```
pub struct DoubleBufferedHeap {
    buffers: [LinearHeap; 2],
    /// Index of the buffer serving allocations.
    active: usize,
}

impl DoubleBufferedHeap {
    /// Creates two buffers of `size` bytes each.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing memory cannot be acquired.
    pub fn new(size: usize) -> MemoryResult<Self> {
        Ok(Self {
            buffers: [LinearHeap::new(size)?, LinearHeap::new(size)?],
            active: 0,
        })
    }

    /// Index (0 or 1) of the buffer serving allocations.
    #[inline]
    #[must_use]
    pub fn active_index(&self) -> usize {
        self.active
    }

    /// The buffer serving allocations.
    #[inline]
    #[must_use]
    pub fn active(&self) -> &LinearHeap {
        &self.buffers[self.active]
    }

    /// The buffer holding the previous frame's data.
    #[inline]
    #[must_use]
    pub fn previous(&self) -> &LinearHeap {
        &self.buffers[1 - self.active]
    }

    /// Flips to the other buffer and clears it.
    pub fn present(&mut self) {
        self.active = 1 - self.active;
        self.buffers[self.active].reset();
        tracing::trace!(active = self.active, "double-buffered heap presented");
    }

    /// Clears both buffers.
    pub fn reset_all(&mut self) {
        for buffer in &self.buffers {
            buffer.reset();
        }
    }
}

impl Heap for DoubleBufferedHeap {
    fn allocate(&self, layout: Layout) -> MemoryResult<NonNull<u8>> {
        self.active().allocate(layout)
    }

    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {
        // Buffers are cleared whole by `present`.
    }

    fn free(&mut self) {
        self.present();
    }

    fn can_alloc(&self, layout: Layout) -> bool {
        self.active().fits(layout)
    }

    fn total_memory(&self) -> usize {
        self.buffers.iter().map(LinearHeap::capacity).sum()
    }

    fn current_memory(&self) -> usize {
        self.buffers.iter().map(LinearHeap::used).sum()
    }
}
