//! # Memory Regions
//!
//! The process memory layout: three regions with the same set of heaps, and
//! one string pool shared by all of them.
//!
//! ```text
//! MemoryManager
//! ├── persistent ─┬─ global   FreeListHeap   long-lived objects
//! ├── staging     ├─ frame    LinearHeap     reset by end_frame()
//! ├── debug       ├─ tagged   TaggedHeap     category blocks
//! │               └─ scratch  FreeListHeap   short-lived working sets
//! └── string_pool FreeListHeap
//! ```
//!
//! Everything is acquired in [`MemoryManager::new`]; nothing grows later.

use std::fmt;

use crate::config::{MemoryConfig, RegionConfig};
use crate::error::MemoryResult;
use crate::heap::{FreeListHeap, Heap, LinearHeap, TaggedHeap};
use crate::tags::Tag;

/// Identifies one of the manager's regions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegionKind {
    /// Lives for the whole process.
    Persistent,
    /// Data being loaded or built.
    Staging,
    /// Tooling and diagnostics.
    Debug,
}

impl RegionKind {
    /// Every region, in construction order.
    pub const ALL: [Self; 3] = [Self::Persistent, Self::Staging, Self::Debug];

    /// Lowercase name, as used for the configuration tables.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Persistent => "persistent",
            Self::Staging => "staging",
            Self::Debug => "debug",
        }
    }
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bytes in use against bytes available for one heap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapUsage {
    /// Bytes currently handed out.
    pub current: usize,
    /// Total capacity in bytes.
    pub total: usize,
}

impl HeapUsage {
    fn of(heap: &impl Heap) -> Self {
        Self {
            current: heap.current_memory(),
            total: heap.total_memory(),
        }
    }
}

/// Usage snapshot of a whole region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegionUsage {
    /// General-purpose heap.
    pub global: HeapUsage,
    /// Frame heap.
    pub frame: HeapUsage,
    /// Tagged heap.
    pub tagged: HeapUsage,
    /// Scratch heap.
    pub scratch: HeapUsage,
}

impl RegionUsage {
    /// Sum over the region's heaps.
    #[must_use]
    pub fn combined(&self) -> HeapUsage {
        [self.global, self.frame, self.tagged, self.scratch]
            .iter()
            .fold(HeapUsage::default(), |acc, usage| HeapUsage {
                current: acc.current + usage.current,
                total: acc.total + usage.total,
            })
    }
}

/// One region's heaps.
pub struct MemoryRegion {
    kind: RegionKind,
    global: FreeListHeap,
    frame: LinearHeap,
    tagged: TaggedHeap,
    scratch: FreeListHeap,
}

impl MemoryRegion {
    /// Acquires every heap of the region.
    ///
    /// # Errors
    ///
    /// Fails if a size does not fit the address space or the system
    /// allocator refuses the backing memory.
    pub fn new(kind: RegionKind, config: &RegionConfig) -> MemoryResult<Self> {
        let region = Self {
            kind,
            global: FreeListHeap::new(config.global_heap_size.to_usize()?)?,
            frame: LinearHeap::new(config.frame_heap_size.to_usize()?)?,
            tagged: TaggedHeap::new(
                config.tagged_heap_block_size.to_usize()?,
                config.tagged_heap_block_count as usize,
            )?,
            scratch: FreeListHeap::new(config.scratch_heap_size.to_usize()?)?,
        };

        tracing::debug!(
            region = %kind,
            total = region.usage().combined().total,
            "memory region created"
        );

        Ok(region)
    }

    /// Which region this is.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> RegionKind {
        self.kind
    }

    /// General-purpose free-list heap.
    #[inline]
    #[must_use]
    pub fn global_heap(&self) -> &FreeListHeap {
        &self.global
    }

    /// Linear heap reset by [`MemoryRegion::end_frame`].
    #[inline]
    #[must_use]
    pub fn frame_heap(&self) -> &LinearHeap {
        &self.frame
    }

    /// Tagged heap.
    #[inline]
    #[must_use]
    pub fn tagged_heap(&self) -> &TaggedHeap {
        &self.tagged
    }

    /// Tagged heap, for bulk reclaim of a category.
    #[inline]
    pub fn tagged_heap_mut(&mut self) -> &mut TaggedHeap {
        &mut self.tagged
    }

    /// Scratch free-list heap.
    #[inline]
    #[must_use]
    pub fn scratch_heap(&self) -> &FreeListHeap {
        &self.scratch
    }

    /// Scratch heap, for a full reset.
    #[inline]
    pub fn scratch_heap_mut(&mut self) -> &mut FreeListHeap {
        &mut self.scratch
    }

    /// Frame boundary: resets the frame heap and reclaims the frame
    /// category of the tagged heap.
    pub fn end_frame(&mut self) {
        self.frame.free();
        let released = self.tagged.free_blocks(Tag::FRAME);
        tracing::trace!(region = %self.kind, released, "end of frame");
    }

    /// Reclaims every tagged block owned by `tag`, returning how many were
    /// released.
    pub fn free_tag(&mut self, tag: Tag) -> usize {
        self.tagged.free_blocks(tag)
    }

    /// Snapshot of the region's heap usage.
    #[must_use]
    pub fn usage(&self) -> RegionUsage {
        RegionUsage {
            global: HeapUsage::of(&self.global),
            frame: HeapUsage::of(&self.frame),
            tagged: HeapUsage {
                current: self.tagged.current_memory(),
                total: self.tagged.total_memory(),
            },
            scratch: HeapUsage::of(&self.scratch),
        }
    }
}

impl fmt::Debug for MemoryRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryRegion")
            .field("kind", &self.kind)
            .field("usage", &self.usage())
            .finish_non_exhaustive()
    }
}

/// Owner of every heap in the process.
///
/// # Example
///
/// ```rust,ignore
/// let config = MemoryConfig::load("config/memory.toml")?;
/// let mut memory = MemoryManager::new(&config)?;
///
/// loop {
///     let frame = memory.region(RegionKind::Persistent).frame_heap();
///     // ... frame work ...
///     memory.end_frame();
/// }
/// ```
pub struct MemoryManager {
    persistent: MemoryRegion,
    staging: MemoryRegion,
    debug: MemoryRegion,
    string_pool: FreeListHeap,
}

impl MemoryManager {
    /// Validates `config` and acquires every heap.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidConfig`](crate::MemoryError::InvalidConfig)
    /// for unusable sizes, or a backing allocation error.
    pub fn new(config: &MemoryConfig) -> MemoryResult<Self> {
        config.validate()?;

        let manager = Self {
            persistent: MemoryRegion::new(RegionKind::Persistent, &config.persistent)?,
            staging: MemoryRegion::new(RegionKind::Staging, &config.staging)?,
            debug: MemoryRegion::new(RegionKind::Debug, &config.debug)?,
            string_pool: FreeListHeap::new(config.string_pool_size.to_usize()?)?,
        };

        tracing::info!(total = %config.total(), "memory manager initialized");

        Ok(manager)
    }

    /// One region.
    #[must_use]
    pub fn region(&self, kind: RegionKind) -> &MemoryRegion {
        match kind {
            RegionKind::Persistent => &self.persistent,
            RegionKind::Staging => &self.staging,
            RegionKind::Debug => &self.debug,
        }
    }

    /// One region, mutably.
    pub fn region_mut(&mut self, kind: RegionKind) -> &mut MemoryRegion {
        match kind {
            RegionKind::Persistent => &mut self.persistent,
            RegionKind::Staging => &mut self.staging,
            RegionKind::Debug => &mut self.debug,
        }
    }

    /// Free-list heap backing [`PoolString`](crate::collections::PoolString).
    #[must_use]
    pub fn string_pool(&self) -> &FreeListHeap {
        &self.string_pool
    }

    /// Ends the frame in every region.
    pub fn end_frame(&mut self) {
        for kind in RegionKind::ALL {
            self.region_mut(kind).end_frame();
        }
    }

    /// Usage snapshot of the string pool.
    #[must_use]
    pub fn string_pool_usage(&self) -> HeapUsage {
        HeapUsage::of(&self.string_pool)
    }
}

impl fmt::Debug for MemoryManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryManager")
            .field("persistent", &self.persistent)
            .field("staging", &self.staging)
            .field("debug", &self.debug)
            .field("string_pool", &self.string_pool_usage())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::{HeapAllocator, TaggedAllocator};
    use crate::collections::{vec_in, PoolString, TempVec};
    use crate::size::MemorySize;
    use crate::tags::Geometry;

    fn small_region() -> RegionConfig {
        RegionConfig {
            global_heap_size: MemorySize::kibibytes(4),
            frame_heap_size: MemorySize::kibibytes(1),
            tagged_heap_block_size: MemorySize::kibibytes(1),
            tagged_heap_block_count: 4,
            scratch_heap_size: MemorySize::kibibytes(2),
        }
    }

    fn small_config() -> MemoryConfig {
        MemoryConfig {
            string_pool_size: MemorySize::kibibytes(2),
            persistent: small_region(),
            staging: small_region(),
            debug: small_region(),
        }
    }

    #[test]
    fn test_manager_sizes_follow_config() {
        let memory = MemoryManager::new(&small_config()).unwrap();
        for kind in RegionKind::ALL {
            let usage = memory.region(kind).usage();
            assert_eq!(memory.region(kind).kind(), kind);
            assert_eq!(usage.global.total, 4096);
            assert_eq!(usage.frame.total, 1024);
            assert_eq!(usage.tagged.total, 4096);
            assert_eq!(usage.scratch.total, 2048);
            assert_eq!(usage.combined().current, 0);
        }
        assert_eq!(memory.string_pool_usage().total, 2048);
    }

    #[test]
    fn test_end_frame_resets_frame_memory_only() {
        let mut memory = MemoryManager::new(&small_config()).unwrap();
        {
            let region = memory.region(RegionKind::Staging);
            let mut temp: TempVec<'_, u32> = vec_in(HeapAllocator::new(region.frame_heap()));
            temp.extend(0..16);

            assert!(region.tagged_heap().allocate(Tag::FRAME, 100).is_ok());
            assert!(region.tagged_heap().allocate(Tag::GEOMETRY, 100).is_ok());
        }

        memory.end_frame();

        let region = memory.region(RegionKind::Staging);
        assert_eq!(region.usage().frame.current, 0);
        assert_eq!(region.tagged_heap().blocks_owned_by(Tag::FRAME), 0);
        assert_eq!(region.tagged_heap().blocks_owned_by(Tag::GEOMETRY), 1);
    }

    #[test]
    fn test_free_tag_after_geometry_build() {
        let mut memory = MemoryManager::new(&small_config()).unwrap();
        {
            let heap = memory.region(RegionKind::Persistent).tagged_heap();
            let verts = TaggedAllocator::<Geometry>::deferred(heap);
            let mut positions = vec_in::<[f32; 3], _>(verts);
            positions.extend([[0.0; 3]; 20]);
            assert_eq!(heap.blocks_owned_by(Tag::GEOMETRY), 1);
        }

        let released = memory.region_mut(RegionKind::Persistent).free_tag(Tag::GEOMETRY);
        assert_eq!(released, 1);
        assert_eq!(memory.region(RegionKind::Persistent).usage().tagged.current, 0);
    }

    #[test]
    fn test_string_pool_serves_pool_strings() {
        let memory = MemoryManager::new(&small_config()).unwrap();
        let mut name = PoolString::from_str_in("mesh", HeapAllocator::new(memory.string_pool()));
        name.push_str("_lod0");
        assert_eq!(name, "mesh_lod0");
        assert!(memory.string_pool_usage().current > 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = small_config();
        config.debug.tagged_heap_block_count = 0;
        assert!(MemoryManager::new(&config).is_err());
    }
}
