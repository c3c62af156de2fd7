//! # STRATA Memory
//!
//! Category-tagged arena memory for the engine's frame loop:
//! - Fixed pool of equally sized blocks, shared by every memory category
//! - Bump allocation inside a block, O(1) bulk reclaim per category
//! - Standard containers (`Vec`, `HashMap`, strings) bound to a category
//!
//! ## Architecture Rules
//!
//! 1. **All memory is acquired at startup** - heaps never grow
//! 2. **Every category has a reclaim point** - frame memory dies at
//!    `end_frame`, geometry memory when the build is done
//! 3. **Single-threaded** - heaps use interior mutability and are `!Sync`
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_memory::{DeferredVec, Frame, MemoryConfig, MemoryManager, RegionKind, TaggedAllocator};
//!
//! let config = MemoryConfig::load("config/memory.toml")?;
//! let mut memory = MemoryManager::new(&config)?;
//!
//! {
//!     let heap = memory.region(RegionKind::Persistent).tagged_heap();
//!     let mut draws: DeferredVec<'_, Frame, DrawCall> =
//!         DeferredVec::with_capacity_in(1024, TaggedAllocator::<Frame>::deferred(heap));
//!     // ... record draws ...
//! }
//! memory.end_frame();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod alloc;
pub mod collections;
pub mod config;
pub mod error;
pub mod heap;
pub mod manager;
pub mod owned;
pub mod size;
pub mod tags;

pub use alloc::{
    DeferredFree, DeferredTaggedAllocator, HeapAllocator, TaggedAllocator, TypedAllocator,
};
pub use collections::*;
pub use config::{MemoryConfig, RegionConfig};
pub use error::{MemoryError, MemoryResult};
pub use heap::{
    DoubleBufferedHeap, FreeListHeap, Heap, HeapBlock, LinearHeap, StackHeap, TaggedHeap, MAX_ALIGN,
};
pub use manager::{HeapUsage, MemoryManager, MemoryRegion, RegionKind, RegionUsage};
pub use owned::{global_new, tagged_new, tagged_new_default, GlobalOwned, Owned, TaggedOwned};
pub use size::MemorySize;
pub use tags::{
    FileIo, Frame, Geometry, Global, Graphics, HasMemoryTag, MemoryTag, Resources, Stage, Tag,
};
