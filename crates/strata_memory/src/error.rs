//! # Memory Error Types
//!
//! All errors that can occur in the memory subsystem.

use thiserror::Error;

use crate::tags::Tag;

/// Errors that can occur in the memory subsystem.
#[derive(Error, Debug)]
pub enum MemoryError {
    /// No block in the tagged heap accepts the tag with enough room left.
    ///
    /// This is the fatal condition of the tagged heap: the pool never grows.
    #[error("out of capacity: no block can hold {size} bytes for tag {tag}")]
    OutOfCapacity {
        /// The tag the request was made under.
        tag: Tag,
        /// Requested size in bytes.
        size: usize,
    },

    /// A single request is larger than one whole block.
    #[error("request of {size} bytes exceeds the block size of {block_size} bytes")]
    RequestTooLarge {
        /// Requested size in bytes.
        size: usize,
        /// Configured block size in bytes.
        block_size: usize,
    },

    /// The tagged heap has no blocks (never configured, or already freed).
    #[error("tagged heap has no blocks to allocate from")]
    NoBlocks,

    /// No free range in a free-list or linear heap can serve the request.
    #[error("out of memory: cannot serve {size} bytes (largest free range {largest_free} bytes)")]
    OutOfMemory {
        /// Requested size in bytes.
        size: usize,
        /// Largest contiguous range still available.
        largest_free: usize,
    },

    /// The requested alignment is stricter than the heap can guarantee.
    #[error("alignment {align} exceeds the supported maximum of {max}")]
    UnsupportedAlignment {
        /// Requested alignment.
        align: usize,
        /// Maximum alignment the heap supports.
        max: usize,
    },

    /// An allocator adapter refused a request (the underlying heap error is
    /// logged where it occurred).
    #[error("allocation of {size} bytes aligned to {align} failed")]
    AllocationFailed {
        /// Requested size in bytes.
        size: usize,
        /// Requested alignment.
        align: usize,
    },

    /// Size and alignment do not form a valid layout.
    #[error("invalid layout: {size} bytes aligned to {align}")]
    InvalidLayout {
        /// Requested size in bytes.
        size: usize,
        /// Requested alignment.
        align: usize,
    },

    /// The system allocator refused to provide backing memory at startup.
    #[error("backing allocation of {size} bytes failed")]
    BackingAllocationFailed {
        /// Requested backing size in bytes.
        size: usize,
    },

    /// A memory size string could not be parsed.
    #[error("invalid memory size: {0}")]
    InvalidSize(String),

    /// Invalid configuration values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configuration file is not valid TOML for this schema.
    #[error("failed to parse memory configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The configuration file could not be read.
    #[error("failed to read memory configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for memory operations.
pub type MemoryResult<T> = Result<T, MemoryError>;
