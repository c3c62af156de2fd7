//! # Memory Tags
//!
//! A tag names a lifetime category. Every block of the tagged heap is either
//! unowned or owned by exactly one tag, and a whole category is reclaimed at
//! once when its owner reaches the end of its cycle (end of frame, end of a
//! geometry build, ...).
//!
//! The raw value `0` is reserved for "unowned" and can never be a [`Tag`].
//! Categories are zero-sized marker types implementing [`MemoryTag`], which
//! lets containers carry their tag in their type.

use std::fmt;
use std::num::NonZeroU32;

/// Identifier of a memory lifetime category. Never zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag(NonZeroU32);

impl Tag {
    /// Graphics-related memory (render items, GPU staging copies).
    pub const GRAPHICS: Self = Self::bit(0);
    /// File I/O buffers.
    pub const FILEIO: Self = Self::bit(1);
    /// General, process-global memory.
    pub const GLOBAL: Self = Self::bit(2);
    /// Staging memory.
    pub const STAGE: Self = Self::bit(3);
    /// Geometry construction.
    pub const GEOMETRY: Self = Self::bit(4);
    /// Per-frame memory, reclaimed at the end of every frame.
    pub const FRAME: Self = Self::bit(5);
    /// Resource pools.
    pub const RESOURCES: Self = Self::bit(6);

    /// Creates a tag from its raw value. Returns `None` for the reserved `0`.
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Option<Self> {
        match NonZeroU32::new(raw) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }

    /// Creates the tag `1 << n`.
    ///
    /// # Panics
    ///
    /// Panics if `n >= 32`.
    #[must_use]
    pub const fn bit(n: u32) -> Self {
        assert!(n < u32::BITS, "tag bit out of range");
        match NonZeroU32::new(1 << n) {
            Some(value) => Self(value),
            None => panic!("tag bit out of range"),
        }
    }

    /// Returns the raw tag value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// Returns the name of a built-in category, if this is one.
    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        match self.0.get() {
            0x01 => Some(Graphics::NAME),
            0x02 => Some(FileIo::NAME),
            0x04 => Some(Global::NAME),
            0x08 => Some(Stage::NAME),
            0x10 => Some(Geometry::NAME),
            0x20 => Some(Frame::NAME),
            0x40 => Some(Resources::NAME),
            _ => None,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name}({:#x})", self.get()),
            None => write!(f, "{:#x}", self.get()),
        }
    }
}

/// A memory category known at compile time.
pub trait MemoryTag: 'static {
    /// The tag allocations of this category are made under.
    const TAG: Tag;
    /// Human-readable category name, used in diagnostics.
    const NAME: &'static str;
}

macro_rules! memory_categories {
    ($($(#[$meta:meta])* $category:ident => $tag:expr, $name:literal;)*) => {
        $(
            $(#[$meta])*
            #[derive(Debug)]
            pub enum $category {}

            impl MemoryTag for $category {
                const TAG: Tag = $tag;
                const NAME: &'static str = $name;
            }
        )*
    };
}

memory_categories! {
    /// Graphics category.
    Graphics => Tag::GRAPHICS, "graphics";
    /// File I/O category.
    FileIo => Tag::FILEIO, "fileio";
    /// Global category; the default for types without their own tag.
    Global => Tag::GLOBAL, "global";
    /// Staging category.
    Stage => Tag::STAGE, "stage";
    /// Geometry-build category.
    Geometry => Tag::GEOMETRY, "geometry";
    /// Per-frame category.
    Frame => Tag::FRAME, "frame";
    /// Resource-pool category.
    Resources => Tag::RESOURCES, "resources";
}

/// Default-category policy for a type.
///
/// Types that live in a particular category implement this to let
/// [`tagged_new_default`](crate::owned::tagged_new_default) pick the tag.
/// Containers built on a tagged allocator report the category of their
/// allocator. Types with no natural category should use [`Global`].
pub trait HasMemoryTag {
    /// The category instances of this type are placed in by default.
    type Category: MemoryTag;

    /// Convenience accessor for the category tag.
    #[must_use]
    fn memory_tag() -> Tag {
        Self::Category::TAG
    }
}
