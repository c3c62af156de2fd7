//! # Tagged Containers
//!
//! Standard containers bound to the crate's allocators.
//!
//! Every memory category gets a vector, map, string and string-stream alias
//! (`FrameVec`, `GeometryMap`, `StageString`, ...). They are plain
//! [`allocator_api2::vec::Vec`] and [`hashbrown::HashMap`] instantiations, so
//! the full container API is available.
//!
//! ## Releasing
//!
//! A container over a [`TaggedAllocator`] reclaims its whole category when
//! it releases storage, including on drop and on hash map rehash. Size maps
//! with `with_capacity_in` up front, and retire all containers of a category
//! together. Containers over a [`DeferredTaggedAllocator`] never release;
//! the category is reclaimed by
//! [`TaggedHeap::free_blocks`](crate::heap::TaggedHeap::free_blocks).

mod string;

use allocator_api2::alloc::Allocator;
use allocator_api2::vec::Vec;
use hashbrown::hash_map::DefaultHashBuilder;
use hashbrown::HashMap;

pub use string::{ArenaString, ArenaStringStream};

use crate::alloc::{DeferredTaggedAllocator, HeapAllocator, TaggedAllocator};
use crate::heap::{FreeListHeap, LinearHeap};
use crate::tags::{HasMemoryTag, MemoryTag};

/// Vector allocating under category `C`.
pub type TaggedVec<'h, C, T> = Vec<T, TaggedAllocator<'h, C>>;

/// Hash map allocating under category `C`.
pub type TaggedMap<'h, C, K, V> = HashMap<K, V, DefaultHashBuilder, TaggedAllocator<'h, C>>;

/// String allocating under category `C`.
pub type TaggedString<'h, C> = ArenaString<TaggedAllocator<'h, C>>;

/// String stream allocating under category `C`.
pub type TaggedStringStream<'h, C> = ArenaStringStream<TaggedAllocator<'h, C>>;

/// Vector under category `C` that never releases on its own.
pub type DeferredVec<'h, C, T> = Vec<T, DeferredTaggedAllocator<'h, C>>;

/// String on the general-purpose string pool.
pub type PoolString<'h> = ArenaString<HeapAllocator<'h, FreeListHeap>>;

/// String stream on the general-purpose string pool.
pub type PoolStringStream<'h> = ArenaStringStream<HeapAllocator<'h, FreeListHeap>>;

/// Vector on a region's scratch heap.
pub type ScratchVec<'h, T> = Vec<T, HeapAllocator<'h, FreeListHeap>>;

/// Vector on a region's frame heap, valid until the frame is reset.
pub type TempVec<'h, T> = Vec<T, HeapAllocator<'h, LinearHeap>>;

macro_rules! category_containers {
    ($($category:ident => $vec:ident, $map:ident, $string:ident, $stream:ident;)*) => {
        $(
            #[doc = concat!("Vector allocating under [`", stringify!($category), "`](crate::tags::", stringify!($category), ").")]
            pub type $vec<'h, T> = TaggedVec<'h, crate::tags::$category, T>;

            #[doc = concat!("Hash map allocating under [`", stringify!($category), "`](crate::tags::", stringify!($category), ").")]
            pub type $map<'h, K, V> = TaggedMap<'h, crate::tags::$category, K, V>;

            #[doc = concat!("String allocating under [`", stringify!($category), "`](crate::tags::", stringify!($category), ").")]
            pub type $string<'h> = TaggedString<'h, crate::tags::$category>;

            #[doc = concat!("String stream allocating under [`", stringify!($category), "`](crate::tags::", stringify!($category), ").")]
            pub type $stream<'h> = TaggedStringStream<'h, crate::tags::$category>;
        )*
    };
}

category_containers! {
    Graphics => GraphicsVec, GraphicsMap, GraphicsString, GraphicsStringStream;
    FileIo => FileIoVec, FileIoMap, FileIoString, FileIoStringStream;
    Global => GlobalVec, GlobalMap, GlobalString, GlobalStringStream;
    Stage => StageVec, StageMap, StageString, StageStringStream;
    Geometry => GeometryVec, GeometryMap, GeometryString, GeometryStringStream;
    Frame => FrameVec, FrameMap, FrameString, FrameStringStream;
    Resources => ResourcesVec, ResourcesMap, ResourcesString, ResourcesStringStream;
}

impl<T, C: MemoryTag> HasMemoryTag for Vec<T, TaggedAllocator<'_, C>> {
    type Category = C;
}

impl<T, C: MemoryTag> HasMemoryTag for Vec<T, DeferredTaggedAllocator<'_, C>> {
    type Category = C;
}

impl<K, V, S, C: MemoryTag> HasMemoryTag for HashMap<K, V, S, TaggedAllocator<'_, C>> {
    type Category = C;
}

impl<C: MemoryTag> HasMemoryTag for ArenaString<TaggedAllocator<'_, C>> {
    type Category = C;
}

impl<C: MemoryTag> HasMemoryTag for ArenaStringStream<TaggedAllocator<'_, C>> {
    type Category = C;
}

/// Creates an empty vector allocating through `alloc`.
///
/// Shorthand for `Vec::new_in` that reads well at call sites building
/// several containers on one allocator.
#[inline]
pub fn vec_in<T, A: Allocator>(alloc: A) -> Vec<T, A> {
    Vec::new_in(alloc)
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;
    use crate::heap::{Heap, TaggedHeap};
    use crate::tags::{Frame, Geometry, Resources, Tag};

    #[test]
    fn test_containers_report_their_category() {
        assert_eq!(<FrameVec<'static, u32>>::memory_tag(), Tag::FRAME);
        assert_eq!(<GeometryMap<'static, u32, f32>>::memory_tag(), Tag::GEOMETRY);
        assert_eq!(<ResourcesString<'static>>::memory_tag(), Tag::RESOURCES);
        assert_eq!(<DeferredVec<'static, Frame, u8>>::memory_tag(), Tag::FRAME);
    }

    #[test]
    fn test_map_with_reserved_capacity() {
        let heap = TaggedHeap::new(8 * 1024, 2).unwrap();
        // SAFETY: the map is the only geometry container and is never used
        // after it is dropped.
        let alloc = unsafe { TaggedAllocator::<Geometry>::new(&heap) };

        let mut lookup: GeometryMap<'_, u32, [f32; 3]> = GeometryMap::with_capacity_in(32, alloc);
        for i in 0..32u32 {
            #[allow(clippy::cast_precision_loss)]
            let f = i as f32;
            lookup.insert(i, [f, f * 2.0, f * 3.0]);
        }

        assert_eq!(lookup.len(), 32);
        assert_eq!(lookup[&7], [7.0, 14.0, 21.0]);
        assert_eq!(heap.blocks_owned_by(Tag::GEOMETRY), 1);

        drop(lookup);
        assert_eq!(heap.blocks_owned_by(Tag::GEOMETRY), 0);
    }

    #[test]
    fn test_deferred_vec_outlives_its_drop() {
        let mut heap = TaggedHeap::new(4 * 1024, 2).unwrap();
        {
            let mut draws: DeferredVec<'_, Frame, u64> =
                DeferredVec::with_capacity_in(64, TaggedAllocator::<Frame>::deferred(&heap));
            draws.extend(0..64);
            assert_eq!(draws[63], 63);
        }

        assert_eq!(heap.blocks_owned_by(Tag::FRAME), 1);
        assert_eq!(heap.free_blocks(Tag::FRAME), 1);
    }

    #[test]
    fn test_temp_vec_on_frame_heap() {
        let mut frame = LinearHeap::new(512).unwrap();
        {
            let mut scratch: TempVec<'_, u16> = vec_in(HeapAllocator::new(&frame));
            scratch.extend(0..10);
            assert_eq!(scratch.len(), 10);
        }
        assert!(frame.current_memory() > 0);
        frame.free();
        assert_eq!(frame.current_memory(), 0);
    }
}
