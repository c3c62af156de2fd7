//! Growable UTF-8 strings over a custom allocator.

#![allow(unsafe_code)]

use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;

use allocator_api2::alloc::Allocator;
use allocator_api2::vec::Vec;

/// A UTF-8 string whose buffer lives in `A`.
///
/// Behaves like [`String`] for reading (it derefs to `str`), hashes and
/// compares like `str`, and can be written into with [`write!`].
pub struct ArenaString<A: Allocator> {
    bytes: Vec<u8, A>,
}

impl<A: Allocator> ArenaString<A> {
    /// Creates an empty string. Nothing is allocated until the first push.
    #[inline]
    pub fn new_in(alloc: A) -> Self {
        Self {
            bytes: Vec::new_in(alloc),
        }
    }

    /// Creates an empty string with room for `capacity` bytes.
    #[inline]
    pub fn with_capacity_in(capacity: usize, alloc: A) -> Self {
        Self {
            bytes: Vec::with_capacity_in(capacity, alloc),
        }
    }

    /// Copies `s` into a new string.
    pub fn from_str_in(s: &str, alloc: A) -> Self {
        let mut string = Self::with_capacity_in(s.len(), alloc);
        string.push_str(s);
        string
    }

    /// Appends `s`.
    #[inline]
    pub fn push_str(&mut self, s: &str) {
        self.bytes.extend_from_slice(s.as_bytes());
    }

    /// Appends a single character.
    #[inline]
    pub fn push(&mut self, ch: char) {
        let mut buf = [0; 4];
        self.push_str(ch.encode_utf8(&mut buf));
    }

    /// Borrows the contents.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        // SAFETY: bytes only ever enter through `&str` or `char::encode_utf8`.
        unsafe { std::str::from_utf8_unchecked(&self.bytes) }
    }

    /// Length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the string holds no bytes.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Capacity of the buffer in bytes.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    /// Reserves room for at least `additional` more bytes.
    #[inline]
    pub fn reserve(&mut self, additional: usize) {
        self.bytes.reserve(additional);
    }

    /// Empties the string, keeping its buffer.
    #[inline]
    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    /// The allocator backing the buffer.
    #[inline]
    pub fn allocator(&self) -> &A {
        self.bytes.allocator()
    }
}

impl<A: Allocator + Clone> Clone for ArenaString<A> {
    fn clone(&self) -> Self {
        Self {
            bytes: self.bytes.clone(),
        }
    }
}

impl<A: Allocator> Deref for ArenaString<A> {
    type Target = str;

    #[inline]
    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl<A: Allocator> AsRef<str> for ArenaString<A> {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl<A: Allocator> Borrow<str> for ArenaString<A> {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl<A: Allocator> fmt::Write for ArenaString<A> {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push_str(s);
        Ok(())
    }
}

impl<A: Allocator> fmt::Display for ArenaString<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.as_str(), f)
    }
}

impl<A: Allocator> fmt::Debug for ArenaString<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl<A: Allocator, B: Allocator> PartialEq<ArenaString<B>> for ArenaString<A> {
    fn eq(&self, other: &ArenaString<B>) -> bool {
        self.as_str() == other.as_str()
    }
}

impl<A: Allocator> Eq for ArenaString<A> {}

impl<A: Allocator> PartialEq<str> for ArenaString<A> {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl<A: Allocator> PartialEq<&str> for ArenaString<A> {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl<A: Allocator> Hash for ArenaString<A> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

/// Formatting sink that accumulates into an [`ArenaString`].
///
/// ```rust,ignore
/// let mut stream = PoolStringStream::new_in(HeapAllocator::new(&pool));
/// write!(stream, "{}:{}", file, line)?;
/// log_line(stream.str());
/// ```
pub struct ArenaStringStream<A: Allocator> {
    buffer: ArenaString<A>,
}

impl<A: Allocator> ArenaStringStream<A> {
    /// Creates an empty stream.
    #[inline]
    pub fn new_in(alloc: A) -> Self {
        Self {
            buffer: ArenaString::new_in(alloc),
        }
    }

    /// Creates an empty stream with room for `capacity` bytes.
    #[inline]
    pub fn with_capacity_in(capacity: usize, alloc: A) -> Self {
        Self {
            buffer: ArenaString::with_capacity_in(capacity, alloc),
        }
    }

    /// Everything written so far.
    #[inline]
    #[must_use]
    pub fn str(&self) -> &str {
        self.buffer.as_str()
    }

    /// Discards the written text, keeping the buffer.
    #[inline]
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Length of the written text in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if nothing has been written.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Consumes the stream, returning the accumulated string.
    #[inline]
    pub fn into_string(self) -> ArenaString<A> {
        self.buffer
    }
}

impl<A: Allocator> fmt::Write for ArenaStringStream<A> {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.buffer.push_str(s);
        Ok(())
    }
}

impl<A: Allocator> fmt::Display for ArenaStringStream<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.str(), f)
    }
}

impl<A: Allocator> fmt::Debug for ArenaStringStream<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ArenaStringStream").field(&self.str()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::HeapAllocator;
    use crate::heap::{FreeListHeap, Heap};
    use std::collections::hash_map::DefaultHasher;
    use std::fmt::Write;

    fn hash_of<T: Hash + ?Sized>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_string_basics() {
        let pool = FreeListHeap::new(1024).unwrap();
        let mut s = ArenaString::from_str_in("stage", HeapAllocator::new(&pool));
        s.push('/');
        s.push_str("geometry");

        assert_eq!(s, "stage/geometry");
        assert_eq!(s.len(), 14);
        assert!(s.starts_with("stage"));
        assert_eq!(hash_of(&s), hash_of("stage/geometry"));
        assert_eq!(format!("{s}"), "stage/geometry");
        assert_eq!(format!("{s:?}"), "\"stage/geometry\"");

        s.clear();
        assert!(s.is_empty());
        assert!(s.capacity() >= 14);
    }

    #[test]
    fn test_multibyte_push() {
        let pool = FreeListHeap::new(256).unwrap();
        let mut s = ArenaString::new_in(HeapAllocator::new(&pool));
        s.push('é');
        s.push('→');
        assert_eq!(s.as_str(), "é→");
        assert_eq!(s.len(), 5);
    }

    #[test]
    fn test_stream_formats_and_releases() {
        let pool = FreeListHeap::new(1024).unwrap();
        {
            let mut stream = ArenaStringStream::new_in(HeapAllocator::new(&pool));
            write!(stream, "{}x{} @ {:.1}", 1920, 1080, 59.94).unwrap();
            assert_eq!(stream.str(), "1920x1080 @ 59.9");

            let owned = stream.into_string();
            assert_eq!(owned, "1920x1080 @ 59.9");
            assert!(pool.current_memory() > 0);
        }
        assert_eq!(pool.current_memory(), 0);
    }

    #[test]
    fn test_strings_compare_across_allocators() {
        let a = FreeListHeap::new(256).unwrap();
        let b = FreeListHeap::new(256).unwrap();
        let left = ArenaString::from_str_in("shared", HeapAllocator::new(&a));
        let right = ArenaString::from_str_in("shared", HeapAllocator::new(&b));
        assert_eq!(left, right);
    }
}
