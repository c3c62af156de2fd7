//! # Memory Sizes
//!
//! Byte counts with decimal and binary unit constructors, parsed from
//! configuration as either a plain integer or a string with a unit suffix.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MemoryError;

/// Bytes in a kilobyte (decimal).
pub const KILOBYTE: u64 = 1000;
/// Bytes in a megabyte (decimal).
pub const MEGABYTE: u64 = KILOBYTE * 1000;
/// Bytes in a gigabyte (decimal).
pub const GIGABYTE: u64 = MEGABYTE * 1000;

/// Bytes in a kibibyte (binary).
pub const KIBIBYTE: u64 = 1024;
/// Bytes in a mebibyte (binary).
pub const MEBIBYTE: u64 = KIBIBYTE * 1024;
/// Bytes in a gibibyte (binary).
pub const GIBIBYTE: u64 = MEBIBYTE * 1024;

/// A size in bytes.
///
/// # Example
///
/// ```rust,ignore
/// let block = MemorySize::kilobytes(500);
/// let scratch: MemorySize = "10mb".parse()?;
/// assert_eq!(scratch.bytes(), 10_000_000);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "SizeRepr", into = "u64")]
pub struct MemorySize(u64);

impl MemorySize {
    /// Zero bytes.
    pub const ZERO: Self = Self(0);

    /// Creates a size from a byte count.
    #[inline]
    #[must_use]
    pub const fn bytes_of(bytes: u64) -> Self {
        Self(bytes)
    }

    /// Creates a size of `n` kilobytes.
    #[inline]
    #[must_use]
    pub const fn kilobytes(n: u64) -> Self {
        Self(n * KILOBYTE)
    }

    /// Creates a size of `n` megabytes.
    #[inline]
    #[must_use]
    pub const fn megabytes(n: u64) -> Self {
        Self(n * MEGABYTE)
    }

    /// Creates a size of `n` gigabytes.
    #[inline]
    #[must_use]
    pub const fn gigabytes(n: u64) -> Self {
        Self(n * GIGABYTE)
    }

    /// Creates a size of `n` kibibytes.
    #[inline]
    #[must_use]
    pub const fn kibibytes(n: u64) -> Self {
        Self(n * KIBIBYTE)
    }

    /// Creates a size of `n` mebibytes.
    #[inline]
    #[must_use]
    pub const fn mebibytes(n: u64) -> Self {
        Self(n * MEBIBYTE)
    }

    /// Creates a size of `n` gibibytes.
    #[inline]
    #[must_use]
    pub const fn gibibytes(n: u64) -> Self {
        Self(n * GIBIBYTE)
    }

    /// Returns the size in bytes.
    #[inline]
    #[must_use]
    pub const fn bytes(self) -> u64 {
        self.0
    }

    /// Returns the size in whole kilobytes.
    #[inline]
    #[must_use]
    pub const fn as_kilobytes(self) -> u64 {
        self.0 / KILOBYTE
    }

    /// Returns the size in whole megabytes.
    #[inline]
    #[must_use]
    pub const fn as_megabytes(self) -> u64 {
        self.0 / MEGABYTE
    }

    /// Returns the size in whole kibibytes.
    #[inline]
    #[must_use]
    pub const fn as_kibibytes(self) -> u64 {
        self.0 / KIBIBYTE
    }

    /// Returns the size in whole mebibytes.
    #[inline]
    #[must_use]
    pub const fn as_mebibytes(self) -> u64 {
        self.0 / MEBIBYTE
    }

    /// Returns true if the size is zero.
    #[inline]
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Converts to `usize` for use as an allocation size.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidSize`] if the value does not fit the
    /// address space of the target.
    pub fn to_usize(self) -> Result<usize, MemoryError> {
        usize::try_from(self.0)
            .map_err(|_| MemoryError::InvalidSize(format!("{self} does not fit in usize")))
    }
}

impl From<MemorySize> for u64 {
    fn from(size: MemorySize) -> Self {
        size.0
    }
}

impl fmt::Display for MemorySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0;
        if bytes != 0 && bytes % MEGABYTE == 0 {
            write!(f, "{}mb", bytes / MEGABYTE)
        } else if bytes != 0 && bytes % KILOBYTE == 0 {
            write!(f, "{}kb", bytes / KILOBYTE)
        } else {
            write!(f, "{bytes}b")
        }
    }
}

impl FromStr for MemorySize {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim().to_ascii_lowercase();
        let split = text
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(text.len());
        let (digits, unit) = text.split_at(split);

        let value: u64 = digits
            .parse()
            .map_err(|_| MemoryError::InvalidSize(s.to_string()))?;

        let multiplier = match unit.trim() {
            "" | "b" => 1,
            "kb" => KILOBYTE,
            "mb" => MEGABYTE,
            "gb" => GIGABYTE,
            "kib" => KIBIBYTE,
            "mib" => MEBIBYTE,
            "gib" => GIBIBYTE,
            _ => return Err(MemoryError::InvalidSize(s.to_string())),
        };

        value
            .checked_mul(multiplier)
            .map(Self)
            .ok_or_else(|| MemoryError::InvalidSize(format!("{s} overflows")))
    }
}

/// Wire form accepted in configuration files.
#[derive(Deserialize)]
#[serde(untagged)]
enum SizeRepr {
    Bytes(u64),
    Text(String),
}

impl TryFrom<SizeRepr> for MemorySize {
    type Error = MemoryError;

    fn try_from(repr: SizeRepr) -> Result<Self, Self::Error> {
        match repr {
            SizeRepr::Bytes(bytes) => Ok(Self(bytes)),
            SizeRepr::Text(text) => text.parse(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_constructors() {
        assert_eq!(MemorySize::kilobytes(500).bytes(), 500_000);
        assert_eq!(MemorySize::megabytes(10).bytes(), 10_000_000);
        assert_eq!(MemorySize::kibibytes(1).bytes(), 1024);
        assert_eq!(MemorySize::mebibytes(2).as_kibibytes(), 2048);
    }

    #[test]
    fn test_parse_suffixes() {
        assert_eq!("64".parse::<MemorySize>().unwrap().bytes(), 64);
        assert_eq!("500kb".parse::<MemorySize>().unwrap().bytes(), 500_000);
        assert_eq!("10 MB".parse::<MemorySize>().unwrap().bytes(), 10_000_000);
        assert_eq!("4mib".parse::<MemorySize>().unwrap().bytes(), 4 * MEBIBYTE);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<MemorySize>().is_err());
        assert!("12parsecs".parse::<MemorySize>().is_err());
        assert!("mb".parse::<MemorySize>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(MemorySize::megabytes(10).to_string(), "10mb");
        assert_eq!(MemorySize::kilobytes(500).to_string(), "500kb");
        assert_eq!(MemorySize::bytes_of(64).to_string(), "64b");
    }
}
