//! # Memory Configuration
//!
//! Heap sizes for every region, loaded once at startup from TOML.
//!
//! ```toml
//! string_pool_size = "1mb"
//!
//! [persistent]
//! global_heap_size = "4mb"
//! frame_heap_size = "1mb"
//! tagged_heap_block_size = "500kb"
//! tagged_heap_block_count = 15
//! scratch_heap_size = "10mb"
//! ```
//!
//! Every field is optional and falls back to the defaults below.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, MemoryResult};
use crate::manager::RegionKind;
use crate::size::MemorySize;

/// Heap sizes for one memory region.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegionConfig {
    /// General-purpose free-list heap.
    pub global_heap_size: MemorySize,
    /// Linear heap reset at every end of frame.
    pub frame_heap_size: MemorySize,
    /// Size of one tagged-heap block.
    pub tagged_heap_block_size: MemorySize,
    /// Number of tagged-heap blocks.
    pub tagged_heap_block_count: u32,
    /// Free-list heap for short-lived working sets.
    pub scratch_heap_size: MemorySize,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            global_heap_size: MemorySize::megabytes(4),
            frame_heap_size: MemorySize::megabytes(1),
            tagged_heap_block_size: MemorySize::kilobytes(500),
            tagged_heap_block_count: 15,
            scratch_heap_size: MemorySize::megabytes(10),
        }
    }
}

impl RegionConfig {
    /// Total backing memory this region acquires, saturating at `u64::MAX`.
    #[must_use]
    pub fn total(&self) -> MemorySize {
        self.checked_total().unwrap_or(MemorySize::bytes_of(u64::MAX))
    }

    /// Total backing memory, or `None` if it overflows `u64`.
    #[must_use]
    pub fn checked_total(&self) -> Option<MemorySize> {
        let tagged = self
            .tagged_heap_block_size
            .bytes()
            .checked_mul(u64::from(self.tagged_heap_block_count))?;
        let bytes = self
            .global_heap_size
            .bytes()
            .checked_add(self.frame_heap_size.bytes())?
            .checked_add(tagged)?
            .checked_add(self.scratch_heap_size.bytes())?;
        Some(MemorySize::bytes_of(bytes))
    }

    fn validate(&self, region: &str) -> MemoryResult<()> {
        let sizes = [
            ("global_heap_size", self.global_heap_size),
            ("frame_heap_size", self.frame_heap_size),
            ("tagged_heap_block_size", self.tagged_heap_block_size),
            ("scratch_heap_size", self.scratch_heap_size),
        ];
        for (field, size) in sizes {
            if size.is_zero() {
                return Err(MemoryError::InvalidConfig(format!("{region}.{field} must be non-zero")));
            }
            size.to_usize()?;
        }

        if self.tagged_heap_block_count == 0 {
            return Err(MemoryError::InvalidConfig(format!(
                "{region}.tagged_heap_block_count must be non-zero"
            )));
        }

        let total = self.checked_total().ok_or_else(|| {
            MemoryError::InvalidConfig(format!("{region} sizes overflow when summed"))
        })?;
        total.to_usize()?;

        Ok(())
    }
}

/// Memory layout of the whole process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryConfig {
    /// Free-list heap backing pool strings.
    pub string_pool_size: MemorySize,
    /// Region living for the whole process.
    pub persistent: RegionConfig,
    /// Region for data being loaded or built.
    pub staging: RegionConfig,
    /// Region for tooling and diagnostics.
    pub debug: RegionConfig,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            string_pool_size: MemorySize::megabytes(1),
            persistent: RegionConfig::default(),
            staging: RegionConfig::default(),
            debug: RegionConfig::default(),
        }
    }
}

impl MemoryConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::ConfigParse`] for malformed TOML or unknown
    /// fields, and [`MemoryError::InvalidConfig`] for unusable values.
    pub fn from_toml_str(source: &str) -> MemoryResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// As [`MemoryConfig::from_toml_str`], plus [`MemoryError::Io`] if the
    /// file cannot be read.
    pub fn load(path: impl AsRef<Path>) -> MemoryResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&source)?;
        tracing::info!(
            path = %path.display(),
            total = %config.total(),
            "memory configuration loaded"
        );
        Ok(config)
    }

    /// Checks that every heap has a usable size.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> MemoryResult<()> {
        for kind in RegionKind::ALL {
            self.region(kind).validate(kind.name())?;
        }
        if self.string_pool_size.is_zero() {
            return Err(MemoryError::InvalidConfig("string_pool_size must be non-zero".into()));
        }
        self.string_pool_size.to_usize()?;

        let total = self
            .checked_total()
            .ok_or_else(|| MemoryError::InvalidConfig("total memory overflows when summed".into()))?;
        total.to_usize()?;
        Ok(())
    }

    /// Settings for one region.
    #[must_use]
    pub fn region(&self, kind: RegionKind) -> &RegionConfig {
        match kind {
            RegionKind::Persistent => &self.persistent,
            RegionKind::Staging => &self.staging,
            RegionKind::Debug => &self.debug,
        }
    }

    /// Total backing memory the manager acquires, saturating at `u64::MAX`.
    #[must_use]
    pub fn total(&self) -> MemorySize {
        self.checked_total().unwrap_or(MemorySize::bytes_of(u64::MAX))
    }

    /// Total backing memory, or `None` if it overflows `u64`.
    #[must_use]
    pub fn checked_total(&self) -> Option<MemorySize> {
        RegionKind::ALL
            .iter()
            .try_fold(self.string_pool_size.bytes(), |sum, &kind| {
                sum.checked_add(self.region(kind).checked_total()?.bytes())
            })
            .map(MemorySize::bytes_of)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MemoryConfig::default();
        assert_eq!(config.persistent.global_heap_size.bytes(), 4_000_000);
        assert_eq!(config.staging.tagged_heap_block_size.bytes(), 500_000);
        assert_eq!(config.debug.tagged_heap_block_count, 15);
        assert_eq!(config.string_pool_size, MemorySize::megabytes(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bundled_file_matches_defaults() {
        let config = MemoryConfig::from_toml_str(include_str!("../config/memory.toml")).unwrap();
        assert_eq!(config, MemoryConfig::default());
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config = MemoryConfig::from_toml_str(
            r#"
            string_pool_size = 65536

            [staging]
            tagged_heap_block_size = "64kib"
            tagged_heap_block_count = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.string_pool_size.bytes(), 65_536);
        assert_eq!(config.staging.tagged_heap_block_size, MemorySize::kibibytes(64));
        assert_eq!(config.staging.tagged_heap_block_count, 4);
        assert_eq!(config.staging.frame_heap_size, MemorySize::megabytes(1));
        assert_eq!(config.persistent, RegionConfig::default());
    }

    #[test]
    fn test_zero_sizes_rejected() {
        let err = MemoryConfig::from_toml_str("[debug]\ntagged_heap_block_count = 0\n").unwrap_err();
        assert!(matches!(err, MemoryError::InvalidConfig(ref msg) if msg.contains("debug.tagged_heap_block_count")));

        let err = MemoryConfig::from_toml_str("[persistent]\nframe_heap_size = \"0kb\"\n").unwrap_err();
        assert!(matches!(err, MemoryError::InvalidConfig(ref msg) if msg.contains("persistent.frame_heap_size")));
    }

    #[test]
    fn test_unknown_fields_and_bad_sizes_rejected() {
        assert!(matches!(
            MemoryConfig::from_toml_str("[persistent]\nheap = 3\n"),
            Err(MemoryError::ConfigParse(_))
        ));
        assert!(matches!(
            MemoryConfig::from_toml_str("string_pool_size = \"lots\"\n"),
            Err(MemoryError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_overflowing_sizes_rejected() {
        let err = MemoryConfig::from_toml_str(
            "[staging]\ntagged_heap_block_size = 9000000000000000000\ntagged_heap_block_count = 4\n",
        )
        .unwrap_err();
        assert!(matches!(err, MemoryError::InvalidConfig(ref msg) if msg.contains("staging")));

        let mut config = MemoryConfig::default();
        config.staging.tagged_heap_block_size = MemorySize::bytes_of(9_000_000_000_000_000_000);
        config.staging.tagged_heap_block_count = 4;
        assert_eq!(config.staging.checked_total(), None);
        assert_eq!(config.checked_total(), None);
        assert_eq!(config.total().bytes(), u64::MAX);
    }

    #[test]
    fn test_total_sums_every_heap() {
        let config = MemoryConfig::default();
        let region = 4_000_000 + 1_000_000 + 15 * 500_000 + 10_000_000;
        assert_eq!(config.persistent.total().bytes(), region);
        assert_eq!(config.checked_total(), Some(MemorySize::bytes_of(3 * region + 1_000_000)));
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut config = MemoryConfig::default();
        config.debug.scratch_heap_size = MemorySize::kibibytes(256);

        let text = toml::to_string(&config).unwrap();
        assert_eq!(MemoryConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            MemoryConfig::load("/nonexistent/strata/memory.toml"),
            Err(MemoryError::Io(_))
        ));
    }
}
