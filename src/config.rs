//! VA-File configuration.
//!
//! Provides layered configuration via an optional `va_index.toml` file,
//! `VA_INDEX_*` environment variables, and runtime overrides.
//!
//! # Priority (highest to lowest)
//!
//! 1. Runtime overrides (passed explicitly into scan/build construction)
//! 2. Environment variables (`VA_INDEX_*`)
//! 3. Configuration file (`va_index.toml`)
//! 4. Default values

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Quantization mark strategy, selected at build time via the `vamarks` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarksStrategy {
    /// Equal-width partitions: `min + k*(max-min)/P`.
    Equidistant,
    /// Equal-population partitions derived from a histogram pass (default).
    #[default]
    Equifrequent,
}

/// Mark-builder configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarksConfig {
    /// Strategy used to derive partition boundaries.
    pub strategy: MarksStrategy,
    /// Maximum number of sample rows read by the mark builder.
    pub n_samples: usize,
    /// Histogram resolution used by the equifrequent strategy.
    pub sampling_frequency: usize,
    /// Number of partitions per dimension (`P`). Cell indices must fit in a `u8`.
    pub max_partitions: u8,
    /// Minimum number of non-null sample rows required to build marks.
    pub min_samples: usize,
}

impl Default for MarksConfig {
    fn default() -> Self {
        Self {
            strategy: MarksStrategy::Equifrequent,
            n_samples: 10_000,
            sampling_frequency: 10_000,
            max_partitions: 63,
            min_samples: 256,
        }
    }
}

/// Scan-time configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Master toggle consulted by the planner/caller before using this index.
    pub enable_vascan: bool,
    /// `nChanges` above this value raises a stale-index warning.
    pub stale_changes_threshold: u32,
    /// `nChanges / reltuples` above this fraction raises a stale-index warning.
    pub stale_fraction_threshold: f64,
    /// Limit applied when the caller does not specify one; `None` disables the cap.
    pub default_limit: Option<usize>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            enable_vascan: true,
            stale_changes_threshold: 1000,
            stale_fraction_threshold: 0.2,
            default_limit: None,
        }
    }
}

/// Storage configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Fixed page size in bytes for the index file.
    pub page_size: usize,
    /// Directory holding the index file and its sidecar marks file.
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            page_size: 8192,
            data_dir: "./va_index_data".to_string(),
        }
    }
}

/// Top-level VA-File configuration, assembled from defaults, an optional
/// config file, and environment variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VaIndexConfig {
    /// Mark-builder settings.
    pub marks: MarksConfig,
    /// Scan-time settings.
    pub scan: ScanConfig,
    /// Storage settings.
    pub storage: StorageConfig,
}

impl VaIndexConfig {
    /// Loads configuration with the default precedence: built-in defaults,
    /// then `va_index.toml` in the current directory (if present), then
    /// `VA_INDEX_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the TOML file is malformed or an
    /// environment variable cannot be coerced into its declared type.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("va_index.toml"))
    }

    /// Loads configuration from an explicit TOML path, used mainly by tests
    /// and embedders that do not want to rely on the current directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file (when present) is malformed or
    /// an environment variable cannot be coerced into its declared type.
    pub fn load_from(path: &Path) -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("VA_INDEX_").split("_"));

        figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))
    }

    /// Validates cross-field invariants that `serde`'s per-field defaults
    /// cannot express on their own.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `max_partitions` is zero or the stale
    /// fraction threshold is outside `[0.0, 1.0]`.
    pub fn validate(&self) -> Result<()> {
        if self.marks.max_partitions == 0 {
            return Err(Error::Config("marks.max_partitions must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.scan.stale_fraction_threshold) {
            return Err(Error::Config(
                "scan.stale_fraction_threshold must be in [0.0, 1.0]".into(),
            ));
        }
        if self.marks.min_samples == 0 {
            return Err(Error::Config("marks.min_samples must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = VaIndexConfig::default();
        cfg.validate().expect("default configuration must validate");
        assert_eq!(cfg.marks.max_partitions, 63);
        assert_eq!(cfg.marks.min_samples, 256);
        assert!(cfg.scan.enable_vascan);
    }

    #[test]
    fn load_from_missing_file_falls_back_to_defaults() {
        let cfg = VaIndexConfig::load_from(Path::new("/nonexistent/va_index.toml"))
            .expect("missing file should fall back to defaults/env");
        assert_eq!(cfg.marks.strategy, MarksStrategy::Equifrequent);
    }

    #[test]
    fn rejects_zero_partitions() {
        let mut cfg = VaIndexConfig::default();
        cfg.marks.max_partitions = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_stale_fraction() {
        let mut cfg = VaIndexConfig::default();
        cfg.scan.stale_fraction_threshold = 1.5;
        assert!(cfg.validate().is_err());
    }
}
