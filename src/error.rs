//! Error types for the VA-File index.
//!
//! Every public entry point returns [`Result<T>`] instead of panicking or
//! relying on process-wide error propagation. Each variant carries a
//! descriptive message suitable for surfacing to an end user.

use thiserror::Error;

/// Result type alias for VA-File operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, maintaining, or scanning a VA-File index.
#[derive(Error, Debug)]
pub enum Error {
    /// A feature vector contained a NaN, an unsupported element type, or was empty.
    #[error("bad vector: {0}")]
    BadVector(String),

    /// Sampled feature vectors disagreed in width beyond the initial min/max reduction.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimensionality agreed on so far.
        expected: usize,
        /// Dimensionality of the vector that disagreed.
        actual: usize,
    },

    /// Fewer than the minimum number of usable sample rows were obtained.
    #[error("insufficient samples: need at least {required}, got {found}")]
    InsufficientSamples {
        /// Minimum number of non-null sample rows required.
        required: usize,
        /// Number of non-null sample rows actually obtained.
        found: usize,
    },

    /// The query itself was malformed: an invalid norm, a missing limit, or
    /// a scan issued against a stale index past the hard failure threshold.
    #[error("bad query: {0}")]
    BadQuery(String),

    /// The on-disk index file failed a structural check: bad magic, a
    /// missing marks attachment, or a page layout violation.
    #[error("index corrupted: {0} (reindex required)")]
    Corrupted(String),

    /// Distance resolution failed: unknown name, or arity mismatch against
    /// the declared parameter vector.
    #[error("bad distance: {0}")]
    BadDistance(String),

    /// Normalization resolution failed: unknown name, arity mismatch, or a
    /// lookup miss against the persisted parameter registry.
    #[error("bad normalization: {0}")]
    BadNormalization(String),

    /// The operation was cancelled by the caller between pages.
    #[error("operation cancelled")]
    Cancelled,

    /// Underlying file I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be loaded or contained an invalid value.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns a short machine-readable tag for this error variant, useful
    /// for metrics labels and log filtering.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::BadVector(_) => "bad_vector",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::InsufficientSamples { .. } => "insufficient_samples",
            Self::BadQuery(_) => "bad_query",
            Self::Corrupted(_) => "corrupted",
            Self::BadDistance(_) => "bad_distance",
            Self::BadNormalization(_) => "bad_normalization",
            Self::Cancelled => "cancelled",
            Self::Io(_) => "io",
            Self::Config(_) => "config",
        }
    }

    /// Returns true if the host layer could plausibly recover by retrying
    /// (e.g. after rebuilding the index), as opposed to a structural defect.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Corrupted(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_distinct_and_stable() {
        let errors: Vec<Error> = vec![
            Error::BadVector("nan".into()),
            Error::DimensionMismatch {
                expected: 3,
                actual: 2,
            },
            Error::InsufficientSamples {
                required: 256,
                found: 10,
            },
            Error::BadQuery("missing limit".into()),
            Error::Corrupted("bad magic".into()),
            Error::BadDistance("unknown".into()),
            Error::BadNormalization("unknown".into()),
            Error::Cancelled,
            Error::Config("bad toml".into()),
        ];

        let kinds: Vec<&str> = errors.iter().map(Error::kind).collect();
        let mut unique = kinds.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(kinds.len(), unique.len(), "error kinds must be unique");
    }

    #[test]
    fn corrupted_is_not_recoverable() {
        assert!(!Error::Corrupted("bad magic".into()).is_recoverable());
        assert!(Error::BadQuery("x".into()).is_recoverable());
    }

    #[test]
    fn io_error_converts_via_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing file");
        let err: Error = io_err.into();
        assert_eq!(err.kind(), "io");
    }
}
