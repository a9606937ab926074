//! The feature vector, heap tuple identifier, and row-sampling collaborator
//! interfaces consumed by the mark builder and the page-store index.
//!
//! Everything in this module is deliberately thin: the surrounding
//! relational layer (parser, planner, executor, catalog) is an external
//! collaborator and is represented here only by the traits it must
//! implement to feed the VA-File core.

use crate::error::{Error, Result};

/// A dense sequence of 64-bit floats describing one indexed row.
///
/// `FeatureVector` is immutable once constructed; `dim()` reports its
/// length, which may differ between sample rows (the mark builder reduces
/// to the shortest width observed).
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    /// Builds a feature vector from raw components.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadVector`] if `values` is empty or contains a NaN.
    pub fn new(values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(Error::BadVector("feature vector is empty".into()));
        }
        if values.iter().any(|v| v.is_nan()) {
            return Err(Error::BadVector("feature vector contains NaN".into()));
        }
        Ok(Self(values))
    }

    /// Number of dimensions in this vector.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.0.len()
    }

    /// Borrows the underlying components.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Returns the component at `d`, or `None` if `d` is out of range.
    #[must_use]
    pub fn get(&self, d: usize) -> Option<f64> {
        self.0.get(d).copied()
    }
}

/// Opaque identifier of a row in the base table, mirroring a block/offset
/// tuple identifier (TID). The index never interprets this value; it only
/// stores and returns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct HeapTid {
    /// Block number within the base relation.
    pub block: u32,
    /// Offset of the row within its block.
    pub offset: u16,
}

impl HeapTid {
    /// Constructs a heap TID from its components.
    #[must_use]
    pub const fn new(block: u32, offset: u16) -> Self {
        Self { block, offset }
    }

    /// Serializes this TID into its fixed 6-byte on-disk representation.
    #[must_use]
    pub fn to_bytes(self) -> [u8; 6] {
        let mut out = [0u8; 6];
        out[0..4].copy_from_slice(&self.block.to_ne_bytes());
        out[4..6].copy_from_slice(&self.offset.to_ne_bytes());
        out
    }

    /// Deserializes a heap TID from its fixed 6-byte on-disk representation.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 6]) -> Self {
        let block = u32::from_ne_bytes(bytes[0..4].try_into().expect("4 bytes"));
        let offset = u16::from_ne_bytes(bytes[4..6].try_into().expect("2 bytes"));
        Self { block, offset }
    }
}

/// One sampled or scanned row: its heap TID and its feature vector (absent
/// when the extractor's predicate excludes the row or the feature column
/// is NULL).
#[derive(Debug, Clone)]
pub struct SampleRow {
    /// Identifier of the row in the base table.
    pub heap_tid: HeapTid,
    /// Extracted feature vector, or `None` for a NULL/filtered row.
    pub feature: Option<FeatureVector>,
}

/// External collaborator that supplies rows to the mark builder and to a
/// full index build, standing in for the surrounding relational executor.
///
/// Implementations decide how sampling is performed (e.g. reservoir
/// sampling over a heap scan); the core only needs an upper-bounded sample
/// for mark building and a full live-row scan for building the index.
pub trait RowSource {
    /// Returns up to `limit` sample rows, used by the mark builder.
    ///
    /// # Errors
    ///
    /// Implementations may surface I/O or cancellation failures through
    /// [`Error`].
    fn sample_rows(&mut self, limit: usize) -> Result<Vec<SampleRow>>;

    /// Invokes `on_row` once per live row in heap order, used by `build`.
    /// Implementations should call `on_row` before moving to the next page
    /// so the index page store sees rows in a stable, page-friendly order.
    ///
    /// # Errors
    ///
    /// Propagates whatever `on_row` returns, plus any I/O or cancellation
    /// failure from the implementation itself.
    fn scan_live_rows(&mut self, on_row: &mut dyn FnMut(SampleRow) -> Result<()>) -> Result<()>;
}
