//! # `vafile-index`
//!
//! A Vector-Approximation File (VA-File) index and the Minkowski
//! distance/normalization pipeline that feeds it.
//!
//! Given a stream of sample rows carrying a dense feature vector, this
//! crate derives per-dimension quantization marks, encodes each vector
//! into a fixed-width cell-index approximation, and stores those
//! approximations in a paginated, memory-mapped file. A scan over that
//! file uses precomputed per-cell lower/upper distance bounds and a
//! bounded priority queue to filter a short candidate list of heap TIDs
//! for the host executor to refine against the base table.
//!
//! The surrounding relational layer (parser, planner, executor,
//! catalog) is out of scope: this crate consumes sample rows through
//! [`feature::RowSource`], a feature vector through [`feature::FeatureVector`],
//! and a heap row identifier through [`feature::HeapTid`], and emits
//! candidate TIDs as a [`roaring::RoaringTreemap`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use vafile_index::access_method::{IndexOptions, VaFileIndex};
//! use vafile_index::cancel::CancellationToken;
//! use vafile_index::config::VaIndexConfig;
//! use vafile_index::distance::MinkowskiNorm;
//! use vafile_index::scan::ScanKeys;
//!
//! let cfg = VaIndexConfig::load()?;
//! cfg.validate()?;
//! let cancel = CancellationToken::new();
//!
//! let (index, stats) = VaFileIndex::build(
//!     &path,
//!     &mut row_source,
//!     &cfg.marks,
//!     &cfg.storage,
//!     &cfg.scan,
//!     IndexOptions::default(),
//!     &cancel,
//! )?;
//!
//! let mut scan = index.begin_scan(CancellationToken::new());
//! VaFileIndex::rescan(&mut scan, ScanKeys {
//!     query: vec![0.1, 0.2, 0.3],
//!     norm: MinkowskiNorm::from_s(2.0)?,
//!     weights: None,
//!     limit: Some(10),
//!     input_bitmap: None,
//! })?;
//! let (candidates, count) = index.get_bitmap(&mut scan, stats.heap_tuples)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod access_method;
pub mod cancel;
pub mod codec;
pub mod config;
pub mod distance;
pub mod error;
pub mod feature;
pub mod marks;
pub mod page;
pub mod pqueue;
pub mod scan;

pub use access_method::{CostEstimate, CostQuery, IndexOptions, VaFileIndex};
pub use error::{Error, Result};
pub use feature::{FeatureVector, HeapTid, RowSource, SampleRow};
pub use marks::Marks;
pub use scan::{Scan, ScanKeys, ScanState};
