//! Distance pipeline: Minkowski-family point distances, the partial-bound
//! arrays the scan prunes with, optional normalization, and an optional
//! weighting/complement tail.

mod bounds;
mod complement;
mod minkowski;
mod normalization;
mod registry;

#[cfg(test)]
mod minkowski_proptest;
#[cfg(test)]
mod registry_tests;

pub use bounds::BoundTables;
pub use complement::Complement;
pub use minkowski::MinkowskiNorm;
pub use normalization::{NormalizationKind, NormalizationParams, NormalizationRegistry};
pub use registry::{DeclaredSignature, DistanceCallable, DistanceClause, DistanceRegistry};

/// `EPSILON` below which a caller-supplied norm is rejected rather than
/// silently treated as L∞; matches the historical implementation's
/// near-zero threshold (see the design notes on the L∞ sentinel).
pub const EPSILON: f64 = 0.001;
