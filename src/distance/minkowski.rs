//! The Minkowski distance family: `L_s` for `s` in `(0, 100)`, plus the
//! `L∞` sentinel.

use crate::error::{Error, Result};

use super::EPSILON;

/// A resolved Minkowski norm: either a finite exponent `s` or the explicit
/// `L∞` sentinel (encoded internally as `-1`, matching the historical
/// implementation's convention, but never compared numerically here).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MinkowskiNorm {
    /// `L_s` with `s` in `(0, 100)`. `s == 1.0` is the Manhattan (L1) case.
    Ls(f64),
    /// `L∞` (Chebyshev / max norm), selected only via the explicit `MAX`
    /// sentinel, never inferred from a small `s`.
    Max,
}

impl MinkowskiNorm {
    /// Resolves a caller-supplied norm value.
    ///
    /// A raw float `s` must lie strictly inside `(0, 100)`; `s <=
    /// EPSILON` is rejected with [`Error::BadQuery`] rather than silently
    /// treated as `L∞` (see the crate's design notes).
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadQuery`] for an out-of-range or near-zero `s`.
    pub fn from_s(s: f64) -> Result<Self> {
        if s.is_nan() {
            return Err(Error::BadQuery("norm is NaN".into()));
        }
        if s <= EPSILON {
            return Err(Error::BadQuery(format!(
                "norm {s} is too close to zero; use the explicit MAX sentinel for L-infinity"
            )));
        }
        if s >= 100.0 {
            return Err(Error::BadQuery(format!("norm {s} must be < 100")));
        }
        Ok(Self::Ls(s))
    }

    /// The explicit `L∞` sentinel.
    #[must_use]
    pub const fn max() -> Self {
        Self::Max
    }
}

/// Computes the (unweighted) Minkowski distance between two vectors of
/// equal length. The root is taken (unlike the scan's bound arrays, which
/// omit it since ordering is monotonic without it).
///
/// # Errors
///
/// Returns [`Error::DimensionMismatch`] if `a.len() != b.len()`, or
/// [`Error::BadVector`] if either vector contains a NaN.
pub fn distance(a: &[f64], b: &[f64], norm: MinkowskiNorm, weights: Option<&[f64]>) -> Result<f64> {
    if a.len() != b.len() {
        return Err(Error::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    if a.iter().chain(b.iter()).any(|v| v.is_nan()) {
        return Err(Error::BadVector("distance operand contains NaN".into()));
    }

    match norm {
        MinkowskiNorm::Max => {
            let mut acc = 0.0_f64;
            for d in 0..a.len() {
                let w = weights.map_or(1.0, |w| w[d]);
                let term = w * (a[d] - b[d]).abs();
                if term > acc {
                    acc = term;
                }
            }
            Ok(acc)
        }
        MinkowskiNorm::Ls(s) => {
            let mut acc = 0.0_f64;
            for d in 0..a.len() {
                let w = weights.map_or(1.0, |w| w[d]);
                acc += w * (a[d] - b[d]).abs().powf(s);
            }
            Ok(acc.powf(1.0 / s))
        }
    }
}
