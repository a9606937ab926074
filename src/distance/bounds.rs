//! Per-cell lower/upper bound tables used by the scan to prune candidates
//! without dereferencing the indexed vector itself.

use crate::error::{Error, Result};
use crate::marks::Marks;

use super::minkowski::MinkowskiNorm;

/// Precomputed `D × P` lower- and upper-bound contribution tables for one
/// query vector under one norm. Lives for the duration of a single scan.
#[derive(Debug, Clone)]
pub struct BoundTables {
    norm: MinkowskiNorm,
    lb: Vec<Vec<f64>>,
    ub: Vec<Vec<f64>>,
}

impl BoundTables {
    /// Builds the bound tables for `query` against `marks`.
    ///
    /// `weights`, if given, must have one entry per dimension of `marks`;
    /// each per-dimension contribution (lower, upper, and under L∞ the
    /// point term itself) is multiplied by its weight before the
    /// sum/max reduction, so `L∞` combined with weights is supported
    /// rather than refused.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `weights` is given with a
    /// length other than `marks.dim()`, or [`Error::BadVector`] if
    /// `query` contains a NaN.
    pub fn build(
        marks: &Marks,
        query: &[f64],
        norm: MinkowskiNorm,
        weights: Option<&[f64]>,
    ) -> Result<Self> {
        if query.iter().any(|v| v.is_nan()) {
            return Err(Error::BadVector("query vector contains NaN".into()));
        }
        if let Some(w) = weights {
            if w.len() != marks.dim() {
                return Err(Error::DimensionMismatch {
                    expected: marks.dim(),
                    actual: w.len(),
                });
            }
        }

        let d = query.len().min(marks.dim());
        let p = usize::from(marks.partitions());
        let exponent = match norm {
            MinkowskiNorm::Ls(s) => s,
            MinkowskiNorm::Max => 1.0,
        };

        let mut lb = vec![vec![0.0; p]; d];
        let mut ub = vec![vec![0.0; p]; d];

        for dim in 0..d {
            let row = marks.row(dim);
            let w = weights.map_or(1.0, |w| w[dim]);
            let q = query[dim];

            for cell in 0..p {
                let lo = row[cell];
                let hi = row[cell + 1];

                let lower_term = (lo - q).max(q - hi).max(0.0);
                lb[dim][cell] = w * lower_term.powf(exponent);

                let mid = (lo + hi) / 2.0;
                let upper_term = if q <= mid { hi - q } else { q - lo };
                ub[dim][cell] = w * upper_term.powf(exponent);
            }
        }

        Ok(Self { norm, lb, ub })
    }

    /// The lower bound for a tuple with approximation `apx`: sum (or, for
    /// `L∞`, max) over dimensions of `lb[d][apx[d]]`. Dimensions beyond
    /// the table's width are ignored.
    #[must_use]
    pub fn lower_bound(&self, apx: &[u8]) -> f64 {
        Self::reduce(&self.lb, apx, self.norm)
    }

    /// The upper bound for a tuple with approximation `apx`, using the
    /// same reduction as [`Self::lower_bound`].
    #[must_use]
    pub fn upper_bound(&self, apx: &[u8]) -> f64 {
        Self::reduce(&self.ub, apx, self.norm)
    }

    fn reduce(table: &[Vec<f64>], apx: &[u8], norm: MinkowskiNorm) -> f64 {
        let d = table.len().min(apx.len());
        match norm {
            MinkowskiNorm::Max => {
                let mut acc = 0.0_f64;
                for dim in 0..d {
                    let v = table[dim][usize::from(apx[dim])];
                    if v > acc {
                        acc = v;
                    }
                }
                acc
            }
            MinkowskiNorm::Ls(_) => {
                let mut acc = 0.0_f64;
                for dim in 0..d {
                    acc += table[dim][usize::from(apx[dim])];
                }
                acc
            }
        }
    }
}
