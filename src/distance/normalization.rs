//! Optional distance normalization into `[0, 1]`, and the registry of
//! precomputed parameters it depends on.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Which normalization function to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizationKind {
    /// `min(1, d/max)`, clamped to `[0, 1]`.
    Minmax,
    /// `((d - mu) / (6*sigma)) + 0.5`, clamped to `[0, 1]`.
    Gaussian,
}

/// Offline-computed parameters for one `(relation, column, distance)`
/// triple. Computed by an all-pairs (or sampled all-pairs) traversal using
/// a Minkowski distance; other distances must supply every field
/// explicitly rather than through [`NormalizationRegistry::precompute`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizationParams {
    /// Observed maximum distance, used by [`NormalizationKind::Minmax`].
    pub max: f64,
    /// Mean distance, used by [`NormalizationKind::Gaussian`].
    pub mu: f64,
    /// Sample standard deviation, used by [`NormalizationKind::Gaussian`].
    pub sigma: f64,
}

impl NormalizationParams {
    /// Derives parameters from a stream of observed distances via
    /// `sigma = sqrt((N*sum_sq - sum^2) / (N*(N-1)))`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadNormalization`] if fewer than two distances are
    /// supplied (sample variance is undefined with `N < 2`).
    pub fn from_distances(distances: impl IntoIterator<Item = f64>) -> Result<Self> {
        let mut n: u64 = 0;
        let mut sum = 0.0_f64;
        let mut sum_sq = 0.0_f64;
        let mut max = f64::NEG_INFINITY;

        for d in distances {
            n += 1;
            sum += d;
            sum_sq += d * d;
            if d > max {
                max = d;
            }
        }

        if n < 2 {
            return Err(Error::BadNormalization(
                "at least two distances are required to precompute normalization parameters".into(),
            ));
        }

        #[allow(clippy::cast_precision_loss)]
        let n_f = n as f64;
        let mu = sum / n_f;
        let variance = (n_f * sum_sq - sum * sum) / (n_f * (n_f - 1.0));
        let sigma = variance.max(0.0).sqrt();

        Ok(Self { max, mu, sigma })
    }
}

/// Identifies one precomputed parameter set: the indexed relation, the
/// feature column, and a signature string naming the distance it was
/// computed under (so parameters for two different distances on the same
/// column never collide).
pub type NormalizationKey = (String, String, String);

/// Registry of normalization parameters, keyed by `(relation, column,
/// distance-signature)`. Computing a normalized distance without a
/// persisted entry fails rather than silently falling back to unnormalized
/// output.
#[derive(Debug, Clone, Default)]
pub struct NormalizationRegistry {
    params: HashMap<NormalizationKey, NormalizationParams>,
}

impl NormalizationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            params: HashMap::new(),
        }
    }

    /// Persists `params` for `(relation, column, signature)`, overwriting
    /// any existing entry.
    pub fn put(&mut self, relation: &str, column: &str, signature: &str, params: NormalizationParams) {
        self.params.insert(
            (relation.to_string(), column.to_string(), signature.to_string()),
            params,
        );
    }

    /// Looks up the parameter set for `(relation, column, signature)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadNormalization`] naming the precomputation entry
    /// point to call first when no entry is found.
    pub fn get(&self, relation: &str, column: &str, signature: &str) -> Result<&NormalizationParams> {
        self.params
            .get(&(relation.to_string(), column.to_string(), signature.to_string()))
            .ok_or_else(|| {
                Error::BadNormalization(format!(
                    "no normalization parameters persisted for {relation}.{column} under '{signature}'; \
                     call NormalizationRegistry::put with parameters from NormalizationParams::from_distances first"
                ))
            })
    }

    /// Normalizes `d` into `[0, 1]` using the persisted parameters for
    /// `(relation, column, signature)`.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::get`]'s lookup-miss error.
    pub fn normalize(
        &self,
        kind: NormalizationKind,
        d: f64,
        relation: &str,
        column: &str,
        signature: &str,
    ) -> Result<f64> {
        let params = self.get(relation, column, signature)?;
        Ok(apply(kind, d, params))
    }
}

fn apply(kind: NormalizationKind, d: f64, params: &NormalizationParams) -> f64 {
    match kind {
        NormalizationKind::Minmax => {
            if params.max <= 0.0 {
                0.0
            } else {
                (d / params.max).min(1.0).max(0.0)
            }
        }
        NormalizationKind::Gaussian => {
            if params.sigma <= 0.0 {
                0.5
            } else {
                (((d - params.mu) / (6.0 * params.sigma)) + 0.5).clamp(0.0, 1.0)
            }
        }
    }
}
