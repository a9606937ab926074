//! Mark builder: derives per-dimension partition boundaries from a sample
//! of indexed rows, using either an equal-width (equidistant) or
//! equal-population (equifrequent) strategy.

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{MarksConfig, MarksStrategy};
use crate::error::{Error, Result};
use crate::feature::RowSource;

/// Minimum number of non-null sample rows required to build marks.
const MIN_SAMPLES: usize = 256;

/// Per-dimension partition boundaries, in the two-sided `[D][P+1]`
/// convention: `boundaries[d]` holds `P+1` values bracketing `P` cells,
/// with `boundaries[d][0] == min_d` and `boundaries[d][P] == max_d`.
///
/// Built once at index creation and read-only thereafter. Persisted
/// through the index-relation metadata slot as a sidecar file next to
/// the page store, not inline in the paginated data pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marks {
    partitions: u8,
    boundaries: Vec<Vec<f64>>,
}

impl Marks {
    /// Number of dimensions covered by these marks.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.boundaries.len()
    }

    /// Number of cells per dimension (`P`).
    #[must_use]
    pub fn partitions(&self) -> u8 {
        self.partitions
    }

    /// The `P+1` boundary values for dimension `d`.
    #[must_use]
    pub fn row(&self, d: usize) -> &[f64] {
        &self.boundaries[d]
    }

    /// The boundary at `(d, p)`, `0 <= p <= P`.
    #[must_use]
    pub fn boundary(&self, d: usize, p: usize) -> f64 {
        self.boundaries[d][p]
    }

    /// Persists these marks to `path` through `bincode`, matching the
    /// index-relation metadata attachment described in the crate's
    /// design notes. Overwrites any existing file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] on a write failure.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = bincode::serialize(self)
            .map_err(|e| Error::Corrupted(format!("failed to serialize marks: {e}")))?;
        let mut file = std::fs::File::create(path)?;
        file.write_all(&bytes)?;
        Ok(())
    }

    /// Loads marks previously written by [`Self::save`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corrupted`] if the sidecar file is missing or
    /// its contents do not deserialize into a valid `Marks` value.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            Error::Corrupted(format!("marks attachment missing at {}: {e}", path.display()))
        })?;
        bincode::deserialize(&bytes)
            .map_err(|e| Error::Corrupted(format!("failed to deserialize marks: {e}")))
    }

    fn empty(d: usize, p: u8) -> Self {
        Self {
            partitions: p,
            boundaries: vec![vec![0.0; usize::from(p) + 1]; d],
        }
    }
}

/// Builds marks from up to `cfg.n_samples` rows drawn from `source`,
/// following `cfg.strategy`.
///
/// # Errors
///
/// Returns [`Error::InsufficientSamples`] if fewer than `cfg.min_samples`
/// non-null feature vectors are obtained, or [`Error::BadVector`] if a
/// sampled vector contains a NaN.
pub fn build(source: &mut dyn RowSource, cfg: &MarksConfig) -> Result<Marks> {
    let rows = source.sample_rows(cfg.n_samples)?;
    let features: Vec<&crate::feature::FeatureVector> = rows
        .iter()
        .filter_map(|r| r.feature.as_ref())
        .collect();

    if features.len() < cfg.min_samples.max(MIN_SAMPLES) {
        return Err(Error::InsufficientSamples {
            required: cfg.min_samples.max(MIN_SAMPLES),
            found: features.len(),
        });
    }

    let d = features.iter().map(|f| f.dim()).min().unwrap_or(0);
    let max_dim = features.iter().map(|f| f.dim()).max().unwrap_or(0);
    if max_dim != d {
        warn!(
            min_dim = d,
            max_dim, "sampled feature vectors disagree in width; shrinking to the minimum observed"
        );
    }
    let (min, max) = min_max_pass(&features, d)?;

    match cfg.strategy {
        MarksStrategy::Equidistant => Ok(equidistant(d, cfg.max_partitions, &min, &max)),
        MarksStrategy::Equifrequent => {
            equifrequent(&features, d, cfg.max_partitions, cfg.sampling_frequency, &min, &max)
        }
    }
}

fn min_max_pass(
    features: &[&crate::feature::FeatureVector],
    d: usize,
) -> Result<(Vec<f64>, Vec<f64>)> {
    let mut min = vec![f64::INFINITY; d];
    let mut max = vec![f64::NEG_INFINITY; d];

    for f in features {
        for dim in 0..d {
            let v = f.get(dim).expect("reduced to minimum observed width");
            if v.is_nan() {
                return Err(Error::BadVector(format!(
                    "sample contains NaN at dimension {dim}"
                )));
            }
            if v < min[dim] {
                min[dim] = v;
            }
            if v > max[dim] {
                max[dim] = v;
            }
        }
    }

    Ok((min, max))
}

fn equidistant(d: usize, max_partitions: u8, min: &[f64], max: &[f64]) -> Marks {
    let p = max_partitions;
    let mut marks = Marks::empty(d, p);

    for dim in 0..d {
        let row = &mut marks.boundaries[dim];
        row[0] = min[dim];
        row[usize::from(p)] = max[dim];
        let span = max[dim] - min[dim];
        for k in 1..usize::from(p) {
            #[allow(clippy::cast_precision_loss)]
            let frac = k as f64 / f64::from(p);
            row[k] = min[dim] + frac * span;
        }
    }

    marks
}

fn equifrequent(
    features: &[&crate::feature::FeatureVector],
    d: usize,
    max_partitions: u8,
    sampling_frequency: usize,
    min: &[f64],
    max: &[f64],
) -> Result<Marks> {
    let p = max_partitions;
    let sf = sampling_frequency.max(1);
    let mut marks = Marks::empty(d, p);

    for dim in 0..d {
        let row = &mut marks.boundaries[dim];
        row[0] = min[dim];
        row[usize::from(p)] = max[dim];

        let span = max[dim] - min[dim];
        if span <= 0.0 {
            // Degenerate dimension: every cell collapses to 0.
            for k in 1..usize::from(p) {
                row[k] = min[dim];
            }
            continue;
        }

        let mut freq = vec![0u64; sf];
        let mut n: u64 = 0;
        for f in features {
            let v = f.get(dim).expect("reduced to minimum observed width");
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let cell = (((v - min[dim]) / span) * sf as f64)
                .floor()
                .clamp(0.0, (sf - 1) as f64) as usize;
            freq[cell] += 1;
            n += 1;
        }

        let mut sum: u64 = 0;
        let mut next_partition: usize = 1;
        for (cell, count) in freq.iter().enumerate() {
            sum += count;
            #[allow(clippy::cast_precision_loss)]
            while next_partition < usize::from(p) && sum as f64 >= (next_partition as f64 * n as f64) / f64::from(p)
            {
                #[allow(clippy::cast_precision_loss)]
                let frac = (cell + 1) as f64 / sf as f64;
                row[next_partition] = min[dim] + frac * span;
                next_partition += 1;
            }
        }
        // Any partitions not reached by the histogram walk (possible when
        // the tail of the range has zero mass) collapse to the upper wall.
        for k in next_partition..usize::from(p) {
            row[k] = max[dim];
        }
    }

    Ok(marks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{FeatureVector, HeapTid, SampleRow};

    struct FixedSource(Vec<SampleRow>);

    impl RowSource for FixedSource {
        fn sample_rows(&mut self, limit: usize) -> Result<Vec<SampleRow>> {
            Ok(self.0.iter().take(limit).cloned().collect())
        }

        fn scan_live_rows(
            &mut self,
            on_row: &mut dyn FnMut(SampleRow) -> Result<()>,
        ) -> Result<()> {
            for row in self.0.drain(..) {
                on_row(row)?;
            }
            Ok(())
        }
    }

    fn row(block: u32, values: &[f64]) -> SampleRow {
        SampleRow {
            heap_tid: HeapTid::new(block, 0),
            feature: Some(FeatureVector::new(values.to_vec()).unwrap()),
        }
    }

    fn uniform_rows(n: u32, dims: usize) -> Vec<SampleRow> {
        (0..n)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let t = f64::from(i) / f64::from(n.max(1) - 1).max(1.0);
                row(i, &vec![t; dims])
            })
            .collect()
    }

    #[test]
    fn rejects_too_few_samples() {
        let mut src = FixedSource(vec![row(0, &[1.0, 2.0]); 10]);
        let cfg = MarksConfig::default();
        let err = build(&mut src, &cfg).unwrap_err();
        assert!(matches!(err, Error::InsufficientSamples { .. }));
    }

    #[test]
    fn mismatched_widths_shrink_to_the_minimum_observed() {
        let mut rows = uniform_rows(300, 3);
        rows[0] = row(0, &[0.0, 0.0]);
        rows[1] = row(1, &[1.0, 1.0]);
        let mut src = FixedSource(rows);
        let cfg = MarksConfig {
            strategy: MarksStrategy::Equidistant,
            max_partitions: 4,
            min_samples: 256,
            ..MarksConfig::default()
        };
        let marks = build(&mut src, &cfg).unwrap();
        assert_eq!(marks.dim(), 2);
    }

    #[test]
    fn equidistant_marks_span_min_to_max() {
        let mut rows = uniform_rows(300, 2);
        rows[0] = row(0, &[0.0, 0.0]);
        rows[1] = row(1, &[1.0, 1.0]);
        let mut src = FixedSource(rows);
        let cfg = MarksConfig {
            strategy: MarksStrategy::Equidistant,
            max_partitions: 4,
            min_samples: 256,
            ..MarksConfig::default()
        };
        let marks = build(&mut src, &cfg).unwrap();
        assert_eq!(marks.partitions(), 4);
        assert_eq!(marks.boundary(0, 0), 0.0);
        assert_eq!(marks.boundary(0, 4), 1.0);
        // interior marks are monotone
        for p in 0..4 {
            assert!(marks.boundary(0, p) <= marks.boundary(0, p + 1));
        }
    }

    #[test]
    fn degenerate_dimension_collapses_to_single_cell() {
        let mut rows = uniform_rows(300, 1);
        for r in &mut rows {
            r.feature = Some(FeatureVector::new(vec![7.0]).unwrap());
        }
        let mut src = FixedSource(rows);
        let cfg = MarksConfig {
            strategy: MarksStrategy::Equifrequent,
            max_partitions: 8,
            min_samples: 256,
            ..MarksConfig::default()
        };
        let marks = build(&mut src, &cfg).unwrap();
        assert_eq!(marks.boundary(0, 0), 7.0);
        assert_eq!(marks.boundary(0, 8), 7.0);
    }

    #[test]
    fn equifrequent_partitions_are_monotone_and_bounded() {
        let mut rows = uniform_rows(2000, 1);
        rows.push(row(9999, &[0.0]));
        rows.push(row(10000, &[1.0]));
        let mut src = FixedSource(rows);
        let cfg = MarksConfig {
            strategy: MarksStrategy::Equifrequent,
            max_partitions: 10,
            min_samples: 256,
            ..MarksConfig::default()
        };
        let marks = build(&mut src, &cfg).unwrap();
        for p in 0..10 {
            assert!(marks.boundary(0, p) <= marks.boundary(0, p + 1));
        }
        assert_eq!(marks.boundary(0, 0), 0.0);
        assert_eq!(marks.boundary(0, 10), 1.0);
    }

    #[test]
    fn marks_roundtrip_through_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.marks");
        let mut rows = uniform_rows(300, 2);
        rows[0] = row(0, &[0.0, 0.0]);
        rows[1] = row(1, &[1.0, 1.0]);
        let mut src = FixedSource(rows);
        let cfg = MarksConfig {
            max_partitions: 4,
            min_samples: 256,
            ..MarksConfig::default()
        };
        let marks = build(&mut src, &cfg).unwrap();
        marks.save(&path).unwrap();
        let loaded = Marks::load(&path).unwrap();
        assert_eq!(marks, loaded);
    }

    #[test]
    fn load_reports_corrupted_when_sidecar_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.marks");
        assert!(matches!(Marks::load(&path), Err(Error::Corrupted(_))));
    }
}
