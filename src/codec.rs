//! Approximation codec: maps a feature vector onto the cell grid defined by
//! a [`Marks`] instance.

use crate::feature::FeatureVector;
use crate::marks::Marks;

/// The `D`-byte cell-index sequence describing which grid box a vector
/// falls into. `apx[d]` is the cell of dimension `d`, in `[0, P-1]`.
pub type Approximation = Vec<u8>;

/// Encodes `f` against `marks`: pure and deterministic.
///
/// For each dimension `d`, finds the largest `p` in `[0, P-1]` such that
/// `marks.boundary(d, p) <= f[d]`; `apx[d] = clamp(p, 0, 255)`. Values
/// below the lower wall map to cell 0.
///
/// Dimensions beyond `min(f.dim(), marks.dim())` are ignored, matching the
/// index's convention of comparing only the common prefix of dimensions.
#[must_use]
pub fn encode(f: &FeatureVector, marks: &Marks) -> Approximation {
    let d = f.dim().min(marks.dim());
    let p = marks.partitions();
    let mut apx = Vec::with_capacity(d);

    for dim in 0..d {
        let v = f.get(dim).expect("dim bounded by f.dim()");
        let row = marks.row(dim);
        let mut cell: u8 = 0;
        for candidate in 0..p {
            if row[usize::from(candidate)] <= v {
                cell = candidate;
            } else {
                break;
            }
        }
        apx.push(cell);
    }

    apx
}

/// Returns the cell index for dimension `d` in an already-encoded
/// approximation.
#[must_use]
pub fn get_word(apx: &[u8], d: usize) -> u8 {
    apx[d]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MarksConfig;
    use crate::feature::{HeapTid, RowSource, SampleRow};
    use crate::marks;

    struct Fixed(Vec<SampleRow>);
    impl RowSource for Fixed {
        fn sample_rows(&mut self, limit: usize) -> crate::error::Result<Vec<SampleRow>> {
            Ok(self
                .0
                .iter()
                .take(limit)
                .map(|r| SampleRow {
                    heap_tid: r.heap_tid,
                    feature: r.feature.clone(),
                })
                .collect())
        }
        fn scan_live_rows(
            &mut self,
            _on_row: &mut dyn FnMut(SampleRow) -> crate::error::Result<()>,
        ) -> crate::error::Result<()> {
            Ok(())
        }
    }

    fn build_unit_marks() -> Marks {
        let rows: Vec<SampleRow> = (0..300)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let t = f64::from(i) / 299.0;
                SampleRow {
                    heap_tid: HeapTid::new(i, 0),
                    feature: Some(FeatureVector::new(vec![t]).unwrap()),
                }
            })
            .collect();
        let mut src = Fixed(rows);
        let cfg = MarksConfig {
            max_partitions: 4,
            min_samples: 256,
            ..MarksConfig::default()
        };
        marks::build(&mut src, &cfg).unwrap()
    }

    #[test]
    fn encode_maps_lower_wall_value_to_cell_zero() {
        let marks = build_unit_marks();
        let f = FeatureVector::new(vec![0.0]).unwrap();
        let apx = encode(&f, &marks);
        assert_eq!(get_word(&apx, 0), 0);
    }

    #[test]
    fn encode_maps_upper_wall_value_to_last_cell() {
        let marks = build_unit_marks();
        let f = FeatureVector::new(vec![1.0]).unwrap();
        let apx = encode(&f, &marks);
        assert_eq!(get_word(&apx, 0), marks.partitions() - 1);
    }

    #[test]
    fn encode_is_deterministic() {
        let marks = build_unit_marks();
        let f = FeatureVector::new(vec![0.37]).unwrap();
        assert_eq!(encode(&f, &marks), encode(&f, &marks));
    }

    #[test]
    fn encode_truncates_to_shorter_of_vector_or_marks() {
        let marks = build_unit_marks();
        let f = FeatureVector::new(vec![0.5, 0.5]).unwrap();
        let apx = encode(&f, &marks);
        assert_eq!(apx.len(), 1);
    }
}
