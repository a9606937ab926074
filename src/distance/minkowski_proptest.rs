//! Algebraic invariants of the Minkowski distance family, checked against
//! randomly generated vectors rather than fixed examples.

use proptest::prelude::*;

use super::minkowski::{distance, MinkowskiNorm};

fn finite_vec(dim: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-1.0e3..1.0e3_f64, dim..=dim)
}

proptest! {
    #[test]
    fn distance_is_symmetric(a in finite_vec(4), b in finite_vec(4), s in 0.01..99.0_f64) {
        let norm = MinkowskiNorm::from_s(s).unwrap();
        let ab = distance(&a, &b, norm, None).unwrap();
        let ba = distance(&b, &a, norm, None).unwrap();
        prop_assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn distance_is_non_negative(a in finite_vec(4), b in finite_vec(4), s in 0.01..99.0_f64) {
        let norm = MinkowskiNorm::from_s(s).unwrap();
        let d = distance(&a, &b, norm, None).unwrap();
        prop_assert!(d >= 0.0);
    }

    #[test]
    fn distance_to_self_is_zero(a in finite_vec(4), s in 0.01..99.0_f64) {
        let norm = MinkowskiNorm::from_s(s).unwrap();
        let d = distance(&a, &a, norm, None).unwrap();
        prop_assert!(d.abs() < 1e-9);
    }

    #[test]
    fn max_norm_never_exceeds_any_ls_norm(a in finite_vec(4), b in finite_vec(4), s in 0.01..99.0_f64) {
        let ls = MinkowskiNorm::from_s(s).unwrap();
        let l_inf = distance(&a, &b, MinkowskiNorm::max(), None).unwrap();
        let l_s = distance(&a, &b, ls, None).unwrap();
        prop_assert!(l_inf <= l_s + 1e-6);
    }

    #[test]
    fn scaling_both_vectors_scales_distance_linearly(
        a in finite_vec(3), b in finite_vec(3), s in 0.01..99.0_f64, k in 0.1..10.0_f64,
    ) {
        let norm = MinkowskiNorm::from_s(s).unwrap();
        let base = distance(&a, &b, norm, None).unwrap();
        let scaled_a: Vec<f64> = a.iter().map(|v| v * k).collect();
        let scaled_b: Vec<f64> = b.iter().map(|v| v * k).collect();
        let scaled = distance(&scaled_a, &scaled_b, norm, None).unwrap();
        prop_assert!((scaled - base * k).abs() < 1e-6 * (1.0 + base * k));
    }
}
