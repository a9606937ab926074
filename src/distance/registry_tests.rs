use super::minkowski::MinkowskiNorm;
use super::registry::{DeclaredSignature, DistanceCallable, DistanceClause, DistanceRegistry};
use crate::error::Result;
use std::sync::Arc;

struct ScaledL1;
impl DistanceCallable for ScaledL1 {
    fn signature(&self) -> DeclaredSignature {
        DeclaredSignature { param_count: 1 }
    }
    fn invoke(&self, a: &[f64], b: &[f64], params: &[f64]) -> Result<f64> {
        let scale = params[0];
        Ok(scale * a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum::<f64>())
    }
}

#[test]
fn resolves_builtin_minkowski_clause() {
    let reg = DistanceRegistry::new();
    let clause = DistanceClause::Minkowski {
        norm: MinkowskiNorm::from_s(2.0).unwrap(),
        weights: None,
    };
    let d = reg.resolve(&clause, &[0.0, 0.0], &[3.0, 4.0]).unwrap();
    assert!((d - 5.0).abs() < 1e-9);
}

#[test]
fn resolves_named_extension_distance() {
    let mut reg = DistanceRegistry::new();
    reg.register("scaled_l1", Arc::new(ScaledL1));
    let clause = DistanceClause::Named {
        name: "scaled_l1".into(),
        params: vec![2.0],
    };
    let d = reg.resolve(&clause, &[0.0], &[3.0]).unwrap();
    assert!((d - 6.0).abs() < 1e-9);
}

#[test]
fn rejects_unknown_named_distance() {
    let reg = DistanceRegistry::new();
    let clause = DistanceClause::Named {
        name: "nope".into(),
        params: vec![],
    };
    assert!(reg.resolve(&clause, &[0.0], &[1.0]).is_err());
}

#[test]
fn rejects_arity_mismatch() {
    let mut reg = DistanceRegistry::new();
    reg.register("scaled_l1", Arc::new(ScaledL1));
    let clause = DistanceClause::Named {
        name: "scaled_l1".into(),
        params: vec![],
    };
    assert!(reg.resolve(&clause, &[0.0], &[1.0]).is_err());
}
