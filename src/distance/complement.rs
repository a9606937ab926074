//! Optional complement functions applied to a (possibly weighted,
//! possibly normalized) membership value `m` in `[0, 1]`.

use crate::error::{Error, Result};

/// A complement function drawn from the small fixed set the pipeline
/// supports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Complement {
    /// `1 - m`.
    Standard,
    /// `(1 - m) / (1 + lambda*m)`.
    Sugeno(f64),
    /// `(1 - m^w)^(1/w)`.
    Yager(f64),
}

impl Complement {
    /// Applies the complement to `m`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadDistance`] if `m` is outside `[0, 1]`, or if a
    /// parameter (`lambda` for [`Self::Sugeno`], `w` for [`Self::Yager`])
    /// is non-finite or non-positive where positivity is required.
    pub fn apply(self, m: f64) -> Result<f64> {
        if !(0.0..=1.0).contains(&m) {
            return Err(Error::BadDistance(format!(
                "complement input {m} is outside [0, 1]"
            )));
        }

        match self {
            Self::Standard => Ok(1.0 - m),
            Self::Sugeno(lambda) => {
                if lambda <= -1.0 {
                    return Err(Error::BadDistance(format!(
                        "sugeno lambda {lambda} must be > -1"
                    )));
                }
                Ok((1.0 - m) / (1.0 + lambda * m))
            }
            Self::Yager(w) => {
                if w <= 0.0 {
                    return Err(Error::BadDistance(format!("yager w {w} must be > 0")));
                }
                Ok((1.0 - m.powf(w)).powf(1.0 / w))
            }
        }
    }
}
