use crate::error::InvalidCalibration;
use serde::{Deserialize, Serialize};

/// Constant scale from a zero-inch reference row.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub pixels_per_inch: f64,
    /// Image row of 0 inches.
    pub reference_y: f64,
}

impl LinearModel {
    pub fn new(pixels_per_inch: f64, reference_y: f64) -> Self {
        Self {
            pixels_per_inch,
            reference_y,
        }
    }

    pub fn validate(&self) -> Result<(), InvalidCalibration> {
        if !(self.pixels_per_inch.is_finite() && self.pixels_per_inch > 0.0) {
            return Err(InvalidCalibration::NonPositiveScale(self.pixels_per_inch));
        }
        if !self.reference_y.is_finite() {
            return Err(InvalidCalibration::NonFinite {
                field: "reference_y",
                value: self.reference_y,
            });
        }
        Ok(())
    }

    /// Rows above the reference give positive inches; rows below it give
    /// negative inches, which are reported as-is.
    #[inline]
    pub fn to_inches(&self, row: f64) -> f64 {
        (self.reference_y - row) / self.pixels_per_inch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_row_is_exactly_zero() {
        for &(ppi, reference) in &[(10.0, 600.0), (7.3, 123.456), (0.1, -4.0)] {
            let m = LinearModel::new(ppi, reference);
            assert_eq!(m.to_inches(reference), 0.0);
        }
    }

    #[test]
    fn below_reference_is_negative() {
        let m = LinearModel::new(10.0, 600.0);
        assert_eq!(m.to_inches(300.0), 30.0);
        assert_eq!(m.to_inches(620.0), -2.0);
    }

    #[test]
    fn scale_must_be_positive() {
        assert_eq!(
            LinearModel::new(0.0, 10.0).validate(),
            Err(InvalidCalibration::NonPositiveScale(0.0))
        );
        assert!(LinearModel::new(-3.0, 10.0).validate().is_err());
        assert!(LinearModel::new(f64::NAN, 10.0).validate().is_err());
        assert!(LinearModel::new(2.0, f64::INFINITY).validate().is_err());
        assert!(LinearModel::new(2.0, 10.0).validate().is_ok());
    }
}
