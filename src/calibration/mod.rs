//! Pixel-row to inches conversion.
//!
//! [`CalibrationParameters`] is the per-resort calibration record and the
//! only structured document the engine parses. The model is a closed enum
//! selected by the `method` field:
//!
//! ```json
//! { "method": "linear", "pixels_per_inch": 10.0, "reference_y": 600,
//!   "stake_centerline_x": 412, "min_depth_threshold": 1.0 }
//!
//! { "method": "marker_interpolation", "markers": {"0": 800, "10": 500} }
//!
//! { "method": "tilt_corrected", "tilt_angle": 4.5, "stake_centerline_x": 412,
//!   "base": { "method": "linear", "pixels_per_inch": 10.0, "reference_y": 600 } }
//! ```

pub mod linear;
pub mod markers;
pub mod tilt;

pub use linear::LinearModel;
pub use markers::{Conversion, Marker, MarkerModel};
pub use tilt::TiltCorrection;

use crate::error::InvalidCalibration;
use serde::{Deserialize, Serialize};

/// Tilt magnitude (degrees) beyond which a calibration is rejected.
pub const MAX_TILT_DEGREES: f64 = 45.0;

fn default_min_depth_threshold() -> f64 {
    1.0
}

/// Untilted models; the base of a tilt-corrected calibration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum UntiltedModel {
    Linear(LinearModel),
    MarkerInterpolation(MarkerModel),
}

impl UntiltedModel {
    pub fn validate(&self) -> Result<(), InvalidCalibration> {
        match self {
            Self::Linear(m) => m.validate(),
            Self::MarkerInterpolation(m) => m.validate(),
        }
    }

    /// Requires a validated model.
    pub(crate) fn convert(&self, row: f64) -> Conversion {
        match self {
            Self::Linear(m) => Conversion {
                inches: m.to_inches(row),
                extrapolated: false,
            },
            Self::MarkerInterpolation(m) => m.to_inches(row),
        }
    }

    /// Row of 0 inches. Requires a validated model.
    pub(crate) fn zero_row(&self) -> f64 {
        match self {
            Self::Linear(m) => m.reference_y,
            Self::MarkerInterpolation(m) => m.row_at(0.0),
        }
    }
}

/// Base model rotated by a known tilt before lookup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TiltedModel {
    /// Degrees, positive when the stake top leans towards +x.
    pub tilt_angle: f64,
    pub base: UntiltedModel,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum CalibrationModel {
    Linear(LinearModel),
    MarkerInterpolation(MarkerModel),
    TiltCorrected(TiltedModel),
}

/// Per-resort calibration. Immutable once built; safe to share.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParameters {
    #[serde(flatten)]
    pub model: CalibrationModel,
    /// Column of the stake axis in source-image pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stake_centerline_x: Option<f64>,
    /// Depths below this are flagged `is_below_threshold`.
    #[serde(default = "default_min_depth_threshold")]
    pub min_depth_threshold: f64,
}

impl CalibrationParameters {
    pub fn from_model(model: CalibrationModel) -> Self {
        Self {
            model,
            stake_centerline_x: None,
            min_depth_threshold: default_min_depth_threshold(),
        }
    }

    pub fn linear(pixels_per_inch: f64, reference_y: f64) -> Self {
        Self::from_model(CalibrationModel::Linear(LinearModel::new(
            pixels_per_inch,
            reference_y,
        )))
    }

    /// Marker calibration from `(inches, row)` pairs in any order.
    pub fn markers(pairs: impl IntoIterator<Item = (f64, f64)>) -> Self {
        Self::from_model(CalibrationModel::MarkerInterpolation(MarkerModel::new(
            pairs.into_iter().map(|(i, r)| Marker::new(i, r)),
        )))
    }

    pub fn with_centerline(mut self, x: f64) -> Self {
        self.stake_centerline_x = Some(x);
        self
    }

    pub fn with_min_depth_threshold(mut self, inches: f64) -> Self {
        self.min_depth_threshold = inches;
        self
    }

    /// Wraps the current model in a tilt correction. An already tilted
    /// model keeps its base and takes the new angle.
    pub fn with_tilt(mut self, tilt_angle: f64) -> Self {
        let base = self.untilted().into_owned();
        self.model = CalibrationModel::TiltCorrected(TiltedModel { tilt_angle, base });
        self
    }

    /// Model without any tilt wrapper.
    pub fn untilted(&self) -> std::borrow::Cow<'_, UntiltedModel> {
        use std::borrow::Cow;
        match &self.model {
            CalibrationModel::Linear(m) => Cow::Owned(UntiltedModel::Linear(*m)),
            CalibrationModel::MarkerInterpolation(m) => {
                Cow::Owned(UntiltedModel::MarkerInterpolation(m.clone()))
            }
            CalibrationModel::TiltCorrected(t) => Cow::Borrowed(&t.base),
        }
    }

    /// Tilt in degrees; 0 for untilted models.
    pub fn tilt_angle(&self) -> f64 {
        match &self.model {
            CalibrationModel::TiltCorrected(t) => t.tilt_angle,
            _ => 0.0,
        }
    }

    pub fn method_name(&self) -> &'static str {
        match self.model {
            CalibrationModel::Linear(_) => "linear",
            CalibrationModel::MarkerInterpolation(_) => "marker_interpolation",
            CalibrationModel::TiltCorrected(_) => "tilt_corrected",
        }
    }

    pub fn validate(&self) -> Result<(), InvalidCalibration> {
        if !(self.min_depth_threshold.is_finite() && self.min_depth_threshold >= 0.0) {
            return Err(InvalidCalibration::InvalidThreshold(
                self.min_depth_threshold,
            ));
        }
        if let Some(x) = self.stake_centerline_x {
            if !x.is_finite() {
                return Err(InvalidCalibration::NonFinite {
                    field: "stake_centerline_x",
                    value: x,
                });
            }
        }
        match &self.model {
            CalibrationModel::Linear(m) => m.validate(),
            CalibrationModel::MarkerInterpolation(m) => m.validate(),
            CalibrationModel::TiltCorrected(t) => {
                if !t.tilt_angle.is_finite() {
                    return Err(InvalidCalibration::NonFinite {
                        field: "tilt_angle",
                        value: t.tilt_angle,
                    });
                }
                if t.tilt_angle.abs() >= MAX_TILT_DEGREES {
                    return Err(InvalidCalibration::TiltOutOfRange(t.tilt_angle));
                }
                if self.stake_centerline_x.is_none() {
                    return Err(InvalidCalibration::MissingCenterline);
                }
                t.base.validate()
            }
        }
    }

    /// Image row of 0 inches (the pivot row for tilt correction).
    pub fn zero_row(&self) -> Result<f64, InvalidCalibration> {
        self.validate()?;
        Ok(self.reference_row())
    }

    /// [`zero_row`](Self::zero_row) without validation.
    pub(crate) fn reference_row(&self) -> f64 {
        self.untilted().zero_row()
    }

    /// Converts an absolute image row on the stake axis to inches above
    /// the reference.
    pub fn to_inches(&self, pixel_row: f64) -> Result<Conversion, InvalidCalibration> {
        self.validate()?;
        Ok(self.convert(None, pixel_row))
    }

    /// Like [`to_inches`](Self::to_inches) for a point sampled at column
    /// `x`. Only tilt-corrected models use the column.
    pub fn to_inches_at(&self, x: f64, pixel_row: f64) -> Result<Conversion, InvalidCalibration> {
        self.validate()?;
        Ok(self.convert(Some(x), pixel_row))
    }

    /// Conversion without validation; callers validate once up front.
    pub(crate) fn convert(&self, x: Option<f64>, pixel_row: f64) -> Conversion {
        match &self.model {
            CalibrationModel::Linear(m) => Conversion {
                inches: m.to_inches(pixel_row),
                extrapolated: false,
            },
            CalibrationModel::MarkerInterpolation(m) => m.to_inches(pixel_row),
            CalibrationModel::TiltCorrected(t) => {
                if t.tilt_angle == 0.0 {
                    return t.base.convert(pixel_row);
                }
                let cx = self.stake_centerline_x.unwrap_or_default();
                let correction = TiltCorrection::new(t.tilt_angle, cx, t.base.zero_row());
                let row = match x {
                    Some(x) => correction.corrected_row_at(x, pixel_row),
                    None => correction.corrected_row(pixel_row),
                };
                t.base.convert(row)
            }
        }
    }
}
