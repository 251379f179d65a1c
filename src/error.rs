//! Structural error types.
//!
//! Detection problems are not errors: see [`crate::detector::DetectionFailed`]
//! and the zero-confidence [`crate::MeasurementResult`].
use crate::types::StakeRegion;
use thiserror::Error;

/// Structurally invalid calibration parameters.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum InvalidCalibration {
    #[error("pixels_per_inch must be finite and > 0, got {0}")]
    NonPositiveScale(f64),
    #[error("marker interpolation needs at least 2 markers, got {0}")]
    TooFewMarkers(usize),
    #[error("marker inch value {0} is negative or not finite")]
    InvalidMarkerInches(f64),
    #[error("marker inches must be strictly increasing ({prev} then {next})")]
    NonMonotonicInches { prev: f64, next: f64 },
    #[error("marker rows must strictly decrease as inches increase ({inches}\" at row {row})")]
    NonMonotonicRows { inches: f64, row: f64 },
    #[error("{field} must be finite, got {value}")]
    NonFinite { field: &'static str, value: f64 },
    #[error("tilt angle {0} deg is outside (-45, 45)")]
    TiltOutOfRange(f64),
    #[error("tilt correction requires stake_centerline_x")]
    MissingCenterline,
    #[error("min_depth_threshold must be finite and >= 0, got {0}")]
    InvalidThreshold(f64),
    #[error("unknown marker key {0:?}")]
    BadMarkerKey(String),
}

/// Errors aborting a single measurement call.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum MeasureError {
    #[error("stake region {region:?} extends past image bounds {width}x{height}")]
    RegionOutOfBounds {
        region: StakeRegion,
        width: usize,
        height: usize,
    },
    #[error("stake region {0:?} has zero area")]
    EmptyRegion(StakeRegion),
    #[error("invalid calibration: {0}")]
    InvalidCalibration(#[from] InvalidCalibration),
}
