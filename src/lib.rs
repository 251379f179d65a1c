#![doc = include_str!("../README.md")]

// Measurement core
pub mod aggregate;
pub mod calibration;
pub mod detector;
pub mod image;
pub mod preprocess;
pub mod types;

// Calibration derivation, persistence and tooling
pub mod autocal;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod store;

// Low-level building blocks
pub mod edges;

// --- High-level re-exports -------------------------------------------------

pub use crate::calibration::{CalibrationModel, CalibrationParameters, Conversion};
pub use crate::error::{InvalidCalibration, MeasureError};
pub use crate::pipeline::{EngineOptions, MeasurementHooks, SnowStakeMeasurer};
pub use crate::types::{MeasurementResult, SampleMeasurement, StakeRegion};

// --- Prelude ---------------------------------------------------------------

/// Everything needed to measure a frame.
///
/// ```no_run
/// use snow_stake::prelude::*;
///
/// # fn main() -> Result<(), MeasureError> {
/// let (w, h) = (640usize, 480usize);
/// let pixels = vec![[0u8; 3]; w * h];
/// let img = ImageRgb8::packed(w, h, &pixels);
///
/// let resort = ResortCalibration::new(
///     "demo",
///     StakeRegion::new(300, 40, 40, 420),
///     CalibrationParameters::linear(9.5, 440.0).with_centerline(320.0),
/// );
/// let measurer = SnowStakeMeasurer::new(&EngineOptions::default());
/// let result = measurer.measure_image(img, &resort, None)?;
/// println!("depth={:?} confidence={:.2}", result.snow_depth_inches, result.confidence_score);
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::image::{ImageRgb8, ImageU8};
    pub use crate::store::{ConfigStore, ResortCalibration};
    pub use crate::{
        CalibrationParameters, EngineOptions, MeasureError, MeasurementResult,
        SnowStakeMeasurer, StakeRegion,
    };
}
