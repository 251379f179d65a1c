//! Calibration auto-detectors.
//!
//! Both detectors run offline on a clear reference image and produce an
//! [`AutoCalibration`]: parameters for the configuration store plus a
//! quality score that drift checks can compare over time. Text recognition
//! is delegated to an [`OcrEngine`]; this crate only interprets what the
//! engine reads.
//!
//! - [`ocr::OcrCalibrator`] turns numeric marker text into a marker
//!   interpolation (or linear) calibration.
//! - [`tilt::TiltCalibrator`] estimates the stake tilt from text baselines,
//!   then the line through the markers, then stake edge orientation, and
//!   wraps a base model.

pub mod ocr;
pub mod tilt;

pub use ocr::{
    calibration_confidence, DetectedMarker, MarkerScan, OcrCalibrator, OcrCalibratorOptions,
};
pub use tilt::{TiltCalibrator, TiltCalibratorOptions, TiltEstimate, TiltSource};

use crate::calibration::CalibrationParameters;
use crate::error::InvalidCalibration;
use crate::image::ImageRgb8;
use crate::types::StakeRegion;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One piece of recognized text.
///
/// `bbox` corners are ordered top-left, top-right, bottom-right,
/// bottom-left as `[x, y]` pixel coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextDetection {
    pub text: String,
    pub bbox: [[f64; 2]; 4],
    #[serde(default = "full_confidence")]
    pub confidence: f64,
}

fn full_confidence() -> f64 {
    1.0
}

impl TextDetection {
    pub fn new(text: impl Into<String>, bbox: [[f64; 2]; 4], confidence: f64) -> Self {
        Self {
            text: text.into(),
            bbox,
            confidence,
        }
    }

    /// Mean of the four corners.
    pub fn centroid(&self) -> (f64, f64) {
        let (sx, sy) = self
            .bbox
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p[0], sy + p[1]));
        (sx * 0.25, sy * 0.25)
    }

    /// Upper edge of the text (smaller y of the two top corners).
    pub fn top_row(&self) -> f64 {
        self.bbox[0][1].min(self.bbox[1][1])
    }

    /// Angle of the top-left to top-right edge in degrees; `None` for a
    /// degenerate box.
    pub fn baseline_angle(&self) -> Option<f64> {
        let dx = self.bbox[1][0] - self.bbox[0][0];
        let dy = self.bbox[1][1] - self.bbox[0][1];
        if dx.abs() < 1e-9 {
            return None;
        }
        Some((dy / dx).atan().to_degrees())
    }

    /// Same detection shifted by `(dx, dy)`.
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        let mut out = self.clone();
        for p in out.bbox.iter_mut() {
            p[0] += dx;
            p[1] += dy;
        }
        out
    }
}

/// Text recognition collaborator.
///
/// Receives the cropped stake region; returned boxes are in the crop's
/// coordinates.
pub trait OcrEngine {
    fn recognize(&self, region: ImageRgb8<'_>) -> Vec<TextDetection>;
}

/// Replays detections recorded by an external OCR run on the full image.
///
/// `origin` is the crop position the next `recognize` call refers to;
/// detections whose centroid falls outside the crop are dropped.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PrecomputedOcr {
    pub detections: Vec<TextDetection>,
    #[serde(skip)]
    origin: (usize, usize),
}

impl PrecomputedOcr {
    pub fn new(detections: Vec<TextDetection>) -> Self {
        Self {
            detections,
            origin: (0, 0),
        }
    }

    /// Sets the crop origin used to translate detections.
    pub fn for_region(mut self, region: &StakeRegion) -> Self {
        self.origin = (region.x, region.y);
        self
    }
}

impl OcrEngine for PrecomputedOcr {
    fn recognize(&self, region: ImageRgb8<'_>) -> Vec<TextDetection> {
        let (ox, oy) = (self.origin.0 as f64, self.origin.1 as f64);
        self.detections
            .iter()
            .map(|d| d.translated(-ox, -oy))
            .filter(|d| {
                let (cx, cy) = d.centroid();
                cx >= 0.0 && cy >= 0.0 && cx < region.w as f64 && cy < region.h as f64
            })
            .collect()
    }
}

/// Why a calibration could not be derived.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum CalibrationFailed {
    #[error("stake region {0:?} does not fit the image")]
    RegionOutOfBounds(StakeRegion),
    #[error("no text detected in the stake region")]
    NoTextDetected,
    #[error("found {found} usable marker(s), need at least 2")]
    InsufficientMarkers { found: usize },
    #[error("reference text (e.g. \"24 hour total\") not found")]
    NoReferencePoint,
    #[error("marker values do not increase up the stake")]
    NonMonotonicMarkers,
    #[error("no text baselines or stake edges to estimate tilt from")]
    NoTiltEvidence,
    #[error("derived calibration is invalid: {0}")]
    Invalid(#[from] InvalidCalibration),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationSource {
    /// Fitted to markers read from the reference image.
    Detected,
    /// The image held too little evidence; a known calibration was kept.
    Fallback,
}

/// Derived calibration with its quality score.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AutoCalibration {
    pub params: CalibrationParameters,
    /// `[0, 1]`: marker coverage times scale consistency, or the configured
    /// fallback confidence.
    pub confidence: f64,
    /// Markers the parameters were fitted to; empty for a fallback.
    pub markers: Vec<DetectedMarker>,
    pub source: CalibrationSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(x: f64, y: f64, w: f64, h: f64) -> [[f64; 2]; 4] {
        [[x, y], [x + w, y], [x + w, y + h], [x, y + h]]
    }

    #[test]
    fn geometry_of_axis_aligned_box() {
        let d = TextDetection::new("10", boxed(10.0, 20.0, 8.0, 6.0), 0.9);
        assert_eq!(d.centroid(), (14.0, 23.0));
        assert_eq!(d.top_row(), 20.0);
        assert_eq!(d.baseline_angle(), Some(0.0));
    }

    #[test]
    fn baseline_angle_follows_top_edge() {
        let d = TextDetection::new(
            "24 HOUR TOTAL",
            [[0.0, 0.0], [10.0, 10.0], [5.0, 15.0], [-5.0, 5.0]],
            1.0,
        );
        assert!((d.baseline_angle().expect("angle") - 45.0).abs() < 1e-9);
    }

    #[test]
    fn precomputed_ocr_translates_into_crop() {
        let ocr = PrecomputedOcr::new(vec![
            TextDetection::new("6", boxed(105.0, 210.0, 4.0, 4.0), 0.8),
            TextDetection::new("far away", boxed(900.0, 10.0, 4.0, 4.0), 0.8),
        ])
        .for_region(&StakeRegion::new(100, 200, 20, 50));
        let data = vec![[0u8; 3]; 20 * 50];
        let got = ocr.recognize(ImageRgb8::packed(20, 50, &data));
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].centroid(), (7.0, 12.0));
    }

    #[test]
    fn detections_parse_without_confidence() {
        let d: TextDetection = serde_json::from_str(
            r#"{"text": "12", "bbox": [[0, 0], [4, 0], [4, 3], [0, 3]]}"#,
        )
        .expect("detection");
        assert_eq!(d.confidence, 1.0);
    }
}
