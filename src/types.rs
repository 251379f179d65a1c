use crate::detector::DetectionFailed;
use serde::{Deserialize, Serialize};

/// Rectangle in source-image pixels where the stake lives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeRegion {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl StakeRegion {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// One vertical scan profile inside a normalized region.
///
/// Coordinates are region-local. The detector scans upward from
/// `scan_start_row` towards the region top.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleLine {
    pub id: usize,
    /// Center column of the profile.
    pub x: usize,
    /// Half-width of the averaging window around `x`.
    pub half_width: usize,
    /// Row where the upward scan begins (usually the zero-inch reference).
    pub scan_start_row: usize,
}

/// Which detection signal(s) produced a candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    Gradient,
    Brightness,
    StakeColor,
    /// Two or more signals voted and were fused.
    Fused,
}

/// Raw detector output for one sample line.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DetectionCandidate {
    /// Absolute image row where snow begins (fractional).
    pub pixel_row: f64,
    /// Deterministic confidence in `[0, 1]`.
    pub detection_confidence: f64,
    pub detection_method: DetectionMethod,
    /// Number of signals that voted.
    pub votes: usize,
}

/// Per-sample record kept in the final result for traceability.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SampleMeasurement {
    pub sample_line_id: usize,
    /// Absolute image column of the sample line.
    pub x_position: usize,
    pub snow_line_row: Option<f64>,
    pub depth_inches: Option<f64>,
    /// Detection confidence after calibration discounts; 0 on failure.
    pub confidence: f64,
    pub method: Option<DetectionMethod>,
    /// Conversion fell outside the outermost calibration markers.
    #[serde(default)]
    pub extrapolated: bool,
    /// Excluded from the final average by outlier rejection.
    #[serde(default)]
    pub rejected: bool,
    pub failure: Option<DetectionFailed>,
}

impl SampleMeasurement {
    pub fn failed(sample_line_id: usize, x_position: usize, failure: DetectionFailed) -> Self {
        Self {
            sample_line_id,
            x_position,
            snow_line_row: None,
            depth_inches: None,
            confidence: 0.0,
            method: None,
            extrapolated: false,
            rejected: false,
            failure: Some(failure),
        }
    }

    /// True when the sample produced a depth and survived outlier rejection.
    pub fn is_used(&self) -> bool {
        self.depth_inches.is_some() && !self.rejected
    }
}

/// Final outcome of one measurement call. Owned by the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeasurementResult {
    /// `None` when no sample line produced a reading.
    pub snow_depth_inches: Option<f64>,
    pub confidence_score: f64,
    pub sample_measurements: Vec<SampleMeasurement>,
    /// Depth is below the resort's `min_depth_threshold` (stake clear).
    pub is_below_threshold: bool,
    /// Capture time supplied by the caller (seconds since the Unix epoch).
    pub timestamp: Option<u64>,
    pub depth_min: Option<f64>,
    pub depth_max: Option<f64>,
}

impl MeasurementResult {
    /// Degraded-but-valid result for an unreadable image.
    pub fn unreadable(sample_measurements: Vec<SampleMeasurement>) -> Self {
        Self {
            snow_depth_inches: None,
            confidence_score: 0.0,
            sample_measurements,
            is_below_threshold: false,
            timestamp: None,
            depth_min: None,
            depth_max: None,
        }
    }

    /// Depth to report downstream: 0 when the stake is clear.
    pub fn reported_depth(&self) -> Option<f64> {
        if self.is_below_threshold {
            Some(0.0)
        } else {
            self.snow_depth_inches
        }
    }

    pub fn used_samples(&self) -> usize {
        self.sample_measurements
            .iter()
            .filter(|s| s.is_used())
            .count()
    }
}
