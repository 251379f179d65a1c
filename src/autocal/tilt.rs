//! Stake tilt estimation and tilt-aware calibration.
//!
//! Text painted across the stake is perpendicular to it, so the stake tilt
//! equals the text baseline angle. Without usable baselines the markers
//! themselves line up along the stake axis; a least-squares fit of column
//! on row gives its slope. Last comes the orientation of the stake's
//! near-vertical edges: the gradient across a leaning edge points along
//! `(cos t, sin t)`, so `t = atan(gy / gx)`.
use super::ocr::{DetectedMarker, MarkerScan, OcrCalibrator};
use super::{AutoCalibration, CalibrationFailed, OcrEngine, TextDetection};
use crate::aggregate::outliers::median;
use crate::calibration::{CalibrationParameters, MAX_TILT_DEGREES};
use crate::edges::sobel_gradients;
use crate::image::ImageRgb8;
use crate::preprocess::{prepare, NormalizedRegion, PreprocessOptions};
use crate::types::StakeRegion;
use log::{debug, info};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TiltCalibratorOptions {
    /// Text detections below this confidence do not vote on the tilt.
    pub min_text_confidence: f64,
    /// Baselines steeper than this (degrees) are not stake text.
    pub max_text_angle: f64,
    /// Minimum normalized gradient magnitude for an edge pixel.
    pub min_edge_magnitude: f32,
    /// Edge pixels deviating more than this from vertical are ignored.
    pub max_edge_angle: f64,
    /// Edge pixels needed before the edge estimate is trusted.
    pub min_edge_pixels: usize,
    /// Markers needed for a marker axis fit.
    pub min_axis_markers: usize,
    /// Minimum row spread (pixels, standard deviation) of those markers.
    pub min_axis_spread: f64,
}

impl Default for TiltCalibratorOptions {
    fn default() -> Self {
        Self {
            min_text_confidence: 0.5,
            max_text_angle: 30.0,
            min_edge_magnitude: 0.25,
            max_edge_angle: 30.0,
            min_edge_pixels: 20,
            min_axis_markers: 2,
            min_axis_spread: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TiltSource {
    TextBaseline,
    MarkerAxis,
    StakeEdges,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TiltEstimate {
    /// Degrees, positive when the stake top leans towards +x.
    pub angle: f64,
    pub source: TiltSource,
    /// Detections, markers or edge pixels that voted.
    pub votes: usize,
}

#[derive(Clone, Debug, Default)]
pub struct TiltCalibrator {
    pub options: TiltCalibratorOptions,
}

impl TiltCalibrator {
    pub fn new(options: TiltCalibratorOptions) -> Self {
        Self { options }
    }

    /// Median baseline angle of confident text detections.
    pub fn tilt_from_text(&self, detections: &[TextDetection]) -> Option<TiltEstimate> {
        let angles: Vec<f64> = detections
            .iter()
            .filter(|d| d.confidence >= self.options.min_text_confidence)
            .filter_map(TextDetection::baseline_angle)
            .filter(|a| a.abs() <= self.options.max_text_angle)
            .collect();
        Some(TiltEstimate {
            angle: median(&angles)?,
            source: TiltSource::TextBaseline,
            votes: angles.len(),
        })
    }

    /// Tilt of the line through the marker centroids.
    pub fn tilt_from_markers(&self, markers: &[DetectedMarker]) -> Option<TiltEstimate> {
        if markers.len() < self.options.min_axis_markers.max(2) {
            return None;
        }
        let n = markers.len() as f64;
        let mean_x = markers.iter().map(|m| m.x).sum::<f64>() / n;
        let mean_row = markers.iter().map(|m| m.row).sum::<f64>() / n;
        let (cov, var) = markers.iter().fold((0.0, 0.0), |(cov, var), m| {
            let dr = m.row - mean_row;
            (cov + (m.x - mean_x) * dr, var + dr * dr)
        });
        if (var / n).sqrt() < self.options.min_axis_spread {
            return None;
        }
        // Rows grow downward: a top leaning towards +x has dx/drow < 0.
        let angle = -(cov / var).atan().to_degrees();
        (angle.abs() < MAX_TILT_DEGREES).then_some(TiltEstimate {
            angle,
            source: TiltSource::MarkerAxis,
            votes: markers.len(),
        })
    }

    /// Median orientation of strong near-vertical edges in the region.
    pub fn tilt_from_edges(&self, region: &NormalizedRegion) -> Option<TiltEstimate> {
        let grad = sobel_gradients(&region.luma);
        let opts = &self.options;
        let mut angles = Vec::new();
        for y in 1..grad.gx.h.saturating_sub(1) {
            for x in 1..grad.gx.w.saturating_sub(1) {
                if grad.mag.get(x, y) < opts.min_edge_magnitude {
                    continue;
                }
                let gx = grad.gx.get(x, y) as f64;
                let gy = grad.gy.get(x, y) as f64;
                if gx == 0.0 {
                    continue;
                }
                let angle = (gy / gx).atan().to_degrees();
                if angle.abs() <= opts.max_edge_angle {
                    angles.push(angle);
                }
            }
        }
        if angles.len() < opts.min_edge_pixels {
            return None;
        }
        Some(TiltEstimate {
            angle: median(&angles)?,
            source: TiltSource::StakeEdges,
            votes: angles.len(),
        })
    }

    /// Text baselines first, then the marker axis, then stake edges.
    pub fn estimate(
        &self,
        detections: &[TextDetection],
        markers: &[DetectedMarker],
        region: Option<&NormalizedRegion>,
    ) -> Result<TiltEstimate, CalibrationFailed> {
        self.tilt_from_text(detections)
            .or_else(|| self.tilt_from_markers(markers))
            .or_else(|| region.and_then(|r| self.tilt_from_edges(r)))
            .ok_or(CalibrationFailed::NoTiltEvidence)
    }

    /// Applies `estimate` to an existing calibration. An already tilted
    /// calibration keeps its base model. `centerline` fills in a missing
    /// stake axis.
    pub fn wrap(
        &self,
        params: CalibrationParameters,
        estimate: &TiltEstimate,
        centerline: Option<f64>,
    ) -> Result<CalibrationParameters, CalibrationFailed> {
        let mut params = params.with_tilt(estimate.angle);
        if params.stake_centerline_x.is_none() {
            params.stake_centerline_x = centerline;
        }
        params.validate()?;
        Ok(params)
    }

    /// Tilt-aware linear calibration from one reference image.
    ///
    /// The zero reference is the top of the reference text; the scale is
    /// measured along the tilted stake.
    pub fn calibrate_full<E: OcrEngine>(
        &self,
        ocr: &OcrCalibrator<E>,
        image: ImageRgb8<'_>,
        region: StakeRegion,
    ) -> Result<AutoCalibration, CalibrationFailed> {
        let scan = ocr.scan(image, region)?;
        let reference = scan
            .reference
            .as_ref()
            .ok_or(CalibrationFailed::NoReferencePoint)?;

        let normalized = prepare(image, region, &PreprocessOptions::default()).ok();
        let estimate = self.estimate(&scan.detections, &scan.markers, normalized.as_ref())?;
        let markers = numbered(&scan);
        let ppi = tilted_pixels_per_inch(&markers, estimate.angle).ok_or(
            CalibrationFailed::InsufficientMarkers {
                found: markers.len(),
            },
        )?;
        let reference_y = reference.top_row();
        let centerline = scan.centerline().unwrap_or(reference.centroid().0);

        info!(
            "TiltCalibrator: tilt {:.2} deg from {:?}, {:.2} px/in, reference row {:.1}",
            estimate.angle, estimate.source, ppi, reference_y
        );
        let params = CalibrationParameters::linear(ppi, reference_y).with_centerline(centerline);
        let params = self.wrap(params, &estimate, None)?;
        Ok(ocr.detected(params, markers))
    }
}

/// Markers read from stake numbers, without the reference text.
fn numbered(scan: &MarkerScan) -> Vec<DetectedMarker> {
    let reference_row = scan.reference.as_ref().map(|r| r.centroid().1);
    scan.markers
        .iter()
        .filter(|m| !(m.inches == 0.0 && Some(m.row) == reference_row))
        .copied()
        .collect()
}

/// Median over consecutive pairs of `(drow / cos t) / dinch`.
fn tilted_pixels_per_inch(markers: &[DetectedMarker], tilt_degrees: f64) -> Option<f64> {
    let cos = tilt_degrees.to_radians().cos();
    let per_pair: Vec<f64> = markers
        .windows(2)
        .filter_map(|p| {
            let dinch = p[1].inches - p[0].inches;
            let drow = p[0].row - p[1].row;
            (dinch > 0.0 && drow > 0.0).then(|| drow / cos / dinch)
        })
        .collect();
    debug!("TiltCalibrator: per-pair px/in {:?}", per_pair);
    median(&per_pair)
}
