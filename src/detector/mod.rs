//! Snow-line detection along one sample line.
//!
//! The detector reads three column profiles from a [`NormalizedRegion`]
//! (luma, redness and the vertical gradient), lets each enabled signal vote
//! for the row where snow begins and fuses the votes. It never sees the
//! calibration: the caller tells it where to start scanning through
//! [`SampleLine::scan_start_row`].
//!
//! Failures are returned as [`DetectionFailed`] values. They are expected
//! outcomes (night frames, buried stakes) rather than errors, and end up in
//! the per-sample record of the measurement result.

pub mod options;
pub mod signals;
pub mod vote;

pub use options::{
    BrightnessSignalOptions, ColorSignalOptions, DetectorOptions, GradientSignalOptions,
};
pub use signals::SignalVote;
pub use vote::FusedVote;

use crate::preprocess::filters::{smooth_profile, GAUSSIAN_5TAP};
use crate::preprocess::NormalizedRegion;
use crate::types::{DetectionCandidate, SampleLine};
use log::trace;
use serde::{Deserialize, Serialize};

/// Why a sample line produced no candidate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DetectionFailed {
    /// Not enough rows above the scan start to analyse.
    ProfileTooShort { rows: usize },
    /// Sample column lies outside the region.
    ColumnOutOfRange { x: usize },
    /// Snow and stake brightness too similar.
    LowContrast { contrast: f64 },
    /// Region above the scan start is brighter than the snow level.
    InvertedBrightness { contrast: f64 },
    /// No signal found a boundary.
    NoTransition,
}

impl std::fmt::Display for DetectionFailed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProfileTooShort { rows } => write!(f, "profile too short ({rows} rows)"),
            Self::ColumnOutOfRange { x } => write!(f, "column {x} outside region"),
            Self::LowContrast { contrast } => write!(f, "low contrast ({contrast:.3})"),
            Self::InvertedBrightness { contrast } => {
                write!(f, "inverted brightness ({contrast:.3})")
            }
            Self::NoTransition => write!(f, "no snow/stake transition"),
        }
    }
}

/// Column profiles the signals operate on.
#[derive(Clone, Debug)]
struct Profiles {
    luma: Vec<f32>,
    redness: Vec<f32>,
    grad: Vec<f32>,
}

#[derive(Clone, Debug, Default)]
pub struct SnowLineDetector {
    pub options: DetectorOptions,
}

impl SnowLineDetector {
    pub fn new(options: DetectorOptions) -> Self {
        Self { options }
    }

    /// Finds the snow line along `line`.
    ///
    /// The returned `pixel_row` is absolute (source-image rows). Pure
    /// function of its inputs.
    pub fn detect(
        &self,
        region: &NormalizedRegion,
        line: &SampleLine,
    ) -> Result<DetectionCandidate, DetectionFailed> {
        let opts = &self.options;
        if line.x >= region.width() {
            return Err(DetectionFailed::ColumnOutOfRange { x: line.x });
        }
        let start = line.scan_start_row.min(region.height());
        if start < opts.min_profile_rows.max(3) {
            return Err(DetectionFailed::ProfileTooShort { rows: start });
        }

        let profiles = self.profiles(region, line);
        let mut votes = Vec::with_capacity(3);
        let mut brightness_failure = None;

        if opts.gradient.enabled {
            if let Some(v) = signals::gradient_signal(&profiles.grad, start, &opts.gradient) {
                votes.push(v);
            }
        }
        if opts.brightness.enabled {
            match signals::brightness_signal(&profiles.luma, start, &opts.brightness) {
                Ok(v) => votes.push(v),
                Err(reason) => brightness_failure = Some(reason),
            }
        }
        if opts.color.enabled {
            if let Some(v) = signals::color_signal(&profiles.redness, start, &opts.color) {
                votes.push(v);
            }
        }

        // A dark sky over bright snow also produces a gradient edge; without
        // a brightness contrast the gradient alone is not trusted at night.
        if let Some(DetectionFailed::InvertedBrightness { .. }) = brightness_failure {
            votes.retain(|v| v.method != crate::types::DetectionMethod::Gradient);
        }

        trace!(
            "SnowLineDetector::detect line={} start={} votes={:?}",
            line.id,
            start,
            votes
        );

        let fused = vote::fuse(&votes, opts)
            .ok_or_else(|| brightness_failure.unwrap_or(DetectionFailed::NoTransition))?;
        Ok(DetectionCandidate {
            pixel_row: region.to_image_row(fused.row),
            detection_confidence: fused.confidence,
            detection_method: fused.method,
            votes: fused.votes,
        })
    }

    fn profiles(&self, region: &NormalizedRegion, line: &SampleLine) -> Profiles {
        let x0 = line.x.saturating_sub(line.half_width);
        let x1 = line.x + line.half_width + 1;
        let passes = self.options.smoothing_passes;
        Profiles {
            luma: smooth_profile(&region.luma.column_profile(x0, x1), &GAUSSIAN_5TAP, passes),
            redness: smooth_profile(
                &region.redness.column_profile(x0, x1),
                &GAUSSIAN_5TAP,
                passes,
            ),
            grad: region.grad_y.column_profile(x0, x1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageRgb8;
    use crate::preprocess::{prepare, PreprocessOptions};
    use crate::types::{DetectionMethod, StakeRegion};

    fn two_tone(w: usize, h: usize, edge: usize, above: [u8; 3], below: [u8; 3]) -> Vec<[u8; 3]> {
        (0..h)
            .flat_map(|y| std::iter::repeat(if y < edge { above } else { below }).take(w))
            .collect()
    }

    fn region_of(data: &[[u8; 3]], w: usize, h: usize) -> NormalizedRegion {
        let img = ImageRgb8::packed(w, h, data);
        prepare(img, StakeRegion::new(0, 0, w, h), &PreprocessOptions::default())
            .expect("region inside image")
    }

    fn line(x: usize, start: usize) -> SampleLine {
        SampleLine {
            id: 0,
            x,
            half_width: 2,
            scan_start_row: start,
        }
    }

    #[test]
    fn dark_stake_over_snow_detected_at_boundary() {
        let data = two_tone(20, 120, 50, [40, 40, 40], [235, 235, 235]);
        let region = region_of(&data, 20, 120);
        let cand = SnowLineDetector::default()
            .detect(&region, &line(10, 110))
            .expect("clear boundary");
        assert!((cand.pixel_row - 50.0).abs() < 1e-9, "{}", cand.pixel_row);
        assert_eq!(cand.detection_method, DetectionMethod::Fused);
        assert_eq!(cand.detection_confidence, 1.0);
    }

    #[test]
    fn pixel_row_is_absolute() {
        let (w, h) = (30, 200);
        let data = two_tone(w, h, 120, [30, 30, 30], [240, 240, 240]);
        let img = ImageRgb8::packed(w, h, &data);
        let region = prepare(
            img,
            StakeRegion::new(5, 40, 20, 150),
            &PreprocessOptions::default(),
        )
        .expect("inside");
        let cand = SnowLineDetector::default()
            .detect(&region, &line(10, 140))
            .expect("boundary");
        assert!((cand.pixel_row - 120.0).abs() < 1e-9);
    }

    #[test]
    fn red_stake_votes_with_color() {
        let data = two_tone(20, 100, 40, [200, 30, 30], [240, 240, 240]);
        let region = region_of(&data, 20, 100);
        let cand = SnowLineDetector::default()
            .detect(&region, &line(10, 95))
            .expect("boundary");
        assert!((cand.pixel_row - 40.0).abs() < 1.0);
        assert_eq!(cand.votes, 3);
    }

    #[test]
    fn uniform_region_reports_low_contrast() {
        let data = vec![[128u8, 128, 128]; 20 * 100];
        let region = region_of(&data, 20, 100);
        let err = SnowLineDetector::default()
            .detect(&region, &line(10, 90))
            .expect_err("nothing to find");
        assert!(matches!(err, DetectionFailed::LowContrast { .. }), "{err:?}");
    }

    #[test]
    fn night_frame_reports_inverted_brightness() {
        let data = two_tone(20, 100, 40, [230, 230, 230], [20, 20, 20]);
        let region = region_of(&data, 20, 100);
        let err = SnowLineDetector::default()
            .detect(&region, &line(10, 90))
            .expect_err("inverted");
        assert!(matches!(err, DetectionFailed::InvertedBrightness { .. }));
    }

    #[test]
    fn short_profile_and_bad_column_rejected() {
        let data = two_tone(20, 100, 40, [20, 20, 20], [230, 230, 230]);
        let region = region_of(&data, 20, 100);
        let det = SnowLineDetector::default();
        assert_eq!(
            det.detect(&region, &line(10, 4)),
            Err(DetectionFailed::ProfileTooShort { rows: 4 })
        );
        assert_eq!(
            det.detect(&region, &line(25, 90)),
            Err(DetectionFailed::ColumnOutOfRange { x: 25 })
        );
    }
}
