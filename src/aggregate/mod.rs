//! Multi-sample aggregation: run the detector over evenly spaced sample
//! lines, convert each candidate through the calibration, reject outliers
//! and combine the survivors into one depth with a confidence score.
//!
//! Zero usable samples is not an error; it yields
//! [`MeasurementResult::unreadable`].

pub mod options;
pub mod outliers;

pub use options::AggregatorOptions;

use crate::calibration::CalibrationParameters;
use crate::detector::SnowLineDetector;
use crate::error::{InvalidCalibration, MeasureError};
use crate::preprocess::NormalizedRegion;
use crate::types::{MeasurementResult, SampleLine, SampleMeasurement};
use log::{debug, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Clone, Debug, Default)]
pub struct Aggregator {
    pub detector: SnowLineDetector,
    pub options: AggregatorOptions,
}

impl Aggregator {
    pub fn new(detector: SnowLineDetector, options: AggregatorOptions) -> Self {
        Self { detector, options }
    }

    /// Measures snow depth from `sample_count` sample lines (0 selects the
    /// configured default).
    ///
    /// Fails only on a structurally invalid calibration. The result does
    /// not carry a timestamp; the caller stamps it.
    pub fn measure(
        &self,
        region: &NormalizedRegion,
        params: &CalibrationParameters,
        sample_count: usize,
    ) -> Result<MeasurementResult, MeasureError> {
        let count = if sample_count == 0 {
            self.options.default_sample_count.max(1)
        } else {
            sample_count
        };
        let lines = self.sample_lines(region, params, count)?;

        #[cfg(feature = "parallel")]
        let mut samples: Vec<SampleMeasurement> = lines
            .par_iter()
            .map(|line| self.measure_line(region, params, line))
            .collect();
        #[cfg(not(feature = "parallel"))]
        let mut samples: Vec<SampleMeasurement> = lines
            .iter()
            .map(|line| self.measure_line(region, params, line))
            .collect();

        let result = self.combine(&mut samples, params, count);
        let result = match result {
            Some(r) => r,
            None => {
                warn!(
                    "Aggregator::measure: no usable samples out of {} ({} calibration)",
                    count,
                    params.method_name()
                );
                return Ok(MeasurementResult::unreadable(samples));
            }
        };
        if result.confidence_score < self.options.high_confidence {
            debug!(
                "Aggregator::measure: low confidence {:.2} for depth {:?}",
                result.confidence_score, result.snow_depth_inches
            );
        }
        Ok(MeasurementResult {
            sample_measurements: samples,
            ..result
        })
    }

    /// Evenly spaced vertical sample lines across the stake.
    ///
    /// Lines are centered on the stake centerline when it lies inside the
    /// region, else on the region center. Scanning starts at the zero-inch
    /// row when it falls inside the region, else at the region bottom.
    pub fn sample_lines(
        &self,
        region: &NormalizedRegion,
        params: &CalibrationParameters,
        count: usize,
    ) -> Result<Vec<SampleLine>, InvalidCalibration> {
        let zero = region.to_local_row(params.zero_row()?);
        let (w, h) = (region.width(), region.height());
        if w == 0 || count == 0 {
            return Ok(Vec::new());
        }
        let max_x = (w - 1) as f64;
        let center = params
            .stake_centerline_x
            .map(|cx| cx - region.region.x as f64)
            .filter(|cx| (0.0..=max_x).contains(cx))
            .unwrap_or(max_x * 0.5);
        let half_span = 0.5 * self.options.span_fraction.clamp(0.0, 1.0) * w as f64;
        let left = (center - half_span).clamp(0.0, max_x);
        let right = (center + half_span).clamp(0.0, max_x);

        let scan_start_row = if zero > 0.0 && zero <= h as f64 {
            zero.ceil() as usize
        } else {
            h
        };

        Ok((0..count)
            .map(|i| {
                let x = if count == 1 {
                    center
                } else {
                    left + (right - left) * i as f64 / (count - 1) as f64
                };
                SampleLine {
                    id: i,
                    x: x.round() as usize,
                    half_width: self.options.column_half_width,
                    scan_start_row,
                }
            })
            .collect())
    }

    fn measure_line(
        &self,
        region: &NormalizedRegion,
        params: &CalibrationParameters,
        line: &SampleLine,
    ) -> SampleMeasurement {
        let x_position = region.to_image_col(line.x);
        let candidate = match self.detector.detect(region, line) {
            Ok(c) => c,
            Err(reason) => {
                debug!("sample {} at x={}: {}", line.id, x_position, reason);
                return SampleMeasurement::failed(line.id, x_position, reason);
            }
        };
        let conversion = params.convert(Some(x_position as f64), candidate.pixel_row);
        let mut confidence = candidate.detection_confidence;
        if conversion.extrapolated {
            confidence *= self.options.extrapolation_discount;
        }
        SampleMeasurement {
            sample_line_id: line.id,
            x_position,
            snow_line_row: Some(candidate.pixel_row),
            depth_inches: Some(conversion.inches),
            confidence,
            method: Some(candidate.detection_method),
            extrapolated: conversion.extrapolated,
            rejected: false,
            failure: None,
        }
    }

    /// Outlier rejection and weighted combination. Marks rejected samples
    /// in place; `None` when no sample produced a depth.
    fn combine(
        &self,
        samples: &mut [SampleMeasurement],
        params: &CalibrationParameters,
        count: usize,
    ) -> Option<MeasurementResult> {
        let depths: Vec<f64> = samples.iter().filter_map(|s| s.depth_inches).collect();
        if depths.is_empty() {
            return None;
        }
        let keep = outliers::inlier_mask(
            &depths,
            self.options.mad_multiplier,
            self.options.min_mad_inches,
        );
        let mut keep_iter = keep.iter();
        for s in samples.iter_mut().filter(|s| s.depth_inches.is_some()) {
            s.rejected = !keep_iter.next().copied().unwrap_or(true);
        }
        let rejected = keep.iter().filter(|&&k| !k).count();
        if rejected > 0 {
            debug!(
                "Aggregator: rejected {} of {} readings as outliers",
                rejected,
                depths.len()
            );
        }

        let used: Vec<(f64, f64)> = samples
            .iter()
            .filter(|s| s.is_used())
            .filter_map(|s| s.depth_inches.map(|d| (d, s.confidence)))
            .collect();
        if used.is_empty() {
            return None;
        }

        let wsum: f64 = used.iter().map(|&(_, c)| c).sum();
        let depth = if wsum > 0.0 {
            used.iter().map(|&(d, c)| d * c).sum::<f64>() / wsum
        } else {
            used.iter().map(|&(d, _)| d).sum::<f64>() / used.len() as f64
        };
        let mean_conf = wsum / used.len() as f64;
        let survivor_fraction = used.len() as f64 / count.max(1) as f64;
        let confidence = (survivor_fraction * mean_conf).clamp(0.0, 1.0);

        let depth_min = used.iter().map(|&(d, _)| d).fold(f64::INFINITY, f64::min);
        let depth_max = used
            .iter()
            .map(|&(d, _)| d)
            .fold(f64::NEG_INFINITY, f64::max);

        Some(MeasurementResult {
            snow_depth_inches: Some(depth),
            confidence_score: confidence,
            sample_measurements: Vec::new(),
            is_below_threshold: depth < params.min_depth_threshold,
            timestamp: None,
            depth_min: Some(depth_min),
            depth_max: Some(depth_max),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::DetectionFailed;
    use crate::image::ImageRgb8;
    use crate::preprocess::{prepare, PreprocessOptions};
    use crate::types::StakeRegion;
    use approx::assert_relative_eq;

    fn sample(id: usize, depth: f64, confidence: f64) -> SampleMeasurement {
        SampleMeasurement {
            sample_line_id: id,
            x_position: id,
            snow_line_row: Some(0.0),
            depth_inches: Some(depth),
            confidence,
            method: None,
            extrapolated: false,
            rejected: false,
            failure: None,
        }
    }

    #[test]
    fn outlier_excluded_from_final_depth() {
        let agg = Aggregator::default();
        let params = CalibrationParameters::linear(10.0, 600.0);
        let mut samples: Vec<_> = [24.0, 25.0, 23.0, 26.0, 80.0]
            .iter()
            .enumerate()
            .map(|(i, &d)| sample(i, d, 0.9))
            .collect();
        let r = agg.combine(&mut samples, &params, 5).expect("readings");
        assert_relative_eq!(r.snow_depth_inches.expect("depth"), 24.5, epsilon = 1e-12);
        assert!(samples[4].rejected);
        assert_eq!(samples.iter().filter(|s| s.rejected).count(), 1);
        assert_relative_eq!(r.confidence_score, 0.8 * 0.9, epsilon = 1e-12);
        assert_eq!(r.depth_min, Some(23.0));
        assert_eq!(r.depth_max, Some(26.0));
    }

    #[test]
    fn failures_reduce_confidence_but_not_depth() {
        let agg = Aggregator::default();
        let params = CalibrationParameters::linear(10.0, 600.0);
        let mut samples = vec![
            sample(0, 10.0, 1.0),
            sample(1, 10.0, 1.0),
            SampleMeasurement::failed(2, 2, DetectionFailed::NoTransition),
            SampleMeasurement::failed(3, 3, DetectionFailed::NoTransition),
        ];
        let r = agg.combine(&mut samples, &params, 4).expect("readings");
        assert_eq!(r.snow_depth_inches, Some(10.0));
        assert_relative_eq!(r.confidence_score, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn shallow_depth_is_below_threshold_with_confidence() {
        let agg = Aggregator::default();
        let params = CalibrationParameters::linear(10.0, 600.0).with_min_depth_threshold(1.0);
        let mut samples: Vec<_> = (0..4).map(|i| sample(i, 0.3, 0.9)).collect();
        let r = agg.combine(&mut samples, &params, 4).expect("readings");
        assert!(r.is_below_threshold);
        assert_relative_eq!(r.snow_depth_inches.expect("depth"), 0.3, epsilon = 1e-12);
        assert!(r.confidence_score > 0.0);
        assert_eq!(r.reported_depth(), Some(0.0));
    }

    #[test]
    fn zero_weights_fall_back_to_plain_mean() {
        let agg = Aggregator::default();
        let params = CalibrationParameters::linear(10.0, 600.0);
        let mut samples = vec![sample(0, 4.0, 0.0), sample(1, 5.0, 0.0)];
        let r = agg.combine(&mut samples, &params, 2).expect("readings");
        assert_eq!(r.snow_depth_inches, Some(4.5));
        assert_eq!(r.confidence_score, 0.0);
    }

    #[test]
    fn sample_lines_follow_centerline_and_reference() {
        let data = vec![[128u8, 128, 128]; 200 * 300];
        let img = ImageRgb8::packed(200, 300, &data);
        let region = prepare(
            img,
            StakeRegion::new(50, 100, 40, 150),
            &PreprocessOptions::default(),
        )
        .expect("inside");
        let agg = Aggregator::default();

        let params = CalibrationParameters::linear(10.0, 200.0).with_centerline(70.0);
        let lines = agg.sample_lines(&region, &params, 5).expect("valid");
        let xs: Vec<usize> = lines.iter().map(|l| l.x).collect();
        // center 20, span 30 -> columns 5..=35
        assert_eq!(xs, vec![5, 13, 20, 28, 35]);
        assert!(lines.iter().all(|l| l.scan_start_row == 100));
        assert_eq!(lines[3].id, 3);

        // Reference below the region: scan from the bottom.
        let params = CalibrationParameters::linear(10.0, 900.0);
        let lines = agg.sample_lines(&region, &params, 1).expect("valid");
        assert_eq!(lines[0].scan_start_row, 150);
        assert_eq!(lines[0].x, 20);

        let one_marker = CalibrationParameters::markers([(0.0, 120.0)]);
        assert_eq!(
            agg.sample_lines(&region, &one_marker, 3),
            Err(InvalidCalibration::TooFewMarkers(1))
        );
    }

    #[test]
    fn blank_region_is_unreadable_not_an_error() {
        let data = vec![[128u8, 128, 128]; 60 * 120];
        let img = ImageRgb8::packed(60, 120, &data);
        let region = prepare(img, StakeRegion::new(0, 0, 60, 120), &PreprocessOptions::default())
            .expect("inside");
        let params = CalibrationParameters::linear(10.0, 110.0);
        let r = Aggregator::default()
            .measure(&region, &params, 6)
            .expect("valid calibration");
        assert_eq!(r.snow_depth_inches, None);
        assert_eq!(r.confidence_score, 0.0);
        assert_eq!(r.sample_measurements.len(), 6);
        assert!(r.sample_measurements.iter().all(|s| s.failure.is_some()));
    }

    #[test]
    fn invalid_calibration_aborts() {
        let data = vec![[128u8, 128, 128]; 20 * 20];
        let img = ImageRgb8::packed(20, 20, &data);
        let region = prepare(img, StakeRegion::new(0, 0, 20, 20), &PreprocessOptions::default())
            .expect("inside");
        let params = CalibrationParameters::linear(-1.0, 10.0);
        assert!(matches!(
            Aggregator::default().measure(&region, &params, 3),
            Err(MeasureError::InvalidCalibration(_))
        ));
    }
}
