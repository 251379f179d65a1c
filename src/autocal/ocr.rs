//! Marker calibration from recognized stake numbers.
use super::{AutoCalibration, CalibrationFailed, CalibrationSource, OcrEngine, TextDetection};
use crate::aggregate::outliers::median;
use crate::calibration::{CalibrationParameters, Marker, MarkerModel};
use crate::error::InvalidCalibration;
use crate::image::ImageRgb8;
use crate::types::StakeRegion;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct OcrCalibratorOptions {
    /// Detections below this confidence are ignored.
    pub min_confidence: f64,
    /// Largest plausible marker value in inches.
    pub max_marker_inches: f64,
    /// Whitespace-free lowercase fragments identifying the zero reference.
    pub reference_patterns: Vec<String>,
    /// Lowercase fragments marking text that is not a stake number.
    pub skip_keywords: Vec<String>,
    /// Marker count at which coverage stops raising the confidence.
    pub expected_markers: usize,
    /// Confidence reported when a fallback calibration is kept.
    pub fallback_confidence: f64,
}

impl Default for OcrCalibratorOptions {
    fn default() -> Self {
        Self {
            min_confidence: 0.3,
            max_marker_inches: 200.0,
            reference_patterns: ["24hour", "hourtotal", "24hr", "total"]
                .into_iter()
                .map(String::from)
                .collect(),
            skip_keywords: ["hour", "total", "temp", "wind", "snow"]
                .into_iter()
                .map(String::from)
                .collect(),
            expected_markers: 5,
            fallback_confidence: 0.3,
        }
    }
}

/// A number read off the stake, in source-image coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DetectedMarker {
    pub inches: f64,
    pub x: f64,
    pub row: f64,
    pub confidence: f64,
}

/// Interpreted OCR output for one stake region.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MarkerScan {
    /// Accepted markers sorted by inches, including the 0" reference.
    pub markers: Vec<DetectedMarker>,
    /// Reference text, in source-image coordinates.
    pub reference: Option<TextDetection>,
    /// Every detection the engine returned, in source-image coordinates.
    pub detections: Vec<TextDetection>,
}

impl MarkerScan {
    /// Median marker column; the stake axis for tilt correction.
    pub fn centerline(&self) -> Option<f64> {
        let xs: Vec<f64> = self.markers.iter().map(|m| m.x).collect();
        median(&xs)
    }
}

pub struct OcrCalibrator<E> {
    engine: E,
    pub options: OcrCalibratorOptions,
}

impl<E: OcrEngine> OcrCalibrator<E> {
    pub fn new(engine: E, options: OcrCalibratorOptions) -> Self {
        Self { engine, options }
    }

    /// Runs the OCR engine over `region` and interprets its output.
    pub fn scan(
        &self,
        image: ImageRgb8<'_>,
        region: StakeRegion,
    ) -> Result<MarkerScan, CalibrationFailed> {
        let crop = image
            .sub_view(region.x, region.y, region.width, region.height)
            .ok_or(CalibrationFailed::RegionOutOfBounds(region))?;
        let detections: Vec<TextDetection> = self
            .engine
            .recognize(crop)
            .into_iter()
            .map(|d| d.translated(region.x as f64, region.y as f64))
            .collect();
        if detections.is_empty() {
            return Err(CalibrationFailed::NoTextDetected);
        }
        Ok(self.interpret(detections))
    }

    /// Classifies detections into reference text and numeric markers.
    pub fn interpret(&self, detections: Vec<TextDetection>) -> MarkerScan {
        let opts = &self.options;
        let reference = detections
            .iter()
            .filter(|d| d.confidence >= opts.min_confidence)
            .find(|d| self.is_reference(&d.text))
            .cloned();
        let reference_row = reference.as_ref().map(|r| r.centroid().1);

        let mut markers: Vec<DetectedMarker> = Vec::new();
        for d in &detections {
            if d.confidence < opts.min_confidence || self.is_skipped(&d.text) {
                continue;
            }
            let Some(inches) = parse_marker_value(&d.text) else {
                debug!("OcrCalibrator: ignoring text {:?}", d.text);
                continue;
            };
            if inches > opts.max_marker_inches {
                continue;
            }
            let (x, row) = d.centroid();
            if reference_row.is_some_and(|r| row >= r) {
                continue;
            }
            let candidate = DetectedMarker {
                inches,
                x,
                row,
                confidence: d.confidence,
            };
            match markers.iter_mut().find(|m| m.inches == inches) {
                Some(existing) if existing.confidence < candidate.confidence => {
                    *existing = candidate
                }
                Some(_) => {}
                None => markers.push(candidate),
            }
        }

        if let Some(r) = &reference {
            let (x, row) = r.centroid();
            markers.retain(|m| m.inches != 0.0);
            markers.push(DetectedMarker {
                inches: 0.0,
                x,
                row,
                confidence: r.confidence,
            });
        }
        markers.sort_by(|a, b| a.inches.total_cmp(&b.inches));

        MarkerScan {
            markers,
            reference,
            detections,
        }
    }

    /// Marker interpolation calibration from a clear reference image.
    pub fn auto_calibrate(
        &self,
        image: ImageRgb8<'_>,
        region: StakeRegion,
    ) -> Result<AutoCalibration, CalibrationFailed> {
        let scan = self.scan(image, region)?;
        let params = markers_to_params(&scan)?;
        Ok(self.detected(params, scan.markers))
    }

    /// Linear calibration fitted to the same markers.
    pub fn auto_calibrate_linear(
        &self,
        image: ImageRgb8<'_>,
        region: StakeRegion,
    ) -> Result<AutoCalibration, CalibrationFailed> {
        let scan = self.scan(image, region)?;
        let params = linear_from_scan(&scan)?;
        Ok(self.detected(params, scan.markers))
    }

    /// Scores `params` against the markers it was fitted to.
    pub(crate) fn detected(
        &self,
        params: CalibrationParameters,
        markers: Vec<DetectedMarker>,
    ) -> AutoCalibration {
        let confidence = calibration_confidence(&markers, self.options.expected_markers);
        info!(
            "OcrCalibrator: {} calibration from {} markers, confidence {:.2}",
            params.method_name(),
            markers.len(),
            confidence
        );
        AutoCalibration {
            params,
            confidence,
            markers,
            source: CalibrationSource::Detected,
        }
    }

    /// Keeps `fallback` when `attempt` failed for lack of evidence in the
    /// image. Other failures and successful attempts pass through.
    pub fn or_fallback(
        &self,
        attempt: Result<AutoCalibration, CalibrationFailed>,
        fallback: Option<&CalibrationParameters>,
    ) -> Result<AutoCalibration, CalibrationFailed> {
        match (attempt, fallback) {
            (
                Err(
                    err @ (CalibrationFailed::NoTextDetected
                    | CalibrationFailed::InsufficientMarkers { .. }
                    | CalibrationFailed::NoReferencePoint
                    | CalibrationFailed::NoTiltEvidence),
                ),
                Some(fallback),
            ) => {
                fallback.validate()?;
                warn!(
                    "OcrCalibrator: {err}; keeping {} fallback calibration",
                    fallback.method_name()
                );
                Ok(AutoCalibration {
                    params: fallback.clone(),
                    confidence: self.options.fallback_confidence,
                    markers: Vec::new(),
                    source: CalibrationSource::Fallback,
                })
            }
            (attempt, _) => attempt,
        }
    }

    fn is_reference(&self, text: &str) -> bool {
        let squashed: String = text
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();
        self.options
            .reference_patterns
            .iter()
            .any(|p| squashed.contains(p.as_str()))
    }

    fn is_skipped(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.options
            .skip_keywords
            .iter()
            .any(|k| lower.contains(k.as_str()))
    }
}

/// Parses marker text such as `10`, `24"` or ` 2.5 ` into inches.
///
/// Anything that is not a single non-negative number is rejected.
pub fn parse_marker_value(text: &str) -> Option<f64> {
    let trimmed = text
        .trim()
        .trim_end_matches(['"', '\'', '\u{201d}', '\u{2033}'])
        .trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let value: f64 = trimmed.parse().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}

/// Pixels per inch of each consecutive marker pair that goes up the stake.
fn pair_scales(markers: &[DetectedMarker]) -> Vec<f64> {
    markers
        .windows(2)
        .filter_map(|p| {
            let dinch = p[1].inches - p[0].inches;
            let drow = p[0].row - p[1].row;
            (dinch > 0.0 && drow > 0.0).then(|| drow / dinch)
        })
        .collect()
}

/// Quality of a marker fit in `[0, 1]`.
///
/// `min(1, n / expected) * max(0.5, 1 - std / median)` over the pair
/// scales; 0 when no pair yields a scale.
pub fn calibration_confidence(markers: &[DetectedMarker], expected_markers: usize) -> f64 {
    let scales = pair_scales(markers);
    let Some(typical) = median(&scales) else {
        return 0.0;
    };
    let n = scales.len() as f64;
    let mean = scales.iter().sum::<f64>() / n;
    let std = (scales.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n).sqrt();
    let coverage = (markers.len() as f64 / expected_markers.max(1) as f64).min(1.0);
    coverage * (1.0 - std / typical).max(0.5)
}

fn ensure_markers(scan: &MarkerScan) -> Result<(), CalibrationFailed> {
    if scan.markers.len() < 2 {
        return Err(CalibrationFailed::InsufficientMarkers {
            found: scan.markers.len(),
        });
    }
    if scan.markers.windows(2).any(|p| p[1].row >= p[0].row) {
        return Err(CalibrationFailed::NonMonotonicMarkers);
    }
    Ok(())
}

fn markers_to_params(scan: &MarkerScan) -> Result<CalibrationParameters, CalibrationFailed> {
    ensure_markers(scan)?;
    let model = MarkerModel::new(scan.markers.iter().map(|m| Marker::new(m.inches, m.row)));
    let mut params = CalibrationParameters::from_model(
        crate::calibration::CalibrationModel::MarkerInterpolation(model),
    );
    params.stake_centerline_x = scan.centerline();
    params.validate()?;
    Ok(params)
}

/// Confidence-weighted pixels-per-inch over consecutive marker pairs.
pub(crate) fn weighted_pixels_per_inch(markers: &[DetectedMarker]) -> Option<f64> {
    let mut wsum = 0.0;
    let mut sum = 0.0;
    for p in markers.windows(2) {
        let dinch = p[1].inches - p[0].inches;
        if dinch <= 0.0 {
            continue;
        }
        let ppi = (p[0].row - p[1].row) / dinch;
        let w = 0.5 * (p[0].confidence + p[1].confidence);
        sum += ppi * w;
        wsum += w;
    }
    (wsum > 0.0).then(|| sum / wsum)
}

fn linear_from_scan(scan: &MarkerScan) -> Result<CalibrationParameters, CalibrationFailed> {
    ensure_markers(scan)?;
    let ppi = weighted_pixels_per_inch(&scan.markers).ok_or(
        CalibrationFailed::InsufficientMarkers {
            found: scan.markers.len(),
        },
    )?;
    let lowest = scan.markers[0];
    // The 0" marker is the reference when present; otherwise extend down.
    let reference_y = lowest.row + lowest.inches * ppi;
    let mut params = CalibrationParameters::linear(ppi, reference_y);
    params.stake_centerline_x = scan.centerline();
    params.validate().map_err(|e| match e {
        InvalidCalibration::NonPositiveScale(_) => CalibrationFailed::NonMonotonicMarkers,
        other => CalibrationFailed::Invalid(other),
    })?;
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autocal::PrecomputedOcr;
    use crate::calibration::CalibrationModel;
    use approx::assert_relative_eq;

    fn label(text: &str, cx: f64, cy: f64, confidence: f64) -> TextDetection {
        TextDetection::new(
            text,
            [
                [cx - 4.0, cy - 3.0],
                [cx + 4.0, cy - 3.0],
                [cx + 4.0, cy + 3.0],
                [cx - 4.0, cy + 3.0],
            ],
            confidence,
        )
    }

    fn calibrator() -> OcrCalibrator<PrecomputedOcr> {
        OcrCalibrator::new(PrecomputedOcr::default(), OcrCalibratorOptions::default())
    }

    #[test]
    fn parses_only_non_negative_numbers() {
        assert_eq!(parse_marker_value("10"), Some(10.0));
        assert_eq!(parse_marker_value(" 24\" "), Some(24.0));
        assert_eq!(parse_marker_value("2.5"), Some(2.5));
        assert_eq!(parse_marker_value("-4"), None);
        assert_eq!(parse_marker_value("18:00"), None);
        assert_eq!(parse_marker_value("ten"), None);
        assert_eq!(parse_marker_value(""), None);
        assert_eq!(parse_marker_value("1.2.3"), None);
    }

    #[test]
    fn reference_anchors_zero_and_filters_markers_below() {
        let scan = calibrator().interpret(vec![
            label("24 HOUR TOTAL", 50.0, 800.0, 0.9),
            label("10", 50.0, 500.0, 0.8),
            label("20", 52.0, 200.0, 0.7),
            label("2", 50.0, 850.0, 0.9), // below the reference
            label("SNOW", 50.0, 100.0, 0.9),
            label("wind 12", 50.0, 120.0, 0.9),
        ]);
        let values: Vec<f64> = scan.markers.iter().map(|m| m.inches).collect();
        assert_eq!(values, vec![0.0, 10.0, 20.0]);
        assert_eq!(scan.markers[0].row, 800.0);
        assert!(scan.reference.is_some());
    }

    #[test]
    fn duplicate_values_keep_most_confident() {
        let scan = calibrator().interpret(vec![
            label("6", 50.0, 640.0, 0.4),
            label("6", 51.0, 600.0, 0.9),
            label("12", 50.0, 420.0, 0.9),
        ]);
        assert_eq!(scan.markers.len(), 2);
        assert_eq!(scan.markers[0].row, 600.0);
    }

    #[test]
    fn builds_marker_calibration() {
        let scan = calibrator().interpret(vec![
            label("24hr total", 100.0, 800.0, 0.9),
            label("10", 100.0, 500.0, 0.9),
            label("0.1", 100.0, 10.0, 0.1), // too uncertain
        ]);
        let params = markers_to_params(&scan).expect("two markers");
        match &params.model {
            CalibrationModel::MarkerInterpolation(m) => {
                assert_eq!(m.markers, vec![Marker::new(0.0, 800.0), Marker::new(10.0, 500.0)]);
            }
            other => panic!("unexpected model {other:?}"),
        }
        assert_eq!(params.stake_centerline_x, Some(100.0));
        assert_relative_eq!(
            params.to_inches(650.0).expect("valid").inches,
            5.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn too_few_markers_fails() {
        let scan = calibrator().interpret(vec![label("10", 5.0, 50.0, 0.9), label("x", 5.0, 80.0, 0.9)]);
        assert_eq!(
            markers_to_params(&scan),
            Err(CalibrationFailed::InsufficientMarkers { found: 1 })
        );
    }

    #[test]
    fn inverted_marker_order_fails() {
        let scan = calibrator().interpret(vec![label("4", 5.0, 50.0, 0.9), label("8", 5.0, 80.0, 0.9)]);
        assert_eq!(
            markers_to_params(&scan),
            Err(CalibrationFailed::NonMonotonicMarkers)
        );
    }

    #[test]
    fn linear_extrapolates_reference_without_zero_marker() {
        let scan = calibrator().interpret(vec![
            label("2", 40.0, 580.0, 1.0),
            label("6", 40.0, 540.0, 1.0),
            label("10", 40.0, 500.0, 1.0),
        ]);
        let params = linear_from_scan(&scan).expect("linear");
        match params.model {
            CalibrationModel::Linear(l) => {
                assert_relative_eq!(l.pixels_per_inch, 10.0, epsilon = 1e-12);
                assert_relative_eq!(l.reference_y, 600.0, epsilon = 1e-12);
            }
            other => panic!("unexpected model {other:?}"),
        }
    }

    fn marker(inches: f64, row: f64) -> DetectedMarker {
        DetectedMarker {
            inches,
            x: 50.0,
            row,
            confidence: 0.9,
        }
    }

    #[test]
    fn confidence_rewards_coverage_and_even_spacing() {
        let even: Vec<_> = (0..5).map(|i| marker(4.0 * i as f64, 600.0 - 40.0 * i as f64)).collect();
        assert_relative_eq!(calibration_confidence(&even, 5), 1.0, epsilon = 1e-12);
        assert_relative_eq!(calibration_confidence(&even[..3], 5), 0.6, epsilon = 1e-12);

        // Pair scales 10 and 20 px/in: std 5 around a median of 15.
        let uneven = [marker(0.0, 600.0), marker(10.0, 500.0), marker(20.0, 300.0)];
        assert_relative_eq!(
            calibration_confidence(&uneven, 3),
            1.0 - 5.0 / 15.0,
            epsilon = 1e-12
        );

        // Wildly inconsistent scales bottom out at half the coverage.
        let wild = [marker(0.0, 600.0), marker(10.0, 590.0), marker(20.0, 100.0)];
        assert_relative_eq!(calibration_confidence(&wild, 3), 0.5, epsilon = 1e-12);
        assert_eq!(calibration_confidence(&even[..1], 5), 0.0);
    }

    #[test]
    fn fallback_kept_only_for_missing_evidence() {
        let cal = calibrator();
        let stored = CalibrationParameters::linear(9.0, 610.0);

        let kept = cal
            .or_fallback(
                Err(CalibrationFailed::InsufficientMarkers { found: 1 }),
                Some(&stored),
            )
            .expect("fallback");
        assert_eq!(kept.source, CalibrationSource::Fallback);
        assert_eq!(kept.params, stored);
        assert_eq!(kept.confidence, 0.3);
        assert!(kept.markers.is_empty());

        assert_eq!(
            cal.or_fallback(Err(CalibrationFailed::NoTextDetected), None),
            Err(CalibrationFailed::NoTextDetected)
        );
        assert_eq!(
            cal.or_fallback(Err(CalibrationFailed::NonMonotonicMarkers), Some(&stored)),
            Err(CalibrationFailed::NonMonotonicMarkers)
        );
        let invalid = CalibrationParameters::linear(0.0, 610.0);
        assert!(matches!(
            cal.or_fallback(Err(CalibrationFailed::NoTextDetected), Some(&invalid)),
            Err(CalibrationFailed::Invalid(_))
        ));
    }

    #[test]
    fn scan_requires_text() {
        let data = vec![[0u8; 3]; 10 * 10];
        let img = ImageRgb8::packed(10, 10, &data);
        let err = calibrator()
            .scan(img, StakeRegion::new(0, 0, 10, 10))
            .expect_err("empty OCR");
        assert_eq!(err, CalibrationFailed::NoTextDetected);
        let err = calibrator()
            .scan(img, StakeRegion::new(5, 5, 10, 10))
            .expect_err("outside");
        assert!(matches!(err, CalibrationFailed::RegionOutOfBounds(_)));
    }
}
