use approx::assert_relative_eq;
use snow_stake::autocal::{
    CalibrationFailed, CalibrationSource, OcrCalibrator, OcrCalibratorOptions, PrecomputedOcr,
    TextDetection, TiltCalibrator, TiltSource,
};
use snow_stake::image::ImageRgb8;
use snow_stake::prelude::*;
use snow_stake::store::MemoryStore;
use snow_stake::CalibrationModel;

fn label(text: &str, cx: f64, cy: f64, confidence: f64) -> TextDetection {
    TextDetection::new(
        text,
        [
            [cx - 6.0, cy - 4.0],
            [cx + 6.0, cy - 4.0],
            [cx + 6.0, cy + 4.0],
            [cx - 6.0, cy + 4.0],
        ],
        confidence,
    )
}

/// Reference text at row 600 and numbers every 4" at 10 px/in, with noise.
fn stake_text() -> Vec<TextDetection> {
    let mut dets = vec![label("24 HOUR TOTAL", 100.0, 600.0, 0.93)];
    for inches in [2, 6, 10, 14, 18, 22] {
        dets.push(label(
            &inches.to_string(),
            100.0,
            600.0 - 10.0 * inches as f64,
            0.85,
        ));
    }
    dets.push(label("TEMP 18:00", 100.0, 120.0, 0.9));
    dets.push(label("7", 400.0, 50.0, 0.9)); // outside the stake region
    dets
}

fn blank(w: usize, h: usize) -> Vec<[u8; 3]> {
    vec![[120, 120, 120]; w * h]
}

#[test]
fn markers_from_ocr_calibrate_measurement() {
    let _ = env_logger::builder().is_test(true).try_init();
    let region = StakeRegion::new(70, 100, 60, 550);
    let ocr = OcrCalibrator::new(
        PrecomputedOcr::new(stake_text()).for_region(&region),
        OcrCalibratorOptions::default(),
    );
    let pixels = blank(200, 700);
    let calibration = ocr
        .auto_calibrate(ImageRgb8::packed(200, 700, &pixels), region)
        .expect("calibration");
    assert_eq!(calibration.source, CalibrationSource::Detected);
    assert_eq!(calibration.markers.len(), 7);
    // Evenly spaced markers beyond the expected count.
    assert_relative_eq!(calibration.confidence, 1.0, epsilon = 1e-9);
    let params = calibration.params;

    match &params.model {
        CalibrationModel::MarkerInterpolation(m) => assert_eq!(m.markers.len(), 7),
        other => panic!("unexpected model {other:?}"),
    }
    assert_eq!(params.stake_centerline_x, Some(100.0));
    assert_relative_eq!(params.to_inches(300.0).expect("valid").inches, 30.0, epsilon = 1e-9);
    assert_relative_eq!(params.to_inches(500.0).expect("valid").inches, 10.0, epsilon = 1e-9);

    let mut store = MemoryStore::new();
    store
        .save(ResortCalibration::new("ocr_resort", region, params))
        .expect("save");
    assert_eq!(store.list().expect("list"), vec!["ocr_resort"]);
}

#[test]
fn linear_fit_matches_marker_spacing() {
    let region = StakeRegion::new(70, 100, 60, 550);
    let ocr = OcrCalibrator::new(
        PrecomputedOcr::new(stake_text()).for_region(&region),
        OcrCalibratorOptions::default(),
    );
    let pixels = blank(200, 700);
    let calibration = ocr
        .auto_calibrate_linear(ImageRgb8::packed(200, 700, &pixels), region)
        .expect("calibration");
    assert!(calibration.confidence > 0.9);
    match calibration.params.model {
        CalibrationModel::Linear(l) => {
            assert_relative_eq!(l.pixels_per_inch, 10.0, epsilon = 1e-9);
            assert_relative_eq!(l.reference_y, 600.0, epsilon = 1e-9);
        }
        other => panic!("unexpected model {other:?}"),
    }
}

#[test]
fn single_number_is_not_enough() {
    let region = StakeRegion::new(0, 0, 200, 700);
    let ocr = OcrCalibrator::new(
        PrecomputedOcr::new(vec![label("12", 100.0, 300.0, 0.9), label("HELLO", 100.0, 400.0, 0.9)]),
        OcrCalibratorOptions::default(),
    );
    let pixels = blank(200, 700);
    let attempt = ocr.auto_calibrate(ImageRgb8::packed(200, 700, &pixels), region);
    assert_eq!(
        attempt.clone().map(|c| c.params),
        Err(CalibrationFailed::InsufficientMarkers { found: 1 })
    );

    let stored = CalibrationParameters::linear(10.0, 600.0).with_centerline(100.0);
    let kept = ocr.or_fallback(attempt, Some(&stored)).expect("fallback");
    assert_eq!(kept.source, CalibrationSource::Fallback);
    assert_eq!(kept.params, stored);
    assert!(kept.confidence < 0.5);
}

#[test]
fn tilt_wraps_ocr_markers() {
    let region = StakeRegion::new(70, 100, 60, 550);
    let ocr = OcrCalibrator::new(
        PrecomputedOcr::new(stake_text()).for_region(&region),
        OcrCalibratorOptions::default(),
    );
    let pixels = blank(200, 700);
    let img = ImageRgb8::packed(200, 700, &pixels);
    let calibration = ocr.auto_calibrate(img, region).expect("markers");
    let params = calibration.params;

    let tilt = TiltCalibrator::default();
    // Axis-aligned text: zero tilt, so conversion is unchanged.
    let estimate = tilt
        .estimate(&stake_text(), &calibration.markers, None)
        .expect("text baselines");
    assert_eq!(estimate.angle, 0.0);
    let from_markers = tilt
        .estimate(&[], &calibration.markers, None)
        .expect("marker axis");
    assert_eq!(from_markers.source, TiltSource::MarkerAxis);
    assert_eq!(from_markers.angle, 0.0);
    let wrapped = tilt.wrap(params.clone(), &estimate, None).expect("valid");
    assert_eq!(wrapped.method_name(), "tilt_corrected");
    for row in [250.0, 333.3, 600.0, 640.0] {
        assert_eq!(wrapped.to_inches(row), params.to_inches(row));
    }
}
