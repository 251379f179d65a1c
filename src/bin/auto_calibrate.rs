use snow_stake::autocal::{
    CalibrationSource, OcrCalibrator, PrecomputedOcr, TextDetection, TiltCalibrator,
};
use snow_stake::config::{load_config, AutoCalibrateToolConfig, AutoCalibrationMethod};
use snow_stake::image::io::{load_rgb_image, read_json_file};
use snow_stake::preprocess::prepare;
use snow_stake::store::{ConfigStore, JsonFileStore, ResortCalibration};
use std::env;
use std::path::Path;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let config_path = env::args().nth(1).ok_or_else(usage)?;
    let config: AutoCalibrateToolConfig = load_config(Path::new(&config_path))?;

    let image = load_rgb_image(&config.input)?;
    let detections: Vec<TextDetection> = read_json_file(&config.ocr_detections)?;
    let region = config.stake_region;
    let ocr = OcrCalibrator::new(
        PrecomputedOcr::new(detections.clone()).for_region(&region),
        config.engine.ocr.clone(),
    );
    let tilt = TiltCalibrator::new(config.engine.tilt.clone());

    let mut store = JsonFileStore::new(&config.calibrations);
    let existing = store.load(&config.resort).ok();

    let attempt = match config.method {
        AutoCalibrationMethod::Markers => ocr.auto_calibrate(image.as_view(), region),
        AutoCalibrationMethod::Linear => ocr.auto_calibrate_linear(image.as_view(), region),
        AutoCalibrationMethod::TiltLinear => tilt.calibrate_full(&ocr, image.as_view(), region),
    };
    let derived = ocr
        .or_fallback(attempt, existing.as_ref().map(|r| &r.calibration))
        .map_err(|e| e.to_string())?;
    println!(
        "Derived {} calibration ({:?}, confidence {:.2}, {} markers)",
        derived.params.method_name(),
        derived.source,
        derived.confidence,
        derived.markers.len()
    );
    let mut calibration = derived.params;

    if config.apply_tilt
        && config.method != AutoCalibrationMethod::TiltLinear
        && derived.source == CalibrationSource::Detected
    {
        let normalized = prepare(image.as_view(), region, &config.engine.preprocess)
            .map_err(|e| e.to_string())?;
        let estimate = tilt
            .estimate(&detections, &derived.markers, Some(&normalized))
            .map_err(|e| e.to_string())?;
        let fallback_x = (region.x as f64) + region.width as f64 / 2.0;
        calibration = tilt
            .wrap(calibration, &estimate, Some(fallback_x))
            .map_err(|e| e.to_string())?;
        println!(
            "Tilt {:.2} deg from {:?} ({} votes)",
            estimate.angle, estimate.source, estimate.votes
        );
    }

    let mut record = match existing {
        Some(existing) => existing,
        None => ResortCalibration::new(config.resort.clone(), region, calibration.clone()),
    };
    record.stake_region = region;
    record.calibration = calibration;
    if let Some(n) = config.sample_count {
        record.sample_count = n;
    }
    if config.notes.is_some() {
        record.notes = config.notes.clone();
    }
    let method = record.calibration.method_name();
    store.save(record).map_err(|e| e.to_string())?;

    println!(
        "Saved {} calibration for {} to {}",
        method,
        config.resort,
        config.calibrations.display()
    );
    Ok(())
}

fn usage() -> String {
    "Usage: auto_calibrate <config.json>".to_string()
}
