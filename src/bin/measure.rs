use snow_stake::config::{load_config, MeasureToolConfig};
use snow_stake::image::io::{load_rgb_image, save_plane_png, write_json_file};
use snow_stake::preprocess::prepare;
use snow_stake::store::{ConfigStore, JsonFileStore};
use snow_stake::SnowStakeMeasurer;
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
    let config: MeasureToolConfig = load_config(Path::new(&config_path))?;

    let store = JsonFileStore::new(&config.calibrations);
    let resort = store.load(&config.resort).map_err(|e| e.to_string())?;
    if !resort.enabled {
        return Err(format!("Resort {} is disabled", resort.resort));
    }

    let image = load_rgb_image(&config.input)?;
    println!(
        "Loaded {} ({}x{})",
        config.input.display(),
        image.width(),
        image.height()
    );
    let measurer = SnowStakeMeasurer::new(&config.engine);
    let result = measurer
        .measure_image(image.as_view(), &resort, config.captured_at)
        .map_err(|e| e.to_string())?;

    if let Some(path) = &config.output.region_image {
        let region = prepare(image.as_view(), resort.stake_region, &config.engine.preprocess)
            .map_err(|e| e.to_string())?;
        save_plane_png(&region.luma, path)?;
        println!("Saved normalized stake region to {}", path.display());
    }
    write_json_file(&config.output.result_json, &result)?;

    match result.snow_depth_inches {
        Some(depth) => println!(
            "{}: {:.1}\" (confidence {:.2}, {}/{} samples{})",
            resort.resort,
            depth,
            result.confidence_score,
            result.used_samples(),
            result.sample_measurements.len(),
            if result.is_below_threshold {
                ", below threshold"
            } else {
                ""
            }
        ),
        None => println!("{}: unreadable image", resort.resort),
    }
    println!("Saved result to {}", config.output.result_json.display());
    Ok(())
}

fn usage() -> String {
    "Usage: measure <config.json>".to_string()
}
