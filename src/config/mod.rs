//! JSON configs for the command-line tools.
use crate::pipeline::EngineOptions;
use crate::types::StakeRegion;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct MeasureToolConfig {
    pub input: PathBuf,
    pub resort: String,
    /// Resort calibration document (`{"resorts": [...]}`).
    pub calibrations: PathBuf,
    /// Capture time in seconds since the Unix epoch.
    #[serde(default)]
    pub captured_at: Option<u64>,
    #[serde(default)]
    pub engine: EngineOptions,
    pub output: MeasureOutputConfig,
}

#[derive(Debug, Deserialize)]
pub struct MeasureOutputConfig {
    pub result_json: PathBuf,
    /// Optional dump of the normalized stake region.
    #[serde(default)]
    pub region_image: Option<PathBuf>,
}

/// Which calibration the auto-calibration tool derives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoCalibrationMethod {
    #[default]
    Markers,
    Linear,
    /// Tilt-aware linear model referenced to the top of the reference text.
    TiltLinear,
}

#[derive(Debug, Deserialize)]
pub struct AutoCalibrateToolConfig {
    pub input: PathBuf,
    pub resort: String,
    pub stake_region: StakeRegion,
    /// JSON array of text detections in source-image coordinates.
    pub ocr_detections: PathBuf,
    pub calibrations: PathBuf,
    #[serde(default)]
    pub method: AutoCalibrationMethod,
    /// Wrap marker/linear output with the estimated tilt.
    #[serde(default)]
    pub apply_tilt: bool,
    #[serde(default)]
    pub sample_count: Option<usize>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub engine: EngineOptions,
}

pub fn load_config<T: DeserializeOwned>(path: &Path) -> Result<T, String> {
    let data = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
    serde_json::from_str(&data)
        .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))
}
