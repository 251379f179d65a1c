//! Per-resort calibration records and their persistence.
//!
//! The JSON document holds every resort:
//!
//! ```json
//! { "resorts": [
//!     { "resort": "winter_park",
//!       "stake_region": {"x": 410, "y": 120, "width": 60, "height": 700},
//!       "calibration": {"method": "linear", "pixels_per_inch": 9.6, "reference_y": 812},
//!       "sample_count": 10 } ] }
//! ```
use crate::calibration::CalibrationParameters;
use crate::error::InvalidCalibration;
use crate::types::StakeRegion;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

fn default_sample_count() -> usize {
    10
}

fn default_enabled() -> bool {
    true
}

/// Everything needed to measure one resort's stake.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResortCalibration {
    pub resort: String,
    pub stake_region: StakeRegion,
    pub calibration: CalibrationParameters,
    #[serde(default = "default_sample_count")]
    pub sample_count: usize,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ResortCalibration {
    pub fn new(
        resort: impl Into<String>,
        stake_region: StakeRegion,
        calibration: CalibrationParameters,
    ) -> Self {
        Self {
            resort: resort.into(),
            stake_region,
            calibration,
            sample_count: default_sample_count(),
            enabled: true,
            notes: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed calibration document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no calibration stored for resort {0:?}")]
    UnknownResort(String),
    #[error("refusing to store invalid calibration for {resort:?}: {source}")]
    Invalid {
        resort: String,
        #[source]
        source: InvalidCalibration,
    },
}

/// Persistence seam for resort calibrations.
pub trait ConfigStore {
    fn load(&self, resort: &str) -> Result<ResortCalibration, StoreError>;
    /// Inserts or replaces the record for `record.resort`.
    fn save(&mut self, record: ResortCalibration) -> Result<(), StoreError>;
    /// Resort ids in storage order.
    fn list(&self) -> Result<Vec<String>, StoreError>;

    /// Stores `calibration` for `resort`, keeping the rest of an existing
    /// record. A new resort gets a disabled record with an empty stake
    /// region until one is configured.
    fn save_calibration(
        &mut self,
        resort: &str,
        calibration: CalibrationParameters,
    ) -> Result<(), StoreError> {
        let record = match self.load(resort) {
            Ok(mut record) => {
                record.calibration = calibration;
                record
            }
            Err(StoreError::UnknownResort(_)) => {
                debug!("save_calibration: creating record for {resort:?}");
                ResortCalibration {
                    enabled: false,
                    ..ResortCalibration::new(resort, StakeRegion::default(), calibration)
                }
            }
            Err(e) => return Err(e),
        };
        self.save(record)
    }
}

fn check(record: &ResortCalibration) -> Result<(), StoreError> {
    record
        .calibration
        .validate()
        .map_err(|source| StoreError::Invalid {
            resort: record.resort.clone(),
            source,
        })
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    resorts: Vec<ResortCalibration>,
}

/// `{"resorts": [...]}` JSON file. A missing file is an empty store.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_err(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read(&self) -> Result<StoreDocument, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(StoreDocument::default()),
            Err(e) => Err(self.io_err(e)),
        }
    }

    fn write(&self, doc: &StoreDocument) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| self.io_err(e))?;
        }
        let json = serde_json::to_string_pretty(doc)?;
        fs::write(&self.path, json).map_err(|e| self.io_err(e))
    }
}

impl ConfigStore for JsonFileStore {
    fn load(&self, resort: &str) -> Result<ResortCalibration, StoreError> {
        self.read()?
            .resorts
            .into_iter()
            .find(|r| r.resort == resort)
            .ok_or_else(|| StoreError::UnknownResort(resort.to_string()))
    }

    fn save(&mut self, record: ResortCalibration) -> Result<(), StoreError> {
        check(&record)?;
        let mut doc = self.read()?;
        match doc.resorts.iter_mut().find(|r| r.resort == record.resort) {
            Some(slot) => *slot = record,
            None => doc.resorts.push(record),
        }
        debug!(
            "JsonFileStore: writing {} resort(s) to {}",
            doc.resorts.len(),
            self.path.display()
        );
        self.write(&doc)
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.read()?.resorts.into_iter().map(|r| r.resort).collect())
    }
}

/// In-memory store for tests and embedding.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    records: BTreeMap<String, ResortCalibration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryStore {
    fn load(&self, resort: &str) -> Result<ResortCalibration, StoreError> {
        self.records
            .get(resort)
            .cloned()
            .ok_or_else(|| StoreError::UnknownResort(resort.to_string()))
    }

    fn save(&mut self, record: ResortCalibration) -> Result<(), StoreError> {
        check(&record)?;
        self.records.insert(record.resort.clone(), record);
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.records.keys().cloned().collect())
    }
}
