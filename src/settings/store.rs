//! JSON-file-backed key->value persistence.

use std::collections::BTreeMap;
use std::{fs, path::PathBuf, sync::RwLock};

use anyhow::{Context, Result};

use super::{CalibrationData, Settings};
use crate::error::EngineError;

const ENABLE_LOGS: bool = true;
use crate::log_warn;

const KEY_CALIBRATION_VALUE: &str = "calibrationValue";
const KEY_ENABLED: &str = "visionCorrectionEnabled";
const KEY_SETTINGS_BLOB: &str = "visionSettings";
const KEY_CALIBRATION_BLOB: &str = "calibrationData";

/// String-encoded key->value store persisted as one JSON object.
/// Missing keys and unreadable files default silently.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<BTreeMap<String, String>>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Stored calibration on the internal diopter scale. A missing or
    /// non-numeric value reads as 0.0.
    pub fn calibration_internal(&self) -> f64 {
        let guard = self.data.read().unwrap();
        match guard.get(KEY_CALIBRATION_VALUE) {
            None => 0.0,
            Some(raw) => raw.parse::<f64>().unwrap_or_else(|_| {
                log_warn!(
                    "{}, using 0.0",
                    EngineError::InvalidCalibrationInput(raw.clone())
                );
                0.0
            }),
        }
    }

    pub fn set_calibration_internal(&self, value: f64) -> Result<()> {
        self.put(KEY_CALIBRATION_VALUE, value.to_string())
    }

    pub fn enabled(&self) -> bool {
        let guard = self.data.read().unwrap();
        guard
            .get(KEY_ENABLED)
            .map(|raw| raw == "true")
            .unwrap_or(false)
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.put(KEY_ENABLED, enabled.to_string())
    }

    /// Settings blob; defaults when absent or malformed.
    pub fn settings(&self) -> Settings {
        let guard = self.data.read().unwrap();
        guard
            .get(KEY_SETTINGS_BLOB)
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }

    pub fn set_settings(&self, settings: &Settings) -> Result<()> {
        self.put(KEY_SETTINGS_BLOB, serde_json::to_string(settings)?)
    }

    /// Last completed calibration, if any.
    pub fn calibration_data(&self) -> Option<CalibrationData> {
        let guard = self.data.read().unwrap();
        guard
            .get(KEY_CALIBRATION_BLOB)
            .and_then(|raw| serde_json::from_str(raw).ok())
    }

    /// Replace the calibration record wholesale.
    pub fn set_calibration_data(&self, data: &CalibrationData) -> Result<()> {
        self.put(KEY_CALIBRATION_BLOB, serde_json::to_string(data)?)
    }

    fn put(&self, key: &str, value: String) -> Result<()> {
        let mut guard = self.data.write().unwrap();
        guard.insert(key.to_string(), value);
        self.persist(&guard)
    }

    fn persist(&self, data: &BTreeMap<String, String>) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
