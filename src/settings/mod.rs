//! Session settings, calibration records, and their persistence.
//!
//! Persistence is a string-encoded key->value contract backed by one
//! JSON file. Missing keys default silently; a non-numeric stored
//! calibration reads as 0.0 instead of failing the session.

mod store;

pub use store::SettingsStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calibration::{USER_DIOPTER_MAX, USER_DIOPTER_MIN};

/// One logical instance per session, mirrored across consumers via the
/// session bus. Replaced wholesale; a change restarts the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// User-facing reading strength in diopters, 0.00..=3.50.
    pub reading_vision: f64,
    /// 0..=100.
    pub contrast_boost_pct: f64,
    /// 0..=100.
    pub edge_enhancement_pct: f64,
    pub enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            reading_vision: 0.0,
            contrast_boost_pct: 0.0,
            edge_enhancement_pct: 0.0,
            enabled: false,
        }
    }
}

impl Settings {
    /// Clamp every field into its valid range. Out-of-range input is
    /// corrected, never rejected.
    pub fn clamped(mut self) -> Self {
        self.reading_vision = self
            .reading_vision
            .clamp(USER_DIOPTER_MIN, USER_DIOPTER_MAX);
        self.contrast_boost_pct = self.contrast_boost_pct.clamp(0.0, 100.0);
        self.edge_enhancement_pct = self.edge_enhancement_pct.clamp(0.0, 100.0);
        self
    }

    pub fn apply(&self, patch: &SettingsPatch) -> Settings {
        Settings {
            reading_vision: patch.reading_vision.unwrap_or(self.reading_vision),
            contrast_boost_pct: patch.contrast_boost_pct.unwrap_or(self.contrast_boost_pct),
            edge_enhancement_pct: patch
                .edge_enhancement_pct
                .unwrap_or(self.edge_enhancement_pct),
            enabled: patch.enabled.unwrap_or(self.enabled),
        }
        .clamped()
    }
}

/// Partial settings update from a consumer surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub reading_vision: Option<f64>,
    pub contrast_boost_pct: Option<f64>,
    pub edge_enhancement_pct: Option<f64>,
    pub enabled: Option<bool>,
}

/// Snapshot written when calibration completes. Replaced wholesale on
/// recalibration, never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationData {
    pub reading_vision: f64,
    pub contrast_boost_pct: f64,
    pub edge_enhancement_pct: f64,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_patch_applies_partially() {
        let base = Settings {
            reading_vision: 1.5,
            contrast_boost_pct: 40.0,
            edge_enhancement_pct: 20.0,
            enabled: true,
        };
        let patched = base.apply(&SettingsPatch {
            contrast_boost_pct: Some(60.0),
            ..SettingsPatch::default()
        });
        assert_abs_diff_eq!(patched.reading_vision, 1.5);
        assert_abs_diff_eq!(patched.contrast_boost_pct, 60.0);
        assert!(patched.enabled);
    }

    #[test]
    fn test_clamping_on_apply() {
        let patched = Settings::default().apply(&SettingsPatch {
            reading_vision: Some(9.0),
            contrast_boost_pct: Some(-5.0),
            edge_enhancement_pct: Some(150.0),
            enabled: Some(true),
        });
        assert_abs_diff_eq!(patched.reading_vision, 3.5);
        assert_abs_diff_eq!(patched.contrast_boost_pct, 0.0);
        assert_abs_diff_eq!(patched.edge_enhancement_pct, 100.0);
    }
}
