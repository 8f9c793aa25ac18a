//! Calibration mapping between the user-facing diopter scale and the
//! internal correction scale, plus viewing-distance-driven device
//! adjustment.
//!
//! The user scale runs 0.00..=3.50 diopters (reading-glasses strength).
//! The blur model is centered at an internal zero that does not coincide
//! with the user's "no correction" anchor, so the internal scale is the
//! user scale shifted down by a fixed offset (reference 4.00).

use serde::{Deserialize, Serialize};

/// User-facing diopter range.
pub const USER_DIOPTER_MIN: f64 = 0.0;
pub const USER_DIOPTER_MAX: f64 = 3.5;

/// Device class inferred from viewport size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Mobile,
    Tablet,
    Desktop,
}

/// Read-only device input to calibration. Recomputed on viewport or
/// orientation change, never mutated in place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub device_class: DeviceClass,
    pub viewing_distance_inches: f64,
    pub calibration_adjustment_diopters: f64,
}

impl DeviceProfile {
    pub fn for_class(class: DeviceClass, config: &CalibrationConfig) -> Self {
        let (distance, adjustment) = match class {
            DeviceClass::Mobile => (14.0, config.mobile_adjustment),
            DeviceClass::Tablet => (18.0, config.tablet_adjustment),
            DeviceClass::Desktop => (24.0, config.desktop_adjustment),
        };
        Self {
            device_class: class,
            viewing_distance_inches: distance,
            calibration_adjustment_diopters: adjustment,
        }
    }

    /// Classify from viewport width (CSS pixels, standard breakpoints).
    pub fn from_viewport(width: u32, _height: u32, config: &CalibrationConfig) -> Self {
        let class = if width < 768 {
            DeviceClass::Mobile
        } else if width < 1024 {
            DeviceClass::Tablet
        } else {
            DeviceClass::Desktop
        };
        Self::for_class(class, config)
    }
}

/// Tunable calibration constants.
///
/// These are empirically tuned rather than derived from an optical
/// model, so they live in configuration instead of being hard-coded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Offset between the user scale and the internal scale.
    pub internal_offset: f64,
    /// Additive increments per device class; shorter viewing distance
    /// gets a larger increment.
    pub mobile_adjustment: f64,
    pub tablet_adjustment: f64,
    pub desktop_adjustment: f64,
    /// Extra fixed offset applied on desktop so the blur model's zero
    /// point lines up with the internal scale.
    pub desktop_alignment_offset: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            internal_offset: 4.0,
            mobile_adjustment: 0.75,
            tablet_adjustment: 0.50,
            desktop_adjustment: 0.25,
            desktop_alignment_offset: 0.25,
        }
    }
}

/// Pure conversions between user diopters and the internal scale.
#[derive(Debug, Clone)]
pub struct CalibrationMapper {
    config: CalibrationConfig,
}

impl CalibrationMapper {
    pub fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }

    /// User diopters -> internal scale. Out-of-range input clamps.
    pub fn to_internal(&self, user_diopter: f64) -> f64 {
        clamp_user(user_diopter) - self.config.internal_offset
    }

    /// Internal scale -> user diopters. Inverse of [`Self::to_internal`].
    pub fn to_user(&self, internal: f64) -> f64 {
        clamp_user(internal + self.config.internal_offset)
    }

    /// Additive device adjustment on the user scale.
    pub fn adjust_for_device(&self, base_diopter: f64, profile: &DeviceProfile) -> f64 {
        let mut adjusted = clamp_user(base_diopter) + profile.calibration_adjustment_diopters;
        if profile.device_class == DeviceClass::Desktop {
            adjusted += self.config.desktop_alignment_offset;
        }
        adjusted
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }
}

impl Default for CalibrationMapper {
    fn default() -> Self {
        Self::new(CalibrationConfig::default())
    }
}

fn clamp_user(value: f64) -> f64 {
    if value.is_nan() {
        return USER_DIOPTER_MIN;
    }
    value.clamp(USER_DIOPTER_MIN, USER_DIOPTER_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_to_internal_reference_offset() {
        let mapper = CalibrationMapper::default();
        assert_abs_diff_eq!(mapper.to_internal(2.0), -2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_to_user_inverse() {
        let mapper = CalibrationMapper::default();
        assert_abs_diff_eq!(mapper.to_user(-2.0), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_round_trip_across_range() {
        let mapper = CalibrationMapper::default();
        let mut x = USER_DIOPTER_MIN;
        while x <= USER_DIOPTER_MAX {
            assert_abs_diff_eq!(mapper.to_user(mapper.to_internal(x)), x, epsilon = 1e-6);
            x += 0.05;
        }
    }

    #[test]
    fn test_out_of_range_clamps() {
        let mapper = CalibrationMapper::default();
        assert_abs_diff_eq!(mapper.to_internal(-1.0), mapper.to_internal(0.0));
        assert_abs_diff_eq!(mapper.to_internal(9.0), mapper.to_internal(3.5));
        assert_abs_diff_eq!(mapper.to_internal(f64::NAN), mapper.to_internal(0.0));
    }

    #[test]
    fn test_mobile_adjustment() {
        let config = CalibrationConfig::default();
        let mapper = CalibrationMapper::new(config.clone());
        let profile = DeviceProfile::for_class(DeviceClass::Mobile, &config);
        assert_abs_diff_eq!(mapper.adjust_for_device(2.0, &profile), 2.75, epsilon = 1e-9);
    }

    #[test]
    fn test_device_class_ordering() {
        let config = CalibrationConfig::default();
        assert!(config.mobile_adjustment > config.tablet_adjustment);
        assert!(config.tablet_adjustment > config.desktop_adjustment);
    }

    #[test]
    fn test_desktop_alignment_offset_applied() {
        let config = CalibrationConfig::default();
        let mapper = CalibrationMapper::new(config.clone());
        let profile = DeviceProfile::for_class(DeviceClass::Desktop, &config);
        let expected = 2.0 + config.desktop_adjustment + config.desktop_alignment_offset;
        assert_abs_diff_eq!(mapper.adjust_for_device(2.0, &profile), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_viewport_classification() {
        let config = CalibrationConfig::default();
        assert_eq!(
            DeviceProfile::from_viewport(390, 844, &config).device_class,
            DeviceClass::Mobile
        );
        assert_eq!(
            DeviceProfile::from_viewport(820, 1180, &config).device_class,
            DeviceClass::Tablet
        );
        assert_eq!(
            DeviceProfile::from_viewport(1920, 1080, &config).device_class,
            DeviceClass::Desktop
        );
    }
}
