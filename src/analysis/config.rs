//! Analyzer configuration with tunable thresholds.

use serde::{Deserialize, Serialize};

use super::types::ContrastStatistic;

/// Text region detection thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Scan cell edge length in pixels.
    pub scan_cell: u32,
    /// Normalized gradient magnitude above which a pixel counts as edge.
    pub edge_threshold: f64,
    /// Minimum edge-pixel fraction for a cell to become a candidate.
    pub min_text_density: f64,
    /// Candidates closer than this (pixels) are unioned.
    pub merge_distance: u32,
    /// Merged regions below this area are discarded as noise.
    pub min_region_area: u64,

    /// Confidence weights: edge intensity, plausible size, density.
    pub weight_edge: f64,
    pub weight_size: f64,
    pub weight_density: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            scan_cell: 8,
            edge_threshold: 0.12,
            min_text_density: 0.08,
            merge_distance: 12,
            min_region_area: 256,
            weight_edge: 0.40,
            weight_size: 0.30,
            weight_density: 0.30,
        }
    }
}

/// Contrast map configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContrastConfig {
    /// Grid cell edge length in pixels.
    pub cell_size: u32,
    pub statistic: ContrastStatistic,
    /// Cells under this contrast populate `low_contrast_areas`.
    pub low_contrast_threshold: f64,
    /// Upper bound on the per-cell diopter nudge.
    pub max_diopter_nudge: f64,
    /// How many highest-need cells become priority regions.
    pub priority_region_count: usize,
}

impl Default for ContrastConfig {
    fn default() -> Self {
        Self {
            cell_size: 20,
            statistic: ContrastStatistic::Rms,
            low_contrast_threshold: 0.30,
            max_diopter_nudge: 0.50,
            priority_region_count: 5,
        }
    }
}

/// Classification thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifyConfig {
    /// Text coverage (region area / buffer area) above which content is
    /// text-dominant.
    pub text_coverage_threshold: f64,
    /// Color variance above which content is treated as imagery-rich.
    pub color_variance_threshold: f64,
    /// Region count above which per-region adjustments pay off.
    pub per_region_min_regions: usize,
    /// Buffer pixel count above which speed wins over quality.
    pub speed_priority_area: u64,
    /// Minimum buffer pixel count for the GPU path to be worthwhile.
    pub gpu_min_area: u64,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            text_coverage_threshold: 0.25,
            color_variance_threshold: 0.12,
            per_region_min_regions: 4,
            speed_priority_area: 1_000_000,
            gpu_min_area: 250_000,
        }
    }
}

/// Complete analyzer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Buffers with either dimension below this yield an empty result.
    pub min_dimension: u32,
    /// Interactive time budget in milliseconds.
    pub time_budget_ms: u64,
    pub device_pixel_ratio: f64,
    pub detection: DetectionConfig,
    pub contrast: ContrastConfig,
    pub classify: ClassifyConfig,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            min_dimension: 16,
            time_budget_ms: 16,
            device_pixel_ratio: 1.0,
            detection: DetectionConfig::default(),
            contrast: ContrastConfig::default(),
            classify: ClassifyConfig::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Short digest of the fields that change analysis output.
    /// Folded into cache fingerprints so a config change is a miss.
    pub fn digest(&self) -> String {
        format!(
            "d{}:{:.3}:{:.3}:{}:c{}:{:?}:{:.2}:{:.2}",
            self.detection.scan_cell,
            self.detection.edge_threshold,
            self.detection.min_text_density,
            self.detection.merge_distance,
            self.contrast.cell_size,
            self.contrast.statistic,
            self.contrast.low_contrast_threshold,
            self.contrast.max_diopter_nudge,
        )
    }
}
