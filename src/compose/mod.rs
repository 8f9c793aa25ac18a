//! Filter composition: Settings (+ optional analysis) into a concrete
//! visual transform descriptor.
//!
//! `compose` is pure: identical inputs always produce byte-identical
//! descriptors, which keeps re-application cheap to detect upstream.

use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisResult;
use crate::settings::Settings;

/// One entry in the ordered filter chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterOp {
    /// Multiplier, 1.0 = identity.
    Contrast(f64),
    Brightness(f64),
    Saturate(f64),
    /// Soft outline that thickens glyph edges.
    DropShadow { blur_px: f64, alpha: f64 },
    /// Simulated uncorrected blur for raw media contexts.
    Blur(f64),
}

impl FilterOp {
    /// `function(value unit)` token for the host styling layer.
    pub fn to_token(&self) -> String {
        match self {
            FilterOp::Contrast(v) => format!("contrast({})", fmt(*v)),
            FilterOp::Brightness(v) => format!("brightness({})", fmt(*v)),
            FilterOp::Saturate(v) => format!("saturate({})", fmt(*v)),
            FilterOp::DropShadow { blur_px, alpha } => {
                format!("drop-shadow(0 0 {}px rgba(0,0,0,{}))", fmt(*blur_px), fmt(*alpha))
            }
            FilterOp::Blur(v) => format!("blur({}px)", fmt(*v)),
        }
    }
}

/// Up to two decimals, trailing zeros trimmed: 1.60 -> "1.6", 1.00 -> "1".
fn fmt(value: f64) -> String {
    let rendered = format!("{value:.2}");
    let trimmed = rendered.trim_end_matches('0').trim_end_matches('.');
    trimmed.to_string()
}

/// Typographic adjustments applied alongside the filter chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Typography {
    pub letter_spacing_em: f64,
    pub line_height: f64,
    pub font_weight: u16,
}

/// Ordered filter chain plus typography. Recomputed per pass, never
/// persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualTransformDescriptor {
    pub ops: Vec<FilterOp>,
    pub typography: Option<Typography>,
}

impl VisualTransformDescriptor {
    pub fn identity() -> Self {
        Self {
            ops: Vec::new(),
            typography: None,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.ops.is_empty() && self.typography.is_none()
    }

    /// Ordered, space-separated filter encoding.
    pub fn to_filter_string(&self) -> String {
        self.ops
            .iter()
            .map(FilterOp::to_token)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Tunable composition constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposerConfig {
    /// Contrast multiplier gain at 100% boost.
    pub contrast_gain: f64,
    /// Brightness multiplier gain at 100% boost.
    pub brightness_gain: f64,
    /// Saturation multiplier gain at 100% edge enhancement.
    pub saturate_gain: f64,
    /// Drop-shadow blur radius at 100% edge enhancement, px.
    pub shadow_max_px: f64,
    pub shadow_alpha: f64,
    /// Region count at which the density bonus kicks in.
    pub density_threshold: usize,
    /// Percentage points added to edge enhancement for dense text.
    pub density_bonus_pct: f64,
    /// Mean contrast below which the low-contrast bonus applies.
    pub low_contrast_threshold: f64,
    /// Percentage points added to contrast boost for washed-out content.
    pub low_contrast_bonus_pct: f64,
    /// Readability constant k for simulated uncorrected blur.
    pub blur_readability_k: f64,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            contrast_gain: 0.8,
            brightness_gain: 0.24,
            saturate_gain: 0.1,
            shadow_max_px: 0.8,
            shadow_alpha: 0.6,
            density_threshold: 3,
            density_bonus_pct: 15.0,
            low_contrast_threshold: 0.3,
            low_contrast_bonus_pct: 20.0,
            blur_readability_k: 0.5,
        }
    }
}

/// Turns settings and optional analysis into a descriptor.
#[derive(Debug, Clone, Default)]
pub struct FilterComposer {
    config: ComposerConfig,
}

impl FilterComposer {
    pub fn new(config: ComposerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    /// Pure composition. Order is fixed: contrast, brightness, saturate,
    /// drop-shadow.
    pub fn compose(
        &self,
        settings: &Settings,
        analysis: Option<&AnalysisResult>,
    ) -> VisualTransformDescriptor {
        if !settings.enabled {
            return VisualTransformDescriptor::identity();
        }

        let mut contrast_pct = settings.contrast_boost_pct;
        let mut edge_pct = settings.edge_enhancement_pct;

        if let Some(analysis) = analysis {
            if analysis.text_regions.len() >= self.config.density_threshold {
                edge_pct = (edge_pct + self.config.density_bonus_pct).min(100.0);
            }
            let map = &analysis.contrast_map;
            if !map.cells.is_empty() && map.mean_contrast < self.config.low_contrast_threshold {
                contrast_pct = (contrast_pct + self.config.low_contrast_bonus_pct).min(100.0);
            }
        }

        let mut ops = Vec::new();
        if contrast_pct > 0.0 {
            ops.push(FilterOp::Contrast(
                1.0 + contrast_pct / 100.0 * self.config.contrast_gain,
            ));
            ops.push(FilterOp::Brightness(
                1.0 + contrast_pct / 100.0 * self.config.brightness_gain,
            ));
        }
        if edge_pct > 0.0 {
            ops.push(FilterOp::Saturate(
                1.0 + edge_pct / 100.0 * self.config.saturate_gain,
            ));
            ops.push(FilterOp::DropShadow {
                blur_px: edge_pct / 100.0 * self.config.shadow_max_px,
                alpha: self.config.shadow_alpha,
            });
        }

        VisualTransformDescriptor {
            ops,
            typography: Some(self.typography(settings.reading_vision)),
        }
    }

    /// Composition for raw image/video/camera targets: the regular
    /// chain plus the simulated uncorrected blur.
    pub fn compose_media(
        &self,
        settings: &Settings,
        analysis: Option<&AnalysisResult>,
        adjusted_calibration: f64,
    ) -> VisualTransformDescriptor {
        let mut descriptor = self.compose(settings, analysis);
        if !settings.enabled {
            return descriptor;
        }
        let blur = self.simulated_blur_px(adjusted_calibration, settings.reading_vision);
        if blur > 0.0 {
            descriptor.ops.push(FilterOp::Blur(blur));
        }
        // Typography is meaningless on raw media.
        descriptor.typography = None;
        descriptor
    }

    /// `max(0, adjusted - current) * k`: how blurry uncorrected content
    /// would look to this user at this device's viewing distance.
    pub fn simulated_blur_px(&self, adjusted_calibration: f64, reading_vision: f64) -> f64 {
        (adjusted_calibration - reading_vision).max(0.0) * self.config.blur_readability_k
    }

    fn typography(&self, reading_vision: f64) -> Typography {
        let steps = (reading_vision / 1.25).floor() as u16;
        Typography {
            letter_spacing_em: reading_vision * 0.01,
            line_height: (1.4 + reading_vision * 0.1).min(1.8),
            font_weight: (400 + steps * 100).min(700),
        }
    }
}
