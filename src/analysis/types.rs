//! Analysis output types.
//!
//! An `AnalysisResult` is immutable once produced; each new pass over a
//! node replaces the previous result wholesale.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Pixel-space rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Bounds) -> Bounds {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Bounds::new(x, y, right - x, bottom - y)
    }

    /// True when the rectangles, each grown by `distance`, overlap.
    pub fn within_distance(&self, other: &Bounds, distance: u32) -> bool {
        let horizontally_near = self.x <= other.right() + distance
            && other.x <= self.right() + distance;
        let vertically_near = self.y <= other.bottom() + distance
            && other.y <= self.bottom() + distance;
        horizontally_near && vertically_near
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionType {
    Heading,
    Paragraph,
    Caption,
    Unknown,
}

/// A rectangular area believed to contain text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRegion {
    pub bounds: Bounds,
    /// 0.0..=1.0, combined edge/size/density evidence.
    pub confidence: f64,
    pub text_density: f64,
    pub estimated_font_size: f64,
    pub edge_intensity: f64,
    pub region_type: RegionType,
}

/// Per-cell contrast statistic selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContrastStatistic {
    Rms,
    Michelson,
    Weber,
}

/// Grid cell coordinate within a contrast map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRef {
    pub col: u32,
    pub row: u32,
}

/// Grid-sampled local contrast across a buffer, values in 0.0..=1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContrastMap {
    pub cols: u32,
    pub rows: u32,
    pub cell_size: u32,
    /// Row-major, `cols * rows` entries.
    pub cells: Vec<f64>,
    pub mean_contrast: f64,
    pub min_contrast: f64,
    pub max_contrast: f64,
    pub low_contrast_areas: Vec<CellRef>,
}

impl ContrastMap {
    pub fn empty(cell_size: u32) -> Self {
        Self {
            cols: 0,
            rows: 0,
            cell_size,
            cells: Vec::new(),
            mean_contrast: 0.0,
            min_contrast: 0.0,
            max_contrast: 0.0,
            low_contrast_areas: Vec::new(),
        }
    }

    pub fn cell(&self, col: u32, row: u32) -> Option<f64> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        self.cells.get((row * self.cols + col) as usize).copied()
    }
}

/// Per-cell correction need derived from a `ContrastMap`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancementMap {
    pub cols: u32,
    pub rows: u32,
    /// 0.0..=1.0 per cell; higher means more correction needed.
    pub strengths: Vec<f64>,
    /// Additive diopter nudge per cell, clamped to the configured bound.
    pub diopter_nudges: Vec<f64>,
    /// Highest-need cells, strongest first.
    pub priority_regions: Vec<CellRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Email,
    Article,
    UiInterface,
    Document,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyPriority {
    Speed,
    Quality,
}

/// Recommended processing approach for a classified buffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStrategy {
    pub contrast_boost: bool,
    pub edge_enhancement: bool,
    pub per_region_adjustments: bool,
    pub priority: StrategyPriority,
    pub gpu_eligible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentClassification {
    pub content_type: ContentType,
    pub confidence: f64,
    pub strategy: ProcessingStrategy,
}

impl ContentClassification {
    pub fn unknown() -> Self {
        Self {
            content_type: ContentType::Mixed,
            confidence: 0.0,
            strategy: ProcessingStrategy {
                contrast_boost: false,
                edge_enhancement: false,
                per_region_adjustments: false,
                priority: StrategyPriority::Speed,
                gpu_eligible: false,
            },
        }
    }
}

/// Complete output of one analysis pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub text_regions: Vec<TextRegion>,
    pub contrast_map: ContrastMap,
    pub enhancement_map: EnhancementMap,
    pub classification: ContentClassification,
    pub processing_time_ms: f64,
    pub timestamp_ms: i64,
    pub canvas_size: (u32, u32),
    pub device_pixel_ratio: f64,
    /// Set when the pass ran out of budget and returned partial data.
    pub budget_exceeded: bool,
}

impl AnalysisResult {
    /// Deterministic result for missing or too-small buffers.
    pub fn empty(canvas_size: (u32, u32), device_pixel_ratio: f64, cell_size: u32) -> Self {
        Self {
            text_regions: Vec::new(),
            contrast_map: ContrastMap::empty(cell_size),
            enhancement_map: EnhancementMap {
                cols: 0,
                rows: 0,
                strengths: Vec::new(),
                diopter_nudges: Vec::new(),
                priority_regions: Vec::new(),
            },
            classification: ContentClassification::unknown(),
            processing_time_ms: 0.0,
            timestamp_ms: Utc::now().timestamp_millis(),
            canvas_size,
            device_pixel_ratio,
            budget_exceeded: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_union() {
        let a = Bounds::new(0, 0, 10, 10);
        let b = Bounds::new(20, 5, 10, 10);
        assert_eq!(a.union(&b), Bounds::new(0, 0, 30, 15));
    }

    #[test]
    fn test_bounds_within_distance() {
        let a = Bounds::new(0, 0, 10, 10);
        let b = Bounds::new(14, 0, 10, 10);
        assert!(a.within_distance(&b, 4));
        assert!(!a.within_distance(&b, 3));
    }

    #[test]
    fn test_empty_result_is_deterministic() {
        let a = AnalysisResult::empty((0, 0), 1.0, 20);
        assert!(a.text_regions.is_empty());
        assert_eq!(a.contrast_map.mean_contrast, 0.0);
        assert_eq!(a.classification.confidence, 0.0);
    }
}
