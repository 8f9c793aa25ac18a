//! Content analysis: pixel buffer in, `AnalysisResult` out.
//!
//! The pipeline is gradient -> text regions -> contrast map ->
//! enhancement map -> classification, all under an interactive time
//! budget. A missing or too-small buffer yields a deterministic empty
//! result rather than an error.

pub mod cache;
pub mod classify;
pub mod config;
pub mod contrast;
pub mod gradient;
pub mod regions;
pub mod types;

pub use cache::{fingerprint, AnalysisCache, Fingerprint};
pub use config::{AnalyzerConfig, ClassifyConfig, ContrastConfig, DetectionConfig};
pub use types::{
    AnalysisResult, Bounds, CellRef, ContentClassification, ContentType, ContrastMap,
    ContrastStatistic, EnhancementMap, ProcessingStrategy, RegionType, StrategyPriority,
    TextRegion,
};

use std::time::{Duration, Instant};

use chrono::Utc;

use crate::error::EngineError;

const ENABLE_LOGS: bool = true;
use crate::{log_info, log_warn};

/// Elapsed-time budget checked between analysis chunks.
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    deadline: Option<Instant>,
}

impl Budget {
    pub fn starting_now(limit_ms: u64) -> Self {
        Self {
            deadline: Some(Instant::now() + Duration::from_millis(limit_ms)),
        }
    }

    pub fn unlimited() -> Self {
        Self { deadline: None }
    }

    /// Already-spent budget, for exercising degraded paths.
    pub fn exhausted() -> Self {
        Self {
            deadline: Some(Instant::now()),
        }
    }

    pub fn exceeded(&self) -> bool {
        self.deadline
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }
}

/// Turns a pixel buffer into text regions, a contrast map, and a
/// content classification.
#[derive(Debug, Clone)]
pub struct ContentAnalyzer {
    config: AnalyzerConfig,
}

impl ContentAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Run one full analysis pass. Never fails: degraded inputs produce
    /// degraded (possibly empty) results.
    pub fn analyze(&self, buffer: Option<&crate::document::PixelBuffer>) -> AnalysisResult {
        let Some(buffer) = buffer else {
            return AnalysisResult::empty((0, 0), self.config.device_pixel_ratio,
                self.config.contrast.cell_size);
        };
        if buffer.width < self.config.min_dimension || buffer.height < self.config.min_dimension {
            log_info!(
                "{}, yielding empty result",
                EngineError::AnalysisUnavailable(format!(
                    "buffer {}x{} below minimum {}px",
                    buffer.width, buffer.height, self.config.min_dimension
                ))
            );
            return AnalysisResult::empty(
                (buffer.width, buffer.height),
                self.config.device_pixel_ratio,
                self.config.contrast.cell_size,
            );
        }

        let started = Instant::now();
        let budget = Budget::starting_now(self.config.time_budget_ms);

        let field = gradient::GradientField::compute(buffer);
        let text_regions = regions::detect_text_regions(&field, &self.config.detection, &budget);
        let contrast_map = contrast::compute_contrast_map(buffer, &self.config.contrast, &budget);
        let enhancement_map = contrast::derive_enhancement_map(&contrast_map, &self.config.contrast);
        let classification = classify::classify_content(
            buffer,
            &text_regions,
            &contrast_map,
            &self.config.classify,
            self.config.contrast.low_contrast_threshold,
        );

        let budget_exceeded = budget.exceeded();
        if budget_exceeded {
            log_warn!(
                "analysis of {}x{}: {}, returning partial result",
                buffer.width,
                buffer.height,
                EngineError::ProcessingTimeout {
                    budget_ms: self.config.time_budget_ms
                }
            );
        }

        AnalysisResult {
            text_regions,
            contrast_map,
            enhancement_map,
            classification,
            processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            timestamp_ms: Utc::now().timestamp_millis(),
            canvas_size: (buffer.width, buffer.height),
            device_pixel_ratio: self.config.device_pixel_ratio,
            budget_exceeded,
        }
    }
}

impl Default for ContentAnalyzer {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PixelBuffer;

    #[test]
    fn test_missing_buffer_yields_empty_result() {
        let analyzer = ContentAnalyzer::default();
        let result = analyzer.analyze(None);
        assert!(result.text_regions.is_empty());
        assert_eq!(result.canvas_size, (0, 0));
    }

    #[test]
    fn test_too_small_buffer_yields_empty_result() {
        let analyzer = ContentAnalyzer::default();
        let buffer = PixelBuffer::filled(8, 8, [0, 0, 0, 255]);
        let result = analyzer.analyze(Some(&buffer));
        assert!(result.text_regions.is_empty());
        assert_eq!(result.canvas_size, (8, 8));
    }

    #[test]
    fn test_zero_budget_flags_partial_result() {
        let config = AnalyzerConfig {
            time_budget_ms: 0,
            ..AnalyzerConfig::default()
        };
        let analyzer = ContentAnalyzer::new(config);
        let buffer = PixelBuffer::filled(64, 64, [128, 128, 128, 255]);
        let result = analyzer.analyze(Some(&buffer));
        assert!(result.budget_exceeded);
        // Partial data, not an error: the result is still usable.
        assert_eq!(result.canvas_size, (64, 64));
    }

    #[test]
    fn test_analysis_populates_all_sections() {
        let analyzer = ContentAnalyzer::default();
        let mut data = vec![255u8; 64 * 64 * 4];
        // Dark strokes on the top half.
        for y in 8..24u32 {
            for x in 4..60u32 {
                if x % 3 != 0 {
                    let idx = ((y * 64 + x) * 4) as usize;
                    data[idx] = 10;
                    data[idx + 1] = 10;
                    data[idx + 2] = 10;
                }
            }
        }
        let buffer = PixelBuffer::new(64, 64, data);
        let result = analyzer.analyze(Some(&buffer));

        assert_eq!(result.canvas_size, (64, 64));
        assert!(result.contrast_map.cols > 0);
        assert_eq!(
            result.enhancement_map.strengths.len(),
            result.contrast_map.cells.len()
        );
        assert!(result.processing_time_ms >= 0.0);
        assert!(!result.budget_exceeded);
    }
}
