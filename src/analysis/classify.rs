//! Content classification from aggregate analysis signals.
//!
//! Compares text density, layout signals, and color variance against
//! per-type thresholds to name the content and recommend a processing
//! strategy.

use super::config::ClassifyConfig;
use super::types::{
    ContentClassification, ContentType, ContrastMap, ProcessingStrategy, StrategyPriority,
    TextRegion,
};
use crate::document::PixelBuffer;

/// Layout evidence extracted from detected regions.
#[derive(Debug, Clone, Copy, Default)]
struct LayoutSignals {
    has_header_band: bool,
    has_sidebar: bool,
    button_like_count: usize,
}

pub fn classify_content(
    buffer: &PixelBuffer,
    regions: &[TextRegion],
    contrast_map: &ContrastMap,
    config: &ClassifyConfig,
    low_contrast_threshold: f64,
) -> ContentClassification {
    let area = buffer.width as u64 * buffer.height as u64;
    let covered: u64 = regions.iter().map(|r| r.bounds.area()).sum();
    let text_coverage = if area == 0 {
        0.0
    } else {
        (covered as f64 / area as f64).min(1.0)
    };

    let color_variance = sampled_color_variance(buffer);
    let layout = layout_signals(buffer, regions);

    let text_heavy = text_coverage >= config.text_coverage_threshold;
    let colorful = color_variance >= config.color_variance_threshold;

    // Per-type evidence scores; highest wins, near-ties fall to Mixed.
    let mut scores = [
        (
            ContentType::Email,
            0.5 * bool_score(layout.has_header_band)
                + 0.3 * bool_score(text_heavy)
                + 0.2 * bool_score(!colorful),
        ),
        (
            ContentType::Article,
            0.5 * bool_score(text_heavy && regions.len() >= 2)
                + 0.3 * bool_score(!colorful)
                + 0.2 * bool_score(!layout.has_sidebar && layout.button_like_count < 2),
        ),
        (
            ContentType::UiInterface,
            0.4 * bool_score(layout.button_like_count >= 2)
                + 0.3 * bool_score(layout.has_sidebar)
                + 0.3 * bool_score(colorful && !text_heavy),
        ),
        (
            ContentType::Document,
            0.6 * bool_score(text_coverage >= 2.0 * config.text_coverage_threshold)
                + 0.4 * bool_score(!colorful && !layout.has_sidebar),
        ),
    ];
    scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let (top_type, top_score) = scores[0];
    let runner_up = scores[1].1;

    let (content_type, confidence) = if top_score < 0.3 || top_score - runner_up < 0.15 {
        (ContentType::Mixed, top_score.max(0.3))
    } else {
        (top_type, top_score)
    };

    let strategy = ProcessingStrategy {
        contrast_boost: contrast_map.mean_contrast < low_contrast_threshold,
        edge_enhancement: text_heavy || regions.len() >= 3,
        per_region_adjustments: regions.len() >= config.per_region_min_regions,
        priority: if area > config.speed_priority_area {
            StrategyPriority::Speed
        } else {
            StrategyPriority::Quality
        },
        gpu_eligible: area >= config.gpu_min_area,
    };

    ContentClassification {
        content_type,
        confidence: confidence.clamp(0.0, 1.0),
        strategy,
    }
}

fn bool_score(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

fn layout_signals(buffer: &PixelBuffer, regions: &[TextRegion]) -> LayoutSignals {
    let width = buffer.width as f64;
    let height = buffer.height as f64;
    if width == 0.0 || height == 0.0 {
        return LayoutSignals::default();
    }

    let mut signals = LayoutSignals::default();
    for region in regions {
        let b = &region.bounds;
        let rw = b.width as f64;
        let rh = b.height as f64;

        if (b.y as f64) < height * 0.15 && rw > width * 0.5 {
            signals.has_header_band = true;
        }
        let at_edge = (b.x as f64) < width * 0.05 || (b.right() as f64) > width * 0.95;
        if at_edge && rw < width * 0.25 && rh > height * 0.5 {
            signals.has_sidebar = true;
        }
        let aspect = rw / rh.max(1.0);
        if b.area() < (width * height * 0.02) as u64 && (2.0..=8.0).contains(&aspect) {
            signals.button_like_count += 1;
        }
    }
    signals
}

/// Mean per-channel variance over a sparse pixel sample, normalized so
/// a full-range channel gives 0.25.
fn sampled_color_variance(buffer: &PixelBuffer) -> f64 {
    let step = ((buffer.width * buffer.height / 4096).max(1) as f64).sqrt() as u32;
    let step = step.max(1);

    let mut count = 0.0f64;
    let mut sums = [0.0f64; 3];
    let mut sq_sums = [0.0f64; 3];

    let mut y = 0;
    while y < buffer.height {
        let mut x = 0;
        while x < buffer.width {
            let px = buffer.pixel(x, y);
            for channel in 0..3 {
                let v = px[channel] as f64 / 255.0;
                sums[channel] += v;
                sq_sums[channel] += v * v;
            }
            count += 1.0;
            x += step;
        }
        y += step;
    }

    if count == 0.0 {
        return 0.0;
    }
    let mut variance = 0.0;
    for channel in 0..3 {
        let mean = sums[channel] / count;
        variance += sq_sums[channel] / count - mean * mean;
    }
    variance / 3.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::types::{Bounds, RegionType};

    fn region(x: u32, y: u32, w: u32, h: u32) -> TextRegion {
        TextRegion {
            bounds: Bounds::new(x, y, w, h),
            confidence: 0.8,
            text_density: 0.2,
            estimated_font_size: 14.0,
            edge_intensity: 0.2,
            region_type: RegionType::Paragraph,
        }
    }

    fn flat_map(mean: f64) -> ContrastMap {
        ContrastMap::from_cells(vec![mean; 4], 2, 2, 20, 0.3)
    }

    #[test]
    fn test_article_classification() {
        let buffer = PixelBuffer::filled(400, 400, [250, 250, 250, 255]);
        // Two wide body-text blocks, no header band, no chrome.
        let regions = vec![region(40, 100, 320, 80), region(40, 220, 320, 120)];
        let result = classify_content(
            &buffer,
            &regions,
            &flat_map(0.6),
            &ClassifyConfig::default(),
            0.3,
        );
        assert_eq!(result.content_type, ContentType::Article);
        assert!(result.confidence > 0.5);
        assert!(!result.strategy.contrast_boost);
        assert!(result.strategy.edge_enhancement);
    }

    #[test]
    fn test_empty_signals_classify_as_mixed() {
        let buffer = PixelBuffer::filled(100, 100, [128, 128, 128, 255]);
        let result = classify_content(
            &buffer,
            &[],
            &flat_map(0.5),
            &ClassifyConfig::default(),
            0.3,
        );
        assert_eq!(result.content_type, ContentType::Mixed);
    }

    #[test]
    fn test_low_contrast_recommends_boost() {
        let buffer = PixelBuffer::filled(100, 100, [128, 128, 128, 255]);
        let result = classify_content(
            &buffer,
            &[],
            &flat_map(0.1),
            &ClassifyConfig::default(),
            0.3,
        );
        assert!(result.strategy.contrast_boost);
    }

    #[test]
    fn test_large_buffer_prefers_speed_and_gpu() {
        let buffer = PixelBuffer::filled(1200, 900, [255, 255, 255, 255]);
        let result = classify_content(
            &buffer,
            &[region(0, 0, 600, 100)],
            &flat_map(0.5),
            &ClassifyConfig::default(),
            0.3,
        );
        assert_eq!(result.strategy.priority, StrategyPriority::Speed);
        assert!(result.strategy.gpu_eligible);
    }

    #[test]
    fn test_per_region_adjustments_need_enough_regions() {
        let buffer = PixelBuffer::filled(400, 400, [255, 255, 255, 255]);
        let few = classify_content(
            &buffer,
            &[region(0, 0, 50, 20)],
            &flat_map(0.5),
            &ClassifyConfig::default(),
            0.3,
        );
        assert!(!few.strategy.per_region_adjustments);

        let many: Vec<TextRegion> = (0..5).map(|i| region(0, i * 60, 200, 40)).collect();
        let result = classify_content(
            &buffer,
            &many,
            &flat_map(0.5),
            &ClassifyConfig::default(),
            0.3,
        );
        assert!(result.strategy.per_region_adjustments);
    }
}
