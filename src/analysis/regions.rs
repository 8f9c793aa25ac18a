//! Text region detection over a gradient field.
//!
//! Cells with enough edge density become candidate rectangles, nearby
//! candidates are unioned until no more merges are possible, and each
//! surviving region gets a confidence score from edge intensity,
//! plausible glyph size, and density.

use super::config::DetectionConfig;
use super::gradient::GradientField;
use super::types::{Bounds, RegionType, TextRegion};
use super::Budget;

pub fn detect_text_regions(
    field: &GradientField,
    config: &DetectionConfig,
    budget: &Budget,
) -> Vec<TextRegion> {
    let candidates = collect_candidates(field, config, budget);
    let merged = merge_candidates(candidates, config.merge_distance);

    merged
        .into_iter()
        .filter(|bounds| bounds.area() >= config.min_region_area)
        .map(|bounds| score_region(field, config, bounds))
        .collect()
}

/// Scan the field cell by cell; a cell with enough edge density is a
/// candidate. Stops early (returning what it has) on budget exhaustion.
fn collect_candidates(
    field: &GradientField,
    config: &DetectionConfig,
    budget: &Budget,
) -> Vec<Bounds> {
    let cell = config.scan_cell.max(1);
    let mut candidates = Vec::new();

    let mut y = 0;
    while y < field.height {
        if budget.exceeded() {
            break;
        }
        let mut x = 0;
        while x < field.width {
            let density = field.window_density(x, y, cell, cell, config.edge_threshold);
            if density >= config.min_text_density {
                let w = cell.min(field.width - x);
                let h = cell.min(field.height - y);
                candidates.push(Bounds::new(x, y, w, h));
            }
            x += cell;
        }
        y += cell;
    }

    candidates
}

/// Union candidates within merge distance. Repeats until a full pass
/// makes no merge.
fn merge_candidates(mut regions: Vec<Bounds>, merge_distance: u32) -> Vec<Bounds> {
    loop {
        let mut merged = false;
        let mut result: Vec<Bounds> = Vec::with_capacity(regions.len());

        'outer: for bounds in regions {
            for existing in &mut result {
                if existing.within_distance(&bounds, merge_distance) {
                    *existing = existing.union(&bounds);
                    merged = true;
                    continue 'outer;
                }
            }
            result.push(bounds);
        }

        regions = result;
        if !merged {
            break;
        }
    }
    regions
}

fn score_region(field: &GradientField, config: &DetectionConfig, bounds: Bounds) -> TextRegion {
    let edge_intensity =
        field.window_mean(bounds.x, bounds.y, bounds.width, bounds.height);
    let text_density = field.window_density(
        bounds.x,
        bounds.y,
        bounds.width,
        bounds.height,
        config.edge_threshold,
    );

    let line_runs = text_line_runs(field, config, &bounds);
    let estimated_font_size = if line_runs.is_empty() {
        bounds.height as f64
    } else {
        line_runs.iter().sum::<f64>() / line_runs.len() as f64
    };

    let region_type = classify_region(&bounds, line_runs.len(), estimated_font_size);

    // Edge magnitudes sit well below 1.0 even on crisp glyphs, so scale
    // intensity up before weighting.
    let edge_score = (edge_intensity * 4.0).min(1.0);
    let size_score = size_plausibility(estimated_font_size);
    let density_score = (text_density * 3.0).min(1.0);
    let confidence = (config.weight_edge * edge_score
        + config.weight_size * size_score
        + config.weight_density * density_score)
        .clamp(0.0, 1.0);

    TextRegion {
        bounds,
        confidence,
        text_density,
        estimated_font_size,
        edge_intensity,
        region_type,
    }
}

/// Heights of consecutive runs of edge-active rows inside a region.
/// Each run approximates one line of text.
fn text_line_runs(field: &GradientField, config: &DetectionConfig, bounds: &Bounds) -> Vec<f64> {
    let mut runs = Vec::new();
    let mut current: u32 = 0;

    for y in bounds.y..bounds.bottom().min(field.height) {
        let row_density =
            field.window_density(bounds.x, y, bounds.width, 1, config.edge_threshold);
        if row_density >= config.min_text_density {
            current += 1;
        } else if current > 0 {
            runs.push(current as f64);
            current = 0;
        }
    }
    if current > 0 {
        runs.push(current as f64);
    }
    runs
}

/// Plausible glyph sizes score 1.0, tapering to zero outside 4..96 px.
fn size_plausibility(font_size: f64) -> f64 {
    if (9.0..=48.0).contains(&font_size) {
        1.0
    } else if font_size < 9.0 {
        ((font_size - 4.0) / 5.0).max(0.0)
    } else {
        (1.0 - (font_size - 48.0) / 48.0).max(0.0)
    }
}

fn classify_region(bounds: &Bounds, line_count: usize, font_size: f64) -> RegionType {
    let aspect = bounds.width as f64 / bounds.height.max(1) as f64;
    if line_count <= 1 && font_size >= 20.0 && aspect >= 2.0 {
        RegionType::Heading
    } else if font_size > 0.0 && font_size < 11.0 {
        RegionType::Caption
    } else if line_count >= 2 {
        RegionType::Paragraph
    } else {
        RegionType::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PixelBuffer;

    /// Buffer with horizontal dark "text lines" on white background.
    fn text_like_buffer(width: u32, height: u32, line_height: u32, gap: u32) -> PixelBuffer {
        let mut data = vec![255u8; (width * height * 4) as usize];
        let period = line_height + gap;
        for y in 0..height {
            if y % period < line_height {
                // Alternate dark/light columns to mimic glyph strokes.
                for x in 0..width {
                    if x % 3 != 0 {
                        let idx = ((y * width + x) * 4) as usize;
                        data[idx] = 20;
                        data[idx + 1] = 20;
                        data[idx + 2] = 20;
                    }
                }
            }
        }
        PixelBuffer::new(width, height, data)
    }

    #[test]
    fn test_flat_buffer_yields_no_regions() {
        let buffer = PixelBuffer::filled(64, 64, [200, 200, 200, 255]);
        let field = GradientField::compute(&buffer);
        let regions =
            detect_text_regions(&field, &DetectionConfig::default(), &Budget::unlimited());
        assert!(regions.is_empty());
    }

    #[test]
    fn test_text_like_buffer_yields_merged_region() {
        let buffer = text_like_buffer(96, 96, 8, 6);
        let field = GradientField::compute(&buffer);
        let regions =
            detect_text_regions(&field, &DetectionConfig::default(), &Budget::unlimited());
        assert!(!regions.is_empty());
        // Dense strokes everywhere should merge into few large regions.
        assert!(regions.len() <= 3, "got {} regions", regions.len());
        let region = &regions[0];
        assert!(region.confidence > 0.3, "confidence {}", region.confidence);
        assert!(region.text_density > 0.0);
    }

    #[test]
    fn test_merge_unions_near_rects() {
        let rects = vec![
            Bounds::new(0, 0, 8, 8),
            Bounds::new(10, 0, 8, 8),
            Bounds::new(100, 100, 8, 8),
        ];
        let merged = merge_candidates(rects, 4);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0], Bounds::new(0, 0, 18, 8));
    }

    #[test]
    fn test_size_plausibility_tapers() {
        assert_eq!(size_plausibility(14.0), 1.0);
        assert!(size_plausibility(6.0) < 1.0);
        assert_eq!(size_plausibility(4.0), 0.0);
        assert!(size_plausibility(70.0) < 1.0);
        assert_eq!(size_plausibility(120.0), 0.0);
    }

    #[test]
    fn test_exhausted_budget_returns_empty() {
        let buffer = text_like_buffer(96, 96, 8, 6);
        let field = GradientField::compute(&buffer);
        let regions =
            detect_text_regions(&field, &DetectionConfig::default(), &Budget::exhausted());
        assert!(regions.is_empty());
    }
}
