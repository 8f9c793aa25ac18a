//! Grid-sampled local contrast and the derived enhancement map.

use super::config::ContrastConfig;
use super::types::{CellRef, ContrastMap, ContrastStatistic, EnhancementMap};
use super::Budget;
use crate::document::PixelBuffer;

impl ContrastMap {
    /// Build a map from raw per-cell values, computing aggregates and
    /// low-contrast areas.
    pub fn from_cells(
        cells: Vec<f64>,
        cols: u32,
        rows: u32,
        cell_size: u32,
        low_contrast_threshold: f64,
    ) -> Self {
        let mut mean = 0.0;
        let mut min = f64::MAX;
        let mut max = f64::MIN;
        let mut low_contrast_areas = Vec::new();

        for (idx, value) in cells.iter().enumerate() {
            mean += value;
            min = min.min(*value);
            max = max.max(*value);
            if *value < low_contrast_threshold {
                low_contrast_areas.push(CellRef {
                    col: idx as u32 % cols.max(1),
                    row: idx as u32 / cols.max(1),
                });
            }
        }

        if cells.is_empty() {
            return Self::empty(cell_size);
        }
        mean /= cells.len() as f64;

        Self {
            cols,
            rows,
            cell_size,
            cells,
            mean_contrast: mean,
            min_contrast: min,
            max_contrast: max,
            low_contrast_areas,
        }
    }
}

/// Compute the contrast map for a buffer on a fixed grid. Stops early
/// with the rows computed so far when the budget runs out; remaining
/// cells read as zero contrast.
pub fn compute_contrast_map(
    buffer: &PixelBuffer,
    config: &ContrastConfig,
    budget: &Budget,
) -> ContrastMap {
    let cell = config.cell_size.max(1);
    let cols = buffer.width.div_ceil(cell);
    let rows = buffer.height.div_ceil(cell);
    let mut cells = vec![0.0f64; (cols * rows) as usize];

    'rows: for row in 0..rows {
        if budget.exceeded() {
            break 'rows;
        }
        for col in 0..cols {
            let x0 = col * cell;
            let y0 = row * cell;
            cells[(row * cols + col) as usize] =
                cell_contrast(buffer, x0, y0, cell, config.statistic);
        }
    }

    ContrastMap::from_cells(cells, cols, rows, cell, config.low_contrast_threshold)
}

/// Contrast of one clamped cell, with the configured statistic, over
/// luminance normalized to 0..1.
fn cell_contrast(
    buffer: &PixelBuffer,
    x0: u32,
    y0: u32,
    cell: u32,
    statistic: ContrastStatistic,
) -> f64 {
    let x1 = (x0 + cell).min(buffer.width);
    let y1 = (y0 + cell).min(buffer.height);
    let count = ((x1 - x0) * (y1 - y0)) as f64;
    if count == 0.0 {
        return 0.0;
    }

    let mut sum = 0.0;
    let mut min = f64::MAX;
    let mut max = f64::MIN;
    for y in y0..y1 {
        for x in x0..x1 {
            let luma = buffer.luminance(x, y) / 255.0;
            sum += luma;
            min = min.min(luma);
            max = max.max(luma);
        }
    }
    let mean = sum / count;

    match statistic {
        ContrastStatistic::Rms => {
            let mut variance = 0.0;
            for y in y0..y1 {
                for x in x0..x1 {
                    let luma = buffer.luminance(x, y) / 255.0;
                    variance += (luma - mean) * (luma - mean);
                }
            }
            // Max stddev over 0..1 values is 0.5; scale to 0..1.
            ((variance / count).sqrt() * 2.0).min(1.0)
        }
        ContrastStatistic::Michelson => {
            if max + min <= f64::EPSILON {
                0.0
            } else {
                (max - min) / (max + min)
            }
        }
        ContrastStatistic::Weber => {
            if mean <= f64::EPSILON {
                0.0
            } else {
                ((max - mean) / mean).clamp(0.0, 1.0)
            }
        }
    }
}

/// Derive per-cell correction strength and clamped diopter nudges from
/// a contrast map. Priority regions are the highest-need cells.
pub fn derive_enhancement_map(map: &ContrastMap, config: &ContrastConfig) -> EnhancementMap {
    let mut strengths = Vec::with_capacity(map.cells.len());
    let mut diopter_nudges = Vec::with_capacity(map.cells.len());

    for value in &map.cells {
        let strength = (1.0 - value).clamp(0.0, 1.0);
        strengths.push(strength);
        diopter_nudges.push((strength * config.max_diopter_nudge).min(config.max_diopter_nudge));
    }

    let mut ranked: Vec<(usize, f64)> = strengths
        .iter()
        .copied()
        .enumerate()
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let priority_regions = ranked
        .into_iter()
        .take(config.priority_region_count)
        .map(|(idx, _)| CellRef {
            col: idx as u32 % map.cols.max(1),
            row: idx as u32 / map.cols.max(1),
        })
        .collect();

    EnhancementMap {
        cols: map.cols,
        rows: map.rows,
        strengths,
        diopter_nudges,
        priority_regions,
    }
}
