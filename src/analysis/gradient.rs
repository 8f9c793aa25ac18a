//! Sobel luminance gradient.
//!
//! Text shows up as dense runs of high gradient magnitude, so this is
//! the first stage of both region detection and classification.

use crate::document::PixelBuffer;

/// Largest possible Sobel magnitude for 8-bit luma: sqrt(2) * 4 * 255.
const MAX_MAGNITUDE: f64 = 1442.5;

/// Per-pixel gradient magnitudes, normalized to 0.0..=1.0.
#[derive(Debug, Clone)]
pub struct GradientField {
    pub width: u32,
    pub height: u32,
    magnitude: Vec<f64>,
}

impl GradientField {
    /// Compute the Sobel magnitude field for a buffer. Border pixels
    /// are left at zero rather than mirrored.
    pub fn compute(buffer: &PixelBuffer) -> Self {
        let width = buffer.width;
        let height = buffer.height;
        let mut luma = vec![0.0f64; (width * height) as usize];
        for y in 0..height {
            for x in 0..width {
                luma[(y * width + x) as usize] = buffer.luminance(x, y);
            }
        }

        let mut magnitude = vec![0.0f64; (width * height) as usize];
        if width >= 3 && height >= 3 {
            let w = width as usize;
            for y in 1..(height as usize - 1) {
                for x in 1..(w - 1) {
                    let tl = luma[(y - 1) * w + (x - 1)];
                    let tc = luma[(y - 1) * w + x];
                    let tr = luma[(y - 1) * w + (x + 1)];
                    let ml = luma[y * w + (x - 1)];
                    let mr = luma[y * w + (x + 1)];
                    let bl = luma[(y + 1) * w + (x - 1)];
                    let bc = luma[(y + 1) * w + x];
                    let br = luma[(y + 1) * w + (x + 1)];

                    let gx = (tr + 2.0 * mr + br) - (tl + 2.0 * ml + bl);
                    let gy = (bl + 2.0 * bc + br) - (tl + 2.0 * tc + tr);
                    magnitude[y * w + x] = ((gx * gx + gy * gy).sqrt() / MAX_MAGNITUDE).min(1.0);
                }
            }
        }

        Self {
            width,
            height,
            magnitude,
        }
    }

    pub fn at(&self, x: u32, y: u32) -> f64 {
        self.magnitude[(y * self.width + x) as usize]
    }

    /// Mean magnitude over a clamped window.
    pub fn window_mean(&self, x0: u32, y0: u32, w: u32, h: u32) -> f64 {
        let x1 = (x0 + w).min(self.width);
        let y1 = (y0 + h).min(self.height);
        if x0 >= x1 || y0 >= y1 {
            return 0.0;
        }
        let mut sum = 0.0;
        for y in y0..y1 {
            for x in x0..x1 {
                sum += self.at(x, y);
            }
        }
        sum / ((x1 - x0) as f64 * (y1 - y0) as f64)
    }

    /// Fraction of pixels in a clamped window above `threshold`.
    pub fn window_density(&self, x0: u32, y0: u32, w: u32, h: u32, threshold: f64) -> f64 {
        let x1 = (x0 + w).min(self.width);
        let y1 = (y0 + h).min(self.height);
        if x0 >= x1 || y0 >= y1 {
            return 0.0;
        }
        let mut hits = 0usize;
        for y in y0..y1 {
            for x in x0..x1 {
                if self.at(x, y) >= threshold {
                    hits += 1;
                }
            }
        }
        hits as f64 / ((x1 - x0) as f64 * (y1 - y0) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PixelBuffer;

    fn vertical_edge_buffer(width: u32, height: u32) -> PixelBuffer {
        // Left half black, right half white.
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for _y in 0..height {
            for x in 0..width {
                let v = if x < width / 2 { 0 } else { 255 };
                data.extend_from_slice(&[v, v, v, 255]);
            }
        }
        PixelBuffer::new(width, height, data)
    }

    #[test]
    fn test_flat_buffer_has_no_gradient() {
        let buffer = PixelBuffer::filled(16, 16, [128, 128, 128, 255]);
        let field = GradientField::compute(&buffer);
        assert_eq!(field.window_mean(0, 0, 16, 16), 0.0);
    }

    #[test]
    fn test_edge_produces_gradient_at_boundary() {
        let buffer = vertical_edge_buffer(16, 16);
        let field = GradientField::compute(&buffer);
        // Magnitude peaks at the black/white boundary column.
        let boundary = field.at(8, 8);
        assert!(boundary > 0.5, "boundary magnitude was {boundary}");
        assert_eq!(field.at(2, 8), 0.0);
    }

    #[test]
    fn test_density_counts_edge_pixels() {
        let buffer = vertical_edge_buffer(16, 16);
        let field = GradientField::compute(&buffer);
        let density = field.window_density(0, 0, 16, 16, 0.3);
        assert!(density > 0.0 && density < 0.5);
    }

    #[test]
    fn test_tiny_buffer_is_all_zero() {
        let buffer = PixelBuffer::filled(2, 2, [255, 0, 0, 255]);
        let field = GradientField::compute(&buffer);
        assert_eq!(field.window_mean(0, 0, 2, 2), 0.0);
    }
}
