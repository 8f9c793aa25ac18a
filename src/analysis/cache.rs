//! Content fingerprinting and analysis memoization.
//!
//! The fingerprint is a perceptual hash of the pixel buffer combined
//! with a digest of the analyzer configuration, so either a visual
//! change or a config change reads as a different key. The cache is
//! bounded with oldest-first eviction and is only ever invalidated
//! explicitly via `clear`.

use std::collections::{HashMap, VecDeque};

use image_hasher::{HashAlg, HasherConfig};

use super::config::AnalyzerConfig;
use super::types::AnalysisResult;
use crate::document::PixelBuffer;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Perceptual hash of a buffer plus the analyzer config digest.
pub fn fingerprint(buffer: &PixelBuffer, config: &AnalyzerConfig) -> Fingerprint {
    let hash = match image::RgbaImage::from_raw(buffer.width, buffer.height, buffer.data.clone())
    {
        Some(img) => {
            let hasher = HasherConfig::new()
                .hash_alg(HashAlg::DoubleGradient)
                .hash_size(8, 8)
                .to_hasher();
            hasher
                .hash_image(&image::DynamicImage::ImageRgba8(img))
                .to_base64()
        }
        // Dimension/data mismatch; fall back to a size-only key.
        None => String::from("invalid"),
    };

    Fingerprint(format!(
        "{}:{}x{}:{}",
        hash,
        buffer.width,
        buffer.height,
        config.digest()
    ))
}

/// Bounded fingerprint -> AnalysisResult memoization.
pub struct AnalysisCache {
    capacity: usize,
    entries: HashMap<Fingerprint, AnalysisResult>,
    insertion_order: VecDeque<Fingerprint>,
}

impl AnalysisCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            insertion_order: VecDeque::new(),
        }
    }

    pub fn get(&self, key: &Fingerprint) -> Option<&AnalysisResult> {
        self.entries.get(key)
    }

    pub fn set(&mut self, key: Fingerprint, result: AnalysisResult) {
        if self.entries.insert(key.clone(), result).is_none() {
            self.insertion_order.push_back(key);
        }
        while self.entries.len() > self.capacity {
            if let Some(oldest) = self.insertion_order.pop_front() {
                self.entries.remove(&oldest);
            } else {
                break;
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.insertion_order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for AnalysisCache {
    fn default() -> Self {
        Self::new(64)
    }
}
