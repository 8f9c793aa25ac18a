//! Engine error taxonomy.
//!
//! Every variant here is recovered locally: the engine degrades to a
//! weaker correction rather than blocking content from rendering.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Pixel buffer missing or below the minimum analyzable size.
    /// Callers substitute an empty `AnalysisResult`, never propagate.
    #[error("analysis unavailable: {0}")]
    AnalysisUnavailable(String),

    /// Analysis exceeded its time budget; the last cached result is used.
    #[error("processing exceeded {budget_ms}ms budget")]
    ProcessingTimeout { budget_ms: u64 },

    /// No GPU context could be created.
    #[error("gpu unavailable: {0}")]
    GpuUnavailable(String),

    /// GPU context existed but a per-frame operation failed.
    /// Triggers fallback through the CSS backend.
    #[error("gpu failure: {0}")]
    GpuFailure(String),

    /// Persisted calibration value did not parse as a number.
    /// Read as 0.0, never surfaced to the session.
    #[error("invalid stored calibration value: {0:?}")]
    InvalidCalibrationInput(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_policy_inputs() {
        assert_eq!(
            EngineError::AnalysisUnavailable("buffer 8x8 below minimum 16px".into()).to_string(),
            "analysis unavailable: buffer 8x8 below minimum 16px"
        );
        assert_eq!(
            EngineError::ProcessingTimeout { budget_ms: 16 }.to_string(),
            "processing exceeded 16ms budget"
        );
        assert_eq!(
            EngineError::GpuUnavailable("no suitable adapter".into()).to_string(),
            "gpu unavailable: no suitable adapter"
        );
        assert_eq!(
            EngineError::InvalidCalibrationInput("abc".into()).to_string(),
            "invalid stored calibration value: \"abc\""
        );
    }
}
