//! Render backends: apply a visual transform descriptor to a node.
//!
//! The CSS backend writes style properties and never fails. The GPU
//! backend (feature `gpu`) transforms pixels on-device; any failure
//! there is caught and the caller retries through CSS. A recording
//! backend exists for tests.

mod css;
#[cfg(feature = "gpu")]
mod gpu;
mod recording;

pub use css::CssBackend;
#[cfg(feature = "gpu")]
pub use gpu::GpuBackend;
pub use recording::{RecordingBackend, RecordingLog};

use serde::{Deserialize, Serialize};

use crate::compose::VisualTransformDescriptor;
use crate::document::{Document, NodeId};

/// Per-application timing and fallback telemetry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderMetrics {
    pub processing_time_ms: f64,
    /// Frames per second the backend could sustain at this cost;
    /// only meaningful for per-frame (GPU) backends.
    pub fps: Option<f64>,
    pub fallback_triggered: bool,
}

impl RenderMetrics {
    pub fn timed(processing_time_ms: f64) -> Self {
        Self {
            processing_time_ms,
            fps: None,
            fallback_triggered: false,
        }
    }
}

/// Result of one `apply` call. A failed outcome carries the error text;
/// the pipeline treats failure as "retry via CSS", never as fatal.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyOutcome {
    pub ok: bool,
    pub metrics: RenderMetrics,
    pub error: Option<String>,
}

impl ApplyOutcome {
    pub fn success(metrics: RenderMetrics) -> Self {
        Self {
            ok: true,
            metrics,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            metrics: RenderMetrics::timed(0.0),
            error: Some(error.into()),
        }
    }
}

pub trait RenderBackend: Send {
    fn name(&self) -> &'static str;

    fn apply(
        &mut self,
        doc: &mut Document,
        node: NodeId,
        descriptor: &VisualTransformDescriptor,
    ) -> ApplyOutcome;
}

/// GPU vendor/renderer/version strings, or the "unavailable" sentinel.
/// Querying never fails, even with no GPU context at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuDiagnostics {
    pub available: bool,
    pub vendor: String,
    pub renderer: String,
    pub version: String,
    pub extensions: Vec<String>,
}

impl GpuDiagnostics {
    pub fn unavailable() -> Self {
        Self {
            available: false,
            vendor: "unavailable".into(),
            renderer: "unavailable".into(),
            version: "unavailable".into(),
            extensions: Vec::new(),
        }
    }
}

/// Query GPU diagnostics. Without the `gpu` feature this is a constant
/// sentinel; with it, the adapter is probed.
pub fn gpu_diagnostics() -> GpuDiagnostics {
    #[cfg(feature = "gpu")]
    {
        gpu::diagnostics()
    }
    #[cfg(not(feature = "gpu"))]
    {
        GpuDiagnostics::unavailable()
    }
}
