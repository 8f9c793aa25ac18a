//! Real-time visual correction for presbyopia over pixel-buffer
//! documents.
//!
//! The pipeline: [`analysis`] reads pixel buffers and produces region,
//! contrast, and classification results; [`calibration`] maps between
//! user-facing and internal diopter scales; [`compose`] turns analysis
//! plus settings into a visual transform descriptor; [`backend`]
//! applies descriptors through CSS-style properties or a GPU compute
//! path; [`orchestrator`] watches a document subtree and drives the
//! whole chain; [`engine`] is the consumer-facing surface tying it
//! together with persisted [`settings`] and the cross-instance
//! [`bus`].

pub mod analysis;
pub mod backend;
pub mod bus;
pub mod calibration;
pub mod compose;
pub mod document;
pub mod engine;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod settings;

pub use analysis::{AnalysisCache, AnalysisResult, AnalyzerConfig, ContentAnalyzer, ContentType};
pub use backend::{gpu_diagnostics, ApplyOutcome, CssBackend, RecordingBackend, RenderBackend};
pub use bus::{SessionBus, SessionEvent};
pub use calibration::{CalibrationConfig, CalibrationMapper, DeviceClass, DeviceProfile};
pub use compose::{FilterComposer, FilterOp, VisualTransformDescriptor};
pub use document::{shared, Document, Node, NodeId, NodeKind, PixelBuffer, SharedDocument};
pub use engine::{EngineConfig, EngineStatus, VisionEngine};
pub use error::EngineError;
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use settings::{CalibrationData, Settings, SettingsPatch, SettingsStore};
