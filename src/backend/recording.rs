//! Headless recording backend for tests: remembers every application
//! and can be configured to fail, which exercises the CSS fallback
//! path without real GPU state.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use super::{ApplyOutcome, RenderBackend, RenderMetrics};
use crate::compose::VisualTransformDescriptor;
use crate::document::{Document, NodeId};

/// Shared view of everything a recording backend has applied.
pub type RecordingLog = Arc<Mutex<Vec<(NodeId, VisualTransformDescriptor)>>>;

pub struct RecordingBackend {
    log: RecordingLog,
    fail: bool,
}

impl RecordingBackend {
    /// Backend that records and succeeds.
    pub fn new() -> (Self, RecordingLog) {
        let log: RecordingLog = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                log: log.clone(),
                fail: false,
            },
            log,
        )
    }

    /// Backend that records and then reports failure, like a GPU
    /// backend with a lost context.
    pub fn failing() -> (Self, RecordingLog) {
        let log: RecordingLog = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                log: log.clone(),
                fail: true,
            },
            log,
        )
    }
}

impl RenderBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn apply(
        &mut self,
        _doc: &mut Document,
        node: NodeId,
        descriptor: &VisualTransformDescriptor,
    ) -> ApplyOutcome {
        let started = Instant::now();
        self.log.lock().unwrap().push((node, descriptor.clone()));

        if self.fail {
            ApplyOutcome::failure("recording backend configured to fail")
        } else {
            ApplyOutcome::success(RenderMetrics::timed(
                started.elapsed().as_secs_f64() * 1000.0,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_applications() {
        let mut doc = Document::new();
        let (mut backend, log) = RecordingBackend::new();
        let descriptor = VisualTransformDescriptor::identity();

        assert!(backend.apply(&mut doc, NodeId(1), &descriptor).ok);
        assert!(backend.apply(&mut doc, NodeId(2), &descriptor).ok);

        let entries = log.lock().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, NodeId(1));
    }

    #[test]
    fn test_failing_backend_reports_error() {
        let mut doc = Document::new();
        let (mut backend, log) = RecordingBackend::failing();
        let outcome = backend.apply(&mut doc, NodeId(1), &VisualTransformDescriptor::identity());
        assert!(!outcome.ok);
        assert!(outcome.error.is_some());
        assert_eq!(log.lock().unwrap().len(), 1);
    }
}
