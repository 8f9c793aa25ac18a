//! The per-container processing loop.
//!
//! Snapshot the subtree in document order, process each qualifying
//! node once, then react to change batches and session updates until
//! cancelled. All per-node state is owned here; nothing is shared
//! across orchestrator instances.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::OrchestratorConfig;
use crate::analysis::{fingerprint, AnalysisCache, AnalysisResult, ContentAnalyzer, Fingerprint};
use crate::backend::{CssBackend, RenderBackend};
use crate::calibration::{CalibrationMapper, DeviceProfile};
use crate::compose::FilterComposer;
use crate::document::{ChangeBatch, ChangeKind, NodeId, NodeKind, SharedDocument};
use crate::settings::Settings;

const ENABLE_LOGS: bool = true;
use crate::{log_info, log_warn};

/// Effective session inputs for a processing pass. A new value on the
/// watch channel triggers a full restart; a pass already underway keeps
/// the state it captured at its start.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub settings: Settings,
    pub profile: DeviceProfile,
    /// User-scale calibration baseline from the store.
    pub calibration_user: f64,
    pub gpu_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessStatus {
    Unprocessed,
    Processing,
    Processed,
}

/// Ephemeral per-node state, keyed by stable node identity. Cleared on
/// node removal and on global restart, never stored in the document.
struct ProcessingState {
    status: ProcessStatus,
    fingerprint: Option<Fingerprint>,
    last_analysis: Option<Arc<AnalysisResult>>,
}

impl Default for ProcessingState {
    fn default() -> Self {
        Self {
            status: ProcessStatus::Unprocessed,
            fingerprint: None,
            last_analysis: None,
        }
    }
}

struct Worker {
    doc: SharedDocument,
    root: NodeId,
    analyzer: ContentAnalyzer,
    composer: FilterComposer,
    mapper: CalibrationMapper,
    cache: AnalysisCache,
    css: CssBackend,
    custom: Option<Box<dyn RenderBackend>>,
    #[cfg(feature = "gpu")]
    gpu: Option<Box<dyn RenderBackend>>,
    states: HashMap<NodeId, ProcessingState>,
    nodes_processed: Arc<AtomicU64>,
    fallbacks: Arc<AtomicU64>,
}

#[allow(clippy::too_many_arguments)]
pub(super) async fn processing_loop(
    doc: SharedDocument,
    root: NodeId,
    config: OrchestratorConfig,
    mut session: watch::Receiver<SessionState>,
    mut changes: UnboundedReceiver<ChangeBatch>,
    nodes_processed: Arc<AtomicU64>,
    fallbacks: Arc<AtomicU64>,
    cancel_token: CancellationToken,
) {
    let mut worker = Worker {
        doc,
        root,
        analyzer: ContentAnalyzer::new(config.analyzer),
        composer: FilterComposer::new(config.composer),
        mapper: CalibrationMapper::new(config.calibration),
        cache: AnalysisCache::new(config.cache_capacity),
        css: CssBackend::new(),
        custom: config.primary_backend,
        #[cfg(feature = "gpu")]
        gpu: None,
        states: HashMap::new(),
        nodes_processed,
        fallbacks,
    };

    let initial = session.borrow_and_update().clone();
    worker.ensure_gpu(&initial);
    worker.snapshot_pass(&initial).await;

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                log_info!("processing loop shutting down");
                break;
            }
            changed = session.changed() => {
                if changed.is_err() {
                    // Session channel closed; the engine is gone.
                    break;
                }
                let state = session.borrow_and_update().clone();
                worker.restart(&state).await;
            }
            batch = changes.recv() => {
                match batch {
                    Some(batch) => {
                        let state = session.borrow().clone();
                        worker.handle_batch(batch, &state).await;
                    }
                    None => break,
                }
            }
        }
    }
}

impl Worker {
    /// Full restart: clear all processing state, allow one tick for
    /// in-flight work to drain, re-snapshot. The analysis cache
    /// survives; fingerprints still match unchanged content.
    async fn restart(&mut self, session: &SessionState) {
        log_info!("session changed, restarting full processing pass");
        self.states.clear();
        self.ensure_gpu(session);
        tokio::task::yield_now().await;
        self.snapshot_pass(session).await;
    }

    /// Process every qualifying node under the root, document order.
    async fn snapshot_pass(&mut self, session: &SessionState) {
        let nodes = { self.doc.lock().await.qualifying_nodes(self.root) };
        log_info!("snapshot pass over {} qualifying nodes", nodes.len());
        for node in nodes {
            self.process_node(node, session).await;
        }
    }

    /// Handle one observer batch in delivery order.
    async fn handle_batch(&mut self, batch: ChangeBatch, session: &SessionState) {
        for event in batch {
            match event.kind {
                ChangeKind::Removed => {
                    self.states.remove(&event.node);
                }
                ChangeKind::Added => {
                    // Classify the added node and recurse into its
                    // qualifying descendants.
                    let nodes = { self.doc.lock().await.qualifying_nodes(event.node) };
                    for node in nodes {
                        self.process_node(node, session).await;
                    }
                }
                ChangeKind::Changed => {
                    self.process_node(event.node, session).await;
                }
            }
        }
    }

    /// One full pipeline pass over a single node: fingerprint, analyze
    /// (cache-checked), compose, apply with CSS fallback.
    async fn process_node(&mut self, node: NodeId, session: &SessionState) {
        let (kind, buffer) = {
            let doc = self.doc.lock().await;
            match doc.get(node) {
                Some(n) if n.kind.qualifies() => (n.kind, n.pixels.clone()),
                _ => return,
            }
        };

        let fp = buffer
            .as_ref()
            .map(|buffer| fingerprint(buffer, self.analyzer.config()));

        {
            let state = self.states.entry(node).or_default();
            match state.status {
                // Second trigger while in flight is dropped, not queued.
                ProcessStatus::Processing => return,
                ProcessStatus::Processed if state.fingerprint == fp => return,
                _ => {}
            }
            state.status = ProcessStatus::Processing;
        }

        let analysis = self.analyze_with_cache(node, fp.as_ref(), buffer.as_deref());

        let descriptor = match kind {
            NodeKind::Image | NodeKind::Video => {
                let adjusted = self
                    .mapper
                    .adjust_for_device(session.calibration_user, &session.profile);
                self.composer
                    .compose_media(&session.settings, analysis.as_deref(), adjusted)
            }
            _ => self.composer.compose(&session.settings, analysis.as_deref()),
        };

        {
            // Hold the lock through a local clone so the guard does not
            // pin `self` while the backends borrow it mutably.
            let doc = self.doc.clone();
            let mut doc = doc.lock().await;
            let primary_outcome = match self.primary_mut() {
                Some(primary) => Some(primary.apply(&mut doc, node, &descriptor)),
                None => None,
            };
            let outcome = match primary_outcome {
                Some(outcome) => outcome,
                None => self.css.apply(&mut doc, node, &descriptor),
            };

            if !outcome.ok {
                log_warn!(
                    "primary backend failed for node {:?} ({}), falling back to css",
                    node,
                    outcome.error.as_deref().unwrap_or("unknown error")
                );
                let mut css_outcome = self.css.apply(&mut doc, node, &descriptor);
                css_outcome.metrics.fallback_triggered = true;
                self.fallbacks.fetch_add(1, Ordering::SeqCst);
                debug_assert!(css_outcome.ok, "css backend must never fail");
            }
        }

        let state = self.states.entry(node).or_default();
        state.status = ProcessStatus::Processed;
        state.fingerprint = fp;
        state.last_analysis = analysis;
        self.nodes_processed.fetch_add(1, Ordering::SeqCst);
    }

    /// Cache-checked analysis. A hit bypasses the analyzer entirely; a
    /// budget-exceeded pass degrades to the node's previous result when
    /// one exists and is never cached.
    fn analyze_with_cache(
        &mut self,
        node: NodeId,
        fp: Option<&Fingerprint>,
        buffer: Option<&crate::document::PixelBuffer>,
    ) -> Option<Arc<AnalysisResult>> {
        let (fp, buffer) = match (fp, buffer) {
            (Some(fp), Some(buffer)) => (fp, buffer),
            _ => return None,
        };

        if let Some(hit) = self.cache.get(fp) {
            return Some(Arc::new(hit.clone()));
        }

        let result = self.analyzer.analyze(Some(buffer));
        if result.budget_exceeded {
            if let Some(previous) = self
                .states
                .get(&node)
                .and_then(|state| state.last_analysis.clone())
            {
                return Some(previous);
            }
            return Some(Arc::new(result));
        }

        self.cache.set(fp.clone(), result.clone());
        Some(Arc::new(result))
    }

    fn primary_mut(&mut self) -> Option<&mut (dyn RenderBackend + 'static)> {
        #[cfg(feature = "gpu")]
        {
            self.custom.as_deref_mut().or(self.gpu.as_deref_mut())
        }
        #[cfg(not(feature = "gpu"))]
        {
            self.custom.as_deref_mut()
        }
    }

    /// Build or drop the GPU backend to match the session toggle. A
    /// construction failure is logged and leaves CSS in charge.
    #[cfg(feature = "gpu")]
    fn ensure_gpu(&mut self, session: &SessionState) {
        if session.gpu_enabled && self.custom.is_none() {
            if self.gpu.is_none() {
                match crate::backend::GpuBackend::new() {
                    Ok(backend) => self.gpu = Some(Box::new(backend)),
                    Err(err) => {
                        log_warn!("gpu backend unavailable, staying on css: {err}");
                        self.gpu = None;
                    }
                }
            }
        } else {
            self.gpu = None;
        }
    }

    #[cfg(not(feature = "gpu"))]
    fn ensure_gpu(&mut self, session: &SessionState) {
        if session.gpu_enabled && self.custom.is_none() {
            log_warn!(
                "{}, staying on css",
                crate::error::EngineError::GpuUnavailable("gpu support not compiled in".into())
            );
        }
    }
}
