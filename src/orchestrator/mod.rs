//! Processing orchestration for one root container.
//!
//! The controller here owns the worker task's lifecycle; the actual
//! state machine lives in [`worker`]. One orchestrator instance owns
//! its analysis cache and per-node processing state exclusively.

mod worker;

pub use worker::SessionState;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::analysis::AnalyzerConfig;
use crate::backend::RenderBackend;
use crate::calibration::CalibrationConfig;
use crate::compose::ComposerConfig;
use crate::document::{NodeId, SharedDocument};

const ENABLE_LOGS: bool = true;
use crate::log_info;

pub struct OrchestratorConfig {
    pub analyzer: AnalyzerConfig,
    pub composer: ComposerConfig,
    pub calibration: CalibrationConfig,
    pub cache_capacity: usize,
    /// Backend tried before the CSS fallback. When unset, a GPU
    /// backend is built on demand (feature `gpu`, session toggle on);
    /// tests inject a recording backend here.
    pub primary_backend: Option<Box<dyn RenderBackend>>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            analyzer: AnalyzerConfig::default(),
            composer: ComposerConfig::default(),
            calibration: CalibrationConfig::default(),
            cache_capacity: 64,
            primary_backend: None,
        }
    }
}

/// Owns the processing loop for one root container.
pub struct Orchestrator {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
    nodes_processed: Arc<AtomicU64>,
    fallbacks: Arc<AtomicU64>,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
            nodes_processed: Arc::new(AtomicU64::new(0)),
            fallbacks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Snapshot and process the subtree at `root`, then keep observing
    /// document changes until `stop` or a session-channel close.
    pub async fn start(
        &mut self,
        doc: SharedDocument,
        root: NodeId,
        session: watch::Receiver<SessionState>,
        config: OrchestratorConfig,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("orchestrator already active");
        }

        let changes = doc.lock().await.subscribe();

        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();
        let counter = self.nodes_processed.clone();
        counter.store(0, Ordering::SeqCst);
        let fallbacks = self.fallbacks.clone();
        fallbacks.store(0, Ordering::SeqCst);

        log_info!("starting orchestrator for root {root:?}");
        let handle = tokio::spawn(worker::processing_loop(
            doc,
            root,
            config,
            session,
            changes,
            counter,
            fallbacks,
            token_clone,
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Stop observing and join the worker. No callbacks fire after
    /// this returns.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("processing loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    pub fn nodes_processed(&self) -> u64 {
        self.nodes_processed.load(Ordering::SeqCst)
    }

    /// How often a failed primary apply was retried through CSS.
    pub fn fallbacks(&self) -> u64 {
        self.fallbacks.load(Ordering::SeqCst)
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}
