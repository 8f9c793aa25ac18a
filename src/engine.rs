//! Consumer-facing engine surface.
//!
//! UI widgets (sliders, toggles, calibration flows) are thin callers of
//! this API: update settings, start/stop processing over a document,
//! run one-off analysis, read status. Each engine instance owns one
//! orchestrator; instances attached to the same logical session stay
//! consistent through the injected [`SessionBus`].

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::analysis::{fingerprint, AnalysisCache, AnalysisResult, ContentAnalyzer};
use crate::backend::RenderBackend;
use crate::bus::{SessionBus, SessionEvent};
use crate::calibration::{CalibrationConfig, CalibrationMapper, DeviceClass, DeviceProfile};
use crate::compose::ComposerConfig;
use crate::document::{NodeId, SharedDocument};
use crate::orchestrator::{Orchestrator, OrchestratorConfig, SessionState};
use crate::settings::{CalibrationData, Settings, SettingsPatch, SettingsStore};

const ENABLE_LOGS: bool = true;
use crate::log_info;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub analyzer: crate::analysis::AnalyzerConfig,
    pub composer: ComposerConfig,
    pub calibration: CalibrationConfig,
    pub cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            analyzer: crate::analysis::AnalyzerConfig::default(),
            composer: ComposerConfig::default(),
            calibration: CalibrationConfig::default(),
            cache_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStatus {
    pub active: bool,
    pub nodes_processed: u64,
    pub effectiveness_label: String,
}

/// One vision-correction engine instance.
///
/// Construction spawns the session-bus listener, so it must happen
/// inside a tokio runtime.
pub struct VisionEngine {
    config: EngineConfig,
    store: SettingsStore,
    bus: SessionBus,
    session_tx: Arc<watch::Sender<SessionState>>,
    orchestrator: Orchestrator,
    mapper: CalibrationMapper,
    analyzer: ContentAnalyzer,
    analysis_cache: Mutex<AnalysisCache>,
    /// Test seam: injected as the primary backend on the next `start`.
    primary_override: Option<Box<dyn RenderBackend>>,
    bus_listener: JoinHandle<()>,
}

impl VisionEngine {
    pub fn new(config: EngineConfig, store: SettingsStore, bus: SessionBus) -> Self {
        let mapper = CalibrationMapper::new(config.calibration.clone());
        let settings = store.settings().clamped();
        let calibration_user = mapper.to_user(store.calibration_internal());
        let profile = DeviceProfile::for_class(DeviceClass::Desktop, &config.calibration);

        let (session_tx, _) = watch::channel(SessionState {
            settings,
            profile,
            calibration_user,
            gpu_enabled: false,
        });
        let session_tx = Arc::new(session_tx);

        // Converge on shared toggle state published by sibling
        // instances of the same session.
        let bus_listener = {
            let mut rx = bus.subscribe();
            let session_tx = session_tx.clone();
            tokio::spawn(async move {
                loop {
                    // send_if_modified keeps an instance from restarting
                    // on the echo of its own publication.
                    match rx.recv().await {
                        Ok(SessionEvent::GpuEnabled(enabled)) => {
                            session_tx.send_if_modified(|state| {
                                let changed = state.gpu_enabled != enabled;
                                state.gpu_enabled = enabled;
                                changed
                            });
                        }
                        Ok(SessionEvent::SettingsChanged(settings)) => {
                            session_tx.send_if_modified(|state| {
                                let changed = state.settings != settings;
                                state.settings = settings;
                                changed
                            });
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            })
        };

        Self {
            analyzer: ContentAnalyzer::new(config.analyzer.clone()),
            analysis_cache: Mutex::new(AnalysisCache::new(config.cache_capacity)),
            config,
            store,
            bus,
            session_tx,
            orchestrator: Orchestrator::new(),
            mapper,
            primary_override: None,
            bus_listener,
        }
    }

    /// Replace the primary backend used on the next `start`. Intended
    /// for tests and headless recording.
    pub fn with_primary_backend(mut self, backend: Box<dyn RenderBackend>) -> Self {
        self.primary_override = Some(backend);
        self
    }

    /// Apply a partial settings update: clamp, persist, broadcast. The
    /// running orchestrator observes the change and restarts.
    pub fn update_settings(&self, patch: SettingsPatch) -> Result<Settings> {
        let next = self.session_tx.borrow().settings.apply(&patch);
        self.store.set_settings(&next)?;
        self.store.set_enabled(next.enabled)?;
        self.session_tx.send_modify(|state| state.settings = next.clone());
        self.bus.publish(SessionEvent::SettingsChanged(next.clone()));
        Ok(next)
    }

    pub fn settings(&self) -> Settings {
        self.session_tx.borrow().settings.clone()
    }

    /// Device profile changed (viewport resize, orientation). Triggers
    /// a full restart like any session change.
    pub fn set_device_profile(&self, profile: DeviceProfile) {
        self.session_tx.send_modify(|state| state.profile = profile);
    }

    /// Toggle GPU acceleration session-wide.
    pub fn set_gpu_enabled(&self, enabled: bool) {
        self.session_tx
            .send_modify(|state| state.gpu_enabled = enabled);
        self.bus.publish(SessionEvent::GpuEnabled(enabled));
    }

    /// Record a completed calibration: replace the stored record
    /// wholesale and move the session baseline.
    pub fn complete_calibration(&self, settings: &Settings) -> Result<CalibrationData> {
        let data = CalibrationData {
            reading_vision: settings.reading_vision,
            contrast_boost_pct: settings.contrast_boost_pct,
            edge_enhancement_pct: settings.edge_enhancement_pct,
            timestamp: Utc::now(),
        };
        self.store.set_calibration_data(&data)?;
        self.store
            .set_calibration_internal(self.mapper.to_internal(data.reading_vision))?;
        self.session_tx
            .send_modify(|state| state.calibration_user = data.reading_vision);
        log_info!("calibration replaced: {:.2}D", data.reading_vision);
        Ok(data)
    }

    /// Start observing and processing the subtree at `root`.
    pub async fn start(&mut self, doc: SharedDocument, root: NodeId) -> Result<()> {
        let orchestrator_config = OrchestratorConfig {
            analyzer: self.config.analyzer.clone(),
            composer: self.config.composer.clone(),
            calibration: self.config.calibration.clone(),
            cache_capacity: self.config.cache_capacity,
            primary_backend: self.primary_override.take(),
        };
        self.orchestrator
            .start(doc, root, self.session_tx.subscribe(), orchestrator_config)
            .await
    }

    pub async fn stop(&mut self) -> Result<()> {
        self.orchestrator.stop().await
    }

    /// One-off, cache-checked analysis of a single node.
    pub async fn analyze(&self, doc: &SharedDocument, node: NodeId) -> AnalysisResult {
        let buffer = {
            let doc = doc.lock().await;
            doc.get(node).and_then(|n| n.pixels.clone())
        };

        let Some(buffer) = buffer else {
            return self.analyzer.analyze(None);
        };

        let key = fingerprint(&buffer, self.analyzer.config());
        let mut cache = self.analysis_cache.lock().await;
        if let Some(hit) = cache.get(&key) {
            return hit.clone();
        }
        let result = self.analyzer.analyze(Some(buffer.as_ref()));
        if !result.budget_exceeded {
            cache.set(key, result.clone());
        }
        result
    }

    pub fn status(&self) -> EngineStatus {
        let session = self.session_tx.borrow();
        EngineStatus {
            active: self.orchestrator.is_active(),
            nodes_processed: self.orchestrator.nodes_processed(),
            effectiveness_label: effectiveness_label(&session.settings),
        }
    }

    /// How often the orchestrator fell back from its primary backend.
    pub fn fallbacks(&self) -> u64 {
        self.orchestrator.fallbacks()
    }
}

impl Drop for VisionEngine {
    fn drop(&mut self) {
        self.bus_listener.abort();
    }
}

fn effectiveness_label(settings: &Settings) -> String {
    if !settings.enabled {
        return "off".into();
    }
    match settings.reading_vision {
        v if v < 1.0 => "mild",
        v if v < 2.0 => "moderate",
        v if v < 3.0 => "strong",
        _ => "maximum",
    }
    .into()
}
