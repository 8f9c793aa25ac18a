//! End-to-end orchestration over a synthetic document: snapshot
//! processing, change observation, fallback, and session restarts.

use std::time::Duration;

use readlens::backend::RecordingBackend;
use readlens::bus::SessionBus;
use readlens::document::{shared, Document, NodeId, NodeKind, PixelBuffer, SharedDocument};
use readlens::engine::{EngineConfig, VisionEngine};
use readlens::settings::{SettingsPatch, SettingsStore};

fn temp_store(tag: &str) -> SettingsStore {
    let path = std::env::temp_dir().join(format!(
        "readlens-it-{tag}-{}-{}.json",
        std::process::id(),
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));
    SettingsStore::new(path).expect("temp settings store")
}

fn text_buffer(seed: u8) -> PixelBuffer {
    // Alternating dark rows on white give the detector real edges.
    let (width, height) = (64u32, 64u32);
    let mut data = vec![255u8; (width * height * 4) as usize];
    for y in (4..height as usize).step_by(8) {
        for x in 4..width as usize - 4 {
            let i = (y * width as usize + x) * 4;
            data[i] = seed;
            data[i + 1] = seed;
            data[i + 2] = seed;
        }
    }
    PixelBuffer::new(width, height, data)
}

/// Root container with three text children carrying pixel content.
/// Pending construction events are flushed before anyone subscribes.
fn three_node_document() -> (SharedDocument, NodeId, Vec<NodeId>) {
    let mut doc = Document::new();
    let root = doc.root();
    let mut nodes = Vec::new();
    for seed in [10u8, 40, 70] {
        let node = doc.create_node(NodeKind::Text);
        doc.append_child(root, node);
        doc.set_pixels(node, text_buffer(seed));
        nodes.push(node);
    }
    doc.commit();
    (shared(doc), root, nodes)
}

async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..400 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within timeout");
}

fn enable(engine: &VisionEngine) {
    engine
        .update_settings(SettingsPatch {
            reading_vision: Some(1.5),
            contrast_boost_pct: Some(40.0),
            edge_enhancement_pct: Some(20.0),
            enabled: Some(true),
        })
        .expect("enable settings");
}

#[tokio::test]
async fn test_snapshot_pass_processes_each_node_exactly_once() {
    let (doc, root, nodes) = three_node_document();
    let (backend, log) = RecordingBackend::new();
    let mut engine = VisionEngine::new(EngineConfig::default(), temp_store("once"), SessionBus::new())
        .with_primary_backend(Box::new(backend));
    enable(&engine);

    engine.start(doc, root).await.unwrap();
    wait_until(|| engine.status().nodes_processed >= 3).await;
    engine.stop().await.unwrap();

    let entries = log.lock().unwrap();
    assert_eq!(entries.len(), 3);
    for node in &nodes {
        let count = entries.iter().filter(|(id, _)| id == node).count();
        assert_eq!(count, 1, "node {node:?} processed more than once");
    }
    // Document order is preserved.
    let order: Vec<NodeId> = entries.iter().map(|(id, _)| *id).collect();
    assert_eq!(order, nodes);
}

#[tokio::test]
async fn test_content_change_reprocesses_only_that_node() {
    let (doc, root, nodes) = three_node_document();
    let (backend, log) = RecordingBackend::new();
    let mut engine = VisionEngine::new(EngineConfig::default(), temp_store("chg"), SessionBus::new())
        .with_primary_backend(Box::new(backend));
    enable(&engine);

    engine.start(doc.clone(), root).await.unwrap();
    wait_until(|| engine.status().nodes_processed >= 3).await;

    {
        let mut doc = doc.lock().await;
        doc.set_pixels(nodes[1], text_buffer(200));
        doc.commit();
    }
    wait_until(|| engine.status().nodes_processed >= 4).await;

    // A re-notification with identical content must be skipped.
    {
        let mut doc = doc.lock().await;
        doc.set_pixels(nodes[1], text_buffer(200));
        doc.commit();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    engine.stop().await.unwrap();

    let entries = log.lock().unwrap();
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[3].0, nodes[1]);
    assert_eq!(engine.status().nodes_processed, 4);
}

#[tokio::test]
async fn test_added_subtree_is_picked_up() {
    let (doc, root, _) = three_node_document();
    let (backend, log) = RecordingBackend::new();
    let mut engine = VisionEngine::new(EngineConfig::default(), temp_store("add"), SessionBus::new())
        .with_primary_backend(Box::new(backend));
    enable(&engine);

    engine.start(doc.clone(), root).await.unwrap();
    wait_until(|| engine.status().nodes_processed >= 3).await;

    let late = {
        let mut doc = doc.lock().await;
        let container = doc.create_node(NodeKind::Container);
        let image = doc.create_node(NodeKind::Image);
        doc.append_child(root, container);
        doc.append_child(container, image);
        doc.set_pixels(image, text_buffer(120));
        doc.commit();
        image
    };
    wait_until(|| engine.status().nodes_processed >= 4).await;
    engine.stop().await.unwrap();

    let entries = log.lock().unwrap();
    assert!(entries.iter().any(|(id, _)| *id == late));
    // The container itself never reaches a backend.
    assert_eq!(entries.len(), 4);
}

#[tokio::test]
async fn test_failing_primary_falls_back_to_css() {
    let (doc, root, nodes) = three_node_document();
    let (backend, log) = RecordingBackend::failing();
    let mut engine = VisionEngine::new(EngineConfig::default(), temp_store("fb"), SessionBus::new())
        .with_primary_backend(Box::new(backend));
    enable(&engine);

    engine.start(doc.clone(), root).await.unwrap();
    wait_until(|| engine.status().nodes_processed >= 3).await;
    engine.stop().await.unwrap();

    // Primary was attempted for every node, and every failure was
    // retried through CSS.
    assert_eq!(log.lock().unwrap().len(), 3);
    assert_eq!(engine.fallbacks(), 3);

    let doc = doc.lock().await;
    for node in nodes {
        let node = doc.get(node).unwrap();
        let filter = node.style("filter").expect("css fallback applied");
        assert!(filter.starts_with("contrast("), "unexpected filter: {filter}");
    }
}

#[tokio::test]
async fn test_settings_change_restarts_full_pass() {
    let (doc, root, nodes) = three_node_document();
    let (backend, log) = RecordingBackend::new();
    let mut engine = VisionEngine::new(EngineConfig::default(), temp_store("restart"), SessionBus::new())
        .with_primary_backend(Box::new(backend));
    enable(&engine);

    engine.start(doc, root).await.unwrap();
    wait_until(|| engine.status().nodes_processed >= 3).await;

    engine
        .update_settings(SettingsPatch {
            reading_vision: Some(2.5),
            ..SettingsPatch::default()
        })
        .unwrap();
    wait_until(|| engine.status().nodes_processed >= 6).await;
    engine.stop().await.unwrap();

    let entries = log.lock().unwrap();
    assert_eq!(entries.len(), 6);
    for node in &nodes {
        let count = entries.iter().filter(|(id, _)| id == node).count();
        assert_eq!(count, 2, "node {node:?} not reprocessed exactly once");
    }
    // The stronger prescription shows up in the second pass.
    assert!(entries[5].1.typography.is_some());
    let before = entries[0].1.typography.as_ref().unwrap().line_height;
    let after = entries[5].1.typography.as_ref().unwrap().line_height;
    assert!(after > before);
}

#[tokio::test]
async fn test_removed_node_is_forgotten() {
    let (doc, root, nodes) = three_node_document();
    let (backend, log) = RecordingBackend::new();
    let mut engine = VisionEngine::new(EngineConfig::default(), temp_store("rm"), SessionBus::new())
        .with_primary_backend(Box::new(backend));
    enable(&engine);

    engine.start(doc.clone(), root).await.unwrap();
    wait_until(|| engine.status().nodes_processed >= 3).await;

    {
        let mut doc = doc.lock().await;
        doc.remove(nodes[0]);
        doc.commit();
    }
    // Mutating a removed node must not schedule any work.
    {
        let mut doc = doc.lock().await;
        doc.set_pixels(nodes[0], text_buffer(250));
        doc.commit();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    engine.stop().await.unwrap();

    assert_eq!(log.lock().unwrap().len(), 3);
    assert_eq!(engine.status().nodes_processed, 3);
}

#[tokio::test]
async fn test_stop_halts_observation() {
    let (doc, root, nodes) = three_node_document();
    let (backend, log) = RecordingBackend::new();
    let mut engine = VisionEngine::new(EngineConfig::default(), temp_store("stop"), SessionBus::new())
        .with_primary_backend(Box::new(backend));
    enable(&engine);

    engine.start(doc.clone(), root).await.unwrap();
    assert!(engine.status().active);
    wait_until(|| engine.status().nodes_processed >= 3).await;
    engine.stop().await.unwrap();
    assert!(!engine.status().active);

    {
        let mut doc = doc.lock().await;
        doc.set_pixels(nodes[2], text_buffer(222));
        doc.commit();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(log.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_disabled_session_applies_identity() {
    let (doc, root, nodes) = three_node_document();
    let mut engine =
        VisionEngine::new(EngineConfig::default(), temp_store("off"), SessionBus::new());
    // Settings left at defaults: disabled. CSS backend still runs and
    // clears any filter.
    engine.start(doc.clone(), root).await.unwrap();
    wait_until(|| engine.status().nodes_processed >= 3).await;
    engine.stop().await.unwrap();

    let doc = doc.lock().await;
    for node in nodes {
        assert_eq!(doc.get(node).unwrap().style("filter"), Some("none"));
    }
    assert_eq!(engine.status().effectiveness_label, "off");
}
