//! Host-independent document model.
//!
//! The engine never touches a real DOM; it operates on this arena tree.
//! Mutations accumulate change events which `commit` flushes to every
//! subscriber as a single batch, mirroring how host mutation observers
//! deliver batched records on a microtask.

use std::sync::Arc;

use tokio::sync::mpsc;

/// Stable node identity: arena index. Valid for the node's lifetime;
/// indices are not reused within one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Text,
    Image,
    Video,
    Container,
}

impl NodeKind {
    /// Text, image and video nodes qualify for corrective processing.
    pub fn qualifies(self) -> bool {
        !matches!(self, NodeKind::Container)
    }
}

/// RGBA8 pixel buffer, width * height * 4 bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    /// Hosts hand us buffers of unknown provenance, so a length
    /// mismatch is corrected here (truncate or zero-pad) instead of
    /// being trusted by the indexing accessors.
    pub fn new(width: u32, height: u32, mut data: Vec<u8>) -> Self {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            data.resize(expected, 0);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Solid-fill buffer, mostly for tests and placeholders.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Rec. 601 luma of the pixel at (x, y), in 0.0..=255.0.
    pub fn luminance(&self, x: u32, y: u32) -> f64 {
        let idx = ((y * self.width + x) * 4) as usize;
        let r = self.data[idx] as f64;
        let g = self.data[idx + 1] as f64;
        let b = self.data[idx + 2] as f64;
        0.299 * r + 0.587 * g + 0.114 * b
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y * self.width + x) * 4) as usize;
        [
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ]
    }
}

#[derive(Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub pixels: Option<Arc<PixelBuffer>>,
    pub children: Vec<NodeId>,
    /// Applied presentation properties, insertion-ordered.
    style: Vec<(String, String)>,
    removed: bool,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            pixels: None,
            children: Vec::new(),
            style: Vec::new(),
            removed: false,
        }
    }

    pub fn style(&self, property: &str) -> Option<&str> {
        self.style
            .iter()
            .find(|(key, _)| key == property)
            .map(|(_, value)| value.as_str())
    }

    pub fn style_entries(&self) -> &[(String, String)] {
        &self.style
    }

    pub fn set_style(&mut self, property: &str, value: &str) {
        if let Some(entry) = self.style.iter_mut().find(|(key, _)| key == property) {
            entry.1 = value.to_string();
        } else {
            self.style.push((property.to_string(), value.to_string()));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Changed,
    Removed,
}

#[derive(Debug, Clone, Copy)]
pub struct ChangeEvent {
    pub node: NodeId,
    pub kind: ChangeKind,
}

/// One flushed batch of change events, delivered in mutation order.
pub type ChangeBatch = Vec<ChangeEvent>;

/// Arena document with batched change subscription.
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    pending: Vec<ChangeEvent>,
    subscribers: Vec<mpsc::UnboundedSender<ChangeBatch>>,
}

impl Document {
    pub fn new() -> Self {
        let mut nodes = Vec::new();
        nodes.push(Node::new(NodeKind::Container));
        Self {
            nodes,
            root: NodeId(0),
            pending: Vec::new(),
            subscribers: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize).filter(|n| !n.removed)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0 as usize).filter(|n| !n.removed)
    }

    /// Create a detached node. It joins the tree via `append_child`.
    pub fn create_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(kind));
        id
    }

    /// Attach `child` under `parent` and record an Added event.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.nodes.get_mut(parent.0 as usize) {
            node.children.push(child);
        }
        self.pending.push(ChangeEvent {
            node: child,
            kind: ChangeKind::Added,
        });
    }

    /// Replace a node's pixel content and record a Changed event.
    pub fn set_pixels(&mut self, id: NodeId, pixels: PixelBuffer) {
        let Some(node) = self
            .nodes
            .get_mut(id.0 as usize)
            .filter(|node| !node.removed)
        else {
            return;
        };
        node.pixels = Some(Arc::new(pixels));
        self.pending.push(ChangeEvent {
            node: id,
            kind: ChangeKind::Changed,
        });
    }

    /// Write back rendered pixels without recording a change event.
    /// Used by backends that transform content in place; a render
    /// output is not a content mutation.
    pub fn apply_rendered_pixels(&mut self, id: NodeId, pixels: PixelBuffer) {
        if let Some(node) = self
            .nodes
            .get_mut(id.0 as usize)
            .filter(|node| !node.removed)
        {
            node.pixels = Some(Arc::new(pixels));
        }
    }

    /// Detach a node (and its subtree) and record Removed events.
    pub fn remove(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(current.0 as usize) {
                if node.removed {
                    continue;
                }
                node.removed = true;
                stack.extend(node.children.iter().copied());
                self.pending.push(ChangeEvent {
                    node: current,
                    kind: ChangeKind::Removed,
                });
            }
        }
        for node in &mut self.nodes {
            node.children.retain(|child| *child != id);
        }
    }

    /// Subscribe to future change batches.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ChangeBatch> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Flush pending change events to all subscribers as one batch.
    /// Dropped receivers are pruned here.
    pub fn commit(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let batch: ChangeBatch = std::mem::take(&mut self.pending);
        self.subscribers
            .retain(|tx| tx.send(batch.clone()).is_ok());
    }

    /// Depth-first, document-order listing of the subtree at `root`,
    /// including `root` itself.
    pub fn subtree(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            let Some(node) = self.get(current) else {
                continue;
            };
            out.push(current);
            // Reverse push so children pop in document order.
            for child in node.children.iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    /// Qualifying nodes (text/image/video) of a subtree, document order.
    pub fn qualifying_nodes(&self, root: NodeId) -> Vec<NodeId> {
        self.subtree(root)
            .into_iter()
            .filter(|id| {
                self.get(*id)
                    .map(|node| node.kind.qualifies())
                    .unwrap_or(false)
            })
            .collect()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Documents are shared between the mutating host and the orchestrator.
pub type SharedDocument = Arc<tokio::sync::Mutex<Document>>;

pub fn shared(doc: Document) -> SharedDocument {
    Arc::new(tokio::sync::Mutex::new(doc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtree_document_order() {
        let mut doc = Document::new();
        let a = doc.create_node(NodeKind::Text);
        let b = doc.create_node(NodeKind::Container);
        let c = doc.create_node(NodeKind::Image);
        let root = doc.root();
        doc.append_child(root, a);
        doc.append_child(root, b);
        doc.append_child(b, c);

        assert_eq!(doc.subtree(root), vec![root, a, b, c]);
        assert_eq!(doc.qualifying_nodes(root), vec![a, c]);
    }

    #[tokio::test]
    async fn test_commit_delivers_one_batch() {
        let mut doc = Document::new();
        let mut rx = doc.subscribe();

        let a = doc.create_node(NodeKind::Text);
        let root = doc.root();
        doc.append_child(root, a);
        doc.set_pixels(a, PixelBuffer::filled(2, 2, [255, 255, 255, 255]));
        doc.commit();

        let batch = rx.recv().await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].kind, ChangeKind::Added);
        assert_eq!(batch[1].kind, ChangeKind::Changed);

        // Nothing pending, commit is a no-op.
        doc.commit();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_remove_detaches_subtree() {
        let mut doc = Document::new();
        let a = doc.create_node(NodeKind::Container);
        let b = doc.create_node(NodeKind::Text);
        let root = doc.root();
        doc.append_child(root, a);
        doc.append_child(a, b);
        doc.remove(a);

        assert!(doc.get(a).is_none());
        assert!(doc.get(b).is_none());
        assert_eq!(doc.qualifying_nodes(root), Vec::<NodeId>::new());
    }

    #[test]
    fn test_short_pixel_data_is_padded() {
        // 4x4 buffer handed only one pixel's worth of bytes.
        let buffer = PixelBuffer::new(4, 4, vec![255, 0, 0, 255]);
        assert_eq!(buffer.data.len(), 64);
        assert_eq!(buffer.pixel(0, 0), [255, 0, 0, 255]);
        // Missing pixels read as transparent black, not a panic.
        assert_eq!(buffer.pixel(3, 3), [0, 0, 0, 0]);
        assert_eq!(buffer.luminance(3, 3), 0.0);
    }

    #[test]
    fn test_oversized_pixel_data_is_truncated() {
        let buffer = PixelBuffer::new(2, 2, vec![7; 100]);
        assert_eq!(buffer.data.len(), 16);
        assert_eq!(buffer.pixel(1, 1), [7, 7, 7, 7]);
    }

    #[test]
    fn test_style_ordering_and_overwrite() {
        let mut doc = Document::new();
        let a = doc.create_node(NodeKind::Text);
        let root = doc.root();
        doc.append_child(root, a);

        let node = doc.get_mut(a).unwrap();
        node.set_style("filter", "contrast(1.2)");
        node.set_style("letter-spacing", "0.02em");
        node.set_style("filter", "contrast(1.4)");

        assert_eq!(node.style("filter"), Some("contrast(1.4)"));
        assert_eq!(node.style_entries()[0].0, "filter");
    }
}
