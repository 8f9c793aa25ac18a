//! Cross-instance session bus.
//!
//! Independently mounted consumers of one logical session share toggle
//! state through this broadcast channel instead of global events or
//! shared mutable memory. Every engine instance gets a clone injected
//! at construction.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::settings::Settings;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// GPU acceleration toggled somewhere in the session.
    GpuEnabled(bool),
    /// Effective settings replaced; consumers converge on this value.
    SettingsChanged(Settings),
}

#[derive(Debug, Clone)]
pub struct SessionBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(32);
        Self { tx }
    }

    /// Publish to all current subscribers. Lagging or absent receivers
    /// are not an error.
    pub fn publish(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }
}

impl Default for SessionBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_all_subscribers_receive_toggle() {
        let bus = SessionBus::new();
        let mut rx_a = bus.subscribe();
        let mut rx_b = bus.subscribe();

        bus.publish(SessionEvent::GpuEnabled(true));

        assert_eq!(rx_a.recv().await.unwrap(), SessionEvent::GpuEnabled(true));
        assert_eq!(rx_b.recv().await.unwrap(), SessionEvent::GpuEnabled(true));
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let bus = SessionBus::new();
        bus.publish(SessionEvent::GpuEnabled(false));
    }
}
