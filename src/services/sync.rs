//! In-process publish/subscribe for "something changed" signals. Every
//! successful mutation publishes a [`SyncEvent`]; `GET /api/events`
//! forwards them to clients as server-sent events so they can refetch.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SyncKind {
    Users,
    Trips,
    Notifications,
    Messages,
    CreditLogs,
    StudyGroups,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SyncEvent {
    pub kind: SyncKind,
    pub id: String,
}

#[derive(Clone)]
pub struct SyncBus {
    tx: broadcast::Sender<SyncEvent>,
}

impl Default for SyncBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, kind: SyncKind, id: impl Into<String>) {
        let event = SyncEvent {
            kind,
            id: id.into(),
        };
        // No subscribers is the normal case between page loads.
        if let Ok(receivers) = self.tx.send(event) {
            debug!(receivers, ?kind, "sync event published");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_published_events() {
        let bus = SyncBus::new();
        let mut rx = bus.subscribe();
        bus.publish(SyncKind::Trips, "t1");
        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, SyncKind::Trips);
        assert_eq!(event.id, "t1");
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        SyncBus::new().publish(SyncKind::Users, "nobody@uni.it");
    }
}
