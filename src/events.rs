//! Process-local event bus.
//!
//! Every successful tracked write publishes [`StoreEvent::Changed`]; storage
//! failures publish [`StoreEvent::StorageAlert`] for whatever surfaces alerts
//! to the user. The sync orchestrator subscribes to the same bus.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StoreEvent {
    /// A document was written through the accessor.
    Changed { key: String },
    /// User-facing storage warning or failure.
    StorageAlert { level: AlertLevel, message: String },
    /// A full sync cycle rewrote local documents; in-memory copies are stale.
    SyncCompleted { at: DateTime<Utc> },
    /// Every local document was removed.
    DataReset { at: DateTime<Utc> },
    /// A backup was written over local documents.
    DataImported { at: DateTime<Utc> },
}

impl StoreEvent {
    /// Documents were replaced underneath the trackers, which must reload
    /// before their next mutation.
    pub fn invalidates_trackers(&self) -> bool {
        matches!(
            self,
            Self::SyncCompleted { .. } | Self::DataReset { .. } | Self::DataImported { .. }
        )
    }
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<StoreEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }

    /// 没有订阅者时发送失败属于正常情况，直接忽略
    pub fn publish(&self, event: StoreEvent) {
        let _ = self.tx.send(event);
    }

    pub fn changed(&self, key: &str) {
        self.publish(StoreEvent::Changed {
            key: key.to_string(),
        });
    }

    pub fn alert(&self, level: AlertLevel, message: impl Into<String>) {
        self.publish(StoreEvent::StorageAlert {
            level,
            message: message.into(),
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
