//! Domain event system — decoupled communication between bounded contexts.
//!
//! Events are published when something interesting happens in the system.
//! External UI/notification layers can subscribe to react without tight
//! coupling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A proactive task was created
    TaskCreated {
        task_id: String,
        name: String,
        timestamp: DateTime<Utc>,
    },

    /// A proactive task fired and a pending work item was written
    TaskFired {
        task_id: String,
        name: String,
        fired_at: DateTime<Utc>,
    },

    /// A pending work item was delivered and removed
    ItemProcessed {
        task_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Delivering a pending work item failed; the item stays for retry
    ItemProcessingError {
        item: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// The agent generated a response
    ResponseGenerated {
        model: String,
        tokens_used: u32,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
/// Components can subscribe to receive all events and filter for what they
/// care about.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // Ignore send errors (no subscribers = that's fine)
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::TaskFired {
            task_id: "t1".into(),
            name: "morning_digest".into(),
            fired_at: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::TaskFired { task_id, name, .. } => {
                assert_eq!(task_id, "t1");
                assert_eq!(name, "morning_digest");
            }
            _ => panic!("Expected TaskFired event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(DomainEvent::ItemProcessingError {
            item: "0001-t1.json".into(),
            error_message: "no subscribers".into(),
            timestamp: Utc::now(),
        });
    }
}
