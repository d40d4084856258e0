//! Domain event system: decoupled communication between bounded contexts.
//!
//! The loop and the scheduler publish here when a bus is attached; the CLI
//! or tests subscribe to observe what happened without coupling to either.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// The loop produced a final answer
    ResponseGenerated {
        conversation_id: String,
        model: String,
        iterations: u32,
        tokens_used: u32,
        timestamp: DateTime<Utc>,
    },

    /// A tool call was executed (or rejected)
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A timer or reminder was scheduled
    TimerScheduled {
        timer_id: u64,
        kind: String,
        fire_after_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A timer or reminder elapsed and its alert was dispatched
    TimerFired {
        timer_id: u64,
        kind: String,
        timestamp: DateTime<Utc>,
    },

    /// A pending timer was cancelled
    TimerCancelled {
        timer_id: u64,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
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
        // No subscribers is fine
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

        bus.publish(DomainEvent::ToolExecuted {
            tool_name: "calculator".into(),
            success: true,
            duration_ms: 1,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::ToolExecuted { tool_name, success, .. } => {
                assert_eq!(tool_name, "calculator");
                assert!(success);
            }
            _ => panic!("Expected ToolExecuted event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(DomainEvent::TimerCancelled {
            timer_id: 1,
            timestamp: Utc::now(),
        });
    }
}
