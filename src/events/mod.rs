//! Event system for state notifications
//!
//! This module provides the event bus that replaces per-component callbacks.
//! Every component publishes into one bus; delivery order per publisher is the
//! order of `publish` calls, so events coming from one switcher connection are
//! observed in the order the connection delivered them.

pub mod types;

pub use types::SystemEvent;

use tokio::sync::broadcast;

/// Event channel capacity (ring buffer size)
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Event bus for broadcasting system events
///
/// # Example
///
/// ```no_run
/// use ptz_director::events::{EventBus, SystemEvent};
///
/// let bus = EventBus::new();
/// let mut rx = bus.subscribe();
///
/// bus.publish(SystemEvent::TrackingStateChanged { enabled: true });
///
/// tokio::spawn(async move {
///     while let Ok(event) = rx.recv().await {
///         println!("Received event: {:?}", event);
///     }
/// });
/// ```
pub struct EventBus {
    tx: broadcast::Sender<SystemEvent>,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish an event to all subscribers
    ///
    /// If there are no active subscribers, the event is dropped.
    pub fn publish(&self, event: SystemEvent) {
        tracing::trace!(event = event.event_name(), "Publishing event");
        let _ = self.tx.send(event);
    }

    /// Subscribe to events
    ///
    /// The receiver uses a ring buffer, so a subscriber that falls too far
    /// behind receives a `Lagged` error and misses some events.
    pub fn subscribe(&self) -> broadcast::Receiver<SystemEvent> {
        self.tx.subscribe()
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
