//! System event types
//!
//! Defines all event types that can be broadcast through the event bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// System event enumeration
///
/// All events are tagged with their event name for serialization.
/// The `serde(tag = "event", content = "data")` attribute creates a
/// JSON structure like:
/// ```json
/// {
///   "event": "switcher.scene_changed",
///   "data": { "scene": "Camera 1" }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum SystemEvent {
    // ============================================================================
    // Switcher Events
    // ============================================================================
    /// Switcher connection state changed
    #[serde(rename = "switcher.connection_changed")]
    SwitcherConnectionChanged {
        /// "disconnected", "connecting", "authenticating" or "ready"
        state: String,
        /// Remote endpoint ("host:port")
        endpoint: String,
    },

    /// Program scene changed on the switcher
    #[serde(rename = "switcher.scene_changed")]
    SwitcherSceneChanged { scene: String },

    /// Scene list reloaded
    #[serde(rename = "switcher.scene_list_changed")]
    SwitcherSceneListChanged {
        /// Most recently created first, as reported by the switcher
        scenes: Vec<String>,
    },

    /// Recording output started/stopped
    #[serde(rename = "switcher.record_state_changed")]
    SwitcherRecordStateChanged { active: bool },

    /// Streaming output started/stopped
    #[serde(rename = "switcher.stream_state_changed")]
    SwitcherStreamStateChanged { active: bool },

    // ============================================================================
    // Camera Events
    // ============================================================================
    /// A motion frame could not be delivered (best-effort transport)
    #[serde(rename = "camera.transport_error")]
    CameraTransportError {
        /// Camera address ("ip:port")
        target: String,
        /// Command axis that was being sent
        axis: String,
        reason: String,
    },

    // ============================================================================
    // Tracking Events
    // ============================================================================
    /// Tracking loop started or stopped
    #[serde(rename = "tracking.state_changed")]
    TrackingStateChanged {
        /// Whether the control loop is running
        enabled: bool,
    },

    // ============================================================================
    // Rule Events
    // ============================================================================
    /// A scene rule matched and switched the program scene
    #[serde(rename = "rules.triggered")]
    RuleTriggered {
        rule_id: String,
        keywords: Vec<String>,
        scene: String,
        description: String,
        timestamp: DateTime<Utc>,
    },

    // ============================================================================
    // Command Events
    // ============================================================================
    /// Dispatcher executed an intent
    #[serde(rename = "command.executed")]
    CommandExecuted {
        intent: String,
        result: serde_json::Value,
    },

    /// Dispatcher failed to execute an intent
    #[serde(rename = "command.failed")]
    CommandFailed {
        intent: String,
        /// Error kind (see `AppError::kind`)
        kind: String,
        error: String,
    },
}

impl SystemEvent {
    /// Get the event name (for filtering)
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::SwitcherConnectionChanged { .. } => "switcher.connection_changed",
            Self::SwitcherSceneChanged { .. } => "switcher.scene_changed",
            Self::SwitcherSceneListChanged { .. } => "switcher.scene_list_changed",
            Self::SwitcherRecordStateChanged { .. } => "switcher.record_state_changed",
            Self::SwitcherStreamStateChanged { .. } => "switcher.stream_state_changed",
            Self::CameraTransportError { .. } => "camera.transport_error",
            Self::TrackingStateChanged { .. } => "tracking.state_changed",
            Self::RuleTriggered { .. } => "rules.triggered",
            Self::CommandExecuted { .. } => "command.executed",
            Self::CommandFailed { .. } => "command.failed",
        }
    }

    /// Check if event matches a topic filter
    ///
    /// Supports wildcards:
    /// - `*` matches all events
    /// - `switcher.*` matches all switcher events
    /// - `switcher.scene_changed` matches exact event
    pub fn matches_topic(&self, topic: &str) -> bool {
        if topic == "*" {
            return true;
        }

        let event_name = self.event_name();

        if let Some(prefix) = topic.strip_suffix(".*") {
            return event_name.starts_with(prefix)
                && event_name.as_bytes().get(prefix.len()) == Some(&b'.');
        }

        event_name == topic
    }
}
