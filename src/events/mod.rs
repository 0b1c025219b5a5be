//! Notifications for the presentation layer
//!
//! The engine and the state machine never touch presentation state; they
//! broadcast these events and the presentation drains them on its own task.

use serde::{Deserialize, Serialize};

/// Snapshot answered to a status request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub running: bool,
    pub count: u64,
    pub elapsed_ms: u64,
    pub toggle_key: String,
    pub capturing: bool,
    /// Human-readable summary of the current action configuration
    pub action: String,
}

/// Events emitted by the engine and the state machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClickerEvent {
    /// A run started; the count is back at zero
    EngineStarted,

    /// One more action was performed
    ActionPerformed { count: u64 },

    /// The loop of a run has exited
    EngineStopped {
        count: u64,
        /// Duration of the run in milliseconds
        elapsed_ms: u64,
    },

    /// Waiting for the next key press to become the toggle key
    CaptureStarted,

    /// The toggle key was rebound
    ToggleKeyChanged { key: String },

    /// A configuration field was changed
    ConfigChanged { field: String, value: String },

    /// Reply to a status request
    Status(StatusSnapshot),

    /// The cancel key or a quit command asked the application to exit
    ShutdownRequested,
}

impl std::fmt::Display for ClickerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClickerEvent::EngineStarted => write!(f, "ENGINE_STARTED"),
            ClickerEvent::ActionPerformed { count } => write!(f, "ACTION_PERFORMED ({})", count),
            ClickerEvent::EngineStopped { count, elapsed_ms } => {
                write!(f, "ENGINE_STOPPED ({} actions, {}ms)", count, elapsed_ms)
            }
            ClickerEvent::CaptureStarted => write!(f, "CAPTURE_STARTED"),
            ClickerEvent::ToggleKeyChanged { key } => write!(f, "TOGGLE_KEY_CHANGED ({})", key),
            ClickerEvent::ConfigChanged { field, value } => {
                write!(f, "CONFIG_CHANGED ({}={})", field, value)
            }
            ClickerEvent::Status(status) => write!(
                f,
                "STATUS (running={}, count={})",
                status.running, status.count
            ),
            ClickerEvent::ShutdownRequested => write!(f, "SHUTDOWN_REQUESTED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = ClickerEvent::EngineStopped {
            count: 42,
            elapsed_ms: 1500,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("engine_stopped"));
        assert!(json.contains("1500"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"toggle_key_changed","key":"F8"}"#;
        let event: ClickerEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event, ClickerEvent::ToggleKeyChanged { key: "F8".into() });
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ClickerEvent::ActionPerformed { count: 3 }.to_string(),
            "ACTION_PERFORMED (3)"
        );
        assert_eq!(ClickerEvent::ShutdownRequested.to_string(), "SHUTDOWN_REQUESTED");
    }
}
