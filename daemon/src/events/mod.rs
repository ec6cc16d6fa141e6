//! Events module for agent cycle transitions
//!
//! Structured events emitted by the agent so the binary can log them and
//! tests can observe the cycle.

use serde::{Deserialize, Serialize};

use crate::state::ListeningState;

/// Events emitted by the agent during a listen/dispatch cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Listening state changed
    StateChanged {
        from: ListeningState,
        to: ListeningState,
        /// Time spent in the previous state
        duration_ms: u64,
    },

    /// Wake phrase heard
    WakeDetected { transcript: String },

    /// A command was transcribed after the wake phrase
    CommandCaptured { command: String },

    /// Nothing usable was heard after the wake phrase
    CommandAbandoned,

    /// A command was classified and executed
    CommandDispatched {
        intent: String,
        action_taken: bool,
        succeeded: bool,
        duration_ms: u64,
    },

    /// Speech failed even after reinitializing the engine
    SpeechFailed { error: String },
}

impl std::fmt::Display for AgentEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentEvent::StateChanged { from, to, duration_ms } => {
                write!(f, "STATE_CHANGED {} -> {} ({}ms)", from, to, duration_ms)
            }
            AgentEvent::WakeDetected { .. } => write!(f, "WAKE_DETECTED"),
            AgentEvent::CommandCaptured { .. } => write!(f, "COMMAND_CAPTURED"),
            AgentEvent::CommandAbandoned => write!(f, "COMMAND_ABANDONED"),
            AgentEvent::CommandDispatched {
                intent,
                duration_ms,
                ..
            } => write!(f, "COMMAND_DISPATCHED {} ({}ms)", intent, duration_ms),
            AgentEvent::SpeechFailed { .. } => write!(f, "SPEECH_FAILED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = AgentEvent::CommandDispatched {
            intent: "volume_control".to_string(),
            action_taken: true,
            succeeded: true,
            duration_ms: 1500,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("command_dispatched"));
        assert!(json.contains("1500"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"state_changed","from":"awaiting_wake","to":"capturing","duration_ms":3}"#;
        let event: AgentEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(
            event,
            AgentEvent::StateChanged {
                to: ListeningState::Capturing,
                ..
            }
        ));
    }

    #[test]
    fn test_display() {
        let event = AgentEvent::StateChanged {
            from: ListeningState::Dispatching,
            to: ListeningState::Speaking,
            duration_ms: 12,
        };
        assert_eq!(event.to_string(), "STATE_CHANGED Dispatching -> Speaking (12ms)");
    }
}
