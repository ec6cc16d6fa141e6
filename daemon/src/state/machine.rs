//! Core listening state machine
//!
//! Tracks transitions between AwaitingWake, Capturing, Dispatching and
//! Speaking for the single-threaded agent cycle.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::events::AgentEvent;

/// The four possible states of the agent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListeningState {
    /// Sampling short windows for the wake phrase
    #[default]
    AwaitingWake,
    /// Recording one command after the wake phrase
    Capturing,
    /// Classifying and executing the command
    Dispatching,
    /// Reading the response aloud
    Speaking,
}

impl std::fmt::Display for ListeningState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListeningState::AwaitingWake => write!(f, "AwaitingWake"),
            ListeningState::Capturing => write!(f, "Capturing"),
            ListeningState::Dispatching => write!(f, "Dispatching"),
            ListeningState::Speaking => write!(f, "Speaking"),
        }
    }
}

impl ListeningState {
    /// Whether the cycle may move from `self` to `next`
    pub fn can_transition_to(self, next: ListeningState) -> bool {
        use ListeningState::*;
        matches!(
            (self, next),
            (AwaitingWake, Capturing)
                | (Capturing, Dispatching)
                | (Capturing, AwaitingWake)
                | (Dispatching, Speaking)
                | (Dispatching, AwaitingWake)
                | (Speaking, AwaitingWake)
        )
    }
}

/// Owns the current listening state and reports transitions
pub struct StateTracker {
    /// Current state
    state: ListeningState,
    /// Time when the current state was entered
    entered_at: Instant,
    /// Channel for emitting state events
    event_tx: broadcast::Sender<AgentEvent>,
}

impl StateTracker {
    /// Create a tracker in AwaitingWake
    pub fn new(event_tx: broadcast::Sender<AgentEvent>) -> Self {
        Self {
            state: ListeningState::AwaitingWake,
            entered_at: Instant::now(),
            event_tx,
        }
    }

    /// Get the current state
    pub fn state(&self) -> ListeningState {
        self.state
    }

    /// Emit an event to any subscribers
    pub fn emit(&self, event: AgentEvent) {
        debug!(%event, "emitting agent event");
        let _ = self.event_tx.send(event);
    }

    /// Perform a state transition
    ///
    /// Returns false and leaves the state untouched when the transition is
    /// not part of the cycle.
    pub fn transition_to(&mut self, next: ListeningState) -> bool {
        let from = self.state;
        if !from.can_transition_to(next) {
            warn!(from = %from, to = %next, "rejected state transition");
            return false;
        }

        let duration_ms = self.entered_at.elapsed().as_millis() as u64;
        info!(from = %from, to = %next, duration_ms, "state transition");

        self.state = next;
        self.entered_at = Instant::now();
        self.emit(AgentEvent::StateChanged {
            from,
            to: next,
            duration_ms,
        });
        true
    }

    /// Return to AwaitingWake from wherever the cycle stopped
    pub fn reset(&mut self) {
        if self.state != ListeningState::AwaitingWake {
            self.transition_to(ListeningState::AwaitingWake);
        }
    }
}
