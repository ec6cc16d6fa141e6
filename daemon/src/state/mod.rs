//! Listening state machine
//!
//! Provides an explicit state machine with four states:
//! - AwaitingWake: sampling short windows for the wake phrase
//! - Capturing: recording one command
//! - Dispatching: executing the command or asking the language model
//! - Speaking: reading the reply aloud

mod machine;

pub use machine::{ListeningState, StateTracker};
