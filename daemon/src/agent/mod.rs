//! The listen/capture/dispatch/speak cycle
//!
//! Everything here blocks: the binary runs [`Agent::run`] on a dedicated
//! blocking thread and only waits on it from async code. One cycle walks
//! AwaitingWake -> Capturing -> Dispatching -> Speaking and always ends back
//! in AwaitingWake, whatever happened along the way.

mod wake;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::{debug, error, info, trace, warn};

use crate::audio::{AudioSource, ListenParams};
use crate::config::{secs, Config};
use crate::events::AgentEvent;
use crate::intent::{DispatchOutcome, Dispatcher};
use crate::speech::{RecognizeError, Recognizer};
use crate::state::{ListeningState, StateTracker};
use crate::voice::VoiceGuard;

use wake::WakeWord;

/// Waits and listen bounds for one agent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timings {
    pub wake: ListenParams,
    pub capture: ListenParams,
    pub calibration: Duration,
    /// Pause after a wake window without the phrase
    pub debounce: Duration,
    /// Pause after an audio device error
    pub error_backoff: Duration,
    /// Pause after a full command cycle
    pub cycle_cooldown: Duration,
}

impl Timings {
    pub fn from_config(cfg: &Config) -> Self {
        let pause = secs(cfg.capture.pause_secs);
        Self {
            wake: ListenParams {
                timeout: None,
                phrase_limit: secs(cfg.wake.phrase_limit_secs),
                pause,
            },
            capture: ListenParams {
                timeout: Some(secs(cfg.capture.timeout_secs)),
                phrase_limit: secs(cfg.capture.phrase_limit_secs),
                pause,
            },
            calibration: secs(cfg.capture.calibration_secs),
            debounce: Duration::from_millis(cfg.wake.debounce_ms),
            error_backoff: Duration::from_millis(cfg.wake.error_backoff_ms),
            cycle_cooldown: Duration::from_millis(cfg.capture.cycle_cooldown_ms),
        }
    }
}

/// Owns the collaborators and the listening state for one voice session
pub struct Agent {
    audio: Box<dyn AudioSource>,
    recognizer: Box<dyn Recognizer>,
    dispatcher: Dispatcher,
    voice: Arc<VoiceGuard>,
    state: StateTracker,
    wake: WakeWord,
    greeting: Option<String>,
    timings: Timings,
    running: Arc<AtomicBool>,
}

impl Agent {
    pub fn new(
        config: &Config,
        audio: Box<dyn AudioSource>,
        recognizer: Box<dyn Recognizer>,
        dispatcher: Dispatcher,
        voice: Arc<VoiceGuard>,
        event_tx: broadcast::Sender<AgentEvent>,
    ) -> Self {
        Self {
            audio,
            recognizer,
            dispatcher,
            voice,
            state: StateTracker::new(event_tx),
            wake: WakeWord::new(&config.wake.phrase, &config.wake.variants),
            greeting: config.voice.greeting.clone(),
            timings: Timings::from_config(config),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    /// Flag that keeps [`Agent::run`] looping; clear it to stop after the
    /// current cycle
    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn state(&self) -> ListeningState {
        self.state.state()
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Speak the configured greeting, if any
    pub fn greet(&self) {
        if let Some(greeting) = &self.greeting {
            self.say(greeting);
        }
    }

    /// Loop over cycles until the running flag is cleared
    pub fn run(&mut self) {
        info!(
            recognizer = self.recognizer.name(),
            "agent listening for wake phrase"
        );
        while self.is_running() {
            self.run_cycle();
        }
        info!("agent stopped");
    }

    /// One wake -> capture -> dispatch -> speak cycle
    ///
    /// Returns the outcome when a command was dispatched.
    pub fn run_cycle(&mut self) -> Option<DispatchOutcome> {
        if !self.wait_for_wake() {
            return None;
        }

        let outcome = match self.capture_command() {
            Some(command) => self.handle_command(&command),
            None => None,
        };
        self.state.reset();

        if outcome.is_some() {
            thread::sleep(self.timings.cycle_cooldown);
        }
        outcome
    }

    /// Dispatch and speak one typed command, bypassing audio and state
    pub fn respond_once(&self, command: &str) -> Option<DispatchOutcome> {
        let outcome = self.dispatcher.dispatch(command)?;
        self.say(&outcome.response);
        Some(outcome)
    }

    /// Listen in short windows until the wake phrase is heard
    ///
    /// Returns false only when the agent was stopped first.
    fn wait_for_wake(&mut self) -> bool {
        while self.is_running() {
            let clip = match self.audio.listen(&self.timings.wake) {
                Ok(Some(clip)) => clip,
                Ok(None) => continue,
                Err(e) => {
                    warn!(error = %e, "audio error while waiting for wake phrase");
                    thread::sleep(self.timings.error_backoff);
                    continue;
                }
            };

            match self.recognizer.recognize(&clip) {
                Ok(transcript) => {
                    let transcript = transcript.to_lowercase();
                    if self.wake.matches(&transcript) {
                        info!(transcript, "wake phrase detected");
                        self.state.emit(AgentEvent::WakeDetected { transcript });
                        self.state.transition_to(ListeningState::Capturing);
                        if let Err(e) = self.audio.play_cue() {
                            debug!(error = %e, "listening cue failed");
                        }
                        return true;
                    }
                    trace!(transcript, "no wake phrase");
                }
                Err(RecognizeError::NotUnderstood) => trace!("wake window not understood"),
                Err(RecognizeError::Service(e)) => {
                    warn!(error = %e, "recognition service error");
                    continue;
                }
            }
            thread::sleep(self.timings.debounce);
        }
        false
    }

    /// Capture one command after the wake phrase; `None` abandons it
    fn capture_command(&mut self) -> Option<String> {
        let command = self.listen_for_command();
        match &command {
            Some(command) => {
                info!(command, "command captured");
                self.state.emit(AgentEvent::CommandCaptured {
                    command: command.clone(),
                });
            }
            None => {
                debug!("no command heard");
                self.state.emit(AgentEvent::CommandAbandoned);
            }
        }
        command
    }

    fn listen_for_command(&mut self) -> Option<String> {
        if let Err(e) = self.audio.calibrate(self.timings.calibration) {
            warn!(error = %e, "calibration failed");
            return None;
        }

        let clip = match self.audio.listen(&self.timings.capture) {
            Ok(Some(clip)) => clip,
            Ok(None) => {
                debug!("command capture timed out");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "audio error during command capture");
                return None;
            }
        };

        match self.recognizer.recognize(&clip) {
            Ok(text) if !text.trim().is_empty() => {
                debug!(transcript = text, "command transcript");
                Some(text.trim().to_string())
            }
            Ok(_) | Err(RecognizeError::NotUnderstood) => None,
            Err(RecognizeError::Service(e)) => {
                warn!(error = %e, "recognition service error");
                None
            }
        }
    }

    fn handle_command(&mut self, command: &str) -> Option<DispatchOutcome> {
        self.state.transition_to(ListeningState::Dispatching);
        let started = Instant::now();

        let outcome = self.dispatcher.dispatch(command)?;
        self.state.emit(AgentEvent::CommandDispatched {
            intent: outcome.intent.to_string(),
            action_taken: outcome.action_taken,
            succeeded: outcome.succeeded,
            duration_ms: started.elapsed().as_millis() as u64,
        });

        self.state.transition_to(ListeningState::Speaking);
        self.say(&outcome.response);
        Some(outcome)
    }

    fn say(&self, text: &str) {
        if let Err(e) = self.voice.speak(text) {
            error!(error = %e, "speech failed");
            self.state.emit(AgentEvent::SpeechFailed {
                error: e.to_string(),
            });
        }
    }
}
