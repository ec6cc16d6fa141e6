//! In-memory doubles for the boundary traits

use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::actions::{ActionResult, Launcher, PowerAction, SystemActions, VolumeAction};
use crate::audio::{AudioClip, AudioSource, ListenParams, SAMPLE_RATE};
use crate::error::{Error, Result};
use crate::llm::{CompletionRequest, LanguageModel};
use crate::speech::{RecognizeError, Recognizer};
use crate::voice::{EngineFactory, SynthesisEngine, VoiceSettings};

/// Engines that record what they were asked to say
#[derive(Default)]
pub struct RecordingEngineFactory {
    spoken: Arc<Mutex<Vec<String>>>,
    created: Arc<AtomicUsize>,
}

impl RecordingEngineFactory {
    pub fn spoken(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.spoken)
    }

    pub fn created(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.created)
    }
}

struct RecordingEngine {
    spoken: Arc<Mutex<Vec<String>>>,
}

impl SynthesisEngine for RecordingEngine {
    fn say(&mut self, text: &str) -> Result<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

impl EngineFactory for RecordingEngineFactory {
    fn create(&self, _settings: &VoiceSettings) -> Result<Box<dyn SynthesisEngine>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingEngine {
            spoken: Arc::clone(&self.spoken),
        }))
    }
}

/// Engines whose first `n` utterances fail, counted across rebuilds
pub struct FailingEngineFactory {
    failures_left: Arc<AtomicUsize>,
    attempts: Arc<AtomicUsize>,
}

impl FailingEngineFactory {
    pub fn new(failures: usize) -> Self {
        Self {
            failures_left: Arc::new(AtomicUsize::new(failures)),
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn attempts(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.attempts)
    }
}

struct FailingEngine {
    failures_left: Arc<AtomicUsize>,
    attempts: Arc<AtomicUsize>,
}

impl SynthesisEngine for FailingEngine {
    fn say(&mut self, _text: &str) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            Err(Error::Tts("scripted failure".to_string()))
        } else {
            Ok(())
        }
    }
}

impl EngineFactory for FailingEngineFactory {
    fn create(&self, _settings: &VoiceSettings) -> Result<Box<dyn SynthesisEngine>> {
        Ok(Box::new(FailingEngine {
            failures_left: Arc::clone(&self.failures_left),
            attempts: Arc::clone(&self.attempts),
        }))
    }
}

/// Language model with a fixed reply, or one that always fails
pub struct ScriptedModel {
    reply: Option<String>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedModel {
    pub fn reply(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            prompts: Arc::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            prompts: Arc::default(),
        }
    }

    pub fn prompts(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.prompts)
    }
}

impl LanguageModel for ScriptedModel {
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        self.reply
            .clone()
            .ok_or_else(|| Error::Generation("scripted failure".to_string()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Action providers that record `method:argument` calls
#[derive(Default)]
pub struct MockActions {
    fail: bool,
    calls: Mutex<Vec<String>>,
}

impl MockActions {
    /// Every call reports `"<method> failed"`
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, method: &str, argument: Option<String>) -> ActionResult {
        let entry = match argument {
            Some(arg) => format!("{method}:{arg}"),
            None => method.to_string(),
        };
        self.calls.lock().unwrap().push(entry);
        if self.fail {
            ActionResult::failed(format!("{method} failed"))
        } else {
            ActionResult::ok(format!("{method} ok"))
        }
    }
}

impl SystemActions for MockActions {
    fn open_target(&self, target: &str) -> ActionResult {
        self.record("open_target", Some(target.to_string()))
    }

    fn open_url(&self, url: &str) -> ActionResult {
        self.record("open_url", Some(url.to_string()))
    }

    fn system_info(&self) -> ActionResult {
        self.record("system_info", None)
    }

    fn screenshot(&self) -> ActionResult {
        self.record("screenshot", None)
    }

    fn list_files(&self, dir: Option<&Path>) -> ActionResult {
        self.record("list_files", dir.map(|d| d.display().to_string()))
    }

    fn volume(&self, action: VolumeAction) -> ActionResult {
        self.record("volume", Some(format!("{action:?}")))
    }

    fn power(&self, action: PowerAction) -> ActionResult {
        self.record("power", Some(format!("{action:?}")))
    }

    fn create_file(&self, name: &str, _content: &str) -> ActionResult {
        self.record("create_file", Some(name.to_string()))
    }

    fn send_keystroke(&self, keys: &[String]) -> ActionResult {
        self.record("send_keystroke", Some(keys.join("+")))
    }
}

pub type LaunchCalls = Arc<Mutex<Vec<(String, Vec<String>)>>>;

/// Launcher that records programs instead of starting them
#[derive(Default)]
pub struct RecordingLauncher {
    calls: LaunchCalls,
    fail: bool,
}

impl RecordingLauncher {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> LaunchCalls {
        Arc::clone(&self.calls)
    }
}

impl Launcher for RecordingLauncher {
    fn spawn(&self, program: &str, args: &[String]) -> io::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((program.to_string(), args.to_vec()));
        if self.fail {
            Err(io::Error::other("scripted launch failure"))
        } else {
            Ok(())
        }
    }

    fn run(&self, program: &str, args: &[String]) -> io::Result<()> {
        self.spawn(program, args)
    }

    fn browse(&self, url: &str) -> io::Result<()> {
        self.spawn("browser", &[url.to_string()])
    }
}

/// Audio source replaying a fixed sequence of listen results
///
/// Once the script runs out every listen returns `Ok(None)` and, if a stop
/// flag was given, clears it so a running loop winds down.
pub struct ScriptedAudio {
    script: VecDeque<Result<Option<AudioClip>>>,
    listens: Arc<Mutex<Vec<ListenParams>>>,
    cues: Arc<AtomicUsize>,
    calibrations: Arc<AtomicUsize>,
    running: Option<Arc<AtomicBool>>,
}

impl ScriptedAudio {
    pub fn new(script: Vec<Result<Option<AudioClip>>>) -> Self {
        Self {
            script: script.into(),
            listens: Arc::default(),
            cues: Arc::default(),
            calibrations: Arc::default(),
            running: None,
        }
    }

    pub fn stop_when_exhausted(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = Some(running);
        self
    }

    /// A clip with some speech in it
    pub fn speech() -> Result<Option<AudioClip>> {
        Ok(Some(AudioClip::new(vec![0.1; 1600], SAMPLE_RATE)))
    }

    pub fn listens(&self) -> Arc<Mutex<Vec<ListenParams>>> {
        Arc::clone(&self.listens)
    }

    pub fn cues(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.cues)
    }

    pub fn calibrations(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calibrations)
    }
}

impl AudioSource for ScriptedAudio {
    fn calibrate(&mut self, _duration: Duration) -> Result<()> {
        self.calibrations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn listen(&mut self, params: &ListenParams) -> Result<Option<AudioClip>> {
        self.listens.lock().unwrap().push(*params);
        match self.script.pop_front() {
            Some(next) => next,
            None => {
                if let Some(running) = &self.running {
                    running.store(false, Ordering::SeqCst);
                }
                Ok(None)
            }
        }
    }

    fn play_cue(&mut self) -> Result<()> {
        self.cues.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Recognizer replaying fixed transcripts; `NotUnderstood` once exhausted
pub struct ScriptedRecognizer {
    script: Mutex<VecDeque<std::result::Result<String, RecognizeError>>>,
}

impl ScriptedRecognizer {
    pub fn new(script: Vec<std::result::Result<String, RecognizeError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
        }
    }

    /// Recognizer that hears each transcript in turn
    pub fn hearing(transcripts: &[&str]) -> Self {
        Self::new(transcripts.iter().map(|t| Ok(t.to_string())).collect())
    }
}

impl Recognizer for ScriptedRecognizer {
    fn recognize(&self, _clip: &AudioClip) -> std::result::Result<String, RecognizeError> {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(RecognizeError::NotUnderstood))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
