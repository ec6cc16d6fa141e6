//! Configuration loading and management
//!
//! Defaults are overlaid by an optional TOML file and then by `ECHO_*`
//! environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Agent configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub wake: WakeConfig,
    pub capture: CaptureConfig,
    pub voice: VoiceConfig,
    pub llm: LlmConfig,
    pub stt: SttConfig,
    pub actions: ActionsConfig,
}

/// Wake-word listening
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WakeConfig {
    /// Wake phrase, matched as whole tokens
    pub phrase: String,
    /// Accepted near-homophones of the wake phrase
    pub variants: Vec<String>,
    /// Maximum length of one wake window in seconds
    pub phrase_limit_secs: f32,
    /// Pause between wake windows that did not contain the phrase
    pub debounce_ms: u64,
    /// Back-off after an audio device error
    pub error_backoff_ms: u64,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            phrase: "echo".to_string(),
            variants: vec!["eco".to_string(), "ecko".to_string()],
            phrase_limit_secs: 3.0,
            debounce_ms: 100,
            error_backoff_ms: 500,
        }
    }
}

/// Command capture after the wake phrase
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Ambient-noise calibration before each command capture
    pub calibration_secs: f32,
    /// How long to wait for speech to start
    pub timeout_secs: f32,
    /// Maximum command length
    pub phrase_limit_secs: f32,
    /// Silence that ends a phrase
    pub pause_secs: f32,
    /// Minimum RMS energy treated as speech
    pub energy_threshold: f32,
    /// Quiet period after a full command cycle
    pub cycle_cooldown_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            calibration_secs: 0.5,
            timeout_secs: 10.0,
            phrase_limit_secs: 15.0,
            pause_secs: 1.5,
            energy_threshold: 0.005,
            cycle_cooldown_ms: 1000,
        }
    }
}

/// Speech synthesis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Voice names in order of preference, matched case-insensitively
    pub preferred_voices: Vec<String>,
    /// Speaking rate in words per minute
    pub rate: u32,
    /// Volume in `0.0..=1.0`
    pub volume: f32,
    /// Pause after every utterance
    pub cooldown_ms: u64,
    /// Spoken once at startup
    pub greeting: Option<String>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            preferred_voices: vec!["Zira".to_string(), "Hazel".to_string(), "Susan".to_string()],
            rate: 170,
            volume: 0.9,
            cooldown_ms: 500,
            greeting: Some("Hello, I'm Echo. I have full system access. How can I help?".to_string()),
        }
    }
}

/// Generation backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of a llama.cpp-compatible completion server
    pub endpoint: String,
    /// Optional local model file that must exist before startup
    pub model_path: Option<PathBuf>,
    pub persona: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8080".to_string(),
            model_path: None,
            persona: "You are Echo, a friendly AI with full system access. Execute any command, \
                      open any file/folder/app, and perform any system task. Be concise and \
                      conversational."
                .to_string(),
            max_tokens: 500,
            temperature: 0.7,
            top_p: 0.95,
            timeout_secs: 120,
        }
    }
}

/// Speech-to-text backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// Whisper-compatible transcription endpoint
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub language: Option<String>,
    pub timeout_secs: u64,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/audio/transcriptions".to_string(),
            model: "whisper-1".to_string(),
            api_key: None,
            language: Some("en".to_string()),
            timeout_secs: 30,
        }
    }
}

/// OS action providers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionsConfig {
    /// Base directory for relative paths; defaults to the process cwd
    pub working_dir: Option<PathBuf>,
    /// Overrides the platform search locations used by "open"
    pub search_dirs: Option<Vec<PathBuf>>,
    pub volume_presses: u32,
    pub power_grace_secs: u32,
    pub list_limit: usize,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            working_dir: None,
            search_dirs: None,
            volume_presses: 5,
            power_grace_secs: 60,
            list_limit: 20,
        }
    }
}

impl Config {
    /// Load configuration from file, environment and defaults
    ///
    /// An explicitly requested file (argument or `ECHO_CONFIG`) must exist;
    /// the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("ECHO_CONFIG").map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Ok(toml::from_str(&raw)?)
    }

    /// Apply `ECHO_*` overrides from the given lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(phrase) = lookup("ECHO_WAKE_WORD") {
            self.wake.phrase = phrase;
        }
        if let Some(endpoint) = lookup("ECHO_LLM_ENDPOINT") {
            self.llm.endpoint = endpoint;
        }
        if let Some(path) = lookup("ECHO_MODEL_PATH") {
            self.llm.model_path = Some(PathBuf::from(path));
        }
        if let Some(endpoint) = lookup("ECHO_STT_ENDPOINT") {
            self.stt.endpoint = endpoint;
        }
        if let Some(key) = lookup("ECHO_STT_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.stt.api_key = Some(key);
        }
    }

    /// Reject values the agent cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.wake.phrase.trim().is_empty() {
            return Err(Error::Config("wake phrase must not be empty".to_string()));
        }
        for (name, secs) in [
            ("wake.phrase_limit_secs", self.wake.phrase_limit_secs),
            ("capture.timeout_secs", self.capture.timeout_secs),
            ("capture.phrase_limit_secs", self.capture.phrase_limit_secs),
        ] {
            if !(secs.is_finite() && secs > 0.0) {
                return Err(Error::Config(format!("{name} must be positive")));
            }
        }
        if !(0.0..=1.0).contains(&self.voice.volume) {
            return Err(Error::Config("voice.volume must be within 0.0..=1.0".to_string()));
        }
        if self.llm.max_tokens == 0 {
            return Err(Error::Config("llm.max_tokens must be positive".to_string()));
        }
        Ok(())
    }

    /// Base directory for relative action paths
    pub fn working_dir(&self) -> Result<PathBuf> {
        match &self.actions.working_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }
}

/// `<config_dir>/echo-agent/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("echo-agent").join("config.toml"))
}

/// Convert fractional seconds from config into a `Duration`
pub fn secs(value: f32) -> Duration {
    Duration::from_secs_f32(value.max(0.0))
}
