//! Speech-to-text boundary

mod whisper;

use crate::audio::AudioClip;

pub use whisper::WhisperHttp;

/// Why a clip produced no text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecognizeError {
    /// Audio held no intelligible speech; a normal negative, not a failure
    #[error("speech not understood")]
    NotUnderstood,

    /// The recognition service failed; transient
    #[error("recognition service error: {0}")]
    Service(String),
}

/// Trait for speech-to-text backends
pub trait Recognizer: Send {
    /// Transcribe one captured clip
    fn recognize(&self, clip: &AudioClip) -> Result<String, RecognizeError>;

    /// Human-readable name for logs
    fn name(&self) -> &str;
}
