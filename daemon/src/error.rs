//! Error types shared by the agent's collaborators

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur inside the agent
///
/// Action providers never surface these; they report failures through
/// `ActionResult` instead. Only audio, synthesis, generation and startup
/// paths use hard errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device or encoding error
    #[error("audio error: {0}")]
    Audio(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Generation backend error
    #[error("generation error: {0}")]
    Generation(String),

    /// Generation model missing or unreachable at startup
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
