//! Whisper-compatible HTTP transcription

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, error};

use super::{RecognizeError, Recognizer};
use crate::audio::AudioClip;
use crate::config::SttConfig;
use crate::error::{Error, Result};

/// Response from a Whisper transcription endpoint
#[derive(Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Transcribes clips through an OpenAI-style `/audio/transcriptions` endpoint
pub struct WhisperHttp {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    language: Option<String>,
}

impl WhisperHttp {
    /// Create a client for the configured endpoint
    pub fn new(cfg: &SttConfig) -> Result<Self> {
        if cfg.endpoint.trim().is_empty() {
            return Err(Error::Config("stt.endpoint must not be empty".to_string()));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: cfg.endpoint.clone(),
            model: cfg.model.clone(),
            api_key: cfg.api_key.clone().filter(|k| !k.is_empty()),
            language: cfg.language.clone(),
        })
    }
}

impl Recognizer for WhisperHttp {
    fn recognize(&self, clip: &AudioClip) -> std::result::Result<String, RecognizeError> {
        if clip.is_empty() {
            return Err(RecognizeError::NotUnderstood);
        }

        let wav = clip
            .to_wav()
            .map_err(|e| RecognizeError::Service(e.to_string()))?;
        debug!(audio_bytes = wav.len(), "starting transcription");

        let part = reqwest::blocking::multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| RecognizeError::Service(e.to_string()))?;
        let mut form = reqwest::blocking::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone());
        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().map_err(|e| {
            error!(error = %e, "transcription request failed");
            RecognizeError::Service(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(RecognizeError::Service(format!("{status}: {body}")));
        }

        let result: WhisperResponse = response
            .json()
            .map_err(|e| RecognizeError::Service(e.to_string()))?;

        transcript_or_not_understood(&result.text)
    }

    fn name(&self) -> &str {
        "whisper-http"
    }
}

/// Whisper returns empty or punctuation-only text for noise
fn transcript_or_not_understood(text: &str) -> std::result::Result<String, RecognizeError> {
    let trimmed = text.trim();
    if trimmed.chars().any(char::is_alphanumeric) {
        Ok(trimmed.to_string())
    } else {
        Err(RecognizeError::NotUnderstood)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_transcript_not_understood() {
        assert_eq!(
            transcript_or_not_understood("  "),
            Err(RecognizeError::NotUnderstood)
        );
        assert_eq!(
            transcript_or_not_understood(" ... "),
            Err(RecognizeError::NotUnderstood)
        );
        assert_eq!(
            transcript_or_not_understood(" Open downloads. "),
            Ok("Open downloads.".to_string())
        );
    }

    #[test]
    fn test_empty_clip_skips_request() {
        let recognizer = WhisperHttp::new(&SttConfig::default()).unwrap();
        let result = recognizer.recognize(&AudioClip::default());
        assert_eq!(result, Err(RecognizeError::NotUnderstood));
    }

    #[test]
    fn test_rejects_empty_endpoint() {
        let cfg = SttConfig {
            endpoint: String::new(),
            ..SttConfig::default()
        };
        assert!(WhisperHttp::new(&cfg).is_err());
    }
}
