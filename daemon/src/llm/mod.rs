//! Generative fallback for commands no rule recognizes
//!
//! Every call is single-turn: persona, current date and the verbatim
//! command. No conversation history is kept.

mod llama_server;

use chrono::{Local, NaiveDate};
use tracing::{debug, error};

use crate::config::LlmConfig;
use crate::error::Result;

pub use llama_server::LlamaServer;

/// Spoken when the model fails for any reason
pub const FALLBACK_REPLY: &str = "Sorry, I'm having trouble processing that. Try again?";

/// Turn markers that end a completion
pub const STOP_MARKERS: [&str; 2] = ["<|user|>", "<|system|>"];

/// One completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub stop: Vec<String>,
}

/// Trait for text generation backends
pub trait LanguageModel: Send + Sync {
    fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Human-readable name for logs
    fn name(&self) -> &str;
}

/// Builds prompts and absorbs model failures
pub struct GenerativeFallback {
    model: Box<dyn LanguageModel>,
    persona: String,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

impl GenerativeFallback {
    pub fn new(model: Box<dyn LanguageModel>, cfg: &LlmConfig) -> Self {
        Self {
            model,
            persona: cfg.persona.clone(),
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
            top_p: cfg.top_p,
        }
    }

    /// Single-turn prompt in the model's turn markup
    pub fn build_prompt(&self, command: &str, today: NaiveDate) -> String {
        format!(
            "<|system|>{} Current date: {}.<|user|>{}<|assistant|>",
            self.persona,
            today.format("%Y-%m-%d"),
            command
        )
    }

    pub fn request(&self, command: &str, today: NaiveDate) -> CompletionRequest {
        CompletionRequest {
            prompt: self.build_prompt(command, today),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            stop: STOP_MARKERS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Reply to `command`, never failing
    pub fn respond(&self, command: &str) -> String {
        let request = self.request(command, Local::now().date_naive());
        debug!(model = self.model.name(), "requesting completion");

        match self.model.complete(&request) {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    FALLBACK_REPLY.to_string()
                } else {
                    text.to_string()
                }
            }
            Err(e) => {
                error!(error = %e, "generation failed");
                FALLBACK_REPLY.to_string()
            }
        }
    }
}
