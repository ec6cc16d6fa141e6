//! llama.cpp server completion backend

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{CompletionRequest, LanguageModel};
use crate::config::LlmConfig;
use crate::error::{Error, Result};

/// Body of `POST /completion`
#[derive(Serialize)]
struct CompletionBody<'a> {
    prompt: &'a str,
    n_predict: u32,
    temperature: f32,
    top_p: f32,
    stop: &'a [String],
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    content: String,
}

/// Talks to a running llama.cpp `server`
pub struct LlamaServer {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl LlamaServer {
    /// Connect and verify the model is available
    ///
    /// Fails with [`Error::ModelUnavailable`] when a configured model file is
    /// missing or the server does not report healthy.
    pub fn connect(cfg: &LlmConfig) -> Result<Self> {
        if let Some(path) = &cfg.model_path {
            if !path.exists() {
                return Err(Error::ModelUnavailable(format!(
                    "model file not found at {}",
                    path.display()
                )));
            }
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        let server = Self {
            client,
            endpoint: cfg.endpoint.trim_end_matches('/').to_string(),
        };

        server.health_check()?;
        info!(endpoint = %server.endpoint, "generation backend ready");
        Ok(server)
    }

    fn health_check(&self) -> Result<()> {
        let url = format!("{}/health", self.endpoint);
        let response = self.client.get(&url).send().map_err(|e| {
            Error::ModelUnavailable(format!("cannot reach {url}: {e}"))
        })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::ModelUnavailable(format!(
                "{url} returned {}",
                response.status()
            )))
        }
    }
}

impl LanguageModel for LlamaServer {
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = CompletionBody {
            prompt: &request.prompt,
            n_predict: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            stop: &request.stop,
            stream: false,
        };

        debug!(prompt_chars = request.prompt.len(), "sending completion request");
        let response = self
            .client
            .post(format!("{}/completion", self.endpoint))
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::Generation(format!("{status}: {body}")));
        }

        let result: CompletionResponse = response.json()?;
        Ok(result.content)
    }

    fn name(&self) -> &str {
        "llama-server"
    }
}
