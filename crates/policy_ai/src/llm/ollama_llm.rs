use std::time::Duration;

use policy_core::error::AppError;
use serde::{Deserialize, Serialize};

use super::Llm;
use crate::ollama::{CallFailure, OllamaClient};

/// Non-streaming completions from Ollama's `/api/generate`.
#[derive(Debug, Clone)]
pub struct OllamaLlm {
    client: OllamaClient,
    temperature: f32,
    timeout: Duration,
}

impl OllamaLlm {
    /// Greedy decoding (temperature 0).
    pub fn new(client: OllamaClient, timeout: Duration) -> Self {
        Self {
            client,
            temperature: 0.0,
            timeout,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }
}

#[derive(Debug, Serialize)]
struct CompletionOptions {
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: CompletionOptions,
}

#[derive(Debug, Deserialize)]
struct CompletionReply {
    response: String,
}

fn inference_error(model: &str, timeout: Duration, failure: CallFailure) -> AppError {
    match failure {
        CallFailure::Timeout => AppError::new(
            "INFERENCE_TIMEOUT",
            "Language model did not answer in time",
        )
        .with_details(format!("model={model}; timeout_secs={}", timeout.as_secs())),
        other => AppError::new("INFERENCE_FAILED", "Language model request failed")
            .with_retryable(other.is_transient())
            .with_details(format!("model={model}; {other}")),
    }
}

impl Llm for OllamaLlm {
    fn generate(&self, model: &str, prompt: &str) -> Result<String, AppError> {
        let request = CompletionRequest {
            model,
            prompt,
            stream: false,
            options: CompletionOptions {
                temperature: self.temperature,
            },
        };
        let reply: CompletionReply = self
            .client
            .post_json("/api/generate", &request, self.timeout)
            .map_err(|f| inference_error(model, self.timeout, f))?;

        // The completion is returned verbatim, empty or not.
        Ok(reply.response)
    }
}
