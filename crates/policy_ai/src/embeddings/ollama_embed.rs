use std::time::Duration;

use policy_core::error::AppError;
use serde::{Deserialize, Serialize};

use super::Embedder;
use crate::ollama::OllamaClient;

/// Upper bound on bytes sent per embedding request.
const MAX_INPUT_BYTES: usize = 12_000;
const EMBED_TIMEOUT: Duration = Duration::from_secs(30);

/// Embeddings from Ollama's `/api/embeddings`.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: OllamaClient,
}

impl OllamaEmbedder {
    pub fn new(client: OllamaClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedReply {
    embedding: Vec<f32>,
}

fn truncate_on_char_boundary(input: &str, max_bytes: usize) -> &str {
    if input.len() <= max_bytes {
        return input;
    }
    let mut end = max_bytes;
    while !input.is_char_boundary(end) {
        end -= 1;
    }
    &input[..end]
}

impl Embedder for OllamaEmbedder {
    fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        let request = EmbedRequest {
            model,
            prompt: truncate_on_char_boundary(input, MAX_INPUT_BYTES),
        };
        let reply: EmbedReply = self
            .client
            .post_json("/api/embeddings", &request, EMBED_TIMEOUT)
            .map_err(|f| {
                AppError::new("INDEX_EMBEDDINGS_FAILED", "Embedding request failed")
                    .with_retryable(f.is_transient())
                    .with_details(format!("model={model}; {f}"))
            })?;

        if reply.embedding.is_empty() {
            return Err(AppError::new(
                "INDEX_EMBEDDINGS_FAILED",
                "Embedding model returned an empty vector",
            )
            .with_details(format!("model={model}")));
        }
        Ok(reply.embedding)
    }
}
