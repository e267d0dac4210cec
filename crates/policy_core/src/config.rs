use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const DEFAULT_DOCS_DIR: &str = "data/policies";
pub const DEFAULT_PERSIST_DIR: &str = "vector_db";
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
/// Ollama's packaging of all-MiniLM-L6-v2.
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";
pub const DEFAULT_LLM_MODEL: &str = "llama2:latest";
pub const DEFAULT_CHUNK_SIZE: usize = 400;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;
pub const DEFAULT_TOP_K: usize = 15;
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";
pub const DEFAULT_ANSWER_TIMEOUT_SECS: u64 = 120;

/// Every tunable of the pipeline. Built once at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    pub docs_dir: PathBuf,
    pub persist_dir: PathBuf,
    pub ollama_url: String,
    pub embedding_model: String,
    pub llm_model: String,
    pub temperature: f32,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub bind_addr: String,
    pub answer_timeout_secs: u64,
    /// Reopen the persisted vector store instead of rebuilding it.
    pub reuse_index: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            docs_dir: PathBuf::from(DEFAULT_DOCS_DIR),
            persist_dir: PathBuf::from(DEFAULT_PERSIST_DIR),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            temperature: 0.0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            answer_timeout_secs: DEFAULT_ANSWER_TIMEOUT_SECS,
            reuse_index: false,
        }
    }
}

impl Settings {
    pub fn answer_timeout(&self) -> Duration {
        Duration::from_secs(self.answer_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.chunk_size == 0 {
            return Err(AppError::new("CONFIG_INVALID", "chunk_size must be positive"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::new(
                "CONFIG_INVALID",
                "chunk_overlap must be smaller than chunk_size",
            )
            .with_details(format!(
                "chunk_size={}; chunk_overlap={}",
                self.chunk_size, self.chunk_overlap
            )));
        }
        if self.top_k == 0 {
            return Err(AppError::new("CONFIG_INVALID", "top_k must be positive"));
        }
        if self.embedding_model.trim().is_empty() || self.llm_model.trim().is_empty() {
            return Err(AppError::new("CONFIG_INVALID", "Model names must not be empty"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(AppError::new("CONFIG_INVALID", "temperature must be within 0..=2")
                .with_details(format!("temperature={}", self.temperature)));
        }
        if self.answer_timeout_secs == 0 {
            return Err(AppError::new("CONFIG_INVALID", "answer timeout must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_pipeline_constants() {
        let s = Settings::default();
        assert_eq!(s.chunk_size, 400);
        assert_eq!(s.chunk_overlap, 50);
        assert_eq!(s.top_k, 15);
        assert_eq!(s.temperature, 0.0);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        let s = Settings {
            chunk_size: 50,
            chunk_overlap: 50,
            ..Settings::default()
        };
        let err = s.validate().unwrap_err();
        assert_eq!(err.code, "CONFIG_INVALID");
    }
}
