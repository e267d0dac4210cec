use serde::{Deserialize, Serialize};
use std::fmt;

/// Single structured error shape used across the pipeline and exposed over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
}

/// Coarse error taxonomy, derived from the code prefix.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Bad policy directory or file.
    Load,
    /// Embedding or vector store failure.
    Index,
    /// Language-model call failure.
    Inference,
    /// Malformed input.
    Validation,
    Config,
    Internal,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn category(&self) -> ErrorCategory {
        let code = self.code.as_str();
        if code.starts_with("LOAD_") {
            ErrorCategory::Load
        } else if code.starts_with("INDEX_") {
            ErrorCategory::Index
        } else if code.starts_with("INFERENCE_") {
            ErrorCategory::Inference
        } else if code.starts_with("VALIDATION_") {
            ErrorCategory::Validation
        } else if code.starts_with("CONFIG_") {
            ErrorCategory::Config
        } else {
            ErrorCategory::Internal
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(d) = self.details.as_deref() {
            write!(f, " ({d})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}
