//! Error taxonomy for model loading, inference and retraining

use std::path::PathBuf;
use thiserror::Error;

/// Who caused a failure, which decides the status reported to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Client-caused: malformed payloads and shape mismatches
    Validation,
    /// Server-side: missing model or a failing model call
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Validation => "validation",
            ErrorCategory::Internal => "internal",
        }
    }
}

#[derive(Debug, Error)]
pub enum ServingError {
    #[error("failed to load model from {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    #[error("{0}")]
    Shape(String),

    #[error("{0}")]
    Inference(String),

    #[error("{0}")]
    Retrain(String),

    /// A worker task died before producing a result
    #[error("{0}")]
    Internal(String),
}

impl ServingError {
    pub fn model_load(path: impl Into<PathBuf>, err: &anyhow::Error) -> Self {
        ServingError::ModelLoad {
            path: path.into(),
            reason: format!("{:#}", err),
        }
    }

    pub fn shape(message: impl Into<String>) -> Self {
        ServingError::Shape(message.into())
    }

    /// Wrap a backend failure from the model's predict call
    pub fn inference(err: anyhow::Error) -> Self {
        ServingError::Inference(format!("{:#}", err))
    }

    /// Wrap a backend failure from the model's fit call
    pub fn retrain(err: anyhow::Error) -> Self {
        ServingError::Retrain(format!("{:#}", err))
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ServingError::Shape(_) => ErrorCategory::Validation,
            ServingError::ModelLoad { .. }
            | ServingError::Inference(_)
            | ServingError::Retrain(_)
            | ServingError::Internal(_) => ErrorCategory::Internal,
        }
    }

    pub fn is_validation(&self) -> bool {
        self.category() == ErrorCategory::Validation
    }
}

pub type ServingResult<T> = std::result::Result<T, ServingError>;
