use std::path::PathBuf;

use serde_json::{json, Value};

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error in {}:{line}: {reason}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Invalid input. {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl AppError {
    pub fn parse(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        AppError::Parse {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }

    /// Query-time errors the console reports before prompting again.
    /// Everything else aborts the batch.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AppError::InvalidInput(_) | AppError::NotFound(_))
    }

    /// JSON body used when the console renders in JSON mode
    pub fn to_json(&self) -> Value {
        let (kind, message) = match self {
            AppError::InvalidInput(msg) => ("invalid_input", msg.clone()),
            AppError::NotFound(msg) => ("not_found", msg.clone()),
            AppError::Parse { .. } => ("parse", self.to_string()),
            AppError::Config(msg) => ("config", msg.clone()),
            AppError::Cancelled(msg) => ("cancelled", msg.clone()),
            AppError::Io(_) | AppError::Internal(_) => ("internal", self.to_string()),
        };

        json!({
            "error": message,
            "kind": kind,
        })
    }
}

pub type AppResult<T> = Result<T, AppError>;
