use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    Forbidden,
    Validation,
    Conflict,
    Internal,
}

/// Failure as handed to a renderer, which picks its fallback UI from `code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorReport {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("malformed menu payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("duplicate menu key '{0}' within one sibling list")]
    DuplicateKey(String),
}

impl From<&PayloadError> for ErrorReport {
    fn from(value: &PayloadError) -> Self {
        Self::new(ErrorCode::Validation, value.to_string())
    }
}
