use shared::{
    domain::{Permission, ScreenKey},
    error::{ErrorCode, ErrorReport},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("no screen contract registered for '{0}'")]
    NotFound(ScreenKey),
    #[error("screen contract '{0}' is already registered")]
    DuplicateScreen(ScreenKey),
    #[error("permission '{permission}' is required for '{event}' on screen '{screen_key}'")]
    PermissionDenied {
        screen_key: ScreenKey,
        event: String,
        permission: Permission,
    },
}

impl ContractError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ContractError::NotFound(_) => ErrorCode::NotFound,
            ContractError::DuplicateScreen(_) => ErrorCode::Conflict,
            ContractError::PermissionDenied { .. } => ErrorCode::Forbidden,
        }
    }
}

#[derive(Debug, Error)]
pub enum MediatorError {
    #[error("no handler registered for {type_name}")]
    HandlerNotFound { type_name: &'static str },
    #[error("validation failed: {message}")]
    Validation {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("execution failed: {message}")]
    Execution {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("registration failed: {message}")]
    Registration { message: String },
}

impl MediatorError {
    pub fn handler_not_found<T: ?Sized>() -> Self {
        Self::HandlerNotFound {
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            source: None,
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps a handler failure once, keeping the original error as the source.
    pub fn execution_with(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Execution {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn registration(message: impl Into<String>) -> Self {
        Self::Registration {
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            MediatorError::HandlerNotFound { .. } => ErrorCode::NotFound,
            MediatorError::Validation { .. } => ErrorCode::Validation,
            MediatorError::Execution { .. } => ErrorCode::Internal,
            MediatorError::Registration { .. } => ErrorCode::Conflict,
        }
    }
}

impl From<&ContractError> for ErrorReport {
    fn from(value: &ContractError) -> Self {
        ErrorReport::new(value.code(), value.to_string())
    }
}

impl From<&MediatorError> for ErrorReport {
    fn from(value: &MediatorError) -> Self {
        ErrorReport::new(value.code(), value.to_string())
    }
}
