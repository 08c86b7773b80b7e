//! Contact-center API error types

use serde::{Deserialize, Serialize};
use steadystate_core::CoreError;
use thiserror::Error;

/// Error class reported by the remote API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApiErrorCode {
    ResourceNotFound,
    ResourceConflict,
    InvalidRequest,
    Throttling,
    Internal,
}

impl std::fmt::Display for ApiErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiErrorCode::ResourceNotFound => write!(f, "ResourceNotFoundException"),
            ApiErrorCode::ResourceConflict => write!(f, "ResourceConflictException"),
            ApiErrorCode::InvalidRequest => write!(f, "InvalidRequestException"),
            ApiErrorCode::Throttling => write!(f, "ThrottlingException"),
            ApiErrorCode::Internal => write!(f, "InternalServiceException"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::ResourceNotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::ResourceConflict, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::InvalidRequest, message)
    }

    pub fn throttling(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::Throttling, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::Internal, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.code == ApiErrorCode::ResourceNotFound
    }

    /// Turn into an engine error, keeping "not found" distinct from every
    /// other failure
    pub fn classify(self, operation: &str, key: &str) -> CoreError {
        if self.is_not_found() {
            CoreError::NotFound {
                what: format!("{} ({})", key, operation),
                source: Some(Box::new(self)),
            }
        } else {
            CoreError::Api {
                operation: operation.to_string(),
                key: key.to_string(),
                source: Box::new(self),
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// `classify` for API call results
pub trait Classify<T> {
    fn classify(self, operation: &str, key: &str) -> steadystate_core::Result<T>;
}

impl<T> Classify<T> for Result<T> {
    fn classify(self, operation: &str, key: &str) -> steadystate_core::Result<T> {
        self.map_err(|e| e.classify(operation, key))
    }
}
