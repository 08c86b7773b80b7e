//! Engine error types

use std::time::Duration;
use thiserror::Error;

/// Boxed error returned by remote API clients
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while reconciling a resource
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("unexpected format of ID ({token}), expected {expected}")]
    MalformedIdentity { token: String, expected: String },

    #[error("{resource_type} has no identity; it was never created or has been removed")]
    MissingIdentity { resource_type: String },

    #[error("{what} not found")]
    NotFound {
        what: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error(
        "{key} did not stabilize after {elapsed:?} ({polls} polls); last observed: {}",
        .last_observed.as_deref().unwrap_or("nothing (not yet visible)")
    )]
    NotStable {
        key: String,
        elapsed: Duration,
        polls: u32,
        last_observed: Option<String>,
    },

    #[error("{operation} ({key}) was cancelled")]
    Cancelled { operation: String, key: String },

    #[error("{operation} ({key}) exceeded its deadline")]
    DeadlineExceeded { operation: String, key: String },

    #[error("{operation} ({key}): {source}")]
    Api {
        operation: String,
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("Invalid configuration: {0}")]
    Validation(String),

    #[error("changing {} requires replacing the resource", .fields.join(", "))]
    RequiresReplacement { fields: Vec<String> },

    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("State file error: {0}")]
    State(String),

    #[error("Lock acquisition failed: {0}")]
    Lock(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        CoreError::NotFound {
            what: what.into(),
            source: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation(message.into())
    }

    /// "No object exists for this key", as opposed to a failed read
    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::NotFound { .. })
    }

    /// Whether the host may retry the whole invocation later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::NotStable { .. } | CoreError::DeadlineExceeded { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
