use thiserror::Error;

use crate::task::TaskId;

/// Failures reported by the hosted backend or the transport to it.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("task {0} not found")]
    NotFound(TaskId),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("{0}")]
    Auth(String),
}

impl BackendError {
    /// Message suitable for showing inline on the auth form.
    pub fn user_message(&self) -> String {
        match self {
            BackendError::Status { message, .. } | BackendError::Auth(message) => message.clone(),
            _ => "An unexpected error occurred".to_string(),
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing config value: {0}")]
    Missing(&'static str),
}
