use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Failures talking to the remote script endpoint.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RemoteError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP error! status: {0}")]
    Status(u16),
    #[error("Unreadable response: {0}")]
    Decode(String),
    #[error("Response body is opaque")]
    Opaque,
    #[error("{0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StorageError {
    #[error("Storage write failed for {key}: {reason}")]
    Write { key: String, reason: String },
    #[error("Storage serialization failed: {0}")]
    Serialize(String),
}

/// A single form field that failed local validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SubmissionError {
    #[error("Orders are currently disabled. Please try again later.")]
    OrdersDisabled,
    #[error("Please fix the highlighted fields: {}", join_fields(.0))]
    Validation(Vec<FieldError>),
    #[error("Screenshot upload failed. Please retry. ({0})")]
    Upload(RemoteError),
    #[error("Order could not be saved locally: {0}")]
    Storage(StorageError),
    #[error("Actor communication error: {0}")]
    ActorCommunicationError(String),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AdminError {
    #[error("Admin password is required")]
    PasswordRequired,
    #[error("{0}")]
    Rejected(String),
    #[error("Network error updating order status")]
    Network(RemoteError),
    #[error("Actor communication error: {0}")]
    ActorCommunicationError(String),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DeskError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Actor communication error: {0}")]
    ActorCommunicationError(String),
}

impl From<DeskError> for SubmissionError {
    fn from(err: DeskError) -> Self {
        match err {
            DeskError::Storage(e) => SubmissionError::Storage(e),
            DeskError::ActorCommunicationError(e) => SubmissionError::ActorCommunicationError(e),
        }
    }
}

impl From<DeskError> for AdminError {
    fn from(err: DeskError) -> Self {
        match err {
            DeskError::Storage(e) => AdminError::ActorCommunicationError(e.to_string()),
            DeskError::ActorCommunicationError(e) => AdminError::ActorCommunicationError(e),
        }
    }
}
