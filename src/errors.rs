use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No collection selected for {0}")]
    MissingCollection(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Index error: {0}")]
    IndexError(String),

    #[error("{operation} failed: {message}")]
    RemoteOperationFailed { operation: String, message: String, code: Option<i32> },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid instance name given: {0}")]
    InvalidInstance(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

impl BuilderError {
    /// Wraps a collaborator failure, tagging it with the operation that raised it.
    pub fn remote(operation: &str, err: StoreError) -> Self {
        Self::RemoteOperationFailed {
            operation: operation.to_string(),
            message: err.message,
            code: err.code,
        }
    }
}

/// Failure reported by a store collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StoreError {
    pub message: String,
    pub code: Option<i32>,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), code: None }
    }

    pub fn with_code(message: impl Into<String>, code: i32) -> Self {
        Self { message: message.into(), code: Some(code) }
    }
}

pub type Result<T, E = BuilderError> = std::result::Result<T, E>;
