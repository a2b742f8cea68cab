use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Missing field `{field}` for action {action}")]
    MissingField { action: String, field: &'static str },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Queue is full ({0} pending operations)")]
    QueueFull(usize),

    #[error("Operation not found: {0}")]
    NotFound(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Browser operation failed: {0}")]
    OperationFailed(String),

    #[error("Browser bridge error: {0}")]
    Bridge(String),

    #[error("Relay transport error: {0}")]
    Transport(String),

    #[error("Relay rejected request: {0}")]
    Rejected(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// True for errors caused by the caller's input rather than the relay itself.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RelayError::UnknownAction(_)
                | RelayError::MissingField { .. }
                | RelayError::InvalidArgument(_)
                | RelayError::UnsupportedOperation(_)
        )
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        RelayError::Transport(err.to_string())
    }
}
