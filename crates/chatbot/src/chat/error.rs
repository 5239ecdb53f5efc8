use sea_orm::DbErr;
use thiserror::Error;

/// Failures surfaced by the chat core to its callers.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("store error: {0}")]
    Store(#[from] DbErr),
    #[error("stored transcript is not valid JSON: {0}")]
    CorruptTranscript(#[from] serde_json::Error),
    #[error("background persist task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ChatError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }
}

/// Classified outcome of a failed model call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("provider is throttling requests: {0}")]
    RateLimited(String),
    #[error("conversation exceeds the provider context window: {0}")]
    ContextTooLarge(String),
    #[error("provider failure: {0}")]
    Provider(String),
    #[error("message is empty")]
    InvalidInput,
}
