use thiserror::Error;

/// Errors surfaced by the refund client.
///
/// Normalizer problems never show up here; they degrade to plain text instead.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Input rejected before any request was made.
    #[error("{0}")]
    Validation(String),

    /// The backend answered with a non-success status.
    #[error("Backend error: {status} {body}")]
    Backend { status: u16, body: String },

    /// Login rejected by the backend; carries the backend's `detail` verbatim.
    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    InvalidResponse(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FlowError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
