use async_trait::async_trait;
use gr_core::{EndpointId, ErrorKind, Turn};
use gr_scheduler::{classify_message, classify_status};
use gr_session::ExpectedShape;
use tokio_util::sync::CancellationToken;

/// One request as handed to a backend, already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendRequest {
    /// Optional caller instruction placed ahead of the conversation.
    pub system: Option<String>,
    pub turns: Vec<Turn>,
    pub shape: ExpectedShape,
}

/// Sends a request to one endpoint and returns the raw generated text.
///
/// Implementations should stop work promptly once `cancel` fires; the
/// orchestrator also drops the in-flight future when that happens.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        endpoint: &EndpointId,
        request: &BackendRequest,
        cancel: &CancellationToken,
    ) -> Result<String, TransportError>;
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Backend call timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Backend response envelope is invalid: {0}")]
    InvalidEnvelope(String),

    #[error("No credential configured for slot {0}")]
    MissingCredential(u32),

    #[error("Backend call cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Map to the failure taxonomy.
    ///
    /// A structured status wins. Error text is only consulted when the status
    /// is unknown or absent.
    pub fn classify(&self) -> ErrorKind {
        match self {
            Self::Status { status, body } => classify_status(*status)
                .or_else(|| classify_message(body).map(|c| c.kind))
                .unwrap_or(if *status >= 500 {
                    ErrorKind::TransientUnavailable
                } else {
                    ErrorKind::Rejected
                }),
            Self::Timeout | Self::Connect(_) => ErrorKind::TransientUnavailable,
            Self::InvalidEnvelope(_) => ErrorKind::MalformedResponse,
            Self::MissingCredential(_) => ErrorKind::Rejected,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Other(message) => classify_message(message)
                .map(|c| c.kind)
                .unwrap_or(ErrorKind::Rejected),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else {
            Self::Other(err.to_string())
        }
    }
}
