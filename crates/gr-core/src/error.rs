use serde::{Deserialize, Serialize};

use crate::types::EndpointId;

/// Classification of every outcome a dispatch attempt can have.
///
/// `RateLimited`, `TransientUnavailable`, `MalformedResponse` and `Rejected`
/// are handled inside the orchestrator. Only `Cancelled` and
/// `ExhaustedAllEndpoints` ever reach a caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    RateLimited,
    TransientUnavailable,
    MalformedResponse,
    /// Backend refused the request for a non-retryable reason (auth, bad request).
    Rejected,
    Cancelled,
    ExhaustedAllEndpoints,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate-limited",
            Self::TransientUnavailable => "transient-unavailable",
            Self::MalformedResponse => "malformed-response",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::ExhaustedAllEndpoints => "exhausted-all-endpoints",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal dispatch failure surfaced to collaborators.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    #[error("Request cancelled by caller after trying {} endpoint(s)", .tried.len())]
    Cancelled { tried: Vec<EndpointId> },

    #[error("All endpoints exhausted after trying {} endpoint(s)", .tried.len())]
    ExhaustedAllEndpoints {
        tried: Vec<EndpointId>,
        /// Cooldown horizon; the natural moment for the caller to try again.
        retry_after_secs: u64,
    },
}

impl RouterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::ExhaustedAllEndpoints { .. } => ErrorKind::ExhaustedAllEndpoints,
        }
    }

    /// Endpoints on which a call was actually started, in chain order.
    pub fn tried(&self) -> &[EndpointId] {
        match self {
            Self::Cancelled { tried } | Self::ExhaustedAllEndpoints { tried, .. } => tried,
        }
    }

    /// HTTP status a collaborator should answer with.
    ///
    /// 499 follows the "client closed request" convention.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Cancelled { .. } => 499,
            Self::ExhaustedAllEndpoints { .. } => 503,
        }
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::Cancelled { .. } => None,
            Self::ExhaustedAllEndpoints {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
        }
    }

    /// User-facing message for the collaborator to render.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Cancelled { .. } => "Request was cancelled.",
            Self::ExhaustedAllEndpoints { .. } => {
                "The assistant is busy right now. Please try again shortly."
            }
        }
    }
}
