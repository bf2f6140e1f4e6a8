//! Backend failure classification.
//!
//! Structured HTTP status codes are authoritative. Message matching is a
//! compatibility shim for transports that only surface error text; the
//! patterns follow what the common backends emit and are not a contract.

use gr_core::ErrorKind;
use serde::Serialize;

/// Result of a message-based classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classified {
    pub kind: ErrorKind,
    pub matched_pattern: &'static str,
}

/// Classify a structured HTTP status. Returns `None` for statuses this
/// table does not know, leaving the caller to fall back to the message.
pub fn classify_status(status: u16) -> Option<ErrorKind> {
    match status {
        429 | 529 => Some(ErrorKind::RateLimited),
        408 | 500 | 502 | 503 | 504 => Some(ErrorKind::TransientUnavailable),
        400 | 401 | 403 | 404 | 422 => Some(ErrorKind::Rejected),
        _ => None,
    }
}

const RATE_LIMIT_PATTERNS: &[&str] = &[
    "resource_exhausted",
    "resource exhausted",
    "rate_limit",
    "ratelimit",
    "rate limit",
    "quota exceeded",
    "insufficient_quota",
    "too many requests",
    "overloaded",
    "429",
    "529",
];

const TRANSIENT_PATTERNS: &[&str] = &[
    "service unavailable",
    "unavailable",
    "deadline exceeded",
    "timed out",
    "timeout",
    "connection reset",
    "connection refused",
    "bad gateway",
    "internal error",
    "503",
    "502",
    "504",
];

/// Check an error message for rate-limit or transient indicators.
///
/// Rate-limit patterns are checked first; within a list the first matching
/// pattern wins. Matching is case-insensitive.
pub fn classify_message(message: &str) -> Option<Classified> {
    let lower = message.to_ascii_lowercase();
    let lists = [
        (ErrorKind::RateLimited, RATE_LIMIT_PATTERNS),
        (ErrorKind::TransientUnavailable, TRANSIENT_PATTERNS),
    ];
    for (kind, patterns) in lists {
        if let Some(pattern) = patterns.iter().find(|p| lower.contains(*p)) {
            return Some(Classified {
                kind,
                matched_pattern: *pattern,
            });
        }
    }
    None
}
