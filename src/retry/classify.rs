use std::time::Duration;

use crate::remote::RemoteError;

/// Substrings that mark a failure as transient.
///
/// Matching is case-sensitive and deliberately narrow: a miss routes the error
/// to [`ErrorClass::Permanent`], which surfaces it instead of retrying.
pub const TRANSIENT_MARKERS: [&str; 9] = [
    "timeout",
    "connection refused",
    "network error",
    "temporary failure",
    "server error",
    "internal server error",
    "service unavailable",
    "bad gateway",
    "gateway timeout",
];

/// How the retry executor should react to a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The remote asked us to back off for the given duration.
    RateLimited(Duration),
    /// Worth retrying immediately while the deadline allows.
    Transient,
    /// Surface as-is.
    Permanent,
}

/// Classify a remote error. Total: every error maps to exactly one class.
pub fn classify(err: &RemoteError) -> ErrorClass {
    match err {
        RemoteError::RateLimited { retry_after } => ErrorClass::RateLimited(*retry_after),
        RemoteError::Cancelled => ErrorClass::Permanent,
        other => {
            let text = other.to_string();
            if TRANSIENT_MARKERS.iter().any(|m| text.contains(m)) {
                ErrorClass::Transient
            } else {
                ErrorClass::Permanent
            }
        }
    }
}
