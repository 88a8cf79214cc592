//! Reconciliation errors.

use thiserror::Error;

use crate::remote::{ErrorCode, RemoteError};

/// Errors that terminate a reconciliation pass.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A remote call failed permanently (or exhausted its retry deadline).
    #[error("could not {action} {target}: {source}")]
    Remote {
        action: &'static str,
        target: String,
        #[source]
        source: RemoteError,
    },

    /// Full enumeration finished without a conversation of that name.
    #[error("could not find channel with name {0}")]
    ChannelNotFound(String),

    /// No user group matched.
    #[error("could not find usergroup with {0}")]
    GroupNotFound(String),

    #[error("no user matches {0}")]
    UserNotFound(String),

    #[error("more than one user matches {0}")]
    AmbiguousUser(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl ReconcileError {
    pub fn remote(action: &'static str, target: &str, source: RemoteError) -> Self {
        ReconcileError::Remote {
            action,
            target: target.to_string(),
            source,
        }
    }

    /// The underlying remote error, if this failure came from a remote call.
    pub fn remote_error(&self) -> Option<&RemoteError> {
        match self {
            ReconcileError::Remote { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.remote_error(), Some(RemoteError::Cancelled))
    }
}

/// Attach operation context to a remote result.
pub(crate) trait RemoteResultExt<T> {
    fn during(self, action: &'static str, target: &str) -> Result<T, ReconcileError>;

    /// Treat the listed short codes as success.
    fn tolerating(self, benign: &[ErrorCode]) -> Result<Option<T>, RemoteError>;
}

impl<T> RemoteResultExt<T> for Result<T, RemoteError> {
    fn during(self, action: &'static str, target: &str) -> Result<T, ReconcileError> {
        self.map_err(|e| ReconcileError::remote(action, target, e))
    }

    fn tolerating(self, benign: &[ErrorCode]) -> Result<Option<T>, RemoteError> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(err) if benign.iter().any(|code| err.is_code(code)) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_failure_names_action_and_target() {
        let err = ReconcileError::remote(
            "kick user from conversation",
            "C1",
            RemoteError::api("cant_kick_from_general"),
        );
        assert_eq!(
            err.to_string(),
            "could not kick user from conversation C1: cant_kick_from_general"
        );
        assert_eq!(
            err.remote_error(),
            Some(&RemoteError::api("cant_kick_from_general"))
        );
    }

    #[test]
    fn tolerating_swallows_only_listed_codes() {
        let benign: Result<(), _> = Err(RemoteError::api("already_archived"));
        assert_eq!(benign.tolerating(&[ErrorCode::AlreadyArchived]), Ok(None));

        let other: Result<(), _> = Err(RemoteError::api("not_archived"));
        assert_eq!(
            other.tolerating(&[ErrorCode::AlreadyArchived]),
            Err(RemoteError::api("not_archived"))
        );

        let ok: Result<u8, RemoteError> = Ok(7);
        assert_eq!(ok.tolerating(&[ErrorCode::AlreadyArchived]), Ok(Some(7)));
    }
}
