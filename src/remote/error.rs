use std::{fmt, time::Duration};

/// Machine-readable short codes returned by the workspace API.
///
/// Only codes some call site reacts to are named here. Anything else is kept
/// verbatim in [`ErrorCode::Other`] and treated as an ordinary failure. New
/// codes are added when they show up in practice, never speculatively.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The conversation id does not resolve (deleted, or never visible to us).
    ChannelNotFound,
    /// A conversation with that name already exists in the workspace.
    NameTaken,
    /// The account is already a member of the conversation.
    AlreadyInChannel,
    /// Join is not supported for this conversation type (e.g. private).
    MethodNotSupportedForChannelType,
    /// The account being removed is not a member of the conversation.
    NotInChannel,
    /// Archive requested on an archived conversation.
    AlreadyArchived,
    /// Unarchive requested on a conversation that is not archived.
    NotArchived,
    /// Mutation attempted on an archived conversation.
    IsArchived,
    /// A user group with that name already exists (enabled or not).
    NameAlreadyExists,
    /// A user group with that handle already exists (enabled or not).
    HandleAlreadyExists,
    /// Enable requested on an enabled user group.
    AlreadyEnabled,
    /// The user group id does not resolve.
    NoSuchSubteam,
    /// No account matches the lookup.
    UsersNotFound,
    /// Any code without a dedicated variant.
    Other(String),
}

impl ErrorCode {
    pub fn from_wire(code: &str) -> Self {
        match code {
            "channel_not_found" => ErrorCode::ChannelNotFound,
            "name_taken" => ErrorCode::NameTaken,
            "already_in_channel" => ErrorCode::AlreadyInChannel,
            "method_not_supported_for_channel_type" => {
                ErrorCode::MethodNotSupportedForChannelType
            }
            "not_in_channel" => ErrorCode::NotInChannel,
            "already_archived" => ErrorCode::AlreadyArchived,
            "not_archived" => ErrorCode::NotArchived,
            "is_archived" => ErrorCode::IsArchived,
            "name_already_exists" => ErrorCode::NameAlreadyExists,
            "handle_already_exists" => ErrorCode::HandleAlreadyExists,
            "already_enabled" => ErrorCode::AlreadyEnabled,
            "no_such_subteam" => ErrorCode::NoSuchSubteam,
            "users_not_found" => ErrorCode::UsersNotFound,
            other => ErrorCode::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::ChannelNotFound => "channel_not_found",
            ErrorCode::NameTaken => "name_taken",
            ErrorCode::AlreadyInChannel => "already_in_channel",
            ErrorCode::MethodNotSupportedForChannelType => "method_not_supported_for_channel_type",
            ErrorCode::NotInChannel => "not_in_channel",
            ErrorCode::AlreadyArchived => "already_archived",
            ErrorCode::NotArchived => "not_archived",
            ErrorCode::IsArchived => "is_archived",
            ErrorCode::NameAlreadyExists => "name_already_exists",
            ErrorCode::HandleAlreadyExists => "handle_already_exists",
            ErrorCode::AlreadyEnabled => "already_enabled",
            ErrorCode::NoSuchSubteam => "no_such_subteam",
            ErrorCode::UsersNotFound => "users_not_found",
            ErrorCode::Other(code) => code,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by a [`WorkspaceClient`](crate::remote::WorkspaceClient).
///
/// `Transport` payloads are free text from the HTTP stack. The retry layer
/// matches on that text to spot transient failures, so implementations should
/// pass the underlying message through rather than rewording it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RemoteError {
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },
    #[error("{0}")]
    Api(ErrorCode),
    #[error("{0}")]
    Transport(String),
    #[error("Failed to decode response: {0}")]
    Decode(String),
    #[error("context canceled")]
    Cancelled,
}

impl RemoteError {
    pub fn api(code: &str) -> Self {
        RemoteError::Api(ErrorCode::from_wire(code))
    }

    /// Short code carried by an API-level failure, if any.
    pub fn code(&self) -> Option<&ErrorCode> {
        match self {
            RemoteError::Api(code) => Some(code),
            _ => None,
        }
    }

    pub fn is_code(&self, code: &ErrorCode) -> bool {
        self.code() == Some(code)
    }
}
