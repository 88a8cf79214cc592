//! Records exchanged with the workspace API.
//!
//! These are point-in-time snapshots. Any successful mutation invalidates
//! them; refetch before basing a second mutation on one.
use serde::{Deserialize, Serialize};

/// Page size used for every cursor-paginated listing.
///
/// The API accepts up to 1000 but recommends staying at or below 200.
pub const PAGE_LIMIT: usize = 200;

pub type AccountId = String;
pub type ConversationId = String;
pub type GroupId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemoteConversation {
    pub id: ConversationId,
    pub name: String,
    pub topic: String,
    pub purpose: String,
    pub created: i64,
    pub creator: AccountId,
    pub is_archived: bool,
    pub is_private: bool,
    pub is_shared: bool,
    pub is_ext_shared: bool,
    pub is_org_shared: bool,
    pub is_general: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemoteGroup {
    pub id: GroupId,
    pub name: String,
    pub handle: String,
    pub description: String,
    pub channels: Vec<ConversationId>,
    pub members: Vec<AccountId>,
    pub enabled: bool,
}

/// Visibility class used to filter conversation listings server-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversationType {
    PublicChannel,
    PrivateChannel,
}

impl ConversationType {
    pub fn for_privacy(is_private: bool) -> Self {
        if is_private {
            ConversationType::PrivateChannel
        } else {
            ConversationType::PublicChannel
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationType::PublicChannel => "public_channel",
            ConversationType::PrivateChannel => "private_channel",
        }
    }
}

/// One page of a cursor-paginated listing.
///
/// An empty `next_cursor` means the listing is exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: String,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: String::new(),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.next_cursor.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConversation {
    pub name: String,
    pub is_private: bool,
}

impl NewConversation {
    pub fn new(name: &str, is_private: bool) -> Self {
        Self {
            name: name.to_string(),
            is_private,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListConversationsParams {
    pub cursor: String,
    pub limit: usize,
    /// Empty means the API default (public channels only).
    pub types: Vec<ConversationType>,
    pub exclude_archived: bool,
}

impl Default for ListConversationsParams {
    fn default() -> Self {
        Self {
            cursor: String::new(),
            limit: PAGE_LIMIT,
            types: Vec::new(),
            exclude_archived: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListMembersParams {
    pub channel_id: ConversationId,
    pub cursor: String,
    pub limit: usize,
}

impl ListMembersParams {
    pub fn new(channel_id: &str) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            cursor: String::new(),
            limit: PAGE_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListUsersParams {
    pub cursor: String,
    pub limit: usize,
}

impl Default for ListUsersParams {
    fn default() -> Self {
        Self {
            cursor: String::new(),
            limit: PAGE_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListGroupsParams {
    pub include_disabled: bool,
    pub include_users: bool,
}

impl ListGroupsParams {
    pub fn new(include_disabled: bool, include_users: bool) -> Self {
        Self {
            include_disabled,
            include_users,
        }
    }
}

/// Attributes sent on user group create/update. `None` leaves a field as is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GroupAttributes {
    pub name: Option<String>,
    pub handle: Option<String>,
    pub description: Option<String>,
    pub channels: Option<Vec<ConversationId>>,
}
