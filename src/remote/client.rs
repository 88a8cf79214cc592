//! The remote capability set the reconcilers are written against.
use async_trait::async_trait;

use crate::remote::{
    types::{
        Account, AccountId, GroupAttributes, ListConversationsParams, ListGroupsParams,
        ListMembersParams, ListUsersParams, NewConversation, Page, RemoteConversation,
        RemoteGroup,
    },
    RemoteError,
};

/// Authenticated handle to a collaboration workspace.
///
/// Every method is a single remote call. Implementations must not retry on
/// their own; retries belong to [`RetryExecutor`](crate::retry::RetryExecutor)
/// so that rate-limit budget is accounted for in one place.
#[async_trait]
pub trait WorkspaceClient: Send + Sync + 'static {
    // ─────────────────────────── Accounts ───────────────────────────

    async fn lookup_user_by_email(&self, email: &str) -> Result<Account, RemoteError>;

    /// One page of the workspace's accounts.
    async fn list_users(&self, params: &ListUsersParams) -> Result<Page<Account>, RemoteError>;

    /// Account id of the token's own user.
    async fn auth_test(&self) -> Result<AccountId, RemoteError>;

    // ─────────────────────────── Conversations ───────────────────────────

    async fn create_conversation(
        &self,
        params: NewConversation,
    ) -> Result<RemoteConversation, RemoteError>;

    async fn conversation_info(&self, channel_id: &str)
        -> Result<RemoteConversation, RemoteError>;

    async fn list_conversations(
        &self,
        params: &ListConversationsParams,
    ) -> Result<Page<RemoteConversation>, RemoteError>;

    async fn list_members(&self, params: &ListMembersParams)
        -> Result<Page<AccountId>, RemoteError>;

    async fn join_conversation(&self, channel_id: &str) -> Result<(), RemoteError>;

    async fn invite_to_conversation(
        &self,
        channel_id: &str,
        users: &[AccountId],
    ) -> Result<(), RemoteError>;

    async fn kick_from_conversation(&self, channel_id: &str, user: &str)
        -> Result<(), RemoteError>;

    async fn set_topic(&self, channel_id: &str, topic: &str) -> Result<(), RemoteError>;

    async fn set_purpose(&self, channel_id: &str, purpose: &str) -> Result<(), RemoteError>;

    async fn rename_conversation(&self, channel_id: &str, name: &str)
        -> Result<(), RemoteError>;

    async fn archive_conversation(&self, channel_id: &str) -> Result<(), RemoteError>;

    async fn unarchive_conversation(&self, channel_id: &str) -> Result<(), RemoteError>;

    // ─────────────────────────── User groups ───────────────────────────

    async fn create_group(&self, attrs: &GroupAttributes) -> Result<RemoteGroup, RemoteError>;

    async fn list_groups(&self, params: ListGroupsParams) -> Result<Vec<RemoteGroup>, RemoteError>;

    async fn update_group(
        &self,
        group_id: &str,
        attrs: &GroupAttributes,
    ) -> Result<RemoteGroup, RemoteError>;

    /// Replace the member list wholesale.
    async fn update_group_members(
        &self,
        group_id: &str,
        users: &[AccountId],
    ) -> Result<RemoteGroup, RemoteError>;

    async fn disable_group(&self, group_id: &str) -> Result<RemoteGroup, RemoteError>;

    async fn enable_group(&self, group_id: &str) -> Result<RemoteGroup, RemoteError>;
}
