//! Reconciler: the entry point that owns a client and a retry executor.
//!
//! This is the application-level interface over the stateless functions in
//! [`crate::core`]. Each method is one logical operation; every remote call it
//! makes goes through the shared [`RetryExecutor`].

use std::{collections::BTreeSet, sync::Arc};

use log::info;
use tokio_util::sync::CancellationToken;

use crate::core::{
    conversation, lookup, membership, resolver, usergroup, ActionOnDestroy,
    ConversationQuery, ConversationState, DesiredConversation, DesiredGroup, Enforcement,
    GroupQuery, GroupState, MembershipPlan, ReconcileError, Reconciled,
};
use crate::remote::{
    types::{Account, AccountId, RemoteConversation, RemoteGroup},
    WorkspaceClient,
};
use crate::retry::{RetryConfig, RetryExecutor};

/// Drives desired state into a workspace.
///
/// Cloning is cheap; clones share the client and the cancellation token.
pub struct Reconciler<C: WorkspaceClient> {
    client: Arc<C>,
    exec: RetryExecutor,
}

impl<C: WorkspaceClient> Clone for Reconciler<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            exec: self.exec.clone(),
        }
    }
}

impl<C: WorkspaceClient> Reconciler<C> {
    pub fn new(client: Arc<C>, config: RetryConfig) -> Self {
        Self::with_executor(client, RetryExecutor::new(config))
    }

    pub fn with_executor(client: Arc<C>, exec: RetryExecutor) -> Self {
        Self { client, exec }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn executor(&self) -> &RetryExecutor {
        &self.exec
    }

    /// Cancelling this token aborts pending rate-limit waits and stops
    /// further attempts.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.exec.cancellation_token()
    }

    // ─────────────────────────── Conversations ───────────────────────────

    /// Create (or adopt) the conversation when `existing_id` is unset,
    /// otherwise converge the known one. Either way the result is read back.
    pub async fn reconcile_conversation(
        &self,
        desired: &DesiredConversation,
    ) -> Result<Reconciled<ConversationState>, ReconcileError> {
        let id = match &desired.existing_id {
            None => conversation::create(self.client(), &self.exec, desired).await?,
            Some(id) => match conversation::update(self.client(), &self.exec, id, desired).await? {
                Reconciled::Gone => return Ok(Reconciled::Gone),
                Reconciled::Present(()) => id.clone(),
            },
        };
        info!("Conversation {} reconciled as {id}", desired.name);
        conversation::read(self.client(), &self.exec, &id).await
    }

    pub async fn read_conversation(
        &self,
        channel_id: &str,
    ) -> Result<Reconciled<ConversationState>, ReconcileError> {
        conversation::read(self.client(), &self.exec, channel_id).await
    }

    pub async fn destroy_conversation(
        &self,
        channel_id: &str,
        action: ActionOnDestroy,
    ) -> Result<(), ReconcileError> {
        conversation::destroy(self.client(), &self.exec, channel_id, action).await
    }

    /// Membership-only pass against a known conversation.
    pub async fn reconcile_members(
        &self,
        channel_id: &str,
        desired: &BTreeSet<AccountId>,
        enforcement: Enforcement,
    ) -> Result<MembershipPlan, ReconcileError> {
        membership::reconcile_members(
            self.client(),
            &self.exec,
            channel_id,
            desired,
            &BTreeSet::new(),
            enforcement,
        )
        .await
    }

    /// Active conversation by exact name.
    pub async fn find_conversation(
        &self,
        name: &str,
        is_private: bool,
    ) -> Result<RemoteConversation, ReconcileError> {
        resolver::find_by_name(self.client(), &self.exec, name, is_private).await
    }

    // ─────────────────────────── User groups ───────────────────────────

    /// Create (or adopt) the group when `existing_id` is unset, otherwise
    /// converge the known one. Either way the result is read back.
    pub async fn reconcile_group(
        &self,
        desired: &DesiredGroup,
    ) -> Result<Reconciled<GroupState>, ReconcileError> {
        let id = match &desired.existing_id {
            None => usergroup::create_or_adopt(self.client(), &self.exec, desired).await?,
            Some(id) => match usergroup::update(self.client(), &self.exec, id, desired).await? {
                Reconciled::Gone => return Ok(Reconciled::Gone),
                Reconciled::Present(()) => id.clone(),
            },
        };
        info!("Usergroup {} reconciled as {id}", desired.name);
        usergroup::read(self.client(), &self.exec, &id).await
    }

    pub async fn read_group(
        &self,
        group_id: &str,
    ) -> Result<Reconciled<GroupState>, ReconcileError> {
        usergroup::read(self.client(), &self.exec, group_id).await
    }

    pub async fn disable_group(&self, group_id: &str) -> Result<(), ReconcileError> {
        usergroup::disable(self.client(), &self.exec, group_id).await
    }

    // ─────────────────────────── Lookups ───────────────────────────

    pub async fn user_by_email(&self, email: &str) -> Result<Account, ReconcileError> {
        lookup::user_by_email(self.client(), &self.exec, email).await
    }

    pub async fn user_by_name(&self, name: &str) -> Result<Account, ReconcileError> {
        lookup::user_by_name(self.client(), &self.exec, name).await
    }

    pub async fn conversation(
        &self,
        query: &ConversationQuery,
    ) -> Result<ConversationState, ReconcileError> {
        lookup::conversation(self.client(), &self.exec, query).await
    }

    pub async fn usergroup(&self, query: &GroupQuery) -> Result<RemoteGroup, ReconcileError> {
        lookup::usergroup(self.client(), &self.exec, query).await
    }
}
