//! Reconciliation building blocks.
//!
//! Every function here takes a [`WorkspaceClient`](crate::remote::WorkspaceClient)
//! and a [`RetryExecutor`](crate::retry::RetryExecutor), and routes each remote
//! call through the executor. None of them keep state between calls.
//!
//! # Key Components
//!
//! - [`resolver`] - find a conversation by name over the paginated listing
//! - [`membership`] - join, kick, invite against an observed member list
//! - [`conversation`] / [`usergroup`] - create or adopt, read, update, destroy
//! - [`lookup`] - read-only queries for accounts, conversations, groups
//!
//! Benign short codes (`already_in_channel`, `already_archived`, ...) are
//! swallowed at the call site that expects them, never by the executor.

pub mod conversation;
mod error;
pub mod lookup;
pub mod membership;
pub mod resolver;
mod types;
pub mod usergroup;

pub use error::ReconcileError;
pub use lookup::{ConversationQuery, GroupQuery};
pub use membership::MembershipPlan;
pub use types::{
    ActionOnDestroy, ConversationState, DesiredConversation, DesiredGroup, Enforcement,
    GroupState, Reconciled,
};
