//! Read-only lookups for accounts, conversations, and user groups.
use log::debug;
use serde::{Deserialize, Serialize};

use crate::core::error::{ReconcileError, RemoteResultExt};
use crate::core::membership::list_all_members;
use crate::core::resolver;
use crate::core::types::ConversationState;
use crate::core::usergroup;
use crate::remote::{
    types::{Account, ListGroupsParams, ListUsersParams, RemoteGroup},
    ErrorCode, WorkspaceClient,
};
use crate::retry::RetryExecutor;

/// How to pick a single conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationQuery {
    Id(String),
    Name { name: String, is_private: bool },
}

/// How to pick a single enabled user group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupQuery {
    Id(String),
    Name(String),
}

pub async fn user_by_email<C: WorkspaceClient + ?Sized>(
    client: &C,
    exec: &RetryExecutor,
    email: &str,
) -> Result<Account, ReconcileError> {
    match exec
        .execute("lookup user by email", || client.lookup_user_by_email(email))
        .await
    {
        Ok(account) => Ok(account),
        Err(e) if e.is_code(&ErrorCode::UsersNotFound) => {
            Err(ReconcileError::UserNotFound(format!("email {email}")))
        }
        Err(e) => Err(ReconcileError::remote("look up user by email", email, e)),
    }
}

/// The single account whose user name is exactly `name`.
///
/// # Errors
/// [`ReconcileError::UserNotFound`] for zero matches,
/// [`ReconcileError::AmbiguousUser`] for more than one.
pub async fn user_by_name<C: WorkspaceClient + ?Sized>(
    client: &C,
    exec: &RetryExecutor,
    name: &str,
) -> Result<Account, ReconcileError> {
    let users = list_all_users(client, exec).await?;
    let mut matches = users.into_iter().filter(|u| u.name == name);
    match (matches.next(), matches.next()) {
        (Some(account), None) => Ok(account),
        (None, _) => Err(ReconcileError::UserNotFound(format!("name {name}"))),
        (Some(_), Some(_)) => Err(ReconcileError::AmbiguousUser(format!("name {name}"))),
    }
}

/// Every account in the workspace. Each page is its own retried operation,
/// so a rate limit on page N resumes at page N.
pub async fn list_all_users<C: WorkspaceClient + ?Sized>(
    client: &C,
    exec: &RetryExecutor,
) -> Result<Vec<Account>, ReconcileError> {
    let mut params = ListUsersParams::default();
    let mut users = Vec::new();
    loop {
        let page = exec
            .execute("list users", || client.list_users(&params))
            .await
            .during("list users", "of workspace")?;
        let exhausted = page.is_exhausted();
        users.extend(page.items);
        if exhausted {
            return Ok(users);
        }
        params.cursor = page.next_cursor;
    }
}

/// The matching conversation together with its full member list.
pub async fn conversation<C: WorkspaceClient + ?Sized>(
    client: &C,
    exec: &RetryExecutor,
    query: &ConversationQuery,
) -> Result<ConversationState, ReconcileError> {
    let conversation = match query {
        ConversationQuery::Id(id) => {
            if id.is_empty() {
                return Err(ReconcileError::InvalidQuery("empty conversation id".into()));
            }
            exec.execute("get conversation info", || client.conversation_info(id))
                .await
                .during("get info for conversation", id)?
        }
        ConversationQuery::Name { name, is_private } => {
            if name.is_empty() {
                return Err(ReconcileError::InvalidQuery("empty conversation name".into()));
            }
            resolver::find_by_name(client, exec, name, *is_private).await?
        }
    };
    let members = list_all_members(client, exec, &conversation.id).await?;
    Ok(ConversationState {
        conversation,
        members,
    })
}

/// Disabled groups are never returned.
pub async fn usergroup<C: WorkspaceClient + ?Sized>(
    client: &C,
    exec: &RetryExecutor,
    query: &GroupQuery,
) -> Result<RemoteGroup, ReconcileError> {
    let params = ListGroupsParams::new(false, true);
    let found = match query {
        GroupQuery::Id(id) => usergroup::find(client, exec, params, |g| &g.id == id).await?,
        GroupQuery::Name(name) => {
            usergroup::find(client, exec, params, |g| &g.name == name).await?
        }
    };
    debug!("Usergroup lookup {query:?} matched: {}", found.is_some());
    found.ok_or_else(|| {
        ReconcileError::GroupNotFound(match query {
            GroupQuery::Id(id) => format!("id: {id}"),
            GroupQuery::Name(name) => format!("name: {name}"),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::remote::memory::{MemoryWorkspace, Op};
    use crate::remote::types::RemoteConversation;
    use crate::remote::RemoteError;
    use crate::retry::RetryConfig;

    fn exec() -> RetryExecutor {
        RetryExecutor::new(RetryConfig::from_secs(5))
    }

    fn workspace() -> MemoryWorkspace {
        let ws = MemoryWorkspace::new("UAPI");
        ws.add_user("U1", "alice", Some("alice@example.com"));
        ws.add_user("U2", "bob", Some("bob@example.com"));
        ws.add_user("U3", "bob", None);
        ws
    }

    #[tokio::test]
    async fn user_by_email_maps_users_not_found() {
        let ws = workspace();
        let found = user_by_email(&ws, &exec(), "alice@example.com").await.unwrap();
        assert_eq!(found.id, "U1");

        let err = user_by_email(&ws, &exec(), "nobody@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::UserNotFound(_)));
    }

    #[tokio::test]
    async fn user_by_name_requires_exactly_one_match() {
        let ws = workspace();
        assert_eq!(user_by_name(&ws, &exec(), "alice").await.unwrap().id, "U1");
        assert!(matches!(
            user_by_name(&ws, &exec(), "bob").await.unwrap_err(),
            ReconcileError::AmbiguousUser(_)
        ));
        assert!(matches!(
            user_by_name(&ws, &exec(), "carol").await.unwrap_err(),
            ReconcileError::UserNotFound(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_user_page_resumes_at_that_page() {
        let ws = workspace();
        for i in 0..250 {
            ws.add_user(&format!("UX{i:03}"), &format!("user-{i}"), None);
        }
        ws.add_user("UZ", "zed", None);
        ws.succeed_next(Op::ListUsers);
        ws.fail_next(
            Op::ListUsers,
            RemoteError::RateLimited {
                retry_after: Duration::from_secs(1),
            },
        );

        let found = user_by_name(&ws, &exec(), "zed").await.unwrap();
        assert_eq!(found.id, "UZ");

        let cursors: Vec<String> = ws
            .calls_of(Op::ListUsers)
            .into_iter()
            .map(|c| c.target)
            .collect();
        assert_eq!(cursors, vec!["", "200", "200"]);
    }

    #[tokio::test]
    async fn usergroup_lookup_excludes_disabled() {
        let ws = workspace();
        let live = ws.add_group(RemoteGroup {
            name: "Oncall".into(),
            enabled: true,
            ..Default::default()
        });
        ws.add_group(RemoteGroup {
            name: "Retired".into(),
            enabled: false,
            ..Default::default()
        });

        let found = usergroup(&ws, &exec(), &GroupQuery::Name("Oncall".into()))
            .await
            .unwrap();
        assert_eq!(found.id, live);
        let by_id = usergroup(&ws, &exec(), &GroupQuery::Id(live.clone()))
            .await
            .unwrap();
        assert_eq!(by_id.name, "Oncall");
        assert!(matches!(
            usergroup(&ws, &exec(), &GroupQuery::Name("Retired".into()))
                .await
                .unwrap_err(),
            ReconcileError::GroupNotFound(_)
        ));
    }

    #[tokio::test]
    async fn conversation_query_rejects_empty_input() {
        let ws = workspace();
        let err = conversation(&ws, &exec(), &ConversationQuery::Id(String::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn conversation_by_name_and_id() {
        let ws = workspace();
        let id = ws.add_conversation(
            RemoteConversation {
                name: "general".into(),
                is_general: true,
                ..Default::default()
            },
            &["U1", "U2"],
        );
        let by_name = conversation(
            &ws,
            &exec(),
            &ConversationQuery::Name {
                name: "general".into(),
                is_private: false,
            },
        )
        .await
        .unwrap();
        assert_eq!(by_name.conversation.id, id);
        assert_eq!(by_name.members, vec!["U1", "U2"]);
        let by_id = conversation(&ws, &exec(), &ConversationQuery::Id(id.clone()))
            .await
            .unwrap();
        assert!(by_id.conversation.is_general);
    }
}
