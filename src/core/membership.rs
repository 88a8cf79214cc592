//! Conversation membership reconciliation.
//!
//! A pass observes the conversation and its members once, then mutates in a
//! fixed order: join, kick, invite. The creator and the calling account are
//! never kicked and never invited.
use std::collections::BTreeSet;

use log::{debug, info};

use crate::core::error::{ReconcileError, RemoteResultExt};
use crate::core::types::Enforcement;
use crate::remote::{
    types::{AccountId, ListMembersParams},
    ErrorCode, WorkspaceClient,
};
use crate::retry::RetryExecutor;

/// Mutations one membership pass will issue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipPlan {
    pub to_kick: Vec<AccountId>,
    pub to_invite: Vec<AccountId>,
}

impl MembershipPlan {
    pub fn is_empty(&self) -> bool {
        self.to_kick.is_empty() && self.to_invite.is_empty()
    }
}

/// Accounts that must stay in a conversation regardless of the desired set.
#[derive(Debug, Clone)]
pub struct Protected<'a> {
    pub creator: &'a str,
    pub caller: &'a str,
    pub extra: Option<&'a BTreeSet<AccountId>>,
}

impl Protected<'_> {
    fn is_implicit(&self, account: &str) -> bool {
        account == self.creator || account == self.caller
    }

    fn contains(&self, account: &str) -> bool {
        self.is_implicit(account) || self.extra.is_some_and(|extra| extra.contains(account))
    }
}

/// Compute kicks and invites from an observed member list.
///
/// - invite = desired − current − {creator, caller}
/// - kick (only under [`Enforcement::Kick`]) = current − desired − protected
///
/// Kicks keep the listing order, invites are sorted.
pub fn plan(
    current: &[AccountId],
    desired: &BTreeSet<AccountId>,
    protected: &Protected<'_>,
    enforcement: Enforcement,
) -> MembershipPlan {
    let present: BTreeSet<&str> = current.iter().map(String::as_str).collect();

    let to_invite = desired
        .iter()
        .filter(|a| !protected.is_implicit(a))
        .filter(|a| !present.contains(a.as_str()))
        .cloned()
        .collect();

    let mut to_kick: Vec<AccountId> = Vec::new();
    if enforcement == Enforcement::Kick {
        for account in current {
            if !desired.contains(account)
                && !protected.contains(account)
                && !to_kick.contains(account)
            {
                to_kick.push(account.clone());
            }
        }
    }

    MembershipPlan { to_kick, to_invite }
}

/// Every member of a conversation, walking all pages.
pub async fn list_all_members<C: WorkspaceClient + ?Sized>(
    client: &C,
    exec: &RetryExecutor,
    channel_id: &str,
) -> Result<Vec<AccountId>, ReconcileError> {
    let mut params = ListMembersParams::new(channel_id);
    let mut members = Vec::new();
    loop {
        let page = exec
            .execute("list conversation members", || client.list_members(&params))
            .await
            .during("list members of conversation", channel_id)?;
        members.extend(page.items);
        if page.next_cursor.is_empty() {
            break;
        }
        params.cursor = page.next_cursor;
    }
    Ok(members)
}

/// Bring the members of `channel_id` to `desired`.
///
/// The first failed kick aborts the pass before any invite is sent.
pub async fn reconcile_members<C: WorkspaceClient + ?Sized>(
    client: &C,
    exec: &RetryExecutor,
    channel_id: &str,
    desired: &BTreeSet<AccountId>,
    extra_protected: &BTreeSet<AccountId>,
    enforcement: Enforcement,
) -> Result<MembershipPlan, ReconcileError> {
    let conversation = exec
        .execute("get conversation info", || client.conversation_info(channel_id))
        .await
        .during("get info for conversation", channel_id)?;
    let caller = exec
        .execute("auth test", || client.auth_test())
        .await
        .during("identify caller for conversation", channel_id)?;
    let current = list_all_members(client, exec, channel_id).await?;

    let protected = Protected {
        creator: &conversation.creator,
        caller: &caller,
        extra: Some(extra_protected),
    };
    let plan = plan(&current, desired, &protected, enforcement);
    debug!(
        "Membership plan for {channel_id}: kick {:?}, invite {:?}",
        plan.to_kick, plan.to_invite
    );

    exec.execute("join conversation", || client.join_conversation(channel_id))
        .await
        .tolerating(&[
            ErrorCode::AlreadyInChannel,
            ErrorCode::MethodNotSupportedForChannelType,
        ])
        .during("join conversation", channel_id)?;

    for account in &plan.to_kick {
        let kicked = exec
            .execute("kick user from conversation", || {
                client.kick_from_conversation(channel_id, account)
            })
            .await
            .tolerating(&[ErrorCode::NotInChannel])
            .during("kick user from conversation", channel_id)?;
        if kicked.is_some() {
            info!("Removed {account} from conversation {channel_id}");
        }
    }

    if !plan.to_invite.is_empty() {
        exec.execute("invite users to conversation", || {
            client.invite_to_conversation(channel_id, &plan.to_invite)
        })
        .await
        .tolerating(&[ErrorCode::AlreadyInChannel])
        .during("invite users to conversation", channel_id)?;
        info!(
            "Invited {} user(s) to conversation {channel_id}",
            plan.to_invite.len()
        );
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<AccountId> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn set(list: &[&str]) -> BTreeSet<AccountId> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn protected<'a>(creator: &'a str, caller: &'a str) -> Protected<'a> {
        Protected {
            creator,
            caller,
            extra: None,
        }
    }

    #[test]
    fn kick_and_invite_against_observed_members() {
        let current = ids(&["A", "C", "CREATOR", "CALLER"]);
        let desired = set(&["A", "B"]);
        let plan = plan(
            &current,
            &desired,
            &protected("CREATOR", "CALLER"),
            Enforcement::Kick,
        );
        assert_eq!(plan.to_kick, ids(&["C"]));
        assert_eq!(plan.to_invite, ids(&["B"]));
    }

    #[test]
    fn no_enforcement_never_kicks() {
        let current = ids(&["A", "C"]);
        let plan = plan(
            &current,
            &set(&["A", "B"]),
            &protected("X", "Y"),
            Enforcement::None,
        );
        assert!(plan.to_kick.is_empty());
        assert_eq!(plan.to_invite, ids(&["B"]));
    }

    #[test]
    fn creator_and_caller_are_never_invited() {
        let plan = plan(
            &[],
            &set(&["CREATOR", "CALLER", "B"]),
            &protected("CREATOR", "CALLER"),
            Enforcement::Kick,
        );
        assert_eq!(plan.to_invite, ids(&["B"]));
    }

    #[test]
    fn extra_protected_members_stay_but_are_still_invited() {
        let extra = set(&["BOT", "AUDITOR"]);
        let p = Protected {
            creator: "CREATOR",
            caller: "CALLER",
            extra: Some(&extra),
        };
        let plan = plan(
            &ids(&["BOT", "STRAY"]),
            &set(&["AUDITOR"]),
            &p,
            Enforcement::Kick,
        );
        assert_eq!(plan.to_kick, ids(&["STRAY"]));
        assert_eq!(plan.to_invite, ids(&["AUDITOR"]));
    }

    #[test]
    fn converged_membership_yields_empty_plan() {
        let plan = plan(
            &ids(&["A", "B", "CALLER"]),
            &set(&["A", "B"]),
            &protected("CALLER", "CALLER"),
            Enforcement::Kick,
        );
        assert!(plan.is_empty());
    }

    #[test]
    fn duplicate_listing_entries_kick_once() {
        let plan = plan(
            &ids(&["Z", "Z"]),
            &BTreeSet::new(),
            &protected("X", "Y"),
            Enforcement::Kick,
        );
        assert_eq!(plan.to_kick, ids(&["Z"]));
    }
}
