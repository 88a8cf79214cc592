//! User group lifecycle: create or adopt, read, update, disable.
//!
//! Groups are never deleted remotely. Disabling is the terminal state, and a
//! later create with the same name or handle adopts and re-enables the group.
use std::collections::BTreeSet;

use log::{debug, info, warn};

use crate::core::error::{ReconcileError, RemoteResultExt};
use crate::core::types::{DesiredGroup, GroupState, Reconciled};
use crate::remote::{
    types::{AccountId, GroupId, ListGroupsParams, RemoteGroup},
    ErrorCode, WorkspaceClient,
};
use crate::retry::RetryExecutor;

/// First group matching `predicate` in one listing.
pub async fn find<C, P>(
    client: &C,
    exec: &RetryExecutor,
    params: ListGroupsParams,
    predicate: P,
) -> Result<Option<RemoteGroup>, ReconcileError>
where
    C: WorkspaceClient + ?Sized,
    P: Fn(&RemoteGroup) -> bool,
{
    let groups = exec
        .execute("list usergroups", || client.list_groups(params))
        .await
        .during("list", "usergroups")?;
    Ok(groups.into_iter().find(|g| predicate(g)))
}

/// Create the group. On a name or handle conflict, adopt the existing group:
/// find it by name (disabled included), re-enable it, and normalize its
/// attributes.
///
/// Members are written only when declared and different from the group's.
pub async fn create_or_adopt<C: WorkspaceClient + ?Sized>(
    client: &C,
    exec: &RetryExecutor,
    desired: &DesiredGroup,
) -> Result<GroupId, ReconcileError> {
    let attrs = desired.attributes();
    let created = exec
        .execute("create usergroup", || client.create_group(&attrs))
        .await;

    let group = match created {
        Ok(group) => {
            info!("Created usergroup {} ({})", desired.name, group.id);
            group
        }
        Err(e)
            if e.is_code(&ErrorCode::NameAlreadyExists)
                || e.is_code(&ErrorCode::HandleAlreadyExists) =>
        {
            info!("Usergroup {} already exists ({e}), adopting it", desired.name);
            adopt(client, exec, desired).await?
        }
        Err(e) => return Err(ReconcileError::remote("create usergroup", &desired.name, e)),
    };

    if !desired.members.is_empty() {
        sync_members(client, exec, &group.id, &group.members, &desired.members).await?;
    }
    Ok(group.id)
}

async fn adopt<C: WorkspaceClient + ?Sized>(
    client: &C,
    exec: &RetryExecutor,
    desired: &DesiredGroup,
) -> Result<RemoteGroup, ReconcileError> {
    let existing = find(client, exec, ListGroupsParams::new(true, true), |g| {
        g.name == desired.name
    })
    .await?
    .ok_or_else(|| ReconcileError::GroupNotFound(format!("name: {}", desired.name)))?;

    exec.execute("enable usergroup", || client.enable_group(&existing.id))
        .await
        .tolerating(&[ErrorCode::AlreadyEnabled])
        .during("enable usergroup", &existing.id)?;

    let attrs = desired.attributes();
    let mut updated = exec
        .execute("update usergroup", || client.update_group(&existing.id, &attrs))
        .await
        .during("update usergroup", &existing.id)?;
    // the update response does not carry users
    updated.members = existing.members;
    Ok(updated)
}

/// Observe an enabled group with its members.
///
/// Returns [`Reconciled::Gone`] when no enabled group has that id.
pub async fn read<C: WorkspaceClient + ?Sized>(
    client: &C,
    exec: &RetryExecutor,
    group_id: &str,
) -> Result<Reconciled<GroupState>, ReconcileError> {
    match find(client, exec, ListGroupsParams::new(false, true), |g| g.id == group_id).await? {
        Some(group) => Ok(Reconciled::Present(group)),
        None => {
            warn!("Usergroup {group_id} not found among enabled groups, treating as gone");
            Ok(Reconciled::Gone)
        }
    }
}

/// Converge an existing group on `desired`.
///
/// Attributes and members are each written only when they differ.
pub async fn update<C: WorkspaceClient + ?Sized>(
    client: &C,
    exec: &RetryExecutor,
    group_id: &str,
    desired: &DesiredGroup,
) -> Result<Reconciled<()>, ReconcileError> {
    let current = match read(client, exec, group_id).await? {
        Reconciled::Present(group) => group,
        Reconciled::Gone => return Ok(Reconciled::Gone),
    };

    if desired.attributes_match(&current) {
        debug!("Usergroup {group_id} attributes already match");
    } else {
        let attrs = desired.attributes();
        exec.execute("update usergroup", || client.update_group(group_id, &attrs))
            .await
            .during("update usergroup", group_id)?;
        info!("Updated usergroup {group_id}");
    }

    sync_members(client, exec, group_id, &current.members, &desired.members).await?;
    Ok(Reconciled::Present(()))
}

/// Disable the group. A group that no longer exists counts as disabled.
pub async fn disable<C: WorkspaceClient + ?Sized>(
    client: &C,
    exec: &RetryExecutor,
    group_id: &str,
) -> Result<(), ReconcileError> {
    let disabled = exec
        .execute("disable usergroup", || client.disable_group(group_id))
        .await
        .tolerating(&[ErrorCode::NoSuchSubteam])
        .during("disable usergroup", group_id)?;
    if disabled.is_some() {
        info!("Disabled usergroup {group_id}");
    }
    Ok(())
}

/// Replace the member list when the live set differs from `desired`.
async fn sync_members<C: WorkspaceClient + ?Sized>(
    client: &C,
    exec: &RetryExecutor,
    group_id: &str,
    current: &[AccountId],
    desired: &BTreeSet<AccountId>,
) -> Result<(), ReconcileError> {
    let live: BTreeSet<&AccountId> = current.iter().collect();
    let wanted: BTreeSet<&AccountId> = desired.iter().collect();
    if live == wanted {
        debug!("Usergroup {group_id} members already match");
        return Ok(());
    }
    let users: Vec<AccountId> = desired.iter().cloned().collect();
    exec.execute("update usergroup members", || {
        client.update_group_members(group_id, &users)
    })
    .await
    .during("update members of usergroup", group_id)?;
    info!("Set {} member(s) on usergroup {group_id}", users.len());
    Ok(())
}
