//! Conversation lifecycle: create or adopt, read, update, destroy.
use log::{debug, info, warn};

use crate::core::error::{ReconcileError, RemoteResultExt};
use crate::core::membership::{list_all_members, reconcile_members};
use crate::core::resolver::find_by_name_including_archived;
use crate::core::types::{ActionOnDestroy, ConversationState, DesiredConversation, Reconciled};
use crate::remote::{
    types::{ConversationId, NewConversation, RemoteConversation},
    ErrorCode, WorkspaceClient,
};
use crate::retry::RetryExecutor;

/// Observe a conversation and its full member list.
///
/// Returns [`Reconciled::Gone`] when the remote reports `channel_not_found`.
pub async fn read<C: WorkspaceClient + ?Sized>(
    client: &C,
    exec: &RetryExecutor,
    channel_id: &str,
) -> Result<Reconciled<ConversationState>, ReconcileError> {
    let conversation = match fetch_info(client, exec, channel_id).await? {
        Some(conversation) => conversation,
        None => return Ok(Reconciled::Gone),
    };
    let members = match list_all_members(client, exec, channel_id).await {
        Ok(members) => members,
        Err(e) if is_channel_not_found(&e) => return Ok(Reconciled::Gone),
        Err(e) => return Err(e),
    };
    Ok(Reconciled::Present(ConversationState {
        conversation,
        members,
    }))
}

/// Create the conversation, adopting a same-named one when allowed.
///
/// After creation the membership, topic, and purpose are applied, and the
/// conversation is archived last if so declared.
pub async fn create<C: WorkspaceClient + ?Sized>(
    client: &C,
    exec: &RetryExecutor,
    desired: &DesiredConversation,
) -> Result<ConversationId, ReconcileError> {
    let created = exec
        .execute("create conversation", || {
            client.create_conversation(NewConversation::new(&desired.name, desired.is_private))
        })
        .await;

    let conversation = match created {
        Ok(conversation) => {
            info!("Created conversation {} ({})", desired.name, conversation.id);
            conversation
        }
        Err(e) if e.is_code(&ErrorCode::NameTaken) && desired.adopt_existing => {
            info!("Conversation {} already exists, adopting it", desired.name);
            adopt(client, exec, desired).await?
        }
        Err(e) => return Err(ReconcileError::remote("create conversation", &desired.name, e)),
    };

    let id = conversation.id.clone();
    reconcile_members(
        client,
        exec,
        &id,
        &desired.members,
        &desired.protected_members,
        desired.enforcement,
    )
    .await?;
    apply_texts(client, exec, &conversation, desired).await?;

    if desired.is_archived {
        archive(client, exec, &id).await?;
    }
    Ok(id)
}

async fn adopt<C: WorkspaceClient + ?Sized>(
    client: &C,
    exec: &RetryExecutor,
    desired: &DesiredConversation,
) -> Result<RemoteConversation, ReconcileError> {
    let mut found =
        find_by_name_including_archived(client, exec, &desired.name, desired.is_private).await?;
    if found.is_archived {
        unarchive(client, exec, &found.id).await?;
        found.is_archived = false;
    }
    Ok(found)
}

/// Converge an existing conversation on `desired`.
///
/// Order: unarchive, rename, topic, purpose, members, archive. A conversation
/// that is archived and meant to stay archived is left untouched.
pub async fn update<C: WorkspaceClient + ?Sized>(
    client: &C,
    exec: &RetryExecutor,
    channel_id: &str,
    desired: &DesiredConversation,
) -> Result<Reconciled<()>, ReconcileError> {
    let current = match fetch_info(client, exec, channel_id).await? {
        Some(current) => current,
        None => return Ok(Reconciled::Gone),
    };

    if current.is_archived && desired.is_archived {
        debug!("Conversation {channel_id} is archived and stays archived");
        return Ok(Reconciled::Present(()));
    }
    if current.is_archived {
        unarchive(client, exec, channel_id).await?;
    }

    if current.name != desired.name {
        exec.execute("rename conversation", || {
            client.rename_conversation(channel_id, &desired.name)
        })
        .await
        .during("rename conversation", channel_id)?;
        info!("Renamed conversation {channel_id} to {}", desired.name);
    }

    apply_texts(client, exec, &current, desired).await?;

    reconcile_members(
        client,
        exec,
        channel_id,
        &desired.members,
        &desired.protected_members,
        desired.enforcement,
    )
    .await?;

    if desired.is_archived {
        archive(client, exec, channel_id).await?;
    }
    Ok(Reconciled::Present(()))
}

/// Apply the destroy action. Archiving tolerates a conversation that is
/// already archived or already gone.
pub async fn destroy<C: WorkspaceClient + ?Sized>(
    client: &C,
    exec: &RetryExecutor,
    channel_id: &str,
    action: ActionOnDestroy,
) -> Result<(), ReconcileError> {
    match action {
        ActionOnDestroy::None => {
            warn!("Conversation {channel_id} left in place on destroy (action_on_destroy = none)");
            Ok(())
        }
        ActionOnDestroy::Archive => {
            let archived = exec
                .execute("archive conversation", || client.archive_conversation(channel_id))
                .await
                .tolerating(&[ErrorCode::AlreadyArchived, ErrorCode::ChannelNotFound])
                .during("archive conversation", channel_id)?;
            if archived.is_some() {
                info!("Archived conversation {channel_id}");
            }
            Ok(())
        }
    }
}

/// Topic and purpose are only written when declared and different.
async fn apply_texts<C: WorkspaceClient + ?Sized>(
    client: &C,
    exec: &RetryExecutor,
    current: &RemoteConversation,
    desired: &DesiredConversation,
) -> Result<(), ReconcileError> {
    let id = current.id.as_str();
    if let Some(topic) = desired.topic.as_deref() {
        if topic != current.topic {
            exec.execute("set conversation topic", || client.set_topic(id, topic))
                .await
                .during("set topic for conversation", id)?;
        }
    }
    if let Some(purpose) = desired.purpose.as_deref() {
        if purpose != current.purpose {
            exec.execute("set conversation purpose", || client.set_purpose(id, purpose))
                .await
                .during("set purpose for conversation", id)?;
        }
    }
    Ok(())
}

async fn archive<C: WorkspaceClient + ?Sized>(
    client: &C,
    exec: &RetryExecutor,
    channel_id: &str,
) -> Result<(), ReconcileError> {
    exec.execute("archive conversation", || client.archive_conversation(channel_id))
        .await
        .tolerating(&[ErrorCode::AlreadyArchived])
        .during("archive conversation", channel_id)?;
    Ok(())
}

async fn unarchive<C: WorkspaceClient + ?Sized>(
    client: &C,
    exec: &RetryExecutor,
    channel_id: &str,
) -> Result<(), ReconcileError> {
    exec.execute("unarchive conversation", || client.unarchive_conversation(channel_id))
        .await
        .tolerating(&[ErrorCode::NotArchived])
        .during("unarchive conversation", channel_id)?;
    info!("Unarchived conversation {channel_id}");
    Ok(())
}

async fn fetch_info<C: WorkspaceClient + ?Sized>(
    client: &C,
    exec: &RetryExecutor,
    channel_id: &str,
) -> Result<Option<RemoteConversation>, ReconcileError> {
    match exec
        .execute("get conversation info", || client.conversation_info(channel_id))
        .await
    {
        Ok(conversation) => Ok(Some(conversation)),
        Err(e) if e.is_code(&ErrorCode::ChannelNotFound) => {
            warn!("Conversation {channel_id} not found remotely, treating as gone");
            Ok(None)
        }
        Err(e) => Err(ReconcileError::remote("get info for conversation", channel_id, e)),
    }
}

fn is_channel_not_found(err: &ReconcileError) -> bool {
    err.remote_error()
        .is_some_and(|e| e.is_code(&ErrorCode::ChannelNotFound))
}
