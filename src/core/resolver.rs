//! Name-to-conversation resolution over the paginated listing.
use log::{debug, info};

use crate::core::error::{ReconcileError, RemoteResultExt};
use crate::remote::{
    types::{ConversationType, ListConversationsParams, RemoteConversation},
    WorkspaceClient,
};
use crate::retry::RetryExecutor;

/// Position in a paginated listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageCursor {
    pub token: String,
    pub exhausted: bool,
}

impl PageCursor {
    pub fn advance(&mut self, next: String) {
        self.exhausted = next.is_empty();
        self.token = next;
    }
}

/// Find the active conversation named `name` with the given privacy.
///
/// Pages are fetched one at a time, each through the retry executor, and the
/// scan stops at the first exact (case-sensitive) match.
///
/// # Errors
/// [`ReconcileError::ChannelNotFound`] once every page has been checked, or the
/// first failed page fetch.
pub async fn find_by_name<C: WorkspaceClient + ?Sized>(
    client: &C,
    exec: &RetryExecutor,
    name: &str,
    is_private: bool,
) -> Result<RemoteConversation, ReconcileError> {
    search(client, exec, name, is_private, true).await
}

/// As [`find_by_name`], but archived conversations are candidates too.
pub async fn find_by_name_including_archived<C: WorkspaceClient + ?Sized>(
    client: &C,
    exec: &RetryExecutor,
    name: &str,
    is_private: bool,
) -> Result<RemoteConversation, ReconcileError> {
    search(client, exec, name, is_private, false).await
}

async fn search<C: WorkspaceClient + ?Sized>(
    client: &C,
    exec: &RetryExecutor,
    name: &str,
    is_private: bool,
    exclude_archived: bool,
) -> Result<RemoteConversation, ReconcileError> {
    let mut cursor = PageCursor::default();
    let mut page_no = 0usize;
    while !cursor.exhausted {
        let params = ListConversationsParams {
            cursor: cursor.token.clone(),
            types: vec![ConversationType::for_privacy(is_private)],
            exclude_archived,
            ..Default::default()
        };
        let page = exec
            .execute("list conversations", || client.list_conversations(&params))
            .await
            .during("list conversations while looking for", name)?;
        page_no += 1;
        debug!(
            "Fetched conversation page {page_no} ({} items) looking for {name}",
            page.items.len()
        );

        if let Some(found) = page.items.into_iter().find(|c| c.name == name) {
            info!("Found conversation {name} with id {}", found.id);
            return Ok(found);
        }
        cursor.advance(page.next_cursor);
    }
    Err(ReconcileError::ChannelNotFound(name.to_string()))
}
