//! In-memory workspace implementation.
//!
//! Mirrors the observable behavior of the real API closely enough to drive the
//! reconcilers end to end: short codes on conflicts, cursor pagination,
//! disabled groups hidden unless asked for. Every call is recorded, and
//! failures can be queued per operation to simulate rate limiting or outages.
use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;

use crate::remote::{
    types::{
        Account, AccountId, ConversationType, GroupAttributes, ListConversationsParams,
        ListGroupsParams, ListMembersParams, ListUsersParams, NewConversation, Page,
        RemoteConversation, RemoteGroup,
    },
    ErrorCode, RemoteError, WorkspaceClient,
};

/// Remote operation names, used for call recording and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    LookupUserByEmail,
    ListUsers,
    AuthTest,
    CreateConversation,
    ConversationInfo,
    ListConversations,
    ListMembers,
    Join,
    Invite,
    Kick,
    SetTopic,
    SetPurpose,
    Rename,
    Archive,
    Unarchive,
    CreateGroup,
    ListGroups,
    UpdateGroup,
    UpdateGroupMembers,
    DisableGroup,
    EnableGroup,
}

/// A recorded remote call. `target` is the entity id or name acted on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: Op,
    pub target: String,
    pub args: Vec<String>,
}

struct ConversationEntry {
    record: RemoteConversation,
    members: Vec<AccountId>,
}

#[derive(Default)]
struct State {
    users: Vec<Account>,
    conversations: Vec<ConversationEntry>,
    groups: Vec<RemoteGroup>,
    faults: HashMap<Op, VecDeque<Option<RemoteError>>>,
    calls: Vec<Call>,
    next_id: u64,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{:06}", self.next_id)
    }

    fn conversation_mut(&mut self, id: &str) -> Result<&mut ConversationEntry, RemoteError> {
        self.conversations
            .iter_mut()
            .find(|c| c.record.id == id)
            .ok_or(RemoteError::Api(ErrorCode::ChannelNotFound))
    }

    fn group_mut(&mut self, id: &str) -> Result<&mut RemoteGroup, RemoteError> {
        self.groups
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or(RemoteError::Api(ErrorCode::NoSuchSubteam))
    }
}

/// In-memory [`WorkspaceClient`] for development and testing.
pub struct MemoryWorkspace {
    caller: AccountId,
    state: Mutex<State>,
}

impl MemoryWorkspace {
    /// Create an empty workspace whose token belongs to `caller`.
    pub fn new(caller: &str) -> Self {
        let state = State {
            users: vec![Account {
                id: caller.to_string(),
                name: caller.to_lowercase(),
                email: None,
            }],
            ..Default::default()
        };
        Self {
            caller: caller.to_string(),
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record the call and pop a queued fault for `op`, if any.
    fn enter(
        &self,
        op: Op,
        target: &str,
        args: Vec<String>,
    ) -> Result<MutexGuard<'_, State>, RemoteError> {
        let mut state = self.lock();
        state.calls.push(Call {
            op,
            target: target.to_string(),
            args,
        });
        if let Some(err) = state.faults.get_mut(&op).and_then(|q| q.pop_front()).flatten() {
            return Err(err);
        }
        Ok(state)
    }

    // ─────────────────────────── Seeding ───────────────────────────

    pub fn add_user(&self, id: &str, name: &str, email: Option<&str>) {
        self.lock().users.push(Account {
            id: id.to_string(),
            name: name.to_string(),
            email: email.map(str::to_string),
        });
    }

    /// Insert a conversation as-is. An empty `record.id` gets a fresh one.
    pub fn add_conversation(&self, mut record: RemoteConversation, members: &[&str]) -> String {
        let mut state = self.lock();
        if record.id.is_empty() {
            record.id = state.next_id("C");
        }
        let id = record.id.clone();
        state.conversations.push(ConversationEntry {
            record,
            members: members.iter().map(|m| m.to_string()).collect(),
        });
        id
    }

    /// Insert a user group as-is. An empty `group.id` gets a fresh one.
    pub fn add_group(&self, mut group: RemoteGroup) -> String {
        let mut state = self.lock();
        if group.id.is_empty() {
            group.id = state.next_id("S");
        }
        let id = group.id.clone();
        state.groups.push(group);
        id
    }

    /// Make the next call of `op` fail with `err`. Faults queue in order.
    pub fn fail_next(&self, op: Op, err: RemoteError) {
        self.lock().faults.entry(op).or_default().push_back(Some(err));
    }

    /// Let the next call of `op` through. Queues ahead of later faults, so
    /// `succeed_next` then `fail_next` fails the second call.
    pub fn succeed_next(&self, op: Op) {
        self.lock().faults.entry(op).or_default().push_back(None);
    }

    pub fn remove_conversation(&self, id: &str) {
        self.lock().conversations.retain(|c| c.record.id != id);
    }

    // ─────────────────────────── Inspection ───────────────────────────

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn calls_of(&self, op: Op) -> Vec<Call> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.op == op)
            .cloned()
            .collect()
    }

    pub fn count(&self, op: Op) -> usize {
        self.lock().calls.iter().filter(|c| c.op == op).count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn conversation(&self, id: &str) -> Option<RemoteConversation> {
        self.lock()
            .conversations
            .iter()
            .find(|c| c.record.id == id)
            .map(|c| c.record.clone())
    }

    pub fn members(&self, id: &str) -> Vec<AccountId> {
        self.lock()
            .conversations
            .iter()
            .find(|c| c.record.id == id)
            .map(|c| c.members.clone())
            .unwrap_or_default()
    }

    pub fn group(&self, id: &str) -> Option<RemoteGroup> {
        self.lock().groups.iter().find(|g| g.id == id).cloned()
    }

    pub fn group_count(&self) -> usize {
        self.lock().groups.len()
    }
}

fn paginate<T: Clone>(items: &[T], cursor: &str, limit: usize) -> Result<Page<T>, RemoteError> {
    let start = if cursor.is_empty() {
        0
    } else {
        cursor
            .parse::<usize>()
            .map_err(|_| RemoteError::api("invalid_cursor"))?
    };
    let limit = limit.max(1);
    let end = (start + limit).min(items.len());
    let page = items.get(start..end).unwrap_or_default().to_vec();
    let next_cursor = if end < items.len() {
        end.to_string()
    } else {
        String::new()
    };
    Ok(Page {
        items: page,
        next_cursor,
    })
}

#[async_trait]
impl WorkspaceClient for MemoryWorkspace {
    async fn lookup_user_by_email(&self, email: &str) -> Result<Account, RemoteError> {
        let state = self.enter(Op::LookupUserByEmail, email, vec![])?;
        state
            .users
            .iter()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned()
            .ok_or(RemoteError::Api(ErrorCode::UsersNotFound))
    }

    async fn list_users(&self, params: &ListUsersParams) -> Result<Page<Account>, RemoteError> {
        let state = self.enter(Op::ListUsers, &params.cursor, vec![])?;
        paginate(&state.users, &params.cursor, params.limit)
    }

    async fn auth_test(&self) -> Result<AccountId, RemoteError> {
        drop(self.enter(Op::AuthTest, "", vec![])?);
        Ok(self.caller.clone())
    }

    async fn create_conversation(
        &self,
        params: NewConversation,
    ) -> Result<RemoteConversation, RemoteError> {
        let mut state = self.enter(Op::CreateConversation, &params.name, vec![])?;
        if state.conversations.iter().any(|c| c.record.name == params.name) {
            return Err(RemoteError::Api(ErrorCode::NameTaken));
        }
        let record = RemoteConversation {
            id: state.next_id("C"),
            name: params.name,
            creator: self.caller.clone(),
            is_private: params.is_private,
            ..Default::default()
        };
        state.conversations.push(ConversationEntry {
            record: record.clone(),
            members: vec![self.caller.clone()],
        });
        Ok(record)
    }

    async fn conversation_info(
        &self,
        channel_id: &str,
    ) -> Result<RemoteConversation, RemoteError> {
        let mut state = self.enter(Op::ConversationInfo, channel_id, vec![])?;
        Ok(state.conversation_mut(channel_id)?.record.clone())
    }

    async fn list_conversations(
        &self,
        params: &ListConversationsParams,
    ) -> Result<Page<RemoteConversation>, RemoteError> {
        let state = self.enter(Op::ListConversations, &params.cursor, vec![])?;
        let types = if params.types.is_empty() {
            vec![ConversationType::PublicChannel]
        } else {
            params.types.clone()
        };
        let visible: Vec<RemoteConversation> = state
            .conversations
            .iter()
            .map(|c| &c.record)
            .filter(|c| types.contains(&ConversationType::for_privacy(c.is_private)))
            .filter(|c| !(params.exclude_archived && c.is_archived))
            .cloned()
            .collect();
        paginate(&visible, &params.cursor, params.limit)
    }

    async fn list_members(
        &self,
        params: &ListMembersParams,
    ) -> Result<Page<AccountId>, RemoteError> {
        let mut state = self.enter(Op::ListMembers, &params.channel_id, vec![])?;
        let members = state.conversation_mut(&params.channel_id)?.members.clone();
        paginate(&members, &params.cursor, params.limit)
    }

    async fn join_conversation(&self, channel_id: &str) -> Result<(), RemoteError> {
        let mut state = self.enter(Op::Join, channel_id, vec![])?;
        let caller = self.caller.clone();
        let entry = state.conversation_mut(channel_id)?;
        if entry.record.is_private {
            return Err(RemoteError::Api(ErrorCode::MethodNotSupportedForChannelType));
        }
        if entry.record.is_archived {
            return Err(RemoteError::Api(ErrorCode::IsArchived));
        }
        if entry.members.contains(&caller) {
            return Err(RemoteError::Api(ErrorCode::AlreadyInChannel));
        }
        entry.members.push(caller);
        Ok(())
    }

    async fn invite_to_conversation(
        &self,
        channel_id: &str,
        users: &[AccountId],
    ) -> Result<(), RemoteError> {
        let mut state = self.enter(Op::Invite, channel_id, users.to_vec())?;
        let entry = state.conversation_mut(channel_id)?;
        if entry.record.is_archived {
            return Err(RemoteError::Api(ErrorCode::IsArchived));
        }
        let fresh: Vec<AccountId> = users
            .iter()
            .filter(|u| !entry.members.contains(u))
            .cloned()
            .collect();
        if fresh.is_empty() {
            return Err(RemoteError::Api(ErrorCode::AlreadyInChannel));
        }
        entry.members.extend(fresh);
        Ok(())
    }

    async fn kick_from_conversation(
        &self,
        channel_id: &str,
        user: &str,
    ) -> Result<(), RemoteError> {
        let mut state = self.enter(Op::Kick, channel_id, vec![user.to_string()])?;
        let entry = state.conversation_mut(channel_id)?;
        let before = entry.members.len();
        entry.members.retain(|m| m != user);
        if entry.members.len() == before {
            return Err(RemoteError::Api(ErrorCode::NotInChannel));
        }
        Ok(())
    }

    async fn set_topic(&self, channel_id: &str, topic: &str) -> Result<(), RemoteError> {
        let mut state = self.enter(Op::SetTopic, channel_id, vec![topic.to_string()])?;
        state.conversation_mut(channel_id)?.record.topic = topic.to_string();
        Ok(())
    }

    async fn set_purpose(&self, channel_id: &str, purpose: &str) -> Result<(), RemoteError> {
        let mut state = self.enter(Op::SetPurpose, channel_id, vec![purpose.to_string()])?;
        state.conversation_mut(channel_id)?.record.purpose = purpose.to_string();
        Ok(())
    }

    async fn rename_conversation(&self, channel_id: &str, name: &str) -> Result<(), RemoteError> {
        let mut state = self.enter(Op::Rename, channel_id, vec![name.to_string()])?;
        if state
            .conversations
            .iter()
            .any(|c| c.record.name == name && c.record.id != channel_id)
        {
            return Err(RemoteError::Api(ErrorCode::NameTaken));
        }
        state.conversation_mut(channel_id)?.record.name = name.to_string();
        Ok(())
    }

    async fn archive_conversation(&self, channel_id: &str) -> Result<(), RemoteError> {
        let mut state = self.enter(Op::Archive, channel_id, vec![])?;
        let entry = state.conversation_mut(channel_id)?;
        if entry.record.is_archived {
            return Err(RemoteError::Api(ErrorCode::AlreadyArchived));
        }
        entry.record.is_archived = true;
        Ok(())
    }

    async fn unarchive_conversation(&self, channel_id: &str) -> Result<(), RemoteError> {
        let mut state = self.enter(Op::Unarchive, channel_id, vec![])?;
        let entry = state.conversation_mut(channel_id)?;
        if !entry.record.is_archived {
            return Err(RemoteError::Api(ErrorCode::NotArchived));
        }
        entry.record.is_archived = false;
        Ok(())
    }

    async fn create_group(&self, attrs: &GroupAttributes) -> Result<RemoteGroup, RemoteError> {
        let name = attrs.name.clone().unwrap_or_default();
        let mut state = self.enter(Op::CreateGroup, &name, vec![])?;
        if state.groups.iter().any(|g| g.name == name) {
            return Err(RemoteError::Api(ErrorCode::NameAlreadyExists));
        }
        let handle = attrs.handle.clone().unwrap_or_default();
        if !handle.is_empty() && state.groups.iter().any(|g| g.handle == handle) {
            return Err(RemoteError::Api(ErrorCode::HandleAlreadyExists));
        }
        let group = RemoteGroup {
            id: state.next_id("S"),
            name,
            handle,
            description: attrs.description.clone().unwrap_or_default(),
            channels: attrs.channels.clone().unwrap_or_default(),
            members: Vec::new(),
            enabled: true,
        };
        state.groups.push(group.clone());
        Ok(group)
    }

    async fn list_groups(&self, params: ListGroupsParams) -> Result<Vec<RemoteGroup>, RemoteError> {
        let state = self.enter(Op::ListGroups, "", vec![])?;
        Ok(state
            .groups
            .iter()
            .filter(|g| params.include_disabled || g.enabled)
            .map(|g| {
                let mut g = g.clone();
                if !params.include_users {
                    g.members.clear();
                }
                g
            })
            .collect())
    }

    async fn update_group(
        &self,
        group_id: &str,
        attrs: &GroupAttributes,
    ) -> Result<RemoteGroup, RemoteError> {
        let mut state = self.enter(Op::UpdateGroup, group_id, vec![])?;
        if let Some(handle) = attrs.handle.as_deref() {
            if !handle.is_empty()
                && state
                    .groups
                    .iter()
                    .any(|g| g.handle == handle && g.id != group_id)
            {
                return Err(RemoteError::Api(ErrorCode::HandleAlreadyExists));
            }
        }
        let group = state.group_mut(group_id)?;
        if let Some(name) = &attrs.name {
            group.name = name.clone();
        }
        if let Some(handle) = &attrs.handle {
            group.handle = handle.clone();
        }
        if let Some(description) = &attrs.description {
            group.description = description.clone();
        }
        if let Some(channels) = &attrs.channels {
            group.channels = channels.clone();
        }
        Ok(group.clone())
    }

    async fn update_group_members(
        &self,
        group_id: &str,
        users: &[AccountId],
    ) -> Result<RemoteGroup, RemoteError> {
        let mut state = self.enter(Op::UpdateGroupMembers, group_id, users.to_vec())?;
        let group = state.group_mut(group_id)?;
        group.members = users.to_vec();
        Ok(group.clone())
    }

    async fn disable_group(&self, group_id: &str) -> Result<RemoteGroup, RemoteError> {
        let mut state = self.enter(Op::DisableGroup, group_id, vec![])?;
        let group = state.group_mut(group_id)?;
        group.enabled = false;
        Ok(group.clone())
    }

    async fn enable_group(&self, group_id: &str) -> Result<RemoteGroup, RemoteError> {
        let mut state = self.enter(Op::EnableGroup, group_id, vec![])?;
        let group = state.group_mut(group_id)?;
        if group.enabled {
            return Err(RemoteError::Api(ErrorCode::AlreadyEnabled));
        }
        group.enabled = true;
        Ok(group.clone())
    }
}
