//! Desired and observed entity types.
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::remote::types::{
    AccountId, ConversationId, GroupAttributes, GroupId, RemoteConversation, RemoteGroup,
};

/// Whether members outside the desired set are actively removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Enforcement {
    /// Only add missing members.
    None,
    /// Add missing members and remove undesired ones.
    #[default]
    Kick,
}

/// What destroying a conversation does remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionOnDestroy {
    /// Leave the conversation untouched.
    None,
    #[default]
    Archive,
}

/// Declared state of one conversation. Immutable for a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredConversation {
    pub name: String,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    pub is_private: bool,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub members: BTreeSet<AccountId>,
    /// Accounts never removed, on top of the creator and the caller.
    #[serde(default)]
    pub protected_members: BTreeSet<AccountId>,
    #[serde(default)]
    pub enforcement: Enforcement,
    #[serde(default)]
    pub action_on_destroy: ActionOnDestroy,
    /// Adopt a same-named conversation instead of failing on `name_taken`.
    #[serde(default)]
    pub adopt_existing: bool,
    /// Identifier from a previous pass, if the conversation is already known.
    #[serde(default)]
    pub existing_id: Option<ConversationId>,
}

impl DesiredConversation {
    pub fn new(name: &str, is_private: bool) -> Self {
        Self {
            name: name.to_string(),
            topic: None,
            purpose: None,
            is_private,
            is_archived: false,
            members: BTreeSet::new(),
            protected_members: BTreeSet::new(),
            enforcement: Enforcement::default(),
            action_on_destroy: ActionOnDestroy::default(),
            adopt_existing: false,
            existing_id: None,
        }
    }

    pub fn with_members<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<AccountId>,
    {
        self.members = members.into_iter().map(Into::into).collect();
        self
    }
}

/// Declared state of one user group. Immutable for a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredGroup {
    pub name: String,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub channels: BTreeSet<ConversationId>,
    #[serde(default)]
    pub members: BTreeSet<AccountId>,
    #[serde(default)]
    pub existing_id: Option<GroupId>,
}

impl DesiredGroup {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            handle: None,
            description: None,
            channels: BTreeSet::new(),
            members: BTreeSet::new(),
            existing_id: None,
        }
    }

    pub fn with_members<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<AccountId>,
    {
        self.members = members.into_iter().map(Into::into).collect();
        self
    }

    /// Attributes sent on create and on normalizing updates. Undeclared or
    /// empty optional fields are left out and keep their remote value.
    pub fn attributes(&self) -> GroupAttributes {
        GroupAttributes {
            name: Some(self.name.clone()),
            handle: self.handle.clone().filter(|h| !h.is_empty()),
            description: self.description.clone().filter(|d| !d.is_empty()),
            channels: (!self.channels.is_empty()).then(|| self.channels.iter().cloned().collect()),
        }
    }

    /// Whether `group` already carries every attribute this declaration sets.
    pub fn attributes_match(&self, group: &RemoteGroup) -> bool {
        let attrs = self.attributes();
        let channels_match = attrs.channels.map_or(true, |wanted| {
            let wanted: BTreeSet<&String> = wanted.iter().collect();
            let live: BTreeSet<&String> = group.channels.iter().collect();
            wanted == live
        });
        group.name == self.name
            && attrs.handle.map_or(true, |h| group.handle == h)
            && attrs.description.map_or(true, |d| group.description == d)
            && channels_match
    }
}

/// Observed conversation with its full member list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    #[serde(flatten)]
    pub conversation: RemoteConversation,
    pub members: Vec<AccountId>,
}

pub type GroupState = RemoteGroup;

/// Result of a pass against an entity that may have vanished remotely.
///
/// `Gone` is drift, not failure: the caller should forget the entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "state", rename_all = "lowercase")]
pub enum Reconciled<T> {
    Present(T),
    Gone,
}

impl<T> Reconciled<T> {
    pub fn is_gone(&self) -> bool {
        matches!(self, Reconciled::Gone)
    }

    pub fn present(self) -> Option<T> {
        match self {
            Reconciled::Present(value) => Some(value),
            Reconciled::Gone => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_defaults_follow_provider_behavior() {
        let desired: DesiredConversation =
            serde_json::from_str(r#"{"name": "eng", "is_private": false}"#).unwrap();
        assert_eq!(desired.enforcement, Enforcement::Kick);
        assert_eq!(desired.action_on_destroy, ActionOnDestroy::Archive);
        assert!(!desired.adopt_existing);
        assert!(!desired.is_archived);
        assert!(desired.members.is_empty());
    }

    #[test]
    fn enforcement_parses_lowercase() {
        let e: Enforcement = serde_json::from_str(r#""none""#).unwrap();
        assert_eq!(e, Enforcement::None);
    }

    #[test]
    fn group_attribute_match_ignores_channel_order() {
        let mut desired = DesiredGroup::new("Oncall");
        desired.handle = Some("oncall".into());
        desired.channels = ["C2", "C1"].iter().map(|s| s.to_string()).collect();
        let group = RemoteGroup {
            id: "S1".into(),
            name: "Oncall".into(),
            handle: "oncall".into(),
            channels: vec!["C1".into(), "C2".into()],
            enabled: true,
            ..Default::default()
        };
        assert!(desired.attributes_match(&group));

        desired.description = Some("pager".into());
        assert!(!desired.attributes_match(&group));
    }

    #[test]
    fn undeclared_group_attributes_are_left_out() {
        let attrs = DesiredGroup::new("Oncall").attributes();
        assert_eq!(attrs.name.as_deref(), Some("Oncall"));
        assert_eq!(attrs.handle, None);
        assert_eq!(attrs.description, None);
        assert_eq!(attrs.channels, None);

        let group = RemoteGroup {
            name: "Oncall".into(),
            handle: "oncall".into(),
            description: "set by hand".into(),
            channels: vec!["C1".into()],
            ..Default::default()
        };
        assert!(DesiredGroup::new("Oncall").attributes_match(&group));
    }
}
