//! Slack Web API implementation of [`WorkspaceClient`].
//!
//! Maps the `{"ok": false, "error": "<code>"}` envelope onto
//! [`RemoteError::Api`], HTTP 429 onto [`RemoteError::RateLimited`], and
//! network / 5xx failures onto [`RemoteError::Transport`] with wording the
//! retry classifier recognizes.
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, trace};
use reqwest::{
    header::{HeaderMap, RETRY_AFTER},
    StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize};

use crate::remote::{
    types::{
        Account, AccountId, GroupAttributes, ListConversationsParams, ListGroupsParams,
        ListMembersParams, ListUsersParams, NewConversation, Page, RemoteConversation,
        RemoteGroup,
    },
    RemoteError, WorkspaceClient,
};

pub const SLACK_API_BASE: &str = "https://slack.com/api";

/// Used when a 429 response carries no usable `Retry-After` header.
const FALLBACK_RETRY_AFTER: Duration = Duration::from_secs(1);

type Form = Vec<(&'static str, String)>;

pub struct SlackHttpClient {
    http: reqwest::Client,
    token: String,
    base_url: String,
}

impl SlackHttpClient {
    pub fn new(token: &str) -> Result<Self, RemoteError> {
        Self::with_base_url(token, SLACK_API_BASE)
    }

    pub fn with_base_url(token: &str, base_url: &str) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(transport_error)?;
        Ok(Self {
            http,
            token: token.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, form: Form) -> Result<T, RemoteError> {
        trace!("POST {method} {form:?}");
        let response = self
            .http
            .post(format!("{}/{method}", self.base_url))
            .bearer_auth(&self.token)
            .form(&form)
            .send()
            .await
            .map_err(transport_error)?;

        if let Some(err) = status_error(method, response.status(), response.headers()) {
            return Err(err);
        }
        let body: serde_json::Value = response.json().await.map_err(transport_error)?;
        decode_envelope(method, body)
    }
}

/// Map a non-success HTTP status onto the error the retry layer expects.
fn status_error(method: &str, status: StatusCode, headers: &HeaderMap) -> Option<RemoteError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(FALLBACK_RETRY_AFTER);
        debug!("{method} rate limited, retry_after={retry_after:?}");
        return Some(RemoteError::RateLimited { retry_after });
    }
    if status.is_server_error() {
        return Some(RemoteError::Transport(server_error_text(status)));
    }
    if !status.is_success() {
        return Some(RemoteError::Transport(format!(
            "unexpected HTTP status {status} from {method}"
        )));
    }
    None
}

/// Unwrap the `{"ok": ..., "error": ...}` envelope into `T` or an API error.
fn decode_envelope<T: DeserializeOwned>(
    method: &str,
    body: serde_json::Value,
) -> Result<T, RemoteError> {
    if !body.get("ok").and_then(|v| v.as_bool()).unwrap_or(false) {
        let code = body
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown_error");
        return Err(RemoteError::api(code));
    }
    serde_json::from_value(body).map_err(|e| RemoteError::Decode(format!("{method}: {e}")))
}

fn transport_error(err: reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        RemoteError::Transport(format!("timeout: {err}"))
    } else if err.is_connect() {
        RemoteError::Transport(format!("network error: {err}"))
    } else if err.is_decode() {
        RemoteError::Decode(err.to_string())
    } else {
        RemoteError::Transport(err.to_string())
    }
}

fn server_error_text(status: StatusCode) -> String {
    match status {
        StatusCode::INTERNAL_SERVER_ERROR => "internal server error".to_string(),
        StatusCode::BAD_GATEWAY => "bad gateway".to_string(),
        StatusCode::SERVICE_UNAVAILABLE => "service unavailable".to_string(),
        StatusCode::GATEWAY_TIMEOUT => "gateway timeout".to_string(),
        other => format!("server error: HTTP {}", other.as_u16()),
    }
}

// ─────────────────────────── Wire shapes ───────────────────────────

#[derive(Deserialize, Default)]
struct Metadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Deserialize, Default)]
struct TextValue {
    #[serde(default)]
    value: String,
}

#[derive(Deserialize)]
struct ChannelWire {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    created: i64,
    #[serde(default)]
    creator: String,
    #[serde(default)]
    is_archived: bool,
    #[serde(default)]
    is_private: bool,
    #[serde(default)]
    is_shared: bool,
    #[serde(default)]
    is_ext_shared: bool,
    #[serde(default)]
    is_org_shared: bool,
    #[serde(default)]
    is_general: bool,
    #[serde(default)]
    topic: TextValue,
    #[serde(default)]
    purpose: TextValue,
}

impl From<ChannelWire> for RemoteConversation {
    fn from(c: ChannelWire) -> Self {
        RemoteConversation {
            id: c.id,
            name: c.name,
            topic: c.topic.value,
            purpose: c.purpose.value,
            created: c.created,
            creator: c.creator,
            is_archived: c.is_archived,
            is_private: c.is_private,
            is_shared: c.is_shared,
            is_ext_shared: c.is_ext_shared,
            is_org_shared: c.is_org_shared,
            is_general: c.is_general,
        }
    }
}

#[derive(Deserialize, Default)]
struct ProfileWire {
    email: Option<String>,
}

#[derive(Deserialize)]
struct UserWire {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    profile: ProfileWire,
}

impl From<UserWire> for Account {
    fn from(u: UserWire) -> Self {
        Account {
            id: u.id,
            name: u.name,
            email: u.profile.email,
        }
    }
}

#[derive(Deserialize, Default)]
struct GroupPrefsWire {
    #[serde(default)]
    channels: Vec<String>,
}

#[derive(Deserialize)]
struct GroupWire {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    handle: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    prefs: GroupPrefsWire,
    #[serde(default)]
    users: Vec<String>,
    #[serde(default)]
    date_delete: i64,
}

impl From<GroupWire> for RemoteGroup {
    fn from(g: GroupWire) -> Self {
        RemoteGroup {
            id: g.id,
            name: g.name,
            handle: g.handle,
            description: g.description,
            channels: g.prefs.channels,
            members: g.users,
            enabled: g.date_delete == 0,
        }
    }
}

#[derive(Deserialize)]
struct ChannelResponse {
    channel: ChannelWire,
}

#[derive(Deserialize)]
struct ChannelsResponse {
    #[serde(default)]
    channels: Vec<ChannelWire>,
    #[serde(default)]
    response_metadata: Metadata,
}

#[derive(Deserialize)]
struct MembersResponse {
    #[serde(default)]
    members: Vec<String>,
    #[serde(default)]
    response_metadata: Metadata,
}

#[derive(Deserialize)]
struct UserResponse {
    user: UserWire,
}

#[derive(Deserialize)]
struct UsersResponse {
    #[serde(default)]
    members: Vec<UserWire>,
    #[serde(default)]
    response_metadata: Metadata,
}

#[derive(Deserialize)]
struct AuthTestResponse {
    user_id: String,
}

#[derive(Deserialize)]
struct GroupResponse {
    usergroup: GroupWire,
}

#[derive(Deserialize)]
struct GroupsResponse {
    #[serde(default)]
    usergroups: Vec<GroupWire>,
}

#[derive(Deserialize)]
struct Empty {}

fn group_form(attrs: &GroupAttributes) -> Form {
    let mut form = Form::new();
    if let Some(name) = &attrs.name {
        form.push(("name", name.clone()));
    }
    if let Some(handle) = &attrs.handle {
        form.push(("handle", handle.clone()));
    }
    if let Some(description) = &attrs.description {
        form.push(("description", description.clone()));
    }
    if let Some(channels) = &attrs.channels {
        form.push(("channels", channels.join(",")));
    }
    form
}

#[async_trait]
impl WorkspaceClient for SlackHttpClient {
    async fn lookup_user_by_email(&self, email: &str) -> Result<Account, RemoteError> {
        let resp: UserResponse = self
            .call("users.lookupByEmail", vec![("email", email.to_string())])
            .await?;
        Ok(resp.user.into())
    }

    async fn list_users(&self, params: &ListUsersParams) -> Result<Page<Account>, RemoteError> {
        let mut form = vec![("limit", params.limit.to_string())];
        if !params.cursor.is_empty() {
            form.push(("cursor", params.cursor.clone()));
        }
        let resp: UsersResponse = self.call("users.list", form).await?;
        Ok(Page {
            items: resp.members.into_iter().map(Account::from).collect(),
            next_cursor: resp.response_metadata.next_cursor,
        })
    }

    async fn auth_test(&self) -> Result<AccountId, RemoteError> {
        let resp: AuthTestResponse = self.call("auth.test", Form::new()).await?;
        Ok(resp.user_id)
    }

    async fn create_conversation(
        &self,
        params: NewConversation,
    ) -> Result<RemoteConversation, RemoteError> {
        let resp: ChannelResponse = self
            .call(
                "conversations.create",
                vec![
                    ("name", params.name),
                    ("is_private", params.is_private.to_string()),
                ],
            )
            .await?;
        Ok(resp.channel.into())
    }

    async fn conversation_info(
        &self,
        channel_id: &str,
    ) -> Result<RemoteConversation, RemoteError> {
        let resp: ChannelResponse = self
            .call("conversations.info", vec![("channel", channel_id.to_string())])
            .await?;
        Ok(resp.channel.into())
    }

    async fn list_conversations(
        &self,
        params: &ListConversationsParams,
    ) -> Result<Page<RemoteConversation>, RemoteError> {
        let mut form = vec![
            ("limit", params.limit.to_string()),
            ("exclude_archived", params.exclude_archived.to_string()),
        ];
        if !params.cursor.is_empty() {
            form.push(("cursor", params.cursor.clone()));
        }
        if !params.types.is_empty() {
            let types: Vec<&str> = params.types.iter().map(|t| t.as_str()).collect();
            form.push(("types", types.join(",")));
        }
        let resp: ChannelsResponse = self.call("conversations.list", form).await?;
        Ok(Page {
            items: resp.channels.into_iter().map(RemoteConversation::from).collect(),
            next_cursor: resp.response_metadata.next_cursor,
        })
    }

    async fn list_members(
        &self,
        params: &ListMembersParams,
    ) -> Result<Page<AccountId>, RemoteError> {
        let mut form = vec![
            ("channel", params.channel_id.clone()),
            ("limit", params.limit.to_string()),
        ];
        if !params.cursor.is_empty() {
            form.push(("cursor", params.cursor.clone()));
        }
        let resp: MembersResponse = self.call("conversations.members", form).await?;
        Ok(Page {
            items: resp.members,
            next_cursor: resp.response_metadata.next_cursor,
        })
    }

    async fn join_conversation(&self, channel_id: &str) -> Result<(), RemoteError> {
        let _: Empty = self
            .call("conversations.join", vec![("channel", channel_id.to_string())])
            .await?;
        Ok(())
    }

    async fn invite_to_conversation(
        &self,
        channel_id: &str,
        users: &[AccountId],
    ) -> Result<(), RemoteError> {
        let _: Empty = self
            .call(
                "conversations.invite",
                vec![("channel", channel_id.to_string()), ("users", users.join(","))],
            )
            .await?;
        Ok(())
    }

    async fn kick_from_conversation(
        &self,
        channel_id: &str,
        user: &str,
    ) -> Result<(), RemoteError> {
        let _: Empty = self
            .call(
                "conversations.kick",
                vec![("channel", channel_id.to_string()), ("user", user.to_string())],
            )
            .await?;
        Ok(())
    }

    async fn set_topic(&self, channel_id: &str, topic: &str) -> Result<(), RemoteError> {
        let _: Empty = self
            .call(
                "conversations.setTopic",
                vec![("channel", channel_id.to_string()), ("topic", topic.to_string())],
            )
            .await?;
        Ok(())
    }

    async fn set_purpose(&self, channel_id: &str, purpose: &str) -> Result<(), RemoteError> {
        let _: Empty = self
            .call(
                "conversations.setPurpose",
                vec![
                    ("channel", channel_id.to_string()),
                    ("purpose", purpose.to_string()),
                ],
            )
            .await?;
        Ok(())
    }

    async fn rename_conversation(&self, channel_id: &str, name: &str) -> Result<(), RemoteError> {
        let _: Empty = self
            .call(
                "conversations.rename",
                vec![("channel", channel_id.to_string()), ("name", name.to_string())],
            )
            .await?;
        Ok(())
    }

    async fn archive_conversation(&self, channel_id: &str) -> Result<(), RemoteError> {
        let _: Empty = self
            .call("conversations.archive", vec![("channel", channel_id.to_string())])
            .await?;
        Ok(())
    }

    async fn unarchive_conversation(&self, channel_id: &str) -> Result<(), RemoteError> {
        let _: Empty = self
            .call("conversations.unarchive", vec![("channel", channel_id.to_string())])
            .await?;
        Ok(())
    }

    async fn create_group(&self, attrs: &GroupAttributes) -> Result<RemoteGroup, RemoteError> {
        let resp: GroupResponse = self.call("usergroups.create", group_form(attrs)).await?;
        Ok(resp.usergroup.into())
    }

    async fn list_groups(&self, params: ListGroupsParams) -> Result<Vec<RemoteGroup>, RemoteError> {
        let resp: GroupsResponse = self
            .call(
                "usergroups.list",
                vec![
                    ("include_disabled", params.include_disabled.to_string()),
                    ("include_users", params.include_users.to_string()),
                ],
            )
            .await?;
        Ok(resp.usergroups.into_iter().map(RemoteGroup::from).collect())
    }

    async fn update_group(
        &self,
        group_id: &str,
        attrs: &GroupAttributes,
    ) -> Result<RemoteGroup, RemoteError> {
        let mut form = vec![("usergroup", group_id.to_string())];
        form.extend(group_form(attrs));
        let resp: GroupResponse = self.call("usergroups.update", form).await?;
        Ok(resp.usergroup.into())
    }

    async fn update_group_members(
        &self,
        group_id: &str,
        users: &[AccountId],
    ) -> Result<RemoteGroup, RemoteError> {
        let resp: GroupResponse = self
            .call(
                "usergroups.users.update",
                vec![("usergroup", group_id.to_string()), ("users", users.join(","))],
            )
            .await?;
        Ok(resp.usergroup.into())
    }

    async fn disable_group(&self, group_id: &str) -> Result<RemoteGroup, RemoteError> {
        let resp: GroupResponse = self
            .call("usergroups.disable", vec![("usergroup", group_id.to_string())])
            .await?;
        Ok(resp.usergroup.into())
    }

    async fn enable_group(&self, group_id: &str) -> Result<RemoteGroup, RemoteError> {
        let resp: GroupResponse = self
            .call("usergroups.enable", vec![("usergroup", group_id.to_string())])
            .await?;
        Ok(resp.usergroup.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::ErrorCode;
    use crate::retry::{classify, ErrorClass};
    use reqwest::header::HeaderValue;

    #[test]
    fn server_errors_are_worded_for_the_classifier() {
        for status in [
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::GATEWAY_TIMEOUT,
            StatusCode::from_u16(507).unwrap(),
        ] {
            let err = RemoteError::Transport(server_error_text(status));
            assert_eq!(classify(&err), ErrorClass::Transient, "{status}");
        }
    }

    #[test]
    fn too_many_requests_uses_retry_after_header() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(
            status_error("users.list", StatusCode::TOO_MANY_REQUESTS, &headers),
            Some(RemoteError::RateLimited {
                retry_after: Duration::from_secs(7)
            })
        );
    }

    #[test]
    fn too_many_requests_without_header_waits_one_second() {
        let mut garbled = HeaderMap::new();
        garbled.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        for headers in [HeaderMap::new(), garbled] {
            assert_eq!(
                status_error("users.list", StatusCode::TOO_MANY_REQUESTS, &headers),
                Some(RemoteError::RateLimited {
                    retry_after: Duration::from_secs(1)
                })
            );
        }
    }

    #[test]
    fn status_mapping_for_server_and_client_errors() {
        let headers = HeaderMap::new();
        assert_eq!(status_error("auth.test", StatusCode::OK, &headers), None);
        assert_eq!(
            status_error("auth.test", StatusCode::BAD_GATEWAY, &headers),
            Some(RemoteError::Transport("bad gateway".into()))
        );
        let err = status_error("auth.test", StatusCode::NOT_FOUND, &headers).unwrap();
        assert_eq!(classify(&err), ErrorClass::Permanent);
    }

    #[test]
    fn envelope_error_becomes_api_code() {
        let body = serde_json::json!({"ok": false, "error": "name_taken"});
        let result: Result<AuthTestResponse, _> = decode_envelope("conversations.create", body);
        assert_eq!(result.err(), Some(RemoteError::Api(ErrorCode::NameTaken)));

        let body = serde_json::json!({"ok": false});
        let result: Result<Empty, _> = decode_envelope("conversations.join", body);
        assert_eq!(result.err(), Some(RemoteError::api("unknown_error")));
    }

    #[test]
    fn envelope_success_decodes_payload() {
        let body = serde_json::json!({"ok": true, "user_id": "U1", "team": "T1"});
        let resp: AuthTestResponse = decode_envelope("auth.test", body).unwrap();
        assert_eq!(resp.user_id, "U1");

        let body = serde_json::json!({"ok": true});
        let result: Result<AuthTestResponse, _> = decode_envelope("auth.test", body);
        assert!(matches!(result, Err(RemoteError::Decode(_))));
    }

    #[test]
    fn group_form_leaves_out_unset_fields() {
        let form = group_form(&GroupAttributes {
            name: Some("Oncall".into()),
            ..Default::default()
        });
        assert_eq!(form, vec![("name", "Oncall".to_string())]);
    }

    #[test]
    fn group_wire_maps_disabled_and_prefs() {
        let wire: GroupWire = serde_json::from_value(serde_json::json!({
            "id": "S1",
            "name": "Oncall",
            "handle": "oncall",
            "description": "",
            "prefs": {"channels": ["C1", "C2"]},
            "users": ["U1"],
            "date_delete": 1700000000
        }))
        .unwrap();
        let group = RemoteGroup::from(wire);
        assert!(!group.enabled);
        assert_eq!(group.channels, vec!["C1", "C2"]);
        assert_eq!(group.members, vec!["U1"]);
    }

    #[test]
    fn channel_wire_flattens_topic_and_purpose() {
        let wire: ChannelWire = serde_json::from_value(serde_json::json!({
            "id": "C1",
            "name": "general",
            "is_general": true,
            "topic": {"value": "chatter", "creator": "U1"},
            "purpose": {"value": "everything"}
        }))
        .unwrap();
        let conv = RemoteConversation::from(wire);
        assert_eq!(conv.topic, "chatter");
        assert_eq!(conv.purpose, "everything");
        assert!(conv.is_general);
        assert!(!conv.is_archived);
    }
}
