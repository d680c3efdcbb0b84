use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Normalize an address for use as an identifier (accounts are keyed by lowercased address).
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

/// Shorten an address for display, e.g. `0x1234…cdef`.
pub fn short_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", head, tail)
}

/// Truncate an identifier (device token, account id) for log output.
pub fn redact(identifier: &str) -> String {
    let head: String = identifier.chars().take(8).collect();
    if head.len() < identifier.len() {
        format!("{}…", head)
    } else {
        head
    }
}

/// Kinds of social activity a notification can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Reply,
    Reaction,
    Mention,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationKind::Reply => write!(f, "reply"),
            NotificationKind::Reaction => write!(f, "reaction"),
            NotificationKind::Mention => write!(f, "mention"),
        }
    }
}

/// An actor in the system: either a content author or a delegated posting app.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::FromRow)]
pub struct AppAccount {
    /// Lowercased address
    pub id: String,
    pub created_at: DateTime<Utc>,
}

/// An author's delegation of posting/notification rights to an app account.
///
/// Unique per `(author, app, chain_id)`. A set `deleted_at` means the approval was revoked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Approval {
    pub author: String,
    pub app: String,
    pub chain_id: i64,
    pub tx_hash: Option<String>,
    pub log_index: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Approval {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// A push device token registered for an app account. Unique per `(user_id, device_token)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRegistration {
    pub user_id: String,
    pub device_token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Message on the `comments` queue: a comment was posted and may warrant notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentJob {
    pub comment_id: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    /// 0 = comment, 1 = reaction
    #[serde(default)]
    pub comment_type: Option<u8>,
    pub chain_id: i64,
}

/// Comment type value used by reactions.
pub const COMMENT_TYPE_REACTION: u8 = 1;

impl CommentJob {
    pub fn is_reaction(&self) -> bool {
        self.comment_type == Some(COMMENT_TYPE_REACTION)
    }
}

/// Caller-supplied push content. `badge`, `sound` and `data` are loosely typed
/// and get shaped by the sanitizer before they reach the transport.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PushNotification {
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
}

/// Metadata needed to record a `NotificationEvent` for each recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMeta {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub origin_address: String,
    pub chain_id: i64,
    pub subject_comment_id: String,
    pub target_comment_id: Option<String>,
    pub parent_comment_id: Option<String>,
    pub reaction_type: Option<String>,
    pub group_key: Option<String>,
}

/// Message on the `notifications` queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationJob {
    /// Content author whose delegated app accounts should be notified
    pub author: String,
    pub notification: PushNotification,
    /// Explicit destinations; bypasses approval resolution when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_user_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<EventMeta>,
}

impl NotificationJob {
    /// Chain the job refers to, read from the event metadata or the `chainId` data field.
    pub fn chain_id(&self) -> Option<i64> {
        if let Some(event) = &self.event {
            return Some(event.chain_id);
        }
        self.notification
            .data
            .as_ref()
            .and_then(|d| d.get("chainId"))
            .and_then(|v| v.as_i64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
    }
}

/// An immutable record of a notification delivered to one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    /// Time-ordered UUID (v7)
    pub id: Uuid,
    pub user_id: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub origin_address: String,
    pub chain_id: i64,
    pub subject_comment_id: String,
    pub target_comment_id: Option<String>,
    pub parent_comment_id: Option<String>,
    pub reaction_type: Option<String>,
    pub group_key: Option<String>,
    pub title: String,
    pub body: String,
    pub badge: Option<i32>,
    pub sound: Option<String>,
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

impl NotificationEvent {
    /// Build the event row recorded for `user_id` when a job is fanned out.
    pub fn record(user_id: &str, meta: &EventMeta, notification: &PushNotification) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id: normalize_address(user_id),
            kind: meta.kind,
            origin_address: normalize_address(&meta.origin_address),
            chain_id: meta.chain_id,
            subject_comment_id: meta.subject_comment_id.clone(),
            target_comment_id: meta.target_comment_id.clone(),
            parent_comment_id: meta.parent_comment_id.clone(),
            reaction_type: meta.reaction_type.clone(),
            group_key: meta.group_key.clone(),
            title: notification.title.clone(),
            body: notification.body.clone(),
            badge: notification
                .badge
                .as_ref()
                .and_then(|b| b.as_i64())
                .and_then(|b| i32::try_from(b).ok()),
            sound: notification
                .sound
                .as_ref()
                .and_then(|s| s.as_str())
                .map(str::to_string),
            data: notification
                .data
                .clone()
                .map(Value::Object)
                .unwrap_or_else(|| Value::Object(Map::new())),
            created_at: Utc::now(),
        }
    }

    /// Address of the parent comment's author, if the event carries one.
    pub fn parent_address(&self) -> Option<&str> {
        self.data.get("parentAddress").and_then(|v| v.as_str())
    }
}
