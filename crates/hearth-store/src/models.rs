//! Domain records stored as documents.
//!
//! Every struct derives `Serialize` and `Deserialize` with camelCase field
//! names, which is the on-store document shape.  Record ids are the last path
//! segment of the document; they are never serialized into the body and are
//! filled in by [`Document::decode`](crate::Document::decode).
//!
//! Timestamps inside documents are epoch milliseconds.

use chrono::{DateTime, Utc};
use hearth_shared::{ChannelId, RequestId, UserId};
use serde::{Deserialize, Serialize};

/// Current time as epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

// ---------------------------------------------------------------------------
// User profile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Online,
    Idle,
    #[serde(rename = "dnd")]
    DoNotDisturb,
    Invisible,
}

/// Private profile of a user, stored under that user's namespace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: UserId,
    pub username: String,
    /// `None` for anonymous accounts.
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub status: UserStatus,
}

/// Public, searchable projection of a profile.  Never carries the email.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub uid: UserId,
    pub username: String,
    /// Lower-cased username, the field prefix searches run against.
    pub username_lower: String,
}

impl DirectoryEntry {
    pub fn new(uid: UserId, username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            uid,
            username_lower: username.to_lowercase(),
            username,
        }
    }
}

// ---------------------------------------------------------------------------
// Friend requests & edges
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Declined,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Declined => "declined",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A friend request from `sender` to `receiver`.
///
/// Created `pending` by the sender and resolved exactly once by the receiver.
/// Requests are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequest {
    #[serde(default, skip_serializing)]
    pub id: RequestId,
    pub sender_id: UserId,
    pub sender_username: String,
    pub receiver_id: UserId,
    pub receiver_username: String,
    pub status: RequestStatus,
    pub created_at: i64,
}

impl FriendRequest {
    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }
}

/// One side of a friendship, stored under the owner's namespace and keyed by
/// the friend's uid.  Always written in symmetric pairs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FriendEdge {
    pub uid: UserId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<i64>,
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// Two-member channel created when a friend request is accepted.
    Dm,
    /// Named channel created explicitly by its owner.
    Group,
}

/// A conversation channel (DM or group).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    #[serde(default, skip_serializing)]
    pub id: ChannelId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ChannelKind,
    pub members: Vec<UserId>,
    pub owner_id: UserId,
    /// May be missing on records written by older clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

impl Channel {
    /// Sort key for display ordering; a missing timestamp counts as 0.
    pub fn created_at_or_zero(&self) -> i64 {
        self.created_at.unwrap_or(0)
    }

    pub fn is_member(&self, uid: &UserId) -> bool {
        self.members.contains(uid)
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    /// `content` is the URL of the selected GIF.
    Gif,
    System,
}

/// A single chat message.  Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default, skip_serializing)]
    pub id: String,
    pub sender_id: UserId,
    pub sender_username: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub timestamp: i64,
}

// ---------------------------------------------------------------------------
// Account (local identity provider)
// ---------------------------------------------------------------------------

/// A locally registered account.  Lives in its own table, not in documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub uid: UserId,
    /// `None` for anonymous accounts.
    pub email: Option<String>,
    pub display_name: Option<String>,
    /// Hex-encoded random salt.
    pub password_salt: Option<String>,
    /// Hex-encoded BLAKE3 password hash.
    pub password_hash: Option<String>,
    pub is_anonymous: bool,
    pub created_at: DateTime<Utc>,
}
