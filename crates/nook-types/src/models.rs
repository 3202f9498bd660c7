use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chat room as returned by listing and search endpoints.
///
/// The last-message preview fields are stripped for password-protected
/// rooms before serialization so that protected content never leaks
/// through room listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub name: String,
    pub has_password: bool,
    pub hidden: bool,
    pub message_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_timestamp: Option<String>,
}

/// A chat message. `timestamp` is the server-assigned receipt time;
/// `signed_timestamp` is the value the author actually signed (present
/// only on signed messages, together with `signature` and `pubkey`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub room: String,
    pub user: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pubkey: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_timestamp: Option<i64>,
}

/// A user keyed by their hex-encoded compressed secp256k1 public key.
/// Created lazily the first time a pubkey appears on a signed message,
/// or explicitly via registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub public_key: String,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User detail view with the number of messages posted under their key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub public_key: String,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub post_count: i64,
}
