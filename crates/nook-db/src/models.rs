/// Database row types, mapped directly from SQLite rows.
/// Distinct from nook-types API models to keep the DB layer independent.

pub struct RoomRow {
    pub name: String,
    pub hidden: bool,
    pub password_hash: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Room plus the aggregates the listing endpoints need. Preview fields are
/// only populated by search queries; plain listings leave them `None`.
pub struct RoomSummary {
    pub name: String,
    pub hidden: bool,
    pub has_password: bool,
    pub message_count: i64,
    pub last_message_content: Option<String>,
    pub last_message_user: Option<String>,
    pub last_message_timestamp: Option<String>,
}

pub struct UserRow {
    pub public_key: String,
    pub verified: bool,
    pub created_at: String,
    pub updated_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub room: String,
    pub author: String,
    pub content: String,
    pub timestamp: String,
    pub signature: Option<String>,
    pub pubkey: Option<String>,
    pub signed_timestamp: Option<i64>,
}

/// Input for [`crate::Database::save_message`]. The store stamps the arrival
/// timestamp itself so persisted order can never be skewed by client clocks.
pub struct NewMessage<'a> {
    pub id: &'a str,
    pub room: &'a str,
    pub author: &'a str,
    pub content: &'a str,
    pub signature: Option<&'a str>,
    pub pubkey: Option<&'a str>,
    pub signed_timestamp: Option<i64>,
}
