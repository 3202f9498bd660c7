use serde::{Deserialize, Serialize};

// -- Rooms --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRoomRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Visibility changes always require the full pubkey/signature/timestamp
/// trio; the fields are optional here so the handler can reject a partial
/// set with a typed error instead of a generic deserialization failure.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateVisibilityRequest {
    pub hidden: bool,
    pub pubkey: Option<String>,
    pub signature: Option<String>,
    pub timestamp: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateVisibilityResponse {
    pub name: String,
    pub hidden: bool,
}

// -- Messages --

/// `timestamp` is the signed timestamp, not the receipt time. The
/// signature trio is all-or-nothing: all three present means the message
/// claims authenticated provenance, all three absent means anonymous.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub user: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pubkey: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_password: Option<String>,
}

// -- Users --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterUserRequest {
    pub public_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetVerifiedRequest {
    pub verified: bool,
}
