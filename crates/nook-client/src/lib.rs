//! HTTP client for a nook server.
//!
//! Covers the unauthenticated surface: anonymous posting, reading open
//! rooms, and room listing/creation. Signed posting needs a secp256k1
//! key and a canonical-event signer, which belong to the caller, not
//! this crate.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use nook_types::api::{CreateRoomRequest, SendMessageRequest};
use nook_types::models::{Message, Room};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Api { status: StatusCode, message: String },
}

pub struct Client {
    base_url: String,
    http: reqwest::Client,
}

impl Client {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let base_url: String = base_url.into();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Post an anonymous message to a room. The room is created on the
    /// fly if it does not exist yet.
    pub async fn send_message(
        &self,
        room: &str,
        user: &str,
        content: &str,
    ) -> Result<Message, ClientError> {
        let req = SendMessageRequest {
            user: user.to_string(),
            content: content.to_string(),
            signature: None,
            pubkey: None,
            timestamp: None,
            room_password: None,
        };
        let resp = self
            .http
            .post(format!("{}/api/rooms/{}/messages", self.base_url, room))
            .json(&req)
            .send()
            .await?;
        json_or_error(resp).await
    }

    /// Messages of a room, oldest first.
    pub async fn get_messages(&self, room: &str) -> Result<Vec<Message>, ClientError> {
        let resp = self
            .http
            .get(format!("{}/api/rooms/{}/messages", self.base_url, room))
            .send()
            .await?;
        json_or_error(resp).await
    }

    /// Rooms visible to an unauthenticated caller.
    pub async fn get_rooms(&self) -> Result<Vec<Room>, ClientError> {
        let resp = self
            .http
            .get(format!("{}/api/rooms", self.base_url))
            .send()
            .await?;
        json_or_error(resp).await
    }

    pub async fn create_room(
        &self,
        name: &str,
        password: Option<&str>,
    ) -> Result<Room, ClientError> {
        let req = CreateRoomRequest {
            name: name.to_string(),
            password: password.map(str::to_string),
        };
        let resp = self
            .http
            .post(format!("{}/api/rooms", self.base_url))
            .json(&req)
            .send()
            .await?;
        json_or_error(resp).await
    }
}

async fn json_or_error<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let message = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, message });
    }
    Ok(resp.json::<T>().await?)
}
