use std::time::Duration;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use nook_auth::{MessageCredentials, check_room_password, verify_message};
use nook_db::StoreError;
use nook_db::models::{MessageRow, NewMessage};
use nook_types::api::SendMessageRequest;
use nook_types::models::Message;

use crate::error::ApiError;
use crate::state::{AppState, run_blocking};

/// Fixed delay imposed on every failed room gate check, wrong password
/// and unknown room alike, so the two cannot be told apart by timing.
/// The sleep runs after the store call returns and holds no lock.
pub const PASSWORD_FAIL_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    #[serde(default)]
    pub password: String,
    /// When set, only the most recent `limit` messages come back,
    /// still oldest-first.
    pub limit: Option<u32>,
}

pub async fn get_messages(
    State(state): State<AppState>,
    Path(room): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let password = query.password;
    let db = state.clone();
    let name = room.clone();
    let gate = run_blocking(move || {
        let row = db.db.get_room(&name)?;
        check_room_password(row.password_hash.as_deref(), &password)?;
        Ok(())
    })
    .await;

    if let Err(err) = gate {
        warn!("read gate failed for room {}: {}", room, err);
        tokio::time::sleep(PASSWORD_FAIL_DELAY).await;
        return Err(err);
    }

    let limit = query.limit;
    let db = state.clone();
    let rows = run_blocking(move || Ok(db.db.list_messages(&room, limit)?)).await?;
    Ok(Json(rows.into_iter().map(row_to_message).collect()))
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(room): Path<String>,
    Json(mut req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    if req.user.is_empty() {
        return Err(ApiError::InvalidRequest("user is required".into()));
    }
    if req.content.is_empty() {
        return Err(ApiError::InvalidRequest("content is required".into()));
    }

    // Gate first. Unknown rooms pass, since they get auto-created open
    // on save, but an existing protected room must match the presented
    // password before anything else is looked at.
    let presented = req.room_password.clone().unwrap_or_default();
    let db = state.clone();
    let name = room.clone();
    let gate = run_blocking(move || match db.db.get_room(&name) {
        Ok(row) => Ok(check_room_password(row.password_hash.as_deref(), &presented)?),
        Err(StoreError::RoomNotFound(_)) => Ok(()),
        Err(e) => Err(e.into()),
    })
    .await;

    if let Err(err) = gate {
        warn!("post gate failed for room {}: {}", room, err);
        tokio::time::sleep(PASSWORD_FAIL_DELAY).await;
        return Err(err);
    }

    // Chat is lenient where visibility is strict: only a complete
    // credential trio is verified; anything less posts as plain
    // unauthenticated chat, with whatever fields were supplied stored
    // as they arrived. A complete trio that fails verification is
    // still an error.
    let credentials =
        MessageCredentials::normalize(req.pubkey.take(), req.signature.take(), req.timestamp);
    if let Some((pubkey, signature, timestamp)) = credentials.complete() {
        verify_message(pubkey, signature, timestamp, &req.content, &room)?;
    }

    let id = Uuid::new_v4();
    let db = state.clone();
    let row = run_blocking(move || {
        let id = id.to_string();
        Ok(db.db.save_message(NewMessage {
            id: &id,
            room: &room,
            author: &req.user,
            content: &req.content,
            signature: credentials.signature.as_deref(),
            pubkey: credentials.pubkey.as_deref(),
            signed_timestamp: credentials.timestamp,
        })?)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(row_to_message(row))))
}

fn row_to_message(row: MessageRow) -> Message {
    let id: Uuid = row.id.parse().unwrap_or_else(|e| {
        warn!("Corrupt message id '{}': {}", row.id, e);
        Uuid::default()
    });
    let timestamp = row.timestamp.parse::<DateTime<Utc>>().unwrap_or_else(|e| {
        warn!("Corrupt timestamp '{}' on message '{}': {}", row.timestamp, row.id, e);
        DateTime::default()
    });

    Message {
        id,
        room: row.room,
        user: row.author,
        content: row.content,
        timestamp,
        signature: row.signature,
        pubkey: row.pubkey,
        signed_timestamp: row.signed_timestamp,
    }
}
