use std::collections::HashSet;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use nook_auth::{Credentials, check_signed_timestamp, hash_password, verify_visibility};
use nook_db::models::RoomSummary;
use nook_types::api::{CreateRoomRequest, UpdateVisibilityRequest, UpdateVisibilityResponse};
use nook_types::models::Room;

use crate::error::ApiError;
use crate::state::{AppState, run_blocking};

#[derive(Debug, Deserialize)]
pub struct RoomsQuery {
    /// Comma-separated room names the caller has already visited.
    #[serde(default)]
    pub visited: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchRoomsQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub visited: String,
}

pub async fn list_rooms(
    State(state): State<AppState>,
    Query(query): Query<RoomsQuery>,
) -> Result<Json<Vec<Room>>, ApiError> {
    let db = state.clone();
    let summaries = run_blocking(move || Ok(db.db.list_rooms()?)).await?;

    let visited = parse_visited(&query.visited);
    let rooms = filter_visible(summaries.into_iter().map(to_room).collect(), &visited);
    Ok(Json(rooms))
}

pub async fn search_rooms(
    State(state): State<AppState>,
    Query(query): Query<SearchRoomsQuery>,
) -> Result<Json<Vec<Room>>, ApiError> {
    let db = state.clone();
    let q = query.q;
    let summaries = run_blocking(move || Ok(db.db.search_rooms(&q)?)).await?;

    let visited = parse_visited(&query.visited);
    let mut rooms = filter_visible(summaries.into_iter().map(to_room).collect(), &visited);
    for room in &mut rooms {
        strip_protected_preview(room);
    }
    Ok(Json(rooms))
}

pub async fn create_room(
    State(state): State<AppState>,
    Json(req): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<Room>), ApiError> {
    let name_len = req.name.chars().count();
    if name_len == 0 || name_len > 50 {
        return Err(ApiError::InvalidRequest(
            "room name must be 1-50 characters".into(),
        ));
    }
    if let Some(password) = &req.password {
        let len = password.chars().count();
        if !(4..=72).contains(&len) {
            return Err(ApiError::InvalidRequest(
                "room password must be 4-72 characters".into(),
            ));
        }
    }

    // Only the hash ever reaches the store.
    let password_hash = match &req.password {
        Some(password) => Some(hash_password(password)?),
        None => None,
    };

    let db = state.clone();
    let row =
        run_blocking(move || Ok(db.db.create_room(&req.name, password_hash.as_deref())?)).await?;

    info!("room {} created (password: {})", row.name, row.password_hash.is_some());
    Ok((
        StatusCode::CREATED,
        Json(Room {
            name: row.name,
            has_password: row.password_hash.is_some(),
            hidden: row.hidden,
            message_count: 0,
            last_message_content: None,
            last_message_user: None,
            last_message_timestamp: None,
        }),
    ))
}

/// Flip a room's hidden flag. This is the privileged action: it demands
/// the full credential trio, a signature over the visibility digest, a
/// fresh signed timestamp, and admin membership, in that order, so that
/// authorization is never evaluated on an unverified identity claim.
pub async fn update_visibility(
    State(state): State<AppState>,
    Path(room): Path<String>,
    Json(req): Json<UpdateVisibilityRequest>,
) -> Result<Json<UpdateVisibilityResponse>, ApiError> {
    let credentials = Credentials::from_parts(
        req.pubkey.as_deref(),
        req.signature.as_deref(),
        req.timestamp,
    )?;
    let Credentials::Signed {
        pubkey,
        signature,
        timestamp,
    } = credentials
    else {
        return Err(nook_auth::AuthError::MissingCredential.into());
    };

    verify_visibility(&pubkey, &signature, timestamp, &room, req.hidden)?;
    check_signed_timestamp(timestamp, Utc::now().timestamp(), state.sig_max_age_secs)?;

    if !state.admin_keys.is_admin(&pubkey) {
        warn!("visibility change on {} rejected: {} is not an admin", room, pubkey);
        return Err(ApiError::Unauthorized);
    }

    let db = state.clone();
    let name = room.clone();
    let hidden = req.hidden;
    run_blocking(move || Ok(db.db.set_room_hidden(&name, hidden)?)).await?;

    info!("room {} hidden={} by {}", room, req.hidden, pubkey);
    Ok(Json(UpdateVisibilityResponse {
        name: room,
        hidden: req.hidden,
    }))
}

fn parse_visited(raw: &str) -> HashSet<String> {
    raw.split(',')
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// The listing policy: hidden rooms never appear, and password-protected
/// rooms only appear for callers who claim to have visited them. The
/// visited hint is a UI convenience supplied by the caller, not access
/// control; reading a protected room still goes through the password
/// gate.
fn filter_visible(rooms: Vec<Room>, visited: &HashSet<String>) -> Vec<Room> {
    rooms
        .into_iter()
        .filter(|room| !room.hidden && (!room.has_password || visited.contains(&room.name)))
        .collect()
}

/// Protected rooms never leak their latest message through listings,
/// visited or not.
fn strip_protected_preview(room: &mut Room) {
    if room.has_password {
        room.last_message_content = None;
        room.last_message_user = None;
        room.last_message_timestamp = None;
    }
}

fn to_room(summary: RoomSummary) -> Room {
    Room {
        name: summary.name,
        has_password: summary.has_password,
        hidden: summary.hidden,
        message_count: summary.message_count,
        last_message_content: summary.last_message_content,
        last_message_user: summary.last_message_user,
        last_message_timestamp: summary.last_message_timestamp,
    }
}
