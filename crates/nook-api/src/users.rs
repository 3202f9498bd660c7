use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use nook_auth::{AuthError, decode_pubkey};
use nook_db::models::UserRow;
use nook_types::api::{RegisterUserRequest, SetVerifiedRequest};
use nook_types::models::{User, UserProfile};

use crate::error::ApiError;
use crate::state::{AppState, run_blocking};

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, ApiError> {
    let db = state.clone();
    let rows = run_blocking(move || Ok(db.db.list_users()?)).await?;
    Ok(Json(rows.into_iter().map(row_to_user).collect()))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(public_key): Path<String>,
) -> Result<Json<UserProfile>, ApiError> {
    let db = state.clone();
    let (row, post_count) =
        run_blocking(move || Ok(db.db.get_user_with_post_count(&public_key)?)).await?;
    Ok(Json(to_profile(row, post_count)))
}

pub async fn register_user(
    State(state): State<AppState>,
    Json(req): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    // The key must be a real compressed secp256k1 point, not just any
    // hex string: 33 bytes and on the curve.
    if req.public_key.len() != 66 {
        return Err(AuthError::InvalidPublicKey(
            "expected a 33-byte compressed point in hex".into(),
        )
        .into());
    }
    decode_pubkey(&req.public_key)?;

    let db = state.clone();
    let row = run_blocking(move || Ok(db.db.register_user(&req.public_key)?)).await?;

    info!("user {} registered", row.public_key);
    Ok((StatusCode::CREATED, Json(row_to_user(row))))
}

/// Toggle the trust flag. The flag is advisory: any caller may set it,
/// and holding it grants no privileges anywhere in the API.
pub async fn set_verified(
    State(state): State<AppState>,
    Path(public_key): Path<String>,
    Json(req): Json<SetVerifiedRequest>,
) -> Result<Json<User>, ApiError> {
    let verified = req.verified;
    let db = state.clone();
    let row = run_blocking(move || Ok(db.db.set_user_verified(&public_key, verified)?)).await?;

    info!("user {} verified={}", row.public_key, row.verified);
    Ok(Json(row_to_user(row)))
}

fn parse_timestamp(value: &str, public_key: &str) -> DateTime<Utc> {
    value.parse::<DateTime<Utc>>().unwrap_or_else(|e| {
        warn!("Corrupt timestamp '{}' on user '{}': {}", value, public_key, e);
        DateTime::default()
    })
}

fn row_to_user(row: UserRow) -> User {
    User {
        verified: row.verified,
        created_at: parse_timestamp(&row.created_at, &row.public_key),
        updated_at: parse_timestamp(&row.updated_at, &row.public_key),
        public_key: row.public_key,
    }
}

fn to_profile(row: UserRow, post_count: i64) -> UserProfile {
    UserProfile {
        verified: row.verified,
        created_at: parse_timestamp(&row.created_at, &row.public_key),
        updated_at: parse_timestamp(&row.updated_at, &row.public_key),
        public_key: row.public_key,
        post_count,
    }
}
