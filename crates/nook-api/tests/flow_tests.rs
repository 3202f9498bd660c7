/// End-to-end handler flows: signed and anonymous posting, the password
/// gate with its fixed failure delay, admin-gated visibility changes, and
/// user registration. Handlers are invoked directly with real extractor
/// values against a temp-file database, with signatures produced by a
/// live secp256k1 key.

use std::fs;
use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use k256::ecdsa::SigningKey;
use k256::ecdsa::signature::hazmat::PrehashSigner;
use uuid::Uuid;

use nook_api::messages::{self, MessagesQuery, PASSWORD_FAIL_DELAY};
use nook_api::rooms::{self, RoomsQuery, SearchRoomsQuery};
use nook_api::users;
use nook_api::{ApiError, AppState, AppStateInner};
use nook_auth::{AdminKeys, AuthError, MessageEvent, VisibilityEvent};
use nook_db::{Database, StoreError};
use nook_types::api::{
    CreateRoomRequest, RegisterUserRequest, SendMessageRequest, SetVerifiedRequest,
    UpdateVisibilityRequest,
};
use nook_types::models::{Message, Room};

fn test_state(name: &str, admin_keys: AdminKeys, sig_max_age_secs: u64) -> AppState {
    let path = std::env::temp_dir().join(format!("nook_flow_{}_{}.db", name, std::process::id()));
    let _ = fs::remove_file(&path);
    let _ = fs::remove_file(path.with_extension("db-wal"));
    let _ = fs::remove_file(path.with_extension("db-shm"));
    let db = Database::open(&path).unwrap();
    Arc::new(AppStateInner {
        db,
        admin_keys,
        sig_max_age_secs,
    })
}

struct Signer {
    key: SigningKey,
    pubkey: String,
}

fn signer(seed: u8) -> Signer {
    let key = SigningKey::from_slice(&[seed; 32]).unwrap();
    let pubkey = hex::encode(key.verifying_key().to_encoded_point(true).as_bytes());
    Signer { key, pubkey }
}

impl Signer {
    fn sign_message(&self, timestamp: i64, content: &str, room: &str) -> String {
        let digest = MessageEvent {
            pubkey: &self.pubkey,
            timestamp,
            content,
            room,
        }
        .digest();
        let signature: k256::ecdsa::Signature = self.key.sign_prehash(digest.as_bytes()).unwrap();
        hex::encode(signature.to_bytes())
    }

    fn sign_visibility(&self, timestamp: i64, room: &str, hidden: bool) -> String {
        let digest = VisibilityEvent {
            pubkey: &self.pubkey,
            timestamp,
            room,
            hidden,
        }
        .digest();
        let signature: k256::ecdsa::Signature = self.key.sign_prehash(digest.as_bytes()).unwrap();
        hex::encode(signature.to_bytes())
    }
}

fn anon_request(user: &str, content: &str) -> SendMessageRequest {
    SendMessageRequest {
        user: user.to_string(),
        content: content.to_string(),
        signature: None,
        pubkey: None,
        timestamp: None,
        room_password: None,
    }
}

async fn post(
    state: &AppState,
    room: &str,
    req: SendMessageRequest,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    messages::send_message(State(state.clone()), Path(room.to_string()), Json(req)).await
}

async fn read(state: &AppState, room: &str, password: &str) -> Result<Vec<Message>, ApiError> {
    messages::get_messages(
        State(state.clone()),
        Path(room.to_string()),
        Query(MessagesQuery {
            password: password.to_string(),
            limit: None,
        }),
    )
    .await
    .map(|Json(messages)| messages)
}

async fn create_room(
    state: &AppState,
    name: &str,
    password: Option<&str>,
) -> Result<(StatusCode, Json<Room>), ApiError> {
    rooms::create_room(
        State(state.clone()),
        Json(CreateRoomRequest {
            name: name.to_string(),
            password: password.map(str::to_string),
        }),
    )
    .await
}

async fn visible_rooms(state: &AppState, visited: &str) -> Vec<Room> {
    let Json(rooms) = rooms::list_rooms(
        State(state.clone()),
        Query(RoomsQuery {
            visited: visited.to_string(),
        }),
    )
    .await
    .unwrap();
    rooms
}

async fn set_visibility(
    state: &AppState,
    room: &str,
    req: UpdateVisibilityRequest,
) -> Result<(), ApiError> {
    rooms::update_visibility(State(state.clone()), Path(room.to_string()), Json(req))
        .await
        .map(|_| ())
}

#[tokio::test]
async fn signed_message_round_trip_registers_user() {
    let state = test_state("signed_post", AdminKeys::default(), 0);
    let alice = signer(0x42);
    let ts = 1_700_000_100;
    let signature = alice.sign_message(ts, "hi", "general");

    let (status, Json(message)) = post(
        &state,
        "general",
        SendMessageRequest {
            user: "alice".to_string(),
            content: "hi".to_string(),
            signature: Some(signature.clone()),
            pubkey: Some(alice.pubkey.clone()),
            timestamp: Some(ts),
            room_password: None,
        },
    )
    .await
    .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_ne!(message.id, Uuid::nil());
    assert_eq!(message.room, "general");
    // Credentials are stored verbatim.
    assert_eq!(message.signature.as_deref(), Some(signature.as_str()));
    assert_eq!(message.pubkey.as_deref(), Some(alice.pubkey.as_str()));
    assert_eq!(message.signed_timestamp, Some(ts));

    // The pubkey was observed: user exists, unverified, one post.
    let Json(profile) = users::get_user(State(state.clone()), Path(alice.pubkey.clone()))
        .await
        .unwrap();
    assert!(!profile.verified);
    assert_eq!(profile.post_count, 1);

    let messages = read(&state, "general", "").await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].user, "alice");
    assert_eq!(messages[0].content, "hi");
}

#[tokio::test]
async fn anonymous_post_is_accepted_without_credentials() {
    let state = test_state("anon_post", AdminKeys::default(), 0);

    let (status, Json(message)) = post(&state, "general", anon_request("guest", "hello"))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert!(message.signature.is_none());
    assert!(message.pubkey.is_none());
    assert!(message.signed_timestamp.is_none());

    // No user record appears for anonymous posts.
    let Json(all_users) = users::list_users(State(state.clone())).await.unwrap();
    assert!(all_users.is_empty());
}

#[tokio::test]
async fn partial_credentials_post_as_unauthenticated_chat() {
    let state = test_state("partial_creds", AdminKeys::default(), 0);
    let alice = signer(0x42);
    let ts = 1_700_000_100;

    // Signature but no timestamp: verification is skipped, the post
    // lands as plain chat, and the supplied fields stay on the message.
    let signature = alice.sign_message(ts, "hi", "general");
    let mut req = anon_request("alice", "hi");
    req.pubkey = Some(alice.pubkey.clone());
    req.signature = Some(signature.clone());

    let (status, Json(message)) = post(&state, "general", req).await.unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(message.pubkey.as_deref(), Some(alice.pubkey.as_str()));
    assert_eq!(message.signature.as_deref(), Some(signature.as_str()));
    assert!(message.signed_timestamp.is_none());

    // No signature at all: same deal, the sent fields are kept.
    let mut req = anon_request("alice", "again");
    req.pubkey = Some(alice.pubkey.clone());
    req.timestamp = Some(ts);
    let (status, Json(message)) = post(&state, "general", req).await.unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert!(message.signature.is_none());
    assert_eq!(message.signed_timestamp, Some(ts));

    // Empty strings and a zero timestamp are how clients omit fields.
    let mut req = anon_request("guest", "third");
    req.pubkey = Some(String::new());
    req.signature = Some(String::new());
    req.timestamp = Some(0);
    let (status, Json(message)) = post(&state, "general", req).await.unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert!(message.pubkey.is_none());
    assert!(message.signature.is_none());
    assert!(message.signed_timestamp.is_none());

    // The unverified pubkey still registers its user, and every post
    // that carried it counts.
    let Json(profile) = users::get_user(State(state.clone()), Path(alice.pubkey.clone()))
        .await
        .unwrap();
    assert!(!profile.verified);
    assert_eq!(profile.post_count, 2);

    let messages = read(&state, "general", "").await.unwrap();
    assert_eq!(messages.len(), 3);
}

#[tokio::test]
async fn tampered_content_is_rejected_and_not_persisted() {
    let state = test_state("tampered", AdminKeys::default(), 0);
    let alice = signer(0x42);
    let ts = 1_700_000_100;

    // Seed the room so the failed post can be distinguished from a
    // missing room on read-back.
    post(&state, "general", anon_request("guest", "seed"))
        .await
        .unwrap();

    let mut req = anon_request("alice", "hi there"); // content differs from what was signed
    req.pubkey = Some(alice.pubkey.clone());
    req.signature = Some(alice.sign_message(ts, "hi", "general"));
    req.timestamp = Some(ts);

    let err = post(&state, "general", req).await.unwrap_err();
    assert!(matches!(err, ApiError::Auth(AuthError::SignatureMismatch)));

    let messages = read(&state, "general", "").await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "seed");
}

#[tokio::test]
async fn wrong_password_and_unknown_room_both_cost_the_delay() {
    let state = test_state("gate_delay", AdminKeys::default(), 0);
    create_room(&state, "vault", Some("s3cret!")).await.unwrap();

    let started = Instant::now();
    let err = read(&state, "vault", "wrong").await.unwrap_err();
    let wrong_password_elapsed = started.elapsed();
    assert!(matches!(err, ApiError::Auth(AuthError::InvalidPassword)));
    assert!(wrong_password_elapsed >= PASSWORD_FAIL_DELAY);

    let started = Instant::now();
    let err = read(&state, "no-such-room", "").await.unwrap_err();
    let unknown_room_elapsed = started.elapsed();
    assert!(matches!(err, ApiError::Store(StoreError::RoomNotFound(_))));
    assert!(unknown_room_elapsed >= PASSWORD_FAIL_DELAY);
}

#[tokio::test]
async fn password_room_gates_reads_and_posts() {
    let state = test_state("password_room", AdminKeys::default(), 0);

    let (status, Json(room)) = create_room(&state, "vault", Some("s3cret!")).await.unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert!(room.has_password);

    // Posting without the password fails; with the wrong one fails; the
    // exact secret is required (case-sensitive).
    let err = post(&state, "vault", anon_request("bob", "knock"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Auth(AuthError::InvalidPassword)));

    let mut req = anon_request("bob", "knock");
    req.room_password = Some("S3cret!".to_string());
    let err = post(&state, "vault", req).await.unwrap_err();
    assert!(matches!(err, ApiError::Auth(AuthError::InvalidPassword)));

    let mut req = anon_request("bob", "knock");
    req.room_password = Some("s3cret!".to_string());
    let (status, _) = post(&state, "vault", req).await.unwrap();
    assert_eq!(status, StatusCode::CREATED);

    // Reads are gated the same way.
    assert!(read(&state, "vault", "").await.is_err());
    let messages = read(&state, "vault", "s3cret!").await.unwrap();
    assert_eq!(messages.len(), 1);

    // An open room admits any presented password.
    post(&state, "lobby", anon_request("bob", "hi")).await.unwrap();
    assert!(read(&state, "lobby", "anything").await.is_ok());
}

#[tokio::test]
async fn visibility_change_requires_fresh_admin_signature() {
    let admin = signer(0x42);
    let outsider = signer(0x43);
    let state = test_state(
        "visibility",
        AdminKeys::new([admin.pubkey.clone()]),
        600,
    );
    create_room(&state, "general", None).await.unwrap();

    // No credentials at all: rejected outright, never treated as anonymous.
    let err = set_visibility(
        &state,
        "general",
        UpdateVisibilityRequest {
            hidden: true,
            pubkey: None,
            signature: None,
            timestamp: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::Auth(AuthError::MissingCredential)));

    // A valid, fresh signature from a non-admin key authenticates but
    // does not authorize.
    let now = Utc::now().timestamp();
    let err = set_visibility(
        &state,
        "general",
        UpdateVisibilityRequest {
            hidden: true,
            pubkey: Some(outsider.pubkey.clone()),
            signature: Some(outsider.sign_visibility(now, "general", true)),
            timestamp: Some(now),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
    assert_eq!(visible_rooms(&state, "").await.len(), 1);

    // A stale admin signature fails the freshness window.
    let stale = now - 3_600;
    let err = set_visibility(
        &state,
        "general",
        UpdateVisibilityRequest {
            hidden: true,
            pubkey: Some(admin.pubkey.clone()),
            signature: Some(admin.sign_visibility(stale, "general", true)),
            timestamp: Some(stale),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::Auth(AuthError::StaleSignature)));

    // An admin signature over the wrong hidden value is a mismatch.
    let err = set_visibility(
        &state,
        "general",
        UpdateVisibilityRequest {
            hidden: true,
            pubkey: Some(admin.pubkey.clone()),
            signature: Some(admin.sign_visibility(now, "general", false)),
            timestamp: Some(now),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::Auth(AuthError::SignatureMismatch)));
    assert_eq!(visible_rooms(&state, "").await.len(), 1);

    // The real thing: room goes hidden and drops out of listings.
    set_visibility(
        &state,
        "general",
        UpdateVisibilityRequest {
            hidden: true,
            pubkey: Some(admin.pubkey.clone()),
            signature: Some(admin.sign_visibility(now, "general", true)),
            timestamp: Some(now),
        },
    )
    .await
    .unwrap();
    assert!(visible_rooms(&state, "").await.is_empty());
    // Hidden beats the visited hint.
    assert!(visible_rooms(&state, "general").await.is_empty());

    // And back.
    set_visibility(
        &state,
        "general",
        UpdateVisibilityRequest {
            hidden: false,
            pubkey: Some(admin.pubkey.clone()),
            signature: Some(admin.sign_visibility(now, "general", false)),
            timestamp: Some(now),
        },
    )
    .await
    .unwrap();
    assert_eq!(visible_rooms(&state, "").await.len(), 1);
}

#[tokio::test]
async fn room_creation_validates_name_and_password_bounds() {
    let state = test_state("room_validation", AdminKeys::default(), 0);

    let err = create_room(&state, "", None).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidRequest(_)));

    let long = "x".repeat(51);
    let err = create_room(&state, &long, None).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidRequest(_)));

    let err = create_room(&state, "vault", Some("abc")).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidRequest(_)));

    create_room(&state, "vault", Some("abcd")).await.unwrap();
    let err = create_room(&state, "vault", None).await.unwrap_err();
    assert!(matches!(err, ApiError::Store(StoreError::RoomAlreadyExists(_))));
}

#[tokio::test]
async fn user_registration_requires_a_real_compressed_point() {
    let state = test_state("user_registration", AdminKeys::default(), 0);
    let alice = signer(0x44);

    let (status, Json(user)) = users::register_user(
        State(state.clone()),
        Json(RegisterUserRequest {
            public_key: alice.pubkey.clone(),
        }),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert!(!user.verified);

    let err = users::register_user(
        State(state.clone()),
        Json(RegisterUserRequest {
            public_key: alice.pubkey.clone(),
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::Store(StoreError::UserAlreadyExists(_))));

    // Uncompressed, off-curve, truncated, and non-hex keys are all rejected.
    let uncompressed = hex::encode(
        alice
            .key
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes(),
    );
    let overflow_x = "02".to_owned() + &"ff".repeat(32);
    for bad in [uncompressed.as_str(), overflow_x.as_str(), "0369", "zz"] {
        let err = users::register_user(
            State(state.clone()),
            Json(RegisterUserRequest {
                public_key: bad.to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert!(
            matches!(err, ApiError::Auth(AuthError::InvalidPublicKey(_))),
            "key {bad:?} should be rejected"
        );
    }
}

#[tokio::test]
async fn verification_flag_toggles_and_rejects_unknown_keys() {
    let state = test_state("verification", AdminKeys::default(), 0);
    let alice = signer(0x44);
    users::register_user(
        State(state.clone()),
        Json(RegisterUserRequest {
            public_key: alice.pubkey.clone(),
        }),
    )
    .await
    .unwrap();

    let Json(user) = users::set_verified(
        State(state.clone()),
        Path(alice.pubkey.clone()),
        Json(SetVerifiedRequest { verified: true }),
    )
    .await
    .unwrap();
    assert!(user.verified);

    let Json(user) = users::set_verified(
        State(state.clone()),
        Path(alice.pubkey.clone()),
        Json(SetVerifiedRequest { verified: false }),
    )
    .await
    .unwrap();
    assert!(!user.verified);

    let err = users::set_verified(
        State(state.clone()),
        Path("02ab".to_string()),
        Json(SetVerifiedRequest { verified: true }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::Store(StoreError::UserNotFound(_))));
}

#[tokio::test]
async fn search_respects_visited_and_strips_protected_previews() {
    let state = test_state("search_flow", AdminKeys::default(), 0);
    create_room(&state, "vault", Some("s3cret!")).await.unwrap();
    post(&state, "lobby", anon_request("alice", "open chatter"))
        .await
        .unwrap();
    let mut req = anon_request("bob", "secret chatter");
    req.room_password = Some("s3cret!".to_string());
    post(&state, "vault", req).await.unwrap();

    // Without a visited hint the protected room is absent entirely.
    let Json(found) = rooms::search_rooms(
        State(state.clone()),
        Query(SearchRoomsQuery {
            q: String::new(),
            visited: String::new(),
        }),
    )
    .await
    .unwrap();
    let names: Vec<&str> = found.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["lobby"]);
    assert_eq!(found[0].last_message_content.as_deref(), Some("open chatter"));

    // Visited brings it back, but never its message preview.
    let Json(found) = rooms::search_rooms(
        State(state.clone()),
        Query(SearchRoomsQuery {
            q: "vau".to_string(),
            visited: "vault".to_string(),
        }),
    )
    .await
    .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "vault");
    assert_eq!(found[0].message_count, 1);
    assert!(found[0].last_message_content.is_none());
    assert!(found[0].last_message_user.is_none());
}

#[test]
fn errors_render_with_the_right_status() {
    let cases = [
        (
            ApiError::Auth(AuthError::MissingCredential),
            StatusCode::BAD_REQUEST,
        ),
        (
            ApiError::Auth(AuthError::InvalidPassword),
            StatusCode::UNAUTHORIZED,
        ),
        (
            ApiError::Auth(AuthError::SignatureMismatch),
            StatusCode::UNAUTHORIZED,
        ),
        (
            ApiError::Auth(AuthError::StaleSignature),
            StatusCode::UNAUTHORIZED,
        ),
        (ApiError::Unauthorized, StatusCode::FORBIDDEN),
        (
            ApiError::Store(StoreError::RoomNotFound("x".into())),
            StatusCode::NOT_FOUND,
        ),
        (
            ApiError::Store(StoreError::RoomAlreadyExists("x".into())),
            StatusCode::CONFLICT,
        ),
    ];
    for (err, expected) in cases {
        assert_eq!(err.into_response().status(), expected);
    }
}

#[tokio::test]
async fn error_body_carries_machine_readable_code() {
    let response = ApiError::Auth(AuthError::InvalidPassword).into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "invalid_password");
    assert_eq!(body["message"], "invalid password");
}
