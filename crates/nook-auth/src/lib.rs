//! Authentication core for the nook chat server.
//!
//! Rooms and messages are authenticated without sessions or tokens:
//! clients sign a canonical event digest with a secp256k1 key, and the
//! server verifies the signature before trusting the claimed pubkey.
//! Password-protected rooms are gated by an Argon2id hash check, and
//! privileged actions (room visibility) additionally require the signer
//! to be on a static admin allow-list.

pub mod admin;
pub mod event;
pub mod password;
pub mod verify;

use thiserror::Error;

pub use admin::AdminKeys;
pub use event::{EventDigest, MessageEvent, VisibilityEvent};
pub use password::{check_room_password, hash_password, verify_password};
pub use verify::{
    Credentials, MessageCredentials, SignatureBytes, check_signed_timestamp, decode_pubkey,
    decode_signature, verify_message, verify_signature, verify_visibility,
};

/// Errors from signature verification, credential handling, and the
/// password gate.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid signature encoding: {0}")]
    InvalidSignatureEncoding(String),

    #[error("signature does not match the signed event")]
    SignatureMismatch,

    #[error("pubkey, signature and timestamp must be provided together")]
    MissingCredential,

    #[error("signed timestamp is outside the acceptance window")]
    StaleSignature,

    #[error("invalid password")]
    InvalidPassword,

    #[error("password hash error: {0}")]
    PasswordHash(String),
}
