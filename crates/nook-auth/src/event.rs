//! Canonical event encoding and digests.
//!
//! Clients sign a SHA-256 digest of a JSON array, not the request body
//! itself, so the array layout is a wire contract shared with every
//! signer. Each event type projects its fields into a fixed-order tuple;
//! the tuple is what gets serialized, which makes the element order a
//! property of the type rather than a convention callers must remember.
//!
//! Serialization is compact JSON (`serde_json::to_vec`), which is
//! byte-identical to `JSON.stringify` in the browser signer for the
//! value alphabet used here: integers, booleans, and UTF-8 strings.

use sha2::{Digest, Sha256};

/// Leading element of every signed event tuple. Bump on any change to
/// tuple shapes; existing signatures become invalid by construction.
pub const EVENT_VERSION: u8 = 0;

const VISIBILITY_ACTION: &str = "update_room_visibility";

/// 256-bit digest of a canonical event, the value actually signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventDigest([u8; 32]);

impl EventDigest {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex form, as it appears in logs and client tooling.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// A message post to be signed: `[0, pubkey, timestamp, content, room]`.
#[derive(Debug, Clone, Copy)]
pub struct MessageEvent<'a> {
    pub pubkey: &'a str,
    pub timestamp: i64,
    pub content: &'a str,
    pub room: &'a str,
}

impl MessageEvent<'_> {
    pub fn digest(&self) -> EventDigest {
        let tuple = (
            EVENT_VERSION,
            self.pubkey,
            self.timestamp,
            self.content,
            self.room,
        );
        hash_tuple(&tuple)
    }
}

/// A room visibility change to be signed:
/// `[0, pubkey, timestamp, "update_room_visibility", room, hidden]`.
#[derive(Debug, Clone, Copy)]
pub struct VisibilityEvent<'a> {
    pub pubkey: &'a str,
    pub timestamp: i64,
    pub room: &'a str,
    pub hidden: bool,
}

impl VisibilityEvent<'_> {
    pub fn digest(&self) -> EventDigest {
        let tuple = (
            EVENT_VERSION,
            self.pubkey,
            self.timestamp,
            VISIBILITY_ACTION,
            self.room,
            self.hidden,
        );
        hash_tuple(&tuple)
    }
}

fn hash_tuple<T: serde::Serialize>(tuple: &T) -> EventDigest {
    // Tuples of integers, booleans and strings always serialize.
    let bytes = serde_json::to_vec(tuple).expect("canonical tuple serialization is infallible");
    EventDigest(Sha256::digest(&bytes).into())
}
