//! ECDSA signature verification over secp256k1.
//!
//! Wire forms: public keys are hex-encoded 33-byte compressed SEC1
//! points; signatures are hex-encoded, either 64-byte compact `r || s`
//! (big-endian, the browser signer's native output) or ASN.1 DER. The
//! encoding is classified once at decode time and each variant parses
//! itself. High-S signatures are normalized before verification so both
//! halves of a malleable pair validate, matching the reference backend.
//!
//! Everything here is pure: no clock, no I/O, no logging. Callers decide
//! what to log on a mismatch.

use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{Signature, VerifyingKey};

use crate::AuthError;
use crate::event::{EventDigest, MessageEvent, VisibilityEvent};

/// The pubkey/signature/timestamp trio demanded of privileged actions.
///
/// Classification is all-or-nothing: a request with none of the three is
/// a valid anonymous request, a request with all three claims signed
/// provenance, and anything in between is rejected outright rather than
/// silently downgraded to anonymous. Empty strings and a zero timestamp
/// count as absent, since that is how clients omit fields. Chat posts
/// are classified by the lenient [`MessageCredentials`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Anonymous,
    Signed {
        pubkey: String,
        signature: String,
        timestamp: i64,
    },
}

impl Credentials {
    pub fn from_parts(
        pubkey: Option<&str>,
        signature: Option<&str>,
        timestamp: Option<i64>,
    ) -> Result<Self, AuthError> {
        let pubkey = pubkey.filter(|s| !s.is_empty());
        let signature = signature.filter(|s| !s.is_empty());
        let timestamp = timestamp.filter(|ts| *ts != 0);

        match (pubkey, signature, timestamp) {
            (Some(p), Some(s), Some(ts)) => Ok(Credentials::Signed {
                pubkey: p.to_string(),
                signature: s.to_string(),
                timestamp: ts,
            }),
            (None, None, None) => Ok(Credentials::Anonymous),
            _ => Err(AuthError::MissingCredential),
        }
    }
}

/// Credential fields as supplied on a chat post, normalized so empty
/// strings and a zero timestamp count as absent.
///
/// Chat is lenient where privileged actions are strict: verification
/// applies only to a complete trio, and anything less makes the post
/// plain unauthenticated chat. The supplied fields are kept either way
/// so callers can persist them exactly as they arrived.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageCredentials {
    pub pubkey: Option<String>,
    pub signature: Option<String>,
    pub timestamp: Option<i64>,
}

impl MessageCredentials {
    pub fn normalize(
        pubkey: Option<String>,
        signature: Option<String>,
        timestamp: Option<i64>,
    ) -> Self {
        MessageCredentials {
            pubkey: pubkey.filter(|s| !s.is_empty()),
            signature: signature.filter(|s| !s.is_empty()),
            timestamp: timestamp.filter(|ts| *ts != 0),
        }
    }

    /// The full trio, present only when every field was supplied.
    pub fn complete(&self) -> Option<(&str, &str, i64)> {
        match (self.pubkey.as_deref(), self.signature.as_deref(), self.timestamp) {
            (Some(pubkey), Some(signature), Some(timestamp)) => {
                Some((pubkey, signature, timestamp))
            }
            _ => None,
        }
    }
}

/// Decoded signature bytes, classified by length: exactly 64 bytes is
/// compact `r || s`, anything else is treated as DER.
#[derive(Debug, Clone)]
pub enum SignatureBytes {
    Compact([u8; 64]),
    Der(Vec<u8>),
}

impl SignatureBytes {
    pub fn classify(bytes: Vec<u8>) -> Self {
        match <[u8; 64]>::try_from(bytes.as_slice()) {
            Ok(compact) => SignatureBytes::Compact(compact),
            Err(_) => SignatureBytes::Der(bytes),
        }
    }

    /// Parse into an ECDSA signature. Compact components must be
    /// big-endian integers in `[1, n-1]`; out-of-range r or s is an
    /// encoding error, not a mismatch.
    pub fn to_signature(&self) -> Result<Signature, AuthError> {
        match self {
            SignatureBytes::Compact(bytes) => Signature::from_slice(bytes).map_err(|_| {
                AuthError::InvalidSignatureEncoding("compact r or s component out of range".into())
            }),
            SignatureBytes::Der(bytes) => Signature::from_der(bytes).map_err(|_| {
                AuthError::InvalidSignatureEncoding(format!(
                    "expected 64-byte compact or DER, got {} bytes",
                    bytes.len()
                ))
            }),
        }
    }
}

/// Decode a hex public key into a secp256k1 verifying key.
pub fn decode_pubkey(pubkey_hex: &str) -> Result<VerifyingKey, AuthError> {
    let bytes = hex::decode(pubkey_hex)
        .map_err(|e| AuthError::InvalidPublicKey(format!("invalid hex: {e}")))?;
    VerifyingKey::from_sec1_bytes(&bytes)
        .map_err(|_| AuthError::InvalidPublicKey("not a secp256k1 point".into()))
}

/// Decode a hex signature into its classified byte form.
pub fn decode_signature(signature_hex: &str) -> Result<SignatureBytes, AuthError> {
    let bytes = hex::decode(signature_hex)
        .map_err(|e| AuthError::InvalidSignatureEncoding(format!("invalid hex: {e}")))?;
    Ok(SignatureBytes::classify(bytes))
}

/// Verify a signature over an already-computed event digest.
pub fn verify_signature(
    pubkey_hex: &str,
    signature_hex: &str,
    digest: &EventDigest,
) -> Result<(), AuthError> {
    let key = decode_pubkey(pubkey_hex)?;
    let signature = decode_signature(signature_hex)?.to_signature()?;
    // Accept high-S signatures by normalizing; k256 rejects them raw.
    let signature = signature.normalize_s().unwrap_or(signature);

    key.verify_prehash(digest.as_bytes(), &signature)
        .map_err(|_| AuthError::SignatureMismatch)
}

/// Verify that `signature` covers this exact message post.
pub fn verify_message(
    pubkey: &str,
    signature: &str,
    timestamp: i64,
    content: &str,
    room: &str,
) -> Result<(), AuthError> {
    let digest = MessageEvent {
        pubkey,
        timestamp,
        content,
        room,
    }
    .digest();
    verify_signature(pubkey, signature, &digest)
}

/// Verify that `signature` covers this exact room visibility change.
pub fn verify_visibility(
    pubkey: &str,
    signature: &str,
    timestamp: i64,
    room: &str,
    hidden: bool,
) -> Result<(), AuthError> {
    let digest = VisibilityEvent {
        pubkey,
        timestamp,
        room,
        hidden,
    }
    .digest();
    verify_signature(pubkey, signature, &digest)
}

/// Reject signed timestamps outside the acceptance window around `now`,
/// in either direction. A window of zero disables the check.
pub fn check_signed_timestamp(signed: i64, now: i64, max_age_secs: u64) -> Result<(), AuthError> {
    if max_age_secs == 0 {
        return Ok(());
    }
    if now.abs_diff(signed) > max_age_secs {
        return Err(AuthError::StaleSignature);
    }
    Ok(())
}
