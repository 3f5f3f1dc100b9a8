//! Canonical serialization and digest computation.
//!
//! Implements: REQ-HASH-001
//!
//! Every content hash in the gate — the permit's `decision_hash`, the audit
//! ledger chain, the notarization registry binding — is SHA-256 over the
//! canonical JSON form produced here. Canonical form means compact encoding
//! with lexicographically sorted object keys, so two payloads with equal
//! content but different key order always hash identically.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Converts any serializable payload into a `serde_json::Value`.
///
/// `serde_json` object maps are backed by a `BTreeMap`, so the conversion
/// itself establishes the sorted key order the canonical form relies on.
///
/// # Panics
///
/// Panics if the payload is not JSON-serializable. That is a programmer
/// error (a gate payload that cannot be audited cannot be permitted either),
/// not a recoverable condition.
#[must_use]
pub fn to_canonical_value<T: Serialize>(payload: &T) -> Value {
    serde_json::to_value(payload).expect("gate payloads must be JSON-serializable")
}

/// Produces the canonical string form of a JSON value.
///
/// Implements: REQ-HASH-001
///
/// Compact separators, no insignificant whitespace, keys sorted. This string
/// is the exact byte sequence (UTF-8) fed to the digest functions.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    serde_json::to_string(value).expect("serializing a serde_json::Value cannot fail")
}

/// SHA-256 digest of the canonical form, as a lowercase hex string.
///
/// Implements: REQ-HASH-001
#[must_use]
pub fn digest_hex<T: Serialize>(payload: &T) -> String {
    hex::encode(digest_bytes(payload))
}

/// SHA-256 digest of the canonical form, as raw bytes.
///
/// Implements: REQ-HASH-001
#[must_use]
pub fn digest_bytes<T: Serialize>(payload: &T) -> [u8; 32] {
    let canonical = canonical_json(&to_canonical_value(payload));
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher.finalize().into()
}

/// SHA-256 over raw bytes, as a lowercase hex string.
///
/// Used by the audit ledger, which prefixes the previous entry hash to the
/// canonical entry bytes before digesting.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
