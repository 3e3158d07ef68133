//! Durable, encrypted storage of per-account authorization state.
//!
//! One record per `(platform, account_id)` pair holds the serialized
//! authorization-state blob produced by the OAuth client. Blobs are sealed
//! with AES-256-GCM before they touch disk; the master key comes from the
//! environment and lives in memory only.
//!
//! Account id `0` is reserved: it marks a session whose real platform
//! account id is not yet known (the interval between code exchange and
//! identity discovery). Such records are transient and are re-filed or
//! deleted by the callback router.

use crate::platform::Platform;

mod encryption;
mod store;

pub use encryption::load_key;
pub use store::CredentialStore;

/// The reserved account id for sessions whose real id is not yet known.
pub const PLACEHOLDER_ACCOUNT: i64 = 0;

/// One linked account's authorization state for one platform.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthorizationRecord {
    pub platform: Platform,
    pub account_id: i64,
    /// Opaque serialized state blob; produced and consumed by the OAuth
    /// client, never inspected here.
    pub state: String,
}
