//! Account linking flows.
//!
//! Ties the pieces together:
//! 1. [`begin_login`] builds the platform's authorization request, persists
//!    a placeholder record and registers the in-flight attempt
//! 2. The user authorizes in the browser; the provider redirects back
//! 3. [`handle_callback`] matches the redirect to its attempt by state
//!    token, exchanges the code, and files the session — first under the
//!    placeholder account id, then under the real one once discovered
//! 4. [`wbw::sign_in`] covers the one platform that uses a password login
//!    instead of a browser flow
//!
//! Every outcome, success or failure, is a [`LinkOutcome`] whose
//! user-visible form is a status string.

mod attempts;
mod identity;
mod initiate;
mod router;
pub mod wbw;

pub use attempts::{run_attempt_cleanup, AttemptTracker, LoginAttempt};
pub use initiate::{begin_login, LoginHandoff};
pub use router::handle_callback;

use serde::Serialize;

use crate::platform::Platform;

/// Result of one linking step, surfaced to the UI layer as-is.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LinkOutcome {
    /// The session is filed under this key.
    Authorized { platform: Platform, account_id: i64 },
    /// Terminal failure for this attempt.
    Failed { message: String },
    /// A redirect whose state token was already consumed; discarded
    /// idempotently.
    Duplicate,
}
