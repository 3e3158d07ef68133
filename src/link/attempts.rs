//! In-flight login attempts and redirect de-duplication.
//!
//! Each browser login carries a unique state token; the provider echoes it
//! on redirect. The tracker matches a redirect back to its attempt, makes
//! every token single-use, and remembers consumed tokens for long enough to
//! swallow duplicate deliveries (process re-entry, double-tapped links).
//! Both maps are swept on a timer, so neither grows with process lifetime.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::oauth::ServiceConfig;
use crate::platform::IdentityDiscovery;

/// Where an attempt's state machine currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptPhase {
    Dispatched,
    AwaitingCallback,
    CodeReceived,
    TokenExchanged,
}

/// One in-flight browser login.
#[derive(Clone, Debug)]
pub struct LoginAttempt {
    /// The request's client registration; the echoed client id in here is
    /// what classifies the callback.
    pub service: ServiceConfig,
    pub discovery: IdentityDiscovery,
    pub code_verifier: String,
    pub created_at: DateTime<Utc>,
    pub phase: AttemptPhase,
}

/// Outcome of matching a redirect's state token.
#[derive(Debug)]
pub enum ConsumeOutcome {
    /// First delivery; the attempt is handed over and the token burned.
    Attempt(LoginAttempt),
    /// The token was consumed before; duplicate delivery.
    AlreadyConsumed,
    /// Never issued, or expired.
    Unknown,
}

struct TrackerInner {
    pending: HashMap<String, LoginAttempt>,
    consumed: HashMap<String, DateTime<Utc>>,
}

/// Tracks pending attempts and consumed state tokens.
#[derive(Clone)]
pub struct AttemptTracker {
    inner: Arc<Mutex<TrackerInner>>,
    expiry: Duration,
}

impl AttemptTracker {
    /// `expiry_seconds` bounds both how long a redirect can take to arrive
    /// and how long a consumed token is remembered.
    pub fn new(expiry_seconds: i64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TrackerInner {
                pending: HashMap::new(),
                consumed: HashMap::new(),
            })),
            expiry: Duration::seconds(expiry_seconds),
        }
    }

    /// Register a new attempt; returns its state token (UUID v4).
    pub fn register(
        &self,
        service: ServiceConfig,
        discovery: IdentityDiscovery,
        code_verifier: String,
    ) -> String {
        let state = Uuid::new_v4().to_string();
        let attempt = LoginAttempt {
            service,
            discovery,
            code_verifier,
            created_at: Utc::now(),
            phase: AttemptPhase::Dispatched,
        };
        self.inner.lock().unwrap().pending.insert(state.clone(), attempt);
        state
    }

    /// Match and burn a state token (single-use).
    pub fn consume(&self, state: &str) -> ConsumeOutcome {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();

        if inner.consumed.contains_key(state) {
            return ConsumeOutcome::AlreadyConsumed;
        }

        let Some(attempt) = inner.pending.remove(state) else {
            return ConsumeOutcome::Unknown;
        };
        if now - attempt.created_at > self.expiry {
            return ConsumeOutcome::Unknown;
        }

        inner.consumed.insert(state.to_string(), now);
        ConsumeOutcome::Attempt(attempt)
    }

    /// Drop expired pending attempts and forget old consumed tokens.
    pub fn cleanup_expired(&self) {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        let expiry = self.expiry;
        inner
            .pending
            .retain(|_, attempt| now - attempt.created_at <= expiry);
        inner
            .consumed
            .retain(|_, consumed_at| now - *consumed_at <= expiry);
    }

    /// Counts for debugging/monitoring.
    pub fn counts(&self) -> (usize, usize) {
        let inner = self.inner.lock().unwrap();
        (inner.pending.len(), inner.consumed.len())
    }
}

/// Background task to periodically sweep the tracker.
pub async fn run_attempt_cleanup(tracker: AttemptTracker, interval_seconds: u64) {
    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(interval_seconds));
    loop {
        interval.tick().await;
        tracker.cleanup_expired();
        let (pending, consumed) = tracker.counts();
        tracing::debug!(pending, consumed, "login attempt sweep complete");
    }
}
