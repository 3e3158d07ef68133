//! Cached authorization state for one account.

use std::sync::{Arc, RwLock};

use anyhow::Result;
use chrono::Duration;

use crate::credentials::{AuthorizationRecord, CredentialStore};
use crate::oauth::AuthState;
use crate::platform::Platform;

/// Cache entry plus write-through access for one `(platform, account_id)`.
pub struct SessionHandle {
    platform: Platform,
    account_id: i64,
    store: Arc<CredentialStore>,
    /// Last known state; `None` until the first load or after a delete.
    cached: RwLock<Option<AuthState>>,
    /// At most one token refresh in flight per key.
    pub(super) refresh_gate: tokio::sync::Mutex<()>,
    pub(super) refresh_lead: Duration,
}

impl SessionHandle {
    pub(super) fn new(
        platform: Platform,
        account_id: i64,
        store: Arc<CredentialStore>,
        refresh_lead: Duration,
    ) -> Self {
        Self {
            platform,
            account_id,
            store,
            cached: RwLock::new(None),
            refresh_gate: tokio::sync::Mutex::new(()),
            refresh_lead,
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn account_id(&self) -> i64 {
        self.account_id
    }

    /// The current authorization state.
    ///
    /// Returns the cached value when present; otherwise loads from the
    /// credential store and installs the result only if no other caller
    /// installed one in the meantime. A concurrently installed value wins,
    /// so a [`replace`](Self::replace) is never clobbered by a load that
    /// was already in flight.
    pub async fn current(&self) -> AuthState {
        if let Some(state) = self.cached.read().unwrap().as_ref() {
            return state.clone();
        }

        let loaded = self.load_or_default();

        let mut slot = self.cached.write().unwrap();
        match slot.as_ref() {
            Some(existing) => existing.clone(),
            None => {
                *slot = Some(loaded.clone());
                loaded
            }
        }
    }

    /// Persist `state` and make it the cached value, unconditionally.
    pub async fn replace(&self, state: AuthState) -> Result<AuthState> {
        let blob = state.json_serialize()?;
        self.store.put(&AuthorizationRecord {
            platform: self.platform,
            account_id: self.account_id,
            state: blob,
        })?;
        *self.cached.write().unwrap() = Some(state.clone());
        Ok(state)
    }

    /// Remove the backing record and reset the cache to "not loaded".
    pub async fn delete(&self) -> Result<()> {
        self.store.delete(self.platform, self.account_id)?;
        *self.cached.write().unwrap() = None;
        Ok(())
    }

    /// Load from storage, recovering to an unauthorized state when nothing
    /// is stored or the stored blob is unreadable. Corruption is logged,
    /// never surfaced.
    fn load_or_default(&self) -> AuthState {
        match self.store.get(self.platform, self.account_id) {
            Ok(Some(record)) => match AuthState::json_deserialize(&record.state) {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!(
                        platform = %self.platform,
                        account_id = self.account_id,
                        error = %e,
                        "failed to deserialize stored auth state - discarding"
                    );
                    AuthState::unauthorized()
                }
            },
            Ok(None) => AuthState::unauthorized(),
            Err(e) => {
                tracing::warn!(
                    platform = %self.platform,
                    account_id = self.account_id,
                    error = %e,
                    "failed to read stored auth state - discarding"
                );
                AuthState::unauthorized()
            }
        }
    }
}
