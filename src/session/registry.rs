//! Per-account session handle registry.

use std::sync::Arc;

use anyhow::Result;
use chrono::Duration;
use dashmap::DashMap;

use super::handle::SessionHandle;
use crate::credentials::{AuthorizationRecord, CredentialStore, PLACEHOLDER_ACCOUNT};
use crate::oauth::AuthState;
use crate::platform::Platform;

/// Owns the one session handle per `(platform, account_id)` key.
///
/// Constructed once at the composition root and passed by reference to
/// whatever needs to resolve a key; insertion is atomic, so concurrent
/// resolution of the same key yields the same handle.
pub struct SessionRegistry {
    store: Arc<CredentialStore>,
    handles: DashMap<(Platform, i64), Arc<SessionHandle>>,
    refresh_lead: Duration,
}

impl SessionRegistry {
    pub fn new(store: Arc<CredentialStore>, refresh_lead_secs: i64) -> Self {
        Self {
            store,
            handles: DashMap::new(),
            refresh_lead: Duration::seconds(refresh_lead_secs),
        }
    }

    /// Resolve the handle for a key, creating it on first use.
    pub fn handle(&self, platform: Platform, account_id: i64) -> Arc<SessionHandle> {
        self.handles
            .entry((platform, account_id))
            .or_insert_with(|| {
                Arc::new(SessionHandle::new(
                    platform,
                    account_id,
                    self.store.clone(),
                    self.refresh_lead,
                ))
            })
            .clone()
    }

    /// All records in durable storage, for startup account discovery.
    pub fn linked_accounts(&self) -> Result<Vec<AuthorizationRecord>> {
        self.store.list_all()
    }

    /// Move a session from the placeholder key to its discovered account id.
    ///
    /// Files the state under the new key first, then deletes the
    /// placeholder, so a crash in between leaves a duplicate rather than a
    /// lost login.
    pub async fn refile_placeholder(
        &self,
        platform: Platform,
        state: AuthState,
        account_id: i64,
    ) -> Result<()> {
        self.handle(platform, account_id).replace(state).await?;
        self.handle(platform, PLACEHOLDER_ACCOUNT).delete().await?;
        Ok(())
    }

    /// Unlink one account: drop its record and reset its cache entry.
    pub async fn unlink(&self, platform: Platform, account_id: i64) -> Result<()> {
        self.handle(platform, account_id).delete().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::TokenGrant;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

    fn registry() -> SessionRegistry {
        let key = BASE64.encode([0u8; 32]);
        let store = Arc::new(CredentialStore::new(":memory:", &key).unwrap());
        SessionRegistry::new(store, 60)
    }

    fn authorized_state() -> AuthState {
        let mut state = AuthState::unauthorized();
        state.update_after_token_response(&TokenGrant {
            access_token: "at".to_string(),
            refresh_token: None,
            id_token: None,
            expires_at: None,
        });
        state
    }

    #[test]
    fn test_same_key_resolves_same_handle() {
        let registry = registry();
        let a = registry.handle(Platform::Lidl, 0);
        let b = registry.handle(Platform::Lidl, 0);
        assert!(Arc::ptr_eq(&a, &b));

        let c = registry.handle(Platform::Lidl, 1);
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[tokio::test]
    async fn test_refile_placeholder() {
        let registry = registry();
        registry
            .handle(Platform::Appie, PLACEHOLDER_ACCOUNT)
            .replace(authorized_state())
            .await
            .unwrap();

        registry
            .refile_placeholder(Platform::Appie, authorized_state(), 42)
            .await
            .unwrap();

        let accounts = registry.linked_accounts().unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].platform, Platform::Appie);
        assert_eq!(accounts[0].account_id, 42);

        // The placeholder entry now seeds unauthorized.
        let placeholder = registry.handle(Platform::Appie, PLACEHOLDER_ACCOUNT);
        assert!(!placeholder.current().await.is_authorized());
    }

    #[tokio::test]
    async fn test_unlink() {
        let registry = registry();
        registry
            .handle(Platform::Lidl, 0)
            .replace(authorized_state())
            .await
            .unwrap();

        registry.unlink(Platform::Lidl, 0).await.unwrap();
        assert!(registry.linked_accounts().unwrap().is_empty());
        assert!(!registry.handle(Platform::Lidl, 0).current().await.is_authorized());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_resolution_is_single_instance() {
        let registry = Arc::new(registry());
        let mut tasks = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                registry.handle(Platform::Jumbo, 7)
            }));
        }
        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap());
        }
        for handle in &handles[1..] {
            assert!(Arc::ptr_eq(&handles[0], handle));
        }
    }
}
