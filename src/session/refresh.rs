//! Token freshness for actions that need a live access token.

use chrono::Utc;

use super::handle::SessionHandle;
use crate::oauth::{refresh_access_token, TokenError};

/// How long before expiry an access token is refreshed.
pub const DEFAULT_REFRESH_LEAD_SECS: i64 = 60;

impl SessionHandle {
    /// Run `action` with a fresh access token.
    ///
    /// The OAuth state decides whether a network refresh is needed; at most
    /// one refresh is in flight per key. After any refresh attempt the
    /// (possibly mutated) state is written back through the cache so a
    /// rotated refresh token is durably persisted.
    ///
    /// On failure the action still runs, with `error` set and both token
    /// fields `None`. Nothing is retried here: the next user-initiated
    /// action tries again.
    pub async fn with_fresh_tokens<T, F>(&self, http: &reqwest::Client, action: F) -> T
    where
        F: FnOnce(Option<&str>, Option<&str>, Option<&TokenError>) -> T,
    {
        let _gate = self.refresh_gate.lock().await;

        let mut state = self.current().await;
        if !state.is_authorized() {
            return action(None, None, Some(&TokenError::NotAuthorized));
        }

        if state.needs_refresh(Utc::now(), self.refresh_lead) {
            let (Some(config), Some(refresh_token)) =
                (state.config().cloned(), state.refresh_token().map(String::from))
            else {
                tracing::warn!(
                    platform = %self.platform(),
                    account_id = self.account_id(),
                    "access token stale but no refresh token retained"
                );
                return action(None, None, Some(&TokenError::NotAuthorized));
            };

            match refresh_access_token(http, &config, &refresh_token).await {
                Ok(grant) => {
                    state.update_after_token_response(&grant);
                }
                Err(err) => {
                    tracing::warn!(
                        platform = %self.platform(),
                        account_id = self.account_id(),
                        error = %err,
                        "token refresh failed"
                    );
                    self.write_back(state).await;
                    return action(None, None, Some(&err));
                }
            }
            self.write_back(state.clone()).await;
        }

        action(state.access_token(), state.id_token(), None)
    }

    /// Convenience over [`with_fresh_tokens`](Self::with_fresh_tokens) for
    /// callers that just want the bearer token.
    pub async fn fresh_access_token(&self, http: &reqwest::Client) -> Result<String, TokenError> {
        self.with_fresh_tokens(http, |access_token, _id_token, error| match error {
            Some(err) => Err(err.clone()),
            None => Ok(access_token.unwrap_or_default().to_string()),
        })
        .await
    }

    async fn write_back(&self, state: crate::oauth::AuthState) {
        if let Err(e) = self.replace(state).await {
            tracing::warn!(
                platform = %self.platform(),
                account_id = self.account_id(),
                error = %e,
                "failed to persist auth state after refresh"
            );
        }
    }
}
