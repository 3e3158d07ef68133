//! Routes provider redirect callbacks to the matching login attempt.
//!
//! One callback drives one attempt through its remaining phases:
//! match by state token (duplicates discarded), classify the platform from
//! the echoed client id, exchange the code, persist under the placeholder
//! account id, then discover the real id and re-file. Tokens are persisted
//! the moment exchange succeeds — losing a successful login to a crash
//! during discovery would be worse than a transient orphan placeholder.

use tracing::{debug, info, warn};

use super::attempts::{AttemptPhase, AttemptTracker, ConsumeOutcome, LoginAttempt};
use super::identity::discover_account_id;
use super::LinkOutcome;
use crate::credentials::PLACEHOLDER_ACCOUNT;
use crate::oauth::{exchange_code_for_tokens, AuthState, AuthorizationCallback};
use crate::platform::{IdentityDiscovery, Platform};
use crate::session::SessionRegistry;

const NO_STATE_RETAINED: &str = "No authorization state retained - reauthorization required";

/// Handle one redirect callback from the browser.
pub async fn handle_callback(
    registry: &SessionRegistry,
    attempts: &AttemptTracker,
    http: &reqwest::Client,
    callback: &AuthorizationCallback,
) -> LinkOutcome {
    let Some(state_token) = callback.state.as_deref() else {
        warn!("callback carried no state token");
        return LinkOutcome::Failed {
            message: NO_STATE_RETAINED.to_string(),
        };
    };

    let mut attempt = match attempts.consume(state_token) {
        ConsumeOutcome::Attempt(attempt) => attempt,
        ConsumeOutcome::AlreadyConsumed => {
            debug!("duplicate redirect delivery ignored");
            return LinkOutcome::Duplicate;
        }
        ConsumeOutcome::Unknown => {
            warn!("callback for unknown or expired login attempt");
            return LinkOutcome::Failed {
                message: "unknown or expired login attempt".to_string(),
            };
        }
    };

    // The echoed client id decides which platform this callback belongs to.
    let Some(platform) = Platform::from_client_id(&attempt.service.client_id) else {
        warn!(client_id = %attempt.service.client_id, "unrecognized client id on callback - dropping");
        return LinkOutcome::Failed {
            message: "unrecognized client id on callback".to_string(),
        };
    };
    attempt.phase = AttemptPhase::AwaitingCallback;
    debug!(platform = %platform, phase = ?attempt.phase, "callback matched to attempt");

    if let Some(error) = &callback.error {
        let message = callback.error_description.as_deref().unwrap_or(error);
        // Terminal for this attempt; nothing partial is kept around.
        let _ = registry.unlink(platform, PLACEHOLDER_ACCOUNT).await;
        return LinkOutcome::Failed {
            message: format!("Authorization flow failed: {}", message),
        };
    }
    let Some(code) = callback.code.as_deref() else {
        return LinkOutcome::Failed {
            message: NO_STATE_RETAINED.to_string(),
        };
    };
    attempt.phase = AttemptPhase::CodeReceived;
    debug!(platform = %platform, phase = ?attempt.phase, "authorization code exchange is required");

    exchange_and_file(registry, http, platform, attempt, code).await
}

async fn exchange_and_file(
    registry: &SessionRegistry,
    http: &reqwest::Client,
    platform: Platform,
    mut attempt: LoginAttempt,
    code: &str,
) -> LinkOutcome {
    let placeholder = registry.handle(platform, PLACEHOLDER_ACCOUNT);

    let grant = match exchange_code_for_tokens(http, &attempt.service, code, &attempt.code_verifier)
        .await
    {
        Ok(grant) => grant,
        Err(err) => {
            let _ = placeholder.delete().await;
            return LinkOutcome::Failed {
                message: format!("Authorization code exchange failed: {}", err),
            };
        }
    };
    attempt.phase = AttemptPhase::TokenExchanged;
    debug!(platform = %platform, phase = ?attempt.phase, "authorization code exchanged");

    // Persist under the placeholder id first: a successful login must not
    // be lost to whatever happens between here and identity discovery.
    let mut state = placeholder.current().await;
    if state.config().is_none() {
        state = AuthState::from_config(attempt.service.clone());
    }
    state.update_after_token_response(&grant);
    if let Err(e) = placeholder.replace(state.clone()).await {
        return LinkOutcome::Failed {
            message: format!("failed to persist session: {}", e),
        };
    }

    if !state.is_authorized() {
        let _ = placeholder.delete().await;
        return LinkOutcome::Failed {
            message: "Authorization code exchange failed".to_string(),
        };
    }

    match &attempt.discovery {
        IdentityDiscovery::None => {
            info!(platform = %platform, "account linked");
            LinkOutcome::Authorized {
                platform,
                account_id: PLACEHOLDER_ACCOUNT,
            }
        }
        discovery => match discover_account_id(http, discovery, &state).await {
            Ok(account_id) => {
                if let Err(e) = registry.refile_placeholder(platform, state, account_id).await {
                    return LinkOutcome::Failed {
                        message: format!("failed to persist session: {}", e),
                    };
                }
                info!(platform = %platform, account_id, "account linked");
                LinkOutcome::Authorized {
                    platform,
                    account_id,
                }
            }
            Err(err) => {
                // Valid tokens with no usable key to file them under; the
                // session is discarded and the user restarts the login.
                warn!(platform = %platform, error = %err, "identity discovery failed - discarding session");
                let _ = placeholder.delete().await;
                LinkOutcome::Failed {
                    message: format!("could not determine account id: {}", err),
                }
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialStore;
    use crate::oauth::ServiceConfig;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use std::sync::Arc;

    fn registry() -> SessionRegistry {
        let key = BASE64.encode([0u8; 32]);
        let store = Arc::new(CredentialStore::new(":memory:", &key).unwrap());
        SessionRegistry::new(store, 60)
    }

    fn callback(
        code: Option<&str>,
        state: Option<&str>,
        error: Option<&str>,
    ) -> AuthorizationCallback {
        AuthorizationCallback {
            code: code.map(String::from),
            state: state.map(String::from),
            error: error.map(String::from),
            error_description: None,
        }
    }

    #[tokio::test]
    async fn test_callback_without_state_fails() {
        let registry = registry();
        let attempts = AttemptTracker::new(600);
        let http = reqwest::Client::new();

        let outcome =
            handle_callback(&registry, &attempts, &http, &callback(Some("code"), None, None)).await;
        assert_eq!(
            outcome,
            LinkOutcome::Failed {
                message: NO_STATE_RETAINED.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_state_token_fails() {
        let registry = registry();
        let attempts = AttemptTracker::new(600);
        let http = reqwest::Client::new();

        let outcome = handle_callback(
            &registry,
            &attempts,
            &http,
            &callback(Some("code"), Some("never-issued"), None),
        )
        .await;
        assert!(matches!(outcome, LinkOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn test_error_callback_is_terminal() {
        let registry = registry();
        let attempts = AttemptTracker::new(600);
        let http = reqwest::Client::new();
        let handoff = super::super::begin_login(&registry, &attempts, Platform::Lidl)
            .await
            .unwrap();

        let outcome = handle_callback(
            &registry,
            &attempts,
            &http,
            &callback(None, Some(&handoff.state), Some("access_denied")),
        )
        .await;

        assert_eq!(
            outcome,
            LinkOutcome::Failed {
                message: "Authorization flow failed: access_denied".to_string()
            }
        );
        // No partial state retained.
        assert!(registry.linked_accounts().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_callback_with_neither_code_nor_error() {
        let registry = registry();
        let attempts = AttemptTracker::new(600);
        let http = reqwest::Client::new();
        let handoff = super::super::begin_login(&registry, &attempts, Platform::Lidl)
            .await
            .unwrap();

        let outcome = handle_callback(
            &registry,
            &attempts,
            &http,
            &callback(None, Some(&handoff.state), None),
        )
        .await;
        assert_eq!(
            outcome,
            LinkOutcome::Failed {
                message: NO_STATE_RETAINED.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unrecognized_client_id_drops_callback() {
        let registry = registry();
        let attempts = AttemptTracker::new(600);
        let http = reqwest::Client::new();

        // An attempt whose registration carries a client id outside the
        // fixed table cannot be routed.
        let state_token = attempts.register(
            ServiceConfig {
                auth_url: "https://example.com/authorize".to_string(),
                token_url: "https://example.com/token".to_string(),
                client_id: "rogue-client".to_string(),
                redirect_uri: "app://callback".to_string(),
                scope: String::new(),
            },
            IdentityDiscovery::None,
            "verifier".to_string(),
        );

        let outcome = handle_callback(
            &registry,
            &attempts,
            &http,
            &callback(Some("code"), Some(&state_token), None),
        )
        .await;
        assert_eq!(
            outcome,
            LinkOutcome::Failed {
                message: "unrecognized client id on callback".to_string()
            }
        );
    }
}
