//! Shared-expense service sign-in.
//!
//! WieBetaaltWat has no OAuth flow: a JSON username/password sign-in issues
//! a session cookie. The cookie becomes that platform's opaque state blob;
//! the record files directly under the placeholder account id since the
//! service serves exactly one account per session.

use reqwest::cookie::CookieStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::LinkOutcome;
use crate::credentials::PLACEHOLDER_ACCOUNT;
use crate::oauth::AuthState;
use crate::platform::Platform;
use crate::session::SessionRegistry;

const BASE_URL: &str = "https://app.wiebetaaltwat.nl/api";

#[derive(Serialize)]
struct SignInBody<'a> {
    user: UserBody<'a>,
}

#[derive(Serialize)]
struct UserBody<'a> {
    email: &'a str,
    password: &'a str,
}

/// Sign in with username/password and file the session.
pub async fn sign_in(registry: &SessionRegistry, email: &str, password: &str) -> LinkOutcome {
    sign_in_at(registry, BASE_URL, email, password).await
}

/// Like [`sign_in`], against an explicit base URL.
pub async fn sign_in_at(
    registry: &SessionRegistry,
    base_url: &str,
    email: &str,
    password: &str,
) -> LinkOutcome {
    let jar = Arc::new(reqwest::cookie::Jar::default());
    let http = match reqwest::Client::builder().cookie_provider(jar.clone()).build() {
        Ok(http) => http,
        Err(e) => {
            return LinkOutcome::Failed {
                message: format!("network error: {}", e),
            }
        }
    };

    let response = http
        .post(format!("{}/users/sign_in", base_url))
        .header("Accept", "application/json")
        .header("Accept-Version", "10")
        .json(&SignInBody {
            user: UserBody { email, password },
        })
        .send()
        .await;

    let response = match response {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "wbw sign in request failed");
            return LinkOutcome::Failed {
                message: format!("network error: {}", e),
            };
        }
    };
    if !response.status().is_success() {
        return LinkOutcome::Failed {
            message: format!("sign in rejected ({})", response.status()),
        };
    }

    // The session lives in the cookie the service just set.
    let url = match reqwest::Url::parse(base_url) {
        Ok(url) => url,
        Err(e) => {
            return LinkOutcome::Failed {
                message: format!("invalid service URL: {}", e),
            }
        }
    };
    let Some(cookie) = jar.cookies(&url).and_then(|v| v.to_str().map(String::from).ok()) else {
        warn!("wbw sign in succeeded but no session cookie was issued");
        return LinkOutcome::Failed {
            message: "sign in returned no session".to_string(),
        };
    };

    let state = AuthState::from_session_cookie(cookie);
    match registry
        .handle(Platform::Wbw, PLACEHOLDER_ACCOUNT)
        .replace(state)
        .await
    {
        Ok(_) => {
            info!(platform = %Platform::Wbw, "account linked");
            LinkOutcome::Authorized {
                platform: Platform::Wbw,
                account_id: PLACEHOLDER_ACCOUNT,
            }
        }
        Err(e) => LinkOutcome::Failed {
            message: format!("failed to persist session: {}", e),
        },
    }
}
