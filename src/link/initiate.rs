//! Login initiation: build the authorization request and hand it to the
//! browser.

use anyhow::{anyhow, Result};
use tracing::info;

use super::attempts::AttemptTracker;
use crate::credentials::PLACEHOLDER_ACCOUNT;
use crate::oauth::{authorization_url, AuthState, PkcePair, ServiceConfig};
use crate::platform::Platform;
use crate::session::SessionRegistry;

/// A dispatched authorization request, ready for the browser.
#[derive(Clone, Debug)]
pub struct LoginHandoff {
    pub platform: Platform,
    pub state: String,
    pub auth_url: String,
}

/// Start a browser login for `platform`.
///
/// Persists a fresh unauthorized record under the placeholder account id
/// before the browser is involved, so a callback racing ahead of this
/// function's caller has somewhere to land, then registers the pending
/// attempt and returns the provider URL to navigate to.
pub async fn begin_login(
    registry: &SessionRegistry,
    attempts: &AttemptTracker,
    platform: Platform,
) -> Result<LoginHandoff> {
    let config = platform
        .login_config()
        .ok_or_else(|| anyhow!("{} does not use a browser login", platform))?;

    let service = ServiceConfig::from(&config);
    registry
        .handle(platform, PLACEHOLDER_ACCOUNT)
        .replace(AuthState::from_config(service.clone()))
        .await?;

    let pkce = PkcePair::generate();
    let state = attempts.register(service, platform.identity_discovery(), pkce.verifier);
    let auth_url = authorization_url(&config, &state, &pkce.challenge);

    info!(platform = %platform, "dispatching authorization request");

    Ok(LoginHandoff {
        platform,
        state,
        auth_url,
    })
}
