//! Post-exchange account identity discovery.
//!
//! Some platforms do not reveal a stable account id until after code
//! exchange: Jumbo embeds it in its token's subject claim, Appie answers a
//! member-profile query. Either way the contract is the same: a stable
//! account id, or a failure that discards the session.

use anyhow::{anyhow, bail, Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;

use crate::oauth::AuthState;
use crate::platform::IdentityDiscovery;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemberProfile {
    member_id: i64,
}

/// Learn the platform's account id for a freshly exchanged session.
pub async fn discover_account_id(
    http: &reqwest::Client,
    discovery: &IdentityDiscovery,
    state: &AuthState,
) -> Result<i64> {
    match discovery {
        IdentityDiscovery::None => bail!("platform does not discover an account id"),
        IdentityDiscovery::JwtSubject => {
            let token = state
                .id_token()
                .or_else(|| state.access_token())
                .context("no token to decode a subject from")?;
            let subject = jwt_subject(token)?;
            parse_account_id(&subject)
                .ok_or_else(|| anyhow!("subject claim '{}' is not an account id", subject))
        }
        IdentityDiscovery::MemberProfile { url } => {
            let access_token = state.access_token().context("no access token")?;
            let profile: MemberProfile = http
                .get(url)
                .bearer_auth(access_token)
                .send()
                .await
                .context("member profile request failed")?
                .error_for_status()
                .context("member profile request rejected")?
                .json()
                .await
                .context("invalid member profile response")?;
            Ok(profile.member_id)
        }
    }
}

/// Pull the `sub` claim out of a JWT without verifying it; the token was
/// just issued to us over TLS, verification belongs to the provider's
/// resource servers.
fn jwt_subject(token: &str) -> Result<String> {
    let payload = token
        .split('.')
        .nth(1)
        .context("token is not a JWT")?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .context("JWT payload is not base64url")?;
    let claims: serde_json::Value =
        serde_json::from_slice(&bytes).context("JWT payload is not JSON")?;
    claims
        .get("sub")
        .and_then(|v| v.as_str())
        .map(String::from)
        .context("JWT carries no subject claim")
}

/// Reduce a provider subject to an integer account id.
///
/// Auth0-style subjects look like `auth0|123456`; plain numeric subjects
/// pass through unchanged.
fn parse_account_id(subject: &str) -> Option<i64> {
    let tail = subject.rsplit('|').next().unwrap_or(subject);
    tail.parse().ok()
}
