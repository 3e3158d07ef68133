//! Token endpoint grants: authorization-code exchange and refresh.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::fmt;

use super::state::ServiceConfig;

/// Tokens issued by one grant.
#[derive(Clone, Debug)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Failure of a token-endpoint round-trip.
///
/// Never retried here; the next user-initiated action tries again.
#[derive(Clone, Debug, PartialEq)]
pub enum TokenError {
    /// The request never produced a usable response.
    Network(String),
    /// The provider answered with an OAuth error.
    Provider {
        error: String,
        description: Option<String>,
    },
    /// The session holds nothing a grant could be performed with.
    NotAuthorized,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Network(msg) => write!(f, "network error: {}", msg),
            TokenError::Provider { error, description } => match description {
                Some(desc) => write!(f, "{}: {}", error, desc),
                None => f.write_str(error),
            },
            TokenError::NotAuthorized => f.write_str("not authorized"),
        }
    }
}

impl std::error::Error for TokenError {}

/// OAuth token response (standard OAuth 2.0)
#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// OAuth error response body
#[derive(Deserialize, Debug)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Exchange an authorization code for tokens.
pub async fn exchange_code_for_tokens(
    http: &reqwest::Client,
    config: &ServiceConfig,
    code: &str,
    code_verifier: &str,
) -> Result<TokenGrant, TokenError> {
    tracing::debug!(token_url = %config.token_url, "exchanging authorization code");
    let form = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", &config.redirect_uri),
        ("client_id", &config.client_id),
        ("code_verifier", code_verifier),
    ];
    perform_grant(http, &config.token_url, &form).await
}

/// Redeem a refresh token for a fresh access token.
pub async fn refresh_access_token(
    http: &reqwest::Client,
    config: &ServiceConfig,
    refresh_token: &str,
) -> Result<TokenGrant, TokenError> {
    tracing::debug!(token_url = %config.token_url, "refreshing access token");
    let form = [
        ("grant_type", "refresh_token"),
        ("client_id", &config.client_id),
        ("refresh_token", refresh_token),
    ];
    perform_grant(http, &config.token_url, &form).await
}

async fn perform_grant(
    http: &reqwest::Client,
    token_url: &str,
    form: &[(&str, &str)],
) -> Result<TokenGrant, TokenError> {
    let response = http
        .post(token_url)
        .header("Accept", "application/json")
        .form(form)
        .send()
        .await
        .map_err(|e| TokenError::Network(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        // Providers return a JSON error body; fall back to the raw text.
        return Err(match serde_json::from_str::<ErrorBody>(&body) {
            Ok(err) => TokenError::Provider {
                error: err.error,
                description: err.error_description,
            },
            Err(_) => TokenError::Provider {
                error: format!("token endpoint returned {}", status),
                description: (!body.is_empty()).then_some(body),
            },
        });
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| TokenError::Network(format!("invalid token response: {}", e)))?;

    tracing::debug!(
        has_refresh_token = token.refresh_token.is_some(),
        expires_in = ?token.expires_in,
        "grant successful"
    );

    Ok(TokenGrant {
        access_token: token.access_token,
        refresh_token: token.refresh_token,
        id_token: token.id_token,
        expires_at: token.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
    })
}
