//! Opaque per-account authorization state.
//!
//! `AuthState` is the unit the credential store persists: the provider
//! endpoints a session was created against plus the last issued tokens.
//! It round-trips through JSON; a blob that fails to deserialize is treated
//! by callers as "no prior authorization".

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::exchange::TokenGrant;
use crate::platform::LoginConfig;

/// Provider endpoints and client registration a session was created with.
///
/// Kept inside the state so a refresh can be performed without consulting
/// the static platform table again.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub auth_url: String,
    pub token_url: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
}

impl From<&LoginConfig> for ServiceConfig {
    fn from(config: &LoginConfig) -> Self {
        Self {
            auth_url: config.auth_url.to_string(),
            token_url: config.token_url.to_string(),
            client_id: config.client_id.to_string(),
            redirect_uri: config.redirect_uri.to_string(),
            scope: config.scope.to_string(),
        }
    }
}

/// Authorization state for one linked account.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthState {
    #[serde(default)]
    config: Option<ServiceConfig>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    /// Session cookie for platforms that sign in without OAuth.
    #[serde(default)]
    session_cookie: Option<String>,
}

impl AuthState {
    /// A fresh state with no authorization at all.
    pub fn unauthorized() -> Self {
        Self::default()
    }

    /// A fresh state seeded with the service configuration of a login
    /// attempt that has not yet completed.
    pub fn from_config(config: ServiceConfig) -> Self {
        Self {
            config: Some(config),
            ..Self::default()
        }
    }

    /// A state carrying a plain session cookie (no OAuth tokens).
    pub fn from_session_cookie(cookie: String) -> Self {
        Self {
            session_cookie: Some(cookie),
            ..Self::default()
        }
    }

    pub fn config(&self) -> Option<&ServiceConfig> {
        self.config.as_ref()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn id_token(&self) -> Option<&str> {
        self.id_token.as_deref()
    }

    pub fn session_cookie(&self) -> Option<&str> {
        self.session_cookie.as_deref()
    }

    pub fn is_authorized(&self) -> bool {
        self.access_token.is_some() || self.session_cookie.is_some()
    }

    /// Whether the access token expires within `lead` of `now`.
    ///
    /// A state without a recorded expiry is never considered stale; the
    /// provider simply issued a non-expiring token.
    pub fn needs_refresh(&self, now: DateTime<Utc>, lead: Duration) -> bool {
        match self.expires_at {
            Some(expiry) => expiry - lead <= now,
            None => false,
        }
    }

    /// Fold a token response into the state. The refresh token only rotates
    /// when the provider issued a new one.
    pub fn update_after_token_response(&mut self, grant: &TokenGrant) {
        self.access_token = Some(grant.access_token.clone());
        if grant.refresh_token.is_some() {
            self.refresh_token = grant.refresh_token.clone();
        }
        if grant.id_token.is_some() {
            self.id_token = grant.id_token.clone();
        }
        self.expires_at = grant.expires_at;
    }

    pub fn json_serialize(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn json_deserialize(blob: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(blob)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(expires_in: Option<i64>) -> TokenGrant {
        TokenGrant {
            access_token: "at-1".to_string(),
            refresh_token: Some("rt-1".to_string()),
            id_token: None,
            expires_at: expires_in.map(|s| Utc::now() + Duration::seconds(s)),
        }
    }

    #[test]
    fn test_fresh_state_is_unauthorized() {
        let state = AuthState::unauthorized();
        assert!(!state.is_authorized());
        assert!(state.access_token().is_none());
        assert!(!state.needs_refresh(Utc::now(), Duration::seconds(60)));
    }

    #[test]
    fn test_token_response_authorizes() {
        let mut state = AuthState::unauthorized();
        state.update_after_token_response(&grant(Some(3600)));
        assert!(state.is_authorized());
        assert_eq!(state.access_token(), Some("at-1"));
        assert_eq!(state.refresh_token(), Some("rt-1"));
    }

    #[test]
    fn test_refresh_token_kept_when_not_rotated() {
        let mut state = AuthState::unauthorized();
        state.update_after_token_response(&grant(Some(3600)));

        // Second response without a refresh token keeps the old one.
        let second = TokenGrant {
            access_token: "at-2".to_string(),
            refresh_token: None,
            id_token: None,
            expires_at: None,
        };
        state.update_after_token_response(&second);
        assert_eq!(state.access_token(), Some("at-2"));
        assert_eq!(state.refresh_token(), Some("rt-1"));
    }

    #[test]
    fn test_needs_refresh_lead_window() {
        let mut state = AuthState::unauthorized();
        state.update_after_token_response(&grant(Some(30)));
        // Expires in 30s: stale under a 60s lead, fresh under a 5s lead.
        assert!(state.needs_refresh(Utc::now(), Duration::seconds(60)));
        assert!(!state.needs_refresh(Utc::now(), Duration::seconds(5)));
    }

    #[test]
    fn test_json_roundtrip() {
        let mut state = AuthState::from_config(ServiceConfig {
            auth_url: "https://example.com/authorize".to_string(),
            token_url: "https://example.com/token".to_string(),
            client_id: "client".to_string(),
            redirect_uri: "app://callback".to_string(),
            scope: "openid".to_string(),
        });
        state.update_after_token_response(&grant(Some(3600)));

        let blob = state.json_serialize().unwrap();
        let restored = AuthState::json_deserialize(&blob).unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn test_garbage_blob_rejected() {
        assert!(AuthState::json_deserialize("{truncated").is_err());
        assert!(AuthState::json_deserialize("not json at all").is_err());
    }

    #[test]
    fn test_session_cookie_state() {
        let state = AuthState::from_session_cookie("wbw_session=abc".to_string());
        assert!(state.is_authorized());
        assert_eq!(state.session_cookie(), Some("wbw_session=abc"));
        assert!(state.access_token().is_none());
    }
}
