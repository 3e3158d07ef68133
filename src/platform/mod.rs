//! Linkable platforms and their static login configuration.
//!
//! The set of platforms is closed: each variant carries the OAuth client
//! registration its native app uses (client id, redirect URI, scope,
//! endpoints, provider-specific extra parameters). Inbound redirect
//! callbacks are matched back to a platform by comparing the echoed client
//! id against this table; an unrecognized client id cannot be routed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An external service a user can link an account at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Lidl,
    Appie,
    Jumbo,
    Wbw,
}

impl Platform {
    /// Stable lowercase tag, used as the storage key and in API paths.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Lidl => "lidl",
            Platform::Appie => "appie",
            Platform::Jumbo => "jumbo",
            Platform::Wbw => "wbw",
        }
    }

    pub fn parse(tag: &str) -> Option<Platform> {
        match tag {
            "lidl" => Some(Platform::Lidl),
            "appie" => Some(Platform::Appie),
            "jumbo" => Some(Platform::Jumbo),
            "wbw" => Some(Platform::Wbw),
            _ => None,
        }
    }

    /// Classify a redirect callback by the client id echoed in it.
    pub fn from_client_id(client_id: &str) -> Option<Platform> {
        match client_id {
            "LidlPlusNativeClient" => Some(Platform::Lidl),
            "appie" => Some(Platform::Appie),
            "ZVa0cW0LadbDHINgrBLuEAp5amVBKQh1" => Some(Platform::Jumbo),
            _ => None,
        }
    }

    /// The browser-login registration for this platform.
    ///
    /// `None` for platforms that do not use the authorization-code flow
    /// (the shared-expense service signs in with username/password).
    pub fn login_config(&self) -> Option<LoginConfig> {
        match self {
            Platform::Lidl => Some(LoginConfig {
                client_id: "LidlPlusNativeClient",
                redirect_uri: "com.lidlplus.app://callback",
                scope: "openid profile offline_access lpprofile lpapis",
                auth_url: "https://accounts.lidl.com/connect/authorize",
                token_url: "https://accounts.lidl.com/connect/token",
                extra_params: &[("Country", "NL"), ("language", "NL-NL")],
                prompt: None,
                response_mode: None,
            }),
            Platform::Appie => Some(LoginConfig {
                client_id: "appie",
                redirect_uri: "appie://login-exit",
                scope: "",
                auth_url: "https://login.ah.nl/secure/oauth/authorize",
                token_url: "https://api.ah.nl/mobile-auth/v1/auth/token",
                extra_params: &[],
                prompt: None,
                response_mode: None,
            }),
            Platform::Jumbo => Some(LoginConfig {
                client_id: "ZVa0cW0LadbDHINgrBLuEAp5amVBKQh1",
                redirect_uri: "jumboextras://home",
                scope: "openid offline_access",
                auth_url: "https://auth.jumbo.com/authorize",
                token_url: "https://auth.jumbo.com/oauth/token",
                extra_params: &[
                    ("audience", "https://jumbo.com/loyalty"),
                    ("ext-login_uri", "https://loyalty-app.jumbo.com/user/account"),
                    (
                        "ext-password_reset_uri",
                        "https://loyalty-app.jumbo.com/user/forgot-password",
                    ),
                    (
                        "ext-register_uri",
                        "https://loyalty-app.jumbo.com/user/signup/email",
                    ),
                    (
                        "auth0Client",
                        "eyJuYW1lIjoiYXV0aDAtc3BhLWpzIiwidmVyc2lvbiI6IjIuMC4zIn0=",
                    ),
                ],
                prompt: Some("login"),
                response_mode: Some("query"),
            }),
            Platform::Wbw => None,
        }
    }

    /// How this platform's stable account id is learned after code exchange.
    ///
    /// Lidl never reveals one (the single linked account stays under the
    /// placeholder id); Appie requires a member-profile query; Jumbo embeds
    /// the subject in its tokens.
    pub fn identity_discovery(&self) -> IdentityDiscovery {
        match self {
            Platform::Lidl | Platform::Wbw => IdentityDiscovery::None,
            Platform::Appie => IdentityDiscovery::MemberProfile {
                url: "https://api.ah.nl/mobile-services/member/v3/member".to_string(),
            },
            Platform::Jumbo => IdentityDiscovery::JwtSubject,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static OAuth registration for one platform.
#[derive(Clone, Debug)]
pub struct LoginConfig {
    pub client_id: &'static str,
    pub redirect_uri: &'static str,
    pub scope: &'static str,
    pub auth_url: &'static str,
    pub token_url: &'static str,
    /// Provider-specific extra query parameters for the authorization request.
    pub extra_params: &'static [(&'static str, &'static str)],
    pub prompt: Option<&'static str>,
    pub response_mode: Option<&'static str>,
}

/// Post-exchange account-id discovery method.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdentityDiscovery {
    /// The account stays under the placeholder id.
    None,
    /// Decode the subject claim of the issued token.
    JwtSubject,
    /// Query a member/profile endpoint with the fresh access token.
    MemberProfile { url: String },
}
