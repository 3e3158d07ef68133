//! Authorization request URL construction.

use crate::platform::LoginConfig;

/// Build the provider authorization URL for one login attempt.
///
/// Carries the standard code-flow parameters, the PKCE S256 challenge, the
/// CSRF state token, and whatever extra parameters the provider's client
/// registration demands.
pub fn authorization_url(config: &LoginConfig, state: &str, code_challenge: &str) -> String {
    let mut url = format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&state={}&code_challenge={}&code_challenge_method=S256",
        config.auth_url,
        urlencoding::encode(config.client_id),
        urlencoding::encode(config.redirect_uri),
        urlencoding::encode(state),
        urlencoding::encode(code_challenge),
    );

    if !config.scope.is_empty() {
        url.push_str("&scope=");
        url.push_str(&urlencoding::encode(config.scope));
    }
    if let Some(prompt) = config.prompt {
        url.push_str("&prompt=");
        url.push_str(&urlencoding::encode(prompt));
    }
    if let Some(mode) = config.response_mode {
        url.push_str("&response_mode=");
        url.push_str(&urlencoding::encode(mode));
    }
    for (key, value) in config.extra_params {
        url.push('&');
        url.push_str(&urlencoding::encode(key));
        url.push('=');
        url.push_str(&urlencoding::encode(value));
    }

    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;

    #[test]
    fn test_lidl_authorization_url() {
        let config = Platform::Lidl.login_config().unwrap();
        let url = authorization_url(&config, "state-token", "challenge-123");

        assert!(url.starts_with("https://accounts.lidl.com/connect/authorize?"));
        assert!(url.contains("client_id=LidlPlusNativeClient"));
        assert!(url.contains("redirect_uri=com.lidlplus.app%3A%2F%2Fcallback"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("state=state-token"));
        assert!(url.contains("code_challenge=challenge-123"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("scope=openid%20profile%20offline_access%20lpprofile%20lpapis"));
        assert!(url.contains("Country=NL"));
        assert!(url.contains("language=NL-NL"));
    }

    #[test]
    fn test_empty_scope_omitted() {
        let config = Platform::Appie.login_config().unwrap();
        let url = authorization_url(&config, "s", "c");
        assert!(!url.contains("scope="));
    }

    #[test]
    fn test_jumbo_prompt_and_response_mode() {
        let config = Platform::Jumbo.login_config().unwrap();
        let url = authorization_url(&config, "s", "c");
        assert!(url.contains("prompt=login"));
        assert!(url.contains("response_mode=query"));
        assert!(url.contains("audience=https%3A%2F%2Fjumbo.com%2Floyalty"));
        assert!(url.contains("auth0Client="));
    }
}
