//! Runtime configuration.
//!
//! Loaded from a TOML file with every section defaulted; the encryption
//! master key deliberately comes from the environment instead
//! (`KASSA_ENCRYPTION_KEY`), never from config on disk.

use serde::Deserialize;

/// Complete kassa configuration
#[derive(Debug, Clone, Deserialize)]
pub struct KassaConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub link: LinkConfig,
}

/// Credential database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "kassa.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Loopback API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

fn default_listen_addr() -> String {
    "127.0.0.1:7878".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

/// Login flow configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LinkConfig {
    /// How long a dispatched login may take before its state token expires
    /// (seconds); also how long consumed tokens are remembered.
    #[serde(default = "default_attempt_expiry")]
    pub attempt_expiry_seconds: i64,
    /// How often expired attempts are swept (seconds)
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
    /// How long before expiry an access token is refreshed (seconds)
    #[serde(default = "default_refresh_lead")]
    pub refresh_lead_seconds: i64,
}

fn default_attempt_expiry() -> i64 {
    600
}

fn default_cleanup_interval() -> u64 {
    60
}

fn default_refresh_lead() -> i64 {
    crate::session::DEFAULT_REFRESH_LEAD_SECS
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            attempt_expiry_seconds: default_attempt_expiry(),
            cleanup_interval_seconds: default_cleanup_interval(),
            refresh_lead_seconds: default_refresh_lead(),
        }
    }
}

impl Default for KassaConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            api: ApiConfig::default(),
            link: LinkConfig::default(),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<KassaConfig, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    let config: KassaConfig = toml::from_str(&contents)?;
    Ok(config)
}
