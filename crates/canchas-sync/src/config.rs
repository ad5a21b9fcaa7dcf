//! # Client Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     CANCHAS_API_URL=https://api.miscanchas.com                         │
//! │     CANCHAS_API_TOKEN=...                                              │
//! │     CANCHAS_ESTABLISHMENT_ID=est-norte                                 │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/miscanchas/client.toml (Linux)                           │
//! │     ~/Library/Application Support/com.miscanchas.miscanchas/ (macOS)   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [api]
//! base_url = "http://localhost:3000"
//! token = "..."
//! request_timeout_secs = 15
//!
//! [establishment]
//! id = "est-norte"
//!
//! [polling]
//! cash_register_interval_secs = 30
//! notifications_interval_secs = 60
//!
//! [rate_limit]
//! window_secs = 60
//! warning_after = 2
//! blocked_after = 3
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use canchas_core::CASH_REGISTER_POLL_INTERVAL_SECS;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// API Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Root of the REST backend; `/api/...` paths are joined onto it.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token for the signed-in user.
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_request_timeout() -> u64 {
    15
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            base_url: default_base_url(),
            token: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// =============================================================================
// Establishment Settings
// =============================================================================

/// The establishment this client manages. Players leave it unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EstablishmentSettings {
    #[serde(default)]
    pub id: Option<String>,
}

// =============================================================================
// Polling Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingSettings {
    #[serde(default = "default_cash_register_interval")]
    pub cash_register_interval_secs: u64,

    #[serde(default = "default_notifications_interval")]
    pub notifications_interval_secs: u64,
}

fn default_cash_register_interval() -> u64 {
    CASH_REGISTER_POLL_INTERVAL_SECS
}

fn default_notifications_interval() -> u64 {
    60
}

impl Default for PollingSettings {
    fn default() -> Self {
        PollingSettings {
            cash_register_interval_secs: default_cash_register_interval(),
            notifications_interval_secs: default_notifications_interval(),
        }
    }
}

// =============================================================================
// Rate-Limit Settings
// =============================================================================

/// Escalation thresholds for repeated 429 responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Quiet period after which the hit count resets.
    #[serde(default = "default_window")]
    pub window_secs: u64,

    /// Hits within the window before the message becomes a warning.
    #[serde(default = "default_warning_after")]
    pub warning_after: u32,

    /// Hits within the window before the client reports itself blocked.
    #[serde(default = "default_blocked_after")]
    pub blocked_after: u32,
}

fn default_window() -> u64 {
    60
}

fn default_warning_after() -> u32 {
    2
}

fn default_blocked_after() -> u32 {
    3
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        RateLimitSettings {
            window_secs: default_window(),
            warning_after: default_warning_after(),
            blocked_after: default_blocked_after(),
        }
    }
}

// =============================================================================
// Main Client Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub establishment: EstablishmentSettings,

    #[serde(default)]
    pub polling: PollingSettings,

    #[serde(default)]
    pub rate_limit: RateLimitSettings,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (client.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading client config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load client config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Client config saved");
        Ok(())
    }

    pub fn validate(&self) -> SyncResult<()> {
        let url = Url::parse(&self.api.base_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SyncError::InvalidUrl(format!(
                "API URL must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        if self.api.request_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.polling.cash_register_interval_secs == 0
            || self.polling.notifications_interval_secs == 0
        {
            return Err(SyncError::InvalidConfig(
                "poll intervals must be greater than 0".into(),
            ));
        }

        if self.rate_limit.warning_after == 0
            || self.rate_limit.blocked_after <= self.rate_limit.warning_after
        {
            return Err(SyncError::InvalidConfig(
                "rate_limit thresholds must satisfy 0 < warning_after < blocked_after".into(),
            ));
        }

        Ok(())
    }

    /// Applies `CANCHAS_*` overrides read through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("CANCHAS_API_URL") {
            debug!(url = %url, "Overriding API URL from environment");
            self.api.base_url = url;
        }

        if let Some(token) = lookup("CANCHAS_API_TOKEN") {
            self.api.token = Some(token);
        }

        if let Some(id) = lookup("CANCHAS_ESTABLISHMENT_ID") {
            debug!(establishment_id = %id, "Overriding establishment from environment");
            self.establishment.id = Some(id);
        }

        if let Some(secs) = lookup("CANCHAS_POLL_INTERVAL_SECS") {
            match secs.parse::<u64>() {
                Ok(s) => self.polling.cash_register_interval_secs = s,
                Err(_) => warn!(value = %secs, "Ignoring invalid CANCHAS_POLL_INTERVAL_SECS"),
            }
        }

        if let Some(secs) = lookup("CANCHAS_REQUEST_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(s) => self.api.request_timeout_secs = s,
                Err(_) => warn!(value = %secs, "Ignoring invalid CANCHAS_REQUEST_TIMEOUT_SECS"),
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "miscanchas", "miscanchas")
            .map(|dirs| dirs.config_dir().join("client.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn establishment_id(&self) -> Option<&str> {
        self.establishment.id.as_deref()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }

    pub fn cash_register_interval(&self) -> Duration {
        Duration::from_secs(self.polling.cash_register_interval_secs)
    }

    pub fn notifications_interval(&self) -> Duration {
        Duration::from_secs(self.polling.notifications_interval_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit.window_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = ClientConfig::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.cash_register_interval(), Duration::from_secs(30));
        assert_eq!(config.establishment_id(), None);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
            [api]
            base_url = "https://api.miscanchas.com"

            [establishment]
            id = "est-norte"
            "#,
        )
        .unwrap();

        assert_eq!(config.api.base_url, "https://api.miscanchas.com");
        assert_eq!(config.api.request_timeout_secs, 15);
        assert_eq!(config.establishment_id(), Some("est-norte"));
        assert_eq!(config.polling.notifications_interval_secs, 60);
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("CANCHAS_API_URL", "https://staging.miscanchas.com"),
            ("CANCHAS_API_TOKEN", "tok"),
            ("CANCHAS_ESTABLISHMENT_ID", "est-sur"),
            ("CANCHAS_POLL_INTERVAL_SECS", "10"),
            ("CANCHAS_REQUEST_TIMEOUT_SECS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = ClientConfig::new();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.api.base_url, "https://staging.miscanchas.com");
        assert_eq!(config.api.token.as_deref(), Some("tok"));
        assert_eq!(config.establishment_id(), Some("est-sur"));
        assert_eq!(config.polling.cash_register_interval_secs, 10);
        // Unparseable value leaves the default in place.
        assert_eq!(config.api.request_timeout_secs, 15);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ClientConfig::new();
        config.api.base_url = "not a url".into();
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));

        let mut config = ClientConfig::new();
        config.api.base_url = "ftp://example.com".into();
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));

        let mut config = ClientConfig::new();
        config.polling.cash_register_interval_secs = 0;
        assert!(config.validate().unwrap_err().is_config_error());

        let mut config = ClientConfig::new();
        config.rate_limit.blocked_after = config.rate_limit.warning_after;
        assert!(matches!(config.validate(), Err(SyncError::InvalidConfig(_))));
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir()
            .join(format!("canchas-{}", uuid::Uuid::new_v4()))
            .join("client.toml");

        let mut config = ClientConfig::new();
        config.establishment.id = Some("est-norte".into());
        config.polling.notifications_interval_secs = 45;
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let loaded: ClientConfig = toml::from_str(&contents).unwrap();
        assert_eq!(loaded.establishment_id(), Some("est-norte"));
        assert_eq!(loaded.polling.notifications_interval_secs, 45);

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}
