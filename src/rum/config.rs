//! Engine configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Remote catalog location used when nothing else is configured
pub const DEFAULT_CONFIG_URL: &str = "https://www.atmrum.net/conf/v1/atm/fpconfig.min.json";

/// Canonical measurement root domain
pub const DEFAULT_ROOT_DOMAIN: &str = "clo.footprintdns.com";

/// Settings for the measurement engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RumSettings {
    /// Where the weighted endpoint catalog is fetched from
    pub config_url: String,

    /// Root domain for legacy and wildcard endpoint ids
    pub root_domain: String,

    /// Per-request timeout applied by the HTTP transport
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,

    /// Pause between runs while enabled (None = one run per enable)
    #[serde(with = "option_duration_serde", skip_serializing_if = "Option::is_none")]
    pub repeat_interval: Option<Duration>,

    /// User-Agent sent by the HTTP transport
    pub user_agent: String,
}

impl Default for RumSettings {
    fn default() -> Self {
        Self {
            config_url: DEFAULT_CONFIG_URL.to_string(),
            root_domain: DEFAULT_ROOT_DOMAIN.to_string(),
            request_timeout: Duration::from_secs(30),
            repeat_interval: None,
            user_agent: concat!("rum-latency/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl RumSettings {
    /// Build settings from `RUM_*` environment variables (a `.env` file is honored)
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let mut settings = Self::default();

        if let Ok(v) = std::env::var("RUM_CONFIG_URL") {
            if !v.trim().is_empty() {
                settings.config_url = v.trim().to_string();
            }
        }
        if let Ok(v) = std::env::var("RUM_ROOT_DOMAIN") {
            if !v.trim().is_empty() {
                settings.root_domain = v.trim().to_string();
            }
        }
        if let Ok(v) = std::env::var("RUM_REQUEST_TIMEOUT_MS") {
            if let Ok(ms) = v.parse::<u64>() {
                if ms > 0 {
                    settings.request_timeout = Duration::from_millis(ms);
                }
            }
        }
        if let Ok(v) = std::env::var("RUM_REPEAT_INTERVAL_MS") {
            settings.repeat_interval = v
                .parse::<u64>()
                .ok()
                .filter(|&ms| ms > 0)
                .map(Duration::from_millis);
        }
        if let Ok(v) = std::env::var("RUM_USER_AGENT") {
            if !v.is_empty() {
                settings.user_agent = v;
            }
        }

        settings
    }

    /// Parse settings from TOML; missing keys fall back to defaults
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

// Serde helper for Duration (using milliseconds for simplicity)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}

mod option_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = Option::<u64>::deserialize(deserializer)?;
        Ok(ms.filter(|&ms| ms > 0).map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = RumSettings::default();
        assert_eq!(settings.root_domain, "clo.footprintdns.com");
        assert_eq!(settings.request_timeout, Duration::from_secs(30));
        assert!(settings.repeat_interval.is_none());
        assert!(settings.user_agent.starts_with("rum-latency/"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = RumSettings::from_toml_str(
            r#"
            config_url = "https://config.example.test/catalog.json"
            request_timeout = 2500
            repeat_interval = 60000
            "#,
        )
        .unwrap();

        assert_eq!(settings.config_url, "https://config.example.test/catalog.json");
        assert_eq!(settings.request_timeout, Duration::from_millis(2500));
        assert_eq!(settings.repeat_interval, Some(Duration::from_secs(60)));
        assert_eq!(settings.root_domain, DEFAULT_ROOT_DOMAIN);
    }

    #[test]
    fn test_toml_rejects_bad_types() {
        assert!(RumSettings::from_toml_str("request_timeout = \"soon\"").is_err());
    }
}
