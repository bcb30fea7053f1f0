//! Bridge configuration.
//!
//! Everything has a default, so `BridgeConfig::default()` is a working setup. A
//! TOML document can override any subset:
//!
//! ```toml
//! protocol_version = "2.0.1"
//! additional_valid_origins = ["https://*.contoso.com", "partner.example.org"]
//!
//! [remote_allow_list]
//! enabled = true
//! url = "https://res.cdn.office.net/teams-js/validDomains/json/validDomains.json"
//! timeout_ms = 1500
//! ```

use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// Version this crate speaks in the handshake.
pub const PROTOCOL_VERSION: &str = "2.0.1";

/// Where the remote allow-list document is published.
pub const DEFAULT_ALLOW_LIST_URL: &str =
    "https://res.cdn.office.net/teams-js/validDomains/json/validDomains.json";

/// How long a prefetch may take before the bundled list is used instead.
pub const DEFAULT_ALLOW_LIST_TIMEOUT_MS: u64 = 1_500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub protocol_version: String,
    /// Extra hosts or `*.suffix` patterns accepted on top of the allow-list.
    /// An `https://` prefix is allowed and stripped at match time.
    pub additional_valid_origins: Vec<String>,
    pub remote_allow_list: RemoteAllowListConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            additional_valid_origins: Vec::new(),
            remote_allow_list: RemoteAllowListConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteAllowListConfig {
    pub enabled: bool,
    pub url: String,
    pub timeout_ms: u64,
}

impl Default for RemoteAllowListConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: DEFAULT_ALLOW_LIST_URL.to_string(),
            timeout_ms: DEFAULT_ALLOW_LIST_TIMEOUT_MS,
        }
    }
}

impl RemoteAllowListConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl BridgeConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml_str(raw: &str) -> Result<Self, BridgeError> {
        let cfg: BridgeConfig = toml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BridgeError> {
        let raw = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    /// Builder-style helper for the extra origins list.
    pub fn with_additional_origins<I, S>(mut self, origins: I) -> Result<Self, BridgeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.additional_valid_origins = origins.into_iter().map(Into::into).collect();
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.protocol_version.trim().is_empty() {
            return Err(BridgeError::InvalidArguments(
                "protocol_version must not be empty".into(),
            ));
        }
        for origin in &self.additional_valid_origins {
            let bare = origin.strip_prefix("https://").unwrap_or(origin).trim();
            if bare.is_empty() || bare == "*" {
                return Err(BridgeError::InvalidArguments(format!(
                    "additional valid origin {origin:?} would accept every host"
                )));
            }
        }
        if self.remote_allow_list.enabled {
            url::Url::parse(&self.remote_allow_list.url)?;
        }
        Ok(())
    }
}
