//! Config schema types.

use std::collections::HashMap;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalmcpConfig {
    pub caldav: CalDavConfig,
}

/// CalDAV section: a set of named accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalDavConfig {
    pub enabled: bool,
    /// Account used when a caller does not name one.
    pub default_account: Option<String>,
    pub accounts: HashMap<String, CalDavAccountConfig>,
}

impl Default for CalDavConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_account: None,
            accounts: HashMap::new(),
        }
    }
}

impl CalDavConfig {
    /// Pick an account: the explicit `name`, else `default_account`, else the
    /// only configured account.
    ///
    /// Returns the account's name alongside its settings.
    pub fn resolve_account(&self, name: Option<&str>) -> Option<(&str, &CalDavAccountConfig)> {
        let wanted = name.or(self.default_account.as_deref());
        match wanted {
            Some(wanted) => self
                .accounts
                .get_key_value(wanted)
                .map(|(k, v)| (k.as_str(), v)),
            None if self.accounts.len() == 1 => self
                .accounts
                .iter()
                .next()
                .map(|(k, v)| (k.as_str(), v)),
            None => None,
        }
    }
}

/// Connection settings for one CalDAV account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalDavAccountConfig {
    /// `"fastmail"`, `"icloud"` or `"generic"`.
    pub provider: Option<String>,
    /// Base URL. Optional for providers with a well-known endpoint.
    pub url: Option<String>,
    pub username: Option<String>,
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub password: Option<Secret<String>>,
    /// Per-request HTTP timeout.
    pub timeout_seconds: u64,
}

impl Default for CalDavAccountConfig {
    fn default() -> Self {
        Self {
            provider: None,
            url: None,
            username: None,
            password: None,
            timeout_seconds: 30,
        }
    }
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
