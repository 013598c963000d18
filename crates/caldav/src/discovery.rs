//! Provider-specific CalDAV endpoints.
//!
//! Maps well-known providers to their CalDAV base URLs. Servers without a
//! known URL are located through the RFC 6764 `/.well-known/caldav` path.

/// Well-known CalDAV base URL for Fastmail.
pub const FASTMAIL_CALDAV_URL: &str = "https://caldav.fastmail.com";

/// Well-known CalDAV base URL for iCloud.
/// Requires an app-specific password.
pub const ICLOUD_CALDAV_URL: &str = "https://caldav.icloud.com";

/// Bootstrap path for `current-user-principal` discovery.
pub const WELL_KNOWN_CALDAV_PATH: &str = "/.well-known/caldav";

/// Hosted CalDAV services with a fixed endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Fastmail,
    Icloud,
    Generic,
}

impl Provider {
    /// `None` and `"generic"` map to [`Provider::Generic`]; unknown names to `None`.
    #[must_use]
    pub fn from_name(name: Option<&str>) -> Option<Self> {
        match name.map(str::to_ascii_lowercase).as_deref() {
            Some("fastmail") => Some(Self::Fastmail),
            Some("icloud") => Some(Self::Icloud),
            Some("generic") | None => Some(Self::Generic),
            Some(_) => None,
        }
    }

    #[must_use]
    pub fn default_url(self) -> Option<&'static str> {
        match self {
            Self::Fastmail => Some(FASTMAIL_CALDAV_URL),
            Self::Icloud => Some(ICLOUD_CALDAV_URL),
            Self::Generic => None,
        }
    }
}

/// Resolve the CalDAV base URL for a given provider.
///
/// An explicit `url` always wins. Otherwise known providers fall back to
/// their well-known URL; generic and unknown providers have none.
#[must_use]
pub fn resolve_base_url(provider: Option<&str>, url: Option<&str>) -> Option<String> {
    let known = Provider::from_name(provider);
    if known.is_none() {
        #[cfg(feature = "tracing")]
        tracing::warn!(provider = ?provider, "unknown CalDAV provider, using URL as-is");
    }
    url.map(String::from).or_else(|| {
        known
            .and_then(Provider::default_url)
            .map(String::from)
    })
}
