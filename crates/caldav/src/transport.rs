//! HTTP boundary: the request/response pair the client exchanges with a
//! CalDAV server, and a `reqwest` implementation.

use std::time::Duration;

use {
    async_trait::async_trait,
    reqwest::{Client, Method},
    secrecy::{ExposeSecret, Secret},
    url::Url,
};

use crate::error::{Context, Error, Result};

const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";

/// WebDAV/CalDAV verbs used by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DavMethod {
    Propfind,
    Proppatch,
    Mkcalendar,
    Report,
    Get,
    Delete,
}

impl DavMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Propfind => "PROPFIND",
            Self::Proppatch => "PROPPATCH",
            Self::Mkcalendar => "MKCALENDAR",
            Self::Report => "REPORT",
            Self::Get => "GET",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for DavMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of the `Depth` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    Zero,
    One,
}

impl Depth {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Zero => "0",
            Self::One => "1",
        }
    }
}

/// A request against a server-relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DavRequest {
    pub method: DavMethod,
    pub path: String,
    pub body: Option<String>,
    pub depth: Option<Depth>,
    pub headers: Vec<(String, String)>,
}

impl DavRequest {
    #[must_use]
    pub fn new(method: DavMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            depth: None,
            headers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    #[must_use]
    pub fn with_depth(mut self, depth: Depth) -> Self {
        self.depth = Some(depth);
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// What came back: status code, headers and the body as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DavResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl DavResponse {
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header with `name`, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Sends DAV requests.
///
/// This allows mocking in tests without a real server.
#[async_trait]
pub trait DavTransport: Send + Sync {
    async fn send(&self, request: DavRequest) -> Result<DavResponse>;
}

/// `reqwest`-backed transport with optional basic auth.
pub struct HttpDavTransport {
    client: Client,
    base_url: Url,
    username: Option<String>,
    password: Option<Secret<String>>,
}

impl HttpDavTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client for CalDAV transport")?;
        Ok(Self {
            client,
            base_url: Url::parse(base_url)?,
            username: None,
            password: None,
        })
    }

    #[must_use]
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: Option<Secret<String>>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = password;
        self
    }

    /// Build a transport from a configured account, resolving the provider's
    /// well-known URL when none is given.
    pub fn from_account(account: &calmcp_config::CalDavAccountConfig) -> Result<Self> {
        let base_url = crate::discovery::resolve_base_url(
            account.provider.as_deref(),
            account.url.as_deref(),
        )
        .context("CalDAV account has no url")?;
        let transport = Self::new(&base_url, Duration::from_secs(account.timeout_seconds))?;
        Ok(match &account.username {
            Some(username) => transport.with_basic_auth(username, account.password.clone()),
            None => transport,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn resolve(&self, path: &str) -> Result<Url> {
        if path.is_empty() {
            return Ok(self.base_url.clone());
        }
        Ok(self.base_url.join(path)?)
    }
}

impl std::fmt::Debug for HttpDavTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDavTransport")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DavTransport for HttpDavTransport {
    async fn send(&self, request: DavRequest) -> Result<DavResponse> {
        let url = self.resolve(&request.path)?;
        let method = Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| Error::external("invalid HTTP method", e))?;

        #[cfg(feature = "tracing")]
        tracing::debug!(method = %request.method, url = %url, "sending CalDAV request");

        let mut builder = self.client.request(method, url);
        if let Some(username) = &self.username {
            builder = builder.basic_auth(
                username,
                self.password.as_ref().map(|p| p.expose_secret().as_str()),
            );
        }
        if let Some(depth) = request.depth {
            builder = builder.header("Depth", depth.as_str());
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.header("Content-Type", XML_CONTENT_TYPE).body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.text().await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(status, bytes = body.len(), "received CalDAV response");

        Ok(DavResponse {
            status,
            headers,
            body,
        })
    }
}
