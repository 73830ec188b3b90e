// Transport seam for issuing raw HTTP requests.
//
// The engine talks to a `Transport` trait object so tests can script
// responses without a network. `HttpTransport` is the reqwest-backed
// implementation used in production.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use tracing::debug;
use url::Url;

use crate::error::Error;

/// A fully-resolved request, ready to hand to a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    /// Path relative to the transport's base URL, e.g. `/app/devices`.
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Look up a header value (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A raw HTTP response. Status classification happens in [`ApiClient`](crate::ApiClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Issues a single HTTP request.
///
/// Implementations report only network-level failures as errors
/// ([`Error::Unreachable`] / [`Error::Other`]); any response that arrived,
/// whatever its status, is returned as `Ok`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, Error>;
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            user_agent: format!("telesync/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.as_str())
            .build()
            .map_err(|e| Error::Other(format!("failed to build HTTP client: {e}")))
    }
}

/// reqwest-backed [`Transport`].
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    /// Build from a base URL (e.g. `https://api.example.com/mobile_apps`)
    /// and a transport config.
    pub fn new(base_url: &str, config: &TransportConfig) -> Result<Self, Error> {
        let http = config.build_client()?;
        Self::from_reqwest(base_url, http)
    }

    /// Wrap an existing `reqwest::Client`.
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        let base_url = Url::parse(base_url)?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append `path` to the base URL, keeping any base path prefix.
    fn url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        let url = self.url(&request.path)?;
        debug!("{} {url}", request.method);

        let mut builder = self.http.request(request.method.clone(), url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await?.to_vec();
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_keeps_base_path_prefix() {
        let transport =
            HttpTransport::from_reqwest("https://api.example.com/mobile_apps", reqwest::Client::new())
                .expect("valid base url");

        let url = transport.url("/app-1/devices").expect("valid url");
        assert_eq!(url.as_str(), "https://api.example.com/mobile_apps/app-1/devices");

        let trailing =
            HttpTransport::from_reqwest("https://api.example.com/mobile_apps/", reqwest::Client::new())
                .expect("valid base url");
        let url = trailing.url("app-1/devices").expect("valid url");
        assert_eq!(url.as_str(), "https://api.example.com/mobile_apps/app-1/devices");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let result = HttpTransport::from_reqwest("not a url", reqwest::Client::new());
        assert!(matches!(result, Err(Error::Other(_))));
    }
}
