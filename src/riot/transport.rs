//! HTTP transport seam.
//!
//! [`Transport`] performs one GET and reports the raw outcome. It never
//! interprets status codes; that is the client's and retrier's job. Network
//! failures come back as typed errors ([`HarvestError::Timeout`],
//! [`HarvestError::Connection`], [`HarvestError::IncompleteRead`]).

use std::future::Future;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER, USER_AGENT};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_tracing::TracingMiddleware;

use crate::error::HarvestError;

/// Status, body and rate-limit hint of one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
    /// `Retry-After` in seconds, when the server sent one.
    pub retry_after: Option<u64>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            retry_after: None,
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }
}

/// Performs GET requests.
///
/// `headers` are sent verbatim, `query` is URL-encoded onto `url`.
pub trait Transport: Send + Sync {
    fn get(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
        query: &[(String, String)],
    ) -> impl Future<Output = Result<RawResponse, HarvestError>> + Send;
}

/// [`Transport`] over reqwest with request tracing.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    http_client: ClientWithMiddleware,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::with_settings(None, None)
    }

    /// Build with an optional per-request timeout and user agent.
    pub fn with_settings(timeout: Option<Duration>, user_agent: Option<String>) -> Self {
        let mut headers = HeaderMap::new();
        let user_agent = user_agent
            .unwrap_or_else(|| format!("league-harvester/{}", env!("CARGO_PKG_VERSION")));
        let header_value = HeaderValue::from_str(&user_agent)
            .unwrap_or_else(|_| HeaderValue::from_static("league-harvester"));
        headers.insert(USER_AGENT, header_value);

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let reqwest_client = builder.build().unwrap_or_else(|_| reqwest::Client::new());

        let http_client = ClientBuilder::new(reqwest_client)
            .with(TracingMiddleware::default())
            .build();

        Self { http_client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    async fn get(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
        query: &[(String, String)],
    ) -> Result<RawResponse, HarvestError> {
        let query_string = serde_urlencoded::to_string(query)
            .map_err(|e| HarvestError::InvalidResponse(e.to_string()))?;
        let url = if query_string.is_empty() {
            url.to_string()
        } else {
            format!("{url}?{query_string}")
        };

        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let mut value = HeaderValue::from_str(value)
                .map_err(|e| HarvestError::Config(format!("invalid header {name}: {e}")))?;
            value.set_sensitive(true);
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| HarvestError::Config(format!("invalid header name {name}: {e}")))?;
            header_map.insert(name, value);
        }

        let response = self
            .http_client
            .get(&url)
            .headers(header_map)
            .send()
            .await
            .map_err(HarvestError::from_middleware)?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        let body = response.text().await.map_err(HarvestError::from_reqwest)?;

        Ok(RawResponse {
            status,
            body,
            retry_after,
        })
    }
}
