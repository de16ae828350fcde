//! Rate-limited, retrying Riot API client.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use url::Url;

use super::endpoints::{self, production_base_url};
use super::transport::{HttpTransport, Transport};
use crate::auth::{ApiKey, ApiKeyProvider, RIOT_TOKEN_HEADER};
use crate::error::{HarvestError, StatusError, status_codes};
use crate::rate_limit::{RateLimitConfig, RegionalRateLimiter};
use crate::retry::{Retrier, RetryPolicy};
use crate::shutdown::{ShutdownCoordinator, SharedShutdown};
use crate::types::{Continent, Division, MatchType, Platform, Queue, Route, Tier};

/// One logical GET: a path on a routing host plus query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: Vec::new(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn param_opt(self, key: impl Into<String>, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.param(key, value),
            None => self,
        }
    }
}

/// Query of the match-ids-by-player endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchIdsQuery {
    pub match_type: Option<MatchType>,
    pub start: u32,
    pub count: u32,
    /// Only matches after this unix timestamp (seconds).
    pub start_time: Option<i64>,
}

impl Default for MatchIdsQuery {
    fn default() -> Self {
        Self {
            match_type: Some(MatchType::Ranked),
            start: 0,
            count: 100,
            start_time: None,
        }
    }
}

/// The Riot API client.
///
/// Every call waits for a token on its route's bucket pair, then performs
/// the request through the [`Retrier`]. Successful responses are returned as
/// raw JSON.
///
/// # Example
///
/// ```rust,no_run
/// use league_harvester::auth::ApiKey;
/// use league_harvester::riot::RiotClient;
/// use league_harvester::types::{Platform, Queue, Tier};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = RiotClient::builder().api_key(ApiKey::from_env()?).build()?;
///     let league = client.apex_league(Platform::Kr, Queue::RankedSolo5x5, Tier::Challenger).await?;
///     println!("{} entries", league["entries"].as_array().map_or(0, Vec::len));
///     Ok(())
/// }
/// ```
pub struct RiotClient<T = HttpTransport> {
    transport: Arc<T>,
    limiter: Arc<RegionalRateLimiter>,
    retrier: Retrier,
    api_key: Arc<dyn ApiKeyProvider>,
    base_url: Option<String>,
}

impl<T> Clone for RiotClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            limiter: Arc::clone(&self.limiter),
            retrier: self.retrier.clone(),
            api_key: Arc::clone(&self.api_key),
            base_url: self.base_url.clone(),
        }
    }
}

impl<T> std::fmt::Debug for RiotClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiotClient")
            .field("base_url", &self.base_url)
            .field("retry", self.retrier.policy())
            .finish_non_exhaustive()
    }
}

impl RiotClient<HttpTransport> {
    pub fn builder() -> RiotClientBuilder<HttpTransport> {
        RiotClientBuilder::new()
    }
}

impl<T: Transport> RiotClient<T> {
    pub fn limiter(&self) -> &Arc<RegionalRateLimiter> {
        &self.limiter
    }

    pub fn shutdown(&self) -> &SharedShutdown {
        self.retrier.shutdown()
    }

    fn url(&self, route: Route, path: &str) -> String {
        match &self.base_url {
            Some(base) => format!("{}{}", base.trim_end_matches('/'), path),
            None => format!("{}{}", production_base_url(route), path),
        }
    }

    /// Perform one request with rate limiting and retries.
    pub async fn fetch(&self, route: Route, request: &ApiRequest) -> Result<Value, HarvestError> {
        let label = format!("{route} {}", request.path);
        self.retrier
            .run(&label, || self.fetch_once(route, request))
            .await
    }

    /// A single attempt: wait for a token, send, map the status.
    async fn fetch_once(&self, route: Route, request: &ApiRequest) -> Result<Value, HarvestError> {
        self.limiter.acquire(&route, self.shutdown()).await?;

        let url = self.url(route, &request.path);
        let headers = [(
            RIOT_TOKEN_HEADER,
            self.api_key.api_key().expose_secret().to_string(),
        )];
        let response = self.transport.get(&url, &headers, &request.query).await?;
        debug!(%route, path = %request.path, status = response.status, "response received");

        if response.status != status_codes::OK {
            return Err(StatusError::new(response.status)
                .with_retry_after(response.retry_after)
                .into());
        }

        Ok(serde_json::from_str(&response.body)?)
    }

    /// One page of league entries for a non-apex tier and division.
    pub async fn league_entries(
        &self,
        platform: Platform,
        queue: Queue,
        tier: Tier,
        division: Division,
        page: u32,
    ) -> Result<Value, HarvestError> {
        let request = ApiRequest::new(format!(
            "{}/{queue}/{tier}/{division}",
            endpoints::league::ENTRIES_EXP
        ))
        .param("page", page);
        self.fetch(platform.into(), &request).await
    }

    /// The single league of an apex tier.
    pub async fn apex_league(
        &self,
        platform: Platform,
        queue: Queue,
        tier: Tier,
    ) -> Result<Value, HarvestError> {
        let segment = tier.apex_league_segment().ok_or_else(|| {
            HarvestError::Config(format!("{tier} is not an apex tier"))
        })?;
        let request = ApiRequest::new(format!(
            "{}/{segment}/by-queue/{queue}",
            endpoints::league::LEAGUES
        ));
        self.fetch(platform.into(), &request).await
    }

    /// League entries of one player on their platform.
    pub async fn league_entries_by_puuid(
        &self,
        platform: Platform,
        puuid: &str,
    ) -> Result<Value, HarvestError> {
        let request = ApiRequest::new(format!("{}/{puuid}", endpoints::league::ENTRIES_BY_PUUID));
        self.fetch(platform.into(), &request).await
    }

    /// Match ids played by one player.
    pub async fn match_ids_by_puuid(
        &self,
        continent: Continent,
        puuid: &str,
        query: &MatchIdsQuery,
    ) -> Result<Vec<String>, HarvestError> {
        let request = ApiRequest::new(format!("{}/{puuid}/ids", endpoints::matches::BY_PUUID))
            .param_opt("type", query.match_type)
            .param("start", query.start)
            .param("count", query.count)
            .param_opt("startTime", query.start_time);
        let value = self.fetch(continent.into(), &request).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn match_by_id(
        &self,
        continent: Continent,
        match_id: &str,
    ) -> Result<Value, HarvestError> {
        let request = ApiRequest::new(format!("{}/{match_id}", endpoints::matches::MATCHES));
        self.fetch(continent.into(), &request).await
    }

    pub async fn match_timeline(
        &self,
        continent: Continent,
        match_id: &str,
    ) -> Result<Value, HarvestError> {
        let request = ApiRequest::new(format!(
            "{}/{match_id}/timeline",
            endpoints::matches::MATCHES
        ));
        self.fetch(continent.into(), &request).await
    }
}

/// Builder for [`RiotClient`].
pub struct RiotClientBuilder<T> {
    transport: T,
    api_key: Option<Arc<dyn ApiKeyProvider>>,
    base_url: Option<String>,
    rate_limit: RateLimitConfig,
    retry: RetryPolicy,
    limiter: Option<Arc<RegionalRateLimiter>>,
    shutdown: Option<SharedShutdown>,
}

impl RiotClientBuilder<HttpTransport> {
    pub fn new() -> Self {
        Self::with_transport(HttpTransport::new())
    }
}

impl Default for RiotClientBuilder<HttpTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> RiotClientBuilder<T> {
    /// Start a builder around a custom transport.
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            api_key: None,
            base_url: None,
            rate_limit: RateLimitConfig::default(),
            retry: RetryPolicy::default(),
            limiter: None,
            shutdown: None,
        }
    }

    /// Replace the transport, keeping every other setting.
    pub fn transport<U: Transport>(self, transport: U) -> RiotClientBuilder<U> {
        RiotClientBuilder {
            transport,
            api_key: self.api_key,
            base_url: self.base_url,
            rate_limit: self.rate_limit,
            retry: self.retry,
            limiter: self.limiter,
            shutdown: self.shutdown,
        }
    }

    pub fn api_key(mut self, key: ApiKey) -> Self {
        self.api_key = Some(Arc::new(key));
        self
    }

    pub fn api_key_provider(mut self, provider: Arc<dyn ApiKeyProvider>) -> Self {
        self.api_key = Some(provider);
        self
    }

    /// Send every route to one base URL (useful for testing with a mock server).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = config;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Share an existing limiter instead of building one.
    pub fn limiter(mut self, limiter: Arc<RegionalRateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Validate settings and build the client.
    pub fn build(self) -> Result<RiotClient<T>, HarvestError> {
        let api_key = self.api_key.ok_or(HarvestError::MissingApiKey)?;
        if let Some(base) = &self.base_url {
            Url::parse(base)?;
        }
        self.retry.validate()?;
        let limiter = match self.limiter {
            Some(limiter) => limiter,
            None => Arc::new(RegionalRateLimiter::new(Route::all(), &self.rate_limit)?),
        };
        let shutdown = self.shutdown.unwrap_or_else(ShutdownCoordinator::shared);

        Ok(RiotClient {
            transport: Arc::new(self.transport),
            limiter,
            retrier: Retrier::new(self.retry, shutdown),
            api_key,
            base_url: self.base_url,
        })
    }
}
