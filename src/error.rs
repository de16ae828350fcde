//! Error types for the harvester.

use thiserror::Error;

/// The main error type for all harvesting operations.
#[derive(Error, Debug)]
pub enum HarvestError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP request with middleware failed
    #[error("HTTP request failed: {0}")]
    HttpMiddleware(#[from] reqwest_middleware::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// The API answered with a non-200 status
    #[error("{0}")]
    Status(StatusError),

    /// Request timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Connection could not be established or was reset (includes DNS failures)
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The response body ended before it was fully read
    #[error("Incomplete read: {0}")]
    IncompleteRead(String),

    /// The operation was cancelled by a shutdown request
    #[error("Operation cancelled")]
    Cancelled,

    /// A transient failure persisted through every allowed attempt
    #[error("Max retries exceeded: {attempts} / {max_retries}: {source}")]
    RetriesExhausted {
        /// Number of attempts made
        attempts: u32,
        /// Configured attempt budget
        max_retries: u32,
        /// The last transient error
        source: Box<HarvestError>,
    },

    /// The provider kept answering 429 past the configured cooldown budget
    #[error("Rate limit cooldown budget exhausted after {cooldowns} cooldowns: {source}")]
    RateLimitCooldownExhausted {
        /// Number of cooldowns slept
        cooldowns: u32,
        /// The last 429 error
        source: Box<HarvestError>,
    },

    /// A partition key that was not registered at construction
    #[error("Unknown partition: {0}")]
    UnknownPartition(String),

    /// Invalid configuration, detected at startup
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Persistence failure
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// A blocking or spawned task failed to complete
    #[error("Task failed: {0}")]
    Task(String),

    /// No API key was supplied
    #[error("Missing API key: set RIOT_API_KEY")]
    MissingApiKey,

    /// A response did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl HarvestError {
    /// The HTTP status code carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            HarvestError::Status(e) => Some(e.status),
            HarvestError::Http(e) => e.status().map(|s| s.as_u16()),
            HarvestError::RetriesExhausted { source, .. }
            | HarvestError::RateLimitCooldownExhausted { source, .. } => source.status(),
            _ => None,
        }
    }

    /// The server's `Retry-After` hint in seconds, if any.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            HarvestError::Status(e) => e.retry_after,
            _ => None,
        }
    }

    /// Whether this error (or the error it wraps) is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            HarvestError::Cancelled => true,
            HarvestError::RetriesExhausted { source, .. }
            | HarvestError::RateLimitCooldownExhausted { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Map a reqwest failure onto the typed network errors.
    pub(crate) fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            HarvestError::Timeout(error.to_string())
        } else if error.is_connect() {
            HarvestError::Connection(error.to_string())
        } else if error.is_body() || error.is_decode() {
            HarvestError::IncompleteRead(error.to_string())
        } else {
            HarvestError::Http(error)
        }
    }

    /// Map a middleware failure onto the typed network errors.
    pub(crate) fn from_middleware(error: reqwest_middleware::Error) -> Self {
        match error {
            reqwest_middleware::Error::Reqwest(e) => Self::from_reqwest(e),
            other => HarvestError::HttpMiddleware(other),
        }
    }
}

/// A non-success HTTP status returned by the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusError {
    /// The HTTP status code
    pub status: u16,
    /// Human-readable description of the status
    pub message: String,
    /// Seconds from a `Retry-After` header, when present
    pub retry_after: Option<u64>,
}

impl std::fmt::Display for StatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HTTP {}: {}", self.status, self.message)
    }
}

impl StatusError {
    /// Create a status error using the built-in description for `status`.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            message: status_description(status).to_string(),
            retry_after: None,
        }
    }

    /// Attach a `Retry-After` value.
    pub fn with_retry_after(mut self, retry_after: Option<u64>) -> Self {
        self.retry_after = retry_after;
        self
    }

    /// Whether this is a server-side (5xx) failure.
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    /// Whether this is the explicit rate-limit signal.
    pub fn is_rate_limit(&self) -> bool {
        self.status == status_codes::TOO_MANY_REQUESTS
    }
}

impl From<StatusError> for HarvestError {
    fn from(error: StatusError) -> Self {
        HarvestError::Status(error)
    }
}

/// Describe an HTTP status code the way the Riot API documents it.
pub fn status_description(status: u16) -> &'static str {
    match status {
        200 => "OK - request successful",
        400 => "Bad Request - syntax error, wrong parameter format or missing parameter",
        401 => "Unauthorized - missing or outdated API key",
        403 => "Forbidden - invalid or blacklisted API key, or unsupported path",
        404 => "Not Found - no matching resource",
        405 => "Method Not Allowed",
        415 => "Unsupported Media Type",
        429 => "Rate Limit Exceeded - too many requests in the time frame",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        400..=499 => "Client Error",
        500..=599 => "Server Error",
        _ => "Unexpected Status",
    }
}

/// Status codes the harvester treats specially.
pub mod status_codes {
    pub const OK: u16 = 200;
    pub const BAD_REQUEST: u16 = 400;
    pub const UNAUTHORIZED: u16 = 401;
    pub const FORBIDDEN: u16 = 403;
    pub const NOT_FOUND: u16 = 404;
    pub const METHOD_NOT_ALLOWED: u16 = 405;
    pub const UNSUPPORTED_MEDIA_TYPE: u16 = 415;
    pub const TOO_MANY_REQUESTS: u16 = 429;
    pub const INTERNAL_SERVER_ERROR: u16 = 500;
    pub const BAD_GATEWAY: u16 = 502;
    pub const SERVICE_UNAVAILABLE: u16 = 503;
    pub const GATEWAY_TIMEOUT: u16 = 504;
}
