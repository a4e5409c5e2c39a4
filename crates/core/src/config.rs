//! Client configuration
//!
//! Holds the credential, the platform base URL and the timeout/retry knobs.
//! Everything here is validated before the client makes a single request.

use std::fmt;
use std::time::Duration;

use reqwest::Url;
use tracing::debug;

use crate::{Error, Result};

/// Hosted platform API root.
pub const DEFAULT_BASE_URL: &str = "https://a2abase.ai/api";
/// Model requested when a run does not name one.
pub const DEFAULT_MODEL: &str = "gemini/gemini-2.5-pro";

const PLACEHOLDER_KEYS: &[&str] = &["your_api_key", "your-api-key", "<api_key>", "changeme"];

/// A platform credential of the form `pk_<id>:sk_<secret>`.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey {
    public_id: String,
    secret: String,
}

impl ApiKey {
    /// Parse and validate a raw key.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::config("API key is empty"));
        }
        if PLACEHOLDER_KEYS.contains(&raw.to_ascii_lowercase().as_str()) {
            return Err(Error::config(
                "API key is a placeholder; set A2ABASE_API_KEY to a real key",
            ));
        }

        let (public, secret) = raw
            .split_once(':')
            .ok_or_else(|| Error::config("API key must have the form pk_<id>:sk_<secret>"))?;
        let public_id = public
            .strip_prefix("pk_")
            .ok_or_else(|| Error::config("API key public part must start with pk_"))?;
        let secret = secret
            .strip_prefix("sk_")
            .ok_or_else(|| Error::config("API key secret part must start with sk_"))?;

        if public_id.is_empty() || secret.is_empty() {
            return Err(Error::config("API key has an empty id or secret"));
        }
        if is_placeholder_part(public_id) || is_placeholder_part(secret) {
            return Err(Error::config(
                "API key is a placeholder; set A2ABASE_API_KEY to a real key",
            ));
        }
        if !raw.chars().all(|c| c.is_ascii_graphic()) {
            return Err(Error::config("API key contains whitespace or non-ASCII characters"));
        }

        Ok(Self {
            public_id: public_id.to_string(),
            secret: secret.to_string(),
        })
    }

    pub fn public_id(&self) -> &str {
        &self.public_id
    }

    /// The full `pk_<id>:sk_<secret>` header value.
    pub fn expose(&self) -> String {
        format!("pk_{}:sk_{}", self.public_id, self.secret)
    }
}

fn is_placeholder_part(part: &str) -> bool {
    part.chars().all(|c| c == 'x' || c == 'X' || c == '*' || c == '.')
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey(pk_{}:sk_***)", self.public_id)
    }
}

/// Bounded exponential backoff for transient failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub factor: f64,
    /// Relative jitter, 0.2 means ±20%
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            factor: 2.0,
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based), before jitter.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16) as i32;
        let millis = self.base_delay.as_millis() as f64 * self.factor.max(1.0).powi(exponent);
        Duration::from_millis(millis.round() as u64)
    }

    /// Apply jitter. `sample` is expected in `[-1.0, 1.0]`.
    pub fn jittered(&self, delay: Duration, sample: f64) -> Duration {
        let spread = self.jitter.clamp(0.0, 1.0) * sample.clamp(-1.0, 1.0);
        let millis = delay.as_millis() as f64 * (1.0 + spread);
        Duration::from_millis(millis.round() as u64)
    }
}

/// Configuration for the A2ABase client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: ApiKey,
    pub base_url: Url,
    /// Timeout for every request/response call
    pub request_timeout: Duration,
    /// Maximum silence on a run stream before it fails
    pub stream_idle_timeout: Duration,
    /// Optional cap on the whole life of a run stream
    pub stream_total_timeout: Option<Duration>,
    pub retry: RetryPolicy,
    /// Optional cap on simultaneously open run streams
    pub max_concurrent_streams: Option<usize>,
    pub default_model: String,
}

impl ClientConfig {
    /// Build a configuration for the hosted platform.
    pub fn new(api_key: &str) -> Result<Self> {
        Ok(Self {
            api_key: ApiKey::parse(api_key)?,
            base_url: parse_base_url(DEFAULT_BASE_URL)?,
            request_timeout: Duration::from_secs(30),
            stream_idle_timeout: Duration::from_secs(120),
            stream_total_timeout: None,
            retry: RetryPolicy::default(),
            max_concurrent_streams: None,
            default_model: DEFAULT_MODEL.to_string(),
        })
    }

    /// Build a configuration from `A2ABASE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let key = std::env::var("A2ABASE_API_KEY")
            .map_err(|_| Error::config("A2ABASE_API_KEY is not set"))?;
        let mut config = Self::new(&key)?;

        if let Ok(url) = std::env::var("A2ABASE_API_URL") {
            config = config.with_base_url(&url)?;
        }
        if let Some(secs) = env_u64("A2ABASE_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("A2ABASE_STREAM_IDLE_SECS")? {
            config.stream_idle_timeout = Duration::from_secs(secs);
        }
        if let Some(max) = env_u64("A2ABASE_MAX_STREAMS")? {
            config.max_concurrent_streams = Some(max as usize);
        }

        debug!(
            "Loaded configuration from environment (base_url={}, key={})",
            config.base_url,
            config.api_key.public_id()
        );
        Ok(config)
    }

    pub fn with_base_url(mut self, url: &str) -> Result<Self> {
        self.base_url = parse_base_url(url)?;
        Ok(self)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_stream_idle_timeout(mut self, timeout: Duration) -> Self {
        self.stream_idle_timeout = timeout;
        self
    }

    pub fn with_stream_total_timeout(mut self, timeout: Duration) -> Self {
        self.stream_total_timeout = Some(timeout);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_concurrent_streams(mut self, max: usize) -> Self {
        self.max_concurrent_streams = Some(max);
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Resolve an API path against the base URL, keeping the base path prefix.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| Error::config(format!("Invalid base URL {:?}: {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(Error::config(format!(
                "Base URL must be http or https, got {}",
                other
            )))
        }
    }
    if url.host_str().is_none() {
        return Err(Error::config(format!("Base URL {:?} has no host", raw)));
    }
    Ok(url)
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| Error::config(format!("{} must be a whole number, got {:?}", name, raw))),
        Err(_) => Ok(None),
    }
}
