//! reqwest-backed transport

use std::future::Future;

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response};
use tracing::{debug, info, warn};

use a2abase_core::{ApiKey, ClientConfig, Error, Result, TimeoutKind};

use super::retry::{is_retryable_status, RetryState};
use super::{ApiBody, ApiRequest, ApiResponse, ByteStream, Transport};

const MAX_ERROR_BODY_CHARS: usize = 512;

/// HTTP transport for the hosted platform
pub struct HttpTransport {
    client: Client,
    config: ClientConfig,
    headers: HeaderMap,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let headers = auth_headers(&config.api_key)?;

        let mut builder = Client::builder().connect_timeout(config.request_timeout);
        if let Some(max) = config.max_concurrent_streams {
            builder = builder.pool_max_idle_per_host(max);
        }
        let client = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: config.clone(),
            headers,
        })
    }

    fn build(&self, request: &ApiRequest) -> RequestBuilder {
        let url = self.config.endpoint(&request.path);
        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .headers(self.headers.clone());

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        match &request.body {
            Some(ApiBody::Json(value)) => builder.json(value),
            Some(ApiBody::Form(pairs)) => builder.form(pairs),
            None => builder,
        }
    }

    fn classify(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::timeout(TimeoutKind::Request, self.config.request_timeout)
        } else if err.is_builder() {
            Error::config(format!("Invalid request: {}", err))
        } else {
            Error::TransientNetwork(err.to_string())
        }
    }

    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::remote(status.as_u16(), error_detail(&body)))
    }

    async fn request_once(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let response = self
            .build(request)
            .header(ACCEPT, "application/json")
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        let response = Self::check_status(response).await?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        Ok(ApiResponse::new(status, body))
    }

    async fn open_once(&self, request: &ApiRequest) -> Result<ByteStream> {
        // Only the wait for headers is bounded; the body may stream for a long time.
        let send = self
            .build(request)
            .header(ACCEPT, "text/event-stream")
            .send();
        let response = tokio::time::timeout(self.config.request_timeout, send)
            .await
            .map_err(|_| Error::timeout(TimeoutKind::Request, self.config.request_timeout))?
            .map_err(|e| self.classify(e))?;
        let response = Self::check_status(response).await?;

        let chunks = response
            .bytes_stream()
            .map_err(|e| Error::TransientNetwork(format!("Stream interrupted: {}", e)));
        Ok(ByteStream::new(chunks))
    }

    async fn with_retry<T, F, Fut>(&self, request: &ApiRequest, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retry = RetryState::new(&self.config.retry);
        loop {
            let attempt = retry.begin_attempt();
            debug!("{} (attempt {})", request, attempt);

            let err = match call().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if !is_retryable(&err, request.retry_on_status) {
                return Err(err);
            }
            match retry.next_delay() {
                Some(delay) => {
                    warn!(
                        "{} failed on attempt {}: {}; retrying in {}ms",
                        request,
                        attempt,
                        err,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    warn!("{} failed after {} attempts: {}", request, attempt, err);
                    return Err(exhausted(err));
                }
            }
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.with_retry(&request, || self.request_once(&request)).await
    }

    async fn open_stream(&self, request: ApiRequest) -> Result<ByteStream> {
        let stream = self
            .with_retry(&request, || self.open_once(&request))
            .await?;
        info!("Opened stream {}", request);
        Ok(stream)
    }
}

fn auth_headers(key: &ApiKey) -> Result<HeaderMap> {
    let raw = key.expose();
    let mut api_key = HeaderValue::from_str(&raw)
        .map_err(|_| Error::config("API key is not a valid header value"))?;
    api_key.set_sensitive(true);
    let mut bearer = HeaderValue::from_str(&format!("Bearer {}", raw))
        .map_err(|_| Error::config("API key is not a valid header value"))?;
    bearer.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert("X-API-Key", api_key);
    headers.insert(AUTHORIZATION, bearer);
    Ok(headers)
}

/// Network failures are always retried. Status failures only when the
/// request allows it: a 5xx may arrive after the write was committed.
fn is_retryable(err: &Error, retry_on_status: bool) -> bool {
    match err {
        Error::Remote { status, .. } => retry_on_status && is_retryable_status(*status),
        Error::TransientNetwork(_) | Error::Timeout { .. } => true,
        _ => false,
    }
}

/// Network failures that outlive the retry budget surface as remote errors.
fn exhausted(err: Error) -> Error {
    match err {
        Error::TransientNetwork(message) => Error::remote(0, message),
        other => other,
    }
}

/// Prefer the platform's `detail`/`message` field over the raw body.
fn error_detail(body: &str) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("detail")
                .or_else(|| value.get("message"))
                .and_then(|v| v.as_str())
                .map(ToString::to_string)
        });

    match detail {
        Some(detail) => detail,
        None => body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
    }
}
