//! Transport layer
//!
//! Request/response calls and pull-based byte streams against the platform.
//! [`HttpTransport`] is the reqwest implementation; tests plug in their own.

mod http;
mod retry;

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;

use a2abase_core::{Error, Result};

pub use http::HttpTransport;
pub use retry::{is_retryable_status, RetryState};

/// Request body
#[derive(Debug, Clone, PartialEq)]
pub enum ApiBody {
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
}

/// One call against the platform API
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the configured base URL
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<ApiBody>,
    /// Retry on 429/5xx responses; network failures are retried regardless
    pub retry_on_status: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            retry_on_status: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn queries(mut self, pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        self.query.extend(pairs);
        self
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        self.body = Some(ApiBody::Json(serde_json::to_value(body)?));
        Ok(self)
    }

    pub fn form(mut self, pairs: Vec<(String, String)>) -> Self {
        self.body = Some(ApiBody::Form(pairs));
        self
    }

    /// For writes that must not be repeated once the server may have applied them.
    pub fn without_status_retry(mut self) -> Self {
        self.retry_on_status = false;
        self
    }
}

impl fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} /{}", self.method, self.path.trim_start_matches('/'))
    }
}

/// A successful (2xx) response
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

type ChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Pull-based handle on a streaming response body
///
/// Chunks are handed out one at a time as they arrive. Closing (or dropping)
/// the handle drops the underlying response, which releases the connection.
pub struct ByteStream {
    inner: Option<ChunkStream>,
}

impl ByteStream {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes>> + Send + 'static,
    {
        Self {
            inner: Some(stream.boxed()),
        }
    }

    /// Next chunk, `Ok(None)` at end of body, `Err(Cancelled)` once closed.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        match self.inner.as_mut() {
            Some(stream) => stream.next().await.transpose(),
            None => Err(Error::Cancelled),
        }
    }

    pub fn close(&mut self) {
        self.inner = None;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

impl fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteStream")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Authenticated access to the platform
///
/// `request` fails with [`Error::Remote`] on non-2xx responses.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse>;

    async fn open_stream(&self, request: ApiRequest) -> Result<ByteStream>;
}
