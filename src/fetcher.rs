// Normalizing fetcher: one GET against an upstream, parsed into a JSON tree whichever
// format the upstream speaks, cached per (kind, url) for the caller's TTL.

use crate::ttl_cache::TtlCache;
use crate::xml_tree;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub type Document = Arc<Value>;

const SNIPPET_CHARS: usize = 500;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Upstream {status_code} for {url}")]
    UpstreamError { status_code: u16, url: String },

    #[error("Upstream request to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("Network error for {url}: {message}")]
    NetworkError { url: String, message: String },

    #[error("Could not parse payload from {url}: {snippet}")]
    ParseError { url: String, snippet: String },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            FetchError::UpstreamError { url, .. }
            | FetchError::Timeout { url, .. }
            | FetchError::NetworkError { url, .. }
            | FetchError::ParseError { url, .. } => url,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchKind {
    #[default]
    Auto,
    Xml,
    Json,
}

impl fmt::Display for FetchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FetchKind::Auto => "auto",
            FetchKind::Xml => "xml",
            FetchKind::Json => "json",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub ttl: Duration,
    pub headers: Vec<(String, String)>,
    pub kind: FetchKind,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(120),
            headers: Vec::new(),
            kind: FetchKind::Auto,
        }
    }
}

impl FetchOptions {
    pub fn new(kind: FetchKind, ttl: Duration) -> Self {
        Self {
            ttl,
            kind,
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// Raw transport; status handling and parsing stay in the fetcher
#[async_trait]
pub trait Upstream: Send + Sync + 'static {
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<UpstreamResponse, FetchError>;
}

pub struct ReqwestUpstream {
    client: reqwest::Client,
}

impl ReqwestUpstream {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Upstream for ReqwestUpstream {
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<UpstreamResponse, FetchError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| map_reqwest_error(url, e))?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(|e| map_reqwest_error(url, e))?;

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }
}

fn map_reqwest_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
            timeout_ms: 0,
        }
    } else {
        FetchError::NetworkError {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

pub fn cache_key(kind: FetchKind, url: &str) -> String {
    format!("{}:{}", kind, url)
}

fn snippet(body: &[u8]) -> String {
    String::from_utf8_lossy(body)
        .chars()
        .take(SNIPPET_CHARS)
        .collect()
}

fn wants_xml(kind: FetchKind, content_type: Option<&str>) -> bool {
    match kind {
        FetchKind::Xml => true,
        FetchKind::Json => false,
        FetchKind::Auto => content_type
            .map(|ct| ct.to_ascii_lowercase().contains("xml"))
            .unwrap_or(false),
    }
}

/// Parses an upstream body according to the requested kind and its declared
/// content type.
pub fn normalize_body(
    url: &str,
    kind: FetchKind,
    content_type: Option<&str>,
    body: &[u8],
) -> Result<Value, FetchError> {
    let parse_error = || FetchError::ParseError {
        url: url.to_string(),
        snippet: snippet(body),
    };

    if wants_xml(kind, content_type) {
        let text = String::from_utf8_lossy(body);
        xml_tree::parse_lenient(&text).map_err(|e| {
            warn!(%url, error = %e, "failed to parse XML payload");
            parse_error()
        })
    } else {
        serde_json::from_slice(body).map_err(|e| {
            warn!(%url, error = %e, "failed to parse JSON payload");
            parse_error()
        })
    }
}

type InFlight = Shared<BoxFuture<'static, Result<Document, FetchError>>>;

pub struct NormalizingFetcher {
    upstream: Arc<dyn Upstream>,
    cache: Arc<dyn TtlCache<Document>>,
    timeout: Duration,
    in_flight: Arc<DashMap<String, InFlight>>,
}

impl NormalizingFetcher {
    pub fn new(
        upstream: Arc<dyn Upstream>,
        cache: Arc<dyn TtlCache<Document>>,
        timeout: Duration,
    ) -> Self {
        Self {
            upstream,
            cache,
            timeout,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    pub fn cache(&self) -> &Arc<dyn TtlCache<Document>> {
        &self.cache
    }

    /// Returns the cached document for `(kind, url)` or fetches it.
    ///
    /// Concurrent misses on the same key share a single upstream request and
    /// all observe its result. The request runs as its own task, so it
    /// completes (and fills the cache) even if every caller goes away.
    /// Failures are not cached.
    pub async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<Document, FetchError> {
        let key = cache_key(options.kind, url);
        if let Some(document) = self.cache.get(&key) {
            debug!(%key, "cache hit");
            return Ok(document);
        }

        let pending = self
            .in_flight
            .entry(key.clone())
            .or_insert_with(|| {
                debug!(%key, "cache miss, fetching upstream");
                let task = tokio::spawn(self.load(key.clone(), url.to_string(), options.clone()));
                let url = url.to_string();
                async move {
                    task.await.unwrap_or_else(|e| {
                        Err(FetchError::NetworkError {
                            url,
                            message: format!("fetch task failed: {}", e),
                        })
                    })
                }
                .boxed()
                .shared()
            })
            .clone();

        pending.await
    }

    fn load(
        &self,
        key: String,
        url: String,
        options: FetchOptions,
    ) -> impl std::future::Future<Output = Result<Document, FetchError>> + Send + 'static {
        let upstream = Arc::clone(&self.upstream);
        let cache = Arc::clone(&self.cache);
        let in_flight = Arc::clone(&self.in_flight);
        let timeout = self.timeout;

        async move {
            let result = request(upstream.as_ref(), timeout, &url, &options).await;
            if let Ok(document) = &result {
                cache.put(&key, Arc::clone(document), options.ttl);
            }
            // The cache is filled before the entry goes away
            in_flight.remove(&key);
            result
        }
    }
}

async fn request(
    upstream: &dyn Upstream,
    timeout: Duration,
    url: &str,
    options: &FetchOptions,
) -> Result<Document, FetchError> {
    let timeout_ms = timeout.as_millis() as u64;
    let response = tokio::time::timeout(timeout, upstream.get(url, &options.headers))
        .await
        .map_err(|_| FetchError::Timeout {
            url: url.to_string(),
            timeout_ms,
        })?
        .map_err(|e| match e {
            FetchError::Timeout { url, .. } => FetchError::Timeout { url, timeout_ms },
            other => other,
        })?;

    if !response.is_success() {
        return Err(FetchError::UpstreamError {
            status_code: response.status,
            url: url.to_string(),
        });
    }

    let value = normalize_body(
        url,
        options.kind,
        response.content_type.as_deref(),
        &response.body,
    )?;
    Ok(Arc::new(value))
}
