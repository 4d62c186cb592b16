use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Used when neither the caller nor the interface definition names a timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Upper bound on any resolved timeout, one hour.
pub const MAX_TIMEOUT_SECS: u64 = 3600;

/// Extra time granted on top of the resolved timeout before the call is torn down.
const IO_MARGIN: Duration = Duration::from_secs(2);

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ReqParam {
    pub key: String,
    pub value: String,
}

impl ReqParam {
    pub fn new(key: String, value: String) -> Self {
        ReqParam { key, value }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
    HEAD,
    OPTIONS,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::OPTIONS => "OPTIONS",
        }
    }

    /// Only these methods carry a request body; body parameters are dropped for the rest.
    pub fn is_body_bearing(&self) -> bool {
        matches!(self, HttpMethod::POST | HttpMethod::PUT | HttpMethod::PATCH)
    }

    fn to_reqwest(self) -> Method {
        match self {
            HttpMethod::GET => Method::GET,
            HttpMethod::POST => Method::POST,
            HttpMethod::PUT => Method::PUT,
            HttpMethod::DELETE => Method::DELETE,
            HttpMethod::PATCH => Method::PATCH,
            HttpMethod::HEAD => Method::HEAD,
            HttpMethod::OPTIONS => Method::OPTIONS,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully formed outbound request. Nothing in here has touched the network yet.
#[derive(Clone, Debug, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<ReqParam>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|header| header.key.eq_ignore_ascii_case(name))
            .map(|header| header.value.as_str())
    }

    pub fn headers_map(&self) -> BTreeMap<String, String> {
        self.headers
            .iter()
            .map(|header| (header.key.clone(), header.value.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HttpError {
    #[error("request timed out after {0} ms")]
    Timeout(u64),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("failed to read response body: {0}")]
    Body(String),
    #[error("request failed: {0}")]
    Request(String),
}

/// Whatever was observed of one exchange. A non-2xx status is still a completed exchange;
/// only `error` marks the call as failed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HttpExchange {
    pub status: Option<u16>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub elapsed_ms: u64,
    pub error: Option<HttpError>,
}

impl HttpExchange {
    pub fn failed(error: HttpError, elapsed_ms: u64) -> Self {
        HttpExchange {
            elapsed_ms,
            error: Some(error),
            ..HttpExchange::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-call override, then the definition's default, then the system fallback.
/// A zero value counts as unset, and anything above [`MAX_TIMEOUT_SECS`] is capped.
pub fn resolve_timeout(requested: Option<u64>, configured: Option<u64>, fallback: u64) -> Duration {
    let seconds = requested
        .filter(|secs| *secs > 0)
        .or(configured.filter(|secs| *secs > 0))
        .unwrap_or(fallback);
    Duration::from_secs(seconds.min(MAX_TIMEOUT_SECS))
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Runs the exchange on its own task. The caller is released after `timeout` plus a small
    /// I/O margin at the latest; the task is aborted at that point, which drops the connection.
    pub async fn execute(&self, request: HttpRequest, timeout: Duration) -> HttpExchange {
        info!("will execute http request: {} {}", request.method, request.url);
        let started_at = Instant::now();
        let client = self.client.clone();
        let mut handle = tokio::spawn(exchange(client, request, timeout));
        let exchange = match tokio::time::timeout(timeout.saturating_add(IO_MARGIN), &mut handle).await {
            Ok(Ok(exchange)) => exchange,
            Ok(Err(join_error)) => HttpExchange::failed(
                HttpError::Request(join_error.to_string()),
                elapsed_millis(started_at),
            ),
            Err(_) => {
                handle.abort();
                HttpExchange::failed(
                    HttpError::Timeout(timeout.as_millis() as u64),
                    elapsed_millis(started_at),
                )
            }
        };
        match &exchange.error {
            None => info!(
                "http request executed, status_code: {:?}, elapsed: {} ms",
                exchange.status, exchange.elapsed_ms
            ),
            Some(err) => warn!("http request failed: {}", err),
        }
        exchange
    }
}

async fn exchange(client: Client, request: HttpRequest, timeout: Duration) -> HttpExchange {
    let headers = match build_header_map(&request.headers) {
        Ok(headers) => headers,
        Err(err) => return HttpExchange::failed(err, 0),
    };
    let mut req = client
        .request(request.method.to_reqwest(), request.url.as_str())
        .headers(headers)
        .timeout(timeout);
    if let Some(body) = request.body {
        req = req.body(body);
    }

    let started_at = Instant::now();
    let response = match req.send().await {
        Ok(response) => response,
        Err(err) => return HttpExchange::failed(classify(&err, timeout), elapsed_millis(started_at)),
    };
    let status = response.status().as_u16();
    let response_headers = collect_headers(response.headers());
    match response.text().await {
        Ok(body) => HttpExchange {
            status: Some(status),
            headers: response_headers,
            body: Some(body),
            elapsed_ms: elapsed_millis(started_at),
            error: None,
        },
        Err(err) => HttpExchange {
            status: Some(status),
            headers: response_headers,
            body: None,
            elapsed_ms: elapsed_millis(started_at),
            error: Some(classify(&err, timeout)),
        },
    }
}

fn build_header_map(headers: &[ReqParam]) -> Result<HeaderMap, HttpError> {
    let mut header_map = HeaderMap::new();
    for header in headers {
        let name = HeaderName::from_bytes(header.key.as_bytes())
            .map_err(|err| HttpError::Request(format!("invalid header name {}: {}", header.key, err)))?;
        let value = HeaderValue::from_str(&header.value)
            .map_err(|err| HttpError::Request(format!("invalid value for header {}: {}", header.key, err)))?;
        header_map.append(name, value);
    }
    Ok(header_map)
}

fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut collected: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).to_string();
        collected
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    collected
}

fn classify(error: &reqwest::Error, timeout: Duration) -> HttpError {
    if error.is_timeout() {
        HttpError::Timeout(timeout.as_millis() as u64)
    } else if error.is_connect() {
        HttpError::Connect(describe(error))
    } else if error.is_body() || error.is_decode() {
        HttpError::Body(describe(error))
    } else {
        HttpError::Request(describe(error))
    }
}

/// reqwest keeps the useful part (DNS failure, refused connection) in the source chain.
fn describe(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn elapsed_millis(started_at: Instant) -> u64 {
    started_at.elapsed().as_millis() as u64
}
