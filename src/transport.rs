//! HTTP transport seam.
//!
//! The dispatcher builds an [`HttpRequest`] and hands it to a [`Transport`]
//! (blocking) or an [`AsyncTransport`]. The reqwest-backed implementations
//! are the defaults; tests and embedders can supply their own.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;

use crate::error::TransportError;
use crate::spec::HttpMethod;

/// Idle timeout used when the configuration does not name one.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// A fully built request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

/// A received response, whatever its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Whether the status is in the 2xx class.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Default reason phrase for the status ("Not Found").
    pub fn status_message(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("Unknown Status")
    }

    /// Whether the content type is `application/json` or a `+json` type.
    pub fn is_json(&self) -> bool {
        self.content_type.as_deref().is_some_and(|ct| {
            let mime = ct.split(';').next().unwrap_or("").trim();
            mime.eq_ignore_ascii_case("application/json") || mime.ends_with("+json")
        })
    }

    /// Body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Blocking request execution.
pub trait Transport: Send + Sync {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Non-blocking request execution, driven by the caller's async runtime.
#[async_trait]
pub trait AsyncTransport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// [`Transport`] over `reqwest::blocking`.
#[derive(Debug, Clone)]
pub struct BlockingTransport {
    client: reqwest::blocking::Client,
}

impl BlockingTransport {
    /// Build a client whose idle pooled connections close after `idle_timeout`.
    pub fn new(idle_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .pool_idle_timeout(idle_timeout)
            .build()
            .map_err(TransportError::ClientBuild)?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

impl Transport for BlockingTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut req = self
            .client
            .request(request.method.to_reqwest(), &request.url);
        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            req = req.body(body);
        }

        let resp = req.send().map_err(TransportError::RequestFailed)?;
        let status = resp.status();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = resp.bytes().map_err(TransportError::ResponseRead)?.to_vec();

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

/// [`AsyncTransport`] over the async `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct AsyncHttpTransport {
    client: reqwest::Client,
}

impl AsyncHttpTransport {
    /// Build a client whose idle pooled connections close after `idle_timeout`.
    pub fn new(idle_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(idle_timeout)
            .build()
            .map_err(TransportError::ClientBuild)?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AsyncTransport for AsyncHttpTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut req = self
            .client
            .request(request.method.to_reqwest(), &request.url);
        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            req = req.body(body);
        }

        let resp = req.send().await.map_err(TransportError::RequestFailed)?;
        let status = resp.status();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = resp
            .bytes()
            .await
            .map_err(TransportError::ResponseRead)?
            .to_vec();

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}
