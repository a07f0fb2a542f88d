//! XRPC transport abstraction
//!
//! An [`XrpcHandler`] turns an [`XrpcRequest`] into an [`XrpcResponse`].
//! The handler owns the service URL and any authentication; the lexicon-level
//! client on top of it only deals with method ids, parameters and bodies.

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// HTTP method of an XRPC call (queries are GET, procedures are POST)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrpcMethod {
    Get,
    Post,
}

impl XrpcMethod {
    /// The HTTP method name
    pub fn as_str(&self) -> &'static str {
        match self {
            XrpcMethod::Get => "GET",
            XrpcMethod::Post => "POST",
        }
    }
}

/// A single XRPC call
#[derive(Debug, Clone)]
pub struct XrpcRequest {
    pub method: XrpcMethod,
    /// Lexicon method id, e.g. `com.atproto.repo.listRecords`
    pub nsid: String,
    /// Query string parameters
    pub params: Vec<(String, String)>,
    /// JSON body (procedures only)
    pub body: Option<serde_json::Value>,
}

impl XrpcRequest {
    /// Create a query (GET) request
    pub fn query(nsid: impl Into<String>) -> Self {
        Self {
            method: XrpcMethod::Get,
            nsid: nsid.into(),
            params: Vec::new(),
            body: None,
        }
    }

    /// Create a procedure (POST) request with a JSON body
    pub fn procedure(nsid: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: XrpcMethod::Post,
            nsid: nsid.into(),
            params: Vec::new(),
            body: Some(body),
        }
    }

    /// Add a query parameter
    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    /// Add a query parameter if the value is present
    pub fn param_opt(self, key: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.param(key, value),
            None => self,
        }
    }

    /// Build the full request URL against a service base URL
    pub fn url(&self, service: &Url) -> anyhow::Result<Url> {
        let mut url = service.join(&format!("/xrpc/{}", self.nsid))?;
        if !self.params.is_empty() {
            url.query_pairs_mut().extend_pairs(self.params.iter());
        }
        Ok(url)
    }
}

/// Raw response of an XRPC call
#[derive(Debug, Clone)]
pub struct XrpcResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl XrpcResponse {
    /// Whether the status code is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Error returned by an XRPC service
///
/// Services answer failed calls with `{"error": "...", "message": "..."}`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("XRPC error {status}: {error}{}", message_suffix(.message))]
pub struct XrpcError {
    pub status: u16,
    pub error: String,
    pub message: Option<String>,
}

fn message_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(" ({})", m))
        .unwrap_or_default()
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

impl XrpcError {
    /// Build an error from a non-success response
    pub fn from_response(response: &XrpcResponse) -> Self {
        let parsed: Option<ErrorBody> = serde_json::from_slice(&response.body).ok();
        let (error, message) = match parsed {
            Some(body) => (body.error, body.message),
            None => (None, None),
        };

        Self {
            status: response.status,
            error: error.unwrap_or_else(|| "Unknown".to_string()),
            message,
        }
    }
}

/// Transport for XRPC calls
///
/// Implementations must be `Send + Sync` so a single session can be shared
/// between async tasks.
#[async_trait]
pub trait XrpcHandler: Send + Sync {
    /// Send a request and return the raw response
    ///
    /// Non-2xx responses are returned as `Ok`; only transport failures are
    /// errors at this level.
    async fn send(&self, request: XrpcRequest) -> anyhow::Result<XrpcResponse>;
}

/// Unauthenticated handler for public XRPC endpoints
#[derive(Debug, Clone)]
pub struct PublicHandler {
    http: reqwest::Client,
    service: Url,
}

impl PublicHandler {
    /// Create a handler for the given service
    pub fn new(service: Url) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("repo-kit/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, service })
    }

    /// Create a handler sharing an existing HTTP client
    pub fn with_client(http: reqwest::Client, service: Url) -> Self {
        Self { http, service }
    }
}

#[async_trait]
impl XrpcHandler for PublicHandler {
    async fn send(&self, request: XrpcRequest) -> anyhow::Result<XrpcResponse> {
        let url = request.url(&self.service)?;
        debug!("XRPC {} {}", request.method.as_str(), url);

        let builder = match request.method {
            XrpcMethod::Get => self.http.get(url),
            XrpcMethod::Post => self.http.post(url),
        };
        let builder = match &request.body {
            Some(body) => builder.json(body),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        Ok(XrpcResponse { status, body })
    }
}
