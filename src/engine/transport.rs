use std::time::Duration;

use axum::body::{Body, Bytes};
use hyper::header::{ACCEPT, HOST};
use hyper::{Method, StatusCode};
use tower::ServiceExt;

use super::connector::EndpointConnector;
use super::endpoint::Endpoint;

/// Upper bound for a buffered response body.
const MAX_BODY_LEN: usize = 64 * 1024 * 1024;

/// Timeout applied to data requests unless a caller overrides it.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout applied to discovery probes.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Per-request options. Every request carries a timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    pub method: Method,
    pub timeout: Duration,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post() -> Self {
        Self {
            method: Method::POST,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A request to the engine API, relative to whichever endpoint serves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRequest {
    pub path: String,
    pub options: RequestOptions,
}

impl EngineRequest {
    pub fn new(path: impl Into<String>, options: RequestOptions) -> Self {
        Self {
            path: path.into(),
            options,
        }
    }
}

/// A fully read response. Non-2xx statuses are still responses at this layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl EngineResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Failures below the HTTP status level.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: Endpoint,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP exchange with {endpoint} failed: {source}")]
    Http {
        endpoint: Endpoint,
        #[source]
        source: hyper::Error,
    },
    #[error("failed to read response body from {endpoint}: {source}")]
    Body {
        endpoint: Endpoint,
        #[source]
        source: axum::Error,
    },
    #[error("request to {endpoint} timed out after {timeout:?}")]
    Timeout { endpoint: Endpoint, timeout: Duration },
    #[error("invalid request `{path}`: {source}")]
    InvalidRequest {
        path: String,
        #[source]
        source: hyper::http::Error,
    },
}

impl TransportError {
    /// Returns `true` if the failure says the endpoint itself is unusable,
    /// rather than the request being malformed.
    pub fn is_connection_level(&self) -> bool {
        match self {
            TransportError::Connect { .. }
            | TransportError::Http { .. }
            | TransportError::Body { .. }
            | TransportError::Timeout { .. } => true,
            TransportError::InvalidRequest { .. } => false,
        }
    }
}

/// Sends one request to one endpoint.
///
/// Implementations must honour [`RequestOptions::timeout`].
pub trait Transport: Send + Sync {
    fn send(
        &self,
        endpoint: &Endpoint,
        request: EngineRequest,
    ) -> impl Future<Output = Result<EngineResponse, TransportError>> + Send;
}

/// [`Transport`] speaking HTTP/1.1 over a fresh connection per request.
#[derive(Debug, Clone, Default)]
pub struct HyperTransport {
    connector: EndpointConnector,
}

impl HyperTransport {
    pub fn new() -> Self {
        Self::default()
    }

    async fn exchange(
        &self,
        endpoint: &Endpoint,
        request: &EngineRequest,
    ) -> Result<EngineResponse, TransportError> {
        let io = self
            .connector
            .clone()
            .oneshot(endpoint.clone())
            .await
            .map_err(|source| TransportError::Connect {
                endpoint: endpoint.clone(),
                source,
            })?;
        let http_err = |source| TransportError::Http {
            endpoint: endpoint.clone(),
            source,
        };

        let (mut sender, connection) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(http_err)?;
        let target = endpoint.to_string();
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                log::debug!("connection to {target} closed with error: {err}");
            }
        });

        let req = hyper::Request::builder()
            .method(request.options.method.clone())
            .uri(request.path.as_str())
            .header(HOST, endpoint.authority())
            .header(ACCEPT, "application/json")
            .body(Body::empty())
            .map_err(|source| TransportError::InvalidRequest {
                path: request.path.clone(),
                source,
            })?;

        let response = sender.send_request(req).await.map_err(http_err)?;
        let status = response.status();
        let body = axum::body::to_bytes(Body::new(response.into_body()), MAX_BODY_LEN)
            .await
            .map_err(|source| TransportError::Body {
                endpoint: endpoint.clone(),
                source,
            })?;

        Ok(EngineResponse { status, body })
    }
}

impl Transport for HyperTransport {
    async fn send(
        &self,
        endpoint: &Endpoint,
        request: EngineRequest,
    ) -> Result<EngineResponse, TransportError> {
        let timeout = request.options.timeout;
        log::trace!("{} {} via {endpoint}", request.options.method, request.path);
        match tokio::time::timeout(timeout, self.exchange(endpoint, &request)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout {
                endpoint: endpoint.clone(),
                timeout,
            }),
        }
    }
}
