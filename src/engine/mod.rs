//! Connectivity to the container engine API.
//!
//! The engine may be reachable on its local Unix socket or on one of several
//! loopback TCP addresses. [`Resolver`] probes the candidates in priority order
//! and caches the first endpoint that passes both a version probe and a
//! container listing probe. [`Gateway`] sends every API call through that
//! endpoint and re-resolves, within a retry budget, when the connection fails.
//!
//! # Key Components
//!
//! - [`Endpoint`]: a candidate address (socket path or `host:port`) with its probe rank.
//! - [`Transport`]: sends one request to one endpoint; [`HyperTransport`] is the
//!   production implementation.
//! - [`Resolver`]: discovery with a bounded number of retry rounds.
//! - [`Gateway`]: typed engine operations with transparent re-resolution.
//! - [`models`]: response schemas of the consumed endpoints.
mod connector;
mod endpoint;
mod error;
mod gateway;
pub mod models;
mod resolver;
#[cfg(test)]
pub(crate) mod testing;
mod transport;

pub use connector::EndpointConnector;
pub use endpoint::{
    DEFAULT_SOCKET_PATH, DEFAULT_TCP_ADDRESSES, Endpoint, EndpointKind, ParseError,
    default_candidates, prioritize,
};
pub use error::{Error, Result};
pub use gateway::{DEFAULT_LOG_TAIL, DEFAULT_RETRY_BUDGET, Gateway, SEARCH_LOG_TAIL};
pub use resolver::{ConnectivityStatus, Resolver, ResolverConfig};
pub use transport::{
    DEFAULT_PROBE_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, EngineRequest, EngineResponse,
    HyperTransport, RequestOptions, Transport, TransportError,
};
