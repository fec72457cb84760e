use crate::container::ContainerID;
use crate::logs::{self, LogRecord};

use super::error::error_message;
use super::models::{ContainerInspect, ContainerSummary, StatsResponse, Version};
use super::resolver::{
    ConnectivityStatus, LIST_CONTAINERS_PATH, Resolver, ResolverConfig, VERSION_PATH,
};
use super::transport::{EngineRequest, EngineResponse, RequestOptions, Transport};
use super::{Endpoint, Error, Result};

/// Lines fetched for the regular log view.
pub const DEFAULT_LOG_TAIL: usize = 100;

/// Lines fetched when the operator searches logs.
pub const SEARCH_LOG_TAIL: usize = 1000;

/// Re-resolutions a single call may trigger after connection-level failures.
pub const DEFAULT_RETRY_BUDGET: u32 = 2;

/// Issues engine API calls through the resolved endpoint.
///
/// Owns the connectivity state: the [`Resolver`] with its active endpoint and
/// retry counter. Connection-level failures invalidate the endpoint and the
/// call is retried against a freshly resolved one, at most `retry_budget` times.
#[derive(Debug)]
pub struct Gateway<T> {
    transport: T,
    resolver: Resolver,
    retry_budget: u32,
}

impl<T: Transport> Gateway<T> {
    pub fn new(
        transport: T,
        endpoints: Vec<Endpoint>,
        resolver_config: ResolverConfig,
        retry_budget: u32,
    ) -> Self {
        Self {
            transport,
            resolver: Resolver::new(endpoints, resolver_config),
            retry_budget,
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn status(&self) -> ConnectivityStatus {
        self.resolver.status().await
    }

    /// Manual retry action: resets the discovery budget and resolves again.
    pub async fn reconnect(&self) -> Result<Endpoint> {
        self.resolver.retry(&self.transport).await
    }

    /// Sends `path` to the engine and returns the successful response.
    ///
    /// # Errors
    ///
    /// - [`Error::NoEndpoint`] if discovery fails.
    /// - [`Error::ReresolutionFailed`] if discovery fails after a connection-level
    ///   failure; it carries that failure.
    /// - [`Error::RetriesExhausted`] if connection-level failures outlast the
    ///   retry budget; it carries the first failure.
    /// - [`Error::Status`] for non-2xx responses. The endpoint stays active.
    pub async fn call(&self, path: &str, options: RequestOptions) -> Result<EngineResponse> {
        let mut retries = 0;
        let mut first_failure = None;
        loop {
            let endpoint = match self.resolver.current(&self.transport).await {
                Ok(endpoint) => endpoint,
                Err(Error::NoEndpoint { attempts }) => {
                    return Err(match first_failure.take() {
                        Some(source) => Error::ReresolutionFailed { attempts, source },
                        None => Error::NoEndpoint { attempts },
                    });
                }
                Err(err) => return Err(err),
            };
            let request = EngineRequest::new(path, options.clone());
            match self.transport.send(&endpoint, request).await {
                Ok(response) if response.status.is_success() => return Ok(response),
                Ok(response) => {
                    return Err(Error::Status {
                        path: path.to_owned(),
                        status: response.status,
                        message: error_message(&response.body),
                    });
                }
                Err(err) if err.is_connection_level() => {
                    log::warn!("request `{path}` via {endpoint} failed: {err}");
                    self.resolver.invalidate(&endpoint).await;
                    let first = first_failure.take().unwrap_or(err);
                    if retries >= self.retry_budget {
                        return Err(Error::RetriesExhausted {
                            retries,
                            source: first,
                        });
                    }
                    first_failure = Some(first);
                    retries += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn get_json<R: serde::de::DeserializeOwned>(&self, path: &str) -> Result<R> {
        let response = self.call(path, RequestOptions::get()).await?;
        serde_json::from_slice(&response.body).map_err(|source| Error::Decode {
            path: path.to_owned(),
            source,
        })
    }

    pub async fn version(&self) -> Result<Version> {
        self.get_json(VERSION_PATH).await
    }

    pub async fn list_containers(&self) -> Result<Vec<ContainerSummary>> {
        self.get_json(LIST_CONTAINERS_PATH).await
    }

    pub async fn inspect(&self, id: &ContainerID) -> Result<ContainerInspect> {
        self.get_json(&format!("/containers/{id}/json")).await
    }

    pub async fn stats(&self, id: &ContainerID) -> Result<StatsResponse> {
        self.get_json(&format!("/containers/{id}/stats?stream=false"))
            .await
    }

    /// Fetches the raw (possibly framed) log stream of a container.
    pub async fn logs(&self, id: &ContainerID, tail: usize) -> Result<axum::body::Bytes> {
        let path = format!("/containers/{id}/logs?stdout=1&stderr=1&timestamps=1&tail={tail}");
        let response = self.call(&path, RequestOptions::get()).await?;
        Ok(response.body)
    }

    /// Fetches and decodes the last `tail` log lines of a container.
    pub async fn log_records(&self, id: &ContainerID, tail: usize) -> Result<Vec<LogRecord>> {
        let raw = self.logs(id, tail).await?;
        Ok(logs::decode_stream(&raw))
    }

    /// Searches the last [`SEARCH_LOG_TAIL`] log lines for `term`, case-insensitively.
    pub async fn search_logs(&self, id: &ContainerID, term: &str) -> Result<Vec<LogRecord>> {
        let raw = self.logs(id, SEARCH_LOG_TAIL).await?;
        Ok(logs::search_stream(&raw, term))
    }

    pub async fn restart(&self, id: &ContainerID) -> Result<()> {
        let path = format!("/containers/{id}/restart");
        self.call(&path, RequestOptions::post()).await?;
        log::info!("restarted container {}", id.short());
        Ok(())
    }
}
