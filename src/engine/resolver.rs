use std::time::Duration;

use hyper::StatusCode;
use serde::de::IgnoredAny;
use tokio::sync::Mutex;

use super::endpoint::{Endpoint, prioritize};
use super::models::Version;
use super::transport::{
    DEFAULT_PROBE_TIMEOUT, EngineRequest, RequestOptions, Transport, TransportError,
};
use super::{Error, Result};

pub(crate) const VERSION_PATH: &str = "/version";
pub(crate) const LIST_CONTAINERS_PATH: &str = "/containers/json?all=1";

/// Tunables for endpoint discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Consecutive failed discovery rounds after which [`Resolver::resolve`] gives up.
    pub max_retries: u32,
    /// Pause between two discovery rounds.
    pub retry_delay: Duration,
    /// Timeout of each individual probe request.
    pub probe_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

/// Point-in-time view of the resolver, as reported to operators.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ConnectivityStatus {
    pub active: Option<Endpoint>,
    pub engine_version: Option<String>,
    pub candidates: Vec<Endpoint>,
    pub consecutive_failures: u32,
    pub max_retries: u32,
    pub last_error: Option<String>,
}

#[derive(Debug)]
struct ResolverState {
    endpoints: Vec<Endpoint>,
    active: Option<Endpoint>,
    engine_version: Option<String>,
    failures: u32,
    last_error: Option<String>,
    // Bumped by `set_endpoints`; a discovery round over an older list is discarded.
    generation: u64,
}

#[derive(Debug, thiserror::Error)]
enum ProbeError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("`{path}` answered with {status}")]
    Status { path: &'static str, status: StatusCode },
    #[error("`{path}` returned an unexpected body: {source}")]
    Decode {
        path: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Finds and caches the endpoint the engine is currently reachable on.
///
/// Discovery is single-flight: callers queue on a separate discovery gate and
/// reuse the endpoint found by the caller ahead of them. The state lock is only
/// held for short reads and commits, never across a probe or retry delay, so
/// [`Resolver::status`] and [`Resolver::set_endpoints`] answer while a
/// discovery is running.
#[derive(Debug)]
pub struct Resolver {
    config: ResolverConfig,
    state: Mutex<ResolverState>,
    discovery: Mutex<()>,
}

impl Resolver {
    /// Creates a resolver over `endpoints`, ordered with [`prioritize`].
    pub fn new(endpoints: Vec<Endpoint>, config: ResolverConfig) -> Self {
        Self {
            config,
            state: Mutex::new(ResolverState {
                endpoints: prioritize(endpoints),
                active: None,
                engine_version: None,
                failures: 0,
                last_error: None,
                generation: 0,
            }),
            discovery: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Returns the active endpoint, running discovery first if none is set.
    pub async fn current<T: Transport>(&self, transport: &T) -> Result<Endpoint> {
        if let Some(active) = self.active().await {
            return Ok(active);
        }
        let _discovery = self.discovery.lock().await;
        if let Some(active) = self.active().await {
            return Ok(active);
        }
        self.discover(transport).await
    }

    /// Runs discovery regardless of any cached endpoint.
    ///
    /// Once the retry budget is used up this performs a single round per call
    /// until a round succeeds or [`Resolver::retry`] resets the budget.
    pub async fn resolve<T: Transport>(&self, transport: &T) -> Result<Endpoint> {
        let _discovery = self.discovery.lock().await;
        {
            let mut state = self.state.lock().await;
            state.active = None;
            state.engine_version = None;
        }
        self.discover(transport).await
    }

    /// Resets the retry budget and runs a full discovery. Backs the manual retry action.
    pub async fn retry<T: Transport>(&self, transport: &T) -> Result<Endpoint> {
        let _discovery = self.discovery.lock().await;
        {
            let mut state = self.state.lock().await;
            state.active = None;
            state.engine_version = None;
            state.failures = 0;
        }
        self.discover(transport).await
    }

    /// Clears the active endpoint if it is still `failed`.
    ///
    /// A different active endpoint means another caller already re-resolved.
    pub async fn invalidate(&self, failed: &Endpoint) {
        let mut state = self.state.lock().await;
        if state.active.as_ref() == Some(failed) {
            log::info!("invalidating active engine endpoint {failed}");
            state.active = None;
            state.engine_version = None;
        }
    }

    /// Replaces the candidate list, dropping the cached endpoint and retry count.
    ///
    /// A discovery already running restarts over the new list.
    pub async fn set_endpoints(&self, endpoints: Vec<Endpoint>) {
        let mut state = self.state.lock().await;
        state.endpoints = prioritize(endpoints);
        state.active = None;
        state.engine_version = None;
        state.failures = 0;
        state.last_error = None;
        state.generation = state.generation.wrapping_add(1);
    }

    pub async fn status(&self) -> ConnectivityStatus {
        let state = self.state.lock().await;
        ConnectivityStatus {
            active: state.active.clone(),
            engine_version: state.engine_version.clone(),
            candidates: state.endpoints.clone(),
            consecutive_failures: state.failures,
            max_retries: self.config.max_retries,
            last_error: state.last_error.clone(),
        }
    }

    async fn active(&self) -> Option<Endpoint> {
        self.state.lock().await.active.clone()
    }

    /// Runs discovery rounds until one succeeds or the retry budget is used up.
    ///
    /// Callers must hold the discovery gate.
    async fn discover<T: Transport>(&self, transport: &T) -> Result<Endpoint> {
        loop {
            let (endpoints, generation) = {
                let state = self.state.lock().await;
                (state.endpoints.clone(), state.generation)
            };
            let found = self.probe_round(transport, &endpoints, generation).await;

            let mut state = self.state.lock().await;
            if state.generation != generation {
                log::info!("engine endpoints replaced during discovery, starting over");
                continue;
            }

            if let Some((endpoint, version)) = found {
                log::info!(
                    "using engine endpoint {endpoint} (engine {}, api {})",
                    version.version,
                    version.api_version
                );
                state.active = Some(endpoint.clone());
                state.engine_version = Some(version.version);
                state.failures = 0;
                state.last_error = None;
                return Ok(endpoint);
            }

            state.failures = state
                .failures
                .saturating_add(1)
                .min(self.config.max_retries);
            if state.failures >= self.config.max_retries {
                log::error!(
                    "no engine endpoint reachable after {} discovery attempts",
                    state.failures
                );
                return Err(Error::NoEndpoint {
                    attempts: state.failures,
                });
            }

            log::warn!(
                "no engine endpoint reachable (attempt {}/{}), retrying in {:?}",
                state.failures,
                self.config.max_retries,
                self.config.retry_delay
            );
            drop(state);
            tokio::time::sleep(self.config.retry_delay).await;
        }
    }

    /// Probes `endpoints` in order and returns the first accepted one.
    ///
    /// Stops early once the candidate list has been replaced.
    async fn probe_round<T: Transport>(
        &self,
        transport: &T,
        endpoints: &[Endpoint],
        generation: u64,
    ) -> Option<(Endpoint, Version)> {
        for endpoint in endpoints {
            match self.probe(transport, endpoint).await {
                Ok(version) => return Some((endpoint.clone(), version)),
                Err(err) => {
                    log::debug!("engine endpoint {endpoint} rejected: {err}");
                    let mut state = self.state.lock().await;
                    if state.generation != generation {
                        return None;
                    }
                    state.last_error = Some(format!("{endpoint}: {err}"));
                }
            }
        }
        None
    }

    /// Accepts an endpoint only if it both reports a version and can list containers.
    async fn probe<T: Transport>(
        &self,
        transport: &T,
        endpoint: &Endpoint,
    ) -> std::result::Result<Version, ProbeError> {
        let options = RequestOptions::get().with_timeout(self.config.probe_timeout);

        let response = transport
            .send(endpoint, EngineRequest::new(VERSION_PATH, options.clone()))
            .await?;
        if !response.status.is_success() {
            return Err(ProbeError::Status {
                path: VERSION_PATH,
                status: response.status,
            });
        }
        let version: Version =
            serde_json::from_slice(&response.body).map_err(|source| ProbeError::Decode {
                path: VERSION_PATH,
                source,
            })?;

        let response = transport
            .send(endpoint, EngineRequest::new(LIST_CONTAINERS_PATH, options))
            .await?;
        if !response.status.is_success() {
            return Err(ProbeError::Status {
                path: LIST_CONTAINERS_PATH,
                status: response.status,
            });
        }
        serde_json::from_slice::<Vec<IgnoredAny>>(&response.body).map_err(|source| {
            ProbeError::Decode {
                path: LIST_CONTAINERS_PATH,
                source,
            }
        })?;

        Ok(version)
    }
}
