//! In-memory transports for unit tests.
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use hyper::StatusCode;

use super::Endpoint;
use super::resolver::{LIST_CONTAINERS_PATH, ResolverConfig, VERSION_PATH};
use super::transport::{
    DEFAULT_PROBE_TIMEOUT, EngineRequest, EngineResponse, Transport, TransportError,
};

/// How a fake endpoint answers one path.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Ok(&'static str),
    Status(StatusCode),
    Refused,
}

/// In-memory transport scripted per `(endpoint, path)`.
///
/// Scripts are consumed front to back; the last reply repeats.
#[derive(Debug, Default)]
pub(crate) struct FakeTransport {
    scripts: Mutex<HashMap<(String, String), Vec<Reply>>>,
    pub(crate) log: Mutex<Vec<(String, String)>>,
}

impl FakeTransport {
    pub(crate) fn script(&self, endpoint: &Endpoint, path: &str, replies: Vec<Reply>) {
        self.scripts
            .lock()
            .unwrap()
            .insert((endpoint.to_string(), path.to_owned()), replies);
    }

    pub(crate) fn healthy(&self, endpoint: &Endpoint) {
        self.script(
            endpoint,
            VERSION_PATH,
            vec![Reply::Ok(r#"{"Version":"27.0.1","ApiVersion":"1.46"}"#)],
        );
        self.script(endpoint, LIST_CONTAINERS_PATH, vec![Reply::Ok("[]")]);
    }

    pub(crate) fn calls(&self, path: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, p)| p == path)
            .count()
    }
}

impl Transport for FakeTransport {
    async fn send(
        &self,
        endpoint: &Endpoint,
        request: EngineRequest,
    ) -> Result<EngineResponse, TransportError> {
        let key = (endpoint.to_string(), request.path.clone());
        self.log.lock().unwrap().push(key.clone());
        let reply = {
            let mut scripts = self.scripts.lock().unwrap();
            match scripts.get_mut(&key) {
                Some(replies) if replies.len() > 1 => Some(replies.remove(0)),
                Some(replies) => replies.first().cloned(),
                None => None,
            }
        };
        match reply {
            Some(Reply::Ok(body)) => Ok(EngineResponse::new(StatusCode::OK, body)),
            Some(Reply::Status(status)) => Ok(EngineResponse::new(status, "")),
            Some(Reply::Refused) | None => Err(TransportError::Connect {
                endpoint: endpoint.clone(),
                source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            }),
        }
    }
}

/// Transport whose endpoints never answer: every request waits out its
/// timeout, except on the one endpoint that answers healthily.
#[derive(Debug, Default)]
pub(crate) struct UnresponsiveTransport {
    pub(crate) healthy: Option<Endpoint>,
}

impl Transport for UnresponsiveTransport {
    async fn send(
        &self,
        endpoint: &Endpoint,
        request: EngineRequest,
    ) -> Result<EngineResponse, TransportError> {
        if self.healthy.as_ref() == Some(endpoint) {
            let body = if request.path == VERSION_PATH {
                r#"{"Version":"27.0.1"}"#
            } else {
                "[]"
            };
            return Ok(EngineResponse::new(StatusCode::OK, body));
        }
        tokio::time::sleep(request.options.timeout).await;
        Err(TransportError::Timeout {
            endpoint: endpoint.clone(),
            timeout: request.options.timeout,
        })
    }
}

pub(crate) fn fast_config(max_retries: u32) -> ResolverConfig {
    ResolverConfig {
        max_retries,
        retry_delay: Duration::ZERO,
        probe_timeout: DEFAULT_PROBE_TIMEOUT,
    }
}
