use std::fmt;
use std::path::PathBuf;

/// Default location of the engine's local socket.
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/docker.sock";

/// Loopback addresses the engine commonly exposes its unencrypted API on.
pub const DEFAULT_TCP_ADDRESSES: [&str; 2] = ["localhost:2375", "127.0.0.1:2375"];

/// How an [`Endpoint`] is reached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    /// A local Unix domain socket.
    UnixSocket(PathBuf),
    /// A `host:port` pair reached over plain TCP.
    Tcp(String),
}

/// One candidate address for reaching the engine API.
///
/// Lower `rank` values are probed first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    kind: EndpointKind,
    rank: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("unsupported scheme in engine url `{0}`")]
    UnsupportedScheme(String),
    #[error("missing address in engine url `{0}`")]
    MissingAddress(String),
}

impl Endpoint {
    pub fn unix_socket(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: EndpointKind::UnixSocket(path.into()),
            rank: 0,
        }
    }

    pub fn tcp(address: impl Into<String>) -> Self {
        Self {
            kind: EndpointKind::Tcp(address.into()),
            rank: 0,
        }
    }

    /// Parses a user supplied engine url.
    ///
    /// Accepts `http://host:port[/]`, `tcp://host:port` and `unix:///path/to.sock`.
    /// A missing port defaults to `2375`.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] for any other scheme or an empty address.
    ///
    /// # Examples
    ///
    /// ```
    /// # use dockwatch::engine::{Endpoint, EndpointKind};
    /// let endpoint = Endpoint::parse("http://localhost:2375/").unwrap();
    /// assert_eq!(endpoint.kind(), &EndpointKind::Tcp("localhost:2375".to_owned()));
    /// ```
    pub fn parse(url: &str) -> Result<Self, ParseError> {
        let url = url.trim();
        if let Some(path) = url.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(ParseError::MissingAddress(url.to_owned()));
            }
            return Ok(Self::unix_socket(path));
        }

        let rest = url
            .strip_prefix("http://")
            .or_else(|| url.strip_prefix("tcp://"))
            .ok_or_else(|| ParseError::UnsupportedScheme(url.to_owned()))?;
        let address = rest.split('/').next().unwrap_or_default();
        if address.is_empty() {
            return Err(ParseError::MissingAddress(url.to_owned()));
        }
        if address.contains(':') {
            Ok(Self::tcp(address))
        } else {
            Ok(Self::tcp(format!("{address}:2375")))
        }
    }

    pub fn kind(&self) -> &EndpointKind {
        &self.kind
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn is_unix_socket(&self) -> bool {
        matches!(self.kind, EndpointKind::UnixSocket(_))
    }

    /// Value of the `Host` header for requests sent through this endpoint.
    pub fn authority(&self) -> &str {
        match &self.kind {
            EndpointKind::UnixSocket(_) => "localhost",
            EndpointKind::Tcp(address) => address,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            EndpointKind::UnixSocket(path) => write!(f, "unix-socket:{}", path.display()),
            EndpointKind::Tcp(address) => write!(f, "tcp:{address}"),
        }
    }
}

impl serde::Serialize for Endpoint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("Endpoint", 3)?;
        match &self.kind {
            EndpointKind::UnixSocket(path) => {
                state.serialize_field("kind", "unix-socket")?;
                state.serialize_field("address", &path.display().to_string())?;
            }
            EndpointKind::Tcp(address) => {
                state.serialize_field("kind", "tcp")?;
                state.serialize_field("address", address)?;
            }
        }
        state.serialize_field("rank", &self.rank)?;
        state.end()
    }
}

/// Orders the candidates for probing.
///
/// Duplicates are dropped (first occurrence wins), socket candidates are
/// skipped when the platform has no Unix sockets, and ranks are assigned in the
/// resulting order.
pub fn prioritize(candidates: impl IntoIterator<Item = Endpoint>) -> Vec<Endpoint> {
    prioritize_for(candidates, cfg!(unix))
}

fn prioritize_for(
    candidates: impl IntoIterator<Item = Endpoint>,
    unix_supported: bool,
) -> Vec<Endpoint> {
    let mut out: Vec<Endpoint> = Vec::new();
    for candidate in candidates {
        if candidate.is_unix_socket() && !unix_supported {
            log::debug!("skipping {candidate}: unix sockets are unsupported on this platform");
            continue;
        }
        if out.iter().any(|known| known.kind == candidate.kind) {
            continue;
        }
        out.push(candidate);
    }
    for (rank, endpoint) in out.iter_mut().enumerate() {
        endpoint.rank = rank;
    }
    out
}

/// Builds the probe list: the local socket, the configured url, then the loopback defaults.
pub fn default_candidates(configured: Option<Endpoint>) -> Vec<Endpoint> {
    let mut candidates = vec![Endpoint::unix_socket(DEFAULT_SOCKET_PATH)];
    candidates.extend(configured);
    candidates.extend(DEFAULT_TCP_ADDRESSES.iter().map(|addr| Endpoint::tcp(*addr)));
    prioritize(candidates)
}
