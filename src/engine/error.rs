use hyper::StatusCode;

use super::transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no engine endpoint available after {attempts} discovery attempts")]
    NoEndpoint { attempts: u32 },
    #[error("engine unreachable after {retries} re-resolutions: {source}")]
    RetriesExhausted {
        retries: u32,
        #[source]
        source: TransportError,
    },
    #[error("engine connection failed and no endpoint was found after {attempts} discovery attempts: {source}")]
    ReresolutionFailed {
        attempts: u32,
        #[source]
        source: TransportError,
    },
    #[error("engine answered `{path}` with {status}: {message}")]
    Status {
        path: String,
        status: StatusCode,
        message: String,
    },
    #[error("failed to decode response of `{path}`: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl Error {
    /// Returns `true` if the engine could not be reached at all.
    pub fn is_connectivity(&self) -> bool {
        match self {
            Error::NoEndpoint { .. }
            | Error::RetriesExhausted { .. }
            | Error::ReresolutionFailed { .. } => true,
            Error::Transport(err) => err.is_connection_level(),
            Error::Status { .. } | Error::Decode { .. } => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(serde::Deserialize)]
struct ErrorBody {
    message: String,
}

const MAX_ERROR_BODY_LEN: usize = 256;

/// Extracts the engine's error message from a non-2xx response body.
///
/// The engine reports errors as `{"message": "..."}`; anything else is shown as
/// (truncated) text.
pub(crate) fn error_message(body: &[u8]) -> String {
    if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) {
        return parsed.message;
    }
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    match text.char_indices().nth(MAX_ERROR_BODY_LEN) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_owned(),
    }
}
