use std::path::PathBuf;

use crate::engine::ParseError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value `{value}` for environment variable `{name}`")]
    InvalidEnv { name: &'static str, value: String },
    #[error("refresh interval must be at least 1 second, got {0}")]
    InvalidRefreshInterval(u64),
    #[error("invalid engine api url: {0}")]
    InvalidEngineUrl(#[from] ParseError),
}
