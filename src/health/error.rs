use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read alert log at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write alert log at {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode alert log: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("malformed alert log at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}
