#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid container id `{0}`: expected 1 to 255 characters of [A-Za-z0-9_.-]")]
    InvalidContainerID(String),
}

pub type Result<T> = std::result::Result<T, Error>;
