use std::fmt;

/// Turns a `Result` into an `Option`, logging the error instead of propagating it.
///
/// Used where a failure only degrades the result, e.g. a single container's
/// stats missing from a polling cycle.
pub trait ResultOkLogExt<T, E> {
    /// Logs the error at error level.
    fn ok_log(self) -> Option<T>;

    /// Logs the error at warn level, prefixed with `context`.
    fn ok_warn(self, context: impl fmt::Display) -> Option<T>;
}

impl<T, E> ResultOkLogExt<T, E> for std::result::Result<T, E>
where
    E: std::error::Error,
{
    fn ok_log(self) -> Option<T> {
        match self {
            Ok(ok) => Some(ok),
            Err(err) => {
                log::error!("{err}");
                None
            }
        }
    }

    fn ok_warn(self, context: impl fmt::Display) -> Option<T> {
        match self {
            Ok(ok) => Some(ok),
            Err(err) => {
                log::warn!("{context}: {err}");
                None
            }
        }
    }
}
