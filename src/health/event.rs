use std::fmt;

/// Something an operator should be told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    /// A running container exited with a non-zero (or unparsable) exit code.
    StoppedUnexpectedly { name: String, exit_code: Option<i64> },
    Started { name: String },
    Restarting { name: String },
    Removed { name: String },
    Unhealthy { name: String },
    RestartLoop { name: String, restart_count: u32 },
    /// A polling cycle failed after the previous one succeeded.
    EngineUnreachable { reason: String },
}

impl fmt::Display for HealthEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthEvent::StoppedUnexpectedly {
                name,
                exit_code: Some(code),
            } => write!(
                f,
                "Container {name} stopped unexpectedly with exit code {code}"
            ),
            HealthEvent::StoppedUnexpectedly {
                name,
                exit_code: None,
            } => write!(
                f,
                "Container {name} stopped unexpectedly with exit code unknown"
            ),
            HealthEvent::Started { name } => write!(f, "Container {name} started"),
            HealthEvent::Restarting { name } => write!(f, "Container {name} is restarting"),
            HealthEvent::Removed { name } => write!(f, "Container {name} was removed"),
            HealthEvent::Unhealthy { name } => write!(f, "Container {name} health check failed"),
            HealthEvent::RestartLoop {
                name,
                restart_count,
            } => write!(f, "Container {name} restarted {restart_count} times"),
            HealthEvent::EngineUnreachable { reason } => {
                write!(f, "Error monitoring Docker: {reason}")
            }
        }
    }
}

/// Parses the exit code out of a status string such as `"Exited (137) 5 minutes ago"`.
///
/// # Examples
///
/// ```
/// # use dockwatch::health::parse_exit_code;
/// assert_eq!(parse_exit_code("Exited (1) 2 seconds ago"), Some(1));
/// assert_eq!(parse_exit_code("Up 3 hours"), None);
/// ```
pub fn parse_exit_code(status: &str) -> Option<i64> {
    let (code, _) = status
        .trim_start()
        .strip_prefix("Exited (")?
        .split_once(')')?;
    code.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exit_code() {
        assert_eq!(parse_exit_code("Exited (0) 3 minutes ago"), Some(0));
        assert_eq!(parse_exit_code("Exited (137) About an hour ago"), Some(137));
        assert_eq!(parse_exit_code("Exited (-1) now"), Some(-1));
    }

    #[test]
    fn test_parse_exit_code_unparsable() {
        assert_eq!(parse_exit_code("Exited (abc) now"), None);
        assert_eq!(parse_exit_code("Exited"), None);
        assert_eq!(parse_exit_code(""), None);
        assert_eq!(parse_exit_code("Restarting (1) 2 seconds ago"), None);
    }

    #[test]
    fn test_messages() {
        let stopped = HealthEvent::StoppedUnexpectedly {
            name: "web".to_owned(),
            exit_code: Some(1),
        };
        assert_eq!(
            stopped.to_string(),
            "Container web stopped unexpectedly with exit code 1"
        );
        let unknown = HealthEvent::StoppedUnexpectedly {
            name: "web".to_owned(),
            exit_code: None,
        };
        assert!(unknown.to_string().ends_with("exit code unknown"));
        let looping = HealthEvent::RestartLoop {
            name: "db".to_owned(),
            restart_count: 5,
        };
        assert_eq!(looping.to_string(), "Container db restarted 5 times");
    }
}
