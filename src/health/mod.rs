//! Container health tracking and alerting.
//!
//! [`HealthMonitor`] compares each successful poll with the previous one and
//! emits [`HealthEvent`]s for crashes, restarts, removals, failing health checks
//! and restart loops. [`Alerter`] turns events into timestamped [`Alert`]s, keeps
//! the most recent ones in an [`AlertLog`] and forwards them to a [`Notifier`].
mod alert;
mod error;
mod event;
mod monitor;

pub use alert::{ALERT_LOG_LEN, Alert, AlertLog, Alerter, LogNotifier, Notifier};
pub use error::{Error, Result};
pub use event::{HealthEvent, parse_exit_code};
pub use monitor::{HealthMonitor, RESTART_LOOP_THRESHOLD};
