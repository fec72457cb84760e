use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::error::ResultOkLogExt;

use super::error::{Error, Result};
use super::event::HealthEvent;

/// Number of alerts kept in the log.
pub const ALERT_LOG_LEN: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Alert {
    pub message: String,
    pub time: DateTime<Utc>,
}

impl Alert {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            time: Utc::now(),
        }
    }
}

impl From<&HealthEvent> for Alert {
    fn from(event: &HealthEvent) -> Self {
        Self::new(event.to_string())
    }
}

/// Bounded list of recent alerts, newest first, optionally backed by a JSON file.
#[derive(Debug)]
pub struct AlertLog {
    alerts: VecDeque<Alert>,
    capacity: usize,
    path: Option<PathBuf>,
}

impl AlertLog {
    /// Creates an in-memory log.
    pub fn new(capacity: usize) -> Self {
        Self {
            alerts: VecDeque::new(),
            capacity: capacity.max(1),
            path: None,
        }
    }

    /// Opens the log persisted at `path`. A missing file yields an empty log.
    pub fn open(path: impl Into<PathBuf>, capacity: usize) -> Result<Self> {
        let path = path.into();
        let mut log = Self::new(capacity);

        match std::fs::read(&path) {
            Ok(raw) => {
                let alerts: Vec<Alert> =
                    serde_json::from_slice(&raw).map_err(|source| Error::Parse {
                        path: path.clone(),
                        source,
                    })?;
                log.alerts = alerts.into_iter().take(log.capacity).collect();
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no alert log at {}, starting empty", path.display());
            }
            Err(source) => return Err(Error::Read { path, source }),
        }

        log.path = Some(path);
        Ok(log)
    }

    pub fn push(&mut self, alert: Alert) {
        self.alerts.push_front(alert);
        self.alerts.truncate(self.capacity);
    }

    /// Alerts, newest first.
    pub fn alerts(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter()
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Writes the log to its backing file, if any.
    pub fn persist(&self) -> Result<()> {
        match self.snapshot()? {
            Some(snapshot) => snapshot.write(),
            None => Ok(()),
        }
    }

    /// Encodes the log for writing outside of any lock.
    fn snapshot(&self) -> Result<Option<Snapshot>> {
        let Some(path) = &self.path else {
            return Ok(None);
        };
        let raw = serde_json::to_vec_pretty(&self.alerts).map_err(Error::Encode)?;
        Ok(Some(Snapshot {
            path: path.clone(),
            raw,
        }))
    }
}

/// An encoded alert log waiting to be written.
#[derive(Debug)]
struct Snapshot {
    path: PathBuf,
    raw: Vec<u8>,
}

impl Snapshot {
    /// Replaces the file atomically through a temporary sibling.
    fn write(self) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, self.raw)
            .and_then(|()| std::fs::rename(&tmp, &self.path))
            .map_err(|source| Error::Write {
                path: self.path,
                source,
            })
    }
}

/// Delivers alerts to the user.
pub trait Notifier: Send + Sync {
    fn notify(&self, alert: &Alert);
}

/// Writes alerts to the process log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, alert: &Alert) {
        log::warn!(target: "notification", "{}", alert.message);
    }
}

/// Records alerts and forwards them to a [`Notifier`] while notifications are enabled.
///
/// Alerts are always recorded, regardless of the notification switch.
pub struct Alerter<N> {
    log: Mutex<AlertLog>,
    // Serializes file writes so an older snapshot never overwrites a newer one.
    writer: tokio::sync::Mutex<()>,
    notifier: N,
    notifications: AtomicBool,
}

impl<N: Notifier> Alerter<N> {
    pub fn new(log: AlertLog, notifier: N, notifications: bool) -> Self {
        Self {
            log: Mutex::new(log),
            writer: tokio::sync::Mutex::new(()),
            notifier,
            notifications: AtomicBool::new(notifications),
        }
    }

    pub fn set_notifications(&self, enabled: bool) {
        self.notifications.store(enabled, Ordering::Relaxed);
    }

    pub fn notifications(&self) -> bool {
        self.notifications.load(Ordering::Relaxed)
    }

    /// Records `events` as alerts and persists the log once.
    ///
    /// The file is written on the blocking pool.
    pub async fn emit_all(&self, events: &[HealthEvent]) -> Vec<Alert> {
        if events.is_empty() {
            return Vec::new();
        }

        let alerts: Vec<Alert> = events.iter().map(Alert::from).collect();
        let _writer = self.writer.lock().await;
        let snapshot = {
            let mut log = self.lock();
            for alert in &alerts {
                log::info!(target: "alerts", "{}", alert.message);
                log.push(alert.clone());
            }
            log.snapshot()
        };
        if let Some(snapshot) = snapshot.ok_log().flatten() {
            tokio::task::spawn_blocking(move || snapshot.write())
                .await
                .ok_log()
                .and_then(ResultOkLogExt::ok_log);
        }

        if self.notifications() {
            for alert in &alerts {
                self.notifier.notify(alert);
            }
        }
        alerts
    }

    pub async fn emit(&self, event: &HealthEvent) -> Alert {
        let mut alerts = self.emit_all(std::slice::from_ref(event)).await;
        alerts.pop().unwrap_or_else(|| Alert::from(event))
    }

    /// Alerts, newest first.
    pub fn recent(&self) -> Vec<Alert> {
        self.lock().alerts().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, AlertLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
