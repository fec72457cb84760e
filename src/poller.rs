use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, Utc};

use crate::config::{self, Settings};
use crate::container::{ContainerID, ContainerSnapshot, ContainerState};
use crate::engine::models::ContainerSummary;
use crate::engine::{self, Gateway, Transport};
use crate::error::ResultOkLogExt;
use crate::health::{Alert, Alerter, HealthEvent, HealthMonitor, Notifier};
use crate::stats::{MetricSample, MetricsStore};

/// One container as seen by the last cycle.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ContainerView {
    #[serde(flatten)]
    pub snapshot: ContainerSnapshot,
    /// Missing when the container is not running or its stats could not be fetched.
    pub sample: Option<MetricSample>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CycleReport {
    pub time: DateTime<Utc>,
    pub containers: Vec<ContainerView>,
    /// Sum of the CPU percentages of all sampled containers.
    pub total_cpu_percent: f64,
    /// Sum of the memory percentages of all sampled containers.
    pub total_memory_percent: f64,
    pub alerts: Vec<Alert>,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CycleStatus {
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    #[serde(skip)]
    unreachable_reported: bool,
}

/// Runs polling cycles against the engine.
///
/// A cycle lists all containers, fetches inspect data and stats of the running
/// ones concurrently, records metric samples, feeds the [`HealthMonitor`] and
/// emits the resulting alerts. A failed listing fails the whole cycle and
/// leaves the health history untouched; a failed per-container fetch only
/// drops that container's sample.
pub struct Poller<T, N> {
    gateway: Arc<Gateway<T>>,
    metrics: Arc<MetricsStore>,
    alerter: Arc<Alerter<N>>,
    monitor: Mutex<HealthMonitor>,
    latest: RwLock<Option<CycleReport>>,
    status: Mutex<CycleStatus>,
    settings: RwLock<Settings>,
}

impl<T: Transport, N: Notifier> Poller<T, N> {
    pub fn new(
        gateway: Arc<Gateway<T>>,
        metrics: Arc<MetricsStore>,
        alerter: Arc<Alerter<N>>,
        settings: Settings,
    ) -> Self {
        alerter.set_notifications(settings.show_notifications);
        Self {
            gateway,
            metrics,
            alerter,
            monitor: Mutex::new(HealthMonitor::default()),
            latest: RwLock::new(None),
            status: Mutex::new(CycleStatus::default()),
            settings: RwLock::new(settings),
        }
    }

    pub fn gateway(&self) -> &Arc<Gateway<T>> {
        &self.gateway
    }

    pub fn metrics(&self) -> &Arc<MetricsStore> {
        &self.metrics
    }

    pub fn alerter(&self) -> &Arc<Alerter<N>> {
        &self.alerter
    }

    /// Report of the last successful cycle.
    pub fn latest(&self) -> Option<CycleReport> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn cycle_status(&self) -> CycleStatus {
        self.lock_status().clone()
    }

    pub fn settings(&self) -> Settings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Applies changed settings. A new engine url replaces the probe candidates
    /// and drops the active endpoint.
    ///
    /// Returns `true` if the refresh interval changed.
    pub async fn apply_settings(&self, next: Settings) -> config::Result<bool> {
        next.validate()?;
        let previous = self.settings();
        if previous == next {
            return Ok(false);
        }

        if previous.engine_api_url != next.engine_api_url {
            log::info!(
                "engine api url changed from `{}` to `{}`",
                previous.engine_api_url,
                next.engine_api_url
            );
            self.gateway
                .resolver()
                .set_endpoints(next.candidates()?)
                .await;
        }
        self.alerter.set_notifications(next.show_notifications);

        let interval_changed = previous.refresh_interval_seconds != next.refresh_interval_seconds;
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = next;
        Ok(interval_changed)
    }

    /// Runs one polling cycle.
    ///
    /// The first failing cycle, at startup or after a success, raises an
    /// "engine unreachable" alert; further failures are only logged until a cycle succeeds again.
    pub async fn poll_once(&self) -> engine::Result<CycleReport> {
        match self.collect().await {
            Ok(report) => {
                {
                    let mut status = self.lock_status();
                    if status.consecutive_failures > 0 {
                        log::info!(
                            "engine reachable again after {} failed cycles",
                            status.consecutive_failures
                        );
                    }
                    status.last_success = Some(report.time);
                    status.last_error = None;
                    status.consecutive_failures = 0;
                    status.unreachable_reported = false;
                }
                *self.latest.write().unwrap_or_else(PoisonError::into_inner) =
                    Some(report.clone());
                Ok(report)
            }
            Err(err) => {
                log::error!("polling cycle failed: {err}");
                let first_failure = {
                    let mut status = self.lock_status();
                    status.last_failure = Some(Utc::now());
                    status.last_error = Some(err.to_string());
                    status.consecutive_failures += 1;
                    !std::mem::replace(&mut status.unreachable_reported, true)
                };
                if first_failure {
                    self.alerter
                        .emit(&HealthEvent::EngineUnreachable {
                            reason: err.to_string(),
                        })
                        .await;
                }
                Err(err)
            }
        }
    }

    async fn collect(&self) -> engine::Result<CycleReport> {
        let summaries = self.gateway.list_containers().await?;
        log::trace!("listed {} containers", summaries.len());

        let containers: Vec<ContainerView> = futures::future::join_all(
            summaries
                .into_iter()
                .map(ContainerSummary::into_snapshot)
                .map(|snapshot| self.sample(snapshot)),
        )
        .await;

        let snapshots: Vec<ContainerSnapshot> =
            containers.iter().map(|view| view.snapshot.clone()).collect();
        let events = self
            .monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .observe(&snapshots);
        let alerts = self.alerter.emit_all(&events).await;

        let live: HashSet<ContainerID> = snapshots.into_iter().map(|s| s.id).collect();
        self.metrics.retain_only(&live);

        let (total_cpu_percent, total_memory_percent) = containers
            .iter()
            .filter_map(|view| view.sample.as_ref())
            .fold((0.0, 0.0), |(cpu, memory), sample| {
                (cpu + sample.cpu_percent, memory + sample.memory_percent)
            });

        Ok(CycleReport {
            time: Utc::now(),
            containers,
            total_cpu_percent,
            total_memory_percent,
            alerts,
        })
    }

    async fn sample(&self, mut snapshot: ContainerSnapshot) -> ContainerView {
        if snapshot.state != ContainerState::Running {
            return ContainerView {
                snapshot,
                sample: None,
            };
        }

        let (inspect, stats) = futures::join!(
            self.gateway.inspect(&snapshot.id),
            self.gateway.stats(&snapshot.id)
        );

        if let Some(inspect) =
            inspect.ok_warn(format_args!("failed to inspect container {}", snapshot.name))
        {
            snapshot.restart_count = inspect.restart_count;
        }
        let sample = stats
            .ok_warn(format_args!("failed to fetch stats of container {}", snapshot.name))
            .map(|stats| self.metrics.record(&snapshot.id, &stats));

        ContainerView { snapshot, sample }
    }

    fn lock_status(&self) -> MutexGuard<'_, CycleStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
