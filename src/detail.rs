use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::container::ContainerID;
use crate::engine::models::ContainerInspect;
use crate::engine::{self, DEFAULT_LOG_TAIL, Gateway, Transport};
use crate::logs::LogRecord;
use crate::stats::{MetricSample, MetricsStore};

/// Everything shown for the selected container.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ContainerDetail {
    pub id: ContainerID,
    pub inspect: ContainerInspect,
    pub latest: Option<MetricSample>,
    pub history: Vec<MetricSample>,
    pub logs: Vec<LogRecord>,
    pub fetched_at: DateTime<Utc>,
}

/// A selection made at one point in time. Refreshes started for an older
/// selection are not published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub id: ContainerID,
    generation: u64,
}

#[derive(Debug, Default)]
struct TrackerState {
    selection: Option<Selection>,
    generation: u64,
    detail: Option<ContainerDetail>,
}

/// Holds the currently selected container and its latest detail.
#[derive(Debug, Default)]
pub struct DetailTracker {
    state: Mutex<TrackerState>,
}

impl DetailTracker {
    /// Selects `id`, dropping the detail of any previous selection.
    pub fn select(&self, id: ContainerID) -> Selection {
        let mut state = self.lock();
        state.generation += 1;
        let selection = Selection {
            id,
            generation: state.generation,
        };
        state.selection = Some(selection.clone());
        state.detail = None;
        selection
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.generation += 1;
        state.selection = None;
        state.detail = None;
    }

    pub fn selection(&self) -> Option<Selection> {
        self.lock().selection.clone()
    }

    pub fn detail(&self) -> Option<ContainerDetail> {
        self.lock().detail.clone()
    }

    /// Stores `detail` if `selection` is still current. Returns whether it was stored.
    pub fn publish(&self, selection: &Selection, detail: ContainerDetail) -> bool {
        let mut state = self.lock();
        if state.selection.as_ref() != Some(selection) {
            log::debug!(
                "discarding stale detail for container {}",
                selection.id.short()
            );
            return false;
        }
        state.detail = Some(detail);
        true
    }

    /// Fetches inspect data and recent logs for `selection` and publishes them
    /// together with the stored metric history.
    ///
    /// Returns `Ok(false)` if the selection changed while fetching.
    pub async fn refresh<T: Transport>(
        &self,
        gateway: &Gateway<T>,
        metrics: &MetricsStore,
        selection: Selection,
    ) -> engine::Result<bool> {
        let (inspect, logs) = futures::try_join!(
            gateway.inspect(&selection.id),
            gateway.log_records(&selection.id, DEFAULT_LOG_TAIL)
        )?;

        let detail = ContainerDetail {
            id: selection.id.clone(),
            inspect,
            latest: metrics.latest(&selection.id),
            history: metrics.history(&selection.id),
            logs,
            fetched_at: Utc::now(),
        };
        Ok(self.publish(&selection, detail))
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{Reply, fast_config};
    use crate::engine::{Endpoint, prioritize};
    use crate::logs::Severity;

    const INSPECT: &str = r#"{"Id":"aaa","Name":"/web","RestartCount":0,
        "State":{"Status":"running","Running":true,"ExitCode":0}}"#;
    const LOGS: &str = "2024-05-01T10:00:00.000000000Z server started\n\
                        2024-05-01T10:00:01.000000000Z ERROR disk full\n";
    const LOGS_PATH: &str = "/containers/aaa/logs?stdout=1&stderr=1&timestamps=1&tail=100";

    fn id(raw: &str) -> ContainerID {
        ContainerID::new(raw).unwrap()
    }

    fn gateway() -> Gateway<crate::engine::testing::FakeTransport> {
        let endpoints = prioritize(vec![Endpoint::tcp("localhost:2375")]);
        let transport = crate::engine::testing::FakeTransport::default();
        transport.healthy(&endpoints[0]);
        transport.script(&endpoints[0], "/containers/aaa/json", vec![Reply::Ok(INSPECT)]);
        transport.script(&endpoints[0], LOGS_PATH, vec![Reply::Ok(LOGS)]);
        Gateway::new(transport, endpoints, fast_config(1), 0)
    }

    #[tokio::test]
    async fn test_refresh_publishes_detail() {
        let tracker = DetailTracker::default();
        let gateway = gateway();
        let selection = tracker.select(id("aaa"));

        let published = tracker
            .refresh(&gateway, &MetricsStore::default(), selection)
            .await
            .unwrap();
        assert!(published);

        let detail = tracker.detail().unwrap();
        assert_eq!(detail.inspect.display_name(), "web");
        assert_eq!(detail.logs.len(), 2);
        assert_eq!(detail.logs[1].severity, Severity::Error);
        assert!(detail.history.is_empty());
    }

    #[tokio::test]
    async fn test_stale_refresh_is_discarded() {
        let tracker = DetailTracker::default();
        let gateway = gateway();
        let stale = tracker.select(id("aaa"));
        let current = tracker.select(id("bbb"));

        let published = tracker
            .refresh(&gateway, &MetricsStore::default(), stale)
            .await
            .unwrap();
        assert!(!published);
        assert!(tracker.detail().is_none());
        assert_eq!(tracker.selection(), Some(current));
    }

    #[tokio::test]
    async fn test_reselecting_same_container_invalidates_older_refresh() {
        let tracker = DetailTracker::default();
        let gateway = gateway();
        let first = tracker.select(id("aaa"));
        tracker.select(id("aaa"));

        let published = tracker
            .refresh(&gateway, &MetricsStore::default(), first)
            .await
            .unwrap();
        assert!(!published);
    }

    #[tokio::test]
    async fn test_clear_discards_in_flight_refresh() {
        let tracker = DetailTracker::default();
        let gateway = gateway();
        let selection = tracker.select(id("aaa"));
        tracker.clear();

        assert!(
            !tracker
                .refresh(&gateway, &MetricsStore::default(), selection)
                .await
                .unwrap()
        );
        assert!(tracker.selection().is_none());
    }
}
