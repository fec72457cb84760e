use std::collections::{HashSet, VecDeque};

use dashmap::DashMap;

use crate::container::ContainerID;
use crate::engine::models::StatsResponse;

use super::decoder::{self, MetricSample, RawCounters};

/// Number of samples kept per container for trend display.
pub const HISTORY_LEN: usize = 20;

/// Recent samples of one container plus the counters needed for the next delta.
#[derive(Debug, Default, Clone)]
pub struct MetricSeries {
    samples: VecDeque<MetricSample>,
    last_counters: Option<RawCounters>,
}

impl MetricSeries {
    pub fn samples(&self) -> impl Iterator<Item = &MetricSample> {
        self.samples.iter()
    }

    pub fn latest(&self) -> Option<&MetricSample> {
        self.samples.back()
    }
}

/// Per-container metric history.
///
/// Concurrent per-container fetches only ever touch their own entry.
#[derive(Debug)]
pub struct MetricsStore {
    series: DashMap<ContainerID, MetricSeries>,
    capacity: usize,
}

impl Default for MetricsStore {
    fn default() -> Self {
        Self::with_capacity(HISTORY_LEN)
    }
}

impl MetricsStore {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            series: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Decodes `stats` against the container's previous reading and appends the sample.
    pub fn record(&self, container_id: &ContainerID, stats: &StatsResponse) -> MetricSample {
        let mut series = self.series.entry(container_id.clone()).or_default();
        let (sample, counters) = decoder::decode_response(stats, series.last_counters.as_ref());
        series.last_counters = Some(counters);
        series.samples.push_back(sample);
        while series.samples.len() > self.capacity {
            series.samples.pop_front();
        }
        sample
    }

    pub fn latest(&self, container_id: &ContainerID) -> Option<MetricSample> {
        self.series
            .get(container_id)
            .and_then(|series| series.latest().copied())
    }

    /// Returns the retained samples, oldest first.
    pub fn history(&self, container_id: &ContainerID) -> Vec<MetricSample> {
        self.series
            .get(container_id)
            .map(|series| series.samples().copied().collect())
            .unwrap_or_default()
    }

    /// Drops the history of every container not in `live`.
    pub fn retain_only(&self, live: &HashSet<ContainerID>) {
        self.series.retain(|container_id, _| {
            let keep = live.contains(container_id);
            if !keep {
                log::debug!(
                    target: "metrics store",
                    "dropping metric history: container_id={}",
                    container_id.short()
                );
            }
            keep
        });
    }

    pub fn size(&self) -> usize {
        self.series.len()
    }
}
