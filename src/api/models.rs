use chrono::{DateTime, Utc};

use crate::config::Settings;
use crate::container::ContainerSnapshot;
use crate::engine::ConnectivityStatus;
use crate::poller::{ContainerView, CycleReport, CycleStatus};
use crate::stats::{MetricSample, format_bytes, format_percent};

/// Display strings of a sample, as rendered by the dashboard.
#[derive(Debug, serde::Serialize)]
pub struct FormattedSample {
    pub cpu_percent: String,
    pub memory_percent: String,
    pub memory_usage: String,
    pub memory_limit: String,
    pub network_rx: String,
    pub network_tx: String,
    pub disk_read: String,
    pub disk_write: String,
}

#[derive(Debug, serde::Serialize)]
pub struct SampleView {
    #[serde(flatten)]
    pub raw: MetricSample,
    pub formatted: FormattedSample,
}

impl From<MetricSample> for SampleView {
    fn from(sample: MetricSample) -> Self {
        Self {
            formatted: FormattedSample {
                cpu_percent: format_percent(sample.cpu_percent),
                memory_percent: format_percent(sample.memory_percent),
                memory_usage: format_bytes(sample.memory_usage),
                memory_limit: format_bytes(sample.memory_limit),
                network_rx: format_bytes(sample.network_rx),
                network_tx: format_bytes(sample.network_tx),
                disk_read: format_bytes(sample.disk_read),
                disk_write: format_bytes(sample.disk_write),
            },
            raw: sample,
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ContainerEntry {
    #[serde(flatten)]
    pub snapshot: ContainerSnapshot,
    pub sample: Option<SampleView>,
}

impl From<ContainerView> for ContainerEntry {
    fn from(view: ContainerView) -> Self {
        Self {
            snapshot: view.snapshot,
            sample: view.sample.map(SampleView::from),
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ContainersResponse {
    pub time: DateTime<Utc>,
    pub containers: Vec<ContainerEntry>,
    pub total_cpu_percent: String,
    pub total_memory_percent: String,
}

impl From<CycleReport> for ContainersResponse {
    fn from(report: CycleReport) -> Self {
        Self {
            time: report.time,
            containers: report.containers.into_iter().map(Into::into).collect(),
            total_cpu_percent: format_percent(report.total_cpu_percent),
            total_memory_percent: format_percent(report.total_memory_percent),
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct StatusResponse {
    pub connectivity: ConnectivityStatus,
    pub cycle: CycleStatus,
    pub settings: Settings,
}

#[derive(Debug, serde::Deserialize)]
pub struct LogParams {
    pub tail: Option<usize>,
    pub search: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct ErrorBody {
    pub error: String,
}
