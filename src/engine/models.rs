//! Response schemas for the engine API endpoints this crate consumes.
//!
//! Only the fields the monitor reads are modelled. Optional fields default
//! instead of failing so that older engine versions still decode.

use std::collections::HashMap;

use crate::container::{self, ContainerID, ContainerSnapshot, ContainerState};

/// `GET /version`
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Version {
    pub version: String,
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub arch: String,
}

/// One entry of `GET /containers/json?all=1`.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerSummary {
    pub id: ContainerID,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub image: String,
    pub state: ContainerState,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created: i64,
}

impl ContainerSummary {
    /// Converts the summary into a snapshot. The list endpoint does not report
    /// restart counts, so those come from a later inspect call.
    pub fn into_snapshot(self) -> ContainerSnapshot {
        let name = container::display_name(&self.names, &self.id);
        ContainerSnapshot {
            id: self.id,
            name,
            image: self.image,
            state: self.state,
            status: self.status,
            restart_count: 0,
        }
    }
}

/// `GET /containers/{id}/json`
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerInspect {
    pub id: ContainerID,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub restart_count: u32,
    pub state: InspectState,
    #[serde(default)]
    pub config: InspectConfig,
}

impl ContainerInspect {
    /// Name without the leading `/` the engine prefixes.
    pub fn display_name(&self) -> &str {
        self.name.strip_prefix('/').unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InspectState {
    pub status: ContainerState,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub exit_code: i64,
    #[serde(default)]
    pub started_at: String,
    #[serde(default)]
    pub finished_at: String,
    #[serde(default)]
    pub health: Option<InspectHealth>,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InspectHealth {
    pub status: String,
    #[serde(default)]
    pub failing_streak: u32,
}

#[derive(Debug, Clone, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InspectConfig {
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub tty: bool,
}

/// `GET /containers/{id}/stats?stream=false`
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct StatsResponse {
    #[serde(default)]
    pub read: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub cpu_stats: CpuStats,
    #[serde(default)]
    pub precpu_stats: CpuStats,
    #[serde(default)]
    pub memory_stats: MemoryStats,
    #[serde(default)]
    pub networks: Option<HashMap<String, NetworkStats>>,
    #[serde(default)]
    pub blkio_stats: BlkioStats,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct CpuStats {
    #[serde(default)]
    pub cpu_usage: CpuUsage,
    #[serde(default)]
    pub system_cpu_usage: Option<u64>,
    #[serde(default)]
    pub online_cpus: Option<u32>,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct CpuUsage {
    #[serde(default)]
    pub total_usage: u64,
    #[serde(default)]
    pub percpu_usage: Option<Vec<u64>>,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct MemoryStats {
    #[serde(default)]
    pub usage: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct NetworkStats {
    #[serde(default)]
    pub rx_bytes: u64,
    #[serde(default)]
    pub tx_bytes: u64,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct BlkioStats {
    #[serde(default)]
    pub io_service_bytes_recursive: Option<Vec<BlkioEntry>>,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct BlkioEntry {
    #[serde(default)]
    pub op: String,
    #[serde(default)]
    pub value: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_into_snapshot() {
        let raw = r#"[{
            "Id": "4f1c2b9a8e7d",
            "Names": ["/web"],
            "Image": "nginx:latest",
            "State": "running",
            "Status": "Up 2 hours (unhealthy)",
            "Created": 1700000000
        }]"#;
        let summaries: Vec<ContainerSummary> = serde_json::from_str(raw).unwrap();
        let snapshot = summaries.into_iter().next().unwrap().into_snapshot();
        assert_eq!(snapshot.name, "web");
        assert_eq!(snapshot.state, ContainerState::Running);
        assert!(snapshot.is_unhealthy());
    }

    #[test]
    fn test_summary_with_unknown_state_fails() {
        let raw = r#"{"Id": "abc", "State": "hibernating"}"#;
        assert!(serde_json::from_str::<ContainerSummary>(raw).is_err());
    }

    #[test]
    fn test_inspect_decodes_nested_state() {
        let raw = r#"{
            "Id": "abc",
            "Name": "/db",
            "RestartCount": 4,
            "State": {"Status": "running", "Running": true, "ExitCode": 0,
                      "Health": {"Status": "unhealthy", "FailingStreak": 3}},
            "Config": {"Image": "postgres:16", "Tty": false}
        }"#;
        let inspect: ContainerInspect = serde_json::from_str(raw).unwrap();
        assert_eq!(inspect.display_name(), "db");
        assert_eq!(inspect.restart_count, 4);
        assert_eq!(inspect.state.health.unwrap().failing_streak, 3);
        assert!(!inspect.config.tty);
    }

    #[test]
    fn test_stats_tolerates_missing_sections() {
        let stats: StatsResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(stats.cpu_stats.cpu_usage.total_usage, 0);
        assert!(stats.networks.is_none());
        assert!(stats.blkio_stats.io_service_bytes_recursive.is_none());
    }

    #[test]
    fn test_stats_tolerates_null_blkio_list() {
        let raw = r#"{"blkio_stats": {"io_service_bytes_recursive": null}}"#;
        let stats: StatsResponse = serde_json::from_str(raw).unwrap();
        assert!(stats.blkio_stats.io_service_bytes_recursive.is_none());
    }
}
