use chrono::{DateTime, Utc};

use crate::engine::models::{CpuStats, StatsResponse};

/// Cumulative counters from one stats reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawCounters {
    pub read_at: DateTime<Utc>,
    /// Total CPU time consumed by the container, in nanoseconds.
    pub cpu_total: u64,
    /// Total CPU time of the host, in nanoseconds.
    pub system_cpu: u64,
    pub online_cpus: u32,
    pub memory_usage: u64,
    pub memory_limit: u64,
    pub network_rx: u64,
    pub network_tx: u64,
    pub disk_read: u64,
    pub disk_write: u64,
}

impl RawCounters {
    /// Extracts the current reading of a stats response.
    ///
    /// Network counters are summed over all interfaces; block I/O is summed by
    /// operation. Missing sections count as zero.
    pub fn current(stats: &StatsResponse) -> Self {
        let (network_rx, network_tx) = stats
            .networks
            .iter()
            .flat_map(|networks| networks.values())
            .fold((0u64, 0u64), |(rx, tx), iface| {
                (rx.saturating_add(iface.rx_bytes), tx.saturating_add(iface.tx_bytes))
            });

        let (disk_read, disk_write) = stats
            .blkio_stats
            .io_service_bytes_recursive
            .iter()
            .flatten()
            .fold((0u64, 0u64), |(read, write), entry| {
                if entry.op.eq_ignore_ascii_case("read") {
                    (read.saturating_add(entry.value), write)
                } else if entry.op.eq_ignore_ascii_case("write") {
                    (read, write.saturating_add(entry.value))
                } else {
                    (read, write)
                }
            });

        Self {
            read_at: stats.read.unwrap_or_else(Utc::now),
            cpu_total: stats.cpu_stats.cpu_usage.total_usage,
            system_cpu: stats.cpu_stats.system_cpu_usage.unwrap_or(0),
            online_cpus: online_cpus(&stats.cpu_stats),
            memory_usage: stats.memory_stats.usage.unwrap_or(0),
            memory_limit: stats.memory_stats.limit.unwrap_or(0),
            network_rx,
            network_tx,
            disk_read,
            disk_write,
        }
    }

    /// Extracts the engine's own previous CPU reading (`precpu_stats`).
    ///
    /// Returns `None` when the engine has no previous reading yet, which it
    /// signals with an empty system counter.
    pub fn previous(stats: &StatsResponse) -> Option<Self> {
        let system_cpu = stats.precpu_stats.system_cpu_usage.filter(|v| *v > 0)?;
        let current = Self::current(stats);
        Some(Self {
            cpu_total: stats.precpu_stats.cpu_usage.total_usage,
            system_cpu,
            ..current
        })
    }
}

fn online_cpus(cpu: &CpuStats) -> u32 {
    cpu.online_cpus
        .filter(|n| *n > 0)
        .or_else(|| {
            cpu.cpu_usage
                .percpu_usage
                .as_ref()
                .and_then(|per_cpu| u32::try_from(per_cpu.len()).ok())
                .filter(|n| *n > 0)
        })
        .unwrap_or(1)
}

/// Derived resource usage of one container at one instant.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: f64,
    pub memory_usage: u64,
    pub memory_limit: u64,
    pub memory_percent: f64,
    pub network_rx: u64,
    pub network_tx: u64,
    pub disk_read: u64,
    pub disk_write: u64,
}

/// Computes a sample from two consecutive readings.
///
/// CPU percent is `cpu_delta / system_delta * online_cpus * 100` and is `0`
/// whenever either delta is not positive, e.g. after a counter reset or for two
/// identical readings.
pub fn decode(previous: &RawCounters, current: &RawCounters) -> MetricSample {
    let cpu_delta = current.cpu_total.saturating_sub(previous.cpu_total);
    let system_delta = current.system_cpu.saturating_sub(previous.system_cpu);
    let cpu_percent = if cpu_delta > 0 && system_delta > 0 {
        cpu_delta as f64 / system_delta as f64 * f64::from(current.online_cpus) * 100.0
    } else {
        0.0
    };

    let memory_percent = if current.memory_limit > 0 {
        current.memory_usage as f64 / current.memory_limit as f64 * 100.0
    } else {
        0.0
    };

    MetricSample {
        timestamp: current.read_at,
        cpu_percent,
        memory_usage: current.memory_usage,
        memory_limit: current.memory_limit,
        memory_percent,
        network_rx: current.network_rx,
        network_tx: current.network_tx,
        disk_read: current.disk_read,
        disk_write: current.disk_write,
    }
}

/// Decodes a stats response, preferring the engine's own previous reading and
/// falling back to `retained` (the caller's last reading).
///
/// Returns the sample together with the current counters, which the caller
/// should retain for the next call.
pub fn decode_response(
    stats: &StatsResponse,
    retained: Option<&RawCounters>,
) -> (MetricSample, RawCounters) {
    let current = RawCounters::current(stats);
    let previous = RawCounters::previous(stats)
        .or_else(|| retained.copied())
        .unwrap_or(current);
    (decode(&previous, &current), current)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counters(cpu_total: u64, system_cpu: u64) -> RawCounters {
        RawCounters {
            read_at: DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            cpu_total,
            system_cpu,
            online_cpus: 4,
            memory_usage: 256 * 1024 * 1024,
            memory_limit: 1024 * 1024 * 1024,
            network_rx: 0,
            network_tx: 0,
            disk_read: 0,
            disk_write: 0,
        }
    }

    const STATS: &str = r#"{
        "read": "2024-05-01T12:00:05.123456789Z",
        "cpu_stats": {
            "cpu_usage": {"total_usage": 400000000, "percpu_usage": [1, 2]},
            "system_cpu_usage": 20000000000,
            "online_cpus": 2
        },
        "precpu_stats": {
            "cpu_usage": {"total_usage": 200000000},
            "system_cpu_usage": 18000000000
        },
        "memory_stats": {"usage": 104857600, "limit": 419430400},
        "networks": {
            "eth0": {"rx_bytes": 1000, "tx_bytes": 2000},
            "eth1": {"rx_bytes": 24, "tx_bytes": 48}
        },
        "blkio_stats": {"io_service_bytes_recursive": [
            {"major": 8, "minor": 0, "op": "Read", "value": 4096},
            {"major": 8, "minor": 0, "op": "Write", "value": 8192},
            {"major": 8, "minor": 16, "op": "read", "value": 4096},
            {"major": 8, "minor": 0, "op": "Total", "value": 16384}
        ]}
    }"#;

    #[test]
    fn test_cpu_percent_from_deltas() {
        let sample = decode(&counters(100, 1_000), &counters(150, 1_200));
        // 50 / 200 * 4 cpus * 100
        assert!((sample.cpu_percent - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cpu_percent_is_zero_for_non_positive_deltas() {
        let same = decode(&counters(100, 1_000), &counters(100, 1_000));
        assert_eq!(same.cpu_percent, 0.0);

        let system_reset = decode(&counters(100, 1_000), &counters(150, 500));
        assert_eq!(system_reset.cpu_percent, 0.0);

        let cpu_reset = decode(&counters(100, 1_000), &counters(50, 1_200));
        assert_eq!(cpu_reset.cpu_percent, 0.0);

        let idle = decode(&counters(100, 1_000), &counters(100, 1_200));
        assert_eq!(idle.cpu_percent, 0.0);
    }

    #[test]
    fn test_memory_percent() {
        let sample = decode(&counters(0, 0), &counters(0, 0));
        assert!((sample.memory_percent - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_memory_percent_without_limit() {
        let mut current = counters(0, 0);
        current.memory_limit = 0;
        assert_eq!(decode(&current, &current).memory_percent, 0.0);
    }

    #[test]
    fn test_decode_response_uses_precpu() {
        let stats: StatsResponse = serde_json::from_str(STATS).unwrap();
        let (sample, current) = decode_response(&stats, None);

        // 200ms / 2s * 2 cpus * 100
        assert!((sample.cpu_percent - 20.0).abs() < 1e-9);
        assert!((sample.memory_percent - 25.0).abs() < 1e-9);
        assert_eq!(sample.network_rx, 1024);
        assert_eq!(sample.network_tx, 2048);
        assert_eq!(sample.disk_read, 8192);
        assert_eq!(sample.disk_write, 8192);
        assert_eq!(current.cpu_total, 400_000_000);
        assert_eq!(
            sample.timestamp.to_rfc3339(),
            "2024-05-01T12:00:05.123456789+00:00"
        );
    }

    #[test]
    fn test_decode_response_falls_back_to_retained() {
        let raw = r#"{
            "cpu_stats": {"cpu_usage": {"total_usage": 300}, "system_cpu_usage": 2000, "online_cpus": 1},
            "precpu_stats": {"cpu_usage": {"total_usage": 0}}
        }"#;
        let stats: StatsResponse = serde_json::from_str(raw).unwrap();

        let (first, _) = decode_response(&stats, None);
        assert_eq!(first.cpu_percent, 0.0);

        let mut retained = counters(100, 1_000);
        retained.online_cpus = 1;
        let (second, _) = decode_response(&stats, Some(&retained));
        // 200 / 1000 * 1 cpu * 100
        assert!((second.cpu_percent - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_online_cpus_fallbacks() {
        let stats: StatsResponse = serde_json::from_str(
            r#"{"cpu_stats": {"cpu_usage": {"total_usage": 1, "percpu_usage": [1, 1, 1]}}}"#,
        )
        .unwrap();
        assert_eq!(RawCounters::current(&stats).online_cpus, 3);

        let empty = StatsResponse::default();
        assert_eq!(RawCounters::current(&empty).online_cpus, 1);
    }

    #[test]
    fn test_missing_sections_default_to_zero() {
        let empty = StatsResponse::default();
        let (sample, _) = decode_response(&empty, None);
        assert_eq!(sample.cpu_percent, 0.0);
        assert_eq!(sample.memory_usage, 0);
        assert_eq!(sample.network_rx, 0);
        assert_eq!(sample.disk_write, 0);
    }
}
