//! Derived resource metrics.
//!
//! The engine reports cumulative counters (CPU time, bytes transferred). This
//! module turns two consecutive readings into a [`MetricSample`] of percentages
//! and byte totals, and keeps a short per-container history for trend display.
//!
//! # Main types
//!
//! - [`RawCounters`]: the counters of one reading, extracted from a stats response.
//! - [`MetricSample`]: CPU and memory percentages plus network and disk byte totals.
//! - [`MetricsStore`]: the most recent [`HISTORY_LEN`] samples of every container.
mod decoder;
mod format;
mod history;

pub use decoder::{MetricSample, RawCounters, decode, decode_response};
pub use format::{format_bytes, format_percent};
pub use history::{HISTORY_LEN, MetricSeries, MetricsStore};
