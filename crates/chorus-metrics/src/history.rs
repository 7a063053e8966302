//! Bounded rolling history of completed calls and summary statistics.

use std::collections::VecDeque;

use serde::Serialize;

use crate::record::LatencyRecord;
use crate::sink::LATENCY_TARGET_MS;

/// Maximum number of completed records retained.
pub const HISTORY_CAPACITY: usize = 1000;

/// Number of most-recent records a stats query operates over.
pub const STATS_WINDOW: usize = 100;

/// FIFO buffer of completed call records. Only timing is retained here;
/// quality samples go straight to the sink at call end and are not kept.
#[derive(Debug, Default)]
pub struct CallHistory {
    records: VecDeque<LatencyRecord>,
}

impl CallHistory {
    pub fn new() -> Self {
        Self {
            records: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    /// Appends a completed record, evicting the oldest entry when the
    /// buffer is at capacity.
    pub fn push(&mut self, record: LatencyRecord) {
        if self.records.len() >= HISTORY_CAPACITY {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Oldest retained record, if any.
    pub fn oldest(&self) -> Option<&LatencyRecord> {
        self.records.front()
    }

    /// Most recently completed record, if any.
    pub fn latest(&self) -> Option<&LatencyRecord> {
        self.records.back()
    }

    /// Summary statistics over the last [`STATS_WINDOW`] records.
    ///
    /// Percentiles are non-interpolated: the value at index
    /// `floor(fraction * n)` of the ascending-sorted latency list. An
    /// empty history yields the zero-valued default.
    pub fn latency_stats(&self) -> LatencyStats {
        if self.records.is_empty() {
            return LatencyStats::default();
        }

        let skip = self.records.len().saturating_sub(STATS_WINDOW);
        let mut latencies: Vec<f64> = self
            .records
            .iter()
            .skip(skip)
            .map(LatencyRecord::end_to_end_latency_ms)
            .collect();
        latencies.sort_by(f64::total_cmp);

        let n = latencies.len();
        let target_met = latencies.iter().filter(|l| **l < LATENCY_TARGET_MS).count();

        LatencyStats {
            sample_count: n,
            avg_latency_ms: latencies.iter().sum::<f64>() / n as f64,
            p95_latency_ms: latencies[(0.95 * n as f64) as usize],
            p99_latency_ms: latencies[(0.99 * n as f64) as usize],
            min_latency_ms: latencies[0],
            max_latency_ms: latencies[n - 1],
            target_met_percentage: target_met as f64 / n as f64 * 100.0,
        }
    }
}

/// Fixed-key latency summary for operational tooling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencyStats {
    /// Number of records the summary was computed over (0 when history
    /// is empty, in which case every other field is zero).
    pub sample_count: usize,
    pub avg_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub p99_latency_ms: f64,
    pub min_latency_ms: f64,
    pub max_latency_ms: f64,
    /// Percentage of the window strictly under the 600 ms target.
    pub target_met_percentage: f64,
}
