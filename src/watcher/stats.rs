use crate::source::classifier::Severity;
use serde::{Deserialize, Serialize};

/// Lifetime counters for one supervisor.
///
/// Survives watcher restarts; only dropping the supervisor resets it.
/// Counters saturate at `u64::MAX` instead of wrapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_lines: u64,
    pub error_count: u64,
    pub warning_count: u64,
    /// Unix millis of the last completed watch cycle
    pub last_update_time: i64,
    /// Smoothed milliseconds between watch cycles
    pub average_update_interval: f64,
    #[serde(skip)]
    interval_seeded: bool,
}

impl Statistics {
    pub fn new(now_millis: i64) -> Self {
        Self {
            total_lines: 0,
            error_count: 0,
            warning_count: 0,
            last_update_time: now_millis,
            average_update_interval: 0.0,
            interval_seeded: false,
        }
    }

    /// Count one accepted record.
    pub fn record(&mut self, severity: Severity) {
        self.total_lines = self.total_lines.saturating_add(1);
        match severity {
            Severity::Error => self.error_count = self.error_count.saturating_add(1),
            Severity::Warning => self.warning_count = self.warning_count.saturating_add(1),
            Severity::Info => {}
        }
    }

    /// Mark a completed watch cycle at `now_millis`.
    ///
    /// The first interval seeds the average; later ones are folded in as
    /// `(average + interval) / 2`.
    pub fn mark_update(&mut self, now_millis: i64) {
        let interval = now_millis.saturating_sub(self.last_update_time).max(0) as f64;

        self.average_update_interval = if self.interval_seeded {
            (self.average_update_interval + interval) / 2.0
        } else {
            interval
        };
        self.interval_seeded = true;
        self.last_update_time = now_millis;
    }
}

/// Point-in-time statistics as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsReport {
    pub total_lines: u64,
    pub error_count: u64,
    pub warning_count: u64,
    pub last_update_time: i64,
    pub average_update_interval: f64,
    pub current_buffer_size: usize,
    pub max_buffer_size: usize,
    pub file_size: u64,
}

impl StatisticsReport {
    pub fn new(stats: &Statistics, current_buffer_size: usize, max_buffer_size: usize, file_size: u64) -> Self {
        Self {
            total_lines: stats.total_lines,
            error_count: stats.error_count,
            warning_count: stats.warning_count,
            last_update_time: stats.last_update_time,
            average_update_interval: stats.average_update_interval,
            current_buffer_size,
            max_buffer_size,
            file_size,
        }
    }
}
