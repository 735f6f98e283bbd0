//! Statistics collection and export.
//!
//! Counters are updated by the scheduler and the engine as events move
//! through the queue, and can be exported as JSON or CSV.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

/// Counters describing the work done by one simulation instance.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Events inserted into the pending queue (including re-issued children)
    pub scheduled: u64,
    /// Event executions, counting re-executions after a rollback
    pub executed: u64,
    /// Event rollbacks
    pub rolled_back: u64,
    /// Pending events withdrawn by handle
    pub cancelled: u64,
    /// Pending events withdrawn because the event that caused them was rolled back
    pub withdrawn: u64,
    /// Executed events dropped from history (disabled or pruned)
    pub discarded: u64,
    /// Deliveries skipped because their target pin was removed
    pub skipped: u64,
    /// Scheduled writes rejected when they came due
    pub failed_stimuli: u64,
    /// Component `update` invocations
    pub updates: u64,
    /// Largest pending queue size observed
    pub peak_pending: usize,
}

impl SchedulerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn observe_pending(&mut self, pending: usize) {
        self.peak_pending = self.peak_pending.max(pending);
    }

    /// Exports statistics to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Exports statistics to a JSON file.
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = self
            .to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Exports statistics to CSV.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();
        csv.push_str("metric,value\n");
        csv.push_str(&format!("scheduled,{}\n", self.scheduled));
        csv.push_str(&format!("executed,{}\n", self.executed));
        csv.push_str(&format!("rolled_back,{}\n", self.rolled_back));
        csv.push_str(&format!("cancelled,{}\n", self.cancelled));
        csv.push_str(&format!("withdrawn,{}\n", self.withdrawn));
        csv.push_str(&format!("discarded,{}\n", self.discarded));
        csv.push_str(&format!("skipped,{}\n", self.skipped));
        csv.push_str(&format!("failed_stimuli,{}\n", self.failed_stimuli));
        csv.push_str(&format!("updates,{}\n", self.updates));
        csv.push_str(&format!("peak_pending,{}\n", self.peak_pending));
        csv
    }

    /// Exports statistics to a CSV file.
    pub fn to_csv_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        std::fs::write(path, self.to_csv())
    }

    /// Writes a human-readable summary to a writer.
    pub fn write_summary<W: io::Write>(&self, mut w: W) -> io::Result<()> {
        w.write_all(self.summary().as_bytes())
    }

    /// Returns a human-readable summary.
    pub fn summary(&self) -> String {
        let mut s = String::from("=== Scheduler Statistics ===\n");
        s += &format!("Scheduled: {}\n", self.scheduled);
        s += &format!("Executed: {}\n", self.executed);
        s += &format!("Rolled back: {}\n", self.rolled_back);
        s += &format!("Cancelled: {}, Withdrawn: {}\n", self.cancelled, self.withdrawn);
        s += &format!("Discarded from history: {}\n", self.discarded);
        s += &format!("Skipped deliveries: {}\n", self.skipped);
        s += &format!("Failed scheduled writes: {}\n", self.failed_stimuli);
        s += &format!("Component updates: {}\n", self.updates);
        s += &format!("Peak pending: {}\n", self.peak_pending);
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_pending_tracks_maximum() {
        let mut stats = SchedulerStats::new();
        stats.observe_pending(3);
        stats.observe_pending(7);
        stats.observe_pending(2);
        assert_eq!(stats.peak_pending, 7);
    }

    #[test]
    fn test_csv_export() {
        let stats = SchedulerStats {
            executed: 4,
            rolled_back: 2,
            ..Default::default()
        };
        let csv = stats.to_csv();
        assert!(csv.starts_with("metric,value\n"));
        assert!(csv.contains("executed,4\n"));
        assert!(csv.contains("rolled_back,2\n"));
    }

    #[test]
    fn test_json_export() {
        let stats = SchedulerStats {
            scheduled: 10,
            ..Default::default()
        };
        let json = stats.to_json().unwrap();
        let restored: SchedulerStats = serde_json::from_str(&json).unwrap();
        assert_eq!(stats, restored);
    }

    #[test]
    fn test_summary() {
        let stats = SchedulerStats {
            updates: 5,
            ..Default::default()
        };
        let summary = stats.summary();
        assert!(summary.contains("Scheduler Statistics"));
        assert!(summary.contains("Component updates: 5"));
    }

    #[test]
    fn test_write_summary_matches_summary() {
        let stats = SchedulerStats {
            failed_stimuli: 2,
            ..Default::default()
        };
        let mut buf = Vec::new();
        stats.write_summary(&mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), stats.summary());
        assert!(stats.summary().contains("Failed scheduled writes: 2"));
        assert!(stats.to_csv().contains("failed_stimuli,2\n"));
    }
}
