//! Per-stage audit counts for a batch run.

use crate::metrics::MemorySnapshot;
use chrono::{DateTime, Utc};
use log::info;
use std::time::Duration;

/// Counts for one stage, enough to see where names were lost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub stage: String,
    pub processed: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub skipped: usize,
    pub duration: Duration,
}

impl BatchSummary {
    pub fn new(stage: &str, duration: Duration) -> Self {
        Self {
            stage: stage.to_string(),
            processed: 0,
            matched: 0,
            unmatched: 0,
            skipped: 0,
            duration,
        }
    }

    pub fn with_counts(mut self, processed: usize, matched: usize, unmatched: usize, skipped: usize) -> Self {
        self.processed = processed;
        self.matched = matched;
        self.unmatched = unmatched;
        self.skipped = skipped;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub stages: Vec<BatchSummary>,
    pub metric: String,
    pub thresholds: Vec<u8>,
    pub input_rows: usize,
    pub canonical_names: usize,
    pub mem_start: MemorySnapshot,
    pub mem_end: MemorySnapshot,
    pub started_utc: DateTime<Utc>,
    pub ended_utc: DateTime<Utc>,
}

impl RunSummary {
    /// Stamp the start time and memory baseline.
    pub fn start(metric: &str, thresholds: &[u8]) -> Self {
        let now = Utc::now();
        Self {
            stages: Vec::new(),
            metric: metric.to_string(),
            thresholds: thresholds.to_vec(),
            input_rows: 0,
            canonical_names: 0,
            mem_start: MemorySnapshot::take(),
            mem_end: MemorySnapshot::default(),
            started_utc: now,
            ended_utc: now,
        }
    }

    pub fn record(&mut self, stage: BatchSummary) {
        info!(
            "[{}] processed={} matched={} unmatched={} skipped={} in {:.2?}",
            stage.stage, stage.processed, stage.matched, stage.unmatched, stage.skipped, stage.duration
        );
        self.stages.push(stage);
    }

    pub fn finish(&mut self) {
        self.ended_utc = Utc::now();
        self.mem_end = MemorySnapshot::take();
        info!(
            "Run finished in {:.2}s: {} input rows, {} canonical names, mem {} -> {} MB ({:+} MB)",
            self.duration_secs(),
            self.input_rows,
            self.canonical_names,
            self.mem_start.used_mb,
            self.mem_end.used_mb,
            self.mem_end.growth_mb(&self.mem_start)
        );
    }

    pub fn duration_secs(&self) -> f64 {
        (self.ended_utc - self.started_utc).num_milliseconds() as f64 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_stages_in_order() {
        let mut s = RunSummary::start("ratio", &[85, 75]);
        s.record(BatchSummary::new("screen", Duration::ZERO).with_counts(10, 8, 2, 0));
        s.record(BatchSummary::new("pass_1", Duration::ZERO).with_counts(8, 6, 0, 0));
        s.finish();
        assert_eq!(s.stages.len(), 2);
        assert_eq!(s.stages[0].stage, "screen");
        assert!(s.duration_secs() >= 0.0);
        assert!(s.ended_utc >= s.started_utc);
    }
}
