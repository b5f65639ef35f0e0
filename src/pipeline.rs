//! Multi-pass refinement: normalize, cluster, pick representatives, repeat at
//! the next (lower) threshold over the representatives of the previous pass.
//!
//! Every pass is handed to a [`PassSink`] before the next one starts, so a
//! run can be audited pass by pass.

use crate::matching::{Scorer, cluster, select_representatives};
use crate::models::{NameEntry, Score};
use crate::normalize::Normalizer;
use anyhow::Result;
use log::{debug, info};
use rayon::prelude::*;
use std::time::{Duration, Instant};

/// Receives each pass's output as soon as it is materialized.
pub trait PassSink {
    fn persist(&mut self, report: &PassReport, names: &[String]) -> Result<()>;
}

/// Discards every pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl PassSink for NoopSink {
    fn persist(&mut self, _report: &PassReport, _names: &[String]) -> Result<()> {
        Ok(())
    }
}

/// Keeps every pass in memory. Handy for tests and for callers that write later.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub passes: Vec<(PassReport, Vec<String>)>,
}

impl PassSink for MemorySink {
    fn persist(&mut self, report: &PassReport, names: &[String]) -> Result<()> {
        self.passes.push((report.clone(), names.to_vec()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    /// 1-based.
    pub pass: usize,
    pub threshold: Score,
    pub input: usize,
    /// Names dropped because nothing was left after normalization.
    pub skipped: usize,
    pub output: usize,
    pub duration: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    pub names: Vec<String>,
    pub passes: Vec<PassReport>,
}

#[derive(Debug, Clone)]
pub struct MultiPassPipeline {
    normalizer: Normalizer,
    scorer: Scorer,
}

impl MultiPassPipeline {
    pub fn new(normalizer: Normalizer, scorer: Scorer) -> Self {
        Self { normalizer, scorer }
    }

    /// One normalize, cluster, select round. `pass` is only used for reporting.
    pub fn run_pass<S>(&self, names: &[S], threshold: Score, pass: usize) -> (Vec<String>, PassReport)
    where
        S: AsRef<str> + Sync,
    {
        let start = Instant::now();
        let keyed: Vec<Option<NameEntry>> = names
            .par_iter()
            .map(|raw| {
                let raw = raw.as_ref();
                self.normalizer
                    .comparison_key(raw)
                    .map(|key| NameEntry::new(raw, key))
            })
            .collect();
        let skipped = keyed.iter().filter(|e| e.is_none()).count();
        if skipped > 0 {
            debug!("pass {}: {} names empty after normalization", pass, skipped);
        }

        let clusters = cluster(keyed.into_iter().flatten(), threshold, &self.scorer);
        let out = select_representatives(&clusters);
        let report = PassReport {
            pass,
            threshold,
            input: names.len(),
            skipped,
            output: out.len(),
            duration: start.elapsed(),
        };
        info!(
            "Pass {} (threshold {}): {} -> {} names ({} skipped) in {:.2?}",
            pass, threshold, report.input, report.output, skipped, report.duration
        );
        (out, report)
    }

    /// Run every threshold in order. Pass N+1 only starts after pass N was persisted.
    pub fn run<S, K>(&self, input: &[S], thresholds: &[Score], sink: &mut K) -> Result<PipelineOutput>
    where
        S: AsRef<str> + Sync,
        K: PassSink + ?Sized,
    {
        let mut current: Vec<String> = input.iter().map(|s| s.as_ref().to_string()).collect();
        let mut passes = Vec::with_capacity(thresholds.len());
        for (i, &threshold) in thresholds.iter().enumerate() {
            let (names, report) = self.run_pass(&current, threshold, i + 1);
            sink.persist(&report, &names)?;
            passes.push(report);
            current = names;
        }
        Ok(PipelineOutput {
            names: current,
            passes,
        })
    }
}
