//! Orchestrator module: file-level workflow coordination.
//!
//! Each public method reads its inputs through `ingest`, runs one core stage
//! and writes its outputs through `export`. [`Orchestrator::run`] chains all
//! of them:
//!
//! 1. read and merge the input files (name column required)
//! 2. screen the names into a clean list and a residual queue
//! 3. multi-pass refinement of the clean list, every pass persisted
//! 4. last-chance matching of the residual queue against the refined list
//! 5. assignment of the merged dataset
//! 6. reconciliation of unassigned names into the canonical list
//!
//! Per-record problems only show up as counts in the [`summary::RunSummary`];
//! configuration problems abort before any work starts.

pub mod summary;

use crate::assign::{AssignOutcome, assign};
use crate::config::PipelineConfig;
use crate::error::ConfigError;
use crate::export::{
    CsvPassWriter, export_summary_csv, write_discarded, write_match_results, write_names,
    write_table,
};
use crate::ingest::{read_name_column, read_table, read_tables};
use crate::matching::LastChanceOutcome;
use crate::models::{NameTable, Score};
use crate::pipeline::PipelineOutput;
use crate::reconcile::{ReconcileOutcome, reconcile};
use crate::screen::{ScreenOutcome, screen};
use anyhow::Result;
use log::info;
use std::path::{Path, PathBuf};
use std::time::Instant;
use summary::{BatchSummary, RunSummary};

pub const CLEAN_FILE: &str = "clean.csv";
pub const DISCARDED_FILE: &str = "discarded.csv";
pub const CANONICAL_FILE: &str = "canonical_final.csv";
pub const ASSIGNED_FILE: &str = "dataset_assigned.csv";
pub const UNMATCHED_FILE: &str = "unmatched.csv";
pub const SUMMARY_FILE: &str = "summary.csv";

/// Paths written by a full run.
#[derive(Debug, Clone, Default)]
pub struct RunArtifacts {
    pub passes: Vec<PathBuf>,
    pub discarded: PathBuf,
    pub canonical: PathBuf,
    pub assigned: PathBuf,
    pub unmatched: PathBuf,
    pub summary: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: RunSummary,
    pub artifacts: RunArtifacts,
    pub canonical: Vec<String>,
    pub unmatched: Vec<String>,
}

pub struct Orchestrator<'a> {
    cfg: &'a PipelineConfig,
}

impl<'a> Orchestrator<'a> {
    /// Fails fast on an invalid configuration.
    pub fn new(cfg: &'a PipelineConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    /// Screen the name column of every input into `clean.csv` and `discarded.csv`.
    pub fn screen<P: AsRef<Path>>(&self, inputs: &[P], out_dir: &Path) -> Result<ScreenOutcome> {
        let table = read_tables(inputs, &self.cfg.name_column)?;
        let outcome = self.screen_table(&table)?;
        write_names(&out_dir.join(CLEAN_FILE), &self.cfg.name_column, &outcome.clean)?;
        write_discarded(
            &out_dir.join(DISCARDED_FILE),
            &self.cfg.name_column,
            &outcome.discarded,
        )?;
        Ok(outcome)
    }

    /// Multi-pass refinement of a name list; writes every pass and `canonical_final.csv`.
    pub fn refine(&self, input: &Path, out_dir: &Path, thresholds: &[Score]) -> Result<PipelineOutput> {
        let names = read_name_column(input, &self.cfg.name_column)?;
        let mut sink = CsvPassWriter::new(out_dir, &self.cfg.name_column);
        let out = self.cfg.pipeline().run(&names, thresholds, &mut sink)?;
        write_names(&out_dir.join(CANONICAL_FILE), &self.cfg.name_column, &out.names)?;
        Ok(out)
    }

    /// Last-chance matching of `query` names against a canonical list file.
    pub fn residual(&self, query: &Path, canonical: &Path, out: &Path, cutoff: Score) -> Result<LastChanceOutcome> {
        let queries = read_name_column(query, &self.cfg.name_column)?;
        let canonical = read_name_column(canonical, &self.cfg.name_column)?;
        let matcher = self.cfg.residual_matcher();
        let index = matcher.index(&canonical);
        let outcome = matcher.last_chance(&queries, &index, cutoff);
        write_match_results(
            out,
            &self.cfg.name_column,
            &self.cfg.output_column,
            &outcome.outcome.results,
        )?;
        Ok(outcome)
    }

    /// Assign a canonical name to every row of a dataset file.
    pub fn assign(&self, input: &Path, canonical: &Path, out: &Path, cutoff: Score) -> Result<AssignOutcome> {
        let table = read_table(input)?;
        let canonical = read_name_column(canonical, &self.cfg.name_column)?;
        let outcome = self.assign_table(&table, &canonical, cutoff)?;
        write_table(out, &outcome.table)?;
        Ok(outcome)
    }

    /// Fold unassigned names of an assigned dataset into the canonical list; writes the updated list.
    pub fn reconcile(&self, input: &Path, canonical: &Path, out: &Path) -> Result<ReconcileOutcome> {
        let table = read_table(input)?;
        let canonical = read_name_column(canonical, &self.cfg.name_column)?;
        let outcome = self.reconcile_table(&table, &canonical)?;
        write_names(out, &self.cfg.name_column, &outcome.canonical)?;
        Ok(outcome)
    }

    /// Full batch over `inputs`, all artifacts under `out_dir`.
    pub fn run<P: AsRef<Path>>(&self, inputs: &[P], out_dir: &Path) -> Result<RunReport> {
        let cfg = self.cfg;
        let mut summary = RunSummary::start(cfg.metric.as_str(), &cfg.thresholds);
        info!(
            "Starting run over {} input file(s) into {}",
            inputs.len(),
            out_dir.display()
        );

        let dataset = read_tables(inputs, &cfg.name_column)?;
        summary.input_rows = dataset.len();

        // screen
        let t0 = Instant::now();
        let screened = self.screen_table(&dataset)?;
        summary.record(
            BatchSummary::new("screen", t0.elapsed()).with_counts(
                dataset.len(),
                screened.clean.len(),
                screened.discarded.len(),
                screened.skipped,
            ),
        );
        let discarded_path = out_dir.join(DISCARDED_FILE);
        write_discarded(&discarded_path, &cfg.name_column, &screened.discarded)?;

        // refine
        let mut sink = CsvPassWriter::new(out_dir, &cfg.name_column);
        let refined = cfg.pipeline().run(&screened.clean, &cfg.thresholds, &mut sink)?;
        for p in &refined.passes {
            summary.record(
                BatchSummary::new(&format!("pass_{}_t{}", p.pass, p.threshold), p.duration)
                    .with_counts(p.input, p.output, 0, p.skipped),
            );
        }

        // last chance over the residual queue
        let t0 = Instant::now();
        let matcher = cfg.residual_matcher();
        let index = matcher.index(&refined.names);
        let residual: Vec<&str> = screened.discarded.iter().map(|d| d.name.as_str()).collect();
        let last = matcher.last_chance(&residual, &index, cfg.residual_cutoff);
        let unmatched = last.outcome.unmatched();
        summary.record(
            BatchSummary::new("last_chance", t0.elapsed()).with_counts(
                residual.len(),
                last.outcome.matched_count(),
                unmatched.len(),
                last.outcome.skipped,
            ),
        );

        // assign
        let t0 = Instant::now();
        let assigned = self.assign_table(&dataset, &refined.names, cfg.assign_cutoff)?;
        summary.record(
            BatchSummary::new("assign", t0.elapsed()).with_counts(
                dataset.len(),
                assigned.matched,
                assigned.unmatched,
                assigned.skipped,
            ),
        );

        // reconcile
        let t0 = Instant::now();
        let reconciled = self.reconcile_table(&assigned.table, &refined.names)?;
        summary.record(
            BatchSummary::new("reconcile", t0.elapsed()).with_counts(
                reconciled.candidates.len(),
                reconciled.matches.matched_count(),
                reconciled.added.len(),
                reconciled.matches.skipped,
            ),
        );

        let artifacts = RunArtifacts {
            passes: sink.written().to_vec(),
            discarded: discarded_path,
            canonical: out_dir.join(CANONICAL_FILE),
            assigned: out_dir.join(ASSIGNED_FILE),
            unmatched: out_dir.join(UNMATCHED_FILE),
            summary: out_dir.join(SUMMARY_FILE),
        };
        write_names(&artifacts.canonical, &cfg.name_column, &reconciled.canonical)?;
        write_table(&artifacts.assigned, &assigned.table)?;
        write_names(&artifacts.unmatched, &cfg.name_column, &unmatched)?;

        summary.canonical_names = reconciled.canonical.len();
        summary.finish();
        export_summary_csv(&artifacts.summary, &summary)?;

        Ok(RunReport {
            summary,
            artifacts,
            canonical: reconciled.canonical,
            unmatched,
        })
    }

    fn screen_table(&self, table: &NameTable) -> Result<ScreenOutcome, ConfigError> {
        let col = table
            .column_index(&self.cfg.name_column)
            .ok_or_else(|| ConfigError::MissingColumn {
                path: "dataset".to_string(),
                column: self.cfg.name_column.clone(),
            })?;
        let names = table
            .rows
            .iter()
            .map(|r| r.get(col).map(String::as_str).unwrap_or_default());
        Ok(screen(names, &self.cfg.normalizer()))
    }

    fn assign_table<S: AsRef<str>>(
        &self,
        table: &NameTable,
        canonical: &[S],
        cutoff: Score,
    ) -> Result<AssignOutcome, ConfigError> {
        let matcher = self.cfg.residual_matcher();
        let index = matcher.index(canonical);
        assign(
            table,
            &self.cfg.name_column,
            &self.cfg.output_column,
            &matcher,
            &index,
            cutoff,
        )
    }

    fn reconcile_table<S: AsRef<str>>(
        &self,
        table: &NameTable,
        canonical: &[S],
    ) -> Result<ReconcileOutcome, ConfigError> {
        reconcile(
            table,
            &self.cfg.name_column,
            &self.cfg.output_column,
            canonical,
            &self.cfg.residual_matcher(),
            self.cfg.surname_cutoff,
            self.cfg.name_cutoff,
        )
    }
}
