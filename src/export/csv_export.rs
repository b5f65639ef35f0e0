use crate::models::{MatchResult, NameTable};
use crate::orchestrator::summary::RunSummary;
use crate::pipeline::{PassReport, PassSink};
use crate::screen::Discarded;
use anyhow::{Context, Result};
use csv::{Writer, WriterBuilder};
use log::info;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

fn writer(path: &Path) -> Result<Writer<BufWriter<File>>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let buf_writer = BufWriter::with_capacity(512 * 1024, file);
    Ok(WriterBuilder::new().from_writer(buf_writer))
}

/// Single-column name list under `column`.
pub fn write_names<S: AsRef<str>>(path: &Path, column: &str, names: &[S]) -> Result<()> {
    let mut w = writer(path)?;
    w.write_record([column])?;
    for n in names {
        w.write_record([n.as_ref()])?;
    }
    w.flush()?;
    info!("Wrote {} names to {}", names.len(), path.display());
    Ok(())
}

pub fn write_table(path: &Path, table: &NameTable) -> Result<()> {
    let mut w = writer(path)?;
    w.write_record(&table.headers)?;
    for row in &table.rows {
        w.write_record(row)?;
    }
    w.flush()?;
    info!("Wrote {} rows to {}", table.len(), path.display());
    Ok(())
}

pub fn write_discarded(path: &Path, column: &str, discarded: &[Discarded]) -> Result<()> {
    let mut w = writer(path)?;
    w.write_record([column, "REASON"])?;
    for d in discarded {
        let reason = d.reason.to_string();
        w.write_record([d.name.as_str(), reason.as_str()])?;
    }
    w.flush()?;
    Ok(())
}

/// Query, matched canonical name (empty when none) and score.
pub fn write_match_results(
    path: &Path,
    column: &str,
    output_column: &str,
    results: &[MatchResult],
) -> Result<()> {
    let mut w = writer(path)?;
    w.write_record([column, output_column, "SCORE"])?;
    for r in results {
        let (name, score) = match &r.matched {
            Some((name, score)) => (name.as_str(), score.to_string()),
            None => ("", String::new()),
        };
        w.write_record([r.query.as_str(), name, score.as_str()])?;
    }
    w.flush()?;
    info!("Wrote {} match results to {}", results.len(), path.display());
    Ok(())
}

pub fn export_summary_csv(path: &Path, ctx: &RunSummary) -> Result<()> {
    let mut w = writer(path)?;
    w.write_record(["Key", "Value"])?;

    let mut write_kv = |k: &str, v: String| -> Result<()> {
        w.write_record([k, v.as_str()])?;
        Ok(())
    };

    write_kv("Metric", ctx.metric.clone())?;
    write_kv(
        "Thresholds",
        ctx.thresholds
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(" > "),
    )?;
    write_kv("Input rows", ctx.input_rows.to_string())?;
    write_kv("Canonical names", ctx.canonical_names.to_string())?;

    for s in &ctx.stages {
        write_kv(&format!("{} processed", s.stage), s.processed.to_string())?;
        write_kv(&format!("{} matched", s.stage), s.matched.to_string())?;
        write_kv(&format!("{} unmatched", s.stage), s.unmatched.to_string())?;
        write_kv(&format!("{} skipped", s.stage), s.skipped.to_string())?;
        write_kv(
            &format!("{} duration (s)", s.stage),
            format!("{:.3}", s.duration.as_secs_f64()),
        )?;
    }

    write_kv("Memory used start (MB)", ctx.mem_start.used_mb.to_string())?;
    write_kv("Memory used end (MB)", ctx.mem_end.used_mb.to_string())?;
    write_kv("Memory growth (MB)", ctx.mem_end.growth_mb(&ctx.mem_start).to_string())?;
    write_kv("Started (UTC)", ctx.started_utc.to_rfc3339())?;
    write_kv("Ended (UTC)", ctx.ended_utc.to_rfc3339())?;
    write_kv("Duration (s)", format!("{:.3}", ctx.duration_secs()))?;

    w.flush()?;
    Ok(())
}

/// Persists each refinement pass as `pass_<n>_t<threshold>.csv` under `out_dir`.
#[derive(Debug, Clone)]
pub struct CsvPassWriter {
    out_dir: PathBuf,
    column: String,
    written: Vec<PathBuf>,
}

impl CsvPassWriter {
    pub fn new<P: Into<PathBuf>>(out_dir: P, column: &str) -> Self {
        Self {
            out_dir: out_dir.into(),
            column: column.to_string(),
            written: Vec::new(),
        }
    }

    pub fn path_for(&self, report: &PassReport) -> PathBuf {
        self.out_dir
            .join(format!("pass_{}_t{}.csv", report.pass, report.threshold))
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl PassSink for CsvPassWriter {
    fn persist(&mut self, report: &PassReport, names: &[String]) -> Result<()> {
        let path = self.path_for(report);
        write_names(&path, &self.column, names)?;
        self.written.push(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::summary::BatchSummary;
    use crate::screen::DiscardReason;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn names_round_trip_through_ingest() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("nested").join("names.csv");
        write_names(&p, "NOMBRE", &["PEREZ,JUAN", "O'BRIEN,SEAN"]).unwrap();
        let back = crate::ingest::read_name_column(&p, "NOMBRE").unwrap();
        assert_eq!(back, vec!["PEREZ,JUAN", "O'BRIEN,SEAN"]);
    }

    #[test]
    fn discarded_and_results_have_headers() {
        let dir = tempdir().unwrap();
        let d = dir.path().join("d.csv");
        write_discarded(
            &d,
            "NOMBRE",
            &[Discarded {
                name: "JUAN PEREZ".into(),
                reason: DiscardReason::MissingComma,
            }],
        )
        .unwrap();
        assert_eq!(
            fs::read_to_string(&d).unwrap(),
            "NOMBRE,REASON\nJUAN PEREZ,missing_comma\n"
        );

        let r = dir.path().join("r.csv");
        write_match_results(
            &r,
            "NOMBRE",
            "INVESTIGADOR",
            &[
                MatchResult {
                    query: "A".into(),
                    matched: Some(("B".into(), 90)),
                },
                MatchResult::no_match("C"),
            ],
        )
        .unwrap();
        assert_eq!(
            fs::read_to_string(&r).unwrap(),
            "NOMBRE,INVESTIGADOR,SCORE\nA,B,90\nC,,\n"
        );
    }

    #[test]
    fn pass_writer_names_files_by_pass_and_threshold() {
        let dir = tempdir().unwrap();
        let mut sink = CsvPassWriter::new(dir.path(), "NOMBRE");
        let report = PassReport {
            pass: 2,
            threshold: 75,
            input: 3,
            skipped: 0,
            output: 1,
            duration: Duration::ZERO,
        };
        sink.persist(&report, &["X,Y".to_string()]).unwrap();
        assert_eq!(sink.written(), &[dir.path().join("pass_2_t75.csv")]);
        assert!(dir.path().join("pass_2_t75.csv").exists());
    }

    #[test]
    fn summary_is_key_value() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("summary.csv");
        let mut s = RunSummary::start("ratio", &[85, 75]);
        s.record(BatchSummary::new("screen", Duration::from_millis(5)).with_counts(3, 2, 1, 0));
        s.finish();
        export_summary_csv(&p, &s).unwrap();
        let text = fs::read_to_string(&p).unwrap();
        assert!(text.starts_with("Key,Value\nMetric,ratio\nThresholds,85 > 75\n"));
        assert!(text.contains("screen processed,3\n"));
        assert!(text.contains("screen unmatched,1\n"));
    }
}
