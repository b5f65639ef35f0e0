use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};

use name_canon::cli::{Cli, Command};
use name_canon::error::ConfigError;
use name_canon::logging::init_logging;
use name_canon::orchestrator::Orchestrator;
use name_canon::util::envfile::{load_dotenv_if_present, write_env_template};

fn main() {
    // .env has to be in the environment before clap reads its env fallbacks
    if let Err(e) = load_dotenv_if_present() {
        eprintln!("Warning: could not read .env: {:#}", e);
    }
    let cli = Cli::parse();
    init_logging(cli.common.verbosity());

    if let Err(e) = run(cli) {
        error!("{:#}", e);
        let code = if e.downcast_ref::<ConfigError>().is_some() {
            2
        } else {
            1
        };
        std::process::exit(code);
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Command::EnvTemplate { path } = &cli.command {
        write_env_template(path)?;
        println!(
            "Wrote {}. Copy to .env and edit values as needed.",
            path.display()
        );
        return Ok(());
    }

    if let Some(n) = cli.common.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .context("building worker pool")?;
        info!("Using {} worker threads", n);
    }

    let cfg = cli.to_config()?;
    let orch = Orchestrator::new(&cfg)?;
    match &cli.command {
        Command::Screen { input, out_dir } => {
            let out = orch.screen(input, out_dir)?;
            println!(
                "clean={} discarded={} skipped={}",
                out.clean.len(),
                out.discarded.len(),
                out.skipped
            );
        }
        Command::Refine {
            input,
            out_dir,
            thresholds,
        } => {
            let out = orch.refine(input, out_dir, thresholds)?;
            for p in &out.passes {
                println!("pass {} (t{}): {} -> {}", p.pass, p.threshold, p.input, p.output);
            }
        }
        Command::Residual {
            query,
            canonical,
            out,
            cutoff,
        } => {
            let res = orch.residual(query, canonical, out, *cutoff)?;
            println!(
                "matched={} (recovered by reordering: {}) unmatched={} skipped={}",
                res.outcome.matched_count(),
                res.recovered,
                res.outcome.unmatched_count(),
                res.outcome.skipped
            );
        }
        Command::Assign {
            input,
            canonical,
            out,
            cutoff,
        } => {
            let res = orch.assign(input, canonical, out, *cutoff)?;
            println!(
                "matched={} unmatched={} skipped={}",
                res.matched, res.unmatched, res.skipped
            );
        }
        Command::Reconcile {
            input,
            canonical,
            out,
        } => {
            let res = orch.reconcile(input, canonical, out)?;
            println!(
                "candidates={} added={} canonical={}",
                res.candidates.len(),
                res.added.len(),
                res.canonical.len()
            );
        }
        Command::Run { input, out_dir, .. } => {
            let report = orch.run(input, out_dir)?;
            if report.summary.stages.iter().any(|s| s.skipped > 0) {
                warn!("Some rows were skipped; see {}", report.artifacts.summary.display());
            }
            println!(
                "canonical={} unmatched={} summary={}",
                report.canonical.len(),
                report.unmatched.len(),
                report.artifacts.summary.display()
            );
        }
        Command::EnvTemplate { .. } => {}
    }
    Ok(())
}
