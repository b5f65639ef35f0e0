use crate::config::{DEFAULT_NAME_COLUMN, DEFAULT_OUTPUT_COLUMN, PipelineConfig};
use crate::ingest::load_substitutions;
use crate::matching::Metric;
use crate::models::{Score, SplitPolicy};
use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, ValueEnum, Debug)]
pub enum MetricOpt {
    Ratio,
    Levenshtein,
    TokenSet,
}

impl MetricOpt {
    pub fn as_str(&self) -> &'static str {
        self.metric().as_str()
    }

    pub fn metric(&self) -> Metric {
        match self {
            Self::Ratio => Metric::Ratio,
            Self::Levenshtein => Metric::Levenshtein,
            Self::TokenSet => Metric::TokenSet,
        }
    }
}

impl std::fmt::Display for MetricOpt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, ValueEnum, Debug)]
pub enum SplitPolicyOpt {
    HeuristicFallback,
    CommaOnly,
}

impl SplitPolicyOpt {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HeuristicFallback => "heuristic-fallback",
            Self::CommaOnly => "comma-only",
        }
    }

    pub fn policy(&self) -> SplitPolicy {
        match self {
            Self::HeuristicFallback => SplitPolicy::HeuristicFallback,
            Self::CommaOnly => SplitPolicy::CommaOnly,
        }
    }
}

impl std::fmt::Display for SplitPolicyOpt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn score_parser() -> clap::builder::RangedI64ValueParser<u8> {
    clap::value_parser!(u8).range(0..=100)
}

/// Flags shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Column holding the raw names (env: NAME_CANON_NAME_COLUMN)
    #[arg(long, global = true, env = "NAME_CANON_NAME_COLUMN", default_value = DEFAULT_NAME_COLUMN)]
    pub name_column: String,
    /// Column receiving the canonical name (env: NAME_CANON_OUTPUT_COLUMN)
    #[arg(long, global = true, env = "NAME_CANON_OUTPUT_COLUMN", default_value = DEFAULT_OUTPUT_COLUMN)]
    pub output_column: String,
    /// Similarity metric (env: NAME_CANON_METRIC)
    #[arg(long, global = true, env = "NAME_CANON_METRIC", default_value_t = MetricOpt::Ratio)]
    pub metric: MetricOpt,
    /// bad,good CSV replacing the built-in glyph substitutions (env: NAME_CANON_SUBSTITUTIONS)
    #[arg(long, global = true, value_name = "CSV", env = "NAME_CANON_SUBSTITUTIONS")]
    pub substitutions: Option<PathBuf>,
    /// How names without a comma are split (env: NAME_CANON_SPLIT_POLICY)
    #[arg(long, global = true, env = "NAME_CANON_SPLIT_POLICY", default_value_t = SplitPolicyOpt::HeuristicFallback)]
    pub split_policy: SplitPolicyOpt,
    /// Surname score needed in the surname-first stage; 100 = exact (env: NAME_CANON_SURNAME_CUTOFF)
    #[arg(long, global = true, env = "NAME_CANON_SURNAME_CUTOFF", default_value_t = 100, value_parser = score_parser())]
    pub surname_cutoff: Score,
    /// Firstname score needed in the surname-first stage (env: NAME_CANON_NAME_CUTOFF)
    #[arg(long, global = true, env = "NAME_CANON_NAME_CUTOFF", default_value_t = 85, value_parser = score_parser())]
    pub name_cutoff: Score,
    /// Worker threads; defaults to all cores (env: NAME_CANON_THREADS)
    #[arg(long, global = true, env = "NAME_CANON_THREADS")]
    pub threads: Option<usize>,
    /// Seed count from which the clusterer scores seeds in parallel (env: NAME_CANON_PARALLEL_SEEDS)
    #[arg(long, global = true, env = "NAME_CANON_PARALLEL_SEEDS", default_value_t = 256)]
    pub parallel_seeds: usize,
    /// More log output (repeatable)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
    /// Less log output (repeatable)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub quiet: u8,
}

impl CommonArgs {
    pub fn verbosity(&self) -> i8 {
        let v = self.verbose.min(i8::MAX as u8) as i8;
        let q = self.quiet.min(i8::MAX as u8) as i8;
        v.saturating_sub(q)
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Split names into a clean canonical candidate list and a residual queue
    Screen {
        #[arg(long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
        #[arg(long)]
        out_dir: PathBuf,
    },
    /// Multi-pass clustering of a name list at decreasing thresholds
    Refine {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out_dir: PathBuf,
        /// Repeat or comma-separate (env: NAME_CANON_THRESHOLDS)
        #[arg(long = "threshold", env = "NAME_CANON_THRESHOLDS", value_delimiter = ',', default_values_t = [85u8, 75], value_parser = score_parser())]
        thresholds: Vec<Score>,
    },
    /// Last-chance matching of names against a canonical list
    Residual {
        #[arg(long)]
        query: PathBuf,
        #[arg(long)]
        canonical: PathBuf,
        #[arg(long)]
        out: PathBuf,
        /// (env: NAME_CANON_RESIDUAL_CUTOFF)
        #[arg(long, env = "NAME_CANON_RESIDUAL_CUTOFF", default_value_t = 85, value_parser = score_parser())]
        cutoff: Score,
    },
    /// Attach the best canonical name to every row of a dataset
    Assign {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        canonical: PathBuf,
        #[arg(long)]
        out: PathBuf,
        /// (env: NAME_CANON_ASSIGN_CUTOFF)
        #[arg(long, env = "NAME_CANON_ASSIGN_CUTOFF", default_value_t = 75, value_parser = score_parser())]
        cutoff: Score,
    },
    /// Fold unassigned names of an assigned dataset into the canonical list
    Reconcile {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        canonical: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Full batch: screen, refine, last chance, assign, reconcile
    Run {
        #[arg(long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
        #[arg(long)]
        out_dir: PathBuf,
        #[arg(long = "threshold", env = "NAME_CANON_THRESHOLDS", value_delimiter = ',', default_values_t = [85u8, 75], value_parser = score_parser())]
        thresholds: Vec<Score>,
        #[arg(long, env = "NAME_CANON_RESIDUAL_CUTOFF", default_value_t = 85, value_parser = score_parser())]
        residual_cutoff: Score,
        #[arg(long, env = "NAME_CANON_ASSIGN_CUTOFF", default_value_t = 75, value_parser = score_parser())]
        assign_cutoff: Score,
    },
    /// Write a commented .env template
    EnvTemplate {
        #[arg(default_value = ".env.template")]
        path: PathBuf,
    },
}

#[derive(Parser, Debug)]
#[command(
    name = "name_canon",
    version,
    about = "Canonicalize noisy person-name lists (CLI)",
    disable_help_subcommand = true
)]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonArgs,
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Build and validate the run configuration. Loads the substitution file when one is given.
    pub fn to_config(&self) -> Result<PipelineConfig> {
        let c = &self.common;
        let mut cfg = PipelineConfig {
            metric: c.metric.metric(),
            name_column: c.name_column.clone(),
            output_column: c.output_column.clone(),
            split_policy: c.split_policy.policy(),
            surname_cutoff: c.surname_cutoff,
            name_cutoff: c.name_cutoff,
            parallel_seed_threshold: c.parallel_seeds,
            ..Default::default()
        };
        if let Some(path) = &c.substitutions {
            cfg.substitutions = load_substitutions(path)?;
        }
        match &self.command {
            Command::Refine { thresholds, .. } => cfg.thresholds = thresholds.clone(),
            Command::Residual { cutoff, .. } => cfg.residual_cutoff = *cutoff,
            Command::Assign { cutoff, .. } => cfg.assign_cutoff = *cutoff,
            Command::Run {
                thresholds,
                residual_cutoff,
                assign_cutoff,
                ..
            } => {
                cfg.thresholds = thresholds.clone();
                cfg.residual_cutoff = *residual_cutoff;
                cfg.assign_cutoff = *assign_cutoff;
            }
            Command::Screen { .. } | Command::Reconcile { .. } | Command::EnvTemplate { .. } => {}
        }
        cfg.validate()?;
        Ok(cfg)
    }
}
