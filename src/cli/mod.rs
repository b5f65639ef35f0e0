//! CLI module: clap-based argument parsing and conversion into a validated
//! [`PipelineConfig`](crate::config::PipelineConfig).
//!
//! Every flag also reads a `NAME_CANON_*` environment variable, so a `.env`
//! file (see `util::envfile`) can hold a site's defaults.

mod clap_parser;

pub use clap_parser::{Cli, Command, CommonArgs, MetricOpt, SplitPolicyOpt};
