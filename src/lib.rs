pub mod assign;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod ingest;
pub mod logging;
pub mod matching;
pub mod metrics;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod pipeline;
pub mod reconcile;
pub mod screen;
pub mod util;

pub use config::PipelineConfig;
pub use matching::{Metric, Scorer};
pub use normalize::{Normalizer, SubstitutionTable};
pub use pipeline::MultiPassPipeline;
