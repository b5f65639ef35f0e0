// Similarity metrics and best-match queries
pub mod similarity;

// Single-linkage-to-seed grouping
pub mod cluster;

// Longest-member representative per cluster
pub mod representative;

// Residual, last-chance and surname-first matching against a canonical list
pub mod residual;

mod parallel;
pub(crate) use parallel::fan_out;

pub use cluster::cluster;
pub use representative::{select_representative, select_representatives};
pub use residual::{CanonicalIndex, LastChanceOutcome, MatchOutcome, ResidualMatcher};
pub use similarity::{Hit, Metric, Scorer};
