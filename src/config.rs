use crate::error::ConfigError;
use crate::matching::{Metric, ResidualMatcher, Scorer};
use crate::models::{Score, SplitPolicy};
use crate::normalize::{Normalizer, SubstitutionTable};
use crate::pipeline::MultiPassPipeline;
use serde::{Deserialize, Serialize};

pub const DEFAULT_NAME_COLUMN: &str = "NOMBRE DEL INVESTIGADOR";
pub const DEFAULT_OUTPUT_COLUMN: &str = "INVESTIGADOR";

/// Everything a run needs, built once and passed by reference.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct PipelineConfig {
    /// Multi-pass thresholds, applied in order.
    pub thresholds: Vec<Score>,
    /// Cutoff for the last-chance pass over the residual queue.
    pub residual_cutoff: Score,
    /// Cutoff for dataset assignment.
    pub assign_cutoff: Score,
    /// 100 means exact surname equality.
    pub surname_cutoff: Score,
    pub name_cutoff: Score,
    #[serde(default)]
    pub metric: Metric,
    #[serde(default)]
    pub substitutions: SubstitutionTable,
    pub name_column: String,
    pub output_column: String,
    #[serde(default)]
    pub split_policy: SplitPolicy,
    /// Seed count from which the clusterer scores seeds in parallel.
    pub parallel_seed_threshold: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            thresholds: vec![85, 75],
            residual_cutoff: 85,
            assign_cutoff: 75,
            surname_cutoff: 100,
            name_cutoff: 85,
            metric: Metric::default(),
            substitutions: SubstitutionTable::default(),
            name_column: DEFAULT_NAME_COLUMN.to_string(),
            output_column: DEFAULT_OUTPUT_COLUMN.to_string(),
            split_policy: SplitPolicy::default(),
            parallel_seed_threshold: 256,
        }
    }
}

fn check_score(field: &'static str, v: Score) -> Result<(), ConfigError> {
    if v > 100 {
        return Err(ConfigError::InvalidValue {
            field,
            reason: format!("{} not in 0..=100", v),
        });
    }
    Ok(())
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thresholds.is_empty() {
            return Err(ConfigError::MissingField {
                field: "thresholds",
            });
        }
        for &t in &self.thresholds {
            check_score("thresholds", t)?;
        }
        check_score("residual_cutoff", self.residual_cutoff)?;
        check_score("assign_cutoff", self.assign_cutoff)?;
        check_score("surname_cutoff", self.surname_cutoff)?;
        check_score("name_cutoff", self.name_cutoff)?;

        if self.name_column.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "name_column",
            });
        }
        if self.output_column.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "output_column",
            });
        }
        if self.name_column == self.output_column {
            return Err(ConfigError::InvalidValue {
                field: "output_column",
                reason: format!("must differ from name_column ({:?})", self.name_column),
            });
        }
        if self.parallel_seed_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "parallel_seed_threshold",
                reason: "must be > 0".into(),
            });
        }
        if let Some(p) = self.substitutions.pairs().iter().find(|p| p.bad.is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "substitutions",
                reason: format!("empty pattern for replacement {:?}", p.good),
            });
        }
        Ok(())
    }

    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(&self.substitutions)
    }

    pub fn scorer(&self) -> Scorer {
        Scorer::new(self.metric).with_parallel_min(self.parallel_seed_threshold)
    }

    pub fn pipeline(&self) -> MultiPassPipeline {
        MultiPassPipeline::new(self.normalizer(), self.scorer())
    }

    pub fn residual_matcher(&self) -> ResidualMatcher {
        ResidualMatcher::new(self.normalizer(), self.scorer(), self.split_policy)
    }
}
