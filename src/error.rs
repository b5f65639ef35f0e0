use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("input source {path} is missing column {column:?}")]
    MissingColumn { path: String, column: String },
    #[error("input source not found: {path}")]
    MissingInput { path: String },
}

/// Per-record problems. These are absorbed by the batch and only surface as counts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("no comma separator in {0:?}")]
    AmbiguousSplit(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("worker failed on query {index}: {reason}")]
    WorkerFailure { index: usize, reason: String },
}
