use std::error::Error;

/// Boxed error used at the pluggable seams (appenders, transforms).
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Error returned when a logger cannot be constructed from its
/// configuration. Always fatal: nothing is spawned when this is returned.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid log path: sink path must not be empty")]
    EmptySinkPath,

    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),

    #[error("environment variable {key} has invalid value {value:?}")]
    InvalidEnv {
        key: &'static str,
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Final failure of a batch write after every attempt was used up.
#[derive(thiserror::Error, Debug)]
pub enum WriteError {
    #[error("append to sink failed after {attempts} attempt(s)")]
    Exhausted {
        attempts: u32,
        #[source]
        source: BoxError,
    },
}

/// Error raised by a caller-supplied batch transform.
#[derive(thiserror::Error, Debug)]
#[error("batch transform failed: {0}")]
pub struct TransformError(#[source] pub BoxError);

impl TransformError {
    pub fn new(err: impl Into<BoxError>) -> Self {
        TransformError(err.into())
    }
}

/// Terminal or per-call failure of the pipeline as seen by the owner of
/// the logger. Producers calling `emit` never see this type.
#[derive(thiserror::Error, Debug)]
pub enum FlushError {
    #[error("pipeline halted by transform error on batch #{batch}")]
    Transform {
        batch: u64,
        #[source]
        source: TransformError,
    },

    #[error("failed to encode batch as JSON lines")]
    Encode(#[from] serde_json::Error),

    #[error("logging pipeline is closed")]
    Closed,

    #[error("pipeline task failed")]
    Join(#[from] tokio::task::JoinError),
}
