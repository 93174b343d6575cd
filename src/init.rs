use crate::error::ConfigError;
use crate::logger::{FlushLogger, PipelineHandle};
use crate::sink::DEFAULT_MAX_ATTEMPTS;
use crate::transform::TransformChain;
use std::path::PathBuf;
use tokio::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Shortest batch window; smaller time limits, including zero, use it.
pub const MIN_TIME_LIMIT: Duration = Duration::from_millis(10);

/// What the pipeline does when a transform returns an error.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransformFailure {
    /// Report the error and stop cutting batches. Batches already queued
    /// are still written; later entries are rejected.
    #[default]
    Halt,
    /// Report the error, drop the offending batch and keep going.
    SkipBatch,
}

/// Logger configuration.
///
/// **Fields**
/// - `sink_path`: file the batches are appended to.
/// - `time_limit`: maximum time a batch stays open after the previous
///   cut. Values below [`MIN_TIME_LIMIT`] are raised to it.
/// - `entry_limit`: number of entries that closes a batch immediately.
/// - `max_attempts`: append attempts per batch before it is dropped.
/// - `retry_backoff`: pause before the second attempt, doubled for each
///   further attempt.
/// - `on_transform_error`: see [`TransformFailure`].
#[derive(Clone, Debug)]
pub struct LoggerConfig {
    pub sink_path: PathBuf,
    pub time_limit: Duration,
    pub entry_limit: usize,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    pub on_transform_error: TransformFailure,
}

impl LoggerConfig {
    /// Defaults: 2 s window, 20 entries, 3 attempts, 100 ms backoff.
    pub fn new(sink_path: impl Into<PathBuf>) -> Self {
        Self {
            sink_path: sink_path.into(),
            time_limit: Duration::from_millis(2000),
            entry_limit: 20,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: Duration::from_millis(100),
            on_transform_error: TransformFailure::Halt,
        }
    }

    pub fn with_time_limit(mut self, time_limit: Duration) -> Self {
        self.time_limit = time_limit;
        self
    }

    pub fn with_time_limit_ms(self, ms: u64) -> Self {
        self.with_time_limit(Duration::from_millis(ms))
    }

    /// Values below one are treated as one.
    pub fn with_entry_limit(mut self, entry_limit: usize) -> Self {
        self.entry_limit = entry_limit.max(1);
        self
    }

    /// Values below one are treated as one.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_transform_failure(mut self, policy: TransformFailure) -> Self {
        self.on_transform_error = policy;
        self
    }
}

/// Start a logger writing to `sink_path` with default limits.
///
/// **Returns**
/// - the producer handle and the pipeline handle used for shutdown.
/// - `Err(ConfigError::EmptySinkPath)` if the path is empty.
pub fn create_logger(
    sink_path: impl Into<PathBuf>,
    transforms: TransformChain,
) -> Result<(FlushLogger, PipelineHandle), ConfigError> {
    create_logger_with_config(LoggerConfig::new(sink_path), transforms)
}

/// Start a logger with an explicit [`LoggerConfig`].
pub fn create_logger_with_config(
    config: LoggerConfig,
    transforms: TransformChain,
) -> Result<(FlushLogger, PipelineHandle), ConfigError> {
    FlushLogger::spawn(config, transforms)
}

/// Install a global `tracing` subscriber that prints the crate's own
/// diagnostics (retries, dropped batches, transform failures).
///
/// With `enable_stdout = false` the registry is installed without any
/// output layer, which keeps diagnostics silent.
pub fn init_diagnostics(enable_stdout: bool) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    if enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
        tracing::subscriber::set_global_default(Registry::default().with(fmt_layer))
    } else {
        tracing::subscriber::set_global_default(Registry::default())
    }
}
