use crate::error::{BoxError, WriteError};
use crate::report::ErrorReporter;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::time::{sleep, Duration};

/// Marker appended to the sink after each failed attempt.
pub const RETRY_MARKER: &str = "ERROR! retrying..\n";

/// Default number of attempts per batch.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Physical append primitive: add `bytes` to the end of `path`.
///
/// The pipeline calls this from a single task and never concurrently, so
/// implementations need no locking of their own.
#[async_trait]
pub trait Append: Send + Sync {
    /// **Returns**
    /// - `Ok(())` once all bytes were handed to the destination.
    /// - `Err(..)` on any failure; the writer treats it as transient and
    ///   retries up to its attempt bound.
    async fn append(&self, path: &Path, bytes: &[u8]) -> Result<(), BoxError>;
}

/// Appends to a local file, creating it if needed. Holds no handle
/// between calls.
#[derive(Clone, Debug, Default)]
pub struct FileAppend;

#[async_trait]
impl Append for FileAppend {
    async fn append(&self, path: &Path, bytes: &[u8]) -> Result<(), BoxError> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Writes one payload at a time to the sink with bounded retry.
pub struct SinkWriter {
    path: PathBuf,
    appender: Arc<dyn Append>,
    reporter: Arc<dyn ErrorReporter>,
    max_attempts: u32,
    backoff: Duration,
    max_backoff: Duration,
}

impl SinkWriter {
    /// `max_attempts` is clamped to at least one.
    pub fn new(
        path: PathBuf,
        appender: Arc<dyn Append>,
        reporter: Arc<dyn ErrorReporter>,
        max_attempts: u32,
        backoff: Duration,
    ) -> Self {
        SinkWriter {
            path,
            appender,
            reporter,
            max_attempts: max_attempts.max(1),
            backoff,
            max_backoff: Duration::from_secs(10),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `bytes`, retrying on failure.
    ///
    /// Every failed attempt leaves a [`RETRY_MARKER`] in the sink. After the
    /// last attempt fails the error is reported and returned; the caller
    /// drops the batch.
    pub async fn write(&self, bytes: &[u8]) -> Result<(), WriteError> {
        let mut backoff = self.backoff.min(self.max_backoff);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let err = match self.appender.append(&self.path, bytes).await {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };

            tracing::warn!(
                path = %self.path.display(),
                attempt,
                max_attempts = self.max_attempts,
                error = %err,
                "sink append failed"
            );
            self.reporter.report("error writing log", &*err);
            if let Err(marker_err) = self.appender.append(&self.path, RETRY_MARKER.as_bytes()).await {
                tracing::debug!(error = %marker_err, "could not append retry marker");
            }

            if attempt >= self.max_attempts {
                let err = WriteError::Exhausted { attempts: attempt, source: err };
                self.reporter.report("log batch dropped", &err);
                return Err(err);
            }

            if !backoff.is_zero() {
                sleep(backoff).await;
                backoff = backoff.saturating_mul(2).min(self.max_backoff);
            }
        }
    }
}
