use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::batch::Batch;
use crate::error::FlushError;
use crate::report::ErrorReporter;
use crate::sink::SinkWriter;
use crate::stats::LoggerStats;

/// Work item for the dispatcher queue.
pub(crate) enum Dispatch {
    /// A transformed batch, numbered in cut order.
    Batch { seq: u64, batch: Batch },
    /// Acknowledged once every item queued before it has been processed.
    Barrier(oneshot::Sender<()>),
}

/// Single consumer in front of the [`SinkWriter`].
///
/// Batches are taken from one FIFO queue and each write, retries
/// included, finishes before the next batch is looked at.
pub(crate) struct Dispatcher {
    writer: SinkWriter,
    reporter: Arc<dyn ErrorReporter>,
    stats: Arc<LoggerStats>,
}

impl Dispatcher {
    pub(crate) fn new(
        writer: SinkWriter,
        reporter: Arc<dyn ErrorReporter>,
        stats: Arc<LoggerStats>,
    ) -> Self {
        Dispatcher { writer, reporter, stats }
    }

    /// Spawn the worker. It exits once every sender is dropped and the
    /// queue is drained.
    pub(crate) fn spawn(self, mut rx: mpsc::UnboundedReceiver<Dispatch>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(item) = rx.recv().await {
                match item {
                    Dispatch::Batch { seq, batch } => self.write_batch(seq, batch).await,
                    Dispatch::Barrier(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
            tracing::debug!(path = %self.writer.path().display(), "dispatcher drained");
        })
    }

    async fn write_batch(&self, seq: u64, batch: Batch) {
        let bytes = match batch.into_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                let err = FlushError::Encode(e);
                self.reporter.report("error encoding log batch", &err);
                LoggerStats::incr(&self.stats.batches_failed);
                return;
            }
        };

        match self.writer.write(&bytes).await {
            Ok(()) => {
                tracing::trace!(seq, bytes = bytes.len(), "batch written");
                LoggerStats::incr(&self.stats.batches_written);
            }
            Err(e) => {
                tracing::error!(seq, error = %e, "dropping log batch");
                LoggerStats::incr(&self.stats.batches_failed);
            }
        }
    }
}
