use crate::accumulator::Accumulator;
use crate::batch::{Batch, CutReason};
use crate::dispatch::{Dispatch, Dispatcher};
use crate::entry::{Entry, DEFAULT_IDENTIFIER};
use crate::error::{ConfigError, FlushError};
use crate::init::{LoggerConfig, TransformFailure, MIN_TIME_LIMIT};
use crate::report::{ErrorReporter, TracingReporter};
use crate::sink::{Append, FileAppend, SinkWriter};
use crate::stats::{LoggerStats, StatsSnapshot};
use crate::transform::TransformChain;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

/// Messages from producers to the accumulator task.
enum Command {
    Entry(Entry),
    Flush(oneshot::Sender<()>),
    Shutdown,
}

/// Producer-facing handle of a batching file logger.
///
/// Cheap to clone and safe to use from any number of tasks or threads.
/// `emit` only pushes onto an unbounded channel, so callers never wait on
/// disk I/O and never see a failure.
#[derive(Clone)]
pub struct FlushLogger {
    sender: mpsc::UnboundedSender<Command>,
    stats: Arc<LoggerStats>,
}

/// Owner side of a running pipeline, returned next to the first
/// [`FlushLogger`]. Use [`PipelineHandle::shutdown`] to drain it.
pub struct PipelineHandle {
    sender: mpsc::UnboundedSender<Command>,
    accumulator: JoinHandle<Result<(), FlushError>>,
    dispatcher: JoinHandle<()>,
}

impl FlushLogger {
    /// Start a pipeline that appends to `config.sink_path` on the local
    /// filesystem and reports failures through `tracing`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(
        config: LoggerConfig,
        transforms: TransformChain,
    ) -> Result<(Self, PipelineHandle), ConfigError> {
        Self::spawn_with(config, transforms, Arc::new(FileAppend), Arc::new(TracingReporter))
    }

    /// Like [`FlushLogger::spawn`] with a custom append primitive and
    /// error reporter.
    pub fn spawn_with(
        config: LoggerConfig,
        transforms: TransformChain,
        appender: Arc<dyn Append>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Result<(Self, PipelineHandle), ConfigError> {
        if config.sink_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptySinkPath);
        }

        let stats = Arc::new(LoggerStats::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();

        let writer = SinkWriter::new(
            config.sink_path.clone(),
            appender,
            Arc::clone(&reporter),
            config.max_attempts,
            config.retry_backoff,
        );
        let dispatcher =
            Dispatcher::new(writer, Arc::clone(&reporter), Arc::clone(&stats)).spawn(dispatch_rx);

        // A zero window would spin on empty timer cuts.
        let window = config.time_limit.max(MIN_TIME_LIMIT);
        let pipeline = Pipeline {
            acc: Accumulator::new(config.entry_limit, window, Instant::now()),
            transforms,
            on_transform_error: config.on_transform_error,
            dispatch: dispatch_tx,
            reporter,
            stats: Arc::clone(&stats),
            next_seq: 0,
        };
        let accumulator = tokio::spawn(pipeline.run(rx));

        tracing::debug!(
            path = %config.sink_path.display(),
            time_limit_ms = config.time_limit.as_millis() as u64,
            entry_limit = config.entry_limit,
            "flush logger started"
        );

        let logger = FlushLogger { sender: tx.clone(), stats };
        let handle = PipelineHandle { sender: tx, accumulator, dispatcher };
        Ok((logger, handle))
    }

    /// Log `message` under the default identifier.
    pub fn emit<M: Serialize>(&self, message: M) {
        self.emit_with(DEFAULT_IDENTIFIER, message);
    }

    /// Log `message` under `identifier`. Entries emitted after the
    /// pipeline stopped are counted as rejected and discarded.
    pub fn emit_with<M: Serialize>(&self, identifier: impl Into<String>, message: M) {
        let entry = Entry::new(identifier, message);
        if self.sender.send(Command::Entry(entry)).is_ok() {
            LoggerStats::incr(&self.stats.emitted_entries);
        } else {
            LoggerStats::incr(&self.stats.rejected_entries);
            tracing::debug!("flush logger closed, dropping entry");
        }
    }

    /// Cut the open batch now and wait until it, and every batch cut
    /// before it, has been written or given up on.
    pub async fn flush(&self) -> Result<(), FlushError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.sender
            .send(Command::Flush(ack_tx))
            .map_err(|_| FlushError::Closed)?;
        ack_rx.await.map_err(|_| FlushError::Closed)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// `true` once the pipeline no longer accepts entries.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl PipelineHandle {
    /// Cut whatever is buffered, wait for every queued batch to be
    /// written, and return how the pipeline ended.
    ///
    /// Entries emitted concurrently with the shutdown request are either
    /// included in the final batch or rejected; none are lost in between.
    pub async fn shutdown(self) -> Result<(), FlushError> {
        let _ = self.sender.send(Command::Shutdown);
        drop(self.sender);
        let result = self.accumulator.await;
        self.dispatcher.await?;
        result?
    }
}

/// State owned by the accumulator task.
struct Pipeline {
    acc: Accumulator,
    transforms: TransformChain,
    on_transform_error: TransformFailure,
    dispatch: mpsc::UnboundedSender<Dispatch>,
    reporter: Arc<dyn ErrorReporter>,
    stats: Arc<LoggerStats>,
    next_seq: u64,
}

impl Pipeline {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) -> Result<(), FlushError> {
        let result = self.drive(&mut rx).await;
        if result.is_err() {
            self.discard(&mut rx);
        }
        result
    }

    async fn drive(&mut self, rx: &mut mpsc::UnboundedReceiver<Command>) -> Result<(), FlushError> {
        loop {
            let deadline = self.acc.deadline();
            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(Command::Shutdown) | None => break,
                    Some(cmd) => self.handle(cmd)?,
                },
                _ = sleep_until(deadline) => {
                    if let Some(entries) = self.acc.on_timer(Instant::now()) {
                        self.seal(entries, CutReason::Time)?;
                    }
                }
            }
        }

        // Refuse new entries, then fold in whatever was already queued.
        rx.close();
        while let Ok(cmd) = rx.try_recv() {
            if !matches!(cmd, Command::Shutdown) {
                self.handle(cmd)?;
            }
        }
        let entries = self.acc.cut(Instant::now());
        if !entries.is_empty() {
            self.seal(entries, CutReason::Shutdown)?;
        }
        tracing::debug!(batches = self.next_seq, "flush logger stopped");
        Ok(())
    }

    /// After a halt: close intake and count everything still buffered or
    /// queued as rejected. Pending flush acks are dropped with the channel.
    fn discard(&mut self, rx: &mut mpsc::UnboundedReceiver<Command>) {
        rx.close();
        let mut lost = self.acc.cut(Instant::now()).len() as u64;
        while let Ok(cmd) = rx.try_recv() {
            if let Command::Entry(_) = cmd {
                lost += 1;
            }
        }
        if lost > 0 {
            LoggerStats::add(&self.stats.rejected_entries, lost);
            tracing::warn!(lost, "pipeline halted, discarding unwritten entries");
        }
    }

    fn handle(&mut self, cmd: Command) -> Result<(), FlushError> {
        match cmd {
            Command::Entry(entry) => {
                if let Some(entries) = self.acc.intake(entry, Instant::now()) {
                    self.seal(entries, CutReason::Count)?;
                }
            }
            Command::Flush(ack) => {
                let entries = self.acc.cut(Instant::now());
                if !entries.is_empty() {
                    self.seal(entries, CutReason::Flush)?;
                }
                self.dispatch
                    .send(Dispatch::Barrier(ack))
                    .map_err(|_| FlushError::Closed)?;
            }
            Command::Shutdown => {}
        }
        Ok(())
    }

    /// Transform a sealed batch and queue it for writing.
    fn seal(&mut self, entries: Vec<Entry>, reason: CutReason) -> Result<(), FlushError> {
        let seq = self.next_seq;
        self.next_seq += 1;
        LoggerStats::incr(&self.stats.batches_cut);
        tracing::debug!(seq, ?reason, entries = entries.len(), "batch cut");

        let batch = match self.transforms.apply(Batch::Entries(entries)) {
            Ok(batch) => batch,
            Err(source) => {
                LoggerStats::incr(&self.stats.batches_failed);
                let err = FlushError::Transform { batch: seq, source };
                self.reporter.report("error transforming log batch", &err);
                return match self.on_transform_error {
                    TransformFailure::Halt => Err(err),
                    TransformFailure::SkipBatch => Ok(()),
                };
            }
        };

        if batch.is_empty() {
            tracing::trace!(seq, "transformed batch is empty, nothing to write");
            return Ok(());
        }
        self.dispatch
            .send(Dispatch::Batch { seq, batch })
            .map_err(|_| FlushError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BoxError, TransformError};
    use crate::report::tests::CollectingReporter;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;
    use tokio::time::{sleep, Duration};

    /// Records every append together with the (paused) time it happened.
    #[derive(Default)]
    struct RecordingAppend {
        writes: Mutex<Vec<(Instant, String)>>,
    }

    impl RecordingAppend {
        fn texts(&self) -> Vec<String> {
            self.writes.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
        }
    }

    #[async_trait]
    impl Append for RecordingAppend {
        async fn append(&self, _path: &Path, bytes: &[u8]) -> Result<(), BoxError> {
            let text = String::from_utf8_lossy(bytes).into_owned();
            self.writes.lock().unwrap().push((Instant::now(), text));
            Ok(())
        }
    }

    fn message_lines(chain: TransformChain) -> TransformChain {
        chain.then(|batch| match batch {
            Batch::Entries(entries) => Batch::Text(
                entries.iter().map(|e| format!("{}\n", e.message_text())).collect(),
            ),
            other => other,
        })
    }

    fn start(
        config: LoggerConfig,
        chain: TransformChain,
    ) -> (FlushLogger, PipelineHandle, Arc<RecordingAppend>, Arc<CollectingReporter>) {
        let appender = Arc::new(RecordingAppend::default());
        let reporter = Arc::new(CollectingReporter::default());
        let (logger, handle) =
            FlushLogger::spawn_with(config, chain, appender.clone(), reporter.clone()).unwrap();
        (logger, handle, appender, reporter)
    }

    /// Let the pipeline tasks run without moving the clock.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn empty_path_is_rejected() {
        let err = FlushLogger::spawn(LoggerConfig::new(""), TransformChain::new()).err().unwrap();
        assert!(matches!(err, ConfigError::EmptySinkPath));
    }

    #[tokio::test(start_paused = true)]
    async fn count_limit_cuts_without_timer() {
        let config = LoggerConfig::new("mem.log").with_entry_limit(3).with_time_limit_ms(10_000);
        let (logger, _handle, appender, _) = start(config, message_lines(TransformChain::new()));

        logger.emit("a");
        logger.emit("b");
        logger.emit("c");
        settle().await;

        assert_eq!(appender.texts(), vec!["a\nb\nc\n".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn time_limit_cuts_partial_batch() {
        let config = LoggerConfig::new("mem.log").with_entry_limit(20).with_time_limit_ms(100);
        let (logger, _handle, appender, _) = start(config, message_lines(TransformChain::new()));
        let t0 = Instant::now();

        logger.emit("only");
        sleep(Duration::from_millis(50)).await;
        assert!(appender.texts().is_empty());

        sleep(Duration::from_millis(100)).await;
        let writes = appender.writes.lock().unwrap().clone();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].1, "only\n");
        assert_eq!(writes[0].0.duration_since(t0), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn count_cuts_reset_the_timer() {
        let config = LoggerConfig::new("mem.log").with_entry_limit(2).with_time_limit_ms(100);
        let (logger, _handle, appender, _) = start(config, message_lines(TransformChain::new()));
        let t0 = Instant::now();

        sleep(Duration::from_millis(90)).await;
        for m in ["1", "2", "3", "4"] {
            logger.emit(m);
        }
        sleep(Duration::from_millis(5)).await;
        logger.emit("5");
        sleep(Duration::from_millis(200)).await;

        // "5" waits for a full window after the t=90 cuts, not the t=100 tick.
        let writes: Vec<(Duration, String)> = appender
            .writes
            .lock()
            .unwrap()
            .iter()
            .map(|(at, text)| (at.duration_since(t0), text.clone()))
            .collect();
        assert_eq!(
            writes,
            vec![
                (Duration::from_millis(90), "1\n2\n".to_string()),
                (Duration::from_millis(90), "3\n4\n".to_string()),
                (Duration::from_millis(190), "5\n".to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn idle_windows_write_nothing() {
        let config = LoggerConfig::new("mem.log").with_time_limit_ms(50);
        let (logger, handle, appender, _) = start(config, TransformChain::rendered());

        sleep(Duration::from_millis(500)).await;
        handle.shutdown().await.unwrap();

        assert!(appender.texts().is_empty());
        assert_eq!(logger.stats().batches_cut, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_time_limit_still_cuts_on_time() {
        let config = LoggerConfig::new("mem.log").with_time_limit_ms(0);
        let (logger, _handle, appender, _) = start(config, message_lines(TransformChain::new()));
        let t0 = Instant::now();

        logger.emit("soon");
        sleep(Duration::from_secs(1)).await;

        let writes = appender.writes.lock().unwrap().clone();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].1, "soon\n");
        assert_eq!(writes[0].0.duration_since(t0), MIN_TIME_LIMIT);
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_entry_limit_cuts_on_time() {
        let config = LoggerConfig::new("mem.log")
            .with_entry_limit(usize::MAX)
            .with_time_limit_ms(100);
        let (logger, _handle, appender, _) = start(config, message_lines(TransformChain::new()));

        logger.emit("one");
        sleep(Duration::from_millis(150)).await;

        assert_eq!(appender.texts(), vec!["one\n".to_string()]);
    }

    #[tokio::test]
    async fn flush_writes_open_batch() {
        let config = LoggerConfig::new("mem.log").with_time_limit_ms(0);
        let (logger, _handle, appender, _) = start(config, message_lines(TransformChain::new()));

        logger.emit_with("svc", "x");
        logger.flush().await.unwrap();
        assert_eq!(appender.texts(), vec!["x\n".to_string()]);
        assert_eq!(logger.stats().batches_written, 1);
    }

    #[tokio::test]
    async fn shutdown_drains_and_rejects_later_entries() {
        let config = LoggerConfig::new("mem.log").with_time_limit_ms(60_000);
        let (logger, handle, appender, _) = start(config, message_lines(TransformChain::new()));

        logger.emit("pending");
        handle.shutdown().await.unwrap();
        assert_eq!(appender.texts(), vec!["pending\n".to_string()]);

        logger.emit("late");
        assert!(logger.is_closed());
        assert_eq!(logger.stats().rejected_entries, 1);
        assert!(matches!(logger.flush().await, Err(FlushError::Closed)));
    }

    #[tokio::test]
    async fn halting_transform_error_stops_pipeline() {
        let chain = message_lines(TransformChain::new()).then_try(|batch| match &batch {
            Batch::Text(t) if t.contains("poison") => Err(TransformError::new("bad batch")),
            _ => Ok(batch),
        });
        let config = LoggerConfig::new("mem.log").with_entry_limit(1);
        let (logger, handle, appender, reporter) = start(config, chain);

        logger.emit("fine");
        logger.emit("poison");
        logger.emit("after");

        let err = handle.shutdown().await.unwrap_err();
        assert!(matches!(err, FlushError::Transform { batch: 1, .. }));
        assert_eq!(appender.texts(), vec!["fine\n".to_string()]);
        assert_eq!(reporter.contexts(), vec!["error transforming log batch".to_string()]);
        assert!(logger.is_closed());

        // "after" was queued behind the failing batch and never written.
        let stats = logger.stats();
        assert_eq!(stats.emitted_entries, 3);
        assert_eq!(stats.rejected_entries, 1);
    }

    #[tokio::test]
    async fn skip_policy_keeps_pipeline_running() {
        let chain = message_lines(TransformChain::new()).then_try(|batch| match &batch {
            Batch::Text(t) if t.contains("poison") => Err(TransformError::new("bad batch")),
            _ => Ok(batch),
        });
        let config = LoggerConfig::new("mem.log")
            .with_entry_limit(1)
            .with_transform_failure(TransformFailure::SkipBatch);
        let (logger, handle, appender, _) = start(config, chain);

        logger.emit("fine");
        logger.emit("poison");
        logger.emit("after");
        handle.shutdown().await.unwrap();

        assert_eq!(appender.texts(), vec!["fine\n".to_string(), "after\n".to_string()]);
        assert_eq!(logger.stats().batches_failed, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_producers_lose_nothing() {
        let config = LoggerConfig::new("mem.log").with_entry_limit(7).with_time_limit_ms(5);
        let (logger, handle, appender, _) = start(config, message_lines(TransformChain::new()));

        let mut tasks = Vec::new();
        for p in 0..8 {
            let logger = logger.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..250 {
                    logger.emit(format!("{}-{}", p, i));
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        handle.shutdown().await.unwrap();

        let lines: Vec<String> = appender.texts().concat().lines().map(str::to_owned).collect();
        assert_eq!(lines.len(), 8 * 250);
        // Each producer's own entries keep their order.
        for p in 0..8 {
            let prefix = format!("{}-", p);
            let seen: Vec<usize> = lines
                .iter()
                .filter_map(|l| l.strip_prefix(&prefix))
                .map(|i| i.parse().unwrap())
                .collect();
            assert_eq!(seen, (0..250).collect::<Vec<_>>());
        }
    }
}
