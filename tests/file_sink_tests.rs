use flush_logger::{create_logger, create_logger_with_config, FlushError, FlushLogger, LoggerConfig, TransformChain};
use flush_logger::batch::Batch;
use flush_logger::error::TransformError;
use std::time::Duration;

fn read(path: &std::path::Path) -> String {
    std::fs::read_to_string(path).unwrap_or_default()
}

#[tokio::test]
async fn rendered_lines_reach_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    let (logger, handle) = create_logger(&path, TransformChain::rendered()).unwrap();

    logger.emit_with("abc", "Hello World! 17");
    logger.emit("plain");
    handle.shutdown().await.unwrap();

    let contents = read(&path);
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("[abc] "));
    assert!(lines[0].ends_with(" >> Hello World! 17"));
    assert!(lines[1].starts_with("[default] "));
    assert!(lines[1].ends_with(" >> plain"));
}

#[tokio::test]
async fn count_limit_writes_before_the_window_closes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("count.log");
    let config = LoggerConfig::new(&path).with_entry_limit(3).with_time_limit_ms(60_000);
    let (logger, _handle) = create_logger_with_config(config, TransformChain::rendered()).unwrap();

    for i in 0..3 {
        logger.emit(i);
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while logger.stats().batches_written < 1 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(read(&path).lines().count(), 3);
    assert_eq!(logger.stats().batches_written, 1);
}

#[tokio::test]
async fn empty_chain_writes_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.jsonl");
    let (logger, handle) = create_logger(&path, TransformChain::new()).unwrap();

    logger.emit_with("orders", serde_json::json!({"id": 9, "ok": true}));
    handle.shutdown().await.unwrap();

    let contents = read(&path);
    let value: serde_json::Value = serde_json::from_str(contents.trim_end()).unwrap();
    assert_eq!(value["identifier"], "orders");
    assert_eq!(value["message"]["id"], 9);
    assert!(value["timestamp"].is_string());
}

#[tokio::test]
async fn unwritable_sink_drops_batches_and_keeps_running() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing-dir").join("app.log");
    let config = LoggerConfig::new(&path)
        .with_entry_limit(1)
        .with_retry_backoff(Duration::ZERO);
    let (logger, handle) = create_logger_with_config(config, TransformChain::rendered()).unwrap();

    logger.emit("first");
    logger.emit("second");
    logger.flush().await.unwrap();

    let stats = logger.stats();
    assert_eq!(stats.batches_failed, 2);
    assert_eq!(stats.batches_written, 0);
    assert!(!logger.is_closed());
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn transform_failure_surfaces_at_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    let chain = TransformChain::rendered().then_try(|_: Batch| Err(TransformError::new("template missing")));
    let (logger, handle) = create_logger(&path, chain).unwrap();

    logger.emit("x");
    let err = handle.shutdown().await.unwrap_err();
    assert!(matches!(err, FlushError::Transform { batch: 0, .. }));
    assert_eq!(read(&path), "");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn producers_on_plain_threads_never_block() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("threads.log");
    let config = LoggerConfig::new(&path).with_entry_limit(50).with_time_limit_ms(20);
    let (logger, handle) = create_logger_with_config(config, TransformChain::rendered()).unwrap();

    let threads: Vec<_> = (0..4)
        .map(|t| {
            let logger: FlushLogger = logger.clone();
            std::thread::spawn(move || {
                for i in 0..100 {
                    logger.emit_with(format!("t{}", t), i);
                }
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }
    handle.shutdown().await.unwrap();

    assert_eq!(read(&path).lines().count(), 400);
    assert_eq!(logger.stats().emitted_entries, 400);
}
