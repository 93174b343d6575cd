use std::sync::Arc;
use std::time::Instant;

use flush_logger::init::LoggerConfig;
use flush_logger::noop_sink::NoopAppend;
use flush_logger::report::TracingReporter;
use flush_logger::{FlushLogger, TransformChain};

#[tokio::main]
async fn main() {
    let (logger, handle) = FlushLogger::spawn_with(
        LoggerConfig::new("noop.log"),
        TransformChain::rendered(),
        Arc::new(NoopAppend),
        Arc::new(TracingReporter),
    )
    .expect("valid config");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        logger.emit_with("load", format!("default load test entry {}", i));
    }

    let elapsed = start.elapsed();
    println!("default config: emitted {} entries in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    handle.shutdown().await.expect("clean shutdown");
    println!("{:?}", logger.stats());
}
