use tokio::time::{sleep, Duration};

use flush_logger::init::{create_logger_with_config, init_diagnostics, LoggerConfig};
use flush_logger::{Batch, TransformChain};

/// Writes a rendered, upper-cased line every 200 ms to `log.txt`, flushing
/// every 5 s or every 500 entries.
#[tokio::main]
async fn main() {
    init_diagnostics(true).expect("set global subscriber");

    let config = LoggerConfig::from_env()
        .unwrap_or_else(|_| LoggerConfig::new("log.txt"))
        .with_time_limit_ms(5000)
        .with_entry_limit(500);

    let transforms = TransformChain::rendered().then(|batch| match batch {
        Batch::Text(text) => Batch::Text(text.to_uppercase()),
        other => other,
    });

    let (logger, handle) = create_logger_with_config(config, transforms).expect("valid config");

    for i in 0..60u32 {
        logger.emit_with("abc", format!("Hello World! {}", i * 7 % 100));
        sleep(Duration::from_millis(200)).await;
    }

    handle.shutdown().await.expect("clean shutdown");
}
