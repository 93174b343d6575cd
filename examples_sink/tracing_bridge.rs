use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

use flush_logger::layer::FlushLayer;
use flush_logger::{create_logger, TransformChain};

#[tokio::main]
async fn main() {
    let (logger, handle) = create_logger("service-errors.log", TransformChain::rendered())
        .expect("valid config");

    let subscriber = Registry::default()
        .with(FlushLayer::with_level(logger, tracing::Level::WARN))
        .with(tracing_subscriber::fmt::layer());
    tracing::subscriber::set_global_default(subscriber).expect("set global subscriber");

    info!("starting service");

    warn!(retry = 1, "upstream slow");
    error!(
        user_id = 42,
        reason = "invalid password",
        "authentication failed"
    );

    handle.shutdown().await.expect("clean shutdown");
}
