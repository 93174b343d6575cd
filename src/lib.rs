pub mod entry;
pub mod batch;
pub mod transform;
pub mod accumulator;
pub mod sink;
pub mod report;
pub mod error;
pub mod stats;
mod dispatch;
pub mod logger;
pub mod layer;

pub mod init;
pub mod env;
pub mod noop_sink;

pub use batch::Batch;
pub use entry::Entry;
pub use error::{ConfigError, FlushError};
pub use init::{create_logger, create_logger_with_config, LoggerConfig, TransformFailure};
pub use logger::{FlushLogger, PipelineHandle};
pub use transform::{render_lines, TransformChain};
