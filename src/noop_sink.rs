use crate::error::BoxError;
use crate::sink::Append;
use async_trait::async_trait;
use std::path::Path;

/// An appender that discards every payload.
///
/// Useful for measuring the overhead of batching itself without any
/// disk I/O, and for tests that don't care about persistence.
#[derive(Clone, Default)]
pub struct NoopAppend;

#[async_trait]
impl Append for NoopAppend {
    async fn append(&self, _path: &Path, _bytes: &[u8]) -> Result<(), BoxError> {
        Ok(())
    }
}
