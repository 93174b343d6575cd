use std::fmt;
use std::sync::Arc;

use crate::batch::Batch;
use crate::error::TransformError;

/// A caller-supplied batch rewrite. Expected to be pure and synchronous.
pub type Transform = Arc<dyn Fn(Batch) -> Result<Batch, TransformError> + Send + Sync>;

/// Ordered list of transforms applied left to right to every cut batch.
/// An empty chain passes batches through untouched.
#[derive(Clone, Default)]
pub struct TransformChain {
    transforms: Vec<Transform>,
}

impl TransformChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain starting with the standard line renderer.
    pub fn rendered() -> Self {
        Self::new().then(render_lines)
    }

    /// Append a transform that cannot fail.
    pub fn then<F>(self, f: F) -> Self
    where
        F: Fn(Batch) -> Batch + Send + Sync + 'static,
    {
        self.then_try(move |batch| Ok(f(batch)))
    }

    /// Append a fallible transform.
    pub fn then_try<F>(mut self, f: F) -> Self
    where
        F: Fn(Batch) -> Result<Batch, TransformError> + Send + Sync + 'static,
    {
        self.transforms.push(Arc::new(f));
        self
    }

    pub fn push(&mut self, transform: Transform) {
        self.transforms.push(transform);
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Compute `fn(...f2(f1(batch)))`, stopping at the first error.
    pub fn apply(&self, batch: Batch) -> Result<Batch, TransformError> {
        self.transforms.iter().try_fold(batch, |batch, f| f(batch))
    }
}

impl fmt::Debug for TransformChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformChain")
            .field("len", &self.transforms.len())
            .finish()
    }
}

/// Standard rendering: one `[{identifier}] {timestamp_ms} >> {message}`
/// line per entry. Already-rendered text is left alone.
pub fn render_lines(batch: Batch) -> Batch {
    match batch {
        Batch::Entries(entries) => Batch::Text(entries.iter().map(|e| e.render_line()).collect()),
        text @ Batch::Text(_) => text,
    }
}
