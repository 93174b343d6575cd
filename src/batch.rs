use crate::entry::Entry;

/// A sealed group of entries, possibly already rewritten by transforms.
///
/// The accumulator always produces [`Batch::Entries`]; transforms may keep
/// that shape or turn it into rendered text.
#[derive(Debug, Clone, PartialEq)]
pub enum Batch {
    Entries(Vec<Entry>),
    Text(String),
}

impl Batch {
    /// Bytes appended to the sink for this batch. Entries that were never
    /// rendered are written as JSON lines.
    pub fn into_bytes(self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Batch::Text(text) => Ok(text.into_bytes()),
            Batch::Entries(entries) => {
                let mut out = Vec::new();
                for entry in &entries {
                    serde_json::to_writer(&mut out, entry)?;
                    out.push(b'\n');
                }
                Ok(out)
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Batch::Entries(entries) => entries.is_empty(),
            Batch::Text(text) => text.is_empty(),
        }
    }
}

/// What closed a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutReason {
    /// Buffered entries reached the entry limit.
    Count,
    /// The time window since the previous cut elapsed.
    Time,
    /// An explicit `flush` request.
    Flush,
    /// Final cut while shutting down.
    Shutdown,
}
