use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Identifier used when the caller does not supply one.
pub const DEFAULT_IDENTIFIER: &str = "default";

/// One logged event. Created by the logger handle at enqueue time and
/// never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub identifier: String,
    pub message: Value,
    pub timestamp: DateTime<Utc>,
}

impl Entry {
    /// Build an entry stamped with the current time.
    ///
    /// A message that cannot be represented as JSON is kept as a string
    /// describing the failure so the entry still reaches the sink.
    pub fn new<M: Serialize>(identifier: impl Into<String>, message: M) -> Self {
        let message = serde_json::to_value(message)
            .unwrap_or_else(|e| Value::String(format!("<unserializable message: {}>", e)));

        Entry {
            identifier: identifier.into(),
            message,
            timestamp: Utc::now(),
        }
    }

    /// Message text as written by the line renderer: strings verbatim,
    /// everything else as compact JSON.
    pub fn message_text(&self) -> String {
        match &self.message {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// `[{identifier}] {timestamp_ms} >> {message}\n`
    pub fn render_line(&self) -> String {
        format!(
            "[{}] {} >> {}\n",
            self.identifier,
            self.timestamp.timestamp_millis(),
            self.message_text()
        )
    }
}
