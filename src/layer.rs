use crate::logger::FlushLogger;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that turns events into [`FlushLogger`]
/// entries.
///
/// The event target becomes the entry identifier. The message is the
/// formatted event message, followed by the remaining fields as JSON when
/// there are any. Only events at `min_level` or more severe are forwarded.
pub struct FlushLayer {
    logger: FlushLogger,
    min_level: Level,
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Events forwarded to the logger.
    pub forwarded_events: Arc<AtomicU64>,
}

impl FlushLayer {
    /// Forward `ERROR` events only.
    pub fn new(logger: FlushLogger) -> Self {
        Self::with_level(logger, Level::ERROR)
    }

    pub fn with_level(logger: FlushLogger, min_level: Level) -> Self {
        Self {
            logger,
            min_level,
            total_events: Arc::new(AtomicU64::new(0)),
            forwarded_events: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<S> Layer<S> for FlushLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        // Lower levels compare greater: TRACE > DEBUG > ... > ERROR.
        if *event.metadata().level() > self.min_level {
            return;
        }
        // Our own retry warnings would otherwise feed back into the sink.
        if event.metadata().target().starts_with(env!("CARGO_CRATE_NAME")) {
            return;
        }

        let mut fields = BTreeMap::new();
        let mut message: Option<String> = None;
        event.record(&mut FieldVisitor { fields: &mut fields, message: &mut message });

        let meta = event.metadata();
        let mut text = format!("{} {}", meta.level(), message.unwrap_or_default());
        if !fields.is_empty() {
            if let Ok(json) = serde_json::to_string(&fields) {
                text.push(' ');
                text.push_str(&json);
            }
        }

        self.logger.emit_with(meta.target(), text);
        self.forwarded_events.fetch_add(1, Ordering::Relaxed);
    }
}

pub struct FieldVisitor<'a> {
    pub fields: &'a mut BTreeMap<String, serde_json::Value>,
    pub message: &'a mut Option<String>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(format!("{:?}", value)));
        }
    }
}
