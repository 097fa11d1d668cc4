// Local crates
use crate::instrumentation::record::{LogRecord, Severity};
use crate::instrumentation::registry::{self, SharedRegistry};

// External crates
use chrono::Local;
use std::fmt;
use std::io::Write;
use tracing::field::{Field, Visit};
use tracing::subscriber::Interest;
use tracing::{Event, Metadata, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing` layer handing every event to the [`LoggerRegistry`](registry::LoggerRegistry).
///
/// Thresholds live in the registry and may change at runtime, so callsites
/// are never cached as always/never enabled.
#[derive(Debug, Clone)]
pub struct RoutingLayer {
    registry: SharedRegistry,
}

impl RoutingLayer {
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }
}

impl<S> Layer<S> for RoutingLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn register_callsite(&self, _metadata: &'static Metadata<'static>) -> Interest {
        Interest::sometimes()
    }

    fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        // Spans always pass: the error layer needs them for span traces.
        if metadata.is_span() {
            return true;
        }
        registry::read(&self.registry).enabled(metadata.target(), Severity::from(metadata.level()))
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let record = LogRecord {
            timestamp: Local::now(),
            severity: Severity::from(metadata.level()),
            target: metadata.target().to_string(),
            line: metadata.line().unwrap_or(0),
            message: visitor.finish(),
        };

        if let Err(err) = registry::read(&self.registry).dispatch(&record) {
            let _ = writeln!(std::io::stderr(), "--- Logging error ---\n{err}");
        }
    }
}

/// Collects the `message` field plus any structured fields as `key=value`.
#[derive(Debug, Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields.join(" ")
        } else {
            format!("{} {}", self.message, self.fields.join(" "))
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}
