//! provides logging helpers

use std::fmt;
use std::str::FromStr;

use serde_json::Map;
use serde_json::Value;
use tracing::field::Field;
use tracing::field::Visit;
use tracing::Event;
use tracing::Subscriber;
use tracing_subscriber::filter::{self};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::fmt::FormatEvent;
use tracing_subscriber::fmt::FormatFields;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry;
use tracing_subscriber::registry::LookupSpan;

/// Log verbosity, ordered `Debug < Info < Warn < Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

impl Severity {
    /// Parses a severity name, falling back to [`Severity::Info`] for anything unknown.
    pub fn parse_lossy(value: &str) -> Self {
        value.parse().unwrap_or(Severity::Info)
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Severity::Debug),
            "INFO" => Ok(Severity::Info),
            "WARN" | "WARNING" => Ok(Severity::Warn),
            "ERROR" => Ok(Severity::Error),
            other => Err(format!("unknown log level `{other}`")),
        }
    }
}

impl From<Severity> for filter::LevelFilter {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Debug => filter::LevelFilter::DEBUG,
            Severity::Info => filter::LevelFilter::INFO,
            Severity::Warn => filter::LevelFilter::WARN,
            Severity::Error => filter::LevelFilter::ERROR,
        }
    }
}

/// Writes each event as one JSON object per line:
/// `{"severity": .., "message": .., <event fields>}`.
pub struct JsonLineFormatter;

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, Value::from(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::from(format!("{value:?}")));
    }
}

impl<S, N> FormatEvent<S, N> for JsonLineFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        // severity and message always win over same-named event fields
        let mut payload = visitor.fields;
        payload.insert(
            "severity".to_string(),
            Value::from(event.metadata().level().to_string()),
        );
        payload.insert(
            "message".to_string(),
            Value::from(visitor.message.unwrap_or_default()),
        );

        let line = serde_json::to_string(&Value::Object(payload)).map_err(|_| fmt::Error)?;
        writeln!(writer, "{line}")
    }
}

/// initiate the global tracing subscriber
///
/// `RUST_LOG` directives take precedence over `severity` when present.
pub fn init(severity: Severity) {
    let env_filter = filter::EnvFilter::builder()
        .with_default_directive(filter::LevelFilter::from(severity).into())
        .from_env_lossy();

    let fmt_layer = layer()
        .event_format(JsonLineFormatter)
        .with_writer(std::io::stderr)
        .with_filter(env_filter);

    registry().with(fmt_layer).init();
}
