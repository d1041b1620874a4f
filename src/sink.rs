//! Log sinks - where rendered diagnostics go
//!
//! Key types:
//! - `LogRecord`: level + message template + named properties (+ attachment)
//! - `LogSink`: trait for the logging backend
//! - `TracingSink`: forwards records to `tracing`
//! - `MemorySink`: keeps records in memory (tests, embedding tools)

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::event::{render_template, Level};

/// Target used for every record forwarded to `tracing`
pub const TRACING_TARGET: &str = "resolve_diagnostics";

/// Structured value carried next to the message (e.g. the object graph)
///
/// The value is shared between record clones and may be arbitrarily deep;
/// it is freed and rendered without recursion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attachment {
    pub name: String,
    #[serde(serialize_with = "serialize_shared")]
    pub value: Arc<Value>,
}

impl Attachment {
    /// Compact JSON text of the value
    pub fn to_json_string(&self) -> String {
        compact_json(&self.value)
    }
}

impl Drop for Attachment {
    fn drop(&mut self) {
        if let Some(value) = Arc::get_mut(&mut self.value) {
            drop_flat(value.take());
        }
    }
}

fn serialize_shared<S>(value: &Arc<Value>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    (**value).serialize(serializer)
}

/// Drop a JSON value container by container
fn drop_flat(value: Value) {
    let mut pending = vec![value];
    while let Some(value) = pending.pop() {
        match value {
            Value::Array(items) => pending.extend(items),
            Value::Object(map) => pending.extend(map.into_iter().map(|(_, v)| v)),
            _ => {}
        }
    }
}

enum Piece<'a> {
    Value(&'a Value),
    Key(&'a str),
    Text(&'static str),
}

/// Same text as `Value`'s `Display`, produced with an explicit stack
pub fn compact_json(value: &Value) -> String {
    let mut out = String::new();
    let mut pending = vec![Piece::Value(value)];

    while let Some(piece) = pending.pop() {
        match piece {
            Piece::Text(text) => out.push_str(text),
            Piece::Key(key) => {
                out.push_str(&Value::from(key).to_string());
                out.push(':');
            }
            Piece::Value(Value::Array(items)) => {
                out.push('[');
                pending.push(Piece::Text("]"));
                for (i, item) in items.iter().enumerate().rev() {
                    pending.push(Piece::Value(item));
                    if i > 0 {
                        pending.push(Piece::Text(","));
                    }
                }
            }
            Piece::Value(Value::Object(map)) => {
                out.push('{');
                pending.push(Piece::Text("}"));
                let entries: Vec<_> = map.iter().collect();
                for (i, (key, item)) in entries.into_iter().enumerate().rev() {
                    pending.push(Piece::Value(item));
                    pending.push(Piece::Key(key));
                    if i > 0 {
                        pending.push(Piece::Text(","));
                    }
                }
            }
            Piece::Value(scalar) => out.push_str(&scalar.to_string()),
        }
    }
    out
}

/// One structured log record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub level: Level,
    pub template: String,
    pub properties: Vec<(String, Value)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

impl LogRecord {
    pub fn new(level: Level, template: impl Into<String>) -> Self {
        Self {
            level,
            template: template.into(),
            properties: Vec::new(),
            attachment: None,
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.push((name.into(), value.into()));
        self
    }

    pub fn with_attachment(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attachment = Some(Attachment {
            name: name.into(),
            value: Arc::new(value),
        });
        self
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Template with properties substituted by name
    pub fn render(&self) -> String {
        render_template(&self.template, |name| self.property(name))
    }

    /// Properties as a JSON object (later duplicates win)
    pub fn properties_json(&self) -> Value {
        let map: Map<String, Value> = self.properties.iter().cloned().collect();
        Value::Object(map)
    }
}

/// Logging backend the writer renders into
pub trait LogSink: Send + Sync {
    fn write(&self, record: &LogRecord);
}

// ═══════════════════════════════════════════════════════════════
// TracingSink
// ═══════════════════════════════════════════════════════════════

/// Forwards every record as one `tracing` event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TracingSink {
    pub fn new() -> Self {
        Self
    }
}

macro_rules! forward {
    ($level:expr, $template:ident, $message:ident, $properties:ident, $attachment:ident) => {
        tracing::event!(
            target: TRACING_TARGET,
            $level,
            template = %$template,
            properties = %$properties,
            attachment = $attachment,
            "{}",
            $message
        )
    };
}

impl LogSink for TracingSink {
    fn write(&self, record: &LogRecord) {
        let template = record.template.as_str();
        let message = record.render();
        let properties = record.properties_json();
        let attachment = record.attachment.as_ref().map(Attachment::to_json_string);
        let attachment = attachment.as_deref();

        match record.level {
            Level::Trace => {
                forward!(tracing::Level::TRACE, template, message, properties, attachment)
            }
            Level::Debug => {
                forward!(tracing::Level::DEBUG, template, message, properties, attachment)
            }
            Level::Info => {
                forward!(tracing::Level::INFO, template, message, properties, attachment)
            }
            Level::Warn => {
                forward!(tracing::Level::WARN, template, message, properties, attachment)
            }
            Level::Error => {
                forward!(tracing::Level::ERROR, template, message, properties, attachment)
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// MemorySink
// ═══════════════════════════════════════════════════════════════

/// Keeps every record in memory, in write order
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records written so far (cloned)
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// Records at `level`
    pub fn at_level(&self, level: Level) -> Vec<LogRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.level == level)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl LogSink for MemorySink {
    fn write(&self, record: &LogRecord) {
        self.records.lock().push(record.clone());
    }
}
