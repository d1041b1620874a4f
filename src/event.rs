//! Diagnostic events (what the bus carries)
//!
//! - Event: envelope with timestamp + kind
//! - EventKind: leveled message, or creation/completion of a tracked item
//! - EventType: dispatch tag, one per concrete event shape
//! - MessageEvent: structured message with `{Name}` template holes

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{LifetimeScope, ResolveOperation};

// ═══════════════════════════════════════════════════════════════
// Level
// ═══════════════════════════════════════════════════════════════

/// Severity carried by messages and log records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<Level> for tracing::Level {
    fn from(level: Level) -> Self {
        match level {
            Level::Trace => tracing::Level::TRACE,
            Level::Debug => tracing::Level::DEBUG,
            Level::Info => tracing::Level::INFO,
            Level::Warn => tracing::Level::WARN,
            Level::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        };
        f.write_str(s)
    }
}

// ═══════════════════════════════════════════════════════════════
// Message templates
// ═══════════════════════════════════════════════════════════════

/// Piece of a parsed message template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateToken<'a> {
    Text(&'a str),
    /// Hole as written (including braces) and its property name
    Hole { raw: &'a str, name: &'a str },
}

/// Split a template into literal text and `{Name}` holes.
///
/// `{{` and `}}` are escaped braces (returned as single-brace text). Inside a
/// hole a leading `@`/`$` and anything after `:` or `,` are not part of the
/// name. An unterminated `{` is kept as text.
pub fn parse_template(template: &str) -> Vec<TemplateToken<'_>> {
    let mut tokens = Vec::new();
    let bytes = template.as_bytes();
    let mut text_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => {
                push_text(&mut tokens, &template[text_start..=i]);
                i += 2;
                text_start = i;
            }
            b'}' if bytes.get(i + 1) == Some(&b'}') => {
                push_text(&mut tokens, &template[text_start..=i]);
                i += 2;
                text_start = i;
            }
            b'{' => {
                let Some(close) = template[i + 1..].find('}') else {
                    break;
                };
                let end = i + 1 + close;
                let inner = &template[i + 1..end];
                let name = inner
                    .trim_start_matches(['@', '$'])
                    .split([':', ','])
                    .next()
                    .unwrap_or_default()
                    .trim();
                if name.is_empty() || name.contains('{') {
                    i += 1;
                    continue;
                }
                push_text(&mut tokens, &template[text_start..i]);
                tokens.push(TemplateToken::Hole {
                    raw: &template[i..=end],
                    name,
                });
                i = end + 1;
                text_start = i;
            }
            _ => i += 1,
        }
    }

    push_text(&mut tokens, &template[text_start..]);
    tokens
}

fn push_text<'a>(tokens: &mut Vec<TemplateToken<'a>>, text: &'a str) {
    if !text.is_empty() {
        tokens.push(TemplateToken::Text(text));
    }
}

/// Property names in template order
pub fn template_property_names(template: &str) -> Vec<&str> {
    parse_template(template)
        .into_iter()
        .filter_map(|t| match t {
            TemplateToken::Hole { name, .. } => Some(name),
            TemplateToken::Text(_) => None,
        })
        .collect()
}

/// Render a template by looking up each hole's property.
///
/// Strings are inserted verbatim, other values as compact JSON. Holes with
/// no value stay as written.
pub fn render_template<'v>(template: &str, lookup: impl Fn(&str) -> Option<&'v Value>) -> String {
    let mut out = String::with_capacity(template.len());
    for token in parse_template(template) {
        match token {
            TemplateToken::Text(text) => out.push_str(text),
            TemplateToken::Hole { raw, name } => match lookup(name) {
                Some(Value::String(s)) => out.push_str(s),
                Some(other) => out.push_str(&other.to_string()),
                None => out.push_str(raw),
            },
        }
    }
    out
}

// ═══════════════════════════════════════════════════════════════
// MessageEvent
// ═══════════════════════════════════════════════════════════════

/// Free-form structured message; the level travels with the event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    level: Level,
    template: String,
    args: Vec<Value>,
}

impl MessageEvent {
    pub fn new(level: Level, template: impl Into<String>) -> Self {
        Self {
            level,
            template: template.into(),
            args: Vec::new(),
        }
    }

    pub fn info(template: impl Into<String>) -> Self {
        Self::new(Level::Info, template)
    }

    pub fn warn(template: impl Into<String>) -> Self {
        Self::new(Level::Warn, template)
    }

    pub fn error(template: impl Into<String>) -> Self {
        Self::new(Level::Error, template)
    }

    /// Append the next positional argument
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Arguments paired with the template holes they fill.
    ///
    /// Extra arguments are named by their position.
    pub fn properties(&self) -> Vec<(String, Value)> {
        let names = template_property_names(&self.template);
        self.args
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let name = names
                    .get(i)
                    .map(|n| (*n).to_string())
                    .unwrap_or_else(|| i.to_string());
                (name, value.clone())
            })
            .collect()
    }

    /// Template with arguments substituted positionally
    pub fn render(&self) -> String {
        let names = template_property_names(&self.template);
        render_template(&self.template, |name| {
            names
                .iter()
                .position(|n| *n == name)
                .and_then(|i| self.args.get(i))
        })
    }
}

// ═══════════════════════════════════════════════════════════════
// Event + EventKind
// ═══════════════════════════════════════════════════════════════

/// Item whose creation and completion is tracked
#[derive(Debug, Clone)]
pub enum TrackedItem {
    ResolveOperation(Arc<ResolveOperation>),
    LifetimeScope(Arc<LifetimeScope>),
}

impl From<Arc<ResolveOperation>> for TrackedItem {
    fn from(op: Arc<ResolveOperation>) -> Self {
        Self::ResolveOperation(op)
    }
}

impl From<Arc<LifetimeScope>> for TrackedItem {
    fn from(scope: Arc<LifetimeScope>) -> Self {
        Self::LifetimeScope(scope)
    }
}

/// All event shapes
#[derive(Debug, Clone)]
pub enum EventKind {
    Message(MessageEvent),
    ItemCreated(TrackedItem),
    ItemCompleted(TrackedItem),
}

/// Dispatch tag: handlers subscribe per tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventType {
    Message,
    ResolveOperationCreated,
    ResolveOperationCompleted,
    LifetimeScopeCreated,
    LifetimeScopeCompleted,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventType::Message => "MessageEvent",
            EventType::ResolveOperationCreated => "ItemCreatedEvent<ResolveOperation>",
            EventType::ResolveOperationCompleted => "ItemCompletedEvent<ResolveOperation>",
            EventType::LifetimeScopeCreated => "ItemCreatedEvent<LifetimeScope>",
            EventType::LifetimeScopeCompleted => "ItemCompletedEvent<LifetimeScope>",
        };
        f.write_str(s)
    }
}

/// Single point-in-time fact
#[derive(Debug, Clone)]
pub struct Event {
    /// When the event was raised
    pub at: DateTime<Utc>,
    /// Event type and data
    pub kind: EventKind,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            at: Utc::now(),
            kind,
        }
    }

    pub fn message(message: MessageEvent) -> Self {
        Self::new(EventKind::Message(message))
    }

    pub fn item_created(item: impl Into<TrackedItem>) -> Self {
        Self::new(EventKind::ItemCreated(item.into()))
    }

    pub fn item_completed(item: impl Into<TrackedItem>) -> Self {
        Self::new(EventKind::ItemCompleted(item.into()))
    }

    pub fn event_type(&self) -> EventType {
        match &self.kind {
            EventKind::Message(_) => EventType::Message,
            EventKind::ItemCreated(TrackedItem::ResolveOperation(_)) => {
                EventType::ResolveOperationCreated
            }
            EventKind::ItemCompleted(TrackedItem::ResolveOperation(_)) => {
                EventType::ResolveOperationCompleted
            }
            EventKind::ItemCreated(TrackedItem::LifetimeScope(_)) => {
                EventType::LifetimeScopeCreated
            }
            EventKind::ItemCompleted(TrackedItem::LifetimeScope(_)) => {
                EventType::LifetimeScopeCompleted
            }
        }
    }

    pub fn as_message(&self) -> Option<&MessageEvent> {
        match &self.kind {
            EventKind::Message(m) => Some(m),
            _ => None,
        }
    }
}
