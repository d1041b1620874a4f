//! EventWriter - renders diagnostic events as structured log records
//!
//! Handles:
//! - `MessageEvent` at its own level, template and args untouched
//! - resolve operation created (short id + parent or calling method)
//! - resolve operation completed (short id + serialized object graph)

use std::sync::Arc;

use crate::bus::{EventBus, EventHandler};
use crate::error::{AnalysisError, Result};
use crate::event::{Event, EventKind, EventType, Level, MessageEvent, TrackedItem};
use crate::graph;
use crate::model::{ItemId, ResolveOperation, DEFAULT_SHORT_ID_LENGTH};
use crate::sink::{LogRecord, LogSink};

/// Name of the attachment carrying the serialized graph
pub const OBJECT_GRAPH_ATTACHMENT: &str = "ObjectGraph";

const HANDLED: &[EventType] = &[
    EventType::Message,
    EventType::ResolveOperationCreated,
    EventType::ResolveOperationCompleted,
];

/// Event handler writing one `LogRecord` per handled event
pub struct EventWriter {
    bus: Arc<EventBus>,
    sink: Arc<dyn LogSink>,
    short_id_length: usize,
}

impl EventWriter {
    pub fn builder() -> EventWriterBuilder {
        EventWriterBuilder::default()
    }

    /// Subscribe to the bus
    pub fn start(self: &Arc<Self>) {
        self.bus.subscribe(Arc::clone(self) as Arc<dyn EventHandler>);
    }

    /// Unsubscribe from the bus
    pub fn stop(&self) {
        self.bus.unsubscribe(self);
    }

    fn short(&self, id: ItemId) -> String {
        id.short(self.short_id_length)
    }

    fn write_message(&self, message: &MessageEvent) {
        let mut record = LogRecord::new(message.level(), message.template());
        record.properties = message.properties();
        self.sink.write(&record);
    }

    fn write_operation_created(&self, operation: &ResolveOperation) {
        let record = match operation.parent_id() {
            Some(parent) => LogRecord::new(
                Level::Info,
                "Resolve operation {ResolveOperationId} started within {ParentOperationId}",
            )
            .with_property("ResolveOperationId", self.short(operation.id()))
            .with_property("ParentOperationId", self.short(parent)),
            None => LogRecord::new(
                Level::Info,
                "Resolve operation {ResolveOperationId} started from {CallingMethod}",
            )
            .with_property("ResolveOperationId", self.short(operation.id()))
            .with_property(
                "CallingMethod",
                operation.calling_method().unwrap_or("<unknown>"),
            ),
        };
        self.sink.write(&record);
    }

    fn write_operation_completed(&self, operation: &ResolveOperation) -> Result<()> {
        let root = operation
            .root_instance_lookup()
            .ok_or_else(|| AnalysisError::MissingRootLookup {
                operation: operation.id().to_string(),
            })?;
        let graph = graph::serialize(root)?;

        let record = LogRecord::new(Level::Info, "Resolve operation {ResolveOperationId} completed")
            .with_property("ResolveOperationId", self.short(operation.id()))
            .with_attachment(OBJECT_GRAPH_ATTACHMENT, graph.to_value());
        self.sink.write(&record);
        Ok(())
    }
}

impl EventHandler for EventWriter {
    fn name(&self) -> &str {
        "EventWriter"
    }

    fn event_types(&self) -> &[EventType] {
        HANDLED
    }

    fn handle(&self, event: &Event) -> Result<()> {
        match &event.kind {
            EventKind::Message(message) => self.write_message(message),
            EventKind::ItemCreated(TrackedItem::ResolveOperation(op)) => {
                self.write_operation_created(op)
            }
            EventKind::ItemCompleted(TrackedItem::ResolveOperation(op)) => {
                self.write_operation_completed(op)?
            }
            EventKind::ItemCreated(TrackedItem::LifetimeScope(_))
            | EventKind::ItemCompleted(TrackedItem::LifetimeScope(_)) => {}
        }
        Ok(())
    }
}

impl std::fmt::Debug for EventWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventWriter")
            .field("short_id_length", &self.short_id_length)
            .finish()
    }
}

/// Builder for `EventWriter`; bus and sink are required
pub struct EventWriterBuilder {
    bus: Option<Arc<EventBus>>,
    sink: Option<Arc<dyn LogSink>>,
    short_id_length: usize,
}

impl Default for EventWriterBuilder {
    fn default() -> Self {
        Self {
            bus: None,
            sink: None,
            short_id_length: DEFAULT_SHORT_ID_LENGTH,
        }
    }
}

impl EventWriterBuilder {
    pub fn bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn short_id_length(mut self, len: usize) -> Self {
        self.short_id_length = len;
        self
    }

    pub fn build(self) -> Result<EventWriter> {
        let bus = self.bus.ok_or(AnalysisError::MissingCollaborator {
            component: "EventWriter",
            collaborator: "an event bus",
        })?;
        let sink = self.sink.ok_or(AnalysisError::MissingCollaborator {
            component: "EventWriter",
            collaborator: "a log sink",
        })?;
        Ok(EventWriter {
            bus,
            sink,
            short_id_length: self.short_id_length,
        })
    }
}
