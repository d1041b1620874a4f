//! Resolve diagnostics - event pipeline for dependency-injection resolution
//!
//! The resolution pipeline publishes events onto an `EventBus`; handlers
//! subscribed to it render them (`EventWriter`) or analyse them
//! (`OutOfOrderDisposalDetector`). `AnalysisSession` wires the standard set.

pub mod analytics;
pub mod bus;
pub mod config;
pub mod display;
pub mod error;
pub mod event;
pub mod graph;
pub mod logging;
pub mod model;
pub mod session;
pub mod sink;

pub use analytics::{OutOfOrderDisposalDetector, WarnedDescriptions};
pub use bus::{EventBus, EventHandler, EventQueue};
pub use config::AnalysisConfig;
pub use display::{EventWriter, EventWriterBuilder, OBJECT_GRAPH_ATTACHMENT};
pub use error::{AnalysisError, FixSuggestion, Result};
pub use event::{Event, EventKind, EventType, Level, MessageEvent, TrackedItem};
pub use graph::GraphNode;
pub use model::{InstanceLookup, ItemId, LifetimeScope, ResolveOperation};
pub use session::AnalysisSession;
pub use sink::{LogRecord, LogSink, MemorySink, TracingSink};
