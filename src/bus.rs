//! EventBus - in-process publish/subscribe dispatcher
//!
//! Key types:
//! - `EventHandler`: a subscriber declaring the event types it handles
//! - `EventQueue`: enqueue-only seam (what producers and analytics depend on)
//! - `EventBus`: per-type subscriber lists with snapshot dispatch
//!
//! Dispatch is synchronous: `publish` returns once every matching handler
//! has run. Handlers may publish while handling; the nested event is fully
//! delivered before the outer dispatch continues.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{AnalysisError, Result};
use crate::event::{Event, EventType, MessageEvent};

/// Subscriber that reacts to one or more event types
pub trait EventHandler: Send + Sync {
    /// Name used when reporting a failure of this handler
    fn name(&self) -> &str;

    /// Event types this handler is registered for on `subscribe`
    fn event_types(&self) -> &[EventType];

    /// Handle one event (only called for declared types)
    fn handle(&self, event: &Event) -> Result<()>;
}

/// Anything events can be enqueued on
pub trait EventQueue: Send + Sync {
    fn enqueue(&self, event: Event);
}

type Subscribers = Arc<[Arc<dyn EventHandler>]>;

/// Handler identity is the address of the handler value, so the same
/// instance can be found whether it is passed as `&T`, `&dyn` or `Arc`.
fn handler_addr(handler: &dyn EventHandler) -> usize {
    handler as *const _ as *const () as usize
}

/// Where a dispatch came from
#[derive(Clone, Copy, PartialEq, Eq)]
enum Origin {
    Publish,
    /// Report of a failed handler; failures while handling it are not
    /// reported again
    FailureReport,
}

/// Thread-safe event bus
///
/// The registry maps each event type to an immutable subscriber list that is
/// replaced (copy-on-write) on every subscribe/unsubscribe. Dispatch clones
/// the current list under a short read lock and never holds the lock while a
/// handler runs.
pub struct EventBus {
    registry: RwLock<HashMap<EventType, Subscribers>>,
    published: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(HashMap::new()),
            published: AtomicU64::new(0),
        }
    }

    /// Register `handler` for every event type it declares
    pub fn subscribe(&self, handler: Arc<dyn EventHandler>) {
        let mut registry = self.registry.write();
        for event_type in handler.event_types() {
            let list: Subscribers = match registry.get(event_type) {
                Some(existing) => existing
                    .iter()
                    .cloned()
                    .chain(std::iter::once(Arc::clone(&handler)))
                    .collect(),
                None => Arc::from(vec![Arc::clone(&handler)]),
            };
            registry.insert(*event_type, list);
        }
        tracing::debug!(handler = handler.name(), "event handler subscribed");
    }

    /// Remove every registration of `handler` (no-op if never subscribed)
    pub fn unsubscribe(&self, handler: &dyn EventHandler) {
        let target = handler_addr(handler);
        let mut registry = self.registry.write();
        registry.retain(|_, list| {
            if list.iter().any(|h| handler_addr(h.as_ref()) == target) {
                *list = list
                    .iter()
                    .filter(|h| handler_addr(h.as_ref()) != target)
                    .cloned()
                    .collect();
            }
            !list.is_empty()
        });
    }

    /// Deliver `event` to every handler subscribed for its type, in
    /// subscription order
    pub fn publish(&self, event: Event) {
        self.published.fetch_add(1, Ordering::Relaxed);
        self.dispatch(&event, Origin::Publish);
    }

    /// Number of handlers registered for `event_type`
    pub fn subscriber_count(&self, event_type: EventType) -> usize {
        self.registry
            .read()
            .get(&event_type)
            .map_or(0, |list| list.len())
    }

    /// Number of events published so far (failure reports excluded)
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    fn snapshot(&self, event_type: EventType) -> Option<Subscribers> {
        self.registry.read().get(&event_type).cloned()
    }

    fn dispatch(&self, event: &Event, origin: Origin) {
        let event_type = event.event_type();
        let Some(subscribers) = self.snapshot(event_type) else {
            return;
        };

        for handler in subscribers.iter() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.handle(event)));
            let error = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(error)) => error,
                Err(payload) => AnalysisError::HandlerPanicked {
                    handler: handler.name().to_string(),
                    message: panic_message(payload.as_ref()),
                },
            };
            self.report_failure(handler.as_ref(), event_type, &error, origin);
        }
    }

    fn report_failure(
        &self,
        handler: &dyn EventHandler,
        event_type: EventType,
        error: &AnalysisError,
        origin: Origin,
    ) {
        tracing::error!(
            handler = handler.name(),
            event_type = %event_type,
            error = %error,
            "event handler failed"
        );
        // A failure while handling a failure report is never republished.
        if origin == Origin::FailureReport {
            return;
        }

        let report = MessageEvent::error(
            "Event handler {HandlerName} failed while handling {EventType}: {Reason}",
        )
        .arg(handler.name())
        .arg(event_type.to_string())
        .arg(error.to_string());

        self.dispatch(&Event::message(report), Origin::FailureReport);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl EventQueue for EventBus {
    fn enqueue(&self, event: Event) {
        self.publish(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.read();
        let mut types: Vec<_> = registry.iter().map(|(t, l)| (*t, l.len())).collect();
        types.sort();
        f.debug_struct("EventBus")
            .field("subscribers", &types)
            .field("published", &self.published_count())
            .finish()
    }
}
