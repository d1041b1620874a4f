//! Out-of-order lifetime scope disposal
//!
//! A scope completing while it still has active children means the children
//! outlive the boundary that was supposed to own them. The first such scope
//! per description is reported; later scopes with the same description are
//! the same actionable fact and stay quiet.

use std::sync::Arc;

use dashmap::DashSet;

use crate::bus::{EventHandler, EventQueue};
use crate::error::Result;
use crate::event::{Event, EventKind, EventType, MessageEvent, TrackedItem};
use crate::model::LifetimeScope;

const HANDLED: &[EventType] = &[EventType::LifetimeScopeCompleted];

/// Scope descriptions that have already produced a warning
#[derive(Debug, Default)]
pub struct WarnedDescriptions {
    descriptions: DashSet<String>,
}

impl WarnedDescriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `description`; true only for the first caller
    pub fn first_warning(&self, description: &str) -> bool {
        self.descriptions.insert(description.to_string())
    }

    pub fn contains(&self, description: &str) -> bool {
        self.descriptions.contains(description)
    }

    pub fn len(&self) -> usize {
        self.descriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }
}

/// Flags lifetime scopes disposed before their active children
pub struct OutOfOrderDisposalDetector {
    queue: Arc<dyn EventQueue>,
    warned: Arc<WarnedDescriptions>,
}

impl OutOfOrderDisposalDetector {
    pub fn new(queue: Arc<dyn EventQueue>) -> Self {
        Self::with_warned(queue, Arc::new(WarnedDescriptions::new()))
    }

    /// Detector sharing an existing warned set
    pub fn with_warned(queue: Arc<dyn EventQueue>, warned: Arc<WarnedDescriptions>) -> Self {
        Self { queue, warned }
    }

    pub fn warned(&self) -> &Arc<WarnedDescriptions> {
        &self.warned
    }

    /// Check a completed scope; returns whether a warning was enqueued
    pub fn inspect(&self, scope: &LifetimeScope) -> bool {
        let children = scope.active_children();
        if children.is_empty() || !self.warned.first_warning(scope.description()) {
            return false;
        }

        let child_descriptions: Vec<&str> = children.iter().map(|c| c.description()).collect();
        tracing::debug!(
            scope = scope.description(),
            active_children = child_descriptions.len(),
            "lifetime scope disposed out of order"
        );

        let message = MessageEvent::error(
            "A {LifetimeScopeDescription} lifetime scope, {LifetimeScopeId}, was disposed \
             before its active children (including {ChildScopeDescriptions}).",
        )
        .arg(scope.description())
        .arg(scope.id().to_string())
        .arg(child_descriptions);

        self.queue.enqueue(Event::message(message));
        true
    }
}

impl EventHandler for OutOfOrderDisposalDetector {
    fn name(&self) -> &str {
        "OutOfOrderDisposalDetector"
    }

    fn event_types(&self) -> &[EventType] {
        HANDLED
    }

    fn handle(&self, event: &Event) -> Result<()> {
        if let EventKind::ItemCompleted(TrackedItem::LifetimeScope(scope)) = &event.kind {
            self.inspect(scope);
        }
        Ok(())
    }
}

impl std::fmt::Debug for OutOfOrderDisposalDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutOfOrderDisposalDetector")
            .field("warned", &self.warned.len())
            .finish()
    }
}
