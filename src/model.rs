//! Tracked items handed to the diagnostics core by the resolution pipeline
//!
//! Key types:
//! - `ItemId`: random identifier with a short, human-scannable rendering
//! - `ResolveOperation`: one (possibly nested) request for a component
//! - `InstanceLookup`: one node of the dependency tree built for an operation
//! - `LifetimeScope`: a disposal boundary with live child tracking
//!
//! The pipeline creates and fills these; the core only reads them.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AnalysisError, Result};

/// Default number of hex digits in a short id
pub const DEFAULT_SHORT_ID_LENGTH: usize = 8;

// ═══════════════════════════════════════════════════════════════
// ItemId
// ═══════════════════════════════════════════════════════════════

/// Globally unique identifier of a tracked item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

impl ItemId {
    /// Fresh random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// First `len` hex digits of the id (clamped to 1..=32)
    pub fn short(&self, len: usize) -> String {
        let mut simple = self.0.simple().to_string();
        simple.truncate(len.clamp(1, simple.len()));
        simple
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

// ═══════════════════════════════════════════════════════════════
// ResolveOperation
// ═══════════════════════════════════════════════════════════════

/// One request to obtain an instance of a component
///
/// Nested operations refer to their parent by id only; the child never keeps
/// the parent alive.
#[derive(Debug)]
pub struct ResolveOperation {
    id: ItemId,
    parent: Option<ItemId>,
    calling_method: Option<String>,
    root_instance_lookup: OnceCell<Arc<InstanceLookup>>,
}

impl ResolveOperation {
    /// Top-level operation started from `calling_method`
    pub fn new(calling_method: impl Into<String>) -> Self {
        Self {
            id: ItemId::new(),
            parent: None,
            calling_method: Some(calling_method.into()),
            root_instance_lookup: OnceCell::new(),
        }
    }

    /// Operation started while `parent` was still resolving
    pub fn nested(parent: &ResolveOperation) -> Self {
        Self {
            id: ItemId::new(),
            parent: Some(parent.id),
            calling_method: None,
            root_instance_lookup: OnceCell::new(),
        }
    }

    /// Replace the generated id (deterministic ids for tests and replays)
    pub fn with_id(mut self, id: ItemId) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn parent_id(&self) -> Option<ItemId> {
        self.parent
    }

    pub fn calling_method(&self) -> Option<&str> {
        self.calling_method.as_deref()
    }

    /// Record the root of the dependency tree; allowed once
    pub fn complete(&self, root: Arc<InstanceLookup>) -> Result<()> {
        self.root_instance_lookup
            .set(root)
            .map_err(|_| AnalysisError::RootAlreadySet {
                operation: self.id.to_string(),
            })
    }

    pub fn root_instance_lookup(&self) -> Option<&Arc<InstanceLookup>> {
        self.root_instance_lookup.get()
    }
}

// ═══════════════════════════════════════════════════════════════
// InstanceLookup
// ═══════════════════════════════════════════════════════════════

/// One node of work performed while satisfying a resolve operation
#[derive(Debug)]
pub struct InstanceLookup {
    component: String,
    activation_scope: Arc<LifetimeScope>,
    shared_instance_reused: bool,
    dependency_lookups: RwLock<Vec<Arc<InstanceLookup>>>,
}

impl InstanceLookup {
    /// Lookup that activates a new instance of `component` in `scope`
    pub fn new(component: impl Into<String>, scope: &Arc<LifetimeScope>) -> Self {
        Self {
            component: component.into(),
            activation_scope: Arc::clone(scope),
            shared_instance_reused: false,
            dependency_lookups: RwLock::new(Vec::new()),
        }
    }

    /// Lookup that returned a previously activated shared instance
    pub fn reused(component: impl Into<String>, scope: &Arc<LifetimeScope>) -> Self {
        let mut lookup = Self::new(component, scope);
        lookup.shared_instance_reused = true;
        lookup
    }

    /// Append a dependency (call order is resolution order)
    pub fn add_dependency(&self, lookup: Arc<InstanceLookup>) {
        self.dependency_lookups.write().push(lookup);
    }

    /// Builder-style `add_dependency`
    pub fn with_dependency(self, lookup: Arc<InstanceLookup>) -> Self {
        self.add_dependency(lookup);
        self
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn activation_scope(&self) -> &Arc<LifetimeScope> {
        &self.activation_scope
    }

    pub fn shared_instance_reused(&self) -> bool {
        self.shared_instance_reused
    }

    /// Snapshot of the dependency lookups in resolution order
    pub fn dependency_lookups(&self) -> Vec<Arc<InstanceLookup>> {
        self.dependency_lookups.read().clone()
    }

    pub fn has_dependencies(&self) -> bool {
        !self.dependency_lookups.read().is_empty()
    }
}

impl Drop for InstanceLookup {
    // Unlink uniquely owned dependencies one at a time so long chains do not
    // recurse on drop. Shared dependencies just lose a reference.
    fn drop(&mut self) {
        let mut pending = std::mem::take(self.dependency_lookups.get_mut());
        while let Some(lookup) = pending.pop() {
            if let Ok(mut owned) = Arc::try_unwrap(lookup) {
                pending.append(owned.dependency_lookups.get_mut());
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// LifetimeScope
// ═══════════════════════════════════════════════════════════════

/// A disposal boundary that owns instances and child scopes
///
/// `description` is not unique: every scope created from the same factory
/// usually shares one.
#[derive(Debug)]
pub struct LifetimeScope {
    id: ItemId,
    description: String,
    parent: Option<ItemId>,
    active_children: RwLock<Vec<Arc<LifetimeScope>>>,
}

impl LifetimeScope {
    /// Root scope (no parent)
    pub fn root(description: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: ItemId::new(),
            description: description.into(),
            parent: None,
            active_children: RwLock::new(Vec::new()),
        })
    }

    /// Create a child scope and track it as active until `child_disposed`
    pub fn begin_child(&self, description: impl Into<String>) -> Arc<Self> {
        let child = Arc::new(Self {
            id: ItemId::new(),
            description: description.into(),
            parent: Some(self.id),
            active_children: RwLock::new(Vec::new()),
        });
        self.active_children.write().push(Arc::clone(&child));
        child
    }

    /// Stop tracking a child; returns whether it was active
    pub fn child_disposed(&self, child: ItemId) -> bool {
        let mut children = self.active_children.write();
        let before = children.len();
        children.retain(|c| c.id != child);
        children.len() != before
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parent_id(&self) -> Option<ItemId> {
        self.parent
    }

    /// Children not yet disposed, in creation order
    pub fn active_children(&self) -> Vec<Arc<LifetimeScope>> {
        self.active_children.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ═══════════════════════════════════════════════════════════════
    // ItemId tests
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn short_id_is_prefix_of_simple_form() {
        let uuid = Uuid::parse_str("a1b2c3d4-e5f6-4789-9abc-def012345678").unwrap();
        let id = ItemId::from_uuid(uuid);

        assert_eq!(id.short(8), "a1b2c3d4");
        assert_eq!(id.short(DEFAULT_SHORT_ID_LENGTH), "a1b2c3d4");
        assert_eq!(id.to_string(), "a1b2c3d4-e5f6-4789-9abc-def012345678");
    }

    #[test]
    fn short_id_length_is_clamped() {
        let id = ItemId::new();
        assert_eq!(id.short(0).len(), 1);
        assert_eq!(id.short(100).len(), 32);
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(ItemId::new(), ItemId::new());
    }

    // ═══════════════════════════════════════════════════════════════
    // ResolveOperation tests
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn nested_operation_refers_to_parent_by_id() {
        let outer = ResolveOperation::new("Main.Start");
        let inner = ResolveOperation::nested(&outer);

        assert_eq!(inner.parent_id(), Some(outer.id()));
        assert_eq!(inner.calling_method(), None);
        assert_eq!(outer.calling_method(), Some("Main.Start"));
    }

    #[test]
    fn root_lookup_is_set_once() {
        let scope = LifetimeScope::root("root");
        let op = ResolveOperation::new("Main.Start");
        assert!(op.root_instance_lookup().is_none());

        op.complete(Arc::new(InstanceLookup::new("A", &scope))).unwrap();
        let err = op
            .complete(Arc::new(InstanceLookup::new("B", &scope)))
            .unwrap_err();

        assert!(matches!(err, AnalysisError::RootAlreadySet { .. }));
        assert_eq!(op.root_instance_lookup().unwrap().component(), "A");
    }

    // ═══════════════════════════════════════════════════════════════
    // InstanceLookup tests
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn dependencies_keep_insertion_order() {
        let scope = LifetimeScope::root("root");
        let lookup = InstanceLookup::new("OrderService", &scope)
            .with_dependency(Arc::new(InstanceLookup::new("Logger", &scope)))
            .with_dependency(Arc::new(InstanceLookup::reused("Clock", &scope)));

        let deps = lookup.dependency_lookups();
        let names: Vec<_> = deps.iter().map(|d| d.component()).collect();
        assert_eq!(names, vec!["Logger", "Clock"]);
        assert!(!deps[0].shared_instance_reused());
        assert!(deps[1].shared_instance_reused());
        assert_eq!(lookup.activation_scope().description(), "root");
    }

    #[test]
    fn long_dependency_chain_drops() {
        let scope = LifetimeScope::root("root");
        let mut tail = Arc::new(InstanceLookup::new("Level0", &scope));
        for i in 1..100_000 {
            tail = Arc::new(InstanceLookup::new(format!("Level{i}"), &scope).with_dependency(tail));
        }
        assert!(tail.has_dependencies());
    }

    #[test]
    fn shared_dependency_survives_parent_drop() {
        let scope = LifetimeScope::root("root");
        let shared = Arc::new(InstanceLookup::reused("Config", &scope));
        let parent = InstanceLookup::new("Service", &scope).with_dependency(Arc::clone(&shared));

        drop(parent);

        assert_eq!(Arc::strong_count(&shared), 1);
        assert_eq!(shared.component(), "Config");
    }

    // ═══════════════════════════════════════════════════════════════
    // LifetimeScope tests
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn children_are_tracked_until_disposed() {
        let root = LifetimeScope::root("root");
        let a = root.begin_child("PerRequest");
        let b = root.begin_child("PerRequest");

        assert_eq!(a.parent_id(), Some(root.id()));
        assert_eq!(root.active_children().len(), 2);

        assert!(root.child_disposed(a.id()));
        assert!(!root.child_disposed(a.id()));

        let remaining = root.active_children();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id(), b.id());
    }
}
