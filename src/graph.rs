//! Object graph serialization
//!
//! Turns the dependency-lookup tree of a resolve operation into an ordered,
//! structured `GraphNode` tree for logging and inspection.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AnalysisError, Result};
use crate::model::InstanceLookup;

/// One serialized instance lookup
///
/// `reused` is only present when true and `dependencies` only when
/// non-empty, which keeps leaves terse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub component: String,
    pub scope: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub reused: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<GraphNode>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl GraphNode {
    pub fn leaf(component: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            scope: scope.into(),
            reused: false,
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependency(mut self, node: GraphNode) -> Self {
        self.dependencies.push(node);
        self
    }

    pub fn as_reused(mut self) -> Self {
        self.reused = true;
        self
    }

    /// JSON form of the subtree, built without recursion
    pub fn to_value(&self) -> Value {
        let mut stack: Vec<(&GraphNode, Vec<Value>)> = vec![(self, Vec::new())];
        loop {
            let (node, done) = match stack.last() {
                Some((node, built)) => (*node, built.len()),
                None => return Value::Null,
            };
            if let Some(child) = node.dependencies.get(done) {
                stack.push((child, Vec::with_capacity(child.dependencies.len())));
                continue;
            }

            let Some((node, built)) = stack.pop() else {
                return Value::Null;
            };
            let value = node.object(built);
            match stack.last_mut() {
                Some((_, parent)) => parent.push(value),
                None => return value,
            }
        }
    }

    fn object(&self, dependencies: Vec<Value>) -> Value {
        let mut map = Map::new();
        map.insert("component".into(), Value::from(self.component.as_str()));
        map.insert("scope".into(), Value::from(self.scope.as_str()));
        if self.reused {
            map.insert("reused".into(), Value::Bool(true));
        }
        if !dependencies.is_empty() {
            map.insert("dependencies".into(), Value::Array(dependencies));
        }
        Value::Object(map)
    }

    /// Nodes in this subtree, including self
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            count += 1;
            pending.extend(node.dependencies.iter());
        }
        count
    }

    /// Longest root-to-leaf path, counted in nodes
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 1)];
        while let Some((node, level)) = pending.pop() {
            deepest = deepest.max(level);
            pending.extend(node.dependencies.iter().map(|d| (d, level + 1)));
        }
        deepest
    }
}

impl Drop for GraphNode {
    // Flatten before dropping so deep trees free without recursion.
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.dependencies);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.dependencies);
        }
    }
}

/// Lookup being visited, with the nodes of its already-finished children
struct Frame {
    lookup: Arc<InstanceLookup>,
    children: Vec<Arc<InstanceLookup>>,
    next: usize,
    built: Vec<GraphNode>,
}

impl Frame {
    fn enter(lookup: Arc<InstanceLookup>) -> Self {
        let children = lookup.dependency_lookups();
        let built = Vec::with_capacity(children.len());
        Self {
            lookup,
            children,
            next: 0,
            built,
        }
    }

    fn next_child(&mut self) -> Option<Arc<InstanceLookup>> {
        let child = self.children.get(self.next).cloned();
        self.next += 1;
        child
    }

    fn finish(self) -> GraphNode {
        GraphNode {
            component: self.lookup.component().to_string(),
            scope: self.lookup.activation_scope().description().to_string(),
            reused: self.lookup.shared_instance_reused(),
            dependencies: self.built,
        }
    }
}

fn addr(lookup: &Arc<InstanceLookup>) -> usize {
    Arc::as_ptr(lookup) as usize
}

/// Serialize the lookup tree rooted at `root`.
///
/// Walks with an explicit stack, so depth is limited only by memory. The
/// same shared lookup may appear under several parents; a lookup that is
/// its own ancestor fails with `GraphCycle`.
pub fn serialize(root: &Arc<InstanceLookup>) -> Result<GraphNode> {
    let mut path = HashSet::from([addr(root)]);
    let mut stack: Vec<Frame> = Vec::new();
    let mut current = Frame::enter(Arc::clone(root));

    loop {
        if let Some(child) = current.next_child() {
            if !path.insert(addr(&child)) {
                return Err(AnalysisError::GraphCycle {
                    component: child.component().to_string(),
                });
            }
            let parent = std::mem::replace(&mut current, Frame::enter(child));
            stack.push(parent);
            continue;
        }

        path.remove(&addr(&current.lookup));
        let node = current.finish();
        match stack.pop() {
            Some(mut parent) => {
                parent.built.push(node);
                current = parent;
            }
            None => return Ok(node),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LifetimeScope;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn lookup(component: &str, scope: &Arc<LifetimeScope>) -> Arc<InstanceLookup> {
        Arc::new(InstanceLookup::new(component, scope))
    }

    #[test]
    fn leaf_has_no_optional_fields() {
        let root = LifetimeScope::root("root");
        let node = serialize(&lookup("Logger", &root)).unwrap();

        assert_eq!(node.to_value(), json!({"component": "Logger", "scope": "root"}));
    }

    #[test]
    fn dependencies_keep_resolution_order() {
        let root = LifetimeScope::root("root");
        let request = root.begin_child("PerRequest");
        let service = lookup("OrderService", &request);
        service.add_dependency(lookup("Repository", &request));
        service.add_dependency(lookup("Logger", &root));
        service.add_dependency(lookup("Clock", &root));

        let node = serialize(&service).unwrap();
        let names: Vec<_> = node
            .dependencies
            .iter()
            .map(|d| d.component.as_str())
            .collect();

        assert_eq!(names, vec!["Repository", "Logger", "Clock"]);
        assert_eq!(node.scope, "PerRequest");
        assert_eq!(node.dependencies[1].scope, "root");
    }

    #[test]
    fn reused_only_when_true() {
        let root = LifetimeScope::root("root");
        let service = lookup("OrderService", &root);
        service.add_dependency(Arc::new(InstanceLookup::reused("Cache", &root)));

        assert_eq!(
            serialize(&service).unwrap().to_value(),
            json!({
                "component": "OrderService",
                "scope": "root",
                "dependencies": [
                    {"component": "Cache", "scope": "root", "reused": true}
                ]
            })
        );
    }

    #[test]
    fn nested_tree_matches_builder() {
        let root = LifetimeScope::root("root");
        let a = lookup("A", &root);
        let b = lookup("B", &root);
        b.add_dependency(lookup("C", &root));
        a.add_dependency(b);
        a.add_dependency(lookup("D", &root));

        let expected = GraphNode::leaf("A", "root")
            .with_dependency(
                GraphNode::leaf("B", "root").with_dependency(GraphNode::leaf("C", "root")),
            )
            .with_dependency(GraphNode::leaf("D", "root"));

        let node = serialize(&a).unwrap();
        assert_eq!(node, expected);
        assert_eq!(node.node_count(), 4);
        assert_eq!(node.depth(), 3);
    }

    #[test]
    fn shared_lookup_under_two_parents_is_not_a_cycle() {
        let root = LifetimeScope::root("root");
        let shared = Arc::new(InstanceLookup::reused("Config", &root));
        let left = lookup("Left", &root);
        let right = lookup("Right", &root);
        left.add_dependency(Arc::clone(&shared));
        right.add_dependency(Arc::clone(&shared));
        let top = lookup("Top", &root);
        top.add_dependency(left);
        top.add_dependency(right);

        let node = serialize(&top).unwrap();
        assert_eq!(node.node_count(), 5);
        assert!(node.dependencies.iter().all(|d| d.dependencies[0].reused));
    }

    #[test]
    fn cycle_fails_loudly() {
        let root = LifetimeScope::root("root");
        let a = lookup("A", &root);
        let b = lookup("B", &root);
        a.add_dependency(Arc::clone(&b));
        b.add_dependency(Arc::clone(&a));

        let err = serialize(&a).unwrap_err();
        assert!(matches!(err, AnalysisError::GraphCycle { ref component } if component == "A"));
    }

    #[test]
    fn deep_chain_does_not_overflow() {
        let root = LifetimeScope::root("root");
        let top = lookup("Level0", &root);
        let mut tail = Arc::clone(&top);
        for i in 1..50_000 {
            let next = lookup(&format!("Level{i}"), &root);
            tail.add_dependency(Arc::clone(&next));
            tail = next;
        }

        drop(tail);

        let node = serialize(&top).unwrap();
        assert_eq!(node.depth(), 50_000);
        assert_eq!(node.node_count(), 50_000);
    }

    #[test]
    fn deep_chain_converts_to_json() {
        let mut node = GraphNode::leaf("Level49999", "root");
        for i in (0..49_999).rev() {
            node = GraphNode::leaf(format!("Level{i}"), "root").with_dependency(node);
        }

        let mut value = node.to_value();
        let mut levels = 0;
        while let Some(Value::Array(mut deps)) = value.get_mut("dependencies").map(Value::take) {
            levels += 1;
            value = deps.pop().unwrap();
        }
        assert_eq!(levels, 49_999);
        assert_eq!(value["component"], "Level49999");
    }

    #[test]
    fn to_value_matches_derived_serialization() {
        let node = GraphNode::leaf("A", "PerRequest")
            .with_dependency(GraphNode::leaf("B", "root").as_reused())
            .with_dependency(
                GraphNode::leaf("C", "root").with_dependency(GraphNode::leaf("D", "root")),
            );
        assert_eq!(node.to_value(), serde_json::to_value(&node).unwrap());
    }

    #[test]
    fn graph_node_round_trips_through_json() {
        let node = GraphNode::leaf("A", "root")
            .with_dependency(GraphNode::leaf("B", "root").as_reused());
        let back: GraphNode = serde_json::from_value(node.to_value()).unwrap();
        assert_eq!(back, node);
    }
}
