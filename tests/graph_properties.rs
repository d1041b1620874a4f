//! Property-based tests for object graph serialization
//!
//! Random lookup trees are built, serialized, and compared against the
//! shape they were built from.

use std::sync::Arc;

use proptest::prelude::*;
use serde_json::Value;

use resolve_diagnostics::graph::serialize;
use resolve_diagnostics::{InstanceLookup, LifetimeScope};

/// Shape of a lookup tree, independent of the model types
#[derive(Debug, Clone)]
struct Shape {
    component: String,
    scope: usize,
    reused: bool,
    children: Vec<Shape>,
}

fn arb_shape() -> impl Strategy<Value = Shape> {
    let leaf = ("[A-Z][a-zA-Z]{0,10}", 0..3usize, any::<bool>()).prop_map(
        |(component, scope, reused)| Shape {
            component,
            scope,
            reused,
            children: Vec::new(),
        },
    );
    leaf.prop_recursive(5, 64, 6, |inner| {
        (
            "[A-Z][a-zA-Z]{0,10}",
            0..3usize,
            any::<bool>(),
            prop::collection::vec(inner, 0..6),
        )
            .prop_map(|(component, scope, reused, children)| Shape {
                component,
                scope,
                reused,
                children,
            })
    })
}

fn build(shape: &Shape, scopes: &[Arc<LifetimeScope>]) -> Arc<InstanceLookup> {
    let scope = &scopes[shape.scope];
    let lookup = if shape.reused {
        InstanceLookup::reused(shape.component.clone(), scope)
    } else {
        InstanceLookup::new(shape.component.clone(), scope)
    };
    for child in &shape.children {
        lookup.add_dependency(build(child, scopes));
    }
    Arc::new(lookup)
}

fn scopes() -> Vec<Arc<LifetimeScope>> {
    let root = LifetimeScope::root("root");
    let request = root.begin_child("PerRequest");
    let message = root.begin_child("PerMessage");
    vec![root, request, message]
}

/// Walk the JSON form alongside the shape it came from
fn check(value: &Value, shape: &Shape, scopes: &[Arc<LifetimeScope>]) -> Result<(), TestCaseError> {
    let object = value
        .as_object()
        .ok_or_else(|| TestCaseError::fail("node is not an object"))?;

    prop_assert_eq!(&object["component"], &Value::from(shape.component.as_str()));
    prop_assert_eq!(
        &object["scope"],
        &Value::from(scopes[shape.scope].description())
    );
    prop_assert_eq!(object.contains_key("reused"), shape.reused);
    if shape.reused {
        prop_assert_eq!(&object["reused"], &Value::Bool(true));
    }

    if shape.children.is_empty() {
        prop_assert!(!object.contains_key("dependencies"));
        return Ok(());
    }

    let dependencies = object["dependencies"]
        .as_array()
        .ok_or_else(|| TestCaseError::fail("dependencies is not an array"))?;
    prop_assert_eq!(dependencies.len(), shape.children.len());
    for (dependency, child) in dependencies.iter().zip(&shape.children) {
        check(dependency, child, scopes)?;
    }
    Ok(())
}

fn count(shape: &Shape) -> usize {
    1 + shape.children.iter().map(count).sum::<usize>()
}

proptest! {
    /// Property: serialized tree mirrors the lookup tree, order included
    #[test]
    fn serialized_graph_mirrors_lookups(shape in arb_shape()) {
        let scopes = scopes();
        let root = build(&shape, &scopes);

        let node = serialize(&root).unwrap();

        prop_assert_eq!(node.node_count(), count(&shape));
        check(&node.to_value(), &shape, &scopes)?;
    }

    /// Property: a shared lookup under every child never counts as a cycle
    #[test]
    fn shared_lookups_are_not_cycles(width in 1..8usize) {
        let scopes = scopes();
        let shared = Arc::new(InstanceLookup::reused("Logger", &scopes[0]));
        let root = InstanceLookup::new("OrderService", &scopes[1]);
        for i in 0..width {
            let child = InstanceLookup::new(format!("Dependency{i}"), &scopes[1])
                .with_dependency(Arc::clone(&shared));
            root.add_dependency(Arc::new(child));
        }

        let node = serialize(&Arc::new(root)).unwrap();

        prop_assert_eq!(node.dependencies.len(), width);
        prop_assert!(node
            .dependencies
            .iter()
            .all(|d| d.dependencies[0].component == "Logger" && d.dependencies[0].reused));
        prop_assert_eq!(node.depth(), 3);
    }
}
