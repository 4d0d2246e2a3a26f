// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dependent-node chains.
//!
//! A dependent type names the ancestor type it must hang beneath. Creating
//! one finds that ancestor below the given parent, or builds it first, so
//! every chain from `Core` down to a leaf is always connected.

use crate::attribute::AttrValue;
use crate::graph::{Graph, GraphError};
use crate::meta::{MetaNode, META_TYPE};
use crate::node::{NodeKey, NodeKind};
use crate::search;

/// Type name of the graph's root singleton
pub const CORE_TYPE: &str = "Core";

/// Longest `dependent_on` chain followed before giving up
const MAX_CHAIN_DEPTH: usize = 32;

/// Find the `Core` root, creating it when the graph has none
pub fn ensure_core(graph: &mut Graph) -> Result<MetaNode, GraphError> {
    let existing = graph
        .node_keys()
        .find_map(|key| search::compatible(graph, key, CORE_TYPE));
    if let Some(core) = existing {
        return Ok(core);
    }

    let key = graph.add_node(CORE_TYPE, NodeKind::Network);
    let core = tag(graph, key, CORE_TYPE)?;
    tracing::info!("Created {} root", CORE_TYPE);
    Ok(core)
}

/// Create a node of `type_name` beneath `parent`, or beneath `Core`.
///
/// When the type declares a required ancestor, the parent is used if it
/// is compatible, then the first compatible node owned by the parent, and
/// failing both the ancestor is created the same way.
pub fn create_dependent(
    graph: &mut Graph,
    type_name: &str,
    parent: Option<NodeKey>,
    namespace: Option<&str>,
    values: &[(&str, AttrValue)],
) -> Result<MetaNode, GraphError> {
    create_at_depth(graph, type_name, parent, namespace, values, 0)
}

fn create_at_depth(
    graph: &mut Graph,
    type_name: &str,
    parent: Option<NodeKey>,
    namespace: Option<&str>,
    values: &[(&str, AttrValue)],
    depth: usize,
) -> Result<MetaNode, GraphError> {
    if depth > MAX_CHAIN_DEPTH {
        return Err(GraphError::DependencyCycle(type_name.to_string()));
    }
    let info = *graph
        .registry()
        .resolve(type_name)
        .ok_or_else(|| GraphError::UnknownType(type_name.to_string()))?;

    let parent = match parent {
        Some(key) => {
            let node = graph.try_node(key)?;
            MetaNode::from_key(graph, key).ok_or_else(|| GraphError::TypeMismatch {
                node: node.name.clone(),
                expected: "MetaNode".to_string(),
            })?
        }
        None => ensure_core(graph)?,
    };

    let anchor = match info.dependent_on {
        None => parent,
        Some(required) if parent.is_a(graph, required) => parent,
        Some(required) => match parent.get_downstream(graph, required) {
            Some(found) => found,
            None => create_at_depth(graph, required, Some(parent.key), namespace, &[], depth + 1)?,
        },
    };

    let name = match namespace {
        Some(ns) if !ns.is_empty() => format!("{ns}:{}", info.name),
        _ => info.name.to_string(),
    };
    let key = graph.add_node(&name, NodeKind::Network);
    let meta = tag(graph, key, info.name)?;
    for (attr, value) in values {
        graph.set_value(key, attr, value.clone())?;
    }
    anchor.connect_node(graph, key, None)?;

    tracing::debug!(
        "Created {} beneath {}",
        graph.name_of(key),
        graph.name_of(anchor.key)
    );
    Ok(meta)
}

/// Create a tagged node of `type_name` that is not linked to anything
pub fn create_node(
    graph: &mut Graph,
    type_name: &str,
    name: &str,
    values: &[(&str, AttrValue)],
) -> Result<MetaNode, GraphError> {
    if graph.registry().resolve(type_name).is_none() {
        return Err(GraphError::UnknownType(type_name.to_string()));
    }
    let key = graph.add_node(name, NodeKind::Network);
    let meta = tag(graph, key, type_name)?;
    for (attr, value) in values {
        graph.set_value(key, attr, value.clone())?;
    }
    Ok(meta)
}

/// Bind an existing node as `type_name`, repairing drifted attributes.
///
/// Declared attributes whose stored type no longer matches are deleted and
/// recreated with the declared type.
pub fn bind_existing(
    graph: &mut Graph,
    key: NodeKey,
    type_name: &str,
) -> Result<MetaNode, GraphError> {
    graph.try_node(key)?;
    let specs = graph.registry().declared_attributes(type_name);
    let meta = tag(graph, key, type_name)?;

    let node = graph.node_mut(key).ok_or(GraphError::NodeNotFound(key))?;
    for spec in specs {
        let drifted = node
            .attribute(spec.name)
            .is_some_and(|a| a.attr_type != spec.attr_type || !a.is_consistent());
        if drifted {
            node.remove_attribute(spec.name);
            tracing::debug!(
                "Recreated {}.{} as {}",
                node.name,
                spec.name,
                spec.attr_type.name()
            );
        }
        node.add_attribute(spec.name, spec.attr_type);
    }
    Ok(meta)
}

/// Write the type tag and declared attributes onto a node
fn tag(graph: &mut Graph, key: NodeKey, type_name: &str) -> Result<MetaNode, GraphError> {
    let info = *graph
        .registry()
        .resolve(type_name)
        .ok_or_else(|| GraphError::UnknownType(type_name.to_string()))?;
    graph.set_value(key, META_TYPE, info.name)?;
    for spec in graph.registry().declared_attributes(info.name) {
        graph.add_attribute(key, spec.name, spec.attr_type)?;
    }
    let id = graph.try_node(key)?.id;
    Ok(MetaNode::bind(key, id, info.name))
}
