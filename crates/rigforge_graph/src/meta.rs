// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed views over graph nodes.
//!
//! A [`MetaNode`] pairs a node key with the domain type that tagged it.
//! It holds no state of its own: every read and write goes through the
//! [`Graph`] passed in, so wrappers can be created and dropped freely.

use crate::attribute::{AttrType, AttrValue};
use crate::connection::{ConnectionId, AFFECTED_BY, MESSAGE};
use crate::graph::{Graph, GraphError};
use crate::node::{NodeId, NodeKey, NodeKind};
use crate::search::{self, Direction};
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

/// Attribute holding the domain type tag
pub const META_TYPE: &str = "meta_type";

/// Typed handle to a network node. Equality and hashing use the node ID.
#[derive(Debug, Clone, Copy)]
pub struct MetaNode {
    /// Arena key
    pub key: NodeKey,
    /// Unique node ID
    pub id: NodeId,
    /// Registered type name
    pub type_name: &'static str,
}

impl PartialEq for MetaNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MetaNode {}

impl Hash for MetaNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl MetaNode {
    /// Bind a handle without consulting the tag
    pub fn bind(key: NodeKey, id: NodeId, type_name: &'static str) -> Self {
        Self { key, id, type_name }
    }

    /// Wrap a node according to its tag
    pub fn from_key(graph: &Graph, key: NodeKey) -> Option<Self> {
        graph.registry().create_from_node(graph, key)
    }

    /// Whether the underlying node still exists
    pub fn exists(&self, graph: &Graph) -> bool {
        graph.contains(self.key)
    }

    /// Node name
    pub fn name<'g>(&self, graph: &'g Graph) -> &'g str {
        graph.name_of(self.key)
    }

    /// Whether this node's type is `target` or derives from it
    pub fn is_a(&self, graph: &Graph, target: &str) -> bool {
        graph.registry().is_a(self.type_name, target)
    }

    /// Read an attribute, creating it with `default_type` when absent
    pub fn get(&self, graph: &mut Graph, name: &str, default_type: AttrType) -> AttrValue {
        // Missing nodes read as empty, like any other soft miss
        let _ = graph.add_attribute(self.key, name, default_type);
        graph
            .value(self.key, name)
            .cloned()
            .unwrap_or_else(|| AttrValue::String(String::new()))
    }

    /// Read an attribute without creating it
    pub fn value(&self, graph: &Graph, name: &str) -> Option<AttrValue> {
        graph.value(self.key, name).cloned()
    }

    /// Read a string attribute, `""` when absent
    pub fn get_string(&self, graph: &Graph, name: &str) -> String {
        graph
            .value(self.key, name)
            .and_then(AttrValue::as_str)
            .unwrap_or_default()
            .to_string()
    }

    /// Read an integer attribute, `0` when absent
    pub fn get_int(&self, graph: &Graph, name: &str) -> i64 {
        graph
            .value(self.key, name)
            .and_then(AttrValue::as_int)
            .unwrap_or_default()
    }

    /// Read a float attribute, `0.0` when absent
    pub fn get_float(&self, graph: &Graph, name: &str) -> f64 {
        graph
            .value(self.key, name)
            .and_then(AttrValue::as_float)
            .unwrap_or_default()
    }

    /// Read a bool attribute, `false` when absent
    pub fn get_bool(&self, graph: &Graph, name: &str) -> bool {
        graph
            .value(self.key, name)
            .and_then(AttrValue::as_bool)
            .unwrap_or_default()
    }

    /// Read a vector attribute, zero when absent
    pub fn get_vector3(&self, graph: &Graph, name: &str) -> [f64; 3] {
        graph
            .value(self.key, name)
            .and_then(AttrValue::as_vector3)
            .unwrap_or_default()
    }

    /// Write an attribute, creating it when absent.
    ///
    /// Link slots are refused with [`GraphError::LinkAttribute`].
    pub fn set(
        &self,
        graph: &mut Graph,
        name: &str,
        value: impl Into<AttrValue>,
    ) -> Result<(), GraphError> {
        graph.set_value(self.key, name, value)
    }

    /// Add an attribute if absent
    pub fn add_attr(&self, graph: &mut Graph, name: &str, attr_type: AttrType) -> bool {
        graph
            .add_attribute(self.key, name, attr_type)
            .unwrap_or(false)
    }

    /// Owned neighbours in link order, optionally filtered by type
    pub fn get_connections(&self, graph: &Graph, type_filter: Option<&str>) -> Vec<NodeKey> {
        let owned = search::neighbors(graph, self.key, Direction::Downstream);
        match type_filter {
            None => owned,
            Some(target) => owned
                .into_iter()
                .filter(|k| search::compatible(graph, *k, target).is_some())
                .collect(),
        }
    }

    /// Link this node as an owner of `target`.
    ///
    /// `target_attr` defaults to the `affectedBy` array. Repeating an
    /// existing link is a no-op.
    pub fn connect_node(
        &self,
        graph: &mut Graph,
        target: NodeKey,
        target_attr: Option<&str>,
    ) -> Result<ConnectionId, GraphError> {
        link(graph, self.key, target, target_attr)
    }

    /// Remove the links between this node and `target` only
    pub fn disconnect_node(&self, graph: &mut Graph, target: NodeKey) -> usize {
        graph.disconnect(self.key, target)
    }

    /// First owner of type `target`, or self when compatible
    pub fn get_upstream(&self, graph: &Graph, target: &str) -> Option<MetaNode> {
        search::find_first(graph, self.key, target, Direction::Upstream)
    }

    /// First owned node of type `target`, or self when compatible
    pub fn get_downstream(&self, graph: &Graph, target: &str) -> Option<MetaNode> {
        search::find_first(graph, self.key, target, Direction::Downstream)
    }

    /// Every owner of type `target`
    pub fn get_all_upstream(&self, graph: &Graph, target: &str) -> Vec<MetaNode> {
        search::find_all(graph, self.key, target, Direction::Upstream)
    }

    /// Every owned node of type `target`
    pub fn get_all_downstream(&self, graph: &Graph, target: &str) -> Vec<MetaNode> {
        search::find_all(graph, self.key, target, Direction::Downstream)
    }

    /// Typed [`MetaNode::get_upstream`]
    pub fn upstream<T: NetworkNode>(&self, graph: &Graph) -> Option<T> {
        self.get_upstream(graph, T::TYPE_NAME).map(T::from_meta)
    }

    /// Typed [`MetaNode::get_downstream`]
    pub fn downstream<T: NetworkNode>(&self, graph: &Graph) -> Option<T> {
        self.get_downstream(graph, T::TYPE_NAME).map(T::from_meta)
    }

    /// Typed [`MetaNode::get_all_upstream`]
    pub fn all_upstream<T: NetworkNode>(&self, graph: &Graph) -> Vec<T> {
        self.get_all_upstream(graph, T::TYPE_NAME)
            .into_iter()
            .map(T::from_meta)
            .collect()
    }

    /// Typed [`MetaNode::get_all_downstream`]
    pub fn all_downstream<T: NetworkNode>(&self, graph: &Graph) -> Vec<T> {
        self.get_all_downstream(graph, T::TYPE_NAME)
            .into_iter()
            .map(T::from_meta)
            .collect()
    }

    /// Network nodes owned by this one, transitively, in pre-order.
    ///
    /// The walk only passes through network nodes, so scene objects and
    /// anything hanging beneath them are left alone.
    pub fn owned_network(&self, graph: &Graph) -> Vec<NodeKey> {
        let mut result = Vec::new();
        let mut visited = HashSet::from([self.key]);
        let mut stack: Vec<NodeKey> = graph.outgoing(self.key).into_iter().rev().collect();
        while let Some(next) = stack.pop() {
            let is_network = graph.node(next).is_some_and(|n| n.kind == NodeKind::Network);
            if !is_network || !visited.insert(next) {
                continue;
            }
            result.push(next);
            stack.extend(graph.outgoing(next).into_iter().rev());
        }
        result
    }

    /// Delete this node and every network node it owns, leaves first.
    ///
    /// Returns the number of nodes removed.
    pub fn delete_all(&self, graph: &mut Graph) -> usize {
        let mut doomed = vec![self.key];
        doomed.extend(self.owned_network(graph));
        let count = doomed
            .into_iter()
            .rev()
            .filter(|key| graph.remove_node(*key).is_some())
            .count();
        tracing::debug!("Deleted {count} network nodes");
        count
    }

    /// Delete only this node
    pub fn delete(&self, graph: &mut Graph) -> bool {
        graph.remove_node(self.key).is_some()
    }
}

/// Link `owner` to `target`, tagging both ends with their link plugs.
///
/// Works on any node, tagged or not. `target_attr` defaults to the
/// `affectedBy` array.
pub fn link(
    graph: &mut Graph,
    owner: NodeKey,
    target: NodeKey,
    target_attr: Option<&str>,
) -> Result<ConnectionId, GraphError> {
    let target_attr = target_attr.unwrap_or(AFFECTED_BY);
    graph.add_attribute(owner, MESSAGE, AttrType::Message)?;
    if target_attr == AFFECTED_BY {
        graph.add_attribute(target, AFFECTED_BY, AttrType::MessageArray)?;
    }
    let id = graph.connect(owner, target, target_attr)?;
    tracing::debug!(
        "Linked {} -> {}.{}",
        graph.name_of(owner),
        graph.name_of(target),
        target_attr
    );
    Ok(id)
}

/// A strongly typed wrapper over a [`MetaNode`]
pub trait NetworkNode: Sized + Copy {
    /// Registered type name
    const TYPE_NAME: &'static str;

    /// Wrap a handle already known to be compatible
    fn from_meta(meta: MetaNode) -> Self;

    /// Underlying handle
    fn meta(&self) -> MetaNode;

    /// Arena key of the underlying node
    fn key(&self) -> NodeKey {
        self.meta().key
    }

    /// Wrap a handle when its type is compatible
    fn cast(graph: &Graph, meta: MetaNode) -> Option<Self> {
        meta.is_a(graph, Self::TYPE_NAME).then(|| Self::from_meta(meta))
    }

    /// Wrap a node when its tag is compatible
    fn from_key(graph: &Graph, key: NodeKey) -> Option<Self> {
        MetaNode::from_key(graph, key).and_then(|meta| Self::cast(graph, meta))
    }
}

/// Declare a typed [`NetworkNode`] wrapper for a registered type.
///
/// ```
/// rigforge_graph::network_node! {
///     /// Root of everything
///     pub Core => "Core"
/// }
/// ```
#[macro_export]
macro_rules! network_node {
    ($(#[$attr:meta])* $vis:vis $name:ident => $tag:expr) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis struct $name(pub $crate::MetaNode);

        impl $crate::NetworkNode for $name {
            const TYPE_NAME: &'static str = $tag;

            fn from_meta(meta: $crate::MetaNode) -> Self {
                Self(meta)
            }

            fn meta(&self) -> $crate::MetaNode {
                self.0
            }
        }

        impl ::std::ops::Deref for $name {
            type Target = $crate::MetaNode;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }
    };
}
