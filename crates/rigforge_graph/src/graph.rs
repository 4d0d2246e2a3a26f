// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes and links.

use crate::attribute::{AttrType, AttrValue};
use crate::connection::{Connection, ConnectionId, AFFECTED_BY};
use crate::node::{GraphNode, NodeId, NodeKey, NodeKind};
use crate::registry::NodeTypeRegistry;
use indexmap::IndexMap;

/// Arena slot
#[derive(Debug, Clone)]
struct Entry {
    generation: u32,
    node: Option<GraphNode>,
}

/// The metadata graph: every scene object, network node and link
#[derive(Debug, Clone)]
pub struct Graph {
    /// Graph name
    pub name: String,
    /// Arena slots
    entries: Vec<Entry>,
    /// Free slot indices
    free: Vec<u32>,
    /// Live nodes by unique ID, in creation order
    ids: IndexMap<NodeId, NodeKey>,
    /// Links in creation order
    connections: IndexMap<ConnectionId, Connection>,
    /// Type registry used to interpret `meta_type` tags
    registry: NodeTypeRegistry,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>, registry: NodeTypeRegistry) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
            free: Vec::new(),
            ids: IndexMap::new(),
            connections: IndexMap::new(),
            registry,
        }
    }

    /// Get the type registry
    pub fn registry(&self) -> &NodeTypeRegistry {
        &self.registry
    }

    /// Get the type registry mutably
    pub fn registry_mut(&mut self) -> &mut NodeTypeRegistry {
        &mut self.registry
    }

    /// Add a node. The name is made unique if it is already taken.
    pub fn add_node(&mut self, name: &str, kind: NodeKind) -> NodeKey {
        let name = self.unique_name(name);
        let key = match self.free.pop() {
            Some(index) => NodeKey {
                index,
                generation: self.entries[index as usize].generation,
            },
            None => {
                self.entries.push(Entry {
                    generation: 0,
                    node: None,
                });
                NodeKey {
                    index: (self.entries.len() - 1) as u32,
                    generation: 0,
                }
            }
        };
        let node = GraphNode::new(key, name, kind);
        self.ids.insert(node.id, key);
        self.entries[key.index as usize].node = Some(node);
        key
    }

    /// Remove a node, its links, and its place in the hierarchy.
    ///
    /// Children are orphaned, not removed.
    pub fn remove_node(&mut self, key: NodeKey) -> Option<GraphNode> {
        if !self.contains(key) {
            return None;
        }

        self.connections.retain(|_, c| !c.involves_node(key));

        let (parent, children) = {
            let node = self.node(key)?;
            (node.parent, node.children.clone())
        };
        if let Some(parent) = parent.and_then(|p| self.node_mut(p)) {
            parent.children.retain(|c| *c != key);
        }
        for child in children {
            if let Some(child) = self.node_mut(child) {
                child.parent = None;
            }
        }

        let entry = &mut self.entries[key.index as usize];
        let node = entry.node.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(key.index);
        self.ids.shift_remove(&node.id);
        Some(node)
    }

    /// Check whether a key still refers to a live node
    pub fn contains(&self, key: NodeKey) -> bool {
        self.node(key).is_some()
    }

    /// Get a node by key
    pub fn node(&self, key: NodeKey) -> Option<&GraphNode> {
        let entry = self.entries.get(key.index as usize)?;
        if entry.generation != key.generation {
            return None;
        }
        entry.node.as_ref()
    }

    /// Get a mutable node by key
    pub fn node_mut(&mut self, key: NodeKey) -> Option<&mut GraphNode> {
        let entry = self.entries.get_mut(key.index as usize)?;
        if entry.generation != key.generation {
            return None;
        }
        entry.node.as_mut()
    }

    /// Get a node or a `NodeNotFound` error
    pub fn try_node(&self, key: NodeKey) -> Result<&GraphNode, GraphError> {
        self.node(key).ok_or(GraphError::NodeNotFound(key))
    }

    /// Get all nodes in creation order
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.ids.values().filter_map(|key| self.node(*key))
    }

    /// Get all node keys in creation order
    pub fn node_keys(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.ids.values().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.ids.len()
    }

    /// Find a node by exact name
    pub fn find_by_name(&self, name: &str) -> Option<NodeKey> {
        self.nodes().find(|n| n.name == name).map(|n| n.key)
    }

    /// Find a node by unique ID
    pub fn find_by_id(&self, id: NodeId) -> Option<NodeKey> {
        self.ids.get(&id).copied()
    }

    /// Get the name of a node, or an empty string for a stale key
    pub fn name_of(&self, key: NodeKey) -> &str {
        self.node(key).map_or("", |n| n.name.as_str())
    }

    /// Make a name unique by appending a counter
    pub fn unique_name(&self, base: &str) -> String {
        if self.find_by_name(base).is_none() {
            return base.to_string();
        }
        let mut counter = 1;
        loop {
            let candidate = format!("{base}{counter}");
            if self.find_by_name(&candidate).is_none() {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Rename a node, returning the unique name it received
    pub fn rename(&mut self, key: NodeKey, name: &str) -> Result<String, GraphError> {
        let current = self.try_node(key)?.name.clone();
        if current == name {
            return Ok(current);
        }
        let unique = self.unique_name(name);
        if let Some(node) = self.node_mut(key) {
            node.name = unique.clone();
        }
        Ok(unique)
    }

    /// Add an attribute to a node if absent
    pub fn add_attribute(
        &mut self,
        key: NodeKey,
        name: &str,
        attr_type: AttrType,
    ) -> Result<bool, GraphError> {
        let node = self.node_mut(key).ok_or(GraphError::NodeNotFound(key))?;
        Ok(node.add_attribute(name, attr_type))
    }

    /// Get an attribute value
    pub fn value(&self, key: NodeKey, name: &str) -> Option<&AttrValue> {
        self.node(key)?.value(name)
    }

    /// Set an attribute value, creating the attribute when absent.
    ///
    /// Link attributes are never overwritten with plain values.
    pub fn set_value(
        &mut self,
        key: NodeKey,
        name: &str,
        value: impl Into<AttrValue>,
    ) -> Result<(), GraphError> {
        let node = self.node_mut(key).ok_or(GraphError::NodeNotFound(key))?;
        if let Some(attr) = node.attribute(name) {
            if attr.attr_type.is_link() {
                return Err(GraphError::LinkAttribute {
                    node: node.name.clone(),
                    attr: name.to_string(),
                });
            }
        }
        node.store_value(name, value.into());
        Ok(())
    }

    /// Set the hierarchy parent of a node
    pub fn set_parent(&mut self, key: NodeKey, parent: Option<NodeKey>) -> Result<(), GraphError> {
        let old_parent = self.try_node(key)?.parent;
        if let Some(parent) = parent {
            self.try_node(parent)?;
            if parent == key || self.ancestors(parent).contains(&key) {
                return Err(GraphError::HierarchyCycle(key));
            }
        }
        if let Some(old) = old_parent.and_then(|p| self.node_mut(p)) {
            old.children.retain(|c| *c != key);
        }
        if let Some(new) = parent.and_then(|p| self.node_mut(p)) {
            new.children.push(key);
        }
        if let Some(node) = self.node_mut(key) {
            node.parent = parent;
        }
        Ok(())
    }

    /// Get the hierarchy parent of a node
    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.node(key)?.parent
    }

    /// Get the hierarchy children of a node
    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.node(key).map_or(&[], |n| n.children.as_slice())
    }

    /// Get all descendants in pre-order, excluding the node itself
    pub fn descendants(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut result = Vec::new();
        let mut stack: Vec<NodeKey> = self.children(key).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            result.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        result
    }

    /// Get all ancestors, nearest first
    pub fn ancestors(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut result = Vec::new();
        let mut current = self.parent(key);
        while let Some(parent) = current {
            if result.contains(&parent) {
                break;
            }
            result.push(parent);
            current = self.parent(parent);
        }
        result
    }

    /// Link `from`'s `message` plug into `to_attr` on `to`.
    ///
    /// Linking into the `affectedBy` array is idempotent and reuses the
    /// first free slot before growing the array. Linking into a single
    /// message attribute replaces whatever was linked there.
    pub fn connect(
        &mut self,
        from: NodeKey,
        to: NodeKey,
        to_attr: &str,
    ) -> Result<ConnectionId, GraphError> {
        self.try_node(from)?;
        let target = self.try_node(to)?;
        if from == to {
            return Err(GraphError::SelfLink(from));
        }

        let is_array = to_attr == AFFECTED_BY;
        match target.attribute(to_attr) {
            Some(attr) if !attr.attr_type.is_link() => {
                return Err(GraphError::NotALink(to_attr.to_string()));
            }
            Some(_) => {}
            None => {
                let attr_type = if is_array {
                    AttrType::MessageArray
                } else {
                    AttrType::Message
                };
                self.add_attribute(to, to_attr, attr_type)?;
            }
        }

        if let Some(existing) = self
            .connections
            .values()
            .find(|c| c.from_node == from && c.to_node == to && c.to_attr == to_attr)
        {
            return Ok(existing.id);
        }

        let slot = if is_array {
            let size = self.try_node(to)?.affected_by_size;
            let free = (0..size).find(|slot| {
                !self
                    .connections
                    .values()
                    .any(|c| c.to_node == to && c.to_attr == to_attr && c.slot == *slot)
            });
            match free {
                Some(slot) => slot,
                None => {
                    if let Some(node) = self.node_mut(to) {
                        node.affected_by_size = size + 1;
                    }
                    size
                }
            }
        } else {
            self.connections
                .retain(|_, c| !(c.to_node == to && c.to_attr == to_attr));
            0
        };

        let connection = Connection::new(from, to, to_attr, slot);
        let id = connection.id;
        self.connections.insert(id, connection);
        Ok(id)
    }

    /// Remove every link from `from` to `to`, returning how many were removed
    pub fn disconnect(&mut self, from: NodeKey, to: NodeKey) -> usize {
        let before = self.connections.len();
        self.connections
            .retain(|_, c| !(c.from_node == from && c.to_node == to));
        before - self.connections.len()
    }

    /// Check whether `from` owns `to` through any link
    pub fn is_connected(&self, from: NodeKey, to: NodeKey) -> bool {
        self.connections
            .values()
            .any(|c| c.from_node == from && c.to_node == to)
    }

    /// Get a connection by ID
    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    /// Get all connections
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Get connections leaving a node
    pub fn connections_from(&self, key: NodeKey) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.from_node == key)
    }

    /// Get connections arriving at a node
    pub fn connections_to(&self, key: NodeKey) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.to_node == key)
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Nodes this node owns, in link order
    pub fn outgoing(&self, key: NodeKey) -> Vec<NodeKey> {
        self.connections_from(key)
            .filter(|c| c.is_ownership())
            .map(|c| c.to_node)
            .collect()
    }

    /// Owners of this node, in link order
    pub fn incoming(&self, key: NodeKey) -> Vec<NodeKey> {
        self.connections_to(key)
            .filter(|c| c.is_ownership())
            .map(|c| c.from_node)
            .collect()
    }

    /// Source linked into a single message attribute
    pub fn linked_source(&self, key: NodeKey, attr: &str) -> Option<NodeKey> {
        self.connections_to(key)
            .find(|c| c.to_attr == attr)
            .map(|c| c.from_node)
    }

    /// Owner occupying each slot of the `affectedBy` array
    pub fn incoming_slots(&self, key: NodeKey) -> Vec<Option<NodeKey>> {
        let size = self.node(key).map_or(0, |n| n.affected_by_size);
        let mut slots = vec![None; size];
        for connection in self.connections_to(key).filter(|c| c.is_ownership()) {
            if let Some(slot) = slots.get_mut(connection.slot) {
                *slot = Some(connection.from_node);
            }
        }
        slots
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled", NodeTypeRegistry::new())
    }
}

/// Error raised by graph operations
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeKey),

    /// Type tag not registered
    #[error("Unknown node type: {0}")]
    UnknownType(String),

    /// Refused to overwrite a link attribute with a plain value
    #[error("Attribute {node}.{attr} is a link slot and cannot hold a value")]
    LinkAttribute {
        /// Node name
        node: String,
        /// Attribute name
        attr: String,
    },

    /// Tried to link into a plain value attribute
    #[error("Attribute {0} is not a link slot")]
    NotALink(String),

    /// Self-link not allowed
    #[error("Node {0} cannot link to itself")]
    SelfLink(NodeKey),

    /// Re-parenting would create a hierarchy cycle
    #[error("Parenting {0} would create a hierarchy cycle")]
    HierarchyCycle(NodeKey),

    /// Dependency chain loops back on itself
    #[error("Dependency chain of {0} does not terminate")]
    DependencyCycle(String),

    /// Node is not of the expected type
    #[error("Node {node} is not a {expected}")]
    TypeMismatch {
        /// Node name
        node: String,
        /// Expected type name
        expected: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> Graph {
        Graph::default()
    }

    #[test]
    fn test_connect_is_idempotent() {
        let mut g = graph();
        let a = g.add_node("a", NodeKind::Network);
        let b = g.add_node("b", NodeKind::Network);

        let first = g.connect(a, b, AFFECTED_BY).unwrap();
        let second = g.connect(a, b, AFFECTED_BY).unwrap();

        assert_eq!(first, second);
        assert_eq!(g.connection_count(), 1);
        assert_eq!(g.outgoing(a), vec![b]);
        assert_eq!(g.incoming_slots(b).len(), 1);
    }

    #[test]
    fn test_disconnect_then_reconnect_reuses_slot() {
        let mut g = graph();
        let a = g.add_node("a", NodeKind::Network);
        let b = g.add_node("b", NodeKind::Network);
        let c = g.add_node("c", NodeKind::Network);
        let target = g.add_node("target", NodeKind::Joint);

        g.connect(a, target, AFFECTED_BY).unwrap();
        g.connect(b, target, AFFECTED_BY).unwrap();
        let size_before = g.incoming_slots(target).len();

        assert_eq!(g.disconnect(a, target), 1);
        g.connect(c, target, AFFECTED_BY).unwrap();

        let slots = g.incoming_slots(target);
        assert_eq!(slots.len(), size_before);
        assert_eq!(slots[0], Some(c));
        assert_eq!(slots[1], Some(b));
    }

    #[test]
    fn test_grows_when_no_slot_is_free() {
        let mut g = graph();
        let target = g.add_node("target", NodeKind::Network);
        for i in 0..3 {
            let owner = g.add_node(&format!("owner{i}"), NodeKind::Network);
            g.connect(owner, target, AFFECTED_BY).unwrap();
        }
        assert_eq!(g.incoming_slots(target).len(), 3);
        assert!(g.incoming_slots(target).iter().all(Option::is_some));
    }

    #[test]
    fn test_single_message_slot_replaces() {
        let mut g = graph();
        let a = g.add_node("a", NodeKind::Joint);
        let b = g.add_node("b", NodeKind::Joint);
        let child = g.add_node("child", NodeKind::Joint);

        g.connect(a, child, "pickWalkUp").unwrap();
        g.connect(b, child, "pickWalkUp").unwrap();

        assert_eq!(g.linked_source(child, "pickWalkUp"), Some(b));
        assert_eq!(g.connections_to(child).count(), 1);
        // Named links are not ownership links
        assert!(g.incoming(child).is_empty());
    }

    #[test]
    fn test_set_value_refuses_link_attribute() {
        let mut g = graph();
        let a = g.add_node("a", NodeKind::Network);
        let b = g.add_node("b", NodeKind::Network);
        g.connect(a, b, AFFECTED_BY).unwrap();

        let result = g.set_value(b, AFFECTED_BY, "oops");
        assert!(matches!(result, Err(GraphError::LinkAttribute { .. })));
        assert!(g.is_connected(a, b));
    }

    #[test]
    fn test_connect_into_value_attribute_fails() {
        let mut g = graph();
        let a = g.add_node("a", NodeKind::Network);
        let b = g.add_node("b", NodeKind::Network);
        g.set_value(b, "side", "left").unwrap();
        assert!(matches!(g.connect(a, b, "side"), Err(GraphError::NotALink(_))));
    }

    #[test]
    fn test_stale_keys_do_not_resolve() {
        let mut g = graph();
        let a = g.add_node("a", NodeKind::Network);
        g.remove_node(a);
        let b = g.add_node("b", NodeKind::Network);

        assert_eq!(a.index, b.index);
        assert!(!g.contains(a));
        assert!(g.contains(b));
    }

    #[test]
    fn test_remove_node_drops_links_and_orphans_children() {
        let mut g = graph();
        let parent = g.add_node("parent", NodeKind::Joint);
        let child = g.add_node("child", NodeKind::Joint);
        let owner = g.add_node("owner", NodeKind::Network);
        g.set_parent(child, Some(parent)).unwrap();
        g.connect(owner, parent, AFFECTED_BY).unwrap();

        g.remove_node(parent);

        assert_eq!(g.connection_count(), 0);
        assert_eq!(g.parent(child), None);
    }

    #[test]
    fn test_hierarchy() {
        let mut g = graph();
        let root = g.add_node("root", NodeKind::Joint);
        let mid = g.add_node("mid", NodeKind::Joint);
        let end = g.add_node("end", NodeKind::Joint);
        g.set_parent(mid, Some(root)).unwrap();
        g.set_parent(end, Some(mid)).unwrap();

        assert_eq!(g.descendants(root), vec![mid, end]);
        assert_eq!(g.ancestors(end), vec![mid, root]);
        assert!(matches!(
            g.set_parent(root, Some(end)),
            Err(GraphError::HierarchyCycle(_))
        ));
    }

    #[test]
    fn test_unique_names() {
        let mut g = graph();
        g.add_node("ctrl", NodeKind::Joint);
        let second = g.add_node("ctrl", NodeKind::Joint);
        assert_eq!(g.name_of(second), "ctrl1");
    }
}
