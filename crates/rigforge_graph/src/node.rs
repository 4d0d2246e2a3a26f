// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the metadata graph.

use crate::attribute::{AttrType, AttrValue, Attribute};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Globally unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a node ID from its string form
    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value).ok().map(Self)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Arena address of a node.
///
/// The generation changes whenever a slot is reused, so a key that
/// outlives its node never resolves to a different node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey {
    /// Slot index in the arena
    pub index: u32,
    /// Slot generation at creation time
    pub generation: u32,
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Kind of scene object a node represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Metadata-only network node
    Network,
    /// Plain transform
    Transform,
    /// Skeleton or rig joint
    Joint,
    /// Locator
    Locator,
    /// Empty grouping transform
    Group,
    /// Constraint node
    Constraint,
    /// Keyframe curve
    AnimCurve,
    /// Mesh shape
    Mesh,
    /// Node editor bookkeeping
    GraphEditorInfo,
    /// Hypergraph layout bookkeeping
    HyperLayout,
}

impl NodeKind {
    /// Housekeeping kinds are never treated as domain data
    pub fn is_housekeeping(&self) -> bool {
        matches!(self, Self::GraphEditorInfo | Self::HyperLayout)
    }

    /// Whether nodes of this kind carry a transform
    pub fn is_transform(&self) -> bool {
        matches!(
            self,
            Self::Transform | Self::Joint | Self::Locator | Self::Group | Self::Mesh
        )
    }
}

/// A node stored in the graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    /// Arena key
    pub key: NodeKey,
    /// Unique identifier
    pub id: NodeId,
    /// Node name, `namespace:name` when namespaced
    pub name: String,
    /// Scene object kind
    pub kind: NodeKind,
    /// Parent in the transform hierarchy
    pub parent: Option<NodeKey>,
    /// Children in the transform hierarchy
    pub children: Vec<NodeKey>,
    /// Attributes in creation order
    attributes: IndexMap<String, Attribute>,
    /// Logical size of the `affectedBy` slot array
    pub(crate) affected_by_size: usize,
}

impl GraphNode {
    pub(crate) fn new(key: NodeKey, name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            key,
            id: NodeId::new(),
            name: name.into(),
            kind,
            parent: None,
            children: Vec::new(),
            attributes: IndexMap::new(),
            affected_by_size: 0,
        }
    }

    /// Namespace part of the name, if any
    pub fn namespace(&self) -> Option<&str> {
        self.name.rsplit_once(':').map(|(ns, _)| ns)
    }

    /// Name without namespace
    pub fn short_name(&self) -> &str {
        self.name.rsplit_once(':').map_or(self.name.as_str(), |(_, n)| n)
    }

    /// Get an attribute by name
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Check if an attribute exists
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Get all attributes in creation order
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.values()
    }

    /// Add an attribute if absent. Returns `true` when it was created.
    pub fn add_attribute(&mut self, name: &str, attr_type: AttrType) -> bool {
        if self.attributes.contains_key(name) {
            return false;
        }
        self.attributes
            .insert(name.to_string(), Attribute::new(name, attr_type));
        true
    }

    /// Remove an attribute
    pub fn remove_attribute(&mut self, name: &str) -> Option<Attribute> {
        self.attributes.shift_remove(name)
    }

    /// Get an attribute value
    pub fn value(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name).and_then(|a| a.value.as_ref())
    }

    /// Store a value, creating or retyping the attribute as needed
    pub(crate) fn store_value(&mut self, name: &str, value: AttrValue) {
        match self.attributes.get_mut(name) {
            Some(attr) if attr.attr_type == value.attr_type() => attr.value = Some(value),
            _ => {
                self.attributes
                    .insert(name.to_string(), Attribute::with_value(name, value));
            }
        }
    }

    /// Size of the multi-slot incoming link array
    pub fn affected_by_size(&self) -> usize {
        self.affected_by_size
    }
}
