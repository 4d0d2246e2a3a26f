// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (link) definitions for the graph.

use crate::node::NodeKey;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outgoing owner plug present on every node
pub const MESSAGE: &str = "message";

/// Incoming multi-slot plug listing every owner of a node
pub const AFFECTED_BY: &str = "affectedBy";

/// Unique identifier for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// A link from an owner's `message` plug into a target attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Unique connection ID
    pub id: ConnectionId,
    /// Owner node
    pub from_node: NodeKey,
    /// Target node
    pub to_node: NodeKey,
    /// Target attribute name
    pub to_attr: String,
    /// Slot index within the target attribute (0 for single slots)
    pub slot: usize,
}

impl Connection {
    /// Create a new connection
    pub fn new(from_node: NodeKey, to_node: NodeKey, to_attr: impl Into<String>, slot: usize) -> Self {
        Self {
            id: ConnectionId::new(),
            from_node,
            to_node,
            to_attr: to_attr.into(),
            slot,
        }
    }

    /// Check if this connection involves a specific node
    pub fn involves_node(&self, node: NodeKey) -> bool {
        self.from_node == node || self.to_node == node
    }

    /// Whether this connection lands in the owner array
    pub fn is_ownership(&self) -> bool {
        self.to_attr == AFFECTED_BY
    }
}
