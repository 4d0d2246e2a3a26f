// SPDX-License-Identifier: MIT OR Apache-2.0
//! Metadata graph framework for rigforge.
//!
//! This crate provides the "scene node as database" substrate that the
//! rigging lifecycle is built on:
//! - Arena of typed nodes with stable, generation-checked keys
//! - Typed attributes with lazy creation and schema-drift repair
//! - Owner links (`message` → `affectedBy`) with slot reuse
//! - A registry mapping type tags to static type descriptors
//! - Recursive typed search in both link directions
//! - Dependent-node chains that auto-create missing ancestors
//!
//! ## Architecture
//!
//! A [`Graph`] owns every node and connection plus the [`NodeTypeRegistry`]
//! used to interpret `meta_type` tags. [`MetaNode`] is a cheap, copyable
//! typed view over a node; all durable state stays in the graph.

pub mod attribute;
pub mod connection;
pub mod dependent;
pub mod graph;
pub mod meta;
pub mod node;
pub mod registry;
pub mod search;

pub use attribute::{AttrType, AttrValue, Attribute};
pub use connection::{Connection, ConnectionId, AFFECTED_BY, MESSAGE};
pub use dependent::{bind_existing, create_dependent, create_node, ensure_core, CORE_TYPE};
pub use graph::{Graph, GraphError};
pub use meta::{link, MetaNode, NetworkNode, META_TYPE};
pub use node::{GraphNode, NodeId, NodeKey, NodeKind};
pub use registry::{AttrSpec, NodeTypeInfo, NodeTypeRegistry};
pub use search::{find_all, find_first, Direction};
