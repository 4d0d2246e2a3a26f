// SPDX-License-Identifier: MIT OR Apache-2.0
//! Registry of typed network node descriptors.

use crate::attribute::AttrType;
use crate::graph::Graph;
use crate::meta::{MetaNode, META_TYPE};
use crate::node::NodeKey;
use indexmap::IndexMap;

/// Declared data attribute of a node type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrSpec {
    /// Attribute name
    pub name: &'static str,
    /// Declared type
    pub attr_type: AttrType,
}

impl AttrSpec {
    /// Declare an attribute
    pub const fn new(name: &'static str, attr_type: AttrType) -> Self {
        Self { name, attr_type }
    }
}

/// Static descriptor of a network node type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeTypeInfo {
    /// Type tag written into `meta_type`
    pub name: &'static str,
    /// Supertype, used for compatibility checks
    pub base: Option<&'static str>,
    /// Ancestor type this node must hang beneath
    pub dependent_on: Option<&'static str>,
    /// Declared data attributes
    pub attributes: &'static [AttrSpec],
}

impl NodeTypeInfo {
    /// Create a descriptor with no base, dependency, or attributes
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            base: None,
            dependent_on: None,
            attributes: &[],
        }
    }

    /// Set the supertype
    pub const fn with_base(mut self, base: &'static str) -> Self {
        self.base = Some(base);
        self
    }

    /// Set the required ancestor type
    pub const fn depends_on(mut self, ancestor: &'static str) -> Self {
        self.dependent_on = Some(ancestor);
        self
    }

    /// Set the declared attributes
    pub const fn with_attributes(mut self, attributes: &'static [AttrSpec]) -> Self {
        self.attributes = attributes;
        self
    }
}

/// String-keyed table of node type descriptors
#[derive(Debug, Clone, Default)]
pub struct NodeTypeRegistry {
    types: IndexMap<&'static str, NodeTypeInfo>,
}

impl NodeTypeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node type. Re-registering a name replaces the descriptor.
    ///
    /// Returns `true` when the name was not registered before.
    pub fn register(&mut self, info: NodeTypeInfo) -> bool {
        self.types.insert(info.name, info).is_none()
    }

    /// Look up a node type. Unknown tags resolve to `None`.
    pub fn resolve(&self, name: &str) -> Option<&NodeTypeInfo> {
        self.types.get(name)
    }

    /// Get all registered types
    pub fn types(&self) -> impl Iterator<Item = &NodeTypeInfo> {
        self.types.values()
    }

    /// Get the number of registered types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// The type itself followed by its supertypes, nearest first
    pub fn ancestors(&self, type_name: &str) -> Vec<&'static str> {
        let mut chain = Vec::new();
        let mut current = self.resolve(type_name);
        while let Some(info) = current {
            if chain.contains(&info.name) {
                break;
            }
            chain.push(info.name);
            current = info.base.and_then(|base| self.resolve(base));
        }
        chain
    }

    /// Whether `type_name` is `target` or derives from it.
    ///
    /// Unknown types are never compatible with anything.
    pub fn is_a(&self, type_name: &str, target: &str) -> bool {
        self.ancestors(type_name).contains(&target)
    }

    /// The type followed by every `dependent_on` ancestor, root last
    pub fn dependency_chain(&self, type_name: &str) -> Vec<&'static str> {
        let mut chain = Vec::new();
        let mut current = self.resolve(type_name);
        while let Some(info) = current {
            if chain.contains(&info.name) {
                break;
            }
            chain.push(info.name);
            current = info.dependent_on.and_then(|dep| self.resolve(dep));
        }
        chain
    }

    /// Declared attributes including inherited ones, supertypes first
    pub fn declared_attributes(&self, type_name: &str) -> Vec<AttrSpec> {
        let mut specs: Vec<AttrSpec> = Vec::new();
        for name in self.ancestors(type_name).into_iter().rev() {
            if let Some(info) = self.resolve(name) {
                for spec in info.attributes {
                    match specs.iter_mut().find(|s| s.name == spec.name) {
                        Some(existing) => *existing = *spec,
                        None => specs.push(*spec),
                    }
                }
            }
        }
        specs
    }

    /// Wrap an existing node according to its `meta_type` tag.
    ///
    /// Returns `None` when the node is gone, untagged, or tagged with an
    /// unregistered type.
    pub fn create_from_node(&self, graph: &Graph, key: NodeKey) -> Option<MetaNode> {
        let node = graph.node(key)?;
        let tag = node.value(META_TYPE)?.as_str()?;
        let info = self.resolve(tag)?;
        Some(MetaNode::bind(key, node.id, info.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;

    const ATTRS: &[AttrSpec] = &[AttrSpec::new("side", AttrType::String)];

    fn registry() -> NodeTypeRegistry {
        let mut registry = NodeTypeRegistry::new();
        registry.register(NodeTypeInfo::new("MetaNode"));
        registry.register(NodeTypeInfo::new("DependentNode").with_base("MetaNode"));
        registry.register(NodeTypeInfo::new("Core").with_base("MetaNode"));
        registry.register(
            NodeTypeInfo::new("Leaf")
                .with_base("DependentNode")
                .depends_on("Core")
                .with_attributes(ATTRS),
        );
        registry
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = registry();
        let count = registry.len();
        assert!(!registry.register(NodeTypeInfo::new("Core").with_base("MetaNode")));
        assert_eq!(registry.len(), count);
    }

    #[test]
    fn test_is_a_walks_base_chain() {
        let registry = registry();
        assert!(registry.is_a("Leaf", "Leaf"));
        assert!(registry.is_a("Leaf", "DependentNode"));
        assert!(registry.is_a("Leaf", "MetaNode"));
        assert!(!registry.is_a("Core", "DependentNode"));
        assert!(!registry.is_a("Unknown", "MetaNode"));
    }

    #[test]
    fn test_dependency_chain() {
        let registry = registry();
        assert_eq!(registry.dependency_chain("Leaf"), vec!["Leaf", "Core"]);
        assert!(registry.dependency_chain("Missing").is_empty());
    }

    #[test]
    fn test_create_from_node_fails_soft() {
        let registry = registry();
        let mut graph = Graph::new("test", registry.clone());
        let untagged = graph.add_node("plain", NodeKind::Joint);
        let unknown = graph.add_node("odd", NodeKind::Network);
        graph.set_value(unknown, META_TYPE, "NoSuchType").unwrap();
        let tagged = graph.add_node("leaf", NodeKind::Network);
        graph.set_value(tagged, META_TYPE, "Leaf").unwrap();

        assert!(registry.create_from_node(&graph, untagged).is_none());
        assert!(registry.create_from_node(&graph, unknown).is_none());
        let meta = registry.create_from_node(&graph, tagged).unwrap();
        assert_eq!(meta.type_name, "Leaf");

        graph.remove_node(tagged);
        assert!(registry.create_from_node(&graph, tagged).is_none());
    }
}
