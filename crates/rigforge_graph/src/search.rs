// SPDX-License-Identifier: MIT OR Apache-2.0
//! Recursive typed search over owner links.
//!
//! Both searches walk `affectedBy` links only and skip housekeeping nodes.
//! Neighbours are visited in link creation order, so the result of
//! [`find_first`] is deterministic when several nodes would qualify.

use crate::graph::Graph;
use crate::meta::MetaNode;
use crate::node::NodeKey;
use std::collections::HashSet;

/// Link direction to search along
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Towards owners
    Upstream,
    /// Towards owned nodes
    Downstream,
}

/// Domain neighbours of a node in one direction, in link order
pub fn neighbors(graph: &Graph, key: NodeKey, direction: Direction) -> Vec<NodeKey> {
    let linked = match direction {
        Direction::Upstream => graph.incoming(key),
        Direction::Downstream => graph.outgoing(key),
    };
    linked
        .into_iter()
        .filter(|k| graph.node(*k).is_some_and(|n| !n.kind.is_housekeeping()))
        .collect()
}

/// Wrap a node when its type is `target` or derives from it
pub fn compatible(graph: &Graph, key: NodeKey, target: &str) -> Option<MetaNode> {
    let meta = graph.registry().create_from_node(graph, key)?;
    graph
        .registry()
        .is_a(meta.type_name, target)
        .then_some(meta)
}

/// Find the first node of type `target` reachable from `start`.
///
/// The start node itself is returned when compatible. Otherwise every
/// node's direct neighbours are checked before descending into them,
/// depth first. Each node is expanded at most once.
pub fn find_first(
    graph: &Graph,
    start: NodeKey,
    target: &str,
    direction: Direction,
) -> Option<MetaNode> {
    if let Some(found) = compatible(graph, start, target) {
        return Some(found);
    }

    let mut visited = HashSet::from([start]);
    let first = neighbors(graph, start, direction);
    if let Some(found) = first.iter().find_map(|n| compatible(graph, *n, target)) {
        return Some(found);
    }

    let mut stack: Vec<(Vec<NodeKey>, usize)> = vec![(first, 0)];
    loop {
        let Some(frame) = stack.last_mut() else {
            break;
        };
        let Some(&next) = frame.0.get(frame.1) else {
            stack.pop();
            continue;
        };
        frame.1 += 1;

        if !visited.insert(next) {
            continue;
        }
        let around = neighbors(graph, next, direction);
        if let Some(found) = around.iter().find_map(|n| compatible(graph, *n, target)) {
            return Some(found);
        }
        stack.push((around, 0));
    }
    None
}

/// Find every node of type `target` reachable from `start`, excluding it.
///
/// Results are in depth-first pre-order and each node appears once.
pub fn find_all(
    graph: &Graph,
    start: NodeKey,
    target: &str,
    direction: Direction,
) -> Vec<MetaNode> {
    let mut found = Vec::new();
    let mut visited = HashSet::from([start]);
    let mut stack: Vec<NodeKey> = neighbors(graph, start, direction).into_iter().rev().collect();

    while let Some(next) = stack.pop() {
        if !visited.insert(next) {
            continue;
        }
        if let Some(meta) = compatible(graph, next, target) {
            found.push(meta);
        }
        stack.extend(neighbors(graph, next, direction).into_iter().rev());
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::AFFECTED_BY;
    use crate::meta::META_TYPE;
    use crate::node::NodeKind;
    use crate::registry::{NodeTypeInfo, NodeTypeRegistry};

    fn graph() -> Graph {
        let mut registry = NodeTypeRegistry::new();
        registry.register(NodeTypeInfo::new("MetaNode"));
        registry.register(NodeTypeInfo::new("Root").with_base("MetaNode"));
        registry.register(NodeTypeInfo::new("Branch").with_base("MetaNode"));
        registry.register(NodeTypeInfo::new("Leaf").with_base("MetaNode"));
        registry.register(NodeTypeInfo::new("SpecialLeaf").with_base("Leaf"));
        Graph::new("search", registry)
    }

    fn tagged(graph: &mut Graph, name: &str, type_name: &str) -> NodeKey {
        let key = graph.add_node(name, NodeKind::Network);
        graph.set_value(key, META_TYPE, type_name).unwrap();
        key
    }

    #[test]
    fn test_start_node_matches_first() {
        let mut g = graph();
        let root = tagged(&mut g, "root", "Root");
        let found = find_first(&g, root, "MetaNode", Direction::Downstream).unwrap();
        assert_eq!(found.key, root);
    }

    #[test]
    fn test_direct_neighbour_beats_deeper_match() {
        let mut g = graph();
        let root = tagged(&mut g, "root", "Root");
        let branch = tagged(&mut g, "branch", "Branch");
        let deep = tagged(&mut g, "deep", "Leaf");
        let shallow = tagged(&mut g, "shallow", "Leaf");
        g.connect(root, branch, AFFECTED_BY).unwrap();
        g.connect(branch, deep, AFFECTED_BY).unwrap();
        g.connect(root, shallow, AFFECTED_BY).unwrap();

        let found = find_first(&g, root, "Leaf", Direction::Downstream).unwrap();
        assert_eq!(found.key, shallow);
    }

    #[test]
    fn test_subtype_is_compatible() {
        let mut g = graph();
        let root = tagged(&mut g, "root", "Root");
        let special = tagged(&mut g, "special", "SpecialLeaf");
        g.connect(root, special, AFFECTED_BY).unwrap();

        let found = find_first(&g, root, "Leaf", Direction::Downstream).unwrap();
        assert_eq!(found.type_name, "SpecialLeaf");
        let up = find_first(&g, special, "Root", Direction::Upstream).unwrap();
        assert_eq!(up.key, root);
    }

    #[test]
    fn test_cycles_terminate() {
        let mut g = graph();
        let a = tagged(&mut g, "a", "Branch");
        let b = tagged(&mut g, "b", "Branch");
        g.connect(a, b, AFFECTED_BY).unwrap();
        g.connect(b, a, AFFECTED_BY).unwrap();

        assert!(find_first(&g, a, "Leaf", Direction::Downstream).is_none());
        assert!(find_all(&g, a, "Branch", Direction::Downstream)
            .iter()
            .all(|m| m.key == b));
    }

    #[test]
    fn test_housekeeping_nodes_are_skipped() {
        let mut g = graph();
        let root = tagged(&mut g, "root", "Root");
        let info = g.add_node("editorInfo", NodeKind::GraphEditorInfo);
        g.set_value(info, META_TYPE, "Leaf").unwrap();
        g.connect(root, info, AFFECTED_BY).unwrap();

        assert!(find_first(&g, root, "Leaf", Direction::Downstream).is_none());
    }

    #[test]
    fn test_find_all_collects_each_once_in_preorder() {
        let mut g = graph();
        let root = tagged(&mut g, "root", "Root");
        let left = tagged(&mut g, "left", "Branch");
        let right = tagged(&mut g, "right", "Branch");
        let leaf_a = tagged(&mut g, "leaf_a", "Leaf");
        let leaf_b = tagged(&mut g, "leaf_b", "Leaf");
        g.connect(root, left, AFFECTED_BY).unwrap();
        g.connect(root, right, AFFECTED_BY).unwrap();
        g.connect(left, leaf_a, AFFECTED_BY).unwrap();
        g.connect(right, leaf_a, AFFECTED_BY).unwrap();
        g.connect(right, leaf_b, AFFECTED_BY).unwrap();

        let leaves: Vec<NodeKey> = find_all(&g, root, "Leaf", Direction::Downstream)
            .into_iter()
            .map(|m| m.key)
            .collect();
        assert_eq!(leaves, vec![leaf_a, leaf_b]);
    }
}
