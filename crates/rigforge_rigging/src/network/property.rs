// SPDX-License-Identifier: MIT OR Apache-2.0
//! Properties: small tagged nodes owned by a scene object or network node.

use rigforge_graph::{
    create_node, link, search, AttrValue, Direction, Graph, GraphError, MetaNode, NodeKey,
};

/// Create a property of `type_name` and link it beneath `owner`
pub fn add_property(
    graph: &mut Graph,
    owner: NodeKey,
    type_name: &str,
    values: &[(&str, AttrValue)],
) -> Result<MetaNode, GraphError> {
    let name = format!("{}_{type_name}", graph.try_node(owner)?.short_name());
    let property = create_node(graph, type_name, &name, values)?;
    link(graph, owner, property.key, None)?;
    Ok(property)
}

/// Properties of `type_name` directly owned by `owner`, in link order
pub fn find_properties(graph: &Graph, owner: NodeKey, type_name: &str) -> Vec<MetaNode> {
    search::neighbors(graph, owner, Direction::Downstream)
        .into_iter()
        .filter_map(|key| search::compatible(graph, key, type_name))
        .filter(|meta| meta.is_a(graph, "MetaProperty"))
        .collect()
}

/// First property of `type_name` directly owned by `owner`
pub fn find_property(graph: &Graph, owner: NodeKey, type_name: &str) -> Option<MetaNode> {
    find_properties(graph, owner, type_name).into_iter().next()
}

/// Delete every property of `type_name` owned by `owner`
pub fn remove_properties(graph: &mut Graph, owner: NodeKey, type_name: &str) -> usize {
    find_properties(graph, owner, type_name)
        .into_iter()
        .filter(|p| p.delete(graph))
        .count()
}
