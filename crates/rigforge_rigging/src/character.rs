// SPDX-License-Identifier: MIT OR Apache-2.0
//! Characterization and region markup.
//!
//! A character is a skeleton registered under a `CharacterCore`. Regions
//! are named joint chains described by markup properties on the joints:
//! one `root`, one `end` and any number of `exclude` tags sharing a side
//! and region name.

use crate::error::RigError;
use crate::network::{
    add_property, attr, find_properties, CharacterCore, JointsCore, MeshesCore, RegionsCore,
};
use crate::scene::{SceneHost, Transform};
use glam::DVec3;
use indexmap::IndexMap;
use rigforge_graph::{
    create_dependent, search, AttrValue, Direction, Graph, MetaNode, NetworkNode, NodeId, NodeKey,
    NodeKind,
};

/// Markup tag on a region's first joint
pub const ROOT_TAG: &str = "root";
/// Markup tag on a region's last joint
pub const END_TAG: &str = "end";
/// Markup tag on joints left out of a region
pub const EXCLUDE_TAG: &str = "exclude";

const MARKUP_TYPE: &str = "RigMarkupProperty";

/// A marked-up region of a character
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// Body side
    pub side: String,
    /// Region name
    pub region: String,
    /// First joint
    pub root: NodeKey,
    /// Last joint
    pub end: NodeKey,
    /// Joints left out of the chain
    pub excludes: Vec<NodeKey>,
    /// Whether the markup goes away with the component built on it
    pub temporary: bool,
    /// Markup properties describing the region
    pub markups: Vec<MetaNode>,
}

#[derive(Default)]
struct PartialRegion {
    root: Option<NodeKey>,
    end: Option<NodeKey>,
    excludes: Vec<NodeKey>,
    temporary: bool,
    markups: Vec<MetaNode>,
}

/// Register a skeleton as a character.
///
/// Every joint under `root_joint` is owned by a new `JointsCore` and has
/// its current local transform stored as the bind pose.
pub fn characterize(
    scene: &mut dyn SceneHost,
    root_joint: NodeKey,
    name: &str,
) -> Result<CharacterCore, RigError> {
    let graph = scene.graph();
    let root = graph
        .node(root_joint)
        .ok_or_else(|| RigError::ObjectNotFound(root_joint.to_string()))?;
    if root.kind != NodeKind::Joint {
        return Err(RigError::NotAJoint(root.name.clone()));
    }
    if find_character(graph, root_joint).is_some() {
        return Err(RigError::AlreadyCharacterized(root.name.clone()));
    }
    let root_id = root.id.to_string();

    let mut hierarchy = vec![root_joint];
    hierarchy.extend(graph.descendants(root_joint));
    let kinds: Vec<(NodeKey, NodeKind)> = hierarchy
        .into_iter()
        .filter_map(|k| graph.node(k).map(|n| (k, n.kind)))
        .collect();

    let mut bind_poses = Vec::new();
    for (key, kind) in &kinds {
        if *kind == NodeKind::Joint {
            bind_poses.push((*key, scene.local_transform(*key)?));
        }
    }

    let graph = scene.graph_mut();
    let character = create_dependent(
        graph,
        "CharacterCore",
        None,
        Some(name),
        &[
            (attr::CHARACTER_NAME, AttrValue::from(name)),
            (attr::ROOT_JOINT_ID, AttrValue::from(root_id.as_str())),
        ],
    )?;
    let joints = create_dependent(
        graph,
        "JointsCore",
        Some(character.key),
        Some(name),
        &[(attr::ROOT_JOINT_ID, AttrValue::from(root_id.as_str()))],
    )?;
    create_dependent(graph, "RegionsCore", Some(character.key), Some(name), &[])?;
    let meshes = create_dependent(graph, MeshesCore::TYPE_NAME, Some(character.key), Some(name), &[])?;

    for (joint, pose) in &bind_poses {
        joints.connect_node(graph, *joint, None)?;
        graph.set_value(*joint, attr::BIND_TRANSLATE, pose.translate.to_array())?;
        graph.set_value(*joint, attr::BIND_ROTATE, pose.rotate.to_array())?;
        graph.set_value(*joint, attr::BIND_SCALE, pose.scale.to_array())?;
    }
    for (key, kind) in &kinds {
        if *kind == NodeKind::Mesh {
            meshes.connect_node(graph, *key, None)?;
        }
    }

    tracing::info!("Characterized {name} with {} joints", bind_poses.len());
    Ok(CharacterCore(character))
}

/// Character an object or network node belongs to
pub fn find_character(graph: &Graph, node: NodeKey) -> Option<CharacterCore> {
    search::find_first(graph, node, "CharacterCore", Direction::Upstream).map(CharacterCore)
}

/// Every character in the graph, in creation order
pub fn all_characters(graph: &Graph) -> Vec<CharacterCore> {
    graph
        .node_keys()
        .filter_map(|key| CharacterCore::from_key(graph, key))
        .collect()
}

/// Character display name
pub fn character_name(graph: &Graph, character: CharacterCore) -> String {
    character.get_string(graph, attr::CHARACTER_NAME)
}

/// Root joint of a character
pub fn root_joint(graph: &Graph, character: CharacterCore) -> Option<NodeKey> {
    NodeId::parse(&character.get_string(graph, attr::ROOT_JOINT_ID))
        .and_then(|id| graph.find_by_id(id))
}

/// Joints of a character in hierarchy order
pub fn character_joints(graph: &Graph, character: CharacterCore) -> Vec<NodeKey> {
    character
        .downstream::<JointsCore>(graph)
        .map(|core| {
            graph
                .outgoing(core.key())
                .into_iter()
                .filter(|k| graph.node(*k).is_some_and(|n| n.kind == NodeKind::Joint))
                .collect()
        })
        .unwrap_or_default()
}

/// Whether a component drives the joint
pub fn is_rigged(graph: &Graph, joint: NodeKey) -> bool {
    search::neighbors(graph, joint, Direction::Upstream)
        .into_iter()
        .any(|k| search::compatible(graph, k, "SkeletonJoints").is_some())
}

/// Stored bind pose of a joint
pub fn bind_pose(graph: &Graph, joint: NodeKey) -> Option<Transform> {
    let read = |name: &str| graph.value(joint, name).and_then(AttrValue::as_vector3);
    Some(Transform {
        translate: DVec3::from_array(read(attr::BIND_TRANSLATE)?),
        rotate: DVec3::from_array(read(attr::BIND_ROTATE)?),
        scale: DVec3::from_array(read(attr::BIND_SCALE)?),
    })
}

/// Reset joints to their bind pose, returning how many were reset
pub fn zero_character(
    scene: &mut dyn SceneHost,
    character: CharacterCore,
    only_unrigged: bool,
) -> Result<usize, RigError> {
    let mut reset = 0;
    for joint in character_joints(scene.graph(), character) {
        if only_unrigged && is_rigged(scene.graph(), joint) {
            continue;
        }
        if let Some(pose) = bind_pose(scene.graph(), joint) {
            scene.set_local_transform(joint, pose)?;
            reset += 1;
        }
    }
    tracing::debug!("Zeroed {reset} joints");
    Ok(reset)
}

/// Joints from `start` down to `end`, following parents up from `end`.
///
/// `None` when `start` is not `end` or one of its ancestors.
pub fn joint_chain(graph: &Graph, start: NodeKey, end: NodeKey) -> Option<Vec<NodeKey>> {
    let mut chain = vec![end];
    let mut current = end;
    while current != start {
        current = graph.parent(current)?;
        if chain.contains(&current) {
            return None;
        }
        chain.push(current);
    }
    chain.reverse();
    Some(chain)
}

fn regions_core(graph: &mut Graph, character: CharacterCore) -> Result<RegionsCore, RigError> {
    if let Some(core) = character.downstream::<RegionsCore>(graph) {
        return Ok(core);
    }
    let name = character_name(graph, character);
    let core = create_dependent(graph, "RegionsCore", Some(character.key()), Some(&name), &[])?;
    Ok(RegionsCore(core))
}

fn require_joint(graph: &Graph, key: NodeKey) -> Result<(), RigError> {
    let node = graph
        .node(key)
        .ok_or_else(|| RigError::ObjectNotFound(key.to_string()))?;
    if node.kind != NodeKind::Joint {
        return Err(RigError::NotAJoint(node.name.clone()));
    }
    Ok(())
}

fn add_markup(
    graph: &mut Graph,
    core: RegionsCore,
    joint: NodeKey,
    side: &str,
    region: &str,
    tag: &str,
    temporary: bool,
) -> Result<MetaNode, RigError> {
    let markup = add_property(
        graph,
        joint,
        MARKUP_TYPE,
        &[
            (attr::SIDE, AttrValue::from(side)),
            (attr::REGION, AttrValue::from(region)),
            (attr::TAG, AttrValue::from(tag)),
            (attr::TEMPORARY, AttrValue::Bool(temporary)),
        ],
    )?;
    core.connect_node(graph, markup.key, None)?;
    Ok(markup)
}

/// Mark up a region from `root` down to `end`, replacing any region
/// with the same side and name
pub fn add_region(
    graph: &mut Graph,
    character: CharacterCore,
    side: &str,
    region: &str,
    root: NodeKey,
    end: NodeKey,
    temporary: bool,
) -> Result<Region, RigError> {
    require_joint(graph, root)?;
    require_joint(graph, end)?;
    if joint_chain(graph, root, end).is_none() {
        return Err(RigError::BrokenRegion {
            side: side.to_string(),
            region: region.to_string(),
        });
    }
    if let Some(existing) = regions(graph, character).shift_remove(&(side.to_string(), region.to_string())) {
        remove_region(graph, &existing);
    }

    let core = regions_core(graph, character)?;
    let root_markup = add_markup(graph, core, root, side, region, ROOT_TAG, temporary)?;
    let end_markup = add_markup(graph, core, end, side, region, END_TAG, temporary)?;
    tracing::info!("Marked up region {side} {region}");

    Ok(Region {
        side: side.to_string(),
        region: region.to_string(),
        root,
        end,
        excludes: Vec::new(),
        temporary,
        markups: vec![root_markup, end_markup],
    })
}

/// Leave a joint out of an existing region
pub fn add_exclude(
    graph: &mut Graph,
    character: CharacterCore,
    side: &str,
    region: &str,
    joint: NodeKey,
) -> Result<Region, RigError> {
    require_joint(graph, joint)?;
    let existing = find_region(graph, character, side, region)?;
    let core = regions_core(graph, character)?;
    add_markup(graph, core, joint, side, region, EXCLUDE_TAG, existing.temporary)?;
    find_region(graph, character, side, region)
}

/// Every complete region of a character, keyed by side and name
pub fn regions(graph: &Graph, character: CharacterCore) -> IndexMap<(String, String), Region> {
    let Some(core) = character.downstream::<RegionsCore>(graph) else {
        return IndexMap::new();
    };

    let mut partials: IndexMap<(String, String), PartialRegion> = IndexMap::new();
    for markup in find_properties(graph, core.key(), MARKUP_TYPE) {
        let Some(joint) = graph
            .incoming(markup.key)
            .into_iter()
            .find(|k| graph.node(*k).is_some_and(|n| n.kind == NodeKind::Joint))
        else {
            continue;
        };
        let key = (
            markup.get_string(graph, attr::SIDE),
            markup.get_string(graph, attr::REGION),
        );
        let partial = partials.entry(key).or_default();
        match markup.get_string(graph, attr::TAG).as_str() {
            ROOT_TAG => partial.root = Some(joint),
            END_TAG => partial.end = Some(joint),
            EXCLUDE_TAG => partial.excludes.push(joint),
            _ => continue,
        }
        partial.temporary |= markup.get_bool(graph, attr::TEMPORARY);
        partial.markups.push(markup);
    }

    partials
        .into_iter()
        .filter_map(|((side, region), p)| {
            Some((
                (side.clone(), region.clone()),
                Region {
                    side,
                    region,
                    root: p.root?,
                    end: p.end?,
                    excludes: p.excludes,
                    temporary: p.temporary,
                    markups: p.markups,
                },
            ))
        })
        .collect()
}

/// Look up one region
pub fn find_region(
    graph: &Graph,
    character: CharacterCore,
    side: &str,
    region: &str,
) -> Result<Region, RigError> {
    regions(graph, character)
        .shift_remove(&(side.to_string(), region.to_string()))
        .ok_or_else(|| RigError::RegionNotFound {
            character: character_name(graph, character),
            side: side.to_string(),
            region: region.to_string(),
        })
}

/// Joints of a region from root to end, excludes removed
pub fn region_chain(graph: &Graph, region: &Region) -> Result<Vec<NodeKey>, RigError> {
    let chain = joint_chain(graph, region.root, region.end).ok_or_else(|| RigError::BrokenRegion {
        side: region.side.clone(),
        region: region.region.clone(),
    })?;
    Ok(chain
        .into_iter()
        .filter(|j| !region.excludes.contains(j))
        .collect())
}

/// Delete a region's markup, returning how many properties were removed
pub fn remove_region(graph: &mut Graph, region: &Region) -> usize {
    let removed = region
        .markups
        .iter()
        .filter(|markup| markup.delete(graph))
        .count();
    tracing::debug!("Removed region {} {}", region.side, region.region);
    removed
}

/// Flag a region's markup as temporary or permanent
pub fn set_region_temporary(
    graph: &mut Graph,
    region: &Region,
    temporary: bool,
) -> Result<(), RigError> {
    for markup in &region.markups {
        markup.set(graph, attr::TEMPORARY, temporary)?;
    }
    Ok(())
}
