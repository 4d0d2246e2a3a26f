// SPDX-License-Identifier: MIT OR Apache-2.0
//! Building components.

use super::{
    activate_component, animated_range, components_on, id_string, Buildable, Component,
    ComponentKind, ComponentParts, ControlSet,
};
use crate::character::{character_name, find_region, region_chain, set_region_temporary, zero_character};
use crate::context::OperationContext;
use crate::error::RigError;
use crate::network::{
    add_property, attr, AttachmentJoints, CharacterCore, ComponentCore, ControlJoints,
    RiggingJoints, SkeletonJoints,
};
use crate::scene::{ConstraintKind, SceneHost, Transform};
use glam::{DAffine3, DVec3};
use rigforge_graph::{create_dependent, link, AttrValue, Graph, MetaNode, NetworkNode, NodeKey, NodeKind};
use rigforge_sequencer::BakeRequest;

/// Link from a control to the control above it
pub const PICK_WALK_DOWN: &str = "pickWalkDown";

/// Distance of a single-joint aim target along the joint's X axis
const AIM_DISTANCE: f64 = 10.0;

/// Build options beyond the region
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BuildOptions {
    /// Remove components already on the joints instead of failing
    pub remove_existing: bool,
    /// Build alongside components already on the joints
    pub allow_shared: bool,
    /// Space the component follows. Defaults to the parent of the region root.
    pub parent_space: Option<NodeKey>,
}

/// Build a component of `kind` on a marked-up region.
///
/// Everything is validated before the scene is touched.
pub fn build_component(
    scene: &mut dyn SceneHost,
    ctx: &OperationContext,
    character: CharacterCore,
    kind: ComponentKind,
    side: &str,
    region: &str,
    options: BuildOptions,
) -> Result<Component, RigError> {
    let graph = scene.graph();
    let marked = find_region(graph, character, side, region)?;
    let chain = region_chain(graph, &marked)?;
    let builder = kind.builder();
    if chain.is_empty() || !builder.accepts(chain.len()) {
        return Err(RigError::IncompatibleJointCount {
            kind: kind.name(),
            expected: builder.expected_joints(),
            found: chain.len(),
        });
    }
    if let Some(space) = options.parent_space {
        if !graph.node(space).is_some_and(|n| n.kind.is_transform()) {
            return Err(RigError::ObjectNotFound(space.to_string()));
        }
    }

    let mut existing: Vec<Component> = Vec::new();
    for joint in &chain {
        for component in components_on(graph, *joint) {
            if !existing.contains(&component) {
                existing.push(component);
            }
        }
    }
    let remove_existing = options.remove_existing || ctx.preferences.remove_existing;
    if !existing.is_empty() && !remove_existing && !options.allow_shared {
        let rigged = chain
            .iter()
            .find(|j| !components_on(graph, **j).is_empty())
            .map(|j| graph.name_of(*j).to_string())
            .unwrap_or_default();
        return Err(RigError::AlreadyRigged(rigged));
    }

    if remove_existing && !existing.is_empty() {
        // Removing the last component on a temporary region deletes its markup
        if marked.temporary {
            set_region_temporary(scene.graph_mut(), &marked, false)?;
        }
        for component in existing {
            super::remove_component(scene, ctx, component)?;
        }
        if marked.temporary {
            set_region_temporary(scene.graph_mut(), &marked, true)?;
        }
    }
    zero_character(scene, character, true)?;

    let parts = create_parts(scene, character, kind, side, region, &chain)?;
    let controls = builder.build_controls(scene, &parts)?;
    bind(scene, ctx, &parts, &controls)?;

    let parent_space = options.parent_space.or_else(|| {
        scene
            .graph()
            .parent(chain[0])
            .filter(|p| scene.graph().node(*p).is_some_and(|n| n.kind == NodeKind::Joint))
    });
    if let Some(space) = parent_space {
        scene.constrain(ConstraintKind::Parent, &[space], parts.group, true)?;
        let space_id = id_string(scene.graph(), space);
        parts.core.set(scene.graph_mut(), attr::PARENT_SPACE, space_id)?;
    }

    let component = Component { core: parts.core };
    activate_component(scene, component)?;
    tracing::info!(
        "Built {} component {side} {region} with {} controls",
        kind.name(),
        controls.controls.len()
    );
    Ok(component)
}

/// Create the metadata chain, the group and the rigging joints
fn create_parts(
    scene: &mut dyn SceneHost,
    character: CharacterCore,
    kind: ComponentKind,
    side: &str,
    region: &str,
    chain: &[NodeKey],
) -> Result<ComponentParts, RigError> {
    let namespace = character_name(scene.graph(), character);
    let ns = Some(namespace.as_str());
    let graph = scene.graph_mut();
    let core = create_dependent(
        graph,
        ComponentCore::TYPE_NAME,
        Some(character.key()),
        ns,
        &[
            (attr::COMPONENT_TYPE, AttrValue::from(kind.name())),
            (attr::SIDE, AttrValue::from(side)),
            (attr::REGION, AttrValue::from(region)),
        ],
    )?;
    let rigging = create_dependent(graph, RiggingJoints::TYPE_NAME, Some(core.key), ns, &[])?;
    let controls = create_dependent(graph, ControlJoints::TYPE_NAME, Some(core.key), ns, &[])?;
    let skeleton = create_dependent(graph, SkeletonJoints::TYPE_NAME, Some(core.key), ns, &[])?;
    let attachments = create_dependent(graph, AttachmentJoints::TYPE_NAME, Some(core.key), ns, &[])?;

    let prefix = format!("{namespace}:{side}_{region}");
    let group = scene.create_object(&format!("{prefix}_grp"), NodeKind::Group, None)?;
    let group_id = id_string(scene.graph(), group);
    core.set(scene.graph_mut(), attr::GROUP_ID, group_id)?;

    let mut rigging_joints = Vec::with_capacity(chain.len());
    let mut parent_rest = DAffine3::IDENTITY;
    let mut parent = group;
    for joint in chain {
        let rest = scene.rest_matrix(*joint)?;
        let short = scene.graph().try_node(*joint)?.short_name().to_string();
        let rig = scene.create_object(&format!("{prefix}_{short}_rig"), NodeKind::Joint, Some(parent))?;
        scene.set_local_transform(rig, Transform::from_affine(&(parent_rest.inverse() * rest)))?;
        let graph = scene.graph_mut();
        rigging.connect_node(graph, rig, None)?;
        skeleton.connect_node(graph, *joint, None)?;
        rigging_joints.push(rig);
        parent_rest = rest;
        parent = rig;
    }

    Ok(ComponentParts {
        core: ComponentCore(core),
        kind,
        side: side.to_string(),
        region: region.to_string(),
        rigging: RiggingJoints(rigging),
        controls: ControlJoints(controls),
        skeleton: SkeletonJoints(skeleton),
        attachments: AttachmentJoints(attachments),
        group,
        skeleton_joints: chain.to_vec(),
        rigging_joints,
    })
}

/// Transfer existing animation onto the controls, save the skeleton's
/// curves on the component and constrain the skeleton to the rig
fn bind(
    scene: &mut dyn SceneHost,
    ctx: &OperationContext,
    parts: &ComponentParts,
    controls: &ControlSet,
) -> Result<(), RigError> {
    let animated: Vec<NodeKey> = parts
        .skeleton_joints
        .iter()
        .copied()
        .filter(|j| scene.is_animated(*j))
        .collect();

    if !animated.is_empty() {
        let range = animated_range(scene, &animated, ctx);
        let mut followers = Vec::with_capacity(controls.follow.len());
        for (control, joint) in &controls.follow {
            followers.push(scene.constrain(ConstraintKind::Parent, &[*joint], *control, true)?);
        }
        let label = format!("{} {} controls", parts.side, parts.region);
        scene.bake(&[BakeRequest::new(label, controls.controls.clone(), range)])?;
        for constraint in followers {
            scene.delete_object(constraint)?;
        }
    }

    for joint in &parts.skeleton_joints {
        let joint_id = id_string(scene.graph(), *joint);
        for (channel, curve) in scene.curves_on(*joint) {
            scene.disconnect_curve(curve)?;
            let graph = scene.graph_mut();
            graph.set_value(curve, attr::SAVED_TARGET, joint_id.as_str())?;
            graph.set_value(curve, attr::SAVED_CHANNEL, channel.name())?;
            parts.skeleton.connect_node(graph, curve, None)?;
        }
    }

    for (rig, joint) in parts.rigging_joints.iter().zip(&parts.skeleton_joints) {
        scene.constrain(ConstraintKind::Parent, &[*rig], *joint, true)?;
    }
    Ok(())
}

fn control_property(
    graph: &mut Graph,
    control: NodeKey,
    control_type: &str,
    index: usize,
    local: Transform,
) -> Result<MetaNode, RigError> {
    Ok(add_property(
        graph,
        control,
        "ControlProperty",
        &[
            (attr::CONTROL_TYPE, AttrValue::from(control_type)),
            (attr::ORDERED_INDEX, AttrValue::Int(index as i64)),
            (attr::LOCKED, AttrValue::from(false)),
            (attr::ZERO_TRANSLATE, AttrValue::from(local.translate.to_array())),
            (attr::ZERO_ROTATE, AttrValue::from(local.rotate.to_array())),
        ],
    )?)
}

fn create_control(
    scene: &mut dyn SceneHost,
    parts: &ComponentParts,
    name: &str,
    parent: NodeKey,
    local: Transform,
    control_type: &str,
    index: usize,
) -> Result<NodeKey, RigError> {
    let namespace = scene.graph().try_node(parts.group)?.namespace().unwrap_or_default().to_string();
    let full = format!("{namespace}:{}_{}_{name}_ctrl", parts.side, parts.region);
    let control = scene.create_object(&full, NodeKind::Transform, Some(parent))?;
    scene.set_local_transform(control, local)?;
    let graph = scene.graph_mut();
    control_property(graph, control, control_type, index, local)?;
    parts.controls.connect_node(graph, control, None)?;
    Ok(control)
}

/// One control per rigging joint, each parenting the next
#[derive(Debug, Clone, Copy)]
pub struct FkBuilder;

impl Buildable for FkBuilder {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Fk
    }

    fn expected_joints(&self) -> &'static str {
        "at least 1"
    }

    fn accepts(&self, joint_count: usize) -> bool {
        joint_count >= 1
    }

    fn build_controls(
        &self,
        scene: &mut dyn SceneHost,
        parts: &ComponentParts,
    ) -> Result<ControlSet, RigError> {
        let mut set = ControlSet::default();
        let mut parent = parts.group;
        for (index, rig) in parts.rigging_joints.iter().enumerate() {
            let local = scene.local_transform(*rig)?;
            let control = create_control(scene, parts, &format!("fk{index}"), parent, local, "fk", index)?;
            if let Some(previous) = set.controls.last() {
                link(scene.graph_mut(), control, *previous, Some(PICK_WALK_DOWN))?;
            }
            scene.constrain(ConstraintKind::Parent, &[control], *rig, true)?;
            set.controls.push(control);
            set.follow.push((control, parts.skeleton_joints[index]));
            parent = control;
        }
        Ok(set)
    }
}

/// A base control positioning the chain and a target it aims at
#[derive(Debug, Clone, Copy)]
pub struct AimBuilder;

impl Buildable for AimBuilder {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Aim
    }

    fn expected_joints(&self) -> &'static str {
        "1 or 2"
    }

    fn accepts(&self, joint_count: usize) -> bool {
        (1..=2).contains(&joint_count)
    }

    fn build_controls(
        &self,
        scene: &mut dyn SceneHost,
        parts: &ComponentParts,
    ) -> Result<ControlSet, RigError> {
        let root = parts.rigging_joints[0];
        let base_local = scene.local_transform(root)?;
        let base = create_control(scene, parts, "base", parts.group, base_local, "base", 0)?;

        let aim_local = match parts.rigging_joints.get(1) {
            Some(end) => Transform::from_translation(scene.local_transform(*end)?.translate),
            None => Transform::from_translation(DVec3::new(AIM_DISTANCE, 0.0, 0.0)),
        };
        let aim = create_control(scene, parts, "aim", base, aim_local, "aim", 1)?;
        link(scene.graph_mut(), aim, base, Some(PICK_WALK_DOWN))?;

        scene.constrain(ConstraintKind::Point, &[base], root, true)?;
        scene.constrain(ConstraintKind::Aim, &[aim], root, true)?;

        let aim_follows = parts
            .skeleton_joints
            .get(1)
            .copied()
            .unwrap_or(parts.skeleton_joints[0]);
        Ok(ControlSet {
            controls: vec![base, aim],
            follow: vec![(base, parts.skeleton_joints[0]), (aim, aim_follows)],
        })
    }
}
