// SPDX-License-Identifier: MIT OR Apache-2.0
//! Rig components and addons.
//!
//! A component drives a region's skeleton joints through a duplicated
//! rigging chain and animator-facing controls. Its metadata lives under a
//! `ComponentCore`:
//!
//! - `RiggingJoints` owns the duplicated chain
//! - `ControlJoints` owns the controls
//! - `SkeletonJoints` owns the driven skeleton joints and the curves they
//!   carried before the component was built
//! - `AttachmentJoints` owns objects other rigs may attach to
//!
//! Addons override a single control, for example to drive it from another
//! space.

pub mod addon;
pub mod build;
pub mod remove;
pub mod reparent;
pub mod switch;

pub use addon::{remove_addon, switch_space};
pub use build::{build_component, BuildOptions};
pub use remove::{bake_and_remove, enqueue_removal, remove_component, BatchStep, RigBakeDriver};
pub use reparent::reparent_component;
pub use switch::switch_component;

use crate::context::OperationContext;
use crate::error::RigError;
use crate::network::{
    attr, find_property, AddonControls, AddonCore, AttachmentJoints, CharacterCore, ComponentCore,
    ControlJoints, OverDrivenControl, RiggingJoints, SkeletonJoints,
};
use crate::scene::{ConstraintKind, SceneHost};
use rigforge_graph::{search, Direction, Graph, MetaNode, NetworkNode, NodeId, NodeKey, NodeKind};
use rigforge_sequencer::{BakeRequest, FrameRange};
use serde::{Deserialize, Serialize};

/// Frame holding the all-drivers reference key of multi-space addons
pub const SENTINEL_FRAME: f64 = -10000.0;

/// Target data of an addon driven from world space
pub const WORLD_SPACE: &str = "world";

/// Component kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    /// One control per joint
    Fk,
    /// Base control plus an aim target
    Aim,
}

impl ComponentKind {
    /// All kinds
    pub const ALL: [Self; 2] = [Self::Fk, Self::Aim];

    /// Name stored on the component
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fk => "FK",
            Self::Aim => "Aim",
        }
    }

    /// Parse a stored name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name().eq_ignore_ascii_case(name))
    }

    /// Control builder for this kind
    pub fn builder(&self) -> &'static dyn Buildable {
        match self {
            Self::Fk => &build::FkBuilder,
            Self::Aim => &build::AimBuilder,
        }
    }
}

/// Addon kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddonKind {
    /// Drive translation and rotation from another space
    Overdriver,
    /// Drive translation only
    Position,
    /// Drive rotation only
    Rotation,
}

impl AddonKind {
    /// All kinds
    pub const ALL: [Self; 3] = [Self::Overdriver, Self::Position, Self::Rotation];

    /// Name stored on the addon
    pub fn name(&self) -> &'static str {
        match self {
            Self::Overdriver => "Overdriver",
            Self::Position => "Position",
            Self::Rotation => "Rotation",
        }
    }

    /// Parse a stored name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name().eq_ignore_ascii_case(name))
    }

    /// Constraint tying the overdriven control to the addon control
    pub fn constraint_kind(&self) -> ConstraintKind {
        match self {
            Self::Overdriver => ConstraintKind::Parent,
            Self::Position => ConstraintKind::Point,
            Self::Rotation => ConstraintKind::Orient,
        }
    }
}

/// Scene objects and metadata nodes of a component under construction
#[derive(Debug, Clone)]
pub struct ComponentParts {
    /// Component root
    pub core: ComponentCore,
    /// Component kind
    pub kind: ComponentKind,
    /// Body side
    pub side: String,
    /// Region name
    pub region: String,
    /// Owner of the rigging chain
    pub rigging: RiggingJoints,
    /// Owner of the controls
    pub controls: ControlJoints,
    /// Owner of the skeleton joints
    pub skeleton: SkeletonJoints,
    /// Owner of attachment objects
    pub attachments: AttachmentJoints,
    /// Group holding every object the component creates
    pub group: NodeKey,
    /// Driven skeleton joints, root first
    pub skeleton_joints: Vec<NodeKey>,
    /// Rigging joints matching `skeleton_joints`
    pub rigging_joints: Vec<NodeKey>,
}

/// Controls created by a builder
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlSet {
    /// Controls in pick-walk order
    pub controls: Vec<NodeKey>,
    /// Skeleton joint each control follows while existing animation is transferred
    pub follow: Vec<(NodeKey, NodeKey)>,
}

/// Creates the controls of one component kind
pub trait Buildable: Sync {
    /// Kind built
    fn kind(&self) -> ComponentKind;

    /// Human readable joint counts accepted
    fn expected_joints(&self) -> &'static str;

    /// Whether a chain of `joint_count` joints can be rigged
    fn accepts(&self, joint_count: usize) -> bool;

    /// Create controls driving `parts.rigging_joints`
    fn build_controls(
        &self,
        scene: &mut dyn SceneHost,
        parts: &ComponentParts,
    ) -> Result<ControlSet, RigError>;
}

/// Something that can be taken off the rig
pub trait Removable {
    /// Remove, baking the driven objects first when `bake` is set
    fn remove(
        &self,
        scene: &mut dyn SceneHost,
        ctx: &OperationContext,
        bake: bool,
    ) -> Result<(), RigError>;
}

/// Something whose driven motion can be baked down
pub trait Bakeable {
    /// Request sampling the driven objects over `range`
    fn bake_request(&self, graph: &Graph, range: FrameRange) -> Option<BakeRequest<NodeKey>>;
}

/// Something whose controls accept space-switch addons
pub trait SpaceSwitchable {
    /// Controls that may be overdriven
    fn space_controls(&self, graph: &Graph) -> Vec<NodeKey>;
}

/// Resolve a stored node ID attribute
pub(crate) fn node_from_id_attr(graph: &Graph, meta: MetaNode, name: &str) -> Option<NodeKey> {
    NodeId::parse(&meta.get_string(graph, name)).and_then(|id| graph.find_by_id(id))
}

/// Node ID of a scene object as stored in attributes
pub(crate) fn id_string(graph: &Graph, key: NodeKey) -> String {
    graph.node(key).map(|n| n.id.to_string()).unwrap_or_default()
}

/// Range to bake `nodes` over: the operation range widened to their keys
pub(crate) fn animated_range(
    scene: &dyn SceneHost,
    nodes: &[NodeKey],
    ctx: &OperationContext,
) -> FrameRange {
    nodes
        .iter()
        .filter_map(|n| scene.key_range(*n))
        .fold(ctx.frame_range, |acc, r| acc.union(&r))
}

fn owned_of_kind(graph: &Graph, owner: Option<NodeKey>, kind: NodeKind) -> Vec<NodeKey> {
    owner
        .map(|o| {
            graph
                .outgoing(o)
                .into_iter()
                .filter(|k| graph.node(*k).is_some_and(|n| n.kind == kind))
                .collect()
        })
        .unwrap_or_default()
}

fn owned_objects(graph: &Graph, owner: Option<NodeKey>) -> Vec<NodeKey> {
    owner
        .map(|o| {
            graph
                .outgoing(o)
                .into_iter()
                .filter(|k| graph.node(*k).is_some_and(|n| n.kind.is_transform()))
                .collect()
        })
        .unwrap_or_default()
}

/// Handle to a built component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Component {
    /// Component root
    pub core: ComponentCore,
}

impl Component {
    /// Wrap a `ComponentCore` node
    pub fn from_key(graph: &Graph, key: NodeKey) -> Option<Self> {
        ComponentCore::from_key(graph, key).map(|core| Self { core })
    }

    /// Component owning a control, rigging joint or sub-node
    pub fn owning(graph: &Graph, node: NodeKey) -> Option<Self> {
        search::find_first(graph, node, "ComponentCore", Direction::Upstream)
            .map(|meta| Self { core: ComponentCore(meta) })
    }

    /// Whether the component still exists
    pub fn exists(&self, graph: &Graph) -> bool {
        self.core.exists(graph)
    }

    /// Component kind
    pub fn kind(&self, graph: &Graph) -> Option<ComponentKind> {
        ComponentKind::from_name(&self.core.get_string(graph, attr::COMPONENT_TYPE))
    }

    /// Body side
    pub fn side(&self, graph: &Graph) -> String {
        self.core.get_string(graph, attr::SIDE)
    }

    /// Region name
    pub fn region(&self, graph: &Graph) -> String {
        self.core.get_string(graph, attr::REGION)
    }

    /// Owning character
    pub fn character(&self, graph: &Graph) -> Option<CharacterCore> {
        self.core.upstream(graph)
    }

    /// Group holding the component's objects
    pub fn group(&self, graph: &Graph) -> Option<NodeKey> {
        node_from_id_attr(graph, self.core.0, attr::GROUP_ID)
    }

    /// Parent space object, `None` for world
    pub fn parent_space(&self, graph: &Graph) -> Option<NodeKey> {
        node_from_id_attr(graph, self.core.0, attr::PARENT_SPACE)
    }

    fn sub_node(&self, graph: &Graph, type_name: &str) -> Option<NodeKey> {
        self.core
            .get_connections(graph, Some(type_name))
            .into_iter()
            .next()
    }

    /// Driven skeleton joints, root first
    pub fn skeleton_joints(&self, graph: &Graph) -> Vec<NodeKey> {
        owned_of_kind(graph, self.sub_node(graph, SkeletonJoints::TYPE_NAME), NodeKind::Joint)
    }

    /// Curves the skeleton carried before the component was built
    pub fn saved_curves(&self, graph: &Graph) -> Vec<NodeKey> {
        owned_of_kind(graph, self.sub_node(graph, SkeletonJoints::TYPE_NAME), NodeKind::AnimCurve)
    }

    /// Rigging joints, root first
    pub fn rigging_joints(&self, graph: &Graph) -> Vec<NodeKey> {
        owned_of_kind(graph, self.sub_node(graph, RiggingJoints::TYPE_NAME), NodeKind::Joint)
    }

    /// Controls in pick-walk order
    pub fn controls(&self, graph: &Graph) -> Vec<NodeKey> {
        owned_objects(graph, self.sub_node(graph, ControlJoints::TYPE_NAME))
    }

    /// Attachment objects
    pub fn attachments(&self, graph: &Graph) -> Vec<NodeKey> {
        owned_objects(graph, self.sub_node(graph, AttachmentJoints::TYPE_NAME))
    }

    /// Constraints tying the skeleton to this component's rigging joints
    pub fn skeleton_constraints(&self, scene: &dyn SceneHost) -> Vec<NodeKey> {
        let graph = scene.graph();
        let rigging = self.rigging_joints(graph);
        self.skeleton_joints(graph)
            .into_iter()
            .flat_map(|joint| scene.constraints_on(joint))
            .filter(|c| {
                scene
                    .constraint_info(*c)
                    .is_some_and(|info| info.targets.iter().any(|t| rigging.contains(t)))
            })
            .collect()
    }

    /// Addons overriding this component's controls
    pub fn addons(&self, graph: &Graph) -> Vec<Addon> {
        let controls = self.controls(graph);
        let Some(character) = self.character(graph) else {
            return Vec::new();
        };
        character
            .all_downstream::<AddonCore>(graph)
            .into_iter()
            .map(|core| Addon { core })
            .filter(|addon| {
                addon
                    .overdriven_control(graph)
                    .is_some_and(|c| controls.contains(&c))
            })
            .collect()
    }

    /// Whether the component currently drives its skeleton
    pub fn is_active(&self, scene: &dyn SceneHost, frame: f64) -> bool {
        self.skeleton_constraints(scene)
            .first()
            .and_then(|c| scene.constraint_weight(*c, 0, frame).ok())
            .is_some_and(|w| w > 0.5)
    }
}

impl Bakeable for Component {
    fn bake_request(&self, graph: &Graph, range: FrameRange) -> Option<BakeRequest<NodeKey>> {
        let joints = self.skeleton_joints(graph);
        if joints.is_empty() {
            return None;
        }
        let label = format!("{} {} {}", self.side(graph), self.region(graph), self.core.name(graph));
        Some(BakeRequest::new(label, joints, range))
    }
}

impl SpaceSwitchable for Component {
    fn space_controls(&self, graph: &Graph) -> Vec<NodeKey> {
        self.controls(graph)
    }
}

impl Removable for Component {
    fn remove(
        &self,
        scene: &mut dyn SceneHost,
        ctx: &OperationContext,
        bake: bool,
    ) -> Result<(), RigError> {
        remove::remove_with(scene, ctx, *self, bake).map(|_| ())
    }
}

/// Components driving a skeleton joint, in build order
pub fn components_on(graph: &Graph, joint: NodeKey) -> Vec<Component> {
    search::neighbors(graph, joint, Direction::Upstream)
        .into_iter()
        .filter_map(|k| SkeletonJoints::from_key(graph, k))
        .filter_map(|skeleton| skeleton.upstream::<ComponentCore>(graph))
        .map(|core| Component { core })
        .collect()
}

/// Every component of a character
pub fn character_components(graph: &Graph, character: CharacterCore) -> Vec<Component> {
    character
        .all_downstream::<ComponentCore>(graph)
        .into_iter()
        .map(|core| Component { core })
        .collect()
}

/// Make `component` drive its skeleton, switching off every other
/// component sharing those joints
pub fn activate_component(
    scene: &mut dyn SceneHost,
    component: Component,
) -> Result<(), RigError> {
    let graph = scene.graph();
    let rigging = component.rigging_joints(graph);
    let mut weights = Vec::new();
    for joint in component.skeleton_joints(graph) {
        for other in components_on(graph, joint) {
            let other_rigging = other.rigging_joints(graph);
            for constraint in scene.constraints_on(joint) {
                let Some(info) = scene.constraint_info(constraint) else {
                    continue;
                };
                if info.targets.iter().any(|t| other_rigging.contains(t)) {
                    let active = info.targets.iter().any(|t| rigging.contains(t));
                    weights.push((constraint, if active { 1.0 } else { 0.0 }));
                }
            }
        }
    }
    weights.dedup();
    for (constraint, weight) in weights {
        scene.set_constraint_weight(constraint, 0, weight)?;
    }
    tracing::debug!("Activated {}", component.core.name(scene.graph()));
    Ok(())
}

/// Handle to an addon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Addon {
    /// Addon root
    pub core: AddonCore,
}

impl Addon {
    /// Wrap an `AddonCore` node
    pub fn from_key(graph: &Graph, key: NodeKey) -> Option<Self> {
        AddonCore::from_key(graph, key).map(|core| Self { core })
    }

    /// Addon kind
    pub fn kind(&self, graph: &Graph) -> Option<AddonKind> {
        AddonKind::from_name(&self.core.get_string(graph, attr::COMPONENT_TYPE))
    }

    /// Control the addon overrides
    pub fn overdriven_control(&self, graph: &Graph) -> Option<NodeKey> {
        let owner = self.core.downstream::<OverDrivenControl>(graph)?;
        owned_objects(graph, Some(owner.key())).into_iter().next()
    }

    /// Controls the addon created
    pub fn addon_controls(&self, graph: &Graph) -> Vec<NodeKey> {
        owned_objects(graph, self.core.downstream::<AddonControls>(graph).map(|c| c.key()))
    }

    /// Group holding the addon's objects
    pub fn group(&self, graph: &Graph) -> Option<NodeKey> {
        node_from_id_attr(graph, self.core.0, attr::GROUP_ID)
    }

    /// Driver objects, empty for world space
    pub fn drivers(&self, graph: &Graph) -> Vec<NodeKey> {
        self.core
            .get_string(graph, attr::TARGET_DATA)
            .split(',')
            .filter_map(NodeId::parse)
            .filter_map(|id| graph.find_by_id(id))
            .collect()
    }
}

impl Bakeable for Addon {
    fn bake_request(&self, graph: &Graph, range: FrameRange) -> Option<BakeRequest<NodeKey>> {
        let control = self.overdriven_control(graph)?;
        Some(BakeRequest::new(self.core.name(graph), vec![control], range))
    }
}

impl Removable for Addon {
    fn remove(
        &self,
        scene: &mut dyn SceneHost,
        ctx: &OperationContext,
        bake: bool,
    ) -> Result<(), RigError> {
        addon::remove_addon(scene, ctx, *self, bake)
    }
}

/// Addon currently overriding a control
pub fn addon_on(graph: &Graph, control: NodeKey) -> Option<Addon> {
    let character = crate::character::find_character(graph, control)?;
    character
        .all_downstream::<AddonCore>(graph)
        .into_iter()
        .map(|core| Addon { core })
        .find(|addon| addon.overdriven_control(graph) == Some(control))
}

/// Whether an object carries a `ControlProperty`
pub fn is_control(graph: &Graph, node: NodeKey) -> bool {
    find_property(graph, node, "ControlProperty").is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_round_trip() {
        for kind in ComponentKind::ALL {
            assert_eq!(ComponentKind::from_name(kind.name()), Some(kind));
            assert_eq!(kind.builder().kind(), kind);
        }
        assert_eq!(ComponentKind::from_name("fk"), Some(ComponentKind::Fk));
        assert_eq!(AddonKind::from_name("position"), Some(AddonKind::Position));
        assert_eq!(AddonKind::Rotation.constraint_kind(), ConstraintKind::Orient);
    }

    #[test]
    fn test_builders_check_joint_counts() {
        assert!(ComponentKind::Fk.builder().accepts(1));
        assert!(ComponentKind::Fk.builder().accepts(6));
        assert!(!ComponentKind::Fk.builder().accepts(0));
        assert!(ComponentKind::Aim.builder().accepts(2));
        assert!(!ComponentKind::Aim.builder().accepts(3));
    }
}
