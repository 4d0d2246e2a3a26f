// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory scene host.
//!
//! Objects live in the metadata [`Graph`]; transforms, curves and
//! constraints are kept in side tables keyed by node. World evaluation at a
//! frame composes parent world with the curve-driven local transform, then
//! applies the object's constraints in creation order.

use super::{ConstraintInfo, ConstraintKind, SceneError, SceneHost, Transform};
use glam::{DAffine3, DQuat, DVec3, DVec4};
use indexmap::IndexMap;
use rigforge_graph::{Graph, NodeKey, NodeKind, NodeTypeRegistry};
use rigforge_sequencer::{
    AnimCurve, BakeRequest, Channel, FrameRange, InterpolationMode, Timeline,
};
use std::collections::{HashMap, HashSet};

/// Weights at or below this are ignored when blending
const WEIGHT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone)]
struct ConstraintTarget {
    node: NodeKey,
    weight: f64,
    weight_curve: Option<AnimCurve>,
    offset: DAffine3,
}

impl ConstraintTarget {
    fn weight_at(&self, frame: f64) -> f64 {
        self.weight_curve
            .as_ref()
            .and_then(|c| c.evaluate(frame))
            .unwrap_or(self.weight)
    }
}

#[derive(Debug, Clone)]
struct ConstraintData {
    kind: ConstraintKind,
    driven: NodeKey,
    targets: Vec<ConstraintTarget>,
    /// Rotation applied after aiming, measured at creation
    aim_offset: DQuat,
}

#[derive(Debug, Clone)]
struct CurveData {
    curve: AnimCurve,
    target: Option<(NodeKey, Channel)>,
}

/// Scene host backed entirely by memory
#[derive(Debug, Clone)]
pub struct MemoryScene {
    graph: Graph,
    locals: IndexMap<NodeKey, Transform>,
    curves: IndexMap<NodeKey, CurveData>,
    drivers: IndexMap<(NodeKey, Channel), NodeKey>,
    constraints: IndexMap<NodeKey, ConstraintData>,
    timeline: Timeline,
}

impl MemoryScene {
    /// Create an empty scene interpreting tags with `registry`
    pub fn new(registry: NodeTypeRegistry) -> Self {
        Self {
            graph: Graph::new("scene", registry),
            locals: IndexMap::new(),
            curves: IndexMap::new(),
            drivers: IndexMap::new(),
            constraints: IndexMap::new(),
            timeline: Timeline::default(),
        }
    }

    /// Create an empty scene with the rigging node types registered
    pub fn with_rig_types() -> Self {
        Self::new(crate::network::builtin_registry())
    }

    /// Create a joint with a local transform
    pub fn create_joint(
        &mut self,
        name: &str,
        parent: Option<NodeKey>,
        local: Transform,
    ) -> Result<NodeKey, SceneError> {
        let joint = self.create_object(name, NodeKind::Joint, parent)?;
        self.locals.insert(joint, local);
        Ok(joint)
    }

    /// Number of constraints in the scene
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    fn require_transform(&self, node: NodeKey) -> Result<(), SceneError> {
        let object = self.graph.node(node).ok_or(SceneError::ObjectNotFound(node))?;
        if !self.locals.contains_key(&node) {
            return Err(SceneError::NotATransform(object.name.clone()));
        }
        Ok(())
    }

    fn transform_parent(&self, node: NodeKey) -> Option<NodeKey> {
        self.graph
            .parent(node)
            .filter(|p| self.locals.contains_key(p))
    }

    fn constraint(&self, constraint: NodeKey) -> Result<&ConstraintData, SceneError> {
        self.constraints
            .get(&constraint)
            .ok_or(SceneError::NotAConstraint(constraint))
    }

    fn constraint_target_mut(
        &mut self,
        constraint: NodeKey,
        index: usize,
    ) -> Result<&mut ConstraintTarget, SceneError> {
        self.constraints
            .get_mut(&constraint)
            .ok_or(SceneError::NotAConstraint(constraint))?
            .targets
            .get_mut(index)
            .ok_or(SceneError::TargetOutOfRange { constraint, index })
    }

    /// Evaluate a world matrix, sharing `cache` across one frame
    fn evaluate(
        &self,
        node: NodeKey,
        frame: f64,
        cache: &mut HashMap<NodeKey, DAffine3>,
    ) -> Result<DAffine3, SceneError> {
        if let Some(world) = cache.get(&node) {
            return Ok(*world);
        }
        // Provisional entry so constraint cycles resolve to rest
        cache.insert(node, self.rest_matrix(node)?);

        let local = self.local_at(node, frame)?.to_affine();
        let parent_world = match self.transform_parent(node) {
            Some(parent) => self.evaluate(parent, frame, cache)?,
            None => DAffine3::IDENTITY,
        };
        let mut world = parent_world * local;

        let acting: Vec<NodeKey> = self.constraints_on(node);
        for constraint in acting {
            world = self.apply_constraint(constraint, world, frame, cache)?;
        }

        cache.insert(node, world);
        Ok(world)
    }

    fn apply_constraint(
        &self,
        constraint: NodeKey,
        world: DAffine3,
        frame: f64,
        cache: &mut HashMap<NodeKey, DAffine3>,
    ) -> Result<DAffine3, SceneError> {
        let data = self.constraint(constraint)?;

        let mut total = 0.0;
        let mut translate = DVec3::ZERO;
        let mut scale = DVec3::ZERO;
        let mut rotation = DVec4::ZERO;
        let mut reference: Option<DQuat> = None;

        for target in &data.targets {
            let weight = target.weight_at(frame);
            if weight <= WEIGHT_EPSILON {
                continue;
            }
            let candidate = self.evaluate(target.node, frame, cache)? * target.offset;
            let (s, r, t) = candidate.to_scale_rotation_translation();
            let r = match reference {
                Some(q) if q.dot(r) < 0.0 => -r,
                Some(_) => r,
                None => {
                    reference = Some(r);
                    r
                }
            };
            total += weight;
            translate += t * weight;
            scale += s * weight;
            rotation += DVec4::from(r) * weight;
        }

        if total <= WEIGHT_EPSILON {
            return Ok(world);
        }
        let translate = translate / total;
        let scale = scale / total;
        let rotation = DQuat::from_vec4(rotation).normalize();
        let (base_scale, base_rotation, base_translate) = world.to_scale_rotation_translation();

        let result = match data.kind {
            ConstraintKind::Parent => {
                DAffine3::from_scale_rotation_translation(base_scale, rotation, translate)
            }
            ConstraintKind::Point => {
                DAffine3::from_scale_rotation_translation(base_scale, base_rotation, translate)
            }
            ConstraintKind::Orient => {
                DAffine3::from_scale_rotation_translation(base_scale, rotation, base_translate)
            }
            ConstraintKind::Scale => {
                DAffine3::from_scale_rotation_translation(scale, base_rotation, base_translate)
            }
            ConstraintKind::Aim => {
                let direction = (translate - base_translate).normalize_or_zero();
                if direction == DVec3::ZERO {
                    return Ok(world);
                }
                let aim = DQuat::from_rotation_arc(DVec3::X, direction) * data.aim_offset;
                DAffine3::from_scale_rotation_translation(base_scale, aim, base_translate)
            }
        };
        Ok(result)
    }

    /// Forget side-table state for a node about to leave the graph
    fn forget(&mut self, node: NodeKey) {
        self.locals.shift_remove(&node);
        if let Some(data) = self.curves.shift_remove(&node) {
            if let Some(target) = data.target {
                self.drivers.shift_remove(&target);
            }
        }
        self.constraints.shift_remove(&node);
        self.drivers.retain(|(driven, _), _| *driven != node);
    }

    fn create_curve(&mut self, node: NodeKey, channel: Channel) -> Result<NodeKey, SceneError> {
        let name = format!("{}_{}", self.graph.try_node(node)?.short_name(), channel.name());
        let curve = self.graph.add_node(&name, NodeKind::AnimCurve);
        self.curves.insert(
            curve,
            CurveData {
                curve: AnimCurve::new(),
                target: Some((node, channel)),
            },
        );
        self.drivers.insert((node, channel), curve);
        Ok(curve)
    }
}

impl Default for MemoryScene {
    fn default() -> Self {
        Self::with_rig_types()
    }
}

impl SceneHost for MemoryScene {
    fn graph(&self) -> &Graph {
        &self.graph
    }

    fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    fn create_object(
        &mut self,
        name: &str,
        kind: NodeKind,
        parent: Option<NodeKey>,
    ) -> Result<NodeKey, SceneError> {
        if let Some(parent) = parent {
            self.graph.try_node(parent)?;
        }
        let node = self.graph.add_node(name, kind);
        if kind.is_transform() {
            self.locals.insert(node, Transform::IDENTITY);
        }
        if parent.is_some() {
            self.graph.set_parent(node, parent)?;
        }
        Ok(node)
    }

    fn delete_object(&mut self, node: NodeKey) -> Result<usize, SceneError> {
        self.graph.try_node(node)?;

        let mut doomed = vec![node];
        doomed.extend(self.graph.descendants(node));
        let doomed_set: HashSet<NodeKey> = doomed.iter().copied().collect();

        let driving: Vec<NodeKey> = self
            .drivers
            .iter()
            .filter(|((driven, _), _)| doomed_set.contains(driven))
            .map(|(_, curve)| *curve)
            .collect();
        doomed.extend(driving);

        for (key, data) in &mut self.constraints {
            if doomed_set.contains(&data.driven) && !doomed_set.contains(key) {
                doomed.push(*key);
            }
            data.targets.retain(|t| !doomed_set.contains(&t.node));
        }
        let emptied: Vec<NodeKey> = self
            .constraints
            .iter()
            .filter(|(key, data)| data.targets.is_empty() && !doomed.contains(key))
            .map(|(key, _)| *key)
            .collect();
        doomed.extend(emptied);

        let mut removed = 0;
        for key in doomed.into_iter().rev() {
            self.forget(key);
            if self.graph.remove_node(key).is_some() {
                removed += 1;
            }
        }
        tracing::debug!("Deleted {removed} scene objects");
        Ok(removed)
    }

    fn duplicate(
        &mut self,
        node: NodeKey,
        name: &str,
        parent: Option<NodeKey>,
    ) -> Result<NodeKey, SceneError> {
        let kind = self.graph.try_node(node)?.kind;
        let copy = self.create_object(name, kind, parent)?;
        if let Some(local) = self.locals.get(&node).copied() {
            self.locals.insert(copy, local);
        }
        Ok(copy)
    }

    fn set_parent(&mut self, node: NodeKey, parent: Option<NodeKey>) -> Result<(), SceneError> {
        self.graph.set_parent(node, parent)?;
        Ok(())
    }

    fn local_transform(&self, node: NodeKey) -> Result<Transform, SceneError> {
        self.require_transform(node)?;
        Ok(self.locals.get(&node).copied().unwrap_or_default())
    }

    fn set_local_transform(&mut self, node: NodeKey, transform: Transform) -> Result<(), SceneError> {
        self.require_transform(node)?;
        self.locals.insert(node, transform);
        if self.timeline.auto_key {
            let frame = self.timeline.current_frame;
            for (channel, curve) in self.curves_on(node) {
                if let Some(data) = self.curves.get_mut(&curve) {
                    data.curve.set_key(frame, transform.channel(channel));
                }
            }
        }
        Ok(())
    }

    fn local_at(&self, node: NodeKey, frame: f64) -> Result<Transform, SceneError> {
        let mut local = self.local_transform(node)?;
        for (channel, curve) in self.curves_on(node) {
            if let Some(value) = self.curve(curve).and_then(|c| c.evaluate(frame)) {
                local.set_channel(channel, value);
            }
        }
        Ok(local)
    }

    fn world_matrix(&self, node: NodeKey, frame: f64) -> Result<DAffine3, SceneError> {
        self.require_transform(node)?;
        self.evaluate(node, frame, &mut HashMap::new())
    }

    fn rest_matrix(&self, node: NodeKey) -> Result<DAffine3, SceneError> {
        let mut world = self.local_transform(node)?.to_affine();
        let mut current = self.transform_parent(node);
        let mut seen = HashSet::from([node]);
        while let Some(parent) = current {
            if !seen.insert(parent) {
                break;
            }
            world = self.local_transform(parent)?.to_affine() * world;
            current = self.transform_parent(parent);
        }
        Ok(world)
    }

    fn constrain(
        &mut self,
        kind: ConstraintKind,
        targets: &[NodeKey],
        driven: NodeKey,
        maintain_offset: bool,
    ) -> Result<NodeKey, SceneError> {
        if targets.is_empty() {
            return Err(SceneError::NoTargets);
        }
        self.require_transform(driven)?;
        let driven_rest = self.rest_matrix(driven)?;

        let mut constraint_targets = Vec::with_capacity(targets.len());
        for target in targets {
            self.require_transform(*target)?;
            let offset = if maintain_offset && kind != ConstraintKind::Aim {
                self.rest_matrix(*target)?.inverse() * driven_rest
            } else {
                DAffine3::IDENTITY
            };
            constraint_targets.push(ConstraintTarget {
                node: *target,
                weight: 1.0,
                weight_curve: None,
                offset,
            });
        }

        let aim_offset = if kind == ConstraintKind::Aim && maintain_offset {
            let mut aim_point = DVec3::ZERO;
            for target in targets {
                aim_point += self.rest_matrix(*target)?.translation;
            }
            aim_point /= targets.len() as f64;
            let (_, driven_rotation, driven_translate) = driven_rest.to_scale_rotation_translation();
            let direction = (aim_point - driven_translate).normalize_or_zero();
            if direction == DVec3::ZERO {
                DQuat::IDENTITY
            } else {
                DQuat::from_rotation_arc(DVec3::X, direction).inverse() * driven_rotation
            }
        } else {
            DQuat::IDENTITY
        };

        let name = format!(
            "{}_{}Constraint",
            self.graph.try_node(driven)?.short_name(),
            kind.name()
        );
        let constraint = self.graph.add_node(&name, NodeKind::Constraint);
        self.graph.set_parent(constraint, Some(driven))?;
        self.constraints.insert(
            constraint,
            ConstraintData {
                kind,
                driven,
                targets: constraint_targets,
                aim_offset,
            },
        );
        tracing::debug!("Created {}", self.graph.name_of(constraint));
        Ok(constraint)
    }

    fn constraint_info(&self, constraint: NodeKey) -> Option<ConstraintInfo> {
        let data = self.constraints.get(&constraint)?;
        Some(ConstraintInfo {
            kind: data.kind,
            driven: data.driven,
            targets: data.targets.iter().map(|t| t.node).collect(),
        })
    }

    fn constraints_on(&self, driven: NodeKey) -> Vec<NodeKey> {
        self.constraints
            .iter()
            .filter(|(_, data)| data.driven == driven)
            .map(|(key, _)| *key)
            .collect()
    }

    fn constraints_targeting(&self, target: NodeKey) -> Vec<NodeKey> {
        self.constraints
            .iter()
            .filter(|(_, data)| data.targets.iter().any(|t| t.node == target))
            .map(|(key, _)| *key)
            .collect()
    }

    fn set_constraint_weight(
        &mut self,
        constraint: NodeKey,
        index: usize,
        weight: f64,
    ) -> Result<(), SceneError> {
        let target = self.constraint_target_mut(constraint, index)?;
        target.weight = weight;
        target.weight_curve = None;
        Ok(())
    }

    fn key_constraint_weight(
        &mut self,
        constraint: NodeKey,
        index: usize,
        frame: f64,
        weight: f64,
    ) -> Result<(), SceneError> {
        let target = self.constraint_target_mut(constraint, index)?;
        target
            .weight_curve
            .get_or_insert_with(AnimCurve::new)
            .set_key_with(frame, weight, InterpolationMode::Constant);
        Ok(())
    }

    fn constraint_weight(
        &self,
        constraint: NodeKey,
        index: usize,
        frame: f64,
    ) -> Result<f64, SceneError> {
        self.constraint(constraint)?
            .targets
            .get(index)
            .map(|t| t.weight_at(frame))
            .ok_or(SceneError::TargetOutOfRange { constraint, index })
    }

    fn curves_on(&self, node: NodeKey) -> Vec<(Channel, NodeKey)> {
        let mut found: Vec<(Channel, NodeKey)> = self
            .drivers
            .iter()
            .filter(|((driven, _), _)| *driven == node)
            .map(|((_, channel), curve)| (*channel, *curve))
            .collect();
        found.sort_by_key(|(channel, _)| *channel);
        found
    }

    fn curve(&self, curve: NodeKey) -> Option<&AnimCurve> {
        self.curves.get(&curve).map(|d| &d.curve)
    }

    fn curve_mut(&mut self, curve: NodeKey) -> Option<&mut AnimCurve> {
        self.curves.get_mut(&curve).map(|d| &mut d.curve)
    }

    fn curve_target(&self, curve: NodeKey) -> Option<(NodeKey, Channel)> {
        self.curves.get(&curve)?.target
    }

    fn connect_curve(
        &mut self,
        curve: NodeKey,
        node: NodeKey,
        channel: Channel,
    ) -> Result<(), SceneError> {
        if !self.curves.contains_key(&curve) {
            return Err(SceneError::NotACurve(curve));
        }
        self.require_transform(node)?;

        if let Some(existing) = self.drivers.get(&(node, channel)).copied() {
            if existing == curve {
                return Ok(());
            }
            self.delete_object(existing)?;
        }
        self.disconnect_curve(curve)?;
        if let Some(data) = self.curves.get_mut(&curve) {
            data.target = Some((node, channel));
        }
        self.drivers.insert((node, channel), curve);
        Ok(())
    }

    fn disconnect_curve(&mut self, curve: NodeKey) -> Result<Option<(NodeKey, Channel)>, SceneError> {
        let data = self.curves.get_mut(&curve).ok_or(SceneError::NotACurve(curve))?;
        let previous = data.target.take();
        if let Some(target) = previous {
            self.drivers.shift_remove(&target);
        }
        Ok(previous)
    }

    fn set_key(
        &mut self,
        node: NodeKey,
        channel: Channel,
        frame: f64,
        value: f64,
    ) -> Result<NodeKey, SceneError> {
        self.require_transform(node)?;
        let curve = match self.drivers.get(&(node, channel)).copied() {
            Some(curve) => curve,
            None => self.create_curve(node, channel)?,
        };
        if let Some(data) = self.curves.get_mut(&curve) {
            data.curve.set_key(frame, value);
        }
        Ok(curve)
    }

    fn bake(&mut self, requests: &[BakeRequest<NodeKey>]) -> Result<usize, SceneError> {
        let mut samples: IndexMap<(NodeKey, Channel), (FrameRange, Vec<(f64, f64)>)> =
            IndexMap::new();

        for request in requests {
            for target in &request.targets {
                self.require_transform(*target)?;
            }
            for frame in request.range.frames() {
                let mut cache = HashMap::new();
                for target in &request.targets {
                    let world = self.evaluate(*target, frame, &mut cache)?;
                    let parent_world = match self.transform_parent(*target) {
                        Some(parent) => self.evaluate(parent, frame, &mut cache)?,
                        None => DAffine3::IDENTITY,
                    };
                    let local = Transform::from_affine(&(parent_world.inverse() * world));
                    for channel in &request.channels {
                        let entry = samples
                            .entry((*target, *channel))
                            .or_insert_with(|| (request.range, Vec::new()));
                        entry.0 = entry.0.union(&request.range);
                        entry.1.push((frame, local.channel(*channel)));
                    }
                }
            }
        }

        let mut written = 0;
        for ((node, channel), (range, keys)) in samples {
            let curve = match self.drivers.get(&(node, channel)).copied() {
                Some(curve) => curve,
                None => self.create_curve(node, channel)?,
            };
            if let Some(data) = self.curves.get_mut(&curve) {
                data.curve.remove_range(range);
                for (frame, value) in keys {
                    data.curve.set_key(frame, value);
                    written += 1;
                }
            }
        }
        tracing::debug!("Baked {written} keys from {} requests", requests.len());
        Ok(written)
    }

    fn playback_range(&self) -> FrameRange {
        self.timeline.range
    }

    fn set_playback_range(&mut self, range: FrameRange) {
        self.timeline.range = range;
    }

    fn current_frame(&self) -> f64 {
        self.timeline.current_frame
    }

    fn set_current_frame(&mut self, frame: f64) {
        self.timeline.set_current_frame(frame);
    }

    fn auto_key(&self) -> bool {
        self.timeline.auto_key
    }

    fn set_auto_key(&mut self, enabled: bool) {
        self.timeline.auto_key = enabled;
    }

    fn delete_namespace(&mut self, namespace: &str) -> usize {
        let members: Vec<NodeKey> = self
            .graph
            .nodes()
            .filter(|n| n.namespace() == Some(namespace))
            .map(|n| n.key)
            .collect();
        let mut removed = 0;
        for member in members {
            if self.graph.contains(member) {
                removed += self.delete_object(member).unwrap_or(0);
            }
        }
        tracing::debug!("Deleted namespace {namespace} ({removed} objects)");
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::matrices_match;

    fn offset(x: f64, y: f64, z: f64) -> Transform {
        Transform::from_translation(DVec3::new(x, y, z))
    }

    fn chain(scene: &mut MemoryScene) -> [NodeKey; 3] {
        let a = scene.create_joint("a", None, offset(0.0, 0.0, 0.0)).unwrap();
        let b = scene.create_joint("b", Some(a), offset(1.0, 0.0, 0.0)).unwrap();
        let c = scene.create_joint("c", Some(b), offset(1.0, 0.0, 0.0)).unwrap();
        [a, b, c]
    }

    #[test]
    fn test_world_composes_parents_and_curves() {
        let mut scene = MemoryScene::default();
        let [a, _, c] = chain(&mut scene);
        scene.set_key(a, Channel::TranslateY, 0.0, 0.0).unwrap();
        scene.set_key(a, Channel::TranslateY, 10.0, 5.0).unwrap();

        let world = scene.world_matrix(c, 5.0).unwrap();
        assert!(world.translation.abs_diff_eq(DVec3::new(2.0, 2.5, 0.0), 1e-9));
        let rest = scene.rest_matrix(c).unwrap();
        assert!(rest.translation.abs_diff_eq(DVec3::new(2.0, 0.0, 0.0), 1e-9));
    }

    #[test]
    fn test_parent_constraint_with_offset_follows_target() {
        let mut scene = MemoryScene::default();
        let driver = scene.create_joint("driver", None, offset(0.0, 0.0, 0.0)).unwrap();
        let follower = scene.create_joint("follower", None, offset(3.0, 0.0, 0.0)).unwrap();
        scene.constrain(ConstraintKind::Parent, &[driver], follower, true).unwrap();
        scene.set_key(driver, Channel::TranslateZ, 0.0, 4.0).unwrap();

        let world = scene.world_matrix(follower, 0.0).unwrap();
        assert!(world.translation.abs_diff_eq(DVec3::new(3.0, 0.0, 4.0), 1e-9));
    }

    #[test]
    fn test_weights_blend_and_swap() {
        let mut scene = MemoryScene::default();
        let left = scene.create_joint("left", None, offset(-1.0, 0.0, 0.0)).unwrap();
        let right = scene.create_joint("right", None, offset(1.0, 0.0, 0.0)).unwrap();
        let driven = scene.create_joint("driven", None, Transform::IDENTITY).unwrap();
        let constraint = scene
            .constrain(ConstraintKind::Point, &[left, right], driven, false)
            .unwrap();

        let blended = scene.world_matrix(driven, 0.0).unwrap();
        assert!(blended.translation.abs_diff_eq(DVec3::ZERO, 1e-9));

        scene.set_constraint_weight(constraint, 0, 0.0).unwrap();
        let swapped = scene.world_matrix(driven, 0.0).unwrap();
        assert!(swapped.translation.abs_diff_eq(DVec3::new(1.0, 0.0, 0.0), 1e-9));

        scene.key_constraint_weight(constraint, 0, 10.0, 1.0).unwrap();
        scene.key_constraint_weight(constraint, 1, 10.0, 0.0).unwrap();
        assert_eq!(scene.constraint_weight(constraint, 1, 12.0).unwrap(), 0.0);
        assert!(scene.set_constraint_weight(constraint, 5, 1.0).is_err());
    }

    #[test]
    fn test_aim_constraint_keeps_rest_pose() {
        let mut scene = MemoryScene::default();
        let base = scene.create_joint("base", None, Transform::IDENTITY).unwrap();
        let target = scene.create_joint("target", None, offset(0.0, 2.0, 0.0)).unwrap();
        let rest = scene.rest_matrix(base).unwrap();
        scene.constrain(ConstraintKind::Aim, &[target], base, true).unwrap();

        let at_rest = scene.world_matrix(base, 0.0).unwrap();
        assert!(matrices_match(&at_rest, &rest, 1e-9));

        scene.set_key(target, Channel::TranslateX, 0.0, 2.0).unwrap();
        scene.set_key(target, Channel::TranslateY, 0.0, 0.0).unwrap();
        let turned = scene.world_matrix(base, 0.0).unwrap();
        assert!(!matrices_match(&turned, &rest, 1e-6));
    }

    #[test]
    fn test_bake_captures_constrained_motion() {
        let mut scene = MemoryScene::default();
        let driver = scene.create_joint("driver", None, Transform::IDENTITY).unwrap();
        let follower = scene.create_joint("follower", None, Transform::IDENTITY).unwrap();
        scene.set_key(driver, Channel::TranslateX, 0.0, 0.0).unwrap();
        scene.set_key(driver, Channel::TranslateX, 4.0, 8.0).unwrap();
        let constraint = scene
            .constrain(ConstraintKind::Parent, &[driver], follower, false)
            .unwrap();

        let before: Vec<DAffine3> = (0..=4)
            .map(|f| scene.world_matrix(follower, f as f64).unwrap())
            .collect();
        let request = BakeRequest::new("follower", vec![follower], FrameRange::new(0.0, 4.0));
        let written = scene.bake(&[request]).unwrap();
        assert_eq!(written, 5 * Channel::ALL.len());

        scene.delete_object(constraint).unwrap();
        for (frame, expected) in before.iter().enumerate() {
            let world = scene.world_matrix(follower, frame as f64).unwrap();
            assert!(matrices_match(&world, expected, 1e-9));
        }
    }

    #[test]
    fn test_delete_cleans_curves_and_constraints() {
        let mut scene = MemoryScene::default();
        let [a, b, c] = chain(&mut scene);
        let other = scene.create_joint("other", None, Transform::IDENTITY).unwrap();
        scene.set_key(b, Channel::RotateZ, 0.0, 10.0).unwrap();
        scene.constrain(ConstraintKind::Parent, &[c], other, true).unwrap();
        let nodes_before = scene.graph().node_count();

        let removed = scene.delete_object(b).unwrap();

        // b, c, b's curve, and the constraint left without targets
        assert_eq!(removed, 4);
        assert_eq!(scene.graph().node_count(), nodes_before - 4);
        assert_eq!(scene.constraint_count(), 0);
        assert!(scene.graph().contains(a));
        assert!(scene.curves_on(b).is_empty());
    }

    #[test]
    fn test_connect_curve_replaces_existing() {
        let mut scene = MemoryScene::default();
        let [a, b, _] = chain(&mut scene);
        let first = scene.set_key(a, Channel::TranslateX, 0.0, 1.0).unwrap();
        let second = scene.set_key(b, Channel::TranslateX, 0.0, 2.0).unwrap();

        assert_eq!(scene.disconnect_curve(second).unwrap(), Some((b, Channel::TranslateX)));
        scene.connect_curve(second, a, Channel::TranslateX).unwrap();

        assert!(!scene.graph().contains(first));
        assert_eq!(scene.curve_target(second), Some((a, Channel::TranslateX)));
        assert_eq!(scene.local_at(a, 0.0).unwrap().translate.x, 2.0);
    }

    #[test]
    fn test_auto_key_records_edits_on_animated_nodes() {
        let mut scene = MemoryScene::default();
        let [a, b, _] = chain(&mut scene);
        let curve = scene.set_key(a, Channel::TranslateX, 0.0, 0.0).unwrap();
        scene.set_auto_key(true);
        scene.set_current_frame(6.0);

        scene.set_local_transform(a, offset(3.0, 0.0, 0.0)).unwrap();
        scene.set_local_transform(b, offset(9.0, 0.0, 0.0)).unwrap();

        assert_eq!(scene.curve(curve).unwrap().evaluate(6.0), Some(3.0));
        assert!(!scene.is_animated(b));
    }

    #[test]
    fn test_delete_namespace() {
        let mut scene = MemoryScene::default();
        let root = scene.create_joint("tmp:root", None, Transform::IDENTITY).unwrap();
        scene.create_joint("tmp:child", Some(root), Transform::IDENTITY).unwrap();
        scene.create_joint("keep", None, Transform::IDENTITY).unwrap();

        assert_eq!(scene.delete_namespace("tmp"), 2);
        assert_eq!(scene.graph().node_count(), 1);
    }
}
