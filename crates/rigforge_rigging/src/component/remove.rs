// SPDX-License-Identifier: MIT OR Apache-2.0
//! Removing components, alone or batched behind one bake pass.

use super::{activate_component, animated_range, components_on, Bakeable, Component, Removable};
use crate::character::{find_region, remove_region};
use crate::context::OperationContext;
use crate::error::RigError;
use crate::network::{attr, remove_properties};
use crate::scene::SceneHost;
use rigforge_graph::{Graph, NodeId, NodeKey};
use std::collections::HashSet;
use rigforge_sequencer::{BakeDriver, BakeQueue, BakeRequest, BakeSummary, Channel};

/// Work queued around the batched bake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStep {
    /// Take every addon off the component's controls
    RemoveAddons {
        /// Component whose addons go
        component: Component,
        /// Bake each overdriven control first
        bake: bool,
    },
    /// Make the component drive its skeleton
    ActivateComponent(Component),
    /// Delete the component's objects and metadata
    FinalizeRemoval {
        /// Component to delete
        component: Component,
        /// Whether the skeleton was baked beforehand
        baked: bool,
    },
}

/// Executes [`BatchStep`]s and bake requests against a scene
pub struct RigBakeDriver<'a> {
    scene: &'a mut dyn SceneHost,
    ctx: &'a OperationContext,
    /// Components activated after their neighbours were removed
    pub activated: Vec<Component>,
}

impl<'a> RigBakeDriver<'a> {
    /// Drive `scene` with the preferences in `ctx`
    pub fn new(scene: &'a mut dyn SceneHost, ctx: &'a OperationContext) -> Self {
        Self {
            scene,
            ctx,
            activated: Vec::new(),
        }
    }
}

impl BakeDriver<NodeKey, BatchStep> for RigBakeDriver<'_> {
    type Error = RigError;

    fn run_step(&mut self, step: BatchStep) -> Result<(), RigError> {
        match step {
            BatchStep::RemoveAddons { component, bake } => {
                for addon in component.addons(self.scene.graph()) {
                    addon.remove(self.scene, self.ctx, bake)?;
                }
                Ok(())
            }
            BatchStep::ActivateComponent(component) => activate_component(self.scene, component),
            BatchStep::FinalizeRemoval { component, baked } => {
                if let Some(next) = finalize(self.scene, self.ctx, component, baked)? {
                    self.activated.push(next);
                }
                Ok(())
            }
        }
    }

    fn sample(&mut self, requests: &[BakeRequest<NodeKey>]) -> Result<usize, RigError> {
        Ok(self.scene.bake(requests)?)
    }
}

/// Queue everything needed to remove `component`
pub fn enqueue_removal(
    queue: &mut BakeQueue<NodeKey, BatchStep>,
    scene: &dyn SceneHost,
    ctx: &OperationContext,
    component: Component,
    bake: bool,
) {
    queue.push_pre(BatchStep::RemoveAddons { component, bake });
    if bake {
        queue.push_pre(BatchStep::ActivateComponent(component));
        let graph = scene.graph();
        let range = animated_range(scene, &component.controls(graph), ctx);
        if let Some(request) = component.bake_request(graph, range) {
            queue.push_request(request);
        }
    }
    queue.push_post(BatchStep::FinalizeRemoval {
        component,
        baked: bake,
    });
}

fn run_queue(
    scene: &mut dyn SceneHost,
    ctx: &OperationContext,
    queue: BakeQueue<NodeKey, BatchStep>,
) -> Result<(BakeSummary, Vec<Component>), RigError> {
    let mut driver = RigBakeDriver::new(scene, ctx);
    if let Some(range) = queue.total_range() {
        tracing::debug!("Sampling removals over {}..{}", range.start, range.end);
    }
    let summary = queue.run(&mut driver).map_err(|err| {
        tracing::debug!("Removal failed in the {} phase", err.phase());
        err.into_inner()
    })?;
    Ok((summary, driver.activated))
}

pub(crate) fn remove_with(
    scene: &mut dyn SceneHost,
    ctx: &OperationContext,
    component: Component,
    bake: bool,
) -> Result<Option<Component>, RigError> {
    let mut queue = BakeQueue::new();
    enqueue_removal(&mut queue, scene, ctx, component, bake);
    let (_, activated) = run_queue(scene, ctx, queue)?;
    Ok(activated.into_iter().last())
}

/// Remove a component, baking or reverting the skeleton per preferences.
///
/// Returns the component that took over the joints, if any.
pub fn remove_component(
    scene: &mut dyn SceneHost,
    ctx: &OperationContext,
    component: Component,
) -> Result<Option<Component>, RigError> {
    remove_with(scene, ctx, component, ctx.preferences.bake_component)
}

/// Bake the skeleton under every component, then remove them.
///
/// Components sharing skeleton joints go in separate passes, in order, so
/// each bake samples the component that owns it.
pub fn bake_and_remove(
    scene: &mut dyn SceneHost,
    ctx: &OperationContext,
    components: &[Component],
) -> Result<BakeSummary, RigError> {
    let passes = disjoint_passes(scene.graph(), components);
    let mut summary = BakeSummary::default();
    for pass in &passes {
        let mut queue = BakeQueue::new();
        for component in pass {
            enqueue_removal(&mut queue, scene, ctx, *component, true);
        }
        let (done, _) = run_queue(scene, ctx, queue)?;
        summary += done;
    }
    tracing::info!(
        "Baked and removed {} components in {} passes ({} keys)",
        components.len(),
        passes.len(),
        summary.keys_written
    );
    Ok(summary)
}

/// Split `components` into consecutive runs whose skeleton joints don't overlap
fn disjoint_passes(graph: &Graph, components: &[Component]) -> Vec<Vec<Component>> {
    let mut passes: Vec<Vec<Component>> = Vec::new();
    let mut claimed: HashSet<NodeKey> = HashSet::new();
    for component in components {
        let joints = component.skeleton_joints(graph);
        let overlaps = joints.iter().any(|j| claimed.contains(j));
        match passes.last_mut() {
            Some(pass) if !overlaps => pass.push(*component),
            _ => {
                claimed.clear();
                passes.push(vec![*component]);
            }
        }
        claimed.extend(joints);
    }
    passes
}

fn step(force: bool, what: &str, result: Result<(), RigError>) -> Result<(), RigError> {
    match result {
        Err(err) if force => {
            tracing::warn!("Continuing past failed {what}: {err}");
            Ok(())
        }
        other => other,
    }
}

fn restore_saved_curves(
    scene: &mut dyn SceneHost,
    component: Component,
    saved: &[NodeKey],
) -> Result<(), RigError> {
    for curve in saved {
        let graph = scene.graph();
        let target = graph
            .value(*curve, attr::SAVED_TARGET)
            .and_then(|v| v.as_str())
            .and_then(NodeId::parse)
            .and_then(|id| graph.find_by_id(id));
        let channel = graph
            .value(*curve, attr::SAVED_CHANNEL)
            .and_then(|v| v.as_str())
            .and_then(Channel::from_name);
        let (Some(joint), Some(channel)) = (target, channel) else {
            tracing::warn!("Dropping saved curve {} with no target", graph.name_of(*curve));
            scene.delete_object(*curve)?;
            continue;
        };
        let owners = scene.graph().incoming(*curve);
        for owner in owners {
            scene.graph_mut().disconnect(owner, *curve);
        }
        if let Some(node) = scene.graph_mut().node_mut(*curve) {
            node.remove_attribute(attr::SAVED_TARGET);
            node.remove_attribute(attr::SAVED_CHANNEL);
        }
        scene.connect_curve(*curve, joint, channel)?;
    }
    tracing::debug!(
        "Restored {} curves from {}",
        saved.len(),
        component.core.name(scene.graph())
    );
    Ok(())
}

fn delete_objects(scene: &mut dyn SceneHost, objects: &[NodeKey]) -> Result<(), RigError> {
    for object in objects {
        if scene.graph().contains(*object) {
            scene.delete_object(*object)?;
        }
    }
    Ok(())
}

/// Delete a component's objects and metadata, then hand its joints to the
/// next component sharing them
fn finalize(
    scene: &mut dyn SceneHost,
    ctx: &OperationContext,
    component: Component,
    baked: bool,
) -> Result<Option<Component>, RigError> {
    let force = ctx.preferences.force_remove;
    let graph = scene.graph();
    let name = component.core.name(graph).to_string();
    let skeleton = component.skeleton_joints(graph);
    let controls = component.controls(graph);
    let saved = component.saved_curves(graph);
    let group = component.group(graph);
    let region = component
        .character(graph)
        .and_then(|c| find_region(graph, c, &component.side(graph), &component.region(graph)).ok());
    let constraints = component.skeleton_constraints(scene);

    if !baked && ctx.preferences.revert_animation {
        step(force, "curve restore", restore_saved_curves(scene, component, &saved))?;
    } else {
        step(force, "saved curve cleanup", delete_objects(scene, &saved))?;
    }
    step(force, "skeleton constraint removal", delete_objects(scene, &constraints))?;

    let graph = scene.graph_mut();
    for control in &controls {
        remove_properties(graph, *control, "ControlProperty");
    }
    if let Some(group) = group {
        step(force, "group removal", delete_objects(scene, &[group]))?;
    }

    let graph = scene.graph_mut();
    if let Some(region) = region.filter(|r| r.temporary) {
        remove_region(graph, &region);
    }
    component.core.delete_all(graph);

    let next = skeleton
        .iter()
        .flat_map(|joint| components_on(scene.graph(), *joint))
        .next();
    if let Some(next) = next {
        step(force, "activation", activate_component(scene, next))?;
    }
    tracing::info!("Removed component {name}");
    Ok(next)
}
