// SPDX-License-Identifier: MIT OR Apache-2.0
//! Moving a component's group to a new parent space.

use super::{animated_range, id_string, Component};
use crate::context::OperationContext;
use crate::error::RigError;
use crate::network::attr;
use crate::scene::{ConstraintKind, SceneHost};
use rigforge_graph::{NodeKey, NodeKind};
use rigforge_sequencer::BakeRequest;

/// Follow `parent` instead of the current space, `None` meaning world.
///
/// With `preserve_animation` the top-level controls are baked to locators
/// first and baked back afterwards, so their world motion survives.
pub fn reparent_component(
    scene: &mut dyn SceneHost,
    ctx: &OperationContext,
    component: Component,
    parent: Option<NodeKey>,
    preserve_animation: bool,
) -> Result<(), RigError> {
    let graph = scene.graph();
    let name = component.core.name(graph).to_string();
    let group = component.group(graph).ok_or_else(|| RigError::MissingComponentData {
        component: name.clone(),
        what: "group",
    })?;
    if let Some(parent) = parent {
        let valid = graph.node(parent).is_some_and(|n| n.kind.is_transform());
        if !valid || parent == group || graph.descendants(group).contains(&parent) {
            return Err(RigError::ObjectNotFound(parent.to_string()));
        }
    }

    let controls = component.controls(graph);
    let top: Vec<NodeKey> = controls
        .iter()
        .copied()
        .filter(|c| graph.parent(*c) == Some(group))
        .collect();
    // Old and new spaces can carry motion past the controls' own keys
    let mut span = controls.clone();
    span.extend(component.parent_space(graph));
    span.extend(parent);
    let range = animated_range(scene, &span, ctx);

    let mut locators = Vec::new();
    if preserve_animation {
        let mut holds = Vec::with_capacity(top.len());
        for control in &top {
            let short = scene.graph().try_node(*control)?.short_name().to_string();
            let locator = scene.create_object(&format!("{short}_reparent_loc"), NodeKind::Locator, None)?;
            holds.push(scene.constrain(ConstraintKind::Parent, &[*control], locator, false)?);
            locators.push(locator);
        }
        scene.bake(&[BakeRequest::new("reparent hold", locators.clone(), range)])?;
        for hold in holds {
            scene.delete_object(hold)?;
        }
    }

    for constraint in scene.constraints_on(group) {
        scene.delete_object(constraint)?;
    }
    let space_id = match parent {
        Some(parent) => {
            scene.constrain(ConstraintKind::Parent, &[parent], group, true)?;
            id_string(scene.graph(), parent)
        }
        None => String::new(),
    };
    component
        .core
        .set(scene.graph_mut(), attr::PARENT_SPACE, space_id)?;

    if preserve_animation {
        let mut holds = Vec::with_capacity(top.len());
        for (control, locator) in top.iter().zip(&locators) {
            holds.push(scene.constrain(ConstraintKind::Parent, &[*locator], *control, false)?);
        }
        scene.bake(&[BakeRequest::new("reparent restore", top.clone(), range)])?;
        for hold in holds {
            scene.delete_object(hold)?;
        }
        for locator in locators {
            scene.delete_object(locator)?;
        }
    }

    tracing::info!(
        "Re-parented {name} to {}",
        parent.map_or("world".to_string(), |p| scene.graph().name_of(p).to_string())
    );
    Ok(())
}
