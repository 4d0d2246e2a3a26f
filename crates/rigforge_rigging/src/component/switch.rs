// SPDX-License-Identifier: MIT OR Apache-2.0
//! Changing the kind of component on a region.

use super::{
    activate_component, bake_and_remove, build_component, components_on, BuildOptions, Component,
    ComponentKind,
};
use crate::character::{find_region, region_chain, set_region_temporary};
use crate::context::OperationContext;
use crate::error::RigError;
use crate::scene::SceneHost;

/// Drive the component's joints with a component of `kind` instead.
///
/// A component of that kind already sharing the joints is switched on by
/// weight. Otherwise the current component is baked off and a new one is
/// built on the same region and parent space; the region markup survives
/// even when it was temporary.
pub fn switch_component(
    scene: &mut dyn SceneHost,
    ctx: &OperationContext,
    component: Component,
    kind: ComponentKind,
) -> Result<Component, RigError> {
    let graph = scene.graph();
    let name = component.core.name(graph).to_string();
    let current = component.kind(graph).ok_or_else(|| RigError::MissingComponentData {
        component: name.clone(),
        what: "component type",
    })?;
    if current == kind {
        return Ok(component);
    }

    let sharing = component
        .skeleton_joints(graph)
        .first()
        .map(|joint| components_on(graph, *joint))
        .unwrap_or_default()
        .into_iter()
        .find(|other| *other != component && other.kind(graph) == Some(kind));
    if let Some(other) = sharing {
        activate_component(scene, other)?;
        tracing::info!("Switched {name} to existing {} component", kind.name());
        return Ok(other);
    }

    let character = component
        .character(graph)
        .ok_or_else(|| RigError::NotCharacterized(name.clone()))?;
    let side = component.side(graph);
    let region = component.region(graph);
    let marked = find_region(graph, character, &side, &region)?;
    let chain = region_chain(graph, &marked)?;
    let builder = kind.builder();
    if !builder.accepts(chain.len()) {
        return Err(RigError::IncompatibleJointCount {
            kind: kind.name(),
            expected: builder.expected_joints(),
            found: chain.len(),
        });
    }
    let parent_space = component.parent_space(graph);

    if marked.temporary {
        set_region_temporary(scene.graph_mut(), &marked, false)?;
    }
    bake_and_remove(scene, ctx, &[component])?;
    let options = BuildOptions {
        allow_shared: true,
        parent_space,
        ..BuildOptions::default()
    };
    let rebuilt = build_component(scene, ctx, character, kind, &side, &region, options)?;
    if marked.temporary {
        set_region_temporary(scene.graph_mut(), &marked, true)?;
    }
    tracing::info!("Switched {name} to {}", kind.name());
    Ok(rebuilt)
}
