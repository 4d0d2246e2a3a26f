// SPDX-License-Identifier: MIT OR Apache-2.0
//! Addons: override a control from another space.
//!
//! The addon parks a group at the control's current pose, constrains the
//! group to the driver objects and hangs a new control beneath it. The
//! original control is then constrained to the new one, so animators key
//! the new control in the driver's space.

use super::{
    addon_on, animated_range, id_string, Addon, AddonKind, Bakeable, Component, SpaceSwitchable,
    SENTINEL_FRAME, WORLD_SPACE,
};
use crate::character::character_name;
use crate::context::OperationContext;
use crate::error::RigError;
use crate::network::{
    add_property, attr, remove_properties, AddonControls, AddonCore, OverDrivenControl,
};
use crate::scene::{ConstraintKind, SceneHost, Transform};
use rigforge_graph::{create_dependent, AttrValue, NetworkNode, NodeKey, NodeKind};
use rigforge_sequencer::BakeRequest;

/// Control type stored on addon controls
pub const ADDON_CONTROL_TYPE: &str = "addon";

fn target_type(drivers: &[NodeKey]) -> &'static str {
    match drivers.len() {
        0 => WORLD_SPACE,
        1 => "single",
        _ => "multiple",
    }
}

/// Drive `control` from `drivers` through a new addon control.
///
/// An empty driver list parks the addon in world space. With several
/// drivers every weight is keyed to 1 at [`SENTINEL_FRAME`] and only the
/// first driver is switched on at the current frame.
pub fn switch_space(
    scene: &mut dyn SceneHost,
    ctx: &OperationContext,
    control: NodeKey,
    kind: AddonKind,
    drivers: &[NodeKey],
) -> Result<Addon, RigError> {
    let graph = scene.graph();
    let control_name = graph.try_node(control)?.name.clone();
    let component = Component::owning(graph, control)
        .filter(|c| c.space_controls(graph).contains(&control))
        .ok_or_else(|| RigError::NotAControl(control_name.clone()))?;
    if addon_on(graph, control).is_some() {
        return Err(RigError::AlreadyOverdriven(control_name));
    }
    let character = component
        .character(graph)
        .ok_or_else(|| RigError::NotCharacterized(control_name.clone()))?;
    for driver in drivers {
        let valid = graph.node(*driver).is_some_and(|n| n.kind.is_transform());
        if !valid || *driver == control {
            return Err(RigError::ObjectNotFound(driver.to_string()));
        }
    }

    let namespace = character_name(graph, character);
    let short = graph.try_node(control)?.short_name().to_string();
    let target_data = if drivers.is_empty() {
        WORLD_SPACE.to_string()
    } else {
        drivers
            .iter()
            .map(|d| id_string(graph, *d))
            .collect::<Vec<_>>()
            .join(",")
    };

    let ns = Some(namespace.as_str());
    let graph = scene.graph_mut();
    let core = create_dependent(
        graph,
        AddonCore::TYPE_NAME,
        Some(character.key()),
        ns,
        &[
            (attr::COMPONENT_TYPE, AttrValue::from(kind.name())),
            (attr::TARGET_TYPE, AttrValue::from(target_type(drivers))),
            (attr::TARGET_DATA, AttrValue::from(target_data)),
        ],
    )?;
    let addon_controls = create_dependent(graph, AddonControls::TYPE_NAME, Some(core.key), ns, &[])?;
    let overdriven = create_dependent(graph, OverDrivenControl::TYPE_NAME, Some(core.key), ns, &[])?;
    overdriven.connect_node(graph, control, None)?;

    let prefix = format!("{namespace}:{short}_{}", kind.name());
    let pose = scene.world_matrix(control, ctx.current_frame)?;
    let group = scene.create_object(&format!("{prefix}_grp"), NodeKind::Group, None)?;
    scene.set_local_transform(group, Transform::from_affine(&pose))?;
    let group_id = id_string(scene.graph(), group);
    core.set(scene.graph_mut(), attr::GROUP_ID, group_id)?;

    let new_control = scene.create_object(&format!("{prefix}_ctrl"), NodeKind::Transform, Some(group))?;
    let graph = scene.graph_mut();
    add_property(
        graph,
        new_control,
        "ControlProperty",
        &[
            (attr::CONTROL_TYPE, AttrValue::from(ADDON_CONTROL_TYPE)),
            (attr::ORDERED_INDEX, AttrValue::Int(0)),
        ],
    )?;
    addon_controls.connect_node(graph, new_control, None)?;

    if !drivers.is_empty() {
        let constraint = scene.constrain(ConstraintKind::Parent, drivers, group, true)?;
        if drivers.len() > 1 {
            for index in 0..drivers.len() {
                scene.key_constraint_weight(constraint, index, SENTINEL_FRAME, 1.0)?;
                let weight = if index == 0 { 1.0 } else { 0.0 };
                scene.key_constraint_weight(constraint, index, ctx.current_frame, weight)?;
            }
        }
    }

    if ctx.preferences.no_bake_overdrivers {
        let group_world = scene.world_matrix(group, ctx.current_frame)?;
        let local = Transform::from_affine(&(group_world.inverse() * pose));
        scene.set_local_transform(new_control, local)?;
    } else {
        let follow = scene.constrain(ConstraintKind::Parent, &[control], new_control, false)?;
        let range = animated_range(scene, &[control], ctx);
        let label = format!("{short} {}", kind.name());
        scene.bake(&[BakeRequest::new(label, vec![new_control], range)])?;
        scene.delete_object(follow)?;
    }

    scene.constrain(kind.constraint_kind(), &[new_control], control, false)?;
    tracing::info!(
        "Added {} addon on {control_name} with {} drivers",
        kind.name(),
        drivers.len()
    );
    Ok(Addon {
        core: AddonCore(core),
    })
}

/// Take an addon off its control, optionally baking the control first
pub fn remove_addon(
    scene: &mut dyn SceneHost,
    ctx: &OperationContext,
    addon: Addon,
    bake: bool,
) -> Result<(), RigError> {
    let graph = scene.graph();
    let name = addon.core.name(graph).to_string();
    let control = addon.overdriven_control(graph);
    let addon_controls = addon.addon_controls(graph);
    let group = addon.group(graph);

    if let Some(control) = control {
        if bake {
            let mut span = addon_controls.clone();
            span.push(control);
            let range = animated_range(scene, &span, ctx);
            if let Some(request) = addon.bake_request(scene.graph(), range) {
                scene.bake(&[request])?;
            }
        }
        let mut overriding: Vec<NodeKey> = Vec::new();
        for constraint in addon_controls.iter().flat_map(|c| scene.constraints_targeting(*c)) {
            let drives_control = scene
                .constraint_info(constraint)
                .is_some_and(|info| info.driven == control);
            if drives_control && !overriding.contains(&constraint) {
                overriding.push(constraint);
            }
        }
        for constraint in overriding {
            scene.delete_object(constraint)?;
        }
    }

    let graph = scene.graph_mut();
    for addon_control in &addon_controls {
        remove_properties(graph, *addon_control, "ControlProperty");
    }
    if let Some(group) = group.filter(|g| scene.graph().contains(*g)) {
        scene.delete_object(group)?;
    }
    addon.core.delete_all(scene.graph_mut());
    tracing::info!("Removed addon {name}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::{add_region, characterize};
    use crate::component::{build_component, BuildOptions, ComponentKind};
    use crate::scene::{matrices_match, MemoryScene};
    use crate::settings::RigPreferences;
    use glam::DVec3;

    fn offset(x: f64, y: f64) -> Transform {
        Transform::from_translation(DVec3::new(x, y, 0.0))
    }

    struct Fixture {
        scene: MemoryScene,
        ctx: OperationContext,
        control: NodeKey,
        joint: NodeKey,
        props: [NodeKey; 2],
    }

    fn fixture(prefs: RigPreferences) -> Fixture {
        let mut scene = MemoryScene::default();
        let root = scene.create_joint("root", None, Transform::IDENTITY).unwrap();
        let upper = scene.create_joint("upper", Some(root), offset(1.0, 0.0)).unwrap();
        let lower = scene.create_joint("lower", Some(upper), offset(1.0, 0.0)).unwrap();
        let character = characterize(&mut scene, root, "hero").unwrap();
        add_region(scene.graph_mut(), character, "left", "arm", upper, lower, false).unwrap();
        let prop = scene.create_object("prop", NodeKind::Transform, None).unwrap();
        scene.set_local_transform(prop, offset(0.0, 5.0)).unwrap();
        let other = scene.create_object("other", NodeKind::Transform, None).unwrap();
        scene.set_local_transform(other, offset(3.0, 0.0)).unwrap();

        let ctx = OperationContext::capture(&scene, Vec::new(), prefs);
        let component = build_component(
            &mut scene,
            &ctx,
            character,
            ComponentKind::Fk,
            "left",
            "arm",
            BuildOptions::default(),
        )
        .unwrap();
        let control = component.controls(scene.graph())[0];
        Fixture {
            scene,
            ctx,
            control,
            joint: upper,
            props: [prop, other],
        }
    }

    #[test]
    fn test_overdriver_follows_driver() {
        let mut f = fixture(RigPreferences::default());
        let before = f.scene.world_matrix(f.control, 0.0).unwrap();

        let addon = switch_space(&mut f.scene, &f.ctx, f.control, AddonKind::Overdriver, &[f.props[0]]).unwrap();

        let graph = f.scene.graph();
        assert_eq!(addon_on(graph, f.control), Some(addon));
        assert_eq!(addon.drivers(graph), vec![f.props[0]]);
        assert_eq!(addon.kind(graph), Some(AddonKind::Overdriver));
        assert_eq!(addon.addon_controls(graph).len(), 1);
        let after = f.scene.world_matrix(f.control, 0.0).unwrap();
        assert!(matrices_match(&before, &after, 1e-6));

        f.scene.set_local_transform(f.props[0], offset(0.0, 6.0)).unwrap();
        let moved = f.scene.world_matrix(f.control, 0.0).unwrap();
        assert!((moved.translation.y - before.translation.y - 1.0).abs() < 1e-6);
        let joint = f.scene.world_matrix(f.joint, 0.0).unwrap();
        assert!((joint.translation.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_targets_are_rejected_untouched() {
        let mut f = fixture(RigPreferences::default());
        let count = f.scene.graph().node_count();

        let err = switch_space(&mut f.scene, &f.ctx, f.joint, AddonKind::Overdriver, &[]).unwrap_err();
        assert!(matches!(err, RigError::NotAControl(_)));
        assert_eq!(f.scene.graph().node_count(), count);

        switch_space(&mut f.scene, &f.ctx, f.control, AddonKind::Position, &[]).unwrap();
        let count = f.scene.graph().node_count();
        let err = switch_space(&mut f.scene, &f.ctx, f.control, AddonKind::Rotation, &[]).unwrap_err();
        assert!(matches!(err, RigError::AlreadyOverdriven(_)));
        assert_eq!(f.scene.graph().node_count(), count);
    }

    #[test]
    fn test_multiple_drivers_key_reference_weights() {
        let mut f = fixture(RigPreferences::default());
        f.scene.set_current_frame(5.0);
        let ctx = OperationContext::capture(&f.scene, Vec::new(), RigPreferences::default());

        let addon = switch_space(&mut f.scene, &ctx, f.control, AddonKind::Overdriver, &f.props).unwrap();

        let group = addon.group(f.scene.graph()).unwrap();
        let constraint = f.scene.constraints_on(group)[0];
        assert_eq!(f.scene.constraint_weight(constraint, 0, SENTINEL_FRAME).unwrap(), 1.0);
        assert_eq!(f.scene.constraint_weight(constraint, 1, SENTINEL_FRAME).unwrap(), 1.0);
        assert_eq!(f.scene.constraint_weight(constraint, 0, 5.0).unwrap(), 1.0);
        assert_eq!(f.scene.constraint_weight(constraint, 1, 5.0).unwrap(), 0.0);
        assert_eq!(addon.drivers(f.scene.graph()), f.props.to_vec());
    }

    #[test]
    fn test_world_space_without_bake() {
        let prefs = RigPreferences {
            no_bake_overdrivers: true,
            ..RigPreferences::default()
        };
        let mut f = fixture(prefs);
        let before = f.scene.world_matrix(f.control, 0.0).unwrap();

        let addon = switch_space(&mut f.scene, &f.ctx, f.control, AddonKind::Rotation, &[]).unwrap();

        let graph = f.scene.graph();
        assert!(addon.drivers(graph).is_empty());
        assert_eq!(addon.core.get_string(graph, attr::TARGET_DATA), WORLD_SPACE);
        let new_control = addon.addon_controls(graph)[0];
        assert!(!f.scene.is_animated(new_control));
        let after = f.scene.world_matrix(f.control, 0.0).unwrap();
        assert!(matrices_match(&before, &after, 1e-6));
    }

    #[test]
    fn test_remove_addon_bakes_and_cleans_up() {
        let mut f = fixture(RigPreferences::default());
        let addon = switch_space(&mut f.scene, &f.ctx, f.control, AddonKind::Overdriver, &[f.props[0]]).unwrap();
        f.scene.set_local_transform(f.props[0], offset(0.0, 6.0)).unwrap();
        let driven = f.scene.world_matrix(f.control, 3.0).unwrap();
        let group = addon.group(f.scene.graph()).unwrap();

        remove_addon(&mut f.scene, &f.ctx, addon, true).unwrap();

        let graph = f.scene.graph();
        assert!(!addon.core.exists(graph));
        assert!(!graph.contains(group));
        assert!(addon_on(graph, f.control).is_none());
        assert!(f.scene.constraints_on(f.control).is_empty());
        assert!(f.scene.is_animated(f.control));
        let baked = f.scene.world_matrix(f.control, 3.0).unwrap();
        assert!(matrices_match(&driven, &baked, 1e-6));
    }

    #[test]
    fn test_remove_addon_keeps_foreign_constraints() {
        let mut f = fixture(RigPreferences::default());
        let addon = switch_space(&mut f.scene, &f.ctx, f.control, AddonKind::Overdriver, &[f.props[0]]).unwrap();
        let foreign = f
            .scene
            .constrain(ConstraintKind::Point, &[f.props[1]], f.control, true)
            .unwrap();

        remove_addon(&mut f.scene, &f.ctx, addon, false).unwrap();

        assert_eq!(f.scene.constraints_on(f.control), vec![foreign]);
        assert_eq!(f.scene.constraints_targeting(f.props[1]), vec![foreign]);
    }
}
