// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end rigging scenarios.

use crate::character::{add_region, all_characters, characterize, find_region, set_region_temporary};
use crate::commands::{BuildComponentCommand, RemoveComponentCommand, RigSession, SwitchSpaceCommand};
use crate::component::{
    bake_and_remove, build_component, character_components, remove_component, reparent_component, BuildOptions,
    Component, ComponentKind,
};
use crate::context::OperationContext;
use crate::error::RigError;
use crate::network::{attr, builtin_registry, find_property, CharacterCore, JointsCore, BUILTIN_TYPES};
use crate::scene::{matrices_match, MemoryScene, SceneHost, Transform};
use crate::settings::{RigPreferences, Settings};
use glam::DVec3;
use rigforge_graph::{create_dependent, ensure_core, find_first, Direction, Graph, NodeKey, NodeKind, META_TYPE};
use rigforge_sequencer::Channel;

type KeySnapshot = Vec<(Channel, Vec<(f64, f64)>)>;

struct Arm {
    scene: MemoryScene,
    character: CharacterCore,
    joints: Vec<NodeKey>,
}

/// `root` plus a three joint arm with keys on every arm joint
fn animated_arm() -> Arm {
    let mut scene = MemoryScene::default();
    let step = Transform::from_translation(DVec3::X);
    let root = scene.create_joint("root", None, Transform::IDENTITY).unwrap();
    let upper = scene.create_joint("upper", Some(root), step).unwrap();
    let lower = scene.create_joint("lower", Some(upper), step).unwrap();
    let hand = scene.create_joint("hand", Some(lower), step).unwrap();
    for (index, joint) in [upper, lower, hand].into_iter().enumerate() {
        scene.set_key(joint, Channel::RotateZ, 0.0, 0.0).unwrap();
        scene.set_key(joint, Channel::RotateZ, 24.0, 10.0 * (index + 1) as f64).unwrap();
    }
    scene.set_key(upper, Channel::TranslateY, 12.0, 0.5).unwrap();
    let character = characterize(&mut scene, root, "hero").unwrap();
    add_region(scene.graph_mut(), character, "left", "arm", upper, hand, false).unwrap();
    Arm {
        scene,
        character,
        joints: vec![root, upper, lower, hand],
    }
}

fn snapshot(scene: &dyn SceneHost, joint: NodeKey) -> KeySnapshot {
    let mut keys: KeySnapshot = scene
        .curves_on(joint)
        .into_iter()
        .filter_map(|(channel, curve)| {
            let curve = scene.curve(curve)?;
            Some((channel, curve.keyframes().iter().map(|k| (k.frame, k.value)).collect()))
        })
        .collect();
    keys.sort_by_key(|(channel, _)| *channel);
    keys
}

fn build_fk(arm: &mut Arm, ctx: &OperationContext) -> Component {
    build_component(
        &mut arm.scene,
        ctx,
        arm.character,
        ComponentKind::Fk,
        "left",
        "arm",
        BuildOptions::default(),
    )
    .unwrap()
}

fn overdriven_entries(graph: &Graph, control: NodeKey) -> usize {
    graph
        .incoming(control)
        .into_iter()
        .filter(|owner| {
            graph
                .value(*owner, META_TYPE)
                .and_then(|v| v.as_str())
                == Some("OverDrivenControl")
        })
        .count()
}

#[test]
fn test_fresh_character() {
    let mut scene = MemoryScene::default();
    let root = scene.create_joint("root", None, Transform::IDENTITY).unwrap();
    let spine = scene.create_joint("spine", Some(root), Transform::IDENTITY).unwrap();
    let head = scene.create_joint("head", Some(spine), Transform::IDENTITY).unwrap();

    let character = characterize(&mut scene, root, "hero").unwrap();

    let graph = scene.graph();
    assert_eq!(all_characters(graph), vec![character]);
    let joints_cores: Vec<JointsCore> = character.all_downstream(graph);
    assert_eq!(joints_cores.len(), 1);
    let owned = joints_cores[0].get_connections(graph, None);
    for joint in [root, spine, head] {
        assert!(owned.contains(&joint));
    }
    assert!(character_components(graph, character).is_empty());
}

#[test]
fn test_every_dependent_type_builds_its_chain() {
    let registry = builtin_registry();
    for info in BUILTIN_TYPES.iter().filter(|info| info.dependent_on.is_some()) {
        let mut graph = Graph::new("chain", builtin_registry());
        let node = create_dependent(&mut graph, info.name, None, None, &[]).unwrap();

        for ancestor in registry.dependency_chain(info.name).into_iter().skip(1) {
            assert!(
                find_first(&graph, node.key, ancestor, Direction::Upstream).is_some(),
                "{} cannot reach {ancestor}",
                info.name
            );
        }
        let core = ensure_core(&mut graph).unwrap();
        assert!(find_first(&graph, core.key, info.name, Direction::Downstream).is_some());
    }
}

#[test]
fn test_fk_build_then_remove_with_revert() {
    let mut arm = animated_arm();
    let before: Vec<KeySnapshot> = arm.joints[1..].iter().map(|j| snapshot(&arm.scene, *j)).collect();
    let prefs = RigPreferences {
        bake_component: false,
        revert_animation: true,
        ..RigPreferences::default()
    };
    let ctx = OperationContext::capture(&arm.scene, Vec::new(), prefs);

    let component = build_fk(&mut arm, &ctx);

    let graph = arm.scene.graph();
    let controls = component.controls(graph);
    assert_eq!(controls.len(), 3);
    let mut indices: Vec<i64> = controls
        .iter()
        .map(|c| find_property(graph, *c, "ControlProperty").unwrap().get_int(graph, attr::ORDERED_INDEX))
        .collect();
    indices.sort_unstable();
    assert_eq!(indices, vec![0, 1, 2]);

    remove_component(&mut arm.scene, &ctx, component).unwrap();

    let after: Vec<KeySnapshot> = arm.joints[1..].iter().map(|j| snapshot(&arm.scene, *j)).collect();
    assert_eq!(before, after);
    let graph = arm.scene.graph();
    assert!(arm.character.get_all_downstream(graph, "ComponentCore").is_empty());
}

#[test]
fn test_fk_build_then_remove_with_bake_keeps_control_motion() {
    let mut arm = animated_arm();
    let ctx = OperationContext::capture(&arm.scene, Vec::new(), RigPreferences::default());
    let component = build_fk(&mut arm, &ctx);
    let control = component.controls(arm.scene.graph())[1];
    arm.scene.set_key(control, Channel::RotateZ, 6.0, 90.0).unwrap();
    let hand = arm.joints[3];
    let expected: Vec<_> = (0..=24)
        .map(|f| arm.scene.world_matrix(hand, f as f64).unwrap())
        .collect();

    remove_component(&mut arm.scene, &ctx, component).unwrap();

    for (frame, expected) in expected.iter().enumerate() {
        let world = arm.scene.world_matrix(hand, frame as f64).unwrap();
        assert!(matrices_match(&world, expected, 1e-6), "frame {frame}");
    }
}

#[test]
fn test_switch_space_apply_then_reject() {
    let mut session = RigSession::new(animated_arm().scene, Settings::default());
    let build = BuildComponentCommand {
        character: "hero".into(),
        kind: "fk".into(),
        side: "left".into(),
        region: "arm".into(),
        remove_existing: false,
        allow_shared: false,
        parent_space: None,
    };
    assert!(session.run(&build).success);
    let control = session.scene.graph().find_by_name("hero:left_arm_fk0_ctrl").unwrap();
    let overdrive = SwitchSpaceCommand {
        control: Some("hero:left_arm_fk0_ctrl".into()),
        kind: "overdriver".into(),
        drivers: Vec::new(),
    };

    assert!(session.run(&overdrive).success);
    assert_eq!(overdriven_entries(session.scene.graph(), control), 1);
    let count = session.scene.graph().node_count();

    let outcome = session.run(&overdrive);
    assert!(!outcome.success);
    assert_eq!(
        outcome.message,
        RigError::AlreadyOverdriven("hero:left_arm_fk0_ctrl".into()).to_string()
    );
    assert_eq!(overdriven_entries(session.scene.graph(), control), 1);
    assert_eq!(session.scene.graph().node_count(), count);
}

#[test]
fn test_reparent_preserves_world_motion_of_every_control() {
    let mut arm = animated_arm();
    let ctx = OperationContext::capture(&arm.scene, Vec::new(), RigPreferences::default());
    let component = build_fk(&mut arm, &ctx);
    let controls = component.controls(arm.scene.graph());
    arm.scene.set_key(controls[0], Channel::RotateZ, 0.0, 5.0).unwrap();
    arm.scene.set_key(controls[0], Channel::RotateZ, 24.0, 60.0).unwrap();
    let prop = arm.scene.create_object("prop", NodeKind::Transform, None).unwrap();
    arm.scene.set_key(prop, Channel::TranslateZ, 0.0, 0.0).unwrap();
    arm.scene.set_key(prop, Channel::TranslateZ, 24.0, -30.0).unwrap();
    arm.scene.set_key(prop, Channel::RotateY, 24.0, 90.0).unwrap();
    let before: Vec<Vec<_>> = controls
        .iter()
        .map(|c| (0..=24).map(|f| arm.scene.world_matrix(*c, f as f64).unwrap()).collect())
        .collect();

    reparent_component(&mut arm.scene, &ctx, component, Some(prop), true).unwrap();

    for (control, expected) in controls.iter().zip(&before) {
        for (frame, expected) in expected.iter().enumerate() {
            let world = arm.scene.world_matrix(*control, frame as f64).unwrap();
            assert!(matrices_match(&world, expected, 1e-6), "frame {frame}");
        }
    }
}

#[test]
fn test_remove_by_command_reports_missing_targets() {
    let mut session = RigSession::new(animated_arm().scene, Settings::default());
    let outcome = session.run(&RemoveComponentCommand {
        targets: vec!["hero:nothing_here".into()],
    });
    assert!(!outcome.success);
    assert_eq!(
        outcome.message,
        RigError::ObjectNotFound("hero:nothing_here".into()).to_string()
    );
}

#[test]
fn test_rebuild_with_remove_existing_keeps_temporary_region() {
    let mut arm = animated_arm();
    let graph = arm.scene.graph_mut();
    let region = find_region(graph, arm.character, "left", "arm").unwrap();
    set_region_temporary(graph, &region, true).unwrap();
    let mut session = RigSession::new(arm.scene, Settings::default());
    let mut build = BuildComponentCommand {
        character: "hero".into(),
        kind: "fk".into(),
        side: "left".into(),
        region: "arm".into(),
        remove_existing: false,
        allow_shared: false,
        parent_space: None,
    };
    assert!(session.run(&build).success);

    build.remove_existing = true;
    let outcome = session.run(&build);
    assert!(outcome.success, "{}", outcome.message);
    let graph = session.scene.graph();
    let components = character_components(graph, arm.character);
    assert_eq!(components.len(), 1);
    assert!(find_region(graph, arm.character, "left", "arm").unwrap().temporary);

    let ctx = OperationContext::capture(&session.scene, Vec::new(), RigPreferences::default());
    remove_component(&mut session.scene, &ctx, components[0]).unwrap();
    assert!(matches!(
        find_region(session.scene.graph(), arm.character, "left", "arm"),
        Err(RigError::RegionNotFound { .. })
    ));
}

#[test]
fn test_reparent_out_of_a_space_animated_past_playback() {
    let mut arm = animated_arm();
    let ctx = OperationContext::capture(&arm.scene, Vec::new(), RigPreferences::default());
    let component = build_fk(&mut arm, &ctx);
    let controls = component.controls(arm.scene.graph());
    let cart = arm.scene.create_object("cart", NodeKind::Transform, None).unwrap();
    arm.scene.set_key(cart, Channel::TranslateX, 0.0, 0.0).unwrap();
    arm.scene.set_key(cart, Channel::TranslateX, 72.0, 36.0).unwrap();
    arm.scene.set_key(cart, Channel::RotateZ, 48.0, 30.0).unwrap();
    reparent_component(&mut arm.scene, &ctx, component, Some(cart), false).unwrap();
    let before: Vec<Vec<_>> = controls
        .iter()
        .map(|c| (0..=72).map(|f| arm.scene.world_matrix(*c, f as f64).unwrap()).collect())
        .collect();

    reparent_component(&mut arm.scene, &ctx, component, None, true).unwrap();

    assert_eq!(component.parent_space(arm.scene.graph()), None);
    for (control, expected) in controls.iter().zip(&before) {
        for (frame, expected) in expected.iter().enumerate() {
            let world = arm.scene.world_matrix(*control, frame as f64).unwrap();
            assert!(matrices_match(&world, expected, 1e-6), "frame {frame}");
        }
    }
}

#[test]
fn test_batch_removal_of_shared_components_matches_one_at_a_time() {
    let mut arm = animated_arm();
    let ctx = OperationContext::capture(&arm.scene, Vec::new(), RigPreferences::default());
    let first = build_fk(&mut arm, &ctx);
    let shared = BuildOptions {
        allow_shared: true,
        ..BuildOptions::default()
    };
    let second =
        build_component(&mut arm.scene, &ctx, arm.character, ComponentKind::Fk, "left", "arm", shared).unwrap();
    let second_control = second.controls(arm.scene.graph())[1];
    arm.scene.set_key(second_control, Channel::RotateZ, 0.0, -20.0).unwrap();
    arm.scene.set_key(second_control, Channel::RotateZ, 36.0, 70.0).unwrap();
    let order = [second, first];

    let mut one_by_one = arm.scene.clone();
    for component in order {
        remove_component(&mut one_by_one, &ctx, component).unwrap();
    }
    let summary = bake_and_remove(&mut arm.scene, &ctx, &order).unwrap();

    assert_eq!(summary.requests, 2);
    assert!(character_components(arm.scene.graph(), arm.character).is_empty());
    for joint in &arm.joints[1..] {
        assert!(arm.scene.constraints_on(*joint).is_empty());
        assert!(arm.scene.is_animated(*joint));
        for frame in 0..=36 {
            let batched = arm.scene.world_matrix(*joint, frame as f64).unwrap();
            let expected = one_by_one.world_matrix(*joint, frame as f64).unwrap();
            assert!(matrices_match(&batched, &expected, 1e-6), "frame {frame}");
        }
    }
}
