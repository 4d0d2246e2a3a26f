// SPDX-License-Identifier: MIT OR Apache-2.0
//! rigforge - rig a sample arm, animate it and export it.
//!
//! Usage: `rigforge [settings.ron]`
//!
//! Runs the full component lifecycle against an in-memory scene and prints
//! each command outcome as JSON.

use glam::DVec3;
use rigforge_rigging::commands::{
    resolve_character, AddRegionCommand, BuildComponentCommand, CharacterizeCommand, ExportCommand,
    RemoveComponentCommand, SwitchSpaceCommand,
};
use rigforge_rigging::export::{add_animation_asset, add_definition, assets};
use rigforge_rigging::scene::Transform;
use rigforge_rigging::settings::{RonSettingsStore, Settings, SettingsStore};
use rigforge_rigging::{MemoryScene, RigCommand, RigError, RigSession, SceneHost};
use rigforge_sequencer::{Channel, FrameRange};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() {
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "rigforge_rigging=debug".parse() {
        env_filter = env_filter.add_directive(directive);
    }
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(err) = run(std::env::args().nth(1)) {
        tracing::error!("rigforge failed: {err}");
        std::process::exit(1);
    }
}

fn load_settings(path: Option<String>) -> Result<Settings, RigError> {
    match path {
        Some(path) => Ok(RonSettingsStore::new(path).load()?),
        None => Ok(Settings::default()),
    }
}

fn sample_scene() -> Result<MemoryScene, RigError> {
    let mut scene = MemoryScene::default();
    let step = Transform::from_translation(DVec3::X * 10.0);
    let root = scene.create_joint("root", None, Transform::IDENTITY)?;
    let spine = scene.create_joint("spine", Some(root), Transform::from_translation(DVec3::Y * 100.0))?;
    let upper = scene.create_joint("upper_arm", Some(spine), step)?;
    let lower = scene.create_joint("lower_arm", Some(upper), step)?;
    scene.create_joint("hand", Some(lower), step)?;

    scene.set_key(root, Channel::TranslateX, 0.0, 0.0)?;
    scene.set_key(root, Channel::TranslateX, 24.0, 50.0)?;
    scene.set_key(upper, Channel::RotateZ, 0.0, 0.0)?;
    scene.set_key(upper, Channel::RotateZ, 24.0, 45.0)?;
    scene.set_playback_range(FrameRange::new(0.0, 24.0));
    Ok(scene)
}

fn report(session: &mut RigSession<MemoryScene>, command: &dyn RigCommand) -> bool {
    let outcome = session.run(command);
    match outcome.to_json() {
        Ok(json) => println!("{json}"),
        Err(err) => tracing::warn!("Could not serialize outcome: {err}"),
    }
    outcome.success
}

fn run(settings_path: Option<String>) -> Result<(), RigError> {
    let settings = load_settings(settings_path)?;
    let mut session = RigSession::new(sample_scene()?, settings);

    let steps: Vec<Box<dyn RigCommand>> = vec![
        Box::new(CharacterizeCommand {
            root: "root".into(),
            name: "hero".into(),
        }),
        Box::new(AddRegionCommand {
            character: "hero".into(),
            side: "left".into(),
            region: "arm".into(),
            root: "upper_arm".into(),
            end: "hand".into(),
            temporary: true,
        }),
        Box::new(BuildComponentCommand {
            character: "hero".into(),
            kind: "fk".into(),
            side: "left".into(),
            region: "arm".into(),
            remove_existing: false,
            allow_shared: false,
            parent_space: None,
        }),
        Box::new(SwitchSpaceCommand {
            control: Some("hero:left_arm_fk0_ctrl".into()),
            kind: "overdriver".into(),
            drivers: vec!["root".into()],
        }),
    ];
    for step in &steps {
        if !report(&mut session, step.as_ref()) {
            return Ok(());
        }
    }

    let scene_graph = session.scene.graph_mut();
    let character = resolve_character(scene_graph, "hero")?;
    add_animation_asset(scene_graph, character, "wave", "exports")?;
    if let Some(asset) = assets(scene_graph, character).first().copied() {
        add_definition(scene_graph, asset, "full", None)?;
        add_definition(scene_graph, asset, "tail", Some(FrameRange::new(12.0, 24.0)))?;
    }
    report(
        &mut session,
        &ExportCommand {
            character: "hero".into(),
        },
    );
    for record in &session.exporter.records {
        match serde_json::to_string(record) {
            Ok(json) => println!("{json}"),
            Err(err) => tracing::warn!("Could not serialize export record: {err}"),
        }
    }

    report(
        &mut session,
        &RemoveComponentCommand {
            targets: vec!["hero:left_arm_fk0_ctrl".into()],
        },
    );
    tracing::info!("{} objects left in the scene", session.scene.graph().node_count());
    Ok(())
}
