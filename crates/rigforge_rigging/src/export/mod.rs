// SPDX-License-Identifier: MIT OR Apache-2.0
//! Animation export.
//!
//! A character's `ExportCore` owns its animation assets. Each asset owns
//! the definitions (named frame ranges) it is exported over and the stage
//! properties that prepare the scene around the export.

pub mod exporter;
pub mod stage;

pub use exporter::{ExportRecord, ExportRequest, FileExporter, RecordingExporter};
pub use stage::{add_stage_property, stage_properties, ExportRun, StageBehaviour};

use crate::character::{character_joints, character_name, find_character, root_joint};
use crate::context::OperationContext;
use crate::error::RigError;
use crate::network::{
    attr, find_property, CharacterAnimationAsset, CharacterCore, ExportCore, ExportDefinition,
};
use crate::scene::{ConstraintKind, SceneHost};
use rigforge_graph::{
    create_dependent, create_node, link, search, AttrValue, Direction, Graph, GraphError,
    NetworkNode, NodeKey,
};
use rigforge_sequencer::{BakeRequest, FrameRange};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Export error
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Nothing left to export
    #[error("No exportable joints on {0}")]
    NoJoints(String),

    /// The file exporter failed
    #[error("Failed to export {path}: {reason}")]
    Exporter {
        /// Destination file
        path: String,
        /// Exporter message
        reason: String,
    },

    /// Definition does not belong to the asset
    #[error("Definition {0} is not part of the asset")]
    MissingDefinition(String),
}

/// When a stage property runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExportStage {
    /// Before the skeleton is duplicated
    Pre,
    /// On the baked duplicates, before the file is written
    During,
    /// After the file is written
    Post,
}

impl ExportStage {
    /// Name stored on stage properties
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pre => "Pre",
            Self::During => "During",
            Self::Post => "Post",
        }
    }

    /// Parse a stored stage name, ignoring case
    pub fn from_name(name: &str) -> Option<Self> {
        [Self::Pre, Self::During, Self::Post]
            .into_iter()
            .find(|s| s.name().eq_ignore_ascii_case(name))
    }
}

/// Outcome of one asset/definition export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportReport {
    /// Asset name
    pub asset: String,
    /// Definition name
    pub definition: String,
    /// File written
    pub path: PathBuf,
    /// Joints written
    pub joints: usize,
    /// Frames written
    pub range: FrameRange,
    /// Keys baked onto the duplicates
    pub keys_baked: usize,
}

/// Export core of a character, created on first use
fn export_core(graph: &mut Graph, character: CharacterCore) -> Result<ExportCore, GraphError> {
    if let Some(core) = character.downstream::<ExportCore>(graph) {
        return Ok(core);
    }
    let name = character_name(graph, character);
    let core = create_dependent(graph, ExportCore::TYPE_NAME, Some(character.key()), Some(name.as_str()), &[])?;
    Ok(ExportCore(core))
}

/// Add an animation asset written under `export_path`
pub fn add_animation_asset(
    graph: &mut Graph,
    character: CharacterCore,
    asset_name: &str,
    export_path: &str,
) -> Result<CharacterAnimationAsset, GraphError> {
    let core = export_core(graph, character)?;
    let namespace = character_name(graph, character);
    let meta = create_node(
        graph,
        CharacterAnimationAsset::TYPE_NAME,
        &format!("{namespace}:{asset_name}_asset"),
        &[
            (attr::ASSET_NAME, AttrValue::from(asset_name)),
            (attr::EXPORT_PATH, AttrValue::from(export_path)),
        ],
    )?;
    link(graph, core.key(), meta.key, None)?;
    tracing::debug!("Added asset {asset_name}");
    Ok(CharacterAnimationAsset(meta))
}

/// Add a definition to an asset. `None` follows the scene's playback range.
pub fn add_definition(
    graph: &mut Graph,
    asset: CharacterAnimationAsset,
    name: &str,
    range: Option<FrameRange>,
) -> Result<ExportDefinition, RigError> {
    let character = find_character(graph, asset.key())
        .ok_or_else(|| RigError::NotCharacterized(asset.name(graph).to_string()))?;
    let core = export_core(graph, character)?;
    let namespace = character_name(graph, character);
    let use_scene_range = range.is_none();
    let range = range.unwrap_or_default();
    let meta = create_dependent(
        graph,
        ExportDefinition::TYPE_NAME,
        Some(core.key()),
        Some(namespace.as_str()),
        &[
            (attr::DEFINITION_NAME, AttrValue::from(name)),
            (attr::START_FRAME, AttrValue::Int(range.start.round() as i64)),
            (attr::END_FRAME, AttrValue::Int(range.end.round() as i64)),
            (attr::USE_SCENE_RANGE, AttrValue::from(use_scene_range)),
        ],
    )?;
    link(graph, asset.key(), meta.key, None)?;
    Ok(ExportDefinition(meta))
}

/// Assets of a character, in creation order
pub fn assets(graph: &Graph, character: CharacterCore) -> Vec<CharacterAnimationAsset> {
    character
        .downstream::<ExportCore>(graph)
        .map(|core| core.all_downstream::<CharacterAnimationAsset>(graph))
        .unwrap_or_default()
}

/// Definitions an asset is exported over, in creation order
pub fn definitions(graph: &Graph, asset: CharacterAnimationAsset) -> Vec<ExportDefinition> {
    search::neighbors(graph, asset.key(), Direction::Downstream)
        .into_iter()
        .filter_map(|key| ExportDefinition::from_key(graph, key))
        .collect()
}

/// Frames a definition covers
pub fn definition_range(graph: &Graph, definition: ExportDefinition, scene_range: FrameRange) -> FrameRange {
    if definition.get_bool(graph, attr::USE_SCENE_RANGE) {
        scene_range
    } else {
        FrameRange::new(
            definition.get_int(graph, attr::START_FRAME) as f64,
            definition.get_int(graph, attr::END_FRAME) as f64,
        )
    }
}

/// Whether a joint is written. Joints default to exported.
pub fn is_exported(graph: &Graph, joint: NodeKey) -> bool {
    find_property(graph, joint, "ExportProperty")
        .and_then(|p| p.value(graph, attr::EXPORT))
        .and_then(|v| v.as_bool())
        .unwrap_or(true)
}

fn unique_namespace(graph: &Graph, base: &str) -> String {
    let taken = |ns: &str| graph.nodes().any(|n| n.namespace() == Some(ns));
    if !taken(base) {
        return base.to_string();
    }
    (1..)
        .map(|i| format!("{base}{i}"))
        .find(|ns| !taken(ns))
        .unwrap_or_else(|| base.to_string())
}

/// Export one asset over one definition.
///
/// Pre stages run on the live scene. The exportable joints are then
/// duplicated into a temporary namespace and baked over the definition
/// range, During stages edit the duplicates, the exporter writes them and
/// Post stages run. The playback range is restored and the namespace
/// deleted whether or not the export succeeds.
pub fn act(
    scene: &mut dyn SceneHost,
    ctx: &OperationContext,
    asset: CharacterAnimationAsset,
    definition: ExportDefinition,
    exporter: &mut dyn FileExporter,
) -> Result<ExportReport, RigError> {
    let graph = scene.graph();
    let asset_label = asset.name(graph).to_string();
    if !definitions(graph, asset).contains(&definition) {
        return Err(ExportError::MissingDefinition(definition.name(graph).to_string()).into());
    }
    let character = find_character(graph, asset.key())
        .ok_or_else(|| RigError::NotCharacterized(asset_label.clone()))?;
    let name = character_name(graph, character);
    let joints: Vec<NodeKey> = character_joints(graph, character)
        .into_iter()
        .filter(|j| is_exported(graph, *j))
        .collect();
    if joints.is_empty() {
        return Err(ExportError::NoJoints(name).into());
    }

    let asset_name = asset.get_string(graph, attr::ASSET_NAME);
    let definition_name = definition.get_string(graph, attr::DEFINITION_NAME);
    let path = PathBuf::from(asset.get_string(graph, attr::EXPORT_PATH))
        .join(format!("{asset_name}_{definition_name}.fbx"));
    let range = definition_range(graph, definition, ctx.frame_range);
    let root = root_joint(graph, character);
    let namespace = unique_namespace(graph, &format!("{name}_export"));

    stage::run_stage(scene, character, asset, ExportStage::Pre, None)?;

    let original_range = scene.playback_range();
    let mut run = ExportRun {
        namespace,
        nodes: Vec::new(),
        root: None,
        range,
    };
    let result = export_duplicates(scene, character, asset, &joints, root, &mut run, path, exporter);
    scene.set_playback_range(original_range);
    let removed = scene.delete_namespace(&run.namespace);
    tracing::debug!("Cleaned up {removed} export objects");

    let (path, keys_baked) = result?;
    stage::run_stage(scene, character, asset, ExportStage::Post, None)?;
    tracing::info!("Exported {asset_name} {definition_name} to {}", path.display());
    Ok(ExportReport {
        asset: asset_name,
        definition: definition_name,
        path,
        joints: run.nodes.len(),
        range: run.range,
        keys_baked,
    })
}

#[allow(clippy::too_many_arguments)]
fn export_duplicates(
    scene: &mut dyn SceneHost,
    character: CharacterCore,
    asset: CharacterAnimationAsset,
    joints: &[NodeKey],
    root: Option<NodeKey>,
    run: &mut ExportRun,
    path: PathBuf,
    exporter: &mut dyn FileExporter,
) -> Result<(PathBuf, usize), RigError> {
    let mut copies: HashMap<NodeKey, NodeKey> = HashMap::with_capacity(joints.len());
    let mut holds = Vec::with_capacity(joints.len());
    for joint in joints {
        let graph = scene.graph();
        let short = graph.try_node(*joint)?.short_name().to_string();
        let parent = graph.parent(*joint).and_then(|p| copies.get(&p).copied());
        let copy = scene.duplicate(*joint, &format!("{}:{short}", run.namespace), parent)?;
        copies.insert(*joint, copy);
        run.nodes.push(copy);
        holds.push(scene.constrain(ConstraintKind::Parent, &[*joint], copy, false)?);
    }
    run.root = root.and_then(|r| copies.get(&r).copied());

    scene.set_playback_range(run.range);
    let keys = scene.bake(&[BakeRequest::new("export", run.nodes.clone(), run.range)])?;
    for hold in holds {
        scene.delete_object(hold)?;
    }

    stage::run_stage(scene, character, asset, ExportStage::During, Some(&mut *run))?;

    let request = ExportRequest {
        path: path.clone(),
        nodes: run.nodes.clone(),
        range: run.range,
    };
    exporter.export_file(scene, &request)?;
    Ok((path, keys))
}

/// Export every asset of a character over each of its definitions
pub fn export_all(
    scene: &mut dyn SceneHost,
    ctx: &OperationContext,
    character: CharacterCore,
    exporter: &mut dyn FileExporter,
) -> Result<Vec<ExportReport>, RigError> {
    let mut reports = Vec::new();
    for asset in assets(scene.graph(), character) {
        for definition in definitions(scene.graph(), asset) {
            reports.push(act(scene, ctx, asset, definition, exporter)?);
        }
    }
    tracing::info!("Exported {} clips", reports.len());
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::characterize;
    use crate::network::add_property;
    use crate::scene::{MemoryScene, Transform};
    use crate::settings::RigPreferences;
    use glam::DVec3;
    use rigforge_sequencer::Channel;

    struct Fixture {
        scene: MemoryScene,
        ctx: OperationContext,
        character: CharacterCore,
        joints: Vec<NodeKey>,
        asset: CharacterAnimationAsset,
    }

    fn fixture() -> Fixture {
        let mut scene = MemoryScene::default();
        let step = Transform::from_translation(DVec3::X);
        let root = scene.create_joint("root", None, Transform::IDENTITY).unwrap();
        let spine = scene.create_joint("spine", Some(root), step).unwrap();
        let twist = scene.create_joint("twist", Some(spine), step).unwrap();
        scene.set_key(root, Channel::TranslateX, 10.0, 0.0).unwrap();
        scene.set_key(root, Channel::TranslateX, 20.0, 5.0).unwrap();
        let character = characterize(&mut scene, root, "hero").unwrap();
        let asset = add_animation_asset(scene.graph_mut(), character, "walk", "anims").unwrap();
        let ctx = OperationContext::capture(&scene, Vec::new(), RigPreferences::default());
        Fixture {
            scene,
            ctx,
            character,
            joints: vec![root, spine, twist],
            asset,
        }
    }

    #[test]
    fn test_act_exports_and_cleans_up() {
        let mut f = fixture();
        let definition =
            add_definition(f.scene.graph_mut(), f.asset, "loop", Some(FrameRange::new(10.0, 20.0))).unwrap();
        let node_count = f.scene.graph().node_count();
        let mut exporter = RecordingExporter::new();

        let report = act(&mut f.scene, &f.ctx, f.asset, definition, &mut exporter).unwrap();

        assert_eq!(report.path, PathBuf::from("anims").join("walk_loop.fbx"));
        assert_eq!(report.joints, 3);
        assert_eq!(report.range, FrameRange::new(10.0, 20.0));
        let record = &exporter.records[0];
        assert_eq!(record.nodes, vec!["root", "spine", "twist"]);
        assert!(record.keys > 0);
        assert_eq!(f.scene.graph().node_count(), node_count);
        assert_eq!(f.scene.playback_range(), f.ctx.frame_range);
    }

    #[test]
    fn test_disabled_joints_are_skipped() {
        let mut f = fixture();
        let definition = add_definition(f.scene.graph_mut(), f.asset, "idle", None).unwrap();
        add_property(
            f.scene.graph_mut(),
            f.joints[2],
            "ExportProperty",
            &[(attr::EXPORT, AttrValue::Bool(false))],
        )
        .unwrap();
        let mut exporter = RecordingExporter::new();

        act(&mut f.scene, &f.ctx, f.asset, definition, &mut exporter).unwrap();

        assert_eq!(exporter.records[0].nodes, vec!["root", "spine"]);
    }

    #[test]
    fn test_stages_shape_the_export() {
        let mut f = fixture();
        let definition =
            add_definition(f.scene.graph_mut(), f.asset, "run", Some(FrameRange::new(10.0, 20.0))).unwrap();
        let graph = f.scene.graph_mut();
        add_stage_property(graph, f.asset, StageBehaviour::StartAtZero, ExportStage::During, 0).unwrap();
        add_stage_property(graph, f.asset, StageBehaviour::RemoveRootAnimation, ExportStage::During, 1).unwrap();
        let mut exporter = RecordingExporter::new();

        let report = act(&mut f.scene, &f.ctx, f.asset, definition, &mut exporter).unwrap();

        assert_eq!(report.range, FrameRange::new(0.0, 10.0));
        assert_eq!(exporter.records[0].range, FrameRange::new(0.0, 10.0));
        let root = f.scene.world_matrix(f.joints[0], 20.0).unwrap();
        assert!((root.translation.x - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_failed_export_still_cleans_up() {
        struct Failing;
        impl FileExporter for Failing {
            fn export_file(&mut self, _: &dyn SceneHost, request: &ExportRequest) -> Result<(), ExportError> {
                Err(ExportError::Exporter {
                    path: request.path.display().to_string(),
                    reason: "disk full".into(),
                })
            }
        }

        let mut f = fixture();
        let definition = add_definition(f.scene.graph_mut(), f.asset, "loop", None).unwrap();
        let node_count = f.scene.graph().node_count();

        let err = act(&mut f.scene, &f.ctx, f.asset, definition, &mut Failing).unwrap_err();

        assert!(matches!(err, RigError::Export(ExportError::Exporter { .. })));
        assert_eq!(f.scene.graph().node_count(), node_count);
        assert_eq!(f.scene.playback_range(), f.ctx.frame_range);
    }

    #[test]
    fn test_export_all_covers_every_definition() {
        let mut f = fixture();
        let graph = f.scene.graph_mut();
        add_definition(graph, f.asset, "a", None).unwrap();
        add_definition(graph, f.asset, "b", None).unwrap();
        let other = add_animation_asset(graph, f.character, "jump", "anims").unwrap();
        add_definition(graph, other, "c", None).unwrap();
        assert_eq!(assets(graph, f.character), vec![f.asset, other]);
        let mut exporter = RecordingExporter::new();

        let reports = export_all(&mut f.scene, &f.ctx, f.character, &mut exporter).unwrap();

        let clips: Vec<_> = reports.iter().map(|r| (r.asset.as_str(), r.definition.as_str())).collect();
        assert_eq!(clips, vec![("walk", "a"), ("walk", "b"), ("jump", "c")]);
    }
}
