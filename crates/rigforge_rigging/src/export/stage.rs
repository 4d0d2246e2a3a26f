// SPDX-License-Identifier: MIT OR Apache-2.0
//! Export stage properties.
//!
//! Stage properties hang off an asset and run before, during or after its
//! export, highest priority first.

use super::ExportStage;
use crate::character::zero_character;
use crate::error::RigError;
use crate::network::{add_property, attr, find_properties, CharacterAnimationAsset, CharacterCore};
use crate::scene::SceneHost;
use rigforge_graph::{AttrValue, Graph, GraphError, MetaNode, NetworkNode, NodeKey};
use rigforge_sequencer::{Channel, FrameRange};

/// What a stage property does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageBehaviour {
    /// Reset unrigged joints to their bind pose
    ZeroCharacter,
    /// Pin the root's horizontal translation to its first exported value
    RemoveRootAnimation,
    /// Move the exported keys so the range starts at frame 0
    StartAtZero,
}

impl StageBehaviour {
    /// All behaviours
    pub const ALL: [Self; 3] = [Self::ZeroCharacter, Self::RemoveRootAnimation, Self::StartAtZero];

    /// Node type carrying the behaviour
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::ZeroCharacter => "ZeroCharacterProperty",
            Self::RemoveRootAnimation => "RemoveRootAnimationProperty",
            Self::StartAtZero => "StartAtZeroProperty",
        }
    }

    /// Behaviour of a node type
    pub fn from_type_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.type_name() == name)
    }
}

/// Duplicated skeleton being exported
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRun {
    /// Temporary namespace holding the duplicates
    pub namespace: String,
    /// Duplicated joints, root first
    pub nodes: Vec<NodeKey>,
    /// Duplicate of the character's root joint
    pub root: Option<NodeKey>,
    /// Frames to write
    pub range: FrameRange,
}

/// Attach a stage property to an asset
pub fn add_stage_property(
    graph: &mut Graph,
    asset: CharacterAnimationAsset,
    behaviour: StageBehaviour,
    stage: ExportStage,
    priority: i64,
) -> Result<MetaNode, GraphError> {
    add_property(
        graph,
        asset.key(),
        behaviour.type_name(),
        &[
            (attr::EXPORT_STAGE, AttrValue::from(stage.name())),
            (attr::PRIORITY, AttrValue::Int(priority)),
        ],
    )
}

/// Stage properties of an asset for one stage, highest priority first.
///
/// Equal priorities keep the order the properties were added in.
pub fn stage_properties(
    graph: &Graph,
    asset: CharacterAnimationAsset,
    stage: ExportStage,
) -> Vec<(StageBehaviour, MetaNode)> {
    let mut found: Vec<(StageBehaviour, MetaNode)> = find_properties(graph, asset.key(), "ExportStageProperty")
        .into_iter()
        .filter(|p| ExportStage::from_name(&p.get_string(graph, attr::EXPORT_STAGE)) == Some(stage))
        .filter_map(|p| StageBehaviour::from_type_name(p.type_name).map(|b| (b, p)))
        .collect();
    found.sort_by_key(|(_, p)| std::cmp::Reverse(p.get_int(graph, attr::PRIORITY)));
    found
}

fn remove_root_animation(scene: &mut dyn SceneHost, run: &ExportRun) -> usize {
    let Some(root) = run.root else {
        return 0;
    };
    let mut flattened = 0;
    for (channel, curve) in scene.curves_on(root) {
        if channel != Channel::TranslateX && channel != Channel::TranslateZ {
            continue;
        }
        if let Some(curve) = scene.curve_mut(curve) {
            if let Some(value) = curve.evaluate(run.range.start) {
                curve.flatten(value);
                flattened += 1;
            }
        }
    }
    flattened
}

fn start_at_zero(scene: &mut dyn SceneHost, run: &mut ExportRun) {
    let offset = -run.range.start;
    for node in &run.nodes {
        for (_, curve) in scene.curves_on(*node) {
            if let Some(curve) = scene.curve_mut(curve) {
                curve.shift(offset);
            }
        }
    }
    run.range = run.range.shifted(offset);
}

/// Run every stage property of `asset` registered for `stage`.
///
/// Behaviours that work on the duplicated skeleton are skipped when no
/// export is in flight. Returns how many properties ran.
pub(crate) fn run_stage(
    scene: &mut dyn SceneHost,
    character: CharacterCore,
    asset: CharacterAnimationAsset,
    stage: ExportStage,
    mut run: Option<&mut ExportRun>,
) -> Result<usize, RigError> {
    let properties = stage_properties(scene.graph(), asset, stage);
    let mut ran = 0;
    for (behaviour, property) in properties {
        match (behaviour, run.as_deref_mut()) {
            (StageBehaviour::ZeroCharacter, _) => {
                zero_character(scene, character, true)?;
            }
            (StageBehaviour::RemoveRootAnimation, Some(run)) => {
                remove_root_animation(scene, run);
            }
            (StageBehaviour::StartAtZero, Some(run)) => start_at_zero(scene, run),
            (_, None) => {
                tracing::debug!(
                    "Skipping {} outside an export",
                    property.name(scene.graph())
                );
                continue;
            }
        }
        ran += 1;
    }
    tracing::debug!("Ran {ran} {} stage properties", stage.name());
    Ok(ran)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::MemoryScene;
    use rigforge_graph::create_node;
    use rigforge_graph::NodeKind;

    fn asset(graph: &mut Graph) -> CharacterAnimationAsset {
        let meta = create_node(graph, "CharacterAnimationAsset", "walk", &[]).unwrap();
        CharacterAnimationAsset(meta)
    }

    #[test]
    fn test_stage_properties_sort_by_priority_then_order() {
        let mut scene = MemoryScene::default();
        let graph = scene.graph_mut();
        let asset = asset(graph);
        let low = add_stage_property(graph, asset, StageBehaviour::ZeroCharacter, ExportStage::Pre, 1).unwrap();
        let first = add_stage_property(graph, asset, StageBehaviour::StartAtZero, ExportStage::Pre, 5).unwrap();
        let second = add_stage_property(graph, asset, StageBehaviour::RemoveRootAnimation, ExportStage::Pre, 5).unwrap();
        add_stage_property(graph, asset, StageBehaviour::StartAtZero, ExportStage::Post, 9).unwrap();

        let order: Vec<MetaNode> = stage_properties(graph, asset, ExportStage::Pre)
            .into_iter()
            .map(|(_, p)| p)
            .collect();
        assert_eq!(order, vec![first, second, low]);
        assert_eq!(stage_properties(graph, asset, ExportStage::During).len(), 0);
    }

    #[test]
    fn test_during_behaviours_edit_the_duplicates() {
        let mut scene = MemoryScene::default();
        let root = scene.create_object("ns:root", NodeKind::Joint, None).unwrap();
        scene.set_key(root, Channel::TranslateX, 10.0, 2.0).unwrap();
        scene.set_key(root, Channel::TranslateX, 20.0, 8.0).unwrap();
        let lift = scene.set_key(root, Channel::TranslateY, 20.0, 1.0).unwrap();
        let graph = scene.graph_mut();
        let asset = asset(graph);
        let character = CharacterCore(create_node(graph, "CharacterCore", "hero", &[]).unwrap());
        add_stage_property(graph, asset, StageBehaviour::RemoveRootAnimation, ExportStage::During, 2).unwrap();
        add_stage_property(graph, asset, StageBehaviour::StartAtZero, ExportStage::During, 1).unwrap();

        let mut run = ExportRun {
            namespace: "ns".into(),
            nodes: vec![root],
            root: Some(root),
            range: FrameRange::new(10.0, 20.0),
        };
        let ran = run_stage(&mut scene, character, asset, ExportStage::During, Some(&mut run)).unwrap();

        assert_eq!(ran, 2);
        assert_eq!(run.range, FrameRange::new(0.0, 10.0));
        let (_, tx) = scene.curves_on(root)[0];
        let tx = scene.curve(tx).unwrap();
        assert_eq!(tx.evaluate(0.0), Some(2.0));
        assert_eq!(tx.evaluate(10.0), Some(2.0));
        assert_eq!(scene.curve(lift).unwrap().keyframes()[0].frame, 10.0);
    }

    #[test]
    fn test_export_only_behaviours_skip_without_a_run() {
        let mut scene = MemoryScene::default();
        let graph = scene.graph_mut();
        let asset = asset(graph);
        let character = CharacterCore(create_node(graph, "CharacterCore", "hero", &[]).unwrap());
        add_stage_property(graph, asset, StageBehaviour::StartAtZero, ExportStage::Pre, 0).unwrap();
        add_stage_property(graph, asset, StageBehaviour::ZeroCharacter, ExportStage::Pre, 0).unwrap();

        let ran = run_stage(&mut scene, character, asset, ExportStage::Pre, None).unwrap();
        assert_eq!(ran, 1);
    }
}
