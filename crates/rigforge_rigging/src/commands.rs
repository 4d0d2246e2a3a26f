// SPDX-License-Identifier: MIT OR Apache-2.0
//! Rig commands.
//!
//! Commands are plain data describing one user-level operation. A
//! [`RigSession`] runs them against its scene with auto-key suppressed and
//! turns the result into a [`CommandOutcome`] a UI can display.

use crate::character::{add_region, all_characters, character_name, characterize, find_character};
use crate::component::{
    bake_and_remove, build_component, remove_component, reparent_component, switch_component,
    switch_space, AddonKind, BuildOptions, Component, ComponentKind,
};
use crate::context::{with_auto_key_suppressed, OperationContext};
use crate::error::RigError;
use crate::export::{export_all, FileExporter, RecordingExporter};
use crate::network::CharacterCore;
use crate::scene::SceneHost;
use crate::settings::{RigPreferences, Settings};
use rigforge_graph::{Graph, NetworkNode, NodeId, NodeKey};
use serde::{Deserialize, Serialize};

/// What a command may touch while it runs
pub struct CommandScope<'a> {
    /// Scene being edited
    pub scene: &'a mut dyn SceneHost,
    /// State captured when the command started
    pub ctx: &'a OperationContext,
    /// Destination for exports
    pub exporter: &'a mut dyn FileExporter,
}

/// One user-level rigging operation
pub trait RigCommand {
    /// Get a description of this command
    fn description(&self) -> &str;

    /// Execute the command, returning the objects it created
    fn execute(&self, scope: &mut CommandScope<'_>) -> Result<Vec<NodeKey>, RigError>;
}

/// Result reported back to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    /// Whether the command succeeded
    pub success: bool,
    /// Names of created objects
    pub created: Vec<String>,
    /// Description on success, the error otherwise
    pub message: String,
}

impl CommandOutcome {
    /// Serialize for a UI
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Resolve an object by node ID, then by full name
pub fn resolve(graph: &Graph, ident: &str) -> Result<NodeKey, RigError> {
    NodeId::parse(ident)
        .and_then(|id| graph.find_by_id(id))
        .or_else(|| graph.find_by_name(ident))
        .ok_or_else(|| RigError::ObjectNotFound(ident.to_string()))
}

/// Resolve a character by name, or by any object belonging to it
pub fn resolve_character(graph: &Graph, ident: &str) -> Result<CharacterCore, RigError> {
    if let Some(character) = all_characters(graph)
        .into_iter()
        .find(|c| character_name(graph, *c) == ident)
    {
        return Ok(character);
    }
    let key = resolve(graph, ident)?;
    find_character(graph, key).ok_or_else(|| RigError::NotCharacterized(ident.to_string()))
}

fn resolve_all(graph: &Graph, idents: &[String]) -> Result<Vec<NodeKey>, RigError> {
    idents.iter().map(|i| resolve(graph, i)).collect()
}

/// Components owning the named objects, or the selection when none are named
fn target_components(scope: &CommandScope<'_>, targets: &[String]) -> Result<Vec<Component>, RigError> {
    let graph = scope.scene.graph();
    let keys = if targets.is_empty() {
        scope.ctx.selection.clone()
    } else {
        resolve_all(graph, targets)?
    };
    let mut components = Vec::new();
    for key in keys {
        let component = Component::from_key(graph, key)
            .or_else(|| Component::owning(graph, key))
            .ok_or_else(|| RigError::NotAControl(graph.name_of(key).to_string()))?;
        if !components.contains(&component) {
            components.push(component);
        }
    }
    if components.is_empty() {
        return Err(RigError::EmptySelection);
    }
    Ok(components)
}

/// Register a skeleton as a character
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterizeCommand {
    /// Root joint
    pub root: String,
    /// Character name
    pub name: String,
}

impl RigCommand for CharacterizeCommand {
    fn description(&self) -> &str {
        "Characterize skeleton"
    }

    fn execute(&self, scope: &mut CommandScope<'_>) -> Result<Vec<NodeKey>, RigError> {
        let root = resolve(scope.scene.graph(), &self.root)?;
        let character = characterize(scope.scene, root, &self.name)?;
        Ok(vec![character.key()])
    }
}

/// Mark up a region on a character
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddRegionCommand {
    /// Character name or member
    pub character: String,
    /// Body side
    pub side: String,
    /// Region name
    pub region: String,
    /// First joint
    pub root: String,
    /// Last joint
    pub end: String,
    /// Remove the markup with the component built on it
    pub temporary: bool,
}

impl RigCommand for AddRegionCommand {
    fn description(&self) -> &str {
        "Add region"
    }

    fn execute(&self, scope: &mut CommandScope<'_>) -> Result<Vec<NodeKey>, RigError> {
        let graph = scope.scene.graph();
        let character = resolve_character(graph, &self.character)?;
        let root = resolve(graph, &self.root)?;
        let end = resolve(graph, &self.end)?;
        let region = add_region(
            scope.scene.graph_mut(),
            character,
            &self.side,
            &self.region,
            root,
            end,
            self.temporary,
        )?;
        Ok(region.markups.iter().map(|m| m.key).collect())
    }
}

/// Build a component on a region
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildComponentCommand {
    /// Character name or member
    pub character: String,
    /// Component kind name
    pub kind: String,
    /// Body side
    pub side: String,
    /// Region name
    pub region: String,
    /// Replace components already on the joints
    pub remove_existing: bool,
    /// Build alongside components already on the joints
    pub allow_shared: bool,
    /// Space to follow instead of the region's parent joint
    pub parent_space: Option<String>,
}

impl RigCommand for BuildComponentCommand {
    fn description(&self) -> &str {
        "Build component"
    }

    fn execute(&self, scope: &mut CommandScope<'_>) -> Result<Vec<NodeKey>, RigError> {
        let kind = ComponentKind::from_name(&self.kind)
            .ok_or_else(|| RigError::UnknownKind(self.kind.clone()))?;
        let graph = scope.scene.graph();
        let character = resolve_character(graph, &self.character)?;
        let parent_space = self
            .parent_space
            .as_deref()
            .map(|p| resolve(graph, p))
            .transpose()?;
        let options = BuildOptions {
            remove_existing: self.remove_existing,
            allow_shared: self.allow_shared,
            parent_space,
        };
        let component = build_component(
            scope.scene,
            scope.ctx,
            character,
            kind,
            &self.side,
            &self.region,
            options,
        )?;
        let graph = scope.scene.graph();
        let mut created = vec![component.core.key()];
        created.extend(component.group(graph));
        created.extend(component.controls(graph));
        Ok(created)
    }
}

/// Remove components, baking or reverting per preferences
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoveComponentCommand {
    /// Components or their controls. Empty uses the selection.
    pub targets: Vec<String>,
}

impl RigCommand for RemoveComponentCommand {
    fn description(&self) -> &str {
        "Remove component"
    }

    fn execute(&self, scope: &mut CommandScope<'_>) -> Result<Vec<NodeKey>, RigError> {
        for component in target_components(scope, &self.targets)? {
            remove_component(scope.scene, scope.ctx, component)?;
        }
        Ok(Vec::new())
    }
}

/// Bake the skeleton and remove components, batching the bakes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BakeAndRemoveCommand {
    /// Components or their controls. Empty uses the selection.
    pub targets: Vec<String>,
}

impl RigCommand for BakeAndRemoveCommand {
    fn description(&self) -> &str {
        "Bake and remove components"
    }

    fn execute(&self, scope: &mut CommandScope<'_>) -> Result<Vec<NodeKey>, RigError> {
        let components = target_components(scope, &self.targets)?;
        bake_and_remove(scope.scene, scope.ctx, &components)?;
        Ok(Vec::new())
    }
}

/// Drive a control from other objects.
///
/// Without explicit names the last selected object is the control and the
/// rest of the selection are drivers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchSpaceCommand {
    /// Control to override
    pub control: Option<String>,
    /// Addon kind name
    pub kind: String,
    /// Driver objects, empty for world space
    pub drivers: Vec<String>,
}

impl RigCommand for SwitchSpaceCommand {
    fn description(&self) -> &str {
        "Switch space"
    }

    fn execute(&self, scope: &mut CommandScope<'_>) -> Result<Vec<NodeKey>, RigError> {
        let kind = AddonKind::from_name(&self.kind).ok_or_else(|| RigError::UnknownKind(self.kind.clone()))?;
        let graph = scope.scene.graph();
        let (control, drivers) = match &self.control {
            Some(control) => (resolve(graph, control)?, resolve_all(graph, &self.drivers)?),
            None => {
                let (control, rest) = scope
                    .ctx
                    .selection
                    .split_last()
                    .ok_or(RigError::EmptySelection)?;
                (*control, rest.to_vec())
            }
        };
        let addon = switch_space(scope.scene, scope.ctx, control, kind, &drivers)?;
        let graph = scope.scene.graph();
        let mut created = vec![addon.core.key()];
        created.extend(addon.group(graph));
        created.extend(addon.addon_controls(graph));
        Ok(created)
    }
}

/// Move a component to a new parent space
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReparentCommand {
    /// Component or one of its controls
    pub target: String,
    /// New parent, `None` for world
    pub parent: Option<String>,
    /// Keep the controls' world motion
    pub preserve_animation: bool,
}

impl RigCommand for ReparentCommand {
    fn description(&self) -> &str {
        "Re-parent component"
    }

    fn execute(&self, scope: &mut CommandScope<'_>) -> Result<Vec<NodeKey>, RigError> {
        let component = target_components(scope, std::slice::from_ref(&self.target))?[0];
        let parent = self
            .parent
            .as_deref()
            .map(|p| resolve(scope.scene.graph(), p))
            .transpose()?;
        reparent_component(scope.scene, scope.ctx, component, parent, self.preserve_animation)?;
        Ok(Vec::new())
    }
}

/// Change a component's kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchComponentCommand {
    /// Component or one of its controls
    pub target: String,
    /// Kind to switch to
    pub kind: String,
}

impl RigCommand for SwitchComponentCommand {
    fn description(&self) -> &str {
        "Switch component"
    }

    fn execute(&self, scope: &mut CommandScope<'_>) -> Result<Vec<NodeKey>, RigError> {
        let kind = ComponentKind::from_name(&self.kind)
            .ok_or_else(|| RigError::UnknownKind(self.kind.clone()))?;
        let component = target_components(scope, std::slice::from_ref(&self.target))?[0];
        let switched = switch_component(scope.scene, scope.ctx, component, kind)?;
        Ok(vec![switched.core.key()])
    }
}

/// Export every asset of a character
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportCommand {
    /// Character name or member
    pub character: String,
}

impl RigCommand for ExportCommand {
    fn description(&self) -> &str {
        "Export animation"
    }

    fn execute(&self, scope: &mut CommandScope<'_>) -> Result<Vec<NodeKey>, RigError> {
        let character = resolve_character(scope.scene.graph(), &self.character)?;
        let reports = export_all(scope.scene, scope.ctx, character, scope.exporter)?;
        tracing::debug!("Export wrote {} files", reports.len());
        Ok(Vec::new())
    }
}

/// A scene, its settings and the current selection
pub struct RigSession<S: SceneHost, E: FileExporter = RecordingExporter> {
    /// Scene being rigged
    pub scene: S,
    /// Loaded settings
    pub settings: Settings,
    /// Export destination
    pub exporter: E,
    /// Selected objects, in selection order
    pub selection: Vec<NodeKey>,
}

impl<S: SceneHost> RigSession<S> {
    /// Session recording exports in memory
    pub fn new(scene: S, settings: Settings) -> Self {
        Self::with_exporter(scene, settings, RecordingExporter::new())
    }
}

impl<S: SceneHost, E: FileExporter> RigSession<S, E> {
    /// Session writing exports through `exporter`
    pub fn with_exporter(scene: S, settings: Settings, exporter: E) -> Self {
        Self {
            scene,
            settings,
            exporter,
            selection: Vec::new(),
        }
    }

    /// Preferences read from the settings
    pub fn preferences(&self) -> RigPreferences {
        RigPreferences::from_settings(&self.settings)
    }

    /// Replace the selection
    pub fn select(&mut self, selection: Vec<NodeKey>) {
        self.selection = selection;
    }

    /// Run a command and report the outcome
    pub fn run(&mut self, command: &dyn RigCommand) -> CommandOutcome {
        let ctx = OperationContext::capture(&self.scene, self.selection.clone(), self.preferences());
        let exporter = &mut self.exporter;
        let result = with_auto_key_suppressed(&mut self.scene, |scene| {
            let mut scope = CommandScope {
                scene,
                ctx: &ctx,
                exporter,
            };
            command.execute(&mut scope)
        });

        match result {
            Ok(created) => {
                let graph = self.scene.graph();
                let created: Vec<String> = created
                    .into_iter()
                    .filter(|k| graph.contains(*k))
                    .map(|k| graph.name_of(k).to_string())
                    .collect();
                tracing::info!("{} succeeded", command.description());
                CommandOutcome {
                    success: true,
                    created,
                    message: command.description().to_string(),
                }
            }
            Err(err) => {
                if err.is_user_facing() {
                    tracing::warn!("{} failed: {err}", command.description());
                } else {
                    tracing::error!("{} failed: {err}", command.description());
                }
                CommandOutcome {
                    success: false,
                    created: Vec::new(),
                    message: err.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{MemoryScene, Transform};
    use glam::DVec3;
    use rigforge_sequencer::Channel;

    fn session() -> RigSession<MemoryScene> {
        let mut scene = MemoryScene::default();
        let step = Transform::from_translation(DVec3::X);
        let root = scene.create_joint("root", None, Transform::IDENTITY).unwrap();
        let upper = scene.create_joint("upper", Some(root), step).unwrap();
        scene.create_joint("hand", Some(upper), step).unwrap();
        RigSession::new(scene, Settings::default())
    }

    fn rig_arm(session: &mut RigSession<MemoryScene>) {
        let characterize = CharacterizeCommand {
            root: "root".into(),
            name: "hero".into(),
        };
        assert!(session.run(&characterize).success);
        let region = AddRegionCommand {
            character: "hero".into(),
            side: "left".into(),
            region: "arm".into(),
            root: "upper".into(),
            end: "hand".into(),
            temporary: false,
        };
        assert!(session.run(&region).success);
        let build = BuildComponentCommand {
            character: "hero".into(),
            kind: "fk".into(),
            side: "left".into(),
            region: "arm".into(),
            remove_existing: false,
            allow_shared: false,
            parent_space: None,
        };
        let outcome = session.run(&build);
        assert!(outcome.success, "{}", outcome.message);
        assert!(outcome.created.contains(&"hero:left_arm_fk0_ctrl".to_string()));
    }

    #[test]
    fn test_commands_build_and_remove_through_selection() {
        let mut session = session();
        rig_arm(&mut session);
        let control = session.scene.graph().find_by_name("hero:left_arm_fk0_ctrl").unwrap();

        session.select(vec![control]);
        let outcome = session.run(&RemoveComponentCommand::default());

        assert!(outcome.success, "{}", outcome.message);
        assert!(!session.scene.graph().contains(control));
    }

    #[test]
    fn test_failures_become_outcomes() {
        let mut session = session();
        let outcome = session.run(&RemoveComponentCommand::default());
        assert!(!outcome.success);
        assert_eq!(outcome.message, RigError::EmptySelection.to_string());

        let outcome = session.run(&CharacterizeCommand {
            root: "nowhere".into(),
            name: "ghost".into(),
        });
        assert!(!outcome.success);
        let json = outcome.to_json().unwrap();
        assert!(json.contains("\"success\":false"));
    }

    #[test]
    fn test_auto_key_is_suppressed_and_restored() {
        let mut session = session();
        session.scene.set_auto_key(true);
        let upper = session.scene.graph().find_by_name("upper").unwrap();
        session.scene.set_key(upper, Channel::RotateZ, 0.0, 10.0).unwrap();

        rig_arm(&mut session);

        assert!(session.scene.auto_key());
    }

    #[test]
    fn test_switch_space_from_selection_and_export() {
        let mut session = session();
        rig_arm(&mut session);
        let graph = session.scene.graph();
        let control = graph.find_by_name("hero:left_arm_fk1_ctrl").unwrap();
        let root = graph.find_by_name("root").unwrap();

        session.select(vec![root, control]);
        let outcome = session.run(&SwitchSpaceCommand {
            control: None,
            kind: "overdriver".into(),
            drivers: Vec::new(),
        });
        assert!(outcome.success, "{}", outcome.message);
        assert_eq!(outcome.created.len(), 3);

        let character = resolve_character(session.scene.graph(), "hero").unwrap();
        crate::export::add_animation_asset(session.scene.graph_mut(), character, "walk", "out").unwrap();
        let asset = crate::export::assets(session.scene.graph(), character)[0];
        crate::export::add_definition(session.scene.graph_mut(), asset, "loop", None).unwrap();
        let outcome = session.run(&ExportCommand {
            character: "hero".into(),
        });
        assert!(outcome.success, "{}", outcome.message);
        assert_eq!(session.exporter.records.len(), 1);
    }

    #[test]
    fn test_unknown_kind_is_reported() {
        let mut session = session();
        rig_arm(&mut session);
        let outcome = session.run(&SwitchComponentCommand {
            target: "hero:left_arm_fk0_ctrl".into(),
            kind: "ik".into(),
        });
        assert!(!outcome.success);
        assert!(outcome.message.contains("ik"));
    }
}
