// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-operation snapshot of scene state and preferences.

use crate::scene::SceneHost;
use crate::settings::RigPreferences;
use rigforge_graph::NodeKey;
use rigforge_sequencer::FrameRange;

/// State captured when an operation starts
#[derive(Debug, Clone, PartialEq)]
pub struct OperationContext {
    /// Frame the user was on
    pub current_frame: f64,
    /// Playback range
    pub frame_range: FrameRange,
    /// Selected objects
    pub selection: Vec<NodeKey>,
    /// Preferences in effect
    pub preferences: RigPreferences,
}

impl OperationContext {
    /// Capture the scene's current frame and range
    pub fn capture<S: SceneHost + ?Sized>(
        scene: &S,
        selection: Vec<NodeKey>,
        preferences: RigPreferences,
    ) -> Self {
        Self {
            current_frame: scene.current_frame(),
            frame_range: scene.playback_range(),
            selection,
            preferences,
        }
    }
}

/// Run `f` with auto-key off, restoring the previous flag afterwards
pub fn with_auto_key_suppressed<S, T, E>(
    scene: &mut S,
    f: impl FnOnce(&mut S) -> Result<T, E>,
) -> Result<T, E>
where
    S: SceneHost + ?Sized,
{
    let previous = scene.auto_key();
    scene.set_auto_key(false);
    let result = f(scene);
    scene.set_auto_key(previous);
    result
}
