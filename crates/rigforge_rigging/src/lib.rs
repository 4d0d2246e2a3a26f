// SPDX-License-Identifier: MIT OR Apache-2.0
//! Rig lifecycle for rigforge.
//!
//! Builds on the metadata graph to track characterized skeletons and the
//! rig components driving them:
//! - Characters, bind poses and region markup
//! - Component build, removal, re-parenting and kind switching
//! - Space-switch addons driving existing controls
//! - Staged animation export of a baked skeleton copy
//!
//! ## Architecture
//!
//! Every operation works through [`scene::SceneHost`], the seam to the
//! host application's scene. [`scene::MemoryScene`] is the in-process
//! implementation used by the binary and the tests. User-level operations
//! are wrapped as [`commands::RigCommand`]s and run by a
//! [`commands::RigSession`].

pub mod character;
pub mod commands;
pub mod component;
pub mod context;
pub mod error;
pub mod export;
pub mod network;
pub mod scene;
pub mod settings;

#[cfg(test)]
mod scenario_tests;

pub use commands::{CommandOutcome, RigCommand, RigSession};
pub use context::OperationContext;
pub use error::RigError;
pub use scene::{MemoryScene, SceneHost};
