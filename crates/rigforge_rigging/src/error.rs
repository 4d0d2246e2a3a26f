// SPDX-License-Identifier: MIT OR Apache-2.0
//! Rigging error type.

use crate::export::ExportError;
use crate::scene::SceneError;
use crate::settings::SettingsError;
use rigforge_graph::GraphError;

/// Error raised by rigging operations
#[derive(Debug, thiserror::Error)]
pub enum RigError {
    /// Metadata graph error
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Host scene error
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),

    /// Settings error
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    /// Export error
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// No markup for the requested region
    #[error("No {side} {region} region on {character}")]
    RegionNotFound {
        /// Character name
        character: String,
        /// Requested side
        side: String,
        /// Requested region
        region: String,
    },

    /// A region's markup does not describe a joint chain
    #[error("Region {side} {region} does not form a joint chain")]
    BrokenRegion {
        /// Region side
        side: String,
        /// Region name
        region: String,
    },

    /// Joint already driven by a component
    #[error("{0} is already rigged")]
    AlreadyRigged(String),

    /// Control already has an overdriver
    #[error("{0} is already overdriven")]
    AlreadyOverdriven(String),

    /// Object is not a rig control
    #[error("{0} is not a rig control")]
    NotAControl(String),

    /// Operation needs a selection
    #[error("Nothing selected")]
    EmptySelection,

    /// Object belongs to no character
    #[error("{0} is not part of a character")]
    NotCharacterized(String),

    /// Skeleton already has a character
    #[error("{0} is already characterized")]
    AlreadyCharacterized(String),

    /// Region length does not suit the component kind
    #[error("{kind} components need {expected} joints, the region has {found}")]
    IncompatibleJointCount {
        /// Component kind
        kind: &'static str,
        /// Accepted joint counts
        expected: &'static str,
        /// Joints in the region
        found: usize,
    },

    /// Named object does not exist
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    /// Unrecognised component or addon kind
    #[error("Unknown kind: {0}")]
    UnknownKind(String),

    /// Object is not a joint
    #[error("{0} is not a joint")]
    NotAJoint(String),

    /// Component metadata is incomplete
    #[error("Component {component} has no {what}")]
    MissingComponentData {
        /// Component node name
        component: String,
        /// Missing piece
        what: &'static str,
    },
}

impl RigError {
    /// Whether the error describes a user mistake rather than a fault
    pub fn is_user_facing(&self) -> bool {
        !matches!(
            self,
            Self::Graph(_) | Self::Scene(_) | Self::Settings(_) | Self::MissingComponentData { .. }
        )
    }
}
