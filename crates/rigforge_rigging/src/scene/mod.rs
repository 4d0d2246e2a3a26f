// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host scene interface.
//!
//! Everything the rigging layer needs from a 3D scene goes through
//! [`SceneHost`]: object lifetime, transforms, constraints, animation
//! curves, baking and playback state. The metadata [`Graph`] lives inside
//! the host so scene objects and network nodes share one namespace.

pub mod memory;

pub use memory::MemoryScene;

use glam::{DAffine3, DQuat, DVec3, EulerRot};
use rigforge_graph::{Graph, GraphError, NodeKey, NodeKind};
use rigforge_sequencer::{AnimCurve, BakeRequest, Channel, FrameRange};
use serde::{Deserialize, Serialize};

/// Local transform channels. Rotation is XYZ euler in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Translation
    pub translate: DVec3,
    /// Euler rotation in degrees
    pub rotate: DVec3,
    /// Scale
    pub scale: DVec3,
}

impl Transform {
    /// Identity transform
    pub const IDENTITY: Self = Self {
        translate: DVec3::ZERO,
        rotate: DVec3::ZERO,
        scale: DVec3::ONE,
    };

    /// Transform with only a translation
    pub fn from_translation(translate: DVec3) -> Self {
        Self {
            translate,
            ..Self::IDENTITY
        }
    }

    /// Rotation as a quaternion
    pub fn rotation(&self) -> DQuat {
        DQuat::from_euler(
            EulerRot::XYZ,
            self.rotate.x.to_radians(),
            self.rotate.y.to_radians(),
            self.rotate.z.to_radians(),
        )
    }

    /// Compose into a matrix
    pub fn to_affine(&self) -> DAffine3 {
        DAffine3::from_scale_rotation_translation(self.scale, self.rotation(), self.translate)
    }

    /// Decompose a matrix
    pub fn from_affine(matrix: &DAffine3) -> Self {
        let (scale, rotation, translate) = matrix.to_scale_rotation_translation();
        let (x, y, z) = rotation.to_euler(EulerRot::XYZ);
        Self {
            translate,
            rotate: DVec3::new(x.to_degrees(), y.to_degrees(), z.to_degrees()),
            scale,
        }
    }

    /// Read one channel
    pub fn channel(&self, channel: Channel) -> f64 {
        let axis = channel.axis();
        match channel {
            Channel::TranslateX | Channel::TranslateY | Channel::TranslateZ => self.translate[axis],
            Channel::RotateX | Channel::RotateY | Channel::RotateZ => self.rotate[axis],
            Channel::ScaleX | Channel::ScaleY | Channel::ScaleZ => self.scale[axis],
        }
    }

    /// Write one channel
    pub fn set_channel(&mut self, channel: Channel, value: f64) {
        let axis = channel.axis();
        match channel {
            Channel::TranslateX | Channel::TranslateY | Channel::TranslateZ => {
                self.translate[axis] = value;
            }
            Channel::RotateX | Channel::RotateY | Channel::RotateZ => self.rotate[axis] = value,
            Channel::ScaleX | Channel::ScaleY | Channel::ScaleZ => self.scale[axis] = value,
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Whether two matrices agree within `tolerance` on every element
pub fn matrices_match(a: &DAffine3, b: &DAffine3, tolerance: f64) -> bool {
    a.abs_diff_eq(*b, tolerance)
}

/// Kind of constraint between scene objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// Translation and rotation
    Parent,
    /// Translation only
    Point,
    /// Rotation only
    Orient,
    /// Scale only
    Scale,
    /// Aim the X axis at the targets
    Aim,
}

impl ConstraintKind {
    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Parent => "parent",
            Self::Point => "point",
            Self::Orient => "orient",
            Self::Scale => "scale",
            Self::Aim => "aim",
        }
    }

    /// Parse a display name
    pub fn from_name(name: &str) -> Option<Self> {
        [Self::Parent, Self::Point, Self::Orient, Self::Scale, Self::Aim]
            .into_iter()
            .find(|k| k.name() == name)
    }
}

/// Read-only description of a constraint
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintInfo {
    /// Constraint kind
    pub kind: ConstraintKind,
    /// Constrained object
    pub driven: NodeKey,
    /// Target objects in weight-index order
    pub targets: Vec<NodeKey>,
}

/// Error raised by host scene operations
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// Object not found
    #[error("Object not found: {0}")]
    ObjectNotFound(NodeKey),

    /// Object has no transform
    #[error("{0} is not a transform")]
    NotATransform(String),

    /// Object is not a constraint
    #[error("{0} is not a constraint")]
    NotAConstraint(NodeKey),

    /// Object is not an animation curve
    #[error("{0} is not an animation curve")]
    NotACurve(NodeKey),

    /// Constraint target index out of range
    #[error("Constraint {constraint} has no target {index}")]
    TargetOutOfRange {
        /// Constraint node
        constraint: NodeKey,
        /// Requested target index
        index: usize,
    },

    /// Constraint created without targets
    #[error("A constraint needs at least one target")]
    NoTargets,

    /// Underlying graph error
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Narrow interface onto a host 3D scene
pub trait SceneHost {
    /// Metadata graph holding every scene object
    fn graph(&self) -> &Graph;

    /// Metadata graph, mutably
    fn graph_mut(&mut self) -> &mut Graph;

    /// Create an object, optionally parented
    fn create_object(
        &mut self,
        name: &str,
        kind: NodeKind,
        parent: Option<NodeKey>,
    ) -> Result<NodeKey, SceneError>;

    /// Delete an object with its hierarchy, the curves driving it and the
    /// constraints on it. Returns the number of objects removed.
    fn delete_object(&mut self, node: NodeKey) -> Result<usize, SceneError>;

    /// Copy a single object's kind and local transform
    fn duplicate(
        &mut self,
        node: NodeKey,
        name: &str,
        parent: Option<NodeKey>,
    ) -> Result<NodeKey, SceneError>;

    /// Re-parent an object, keeping its local transform
    fn set_parent(&mut self, node: NodeKey, parent: Option<NodeKey>) -> Result<(), SceneError>;

    /// Static local transform
    fn local_transform(&self, node: NodeKey) -> Result<Transform, SceneError>;

    /// Set the static local transform; keys animated channels when auto-key is on
    fn set_local_transform(&mut self, node: NodeKey, transform: Transform) -> Result<(), SceneError>;

    /// Evaluated local transform at a frame
    fn local_at(&self, node: NodeKey, frame: f64) -> Result<Transform, SceneError>;

    /// Evaluated world matrix at a frame, constraints included
    fn world_matrix(&self, node: NodeKey, frame: f64) -> Result<DAffine3, SceneError>;

    /// World matrix from static values only, ignoring curves and constraints
    fn rest_matrix(&self, node: NodeKey) -> Result<DAffine3, SceneError>;

    /// Constrain `driven` to `targets`. With `maintain_offset` the rest
    /// relationship is preserved, otherwise the driven object snaps.
    fn constrain(
        &mut self,
        kind: ConstraintKind,
        targets: &[NodeKey],
        driven: NodeKey,
        maintain_offset: bool,
    ) -> Result<NodeKey, SceneError>;

    /// Describe a constraint
    fn constraint_info(&self, constraint: NodeKey) -> Option<ConstraintInfo>;

    /// Constraints acting on an object, in creation order
    fn constraints_on(&self, driven: NodeKey) -> Vec<NodeKey>;

    /// Constraints using an object as a target
    fn constraints_targeting(&self, target: NodeKey) -> Vec<NodeKey>;

    /// Set a static target weight
    fn set_constraint_weight(
        &mut self,
        constraint: NodeKey,
        index: usize,
        weight: f64,
    ) -> Result<(), SceneError>;

    /// Key a target weight at a frame
    fn key_constraint_weight(
        &mut self,
        constraint: NodeKey,
        index: usize,
        frame: f64,
        weight: f64,
    ) -> Result<(), SceneError>;

    /// Evaluated target weight at a frame
    fn constraint_weight(
        &self,
        constraint: NodeKey,
        index: usize,
        frame: f64,
    ) -> Result<f64, SceneError>;

    /// Curves driving an object's channels
    fn curves_on(&self, node: NodeKey) -> Vec<(Channel, NodeKey)>;

    /// Read a curve
    fn curve(&self, curve: NodeKey) -> Option<&AnimCurve>;

    /// Modify a curve
    fn curve_mut(&mut self, curve: NodeKey) -> Option<&mut AnimCurve>;

    /// Object and channel a curve drives
    fn curve_target(&self, curve: NodeKey) -> Option<(NodeKey, Channel)>;

    /// Drive a channel with a curve. A curve already on that channel is deleted.
    fn connect_curve(
        &mut self,
        curve: NodeKey,
        node: NodeKey,
        channel: Channel,
    ) -> Result<(), SceneError>;

    /// Stop a curve driving anything, returning what it drove
    fn disconnect_curve(&mut self, curve: NodeKey) -> Result<Option<(NodeKey, Channel)>, SceneError>;

    /// Set a key, creating the curve when needed. Returns the curve.
    fn set_key(
        &mut self,
        node: NodeKey,
        channel: Channel,
        frame: f64,
        value: f64,
    ) -> Result<NodeKey, SceneError>;

    /// Sample every request in one evaluation pass and key the results.
    ///
    /// Returns the number of keys written.
    fn bake(&mut self, requests: &[BakeRequest<NodeKey>]) -> Result<usize, SceneError>;

    /// Playback range
    fn playback_range(&self) -> FrameRange;

    /// Set the playback range
    fn set_playback_range(&mut self, range: FrameRange);

    /// Current frame
    fn current_frame(&self) -> f64;

    /// Jump to a frame
    fn set_current_frame(&mut self, frame: f64);

    /// Whether edits are keyed automatically
    fn auto_key(&self) -> bool;

    /// Toggle automatic keying
    fn set_auto_key(&mut self, enabled: bool);

    /// Delete every object in a namespace, returning how many were removed
    fn delete_namespace(&mut self, namespace: &str) -> usize;

    /// Whether any channel of the object is keyed
    fn is_animated(&self, node: NodeKey) -> bool {
        !self.curves_on(node).is_empty()
    }

    /// Frames spanned by the object's keys
    fn key_range(&self, node: NodeKey) -> Option<FrameRange> {
        self.curves_on(node)
            .into_iter()
            .filter_map(|(_, curve)| self.curve(curve).and_then(AnimCurve::frame_range))
            .reduce(|a, b| a.union(&b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_round_trip_through_matrix() {
        let transform = Transform {
            translate: DVec3::new(1.0, 2.0, 3.0),
            rotate: DVec3::new(10.0, -20.0, 30.0),
            scale: DVec3::ONE,
        };
        let back = Transform::from_affine(&transform.to_affine());
        assert!(back.translate.abs_diff_eq(transform.translate, 1e-9));
        assert!(back.rotate.abs_diff_eq(transform.rotate, 1e-9));
        assert!(back.scale.abs_diff_eq(transform.scale, 1e-9));
    }

    #[test]
    fn test_channels() {
        let mut transform = Transform::IDENTITY;
        transform.set_channel(Channel::RotateZ, 45.0);
        transform.set_channel(Channel::TranslateY, 2.0);
        assert_eq!(transform.channel(Channel::RotateZ), 45.0);
        assert_eq!(transform.translate, DVec3::new(0.0, 2.0, 0.0));
        assert_eq!(transform.channel(Channel::ScaleX), 1.0);
    }

    #[test]
    fn test_constraint_kind_names() {
        assert_eq!(ConstraintKind::from_name("orient"), Some(ConstraintKind::Orient));
        assert_eq!(ConstraintKind::from_name("twist"), None);
    }
}
