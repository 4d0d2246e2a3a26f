// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyframe definitions for animation curves.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a keyframe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyframeId(pub Uuid);

impl KeyframeId {
    /// Create a new random keyframe ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for KeyframeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Interpolation mode between keyframes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterpolationMode {
    /// Constant (step)
    Constant,
    /// Linear interpolation
    #[default]
    Linear,
    /// Smooth interpolation using neighbouring keys as tangents
    Auto,
}

/// A keyframe on a scalar curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Unique keyframe ID
    pub id: KeyframeId,
    /// Frame number
    pub frame: f64,
    /// Value at this keyframe
    pub value: f64,
    /// Interpolation mode to next keyframe
    pub interpolation: InterpolationMode,
}

impl Keyframe {
    /// Create a new keyframe
    pub fn new(frame: f64, value: f64) -> Self {
        Self {
            id: KeyframeId::new(),
            frame,
            value,
            interpolation: InterpolationMode::Linear,
        }
    }

    /// Set interpolation mode
    pub fn with_interpolation(mut self, mode: InterpolationMode) -> Self {
        self.interpolation = mode;
        self
    }
}

/// Interpolation utilities
pub struct Interpolation;

impl Interpolation {
    /// Linear interpolation between two values
    pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
        a + (b - a) * t
    }

    /// Hermite spline interpolation
    pub fn hermite(p0: f64, m0: f64, p1: f64, m1: f64, t: f64) -> f64 {
        let t2 = t * t;
        let t3 = t2 * t;

        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;

        h00 * p0 + h10 * m0 + h01 * p1 + h11 * m1
    }
}
