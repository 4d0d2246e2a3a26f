// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scalar animation curves and the transform channels they drive.

use crate::keyframe::{Interpolation, InterpolationMode, Keyframe, KeyframeId};
use crate::timeline::FrameRange;
use serde::{Deserialize, Serialize};

/// Frames closer than this are treated as the same frame
const FRAME_EPSILON: f64 = 1e-6;

/// Transform channel a curve can drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Channel {
    /// Translation X
    TranslateX,
    /// Translation Y
    TranslateY,
    /// Translation Z
    TranslateZ,
    /// Rotation X (degrees)
    RotateX,
    /// Rotation Y (degrees)
    RotateY,
    /// Rotation Z (degrees)
    RotateZ,
    /// Scale X
    ScaleX,
    /// Scale Y
    ScaleY,
    /// Scale Z
    ScaleZ,
}

impl Channel {
    /// Every transform channel
    pub const ALL: [Channel; 9] = [
        Self::TranslateX,
        Self::TranslateY,
        Self::TranslateZ,
        Self::RotateX,
        Self::RotateY,
        Self::RotateZ,
        Self::ScaleX,
        Self::ScaleY,
        Self::ScaleZ,
    ];

    /// Translation channels
    pub const TRANSLATE: [Channel; 3] = [Self::TranslateX, Self::TranslateY, Self::TranslateZ];

    /// Rotation channels
    pub const ROTATE: [Channel; 3] = [Self::RotateX, Self::RotateY, Self::RotateZ];

    /// Get the attribute name for this channel
    pub fn name(&self) -> &'static str {
        match self {
            Self::TranslateX => "translateX",
            Self::TranslateY => "translateY",
            Self::TranslateZ => "translateZ",
            Self::RotateX => "rotateX",
            Self::RotateY => "rotateY",
            Self::RotateZ => "rotateZ",
            Self::ScaleX => "scaleX",
            Self::ScaleY => "scaleY",
            Self::ScaleZ => "scaleZ",
        }
    }

    /// Parse an attribute name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Axis index within the channel's vector (0 = X)
    pub fn axis(&self) -> usize {
        match self {
            Self::TranslateX | Self::RotateX | Self::ScaleX => 0,
            Self::TranslateY | Self::RotateY | Self::ScaleY => 1,
            Self::TranslateZ | Self::RotateZ | Self::ScaleZ => 2,
        }
    }
}

/// A keyframed scalar curve
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimCurve {
    /// Keyframes sorted by frame
    keyframes: Vec<Keyframe>,
}

impl AnimCurve {
    /// Create an empty curve
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a keyframe
    pub fn add_keyframe(&mut self, keyframe: Keyframe) {
        self.keyframes.push(keyframe);
        self.sort_keyframes();
    }

    fn sort_keyframes(&mut self) {
        self.keyframes.sort_by(|a, b| a.frame.total_cmp(&b.frame));
    }

    /// Insert or update the keyframe at a frame
    pub fn set_key(&mut self, frame: f64, value: f64) -> KeyframeId {
        self.set_key_with(frame, value, InterpolationMode::Linear)
    }

    /// Insert or update the keyframe at a frame with an interpolation mode
    pub fn set_key_with(&mut self, frame: f64, value: f64, mode: InterpolationMode) -> KeyframeId {
        if let Some(existing) = self
            .keyframes
            .iter_mut()
            .find(|k| (k.frame - frame).abs() < FRAME_EPSILON)
        {
            existing.value = value;
            existing.interpolation = mode;
            return existing.id;
        }
        let keyframe = Keyframe::new(frame, value).with_interpolation(mode);
        let id = keyframe.id;
        self.add_keyframe(keyframe);
        id
    }

    /// Get the keyframe at a frame, if any
    pub fn keyframe_at(&self, frame: f64) -> Option<&Keyframe> {
        self.keyframes
            .iter()
            .find(|k| (k.frame - frame).abs() < FRAME_EPSILON)
    }

    /// Remove every keyframe inside a range, returning how many were removed
    pub fn remove_range(&mut self, range: FrameRange) -> usize {
        let before = self.keyframes.len();
        self.keyframes.retain(|k| !range.contains(k.frame));
        before - self.keyframes.len()
    }

    /// Get all keyframes in frame order
    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    /// Get keyframe count
    pub fn key_count(&self) -> usize {
        self.keyframes.len()
    }

    /// Whether the curve has no keys
    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    /// Get keyframes in a frame range
    pub fn keys_in_range(&self, range: FrameRange) -> Vec<&Keyframe> {
        self.keyframes
            .iter()
            .filter(|k| range.contains(k.frame))
            .collect()
    }

    /// Range spanned by the keys
    pub fn frame_range(&self) -> Option<FrameRange> {
        let first = self.keyframes.first()?;
        let last = self.keyframes.last()?;
        Some(FrameRange::new(first.frame, last.frame))
    }

    /// Move every key by `offset` frames
    pub fn shift(&mut self, offset: f64) {
        for keyframe in &mut self.keyframes {
            keyframe.frame += offset;
        }
    }

    /// Set every key to the same value
    pub fn flatten(&mut self, value: f64) {
        for keyframe in &mut self.keyframes {
            keyframe.value = value;
        }
    }

    /// Evaluate the curve at a frame. Values hold flat outside the keys.
    pub fn evaluate(&self, frame: f64) -> Option<f64> {
        let first = self.keyframes.first()?;
        let next_idx = self.keyframes.iter().position(|k| k.frame >= frame);

        let idx = match next_idx {
            None => return self.keyframes.last().map(|k| k.value),
            Some(0) => return Some(first.value),
            Some(idx) => idx,
        };
        let a = &self.keyframes[idx - 1];
        let b = &self.keyframes[idx];
        let span = b.frame - a.frame;
        if span.abs() < FRAME_EPSILON {
            return Some(b.value);
        }
        let t = (frame - a.frame) / span;

        let value = match a.interpolation {
            InterpolationMode::Constant => a.value,
            InterpolationMode::Linear => Interpolation::lerp(a.value, b.value, t),
            InterpolationMode::Auto => {
                let m0 = self.tangent(idx - 1) * span;
                let m1 = self.tangent(idx) * span;
                Interpolation::hermite(a.value, m0, b.value, m1, t)
            }
        };
        Some(value)
    }

    /// Catmull-Rom style slope at a key
    fn tangent(&self, idx: usize) -> f64 {
        let prev = idx.checked_sub(1).and_then(|i| self.keyframes.get(i));
        let next = self.keyframes.get(idx + 1);
        match (prev, next) {
            (Some(p), Some(n)) if (n.frame - p.frame).abs() > FRAME_EPSILON => {
                (n.value - p.value) / (n.frame - p.frame)
            }
            _ => 0.0,
        }
    }

    /// Whether both curves have keys on the same frames with values
    /// within `tolerance`
    pub fn approx_eq(&self, other: &AnimCurve, tolerance: f64) -> bool {
        self.keyframes.len() == other.keyframes.len()
            && self
                .keyframes
                .iter()
                .zip(&other.keyframes)
                .all(|(a, b)| {
                    (a.frame - b.frame).abs() <= tolerance && (a.value - b.value).abs() <= tolerance
                })
    }
}
