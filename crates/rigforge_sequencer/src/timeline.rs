// SPDX-License-Identifier: MIT OR Apache-2.0
//! Frame ranges and playback state.

use serde::{Deserialize, Serialize};

/// Inclusive range of frames
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameRange {
    /// First frame
    pub start: f64,
    /// Last frame
    pub end: f64,
}

impl FrameRange {
    /// Create a range, swapping the bounds if given backwards
    pub fn new(start: f64, end: f64) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self { start: end, end: start }
        }
    }

    /// Whether a frame lies inside the range
    pub fn contains(&self, frame: f64) -> bool {
        frame >= self.start && frame <= self.end
    }

    /// Number of whole frames sampled by [`FrameRange::frames`]
    pub fn frame_count(&self) -> usize {
        (self.end - self.start).floor() as usize + 1
    }

    /// Every whole frame step from start to end, inclusive
    pub fn frames(&self) -> impl Iterator<Item = f64> {
        let start = self.start;
        (0..self.frame_count()).map(move |i| start + i as f64)
    }

    /// Smallest range covering both
    pub fn union(&self, other: &FrameRange) -> FrameRange {
        FrameRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// The same range moved by `offset` frames
    pub fn shifted(&self, offset: f64) -> FrameRange {
        FrameRange {
            start: self.start + offset,
            end: self.end + offset,
        }
    }
}

impl Default for FrameRange {
    fn default() -> Self {
        Self { start: 0.0, end: 24.0 }
    }
}

/// Scene playback state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    /// Playback range
    pub range: FrameRange,
    /// Current frame
    pub current_frame: f64,
    /// Whether edits are keyed automatically
    pub auto_key: bool,
}

impl Timeline {
    /// Create a timeline over a range, positioned at its start
    pub fn new(range: FrameRange) -> Self {
        Self {
            range,
            current_frame: range.start,
            auto_key: false,
        }
    }

    /// Jump to a frame
    pub fn set_current_frame(&mut self, frame: f64) {
        self.current_frame = frame;
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new(FrameRange::default())
    }
}
