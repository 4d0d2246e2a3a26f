// SPDX-License-Identifier: MIT OR Apache-2.0
//! Animation curves and batched baking for rigforge.
//!
//! This crate provides:
//! - Scalar keyframe curves with step, linear and smooth interpolation
//! - Transform channel naming
//! - Inclusive frame ranges and playback state
//! - A bake queue that coalesces many bakes into one sampling pass

pub mod bake;
pub mod curve;
pub mod keyframe;
pub mod timeline;

pub use bake::{BakeDriver, BakeError, BakeQueue, BakeRequest, BakeSummary};
pub use curve::{AnimCurve, Channel};
pub use keyframe::{Interpolation, InterpolationMode, Keyframe, KeyframeId};
pub use timeline::{FrameRange, Timeline};
