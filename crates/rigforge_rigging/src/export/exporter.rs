// SPDX-License-Identifier: MIT OR Apache-2.0
//! File exporter seam.

use super::ExportError;
use crate::scene::SceneHost;
use rigforge_graph::NodeKey;
use rigforge_sequencer::FrameRange;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What to write
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRequest {
    /// Destination file
    pub path: PathBuf,
    /// Objects to write, root first
    pub nodes: Vec<NodeKey>,
    /// Frames to write
    pub range: FrameRange,
}

/// Writes baked scene objects to a file
pub trait FileExporter {
    /// Write the requested objects
    fn export_file(&mut self, scene: &dyn SceneHost, request: &ExportRequest) -> Result<(), ExportError>;
}

/// One recorded export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    /// Destination file
    pub path: PathBuf,
    /// Short names of the written objects
    pub nodes: Vec<String>,
    /// Frames written
    pub range: FrameRange,
    /// Keys across every written curve
    pub keys: usize,
}

/// Exporter that records requests instead of writing files
#[derive(Debug, Default)]
pub struct RecordingExporter {
    /// Requests seen so far
    pub records: Vec<ExportRecord>,
}

impl RecordingExporter {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileExporter for RecordingExporter {
    fn export_file(&mut self, scene: &dyn SceneHost, request: &ExportRequest) -> Result<(), ExportError> {
        let graph = scene.graph();
        let mut nodes = Vec::with_capacity(request.nodes.len());
        let mut keys = 0;
        for node in &request.nodes {
            let Some(data) = graph.node(*node) else {
                return Err(ExportError::Exporter {
                    path: request.path.display().to_string(),
                    reason: format!("{node} no longer exists"),
                });
            };
            nodes.push(data.short_name().to_string());
            keys += scene
                .curves_on(*node)
                .into_iter()
                .filter_map(|(_, curve)| scene.curve(curve))
                .map(|curve| curve.key_count())
                .sum::<usize>();
        }
        tracing::debug!("Recorded export of {} objects to {:?}", nodes.len(), request.path);
        self.records.push(ExportRecord {
            path: request.path.clone(),
            nodes,
            range: request.range,
            keys,
        });
        Ok(())
    }
}
