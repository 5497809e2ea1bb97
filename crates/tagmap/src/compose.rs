//! Composition of per-edge relative poses along a co-observation chain.

use log::trace;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use tagmap_core::{DetectionFeed, TagId, MM_PER_M};
use tagmap_graph::{PathEdge, TagPath};

/// Pose of a tag relative to the origin tag.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComposedPose {
    /// Millimetres.
    pub position_mm: Vector3<f64>,
    pub rotation: Matrix3<f64>,
}

impl ComposedPose {
    pub fn identity() -> Self {
        Self {
            position_mm: Vector3::zeros(),
            rotation: Matrix3::identity(),
        }
    }
}

impl Default for ComposedPose {
    fn default() -> Self {
        Self::identity()
    }
}

#[derive(thiserror::Error, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComposeError {
    #[error(
        "graph and detections diverged: edge {from} -> {to} uses frame {frame}, \
         which has no detection of tag {missing}"
    )]
    GraphInconsistency {
        from: TagId,
        to: TagId,
        frame: usize,
        missing: TagId,
    },
}

/// Compose the chain `path` into a single pose relative to the origin.
///
/// Per edge `from -> to` seen in frame `f`:
/// - relative rotation is the rotation of `to` in `f`,
/// - relative translation is `t_to - t_from` in the camera frame of `f`,
/// - `position += R_acc * translation * 1000` and `R_acc = R_acc * rotation`.
///
/// The translation of each edge is taken as if it were already expressed in
/// the accumulated frame; the change of camera pose between frames is not
/// compensated.
pub fn compose(feed: &DetectionFeed, path: &TagPath) -> Result<ComposedPose, ComposeError> {
    let mut pose = ComposedPose::identity();
    for edge in path.edges() {
        let (rotation, translation) = edge_transform(feed, edge)?;
        pose.position_mm += pose.rotation * translation * MM_PER_M;
        pose.rotation *= rotation;
        trace!(
            "edge {} -> {} (frame {}): position {:?}",
            edge.from,
            edge.to,
            edge.frame,
            pose.position_mm.as_slice()
        );
    }
    Ok(pose)
}

fn edge_transform(
    feed: &DetectionFeed,
    edge: &PathEdge,
) -> Result<(Matrix3<f64>, Vector3<f64>), ComposeError> {
    let missing = |missing| ComposeError::GraphInconsistency {
        from: edge.from,
        to: edge.to,
        frame: edge.frame,
        missing,
    };
    let from = feed
        .detection(edge.frame, edge.from)
        .ok_or_else(|| missing(edge.from))?;
    let to = feed
        .detection(edge.frame, edge.to)
        .ok_or_else(|| missing(edge.to))?;

    Ok((to.rotation, to.translation - from.translation))
}
