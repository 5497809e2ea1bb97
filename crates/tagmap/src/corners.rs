use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tagmap_core::TagId;
use tagmap_graph::TagPath;

use crate::compose::ComposedPose;

/// Four corners of one tag in the origin tag's frame, millimetres rounded to
/// 0.1 mm, ordered top-left, top-right, bottom-right, bottom-left.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TagCorners {
    pub id: TagId,
    pub corners: [[f64; 3]; 4],
}

impl TagCorners {
    /// Mean of the four corners.
    pub fn center(&self) -> [f64; 3] {
        let mut c = [0.0; 3];
        for corner in &self.corners {
            for (acc, v) in c.iter_mut().zip(corner) {
                *acc += v / 4.0;
            }
        }
        c
    }
}

/// Corners of a tag of side `tag_size_mm` centered in its own plane (z = 0),
/// in TL, TR, BR, BL order.
pub fn local_square(tag_size_mm: f64) -> [Vector3<f64>; 4] {
    let h = tag_size_mm / 2.0;
    [
        Vector3::new(-h, h, 0.0),
        Vector3::new(h, h, 0.0),
        Vector3::new(h, -h, 0.0),
        Vector3::new(-h, -h, 0.0),
    ]
}

/// Place the local square of `tag_id` in the origin frame.
///
/// The origin keeps its local square as is. Every other tag gets
/// `R * corner + p` from `pose`, then the X axis is negated to go from the
/// detector's camera-frame handedness to the map's.
pub fn project(tag_id: TagId, path: &TagPath, pose: &ComposedPose, tag_size_mm: f64) -> TagCorners {
    let local = local_square(tag_size_mm);
    let placed = local.map(|c| match path {
        TagPath::Origin => c,
        TagPath::Chain(_) => {
            let g = pose.rotation * c + pose.position_mm;
            Vector3::new(-g.x, g.y, g.z)
        }
    });

    TagCorners {
        id: tag_id,
        corners: placed.map(|p| [round_01(p.x), round_01(p.y), round_01(p.z)]),
    }
}

/// Round to one decimal; never returns negative zero.
fn round_01(v: f64) -> f64 {
    let r = (v * 10.0).round() / 10.0;
    if r == 0.0 {
        0.0
    } else {
        r
    }
}
