use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::MM_PER_M;

/// Identifier decoded from a fiducial marker.
pub type TagId = u32;

/// Pose of one tag as seen by the camera in one frame.
///
/// Only validated detections are represented by this type; see
/// [`crate::DetectionFeed`] for ingestion of raw detector output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TagDetection {
    pub tag_id: TagId,
    /// Tag-to-camera rotation (orthonormal, det = +1).
    pub rotation: Matrix3<f64>,
    /// Tag center in the camera frame, metres.
    pub translation: Vector3<f64>,
}

impl TagDetection {
    pub fn new(tag_id: TagId, rotation: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            tag_id,
            rotation,
            translation,
        }
    }
}

/// Offset between two tags observed in the same frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TagOffset {
    /// Euclidean distance between the tag centers, millimetres.
    pub distance_mm: f64,
    /// Per-axis offset `t_b - t_a` in the camera frame, millimetres.
    pub offset_mm: Vector3<f64>,
}

/// All tags detected in one sampled frame, at most one record per tag id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameDetections {
    pub tags: Vec<TagDetection>,
}

impl FrameDetections {
    pub fn new(tags: Vec<TagDetection>) -> Self {
        Self { tags }
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Find the detection of `tag_id` in this frame.
    pub fn get(&self, tag_id: TagId) -> Option<&TagDetection> {
        self.tags.iter().find(|t| t.tag_id == tag_id)
    }

    pub fn contains(&self, tag_id: TagId) -> bool {
        self.get(tag_id).is_some()
    }

    /// Tag ids in detection order.
    pub fn tag_ids(&self) -> impl Iterator<Item = TagId> + '_ {
        self.tags.iter().map(|t| t.tag_id)
    }

    /// Camera-frame offset from tag `a` to tag `b`.
    ///
    /// Returns `None` when either tag is missing from this frame.
    pub fn offset_between(&self, a: TagId, b: TagId) -> Option<TagOffset> {
        let ta = self.get(a)?;
        let tb = self.get(b)?;
        let offset_mm = (tb.translation - ta.translation) * MM_PER_M;
        Some(TagOffset {
            distance_mm: offset_mm.norm(),
            offset_mm,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn det(tag_id: TagId, t: [f64; 3]) -> TagDetection {
        TagDetection::new(tag_id, Matrix3::identity(), Vector3::from(t))
    }

    #[test]
    fn offset_between_tags_in_millimetres() {
        let frame = FrameDetections::new(vec![det(1, [0.1, 0.0, 0.5]), det(4, [0.13, 0.04, 0.5])]);

        let off = frame.offset_between(1, 4).expect("both tags present");
        assert_relative_eq!(off.offset_mm, Vector3::new(30.0, 40.0, 0.0), epsilon = 1e-9);
        assert_relative_eq!(off.distance_mm, 50.0, epsilon = 1e-9);

        let back = frame.offset_between(4, 1).expect("both tags present");
        assert_relative_eq!(back.offset_mm, -off.offset_mm, epsilon = 1e-9);
    }

    #[test]
    fn offset_requires_both_tags() {
        let frame = FrameDetections::new(vec![det(1, [0.0, 0.0, 1.0])]);
        assert!(frame.offset_between(1, 2).is_none());
        assert!(frame.offset_between(2, 1).is_none());
    }

    #[test]
    fn lookup_by_id() {
        let frame = FrameDetections::new(vec![det(7, [0.0; 3]), det(3, [1.0, 0.0, 0.0])]);
        assert_eq!(vec![7, 3], frame.tag_ids().collect::<Vec<_>>());
        assert!(frame.contains(3));
        assert!(!frame.contains(5));
        assert_eq!(1.0, frame.get(3).map(|d| d.translation.x).unwrap_or_default());
    }
}
