//! Ingestion of raw detector output into a validated [`DetectionFeed`].

use std::collections::BTreeSet;
use std::{fs, path::Path};

use log::{debug, warn};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::detection::{FrameDetections, TagDetection, TagId};
use crate::rotation::{check_rotation, RotationDefect};

#[derive(thiserror::Error, Debug)]
pub enum FeedIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Translation as emitted by detector bindings: either a flat `[x, y, z]`
/// or a `3×1` column `[[x], [y], [z]]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTranslation {
    Flat([f64; 3]),
    Column([[f64; 1]; 3]),
}

impl RawTranslation {
    pub fn to_vector(self) -> Vector3<f64> {
        match self {
            RawTranslation::Flat([x, y, z]) => Vector3::new(x, y, z),
            RawTranslation::Column([[x], [y], [z]]) => Vector3::new(x, y, z),
        }
    }
}

/// One detector record before validation.
///
/// `rotation` is row-major. Either pose component may be missing when the
/// detector ran without pose estimation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub tag_id: TagId,
    #[serde(default)]
    pub rotation: Option<[[f64; 3]; 3]>,
    #[serde(default)]
    pub translation: Option<RawTranslation>,
}

#[derive(thiserror::Error, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MalformedReason {
    #[error("missing rotation")]
    MissingRotation,
    #[error("missing translation")]
    MissingTranslation,
    #[error("translation has non-finite entries")]
    NonFiniteTranslation,
    #[error(transparent)]
    InvalidRotation(#[from] RotationDefect),
    #[error("tag already detected in this frame")]
    DuplicateTag,
}

/// A raw detection rejected at ingestion. It never enters the graph.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[error("malformed detection of tag {tag_id} in frame {frame}: {reason}")]
pub struct MalformedDetection {
    pub frame: usize,
    pub tag_id: TagId,
    pub reason: MalformedReason,
}

fn default_rotation_tolerance() -> f64 {
    1e-3
}

/// Validation settings for raw detections.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestParams {
    /// Max abs deviation allowed in `R^T R = I` and `det R = 1`.
    #[serde(default = "default_rotation_tolerance")]
    pub rotation_tolerance: f64,
}

impl Default for IngestParams {
    fn default() -> Self {
        Self {
            rotation_tolerance: default_rotation_tolerance(),
        }
    }
}

/// Validated detections, one entry per sampled frame.
///
/// The position of a frame in the feed is its frame index.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionFeed {
    pub frames: Vec<FrameDetections>,
}

impl DetectionFeed {
    /// Wrap already validated frames.
    pub fn from_frames(frames: Vec<FrameDetections>) -> Self {
        Self { frames }
    }

    /// Validate raw detector output frame by frame.
    ///
    /// Rejected records are returned alongside the feed; the frame they came
    /// from keeps its remaining valid detections.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "info", skip(raw, params), fields(frames = raw.len()))
    )]
    pub fn ingest(
        raw: Vec<Vec<RawDetection>>,
        params: &IngestParams,
    ) -> (Self, Vec<MalformedDetection>) {
        let mut frames = Vec::with_capacity(raw.len());
        let mut rejected = Vec::new();

        for (frame, records) in raw.into_iter().enumerate() {
            let mut tags: Vec<TagDetection> = Vec::with_capacity(records.len());
            for rec in records {
                let tag_id = rec.tag_id;
                let result = if tags.iter().any(|t| t.tag_id == tag_id) {
                    Err(MalformedReason::DuplicateTag)
                } else {
                    validate(rec, params)
                };
                match result {
                    Ok(det) => tags.push(det),
                    Err(reason) => {
                        let err = MalformedDetection {
                            frame,
                            tag_id,
                            reason,
                        };
                        warn!("{err}");
                        rejected.push(err);
                    }
                }
            }
            debug!("frame {frame}: {} valid detections", tags.len());
            frames.push(FrameDetections::new(tags));
        }

        (Self { frames }, rejected)
    }

    /// Load a JSON array of frames of [`RawDetection`] and validate it.
    pub fn load_json(
        path: impl AsRef<Path>,
        params: &IngestParams,
    ) -> Result<(Self, Vec<MalformedDetection>), FeedIoError> {
        let raw = fs::read_to_string(path)?;
        let frames: Vec<Vec<RawDetection>> = serde_json::from_str(&raw)?;
        Ok(Self::ingest(frames, params))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame(&self, index: usize) -> Option<&FrameDetections> {
        self.frames.get(index)
    }

    /// Detection of `tag_id` in frame `index`, if both exist.
    pub fn detection(&self, index: usize, tag_id: TagId) -> Option<&TagDetection> {
        self.frame(index)?.get(tag_id)
    }

    /// True if `tag_id` was detected in at least one frame.
    pub fn contains_tag(&self, tag_id: TagId) -> bool {
        self.frames.iter().any(|f| f.contains(tag_id))
    }

    /// Every tag id detected anywhere in the feed, ascending.
    pub fn tag_ids(&self) -> BTreeSet<TagId> {
        self.frames.iter().flat_map(|f| f.tag_ids()).collect()
    }
}

fn validate(rec: RawDetection, params: &IngestParams) -> Result<TagDetection, MalformedReason> {
    let rows = rec.rotation.ok_or(MalformedReason::MissingRotation)?;
    let translation = rec
        .translation
        .ok_or(MalformedReason::MissingTranslation)?
        .to_vector();

    if translation.iter().any(|v| !v.is_finite()) {
        return Err(MalformedReason::NonFiniteTranslation);
    }

    let rotation = Matrix3::from_fn(|r, c| rows[r][c]);
    check_rotation(&rotation, params.rotation_tolerance)?;

    Ok(TagDetection::new(rec.tag_id, rotation, translation))
}
