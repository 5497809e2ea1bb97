//! Core types for tag-map reconstruction.
//!
//! This crate holds the per-frame detection records produced by an external
//! fiducial pose detector, plus the ingestion step that rejects malformed
//! records before they can reach the co-visibility graph. It does *not*
//! depend on any concrete detector or image type.

mod detection;
mod feed;
mod logger;
mod rotation;

pub use detection::{FrameDetections, TagDetection, TagId, TagOffset};
pub use feed::{
    DetectionFeed, FeedIoError, IngestParams, MalformedDetection, MalformedReason, RawDetection,
    RawTranslation,
};
pub use rotation::{check_rotation, RotationDefect};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, warnings_logged};

/// Millimetres per metre; detector translations are metres, map output is millimetres.
pub const MM_PER_M: f64 = 1000.0;
