//! Relative 3D layout of fiducial tags seen across a few video frames.
//!
//! Given, per sampled frame, the tags an external detector found and each
//! tag's pose relative to the camera, this crate:
//! - connects tags co-observed in the same frame into a multigraph,
//! - finds the shortest co-observation chain from every tag to an origin tag,
//! - composes the relative poses along that chain,
//! - and projects each tag's four corners into the origin tag's frame.
//!
//! ## Quickstart
//!
//! ```no_run
//! use tagmap::core::{DetectionFeed, IngestParams};
//! use tagmap::TagMapper;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (feed, rejected) = DetectionFeed::load_json("detections.json", &IngestParams::default())?;
//! let mapper = TagMapper::new(3, 0.042)?;
//! let map = mapper.map(&feed)?;
//! for tag in &map.tags {
//!     println!("tag {}: {:?}", tag.id, tag.corners);
//! }
//! println!("{} rejected, {} unreachable", rejected.len(), map.unreachable.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `tagmap::core`: detection records, ingestion, logger.
//! - `tagmap::graph`: co-visibility graph and shortest chains.
//! - [`compose()`] / [`project()`]: pose composition and corner projection.
//! - [`TagMapper`]: the whole pipeline; [`TagMapConfig`] / [`TagMapReport`]
//!   for JSON driven runs.

pub use tagmap_core as core;
pub use tagmap_graph as graph;

mod compose;
mod corners;
mod error;
mod io;
mod pipeline;

pub use compose::{compose, ComposeError, ComposedPose};
pub use corners::{local_square, project, TagCorners};
pub use error::{ConfigError, RunError, TagMapError, TagMapIoError};
pub use io::{load_positions, run_from_config, write_positions, TagMapConfig, TagMapReport};
pub use pipeline::{InconsistentTag, TagDistance, TagMap, TagMapper};

pub use tagmap_core::{TagDetection, TagId};
pub use tagmap_graph::{PathEdge, PathError, TagPath};
