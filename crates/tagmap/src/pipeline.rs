//! End-to-end mapping: detections -> graph -> chains -> poses -> corners.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use tagmap_core::{DetectionFeed, TagId, MM_PER_M};
use tagmap_graph::{resolve, CovisibilityGraph, PathError};

use crate::compose::{compose, ComposeError};
use crate::corners::{project, TagCorners};
use crate::error::{ConfigError, TagMapError};

/// Distance of a tag's center from the origin tag's center.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TagDistance {
    pub id: TagId,
    /// Distance on the composed map.
    pub distance_mm: f64,
    /// Distance measured directly in the first frame that shows both tags.
    #[serde(default)]
    pub direct_mm: Option<f64>,
}

/// A tag dropped because its chain references detections missing from the
/// feed.
#[derive(thiserror::Error, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[error("tag {tag} not placed: {cause}")]
pub struct InconsistentTag {
    pub tag: TagId,
    pub cause: ComposeError,
}

/// Result of one mapping run for one origin tag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TagMap {
    pub origin: TagId,
    pub tag_size_mm: f64,
    /// Number of frames in the feed.
    pub frames: usize,
    /// Placed tags in ascending id order, origin included.
    pub tags: Vec<TagCorners>,
    /// Tags detected but with no co-observation chain to the origin.
    pub unreachable: Vec<PathError>,
    /// Tags whose chain referenced detections missing from the feed.
    pub inconsistent: Vec<InconsistentTag>,
    /// Connected groups of tags never seen together with the origin's group,
    /// ordered by smallest tag id.
    pub islands: Vec<Vec<TagId>>,
}

impl TagMap {
    pub fn get(&self, id: TagId) -> Option<&TagCorners> {
        self.tags.iter().find(|t| t.id == id)
    }

    /// Euclidean distance (mm) of `id`'s center from the origin.
    pub fn distance_from_origin(&self, id: TagId) -> Option<f64> {
        let [x, y, z] = self.get(id)?.center();
        Some((x * x + y * y + z * z).sqrt())
    }

    /// Distances from the origin for the requested tags, logged as they go.
    ///
    /// When `feed` has a frame showing both the origin and the tag, the
    /// distance measured in that frame is reported next to the map distance.
    /// Tags that were not placed are skipped with a warning.
    pub fn check_tags(&self, feed: &DetectionFeed, ids: &[TagId]) -> Vec<TagDistance> {
        ids.iter()
            .filter_map(|&id| match self.distance_from_origin(id) {
                Some(distance_mm) => {
                    let direct_mm = feed
                        .frames
                        .iter()
                        .find_map(|frame| frame.offset_between(self.origin, id))
                        .map(|offset| offset.distance_mm);
                    match direct_mm {
                        Some(direct) => info!(
                            "check tag {id}: {distance_mm:.1} mm from origin tag {} \
                             ({direct:.1} mm measured in a single frame)",
                            self.origin
                        ),
                        None => info!(
                            "check tag {id}: {distance_mm:.1} mm from origin tag {}",
                            self.origin
                        ),
                    }
                    Some(TagDistance {
                        id,
                        distance_mm,
                        direct_mm,
                    })
                }
                None => {
                    warn!("check tag {id} was not placed on the map");
                    None
                }
            })
            .collect()
    }
}

/// Places every detected tag in the frame of one origin tag.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TagMapper {
    origin: TagId,
    tag_size_mm: f64,
}

impl TagMapper {
    /// `tag_size_m` is the physical edge length of the tags, metres.
    pub fn new(origin: TagId, tag_size_m: f64) -> Result<Self, ConfigError> {
        if !(tag_size_m.is_finite() && tag_size_m > 0.0) {
            return Err(ConfigError::InvalidTagSize(tag_size_m));
        }
        Ok(Self {
            origin,
            tag_size_mm: tag_size_m * MM_PER_M,
        })
    }

    pub fn origin(&self) -> TagId {
        self.origin
    }

    pub fn tag_size_mm(&self) -> f64 {
        self.tag_size_mm
    }

    /// Build the co-visibility graph of `feed` and map every tag in it.
    pub fn map(&self, feed: &DetectionFeed) -> Result<TagMap, TagMapError> {
        self.check_origin(feed)?;
        let graph = CovisibilityGraph::build(&feed.frames);
        self.map_with_graph(feed, &graph)
    }

    /// Map every tag of a prebuilt `graph`, reading edge poses from `feed`.
    ///
    /// The same graph can be reused for several origins; `graph` must have
    /// been built from `feed`, otherwise the affected tags are reported as
    /// inconsistent.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            level = "info",
            skip(self, feed, graph),
            fields(origin = self.origin, frames = feed.len())
        )
    )]
    pub fn map_with_graph(
        &self,
        feed: &DetectionFeed,
        graph: &CovisibilityGraph,
    ) -> Result<TagMap, TagMapError> {
        self.check_origin(feed)?;
        let paths = resolve(graph, self.origin)?;

        let (connected, islands): (Vec<_>, Vec<_>) = graph
            .connected_components()
            .into_iter()
            .partition(|tags| tags.binary_search(&self.origin).is_ok());
        let linked = connected.first().map_or(0, |tags| tags.len().saturating_sub(1));
        info!(
            "origin tag {} is linked to {linked} tags; {} disconnected group(s)",
            self.origin,
            islands.len()
        );

        let mut map = TagMap {
            origin: self.origin,
            tag_size_mm: self.tag_size_mm,
            frames: feed.len(),
            tags: Vec::with_capacity(paths.len()),
            unreachable: Vec::new(),
            inconsistent: Vec::new(),
            islands,
        };

        for (tag, path) in paths.iter() {
            let path = match path {
                Ok(path) => path,
                Err(err) => {
                    map.unreachable.push(*err);
                    continue;
                }
            };
            match compose(feed, path) {
                Ok(pose) => map.tags.push(project(tag, path, &pose, self.tag_size_mm)),
                Err(cause) => {
                    let err = InconsistentTag { tag, cause };
                    warn!("{err}");
                    map.inconsistent.push(err);
                }
            }
        }

        info!(
            "placed {} of {} tags relative to origin {} ({} unreachable, {} inconsistent)",
            map.tags.len(),
            paths.len(),
            self.origin,
            map.unreachable.len(),
            map.inconsistent.len()
        );
        Ok(map)
    }

    fn check_origin(&self, feed: &DetectionFeed) -> Result<(), ConfigError> {
        if feed.contains_tag(self.origin) {
            Ok(())
        } else {
            Err(ConfigError::OriginNotDetected(self.origin))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix3, Vector3};
    use tagmap_core::{FrameDetections, TagDetection};

    fn frame(tags: &[(TagId, [f64; 3])]) -> FrameDetections {
        FrameDetections::new(
            tags.iter()
                .map(|&(id, t)| TagDetection::new(id, Matrix3::identity(), Vector3::from(t)))
                .collect(),
        )
    }

    #[test]
    fn rejects_non_positive_tag_size() {
        for size in [0.0, -0.04, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                TagMapper::new(1, size),
                Err(ConfigError::InvalidTagSize(_))
            ));
        }
        assert_eq!(42.0, TagMapper::new(1, 0.042).expect("valid").tag_size_mm());
    }

    #[test]
    fn origin_must_be_detected() {
        let feed = DetectionFeed::from_frames(vec![frame(&[(1, [0.0; 3]), (2, [0.1, 0.0, 0.0])])]);
        let err = TagMapper::new(7, 0.04).expect("valid").map(&feed).unwrap_err();
        assert!(matches!(
            err,
            TagMapError::Config(ConfigError::OriginNotDetected(7))
        ));
    }

    #[test]
    fn maps_reachable_and_reports_unreachable() {
        let feed = DetectionFeed::from_frames(vec![
            frame(&[(1, [0.0, 0.0, 1.0]), (2, [0.1, 0.0, 1.0])]),
            frame(&[(8, [0.0, 0.0, 1.0]), (9, [0.2, 0.0, 1.0])]),
        ]);
        let map = TagMapper::new(1, 0.02).expect("valid").map(&feed).expect("map");

        assert_eq!(vec![1, 2], map.tags.iter().map(|t| t.id).collect::<Vec<_>>());
        assert_eq!(
            vec![
                PathError::Unreachable { tag: 8, origin: 1 },
                PathError::Unreachable { tag: 9, origin: 1 }
            ],
            map.unreachable
        );
        assert!(map.inconsistent.is_empty());
        assert_eq!(vec![vec![8, 9]], map.islands);
        assert_eq!(Some(100.0), map.distance_from_origin(2));
        assert_eq!(Some(0.0), map.distance_from_origin(1));
        assert_eq!(None, map.distance_from_origin(8));
    }

    #[test]
    fn stale_graph_reports_inconsistency_per_tag() {
        let old = DetectionFeed::from_frames(vec![frame(&[
            (1, [0.0; 3]),
            (2, [0.1, 0.0, 0.0]),
            (3, [0.2, 0.0, 0.0]),
        ])]);
        let graph = CovisibilityGraph::build(&old.frames);
        let feed = DetectionFeed::from_frames(vec![frame(&[(1, [0.0; 3]), (2, [0.1, 0.0, 0.0])])]);

        let map = TagMapper::new(1, 0.02)
            .expect("valid")
            .map_with_graph(&feed, &graph)
            .expect("map");

        assert_eq!(vec![1, 2], map.tags.iter().map(|t| t.id).collect::<Vec<_>>());
        assert_eq!(
            vec![InconsistentTag {
                tag: 3,
                cause: ComposeError::GraphInconsistency {
                    from: 1,
                    to: 3,
                    frame: 0,
                    missing: 3
                }
            }],
            map.inconsistent
        );
    }

    #[test]
    fn broken_intermediate_edge_names_every_dropped_tag() {
        let old = DetectionFeed::from_frames(vec![
            frame(&[(1, [0.0; 3]), (3, [0.1, 0.0, 0.0])]),
            frame(&[(3, [0.0; 3]), (4, [0.1, 0.0, 0.0])]),
        ]);
        let graph = CovisibilityGraph::build(&old.frames);
        let feed = DetectionFeed::from_frames(vec![
            frame(&[(1, [0.0; 3])]),
            frame(&[(3, [0.0; 3]), (4, [0.1, 0.0, 0.0])]),
        ]);

        let map = TagMapper::new(1, 0.02)
            .expect("valid")
            .map_with_graph(&feed, &graph)
            .expect("map");

        assert_eq!(vec![1], map.tags.iter().map(|t| t.id).collect::<Vec<_>>());
        assert_eq!(
            vec![3, 4],
            map.inconsistent.iter().map(|e| e.tag).collect::<Vec<_>>()
        );
        let broken = ComposeError::GraphInconsistency {
            from: 1,
            to: 3,
            frame: 0,
            missing: 3,
        };
        assert!(map.inconsistent.iter().all(|e| e.cause == broken));
        assert!(map.inconsistent[1]
            .to_string()
            .starts_with("tag 4 not placed"));
    }

    #[test]
    fn check_tags_skips_unplaced() {
        let feed = DetectionFeed::from_frames(vec![frame(&[(1, [0.0; 3]), (2, [0.03, 0.04, 0.0])])]);
        let map = TagMapper::new(1, 0.01).expect("valid").map(&feed).expect("map");
        let checked = map.check_tags(&feed, &[2, 5]);
        assert_eq!(1, checked.len());
        assert_eq!(2, checked[0].id);
        assert_eq!(50.0, checked[0].distance_mm);
        assert_relative_eq!(50.0, checked[0].direct_mm.unwrap_or_default(), epsilon = 1e-9);
    }

    #[test]
    fn check_tags_without_shared_frame_has_no_direct_distance() {
        let feed = DetectionFeed::from_frames(vec![
            frame(&[(1, [0.0; 3]), (2, [0.1, 0.0, 0.0])]),
            frame(&[(2, [0.0; 3]), (3, [0.1, 0.0, 0.0])]),
        ]);
        let map = TagMapper::new(1, 0.01).expect("valid").map(&feed).expect("map");
        let checked = map.check_tags(&feed, &[3]);
        assert_eq!(1, checked.len());
        assert_eq!(200.0, checked[0].distance_mm);
        assert_eq!(None, checked[0].direct_mm);
    }
}
