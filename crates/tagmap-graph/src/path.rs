use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tagmap_core::TagId;

use crate::graph::CovisibilityGraph;

/// One traversed co-visibility edge, directed away from the origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathEdge {
    pub from: TagId,
    pub to: TagId,
    /// Frame whose detections supply the relative pose of this edge.
    pub frame: usize,
}

/// Chain of co-observations leading from the origin tag to a target tag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagPath {
    /// The target *is* the origin; it has no edges and an identity pose.
    Origin,
    /// Non-empty edge list in composition order: the first edge starts at the
    /// origin, the last one ends at the target.
    Chain(Vec<PathEdge>),
}

impl TagPath {
    pub fn is_origin(&self) -> bool {
        matches!(self, TagPath::Origin)
    }

    /// Number of edges; zero for the origin.
    pub fn hops(&self) -> usize {
        self.edges().len()
    }

    /// Edges in composition order; empty for the origin.
    pub fn edges(&self) -> &[PathEdge] {
        match self {
            TagPath::Origin => &[],
            TagPath::Chain(edges) => edges,
        }
    }
}

#[derive(thiserror::Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraphError {
    #[error("origin tag {0} is not in the co-visibility graph")]
    UnknownOrigin(TagId),
}

#[derive(thiserror::Error, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathError {
    #[error("tag {tag} has no co-observation chain to origin tag {origin}")]
    Unreachable { tag: TagId, origin: TagId },
}

/// Shortest chains from one origin to every tag of a graph.
///
/// Valid only for the origin it was resolved for; a new origin needs a new
/// [`resolve`] call.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedPaths {
    origin: TagId,
    paths: BTreeMap<TagId, Result<TagPath, PathError>>,
}

impl ResolvedPaths {
    pub fn origin(&self) -> TagId {
        self.origin
    }

    /// Path for `tag`, or `None` if the tag is not part of the graph.
    pub fn get(&self, tag: TagId) -> Option<&Result<TagPath, PathError>> {
        self.paths.get(&tag)
    }

    /// All tags of the graph in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (TagId, &Result<TagPath, PathError>)> + '_ {
        self.paths.iter().map(|(&tag, path)| (tag, path))
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Tags without a chain to the origin, ascending.
    pub fn unreachable(&self) -> Vec<TagId> {
        self.paths
            .iter()
            .filter(|(_, p)| p.is_err())
            .map(|(&tag, _)| tag)
            .collect()
    }
}

/// Node a tag was first reached from, and the frame of that edge.
#[derive(Clone, Copy, Debug)]
struct Pred {
    node: usize,
    frame: usize,
}

/// Minimum-hop chain from `origin` to every tag of `graph`.
///
/// Dijkstra with unit weights and a lazily pruned min-heap keyed by
/// `(distance, tag id)`. Among equally short chains the one whose
/// predecessor has the smaller tag id wins; among parallel edges the
/// earliest frame wins.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(level = "info", skip(graph), fields(tags = graph.tag_count()))
)]
pub fn resolve(graph: &CovisibilityGraph, origin: TagId) -> Result<ResolvedPaths, GraphError> {
    let source = graph.node(origin).ok_or(GraphError::UnknownOrigin(origin))?;

    let n = graph.tag_count();
    let mut dist = vec![usize::MAX; n];
    let mut pred: Vec<Option<Pred>> = vec![None; n];
    let mut heap = BinaryHeap::new();

    dist[source] = 0;
    heap.push(Reverse((0_usize, origin, source)));

    while let Some(Reverse((d, _, node))) = heap.pop() {
        if d > dist[node] {
            continue; // stale
        }
        for edge in graph.edges(node) {
            let next = d + 1;
            if next < dist[edge.to] {
                dist[edge.to] = next;
                pred[edge.to] = Some(Pred {
                    node,
                    frame: edge.frame,
                });
                heap.push(Reverse((next, graph.tag(edge.to), edge.to)));
            }
        }
    }

    let mut paths = BTreeMap::new();
    for target in 0..n {
        let tag = graph.tag(target);
        let path = if target == source {
            Ok(TagPath::Origin)
        } else if dist[target] == usize::MAX {
            warn!("tag {tag} is not connected to origin tag {origin}");
            Err(PathError::Unreachable { tag, origin })
        } else {
            let chain = reconstruct(graph, &pred, target);
            debug!("tag {tag}: {} hop(s) to origin {origin}", chain.len());
            Ok(TagPath::Chain(chain))
        };
        paths.insert(tag, path);
    }

    Ok(ResolvedPaths { origin, paths })
}

/// Walk predecessors back to the source, then flip into origin -> target order.
fn reconstruct(graph: &CovisibilityGraph, pred: &[Option<Pred>], target: usize) -> Vec<PathEdge> {
    let mut chain = Vec::new();
    let mut current = target;
    while let Some(back) = pred[current] {
        chain.push(PathEdge {
            from: graph.tag(back.node),
            to: graph.tag(current),
            frame: back.frame,
        });
        current = back.node;
    }
    chain.reverse();
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix3, Vector3};
    use tagmap_core::{FrameDetections, TagDetection};

    fn frame(ids: &[TagId]) -> FrameDetections {
        FrameDetections::new(
            ids.iter()
                .map(|&id| TagDetection::new(id, Matrix3::identity(), Vector3::zeros()))
                .collect(),
        )
    }

    fn graph(frames: &[&[TagId]]) -> CovisibilityGraph {
        let frames: Vec<FrameDetections> = frames.iter().map(|ids| frame(ids)).collect();
        CovisibilityGraph::build(&frames)
    }

    fn edge(from: TagId, to: TagId, frame: usize) -> PathEdge {
        PathEdge { from, to, frame }
    }

    fn chain(paths: &ResolvedPaths, tag: TagId) -> Vec<PathEdge> {
        match paths.get(tag) {
            Some(Ok(TagPath::Chain(edges))) => edges.clone(),
            other => panic!("expected chain for tag {tag}, got {other:?}"),
        }
    }

    #[test]
    fn origin_resolves_to_origin_variant() {
        let g = graph(&[&[1, 2]]);
        let paths = resolve(&g, 1).expect("origin in graph");
        assert_eq!(Some(&Ok(TagPath::Origin)), paths.get(1));
        assert_eq!(0, TagPath::Origin.hops());
        assert_eq!(1, paths.origin());
    }

    #[test]
    fn two_hop_chain_goes_through_intermediate() {
        let g = graph(&[&[1, 2], &[2, 3]]);
        let paths = resolve(&g, 1).expect("origin in graph");

        assert_eq!(vec![edge(1, 2, 0)], chain(&paths, 2));
        assert_eq!(vec![edge(1, 2, 0), edge(2, 3, 1)], chain(&paths, 3));
        assert_eq!(3, paths.len());
    }

    #[test]
    fn chain_is_ordered_from_origin_to_target() {
        let g = graph(&[&[3, 4], &[1, 2], &[2, 3]]);
        let paths = resolve(&g, 1).expect("origin in graph");
        let c = chain(&paths, 4);

        assert_eq!(vec![edge(1, 2, 1), edge(2, 3, 2), edge(3, 4, 0)], c);
        for pair in c.windows(2) {
            assert_eq!(pair[0].to, pair[1].from);
        }
    }

    #[test]
    fn prefers_direct_edge_over_longer_chain() {
        let g = graph(&[&[1, 2], &[2, 3], &[3, 4], &[1, 4]]);
        let paths = resolve(&g, 1).expect("origin in graph");
        assert_eq!(vec![edge(1, 4, 3)], chain(&paths, 4));
    }

    #[test]
    fn equal_length_tie_breaks_on_smaller_intermediate() {
        // 1-5-9 is discovered first, 1-3-9 has the smaller intermediate.
        let g = graph(&[&[1, 5], &[5, 9], &[1, 3], &[3, 9]]);

        let first = resolve(&g, 1).expect("origin in graph");
        assert_eq!(vec![edge(1, 3, 2), edge(3, 9, 3)], chain(&first, 9));

        for _ in 0..5 {
            assert_eq!(first, resolve(&g, 1).expect("origin in graph"));
        }
    }

    #[test]
    fn parallel_edges_pick_earliest_frame() {
        let g = graph(&[&[7], &[1, 2], &[2, 1], &[1, 2, 7]]);
        let paths = resolve(&g, 1).expect("origin in graph");
        assert_eq!(vec![edge(1, 2, 1)], chain(&paths, 2));
        assert_eq!(vec![edge(1, 7, 3)], chain(&paths, 7));
    }

    #[test]
    fn disconnected_tag_is_unreachable() {
        let g = graph(&[&[1, 2], &[3, 4], &[5]]);
        let paths = resolve(&g, 1).expect("origin in graph");

        assert_eq!(
            Some(&Err(PathError::Unreachable { tag: 3, origin: 1 })),
            paths.get(3)
        );
        assert_eq!(vec![3, 4, 5], paths.unreachable());
        assert!(paths.get(2).is_some_and(|p| p.is_ok()));
    }

    #[test]
    fn unknown_origin_is_an_error() {
        let g = graph(&[&[1, 2]]);
        assert_eq!(Err(GraphError::UnknownOrigin(8)), resolve(&g, 8).map(|_| ()));
    }

    #[test]
    fn changing_origin_changes_every_chain() {
        let g = graph(&[&[1, 2], &[2, 3]]);
        let from_3 = resolve(&g, 3).expect("origin in graph");
        assert_eq!(Some(&Ok(TagPath::Origin)), from_3.get(3));
        assert_eq!(vec![edge(3, 2, 1), edge(2, 1, 0)], chain(&from_3, 1));
    }

    #[test]
    fn path_serializes_as_tagged_variant() {
        let json = serde_json::to_string(&TagPath::Chain(vec![edge(1, 2, 0)])).expect("json");
        assert_eq!(r#"{"Chain":[{"from":1,"to":2,"frame":0}]}"#, json);
        let origin = serde_json::to_string(&TagPath::Origin).expect("json");
        assert_eq!(r#""Origin""#, origin);
    }
}
