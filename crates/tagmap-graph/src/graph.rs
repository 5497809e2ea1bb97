use std::collections::{BTreeMap, HashMap};

use log::info;
use tagmap_core::{FrameDetections, TagId};

/// Half of an undirected co-visibility edge, stored in the adjacency list of
/// its other endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    /// Dense node index of the neighbouring tag.
    pub to: usize,
    /// Frame in which both tags were detected.
    pub frame: usize,
}

/// Undirected multigraph of tags co-observed in the same frame.
///
/// Tag ids are remapped to dense node indices in first-seen order. The graph
/// is built once by [`CovisibilityGraph::build`] and is read-only afterwards.
#[derive(Clone, Debug, Default)]
pub struct CovisibilityGraph {
    tags: Vec<TagId>,
    index: HashMap<TagId, usize>,
    adjacency: Vec<Vec<Edge>>,
    edge_count: usize,
    frame_count: usize,
}

impl CovisibilityGraph {
    /// Build the graph from per-frame detections; frame `i` of `frames` labels
    /// its edges with index `i`.
    ///
    /// A frame with `k` tags contributes `k * (k - 1) / 2` edges. Tags seen
    /// only alone still become nodes, without edges.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "info", skip(frames), fields(frames = frames.len()))
    )]
    pub fn build(frames: &[FrameDetections]) -> Self {
        let mut graph = Self::default();
        for (frame_index, frame) in frames.iter().enumerate() {
            graph.add_frame(frame_index, frame);
        }
        info!(
            "co-visibility graph: {} tags, {} edges over {} frames",
            graph.tag_count(),
            graph.edge_count(),
            graph.frame_count
        );
        graph
    }

    fn add_frame(&mut self, frame_index: usize, frame: &FrameDetections) {
        let nodes: Vec<usize> = frame.tag_ids().map(|id| self.intern(id)).collect();

        for (i, &a) in nodes.iter().enumerate() {
            for &b in &nodes[i + 1..] {
                if a == b {
                    continue;
                }
                self.adjacency[a].push(Edge {
                    to: b,
                    frame: frame_index,
                });
                self.adjacency[b].push(Edge {
                    to: a,
                    frame: frame_index,
                });
                self.edge_count += 1;
            }
        }
        self.frame_count = self.frame_count.max(frame_index + 1);
    }

    fn intern(&mut self, tag: TagId) -> usize {
        if let Some(&node) = self.index.get(&tag) {
            return node;
        }
        let node = self.tags.len();
        self.tags.push(tag);
        self.index.insert(tag, node);
        self.adjacency.push(Vec::new());
        node
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    /// Number of undirected edges, parallel edges counted separately.
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn contains(&self, tag: TagId) -> bool {
        self.index.contains_key(&tag)
    }

    /// All tag ids in the graph, ascending.
    pub fn tags(&self) -> Vec<TagId> {
        let mut tags = self.tags.clone();
        tags.sort_unstable();
        tags
    }

    /// Dense node index of `tag`.
    pub fn node(&self, tag: TagId) -> Option<usize> {
        self.index.get(&tag).copied()
    }

    /// Tag id of dense node `node`.
    ///
    /// Panics if `node` is out of range.
    pub fn tag(&self, node: usize) -> TagId {
        self.tags[node]
    }

    /// Adjacency list of dense node `node`, in insertion (frame) order.
    pub fn edges(&self, node: usize) -> &[Edge] {
        &self.adjacency[node]
    }

    /// `(neighbour tag, frame)` for every edge incident to `tag`.
    pub fn neighbors(&self, tag: TagId) -> impl Iterator<Item = (TagId, usize)> + '_ {
        self.node(tag)
            .map(|n| self.adjacency[n].as_slice())
            .unwrap_or_default()
            .iter()
            .map(|e| (self.tags[e.to], e.frame))
    }

    /// Connected components as sorted tag-id lists, ordered by smallest tag id.
    ///
    /// Tags in different components can never be placed relative to each
    /// other.
    pub fn connected_components(&self) -> Vec<Vec<TagId>> {
        let mut roots: Vec<usize> = (0..self.tags.len()).collect();
        for (a, edges) in self.adjacency.iter().enumerate() {
            // each undirected edge is stored twice; merge it once
            for edge in edges.iter().filter(|e| e.to > a) {
                let (ra, rb) = (find_root(&mut roots, a), find_root(&mut roots, edge.to));
                if ra != rb {
                    roots[ra.max(rb)] = ra.min(rb);
                }
            }
        }

        let mut by_root: BTreeMap<usize, Vec<TagId>> = BTreeMap::new();
        for node in 0..self.tags.len() {
            let root = find_root(&mut roots, node);
            by_root.entry(root).or_default().push(self.tags[node]);
        }

        let mut components: Vec<Vec<TagId>> = by_root
            .into_values()
            .map(|mut tags| {
                tags.sort_unstable();
                tags
            })
            .collect();
        components.sort_unstable_by_key(|tags| tags[0]);
        components
    }
}

/// Union-find lookup with path halving.
fn find_root(roots: &mut [usize], mut node: usize) -> usize {
    while roots[node] != node {
        roots[node] = roots[roots[node]];
        node = roots[node];
    }
    node
}
