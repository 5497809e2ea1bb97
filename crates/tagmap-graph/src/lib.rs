//! Co-visibility graph over fiducial tags and shortest co-observation chains.
//!
//! Nodes are tag ids; an undirected edge labeled with frame `f` means "both
//! tags were detected in frame `f`". Repeated co-observation in different
//! frames produces parallel edges. [`resolve`] finds, for every tag, the
//! minimum-hop chain of such edges from a chosen origin tag.

mod graph;
mod path;

pub use graph::{CovisibilityGraph, Edge};
pub use path::{resolve, GraphError, PathEdge, PathError, ResolvedPaths, TagPath};
