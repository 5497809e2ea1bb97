use tagmap_core::{FeedIoError, TagId};
use tagmap_graph::GraphError;

/// Invalid run configuration. Reported before any graph work.
#[derive(thiserror::Error, Clone, Copy, Debug, PartialEq)]
pub enum ConfigError {
    #[error("tag size must be a positive number of metres, got {0}")]
    InvalidTagSize(f64),
    #[error("origin tag {0} is not present in any accepted detection")]
    OriginNotDetected(TagId),
}

/// Errors that abort a whole mapping run.
///
/// Per-tag failures (unreachable tags, graph inconsistencies) do not abort
/// the run; they are collected in [`crate::TagMap`].
#[derive(thiserror::Error, Debug)]
pub enum TagMapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

#[derive(thiserror::Error, Debug)]
pub enum TagMapIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Feed(#[from] FeedIoError),
}

/// Errors of a config-driven run.
#[derive(thiserror::Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Map(#[from] TagMapError),
    #[error(transparent)]
    Io(#[from] TagMapIoError),
}
