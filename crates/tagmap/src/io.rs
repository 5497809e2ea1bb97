//! JSON configuration, position output and run report.

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::info;
use serde::{Deserialize, Serialize};
use tagmap_core::{DetectionFeed, IngestParams, MalformedDetection, TagId};
use tagmap_graph::PathError;

use crate::corners::TagCorners;
use crate::error::{ConfigError, RunError, TagMapIoError};
use crate::pipeline::{InconsistentTag, TagDistance, TagMap, TagMapper};

fn default_output_path() -> String {
    "tag_positions.json".to_string()
}

/// Configuration of one mapping run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagMapConfig {
    /// JSON file with one array of raw detections per sampled frame.
    pub detections_path: String,
    pub origin_tag: TagId,
    /// Physical tag edge length, metres.
    pub tag_size_m: f64,
    #[serde(default = "default_output_path")]
    pub output_path: String,
    #[serde(default)]
    pub report_path: Option<String>,
    /// Tags whose distance from the origin is logged and reported.
    #[serde(default)]
    pub check_tags: Vec<TagId>,
    #[serde(default)]
    pub ingest: IngestParams,
}

impl TagMapConfig {
    pub fn new(detections_path: impl Into<String>, origin_tag: TagId, tag_size_m: f64) -> Self {
        Self {
            detections_path: detections_path.into(),
            origin_tag,
            tag_size_m,
            output_path: default_output_path(),
            report_path: None,
            check_tags: Vec::new(),
            ingest: IngestParams::default(),
        }
    }

    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, TagMapIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), TagMapIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(&self.output_path)
    }

    pub fn report_path(&self) -> Option<PathBuf> {
        self.report_path.as_ref().map(PathBuf::from)
    }

    /// Validate origin/size and build the mapper.
    pub fn build_mapper(&self) -> Result<TagMapper, ConfigError> {
        TagMapper::new(self.origin_tag, self.tag_size_m)
    }
}

/// Write the placed tags as a JSON array of `{id, corners}` records.
pub fn write_positions(path: impl AsRef<Path>, tags: &[TagCorners]) -> Result<(), TagMapIoError> {
    write_json_file(path.as_ref(), &serde_json::to_string_pretty(tags)?)
}

/// Read back a positions file written by [`write_positions`].
pub fn load_positions(path: impl AsRef<Path>) -> Result<Vec<TagCorners>, TagMapIoError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Everything that happened in one run, including per-tag failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagMapReport {
    pub detections_path: String,
    pub origin_tag: TagId,
    pub tag_size_mm: f64,
    pub frames: usize,
    pub tags: Vec<TagCorners>,
    #[serde(default)]
    pub unreachable: Vec<PathError>,
    #[serde(default)]
    pub inconsistent: Vec<InconsistentTag>,
    #[serde(default)]
    pub islands: Vec<Vec<TagId>>,
    #[serde(default)]
    pub rejected: Vec<MalformedDetection>,
    #[serde(default)]
    pub checked: Vec<TagDistance>,
}

impl TagMapReport {
    pub fn new(
        cfg: &TagMapConfig,
        map: TagMap,
        rejected: Vec<MalformedDetection>,
        checked: Vec<TagDistance>,
    ) -> Self {
        Self {
            detections_path: cfg.detections_path.clone(),
            origin_tag: map.origin,
            tag_size_mm: map.tag_size_mm,
            frames: map.frames,
            tags: map.tags,
            unreachable: map.unreachable,
            inconsistent: map.inconsistent,
            islands: map.islands,
            rejected,
            checked,
        }
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, TagMapIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), TagMapIoError> {
        write_json_file(path.as_ref(), &serde_json::to_string_pretty(self)?)
    }
}

/// Run the whole pipeline described by `cfg`.
///
/// Writes the positions file and, if configured, the report. Tag size is
/// validated before the detections are read.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(level = "info", skip(cfg), fields(origin = cfg.origin_tag))
)]
pub fn run_from_config(cfg: &TagMapConfig) -> Result<TagMapReport, RunError> {
    let mapper = cfg.build_mapper()?;

    let (feed, rejected) = DetectionFeed::load_json(&cfg.detections_path, &cfg.ingest)
        .map_err(TagMapIoError::from)?;
    info!(
        "loaded {} frames from {} ({} detections rejected)",
        feed.len(),
        cfg.detections_path,
        rejected.len()
    );

    let map = mapper.map(&feed)?;
    let checked = map.check_tags(&feed, &cfg.check_tags);

    let out = cfg.output_path();
    write_positions(&out, &map.tags)?;
    info!("wrote {} tag positions to {}", map.tags.len(), out.display());

    let report = TagMapReport::new(cfg, map, rejected, checked);
    if let Some(path) = cfg.report_path() {
        report.write_json(&path)?;
        info!("wrote report to {}", path.display());
    }
    Ok(report)
}

fn write_json_file(path: &Path, json: &str) -> Result<(), TagMapIoError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, json)?;
    Ok(())
}
