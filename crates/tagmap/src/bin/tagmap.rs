use std::{error::Error, path::PathBuf};

use clap::Parser;
#[cfg(not(feature = "tracing"))]
use log::LevelFilter;
use tagmap::{run_from_config, TagId, TagMapConfig};

#[cfg(not(feature = "tracing"))]
use tagmap::core::{init_with_level, warnings_logged};

#[cfg(feature = "tracing")]
use tagmap::core::init_tracing;

/// Place fiducial tags in the coordinate frame of an origin tag.
#[derive(Debug, Parser)]
#[command(author, version, about = "Reconstruct a tag map from per-frame tag detections")]
struct Args {
    /// Path to a JSON TagMapConfig. The flags below override its fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON file with one array of tag detections per frame.
    #[arg(long)]
    detections: Option<String>,

    /// Tag whose frame every position is expressed in.
    #[arg(long)]
    origin: Option<TagId>,

    /// Tag edge length in metres.
    #[arg(long)]
    tag_size: Option<f64>,

    /// Where to write the `{id, corners}` records.
    #[arg(long)]
    output: Option<String>,

    /// Optional path for the full run report.
    #[arg(long)]
    report: Option<String>,

    /// Log the distance of this tag from the origin (repeatable).
    #[arg(long = "check-tag")]
    check_tags: Vec<TagId>,

    /// Log level for the stderr logger.
    #[cfg(not(feature = "tracing"))]
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,

    /// Emit JSON log lines.
    #[cfg(feature = "tracing")]
    #[arg(long)]
    json_logs: bool,
}

fn build_config(args: &Args) -> Result<TagMapConfig, Box<dyn Error>> {
    let mut cfg = match &args.config {
        Some(path) => TagMapConfig::load_json(path)?,
        None => TagMapConfig::new(
            args.detections
                .clone()
                .ok_or("--detections is required without --config")?,
            args.origin.ok_or("--origin is required without --config")?,
            args.tag_size.ok_or("--tag-size is required without --config")?,
        ),
    };

    if let Some(detections) = &args.detections {
        cfg.detections_path = detections.clone();
    }
    if let Some(origin) = args.origin {
        cfg.origin_tag = origin;
    }
    if let Some(tag_size) = args.tag_size {
        cfg.tag_size_m = tag_size;
    }
    if let Some(output) = &args.output {
        cfg.output_path = output.clone();
    }
    if let Some(report) = &args.report {
        cfg.report_path = Some(report.clone());
    }
    if !args.check_tags.is_empty() {
        cfg.check_tags = args.check_tags.clone();
    }
    Ok(cfg)
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    #[cfg(not(feature = "tracing"))]
    init_with_level(args.log_level)?;

    #[cfg(feature = "tracing")]
    init_tracing(args.json_logs);

    let cfg = build_config(&args)?;
    let report = run_from_config(&cfg)?;

    println!(
        "placed {} tags relative to origin {}, wrote {}",
        report.tags.len(),
        report.origin_tag,
        cfg.output_path().display()
    );
    if !report.unreachable.is_empty() {
        let ids: Vec<String> = report
            .unreachable
            .iter()
            .map(|e| match e {
                tagmap::PathError::Unreachable { tag, .. } => tag.to_string(),
            })
            .collect();
        println!("unreachable tags: {}", ids.join(", "));
    }
    for island in &report.islands {
        let ids: Vec<String> = island.iter().map(ToString::to_string).collect();
        println!("never seen with the origin's group: {}", ids.join(", "));
    }

    #[cfg(not(feature = "tracing"))]
    match warnings_logged() {
        0 => {}
        n => eprintln!("{n} warning(s) logged; see above"),
    }
    Ok(())
}
