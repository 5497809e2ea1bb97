//! Stderr logger for the `tagmap` tools.
//!
//! Only records from the `tagmap*` crates are printed, tagged with the
//! module they came from: `[  0.012s  WARN graph::path] tag 8 is not
//! connected to origin tag 3`. Rejected detections, unreachable tags and
//! broken chains are all logged at `warn`, so the logger also counts warnings
//! to let a front end summarise how many tags need attention.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

/// Crate prefixes whose records reach the terminal.
const CRATE_PREFIXES: [&str; 3] = ["tagmap_core", "tagmap_graph", "tagmap"];

struct MapLogger {
    level: LevelFilter,
    started: Instant,
    warnings: AtomicUsize,
}

/// `tagmap_graph::path` -> `graph::path`, `tagmap::pipeline` -> `pipeline`.
/// `None` for targets outside the workspace.
fn short_target(target: &str) -> Option<&str> {
    CRATE_PREFIXES.iter().copied().find_map(|prefix| {
        let rest = target.strip_prefix(prefix)?;
        if !(rest.is_empty() || rest.starts_with("::")) {
            return None;
        }
        // sub-crates keep their name so `core::feed` and `graph::path` stay apart
        Some(match target.strip_prefix("tagmap_") {
            Some(sub) => sub,
            None => rest.strip_prefix("::").unwrap_or(target),
        })
    })
}

impl Log for MapLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && short_target(metadata.target()).is_some()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if record.level() <= Level::Warn {
            self.warnings.fetch_add(1, Ordering::Relaxed);
        }

        let module = short_target(record.target()).unwrap_or_default();
        let elapsed = self.started.elapsed().as_secs_f64();
        let _ = writeln!(
            std::io::stderr().lock(),
            "[{elapsed:7.3}s {:>5} {module}] {}",
            record.level(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<MapLogger> = OnceLock::new();

/// Install the stderr logger for `tagmap*` targets at `level`.
///
/// Only the first call installs the logger; later calls are no-ops.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| MapLogger {
            level,
            started: Instant::now(),
            warnings: AtomicUsize::new(0),
        });
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// Warnings and errors printed so far by the logger from [`init_with_level`].
///
/// Zero when that logger is not installed.
pub fn warnings_logged() -> usize {
    LOGGER
        .get()
        .map_or(0, |logger| logger.warnings.load(Ordering::Relaxed))
}

/// Install a `tracing` subscriber on stderr.
///
/// `RUST_LOG` wins when set; otherwise the `tagmap*` crates log at `info`
/// and everything else at `warn`. With `json` the events are flattened JSON
/// lines. Span close events carry timings.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("warn,tagmap=info,tagmap_core=info,tagmap_graph=info")
    });
    let builder = fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
}
