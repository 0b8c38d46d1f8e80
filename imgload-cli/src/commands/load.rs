//! `imgload load` - load one or more images through the dispatcher.
//!
//! All sources are requested at once so identical requests coalesce, then
//! each outcome is printed as it arrives along with the time it took.

use clap::{Args, ValueEnum};
use futures::stream::{FuturesUnordered, StreamExt};
use imgload::request::{Gravity, MemoryPolicy, Priority, Request};
use imgload::{LoadResult, LoaderError};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Request priority for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum PriorityArg {
    Low,
    Normal,
    High,
}

impl From<PriorityArg> for Priority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::Low => Priority::Low,
            PriorityArg::Normal => Priority::Normal,
            PriorityArg::High => Priority::High,
        }
    }
}

#[derive(Debug, Args)]
pub struct LoadArgs {
    /// Image sources: URIs (https://, file://, asset:///) or local paths
    #[arg(required = true)]
    pub sources: Vec<String>,

    /// Resize to WIDTHxHEIGHT (a 0 dimension keeps the aspect ratio)
    #[arg(long, value_parser = parse_dimensions)]
    pub resize: Option<(u32, u32)>,

    /// Crop to fill the resize box
    #[arg(long, requires = "resize", conflicts_with = "center_inside")]
    pub center_crop: bool,

    /// Scale to fit inside the resize box
    #[arg(long, requires = "resize")]
    pub center_inside: bool,

    /// Rotate by this many degrees
    #[arg(long)]
    pub rotate: Option<f32>,

    #[arg(long, value_enum, default_value = "normal")]
    pub priority: PriorityArg,

    /// Tag every request (shows up in lifecycle logs)
    #[arg(long)]
    pub tag: Option<String>,

    /// Neither read nor write the memory cache
    #[arg(long)]
    pub skip_memory_cache: bool,

    /// Load everything this many times; later rounds hit the memory cache
    #[arg(long, default_value = "1")]
    pub repeat: u32,

    /// Directory to save decoded results as PNG
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Parses `WIDTHxHEIGHT`.
fn parse_dimensions(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .to_ascii_lowercase()
        .split_once('x')
        .map(|(w, h)| (w.trim().to_string(), h.trim().to_string()))
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", value))?;

    let width: u32 = width
        .parse()
        .map_err(|_| format!("invalid width in '{}'", value))?;
    let height: u32 = height
        .parse()
        .map_err(|_| format!("invalid height in '{}'", value))?;

    if width == 0 && height == 0 {
        return Err("at least one dimension must be non-zero".to_string());
    }
    Ok((width, height))
}

/// Local paths become absolute `file://` URIs; anything with a scheme is
/// passed through.
fn source_uri(source: &str) -> String {
    if source.contains("://") {
        return source.to_string();
    }
    let path = Path::new(source);
    let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    format!("file://{}", absolute.display())
}

fn build_request(args: &LoadArgs, source: &str) -> Result<Request, LoaderError> {
    let mut builder = Request::uri(source_uri(source)).priority(args.priority.into());

    if let Some((width, height)) = args.resize {
        builder = builder.resize(width, height);
    }
    if args.center_crop {
        builder = builder.center_crop(Gravity::Center);
    }
    if args.center_inside {
        builder = builder.center_inside();
    }
    if let Some(degrees) = args.rotate {
        builder = builder.rotate(degrees);
    }
    if let Some(tag) = &args.tag {
        builder = builder.tag(tag.clone());
    }
    if args.skip_memory_cache {
        builder = builder.memory_policy(MemoryPolicy::NO_CACHE | MemoryPolicy::NO_STORE);
    }

    builder.build()
}

fn output_path(dir: &Path, index: usize, source: &str) -> PathBuf {
    let stem = source
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .and_then(|name| Path::new(name).file_stem())
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());
    dir.join(format!("{:02}-{}.png", index, stem))
}

fn describe(result: &LoadResult) -> String {
    match result.as_bitmap() {
        Some(bitmap) => format!(
            "{}x{} from {}",
            bitmap.width(),
            bitmap.height(),
            result.loaded_from()
        ),
        None => format!("undecoded payload from {}", result.loaded_from()),
    }
}

fn save(result: &LoadResult, path: &Path) -> Result<(), CliError> {
    let Some(bitmap) = result.as_bitmap() else {
        return Ok(());
    };
    bitmap.image().save(path).map_err(|e| CliError::FileWrite {
        path: path.display().to_string(),
        error: e.to_string(),
    })
}

fn format_elapsed(elapsed: Duration) -> String {
    if elapsed.as_millis() >= 1000 {
        format!("{:.2}s", elapsed.as_secs_f64())
    } else {
        format!("{}ms", elapsed.as_millis())
    }
}

/// Run the load command.
pub async fn run(runner: &CliRunner, args: LoadArgs) -> Result<(), CliError> {
    runner.log_startup("load");

    if args.repeat == 0 {
        return Err(CliError::InvalidArgument("--repeat must be at least 1".to_string()));
    }
    if let Some(dir) = &args.output {
        std::fs::create_dir_all(dir).map_err(|e| CliError::FileWrite {
            path: dir.display().to_string(),
            error: e.to_string(),
        })?;
    }

    let requests = args
        .sources
        .iter()
        .map(|source| build_request(&args, source))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| CliError::InvalidArgument(e.to_string()))?;

    let loader = runner.config().loader_builder().start()?;
    let mut failed = 0;
    let total = requests.len() * args.repeat as usize;

    for round in 1..=args.repeat {
        if args.repeat > 1 {
            println!("Round {}/{}", round, args.repeat);
        }

        let started = Instant::now();
        let mut pending = FuturesUnordered::new();
        for (index, request) in requests.iter().enumerate() {
            let handle = loader.load(request.clone())?;
            pending.push(async move { (index, handle.await, started.elapsed()) });
        }

        while let Some((index, outcome, elapsed)) = pending.next().await {
            let source = &args.sources[index];
            match outcome {
                Ok(result) => {
                    println!("  ok    {} ({}, {})", source, describe(&result), format_elapsed(elapsed));
                    if let (Some(dir), 1) = (&args.output, round) {
                        save(&result, &output_path(dir, index, source))?;
                    }
                }
                Err(e) => {
                    failed += 1;
                    warn!(source = %source, error = %e, "Load failed");
                    println!("  FAIL  {} ({}, {})", source, e, format_elapsed(elapsed));
                }
            }
        }
    }

    let stats = loader.cache_stats();
    let snapshot = loader.snapshot().await?;
    println!();
    println!(
        "Cache: {} hits, {} misses, {} entries, {} / {} bytes",
        stats.hits, stats.misses, stats.entry_count, stats.size_bytes, stats.max_size_bytes
    );
    println!(
        "Dispatcher: {} submitted, {} coalesced, {} retried, {} failed",
        snapshot.stats.submitted,
        snapshot.stats.coalesced,
        snapshot.stats.retried,
        snapshot.stats.failed
    );
    info!(total, failed, "Load command finished");

    loader.close().await;

    if failed > 0 {
        return Err(CliError::LoadFailures { failed, total });
    }
    Ok(())
}
