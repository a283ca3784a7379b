//! Treesync - change detection for a local directory tree
//!
//! Entry point for the `treesync` command.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use treesync::config::{IgnoreConfig, DEFAULT_EVENT_BUFFER};
use treesync::observability::{init_tracing, TracingConfig};
use treesync::watcher::{
    filter_directories_only, filter_ignored, index_by_path, session, sorted_files, ChangeSet,
    StaticIgnore, Walker,
};
use treesync::Config;

/// Treesync - change detection for a local directory tree
#[derive(Parser, Debug)]
#[command(name = "treesync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TREESYNC_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, env = "TREESYNC_LOG_JSON", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch a directory and print each change set
    Watch(WatchArgs),
    /// Walk a directory once and report timings
    Walk(WalkArgs),
}

#[derive(Args, Debug)]
struct IgnoreArgs {
    /// Extra directory names to prune from every walk
    #[arg(long = "ignore-dir", value_delimiter = ',')]
    dirs: Vec<String>,

    /// Extra file suffixes to drop from every walk
    #[arg(long = "ignore-suffix", value_delimiter = ',')]
    suffixes: Vec<String>,
}

impl IgnoreArgs {
    fn config(&self) -> IgnoreConfig {
        IgnoreConfig::default().extend(&self.dirs, &self.suffixes)
    }
}

#[derive(Args, Debug)]
struct WatchArgs {
    /// Directory to watch
    root: PathBuf,

    /// Tick period of the watcher in milliseconds
    #[arg(long, env = "TREESYNC_RATE_MS", default_value = "100")]
    rate_ms: u64,

    /// Quiet period before a flush in milliseconds
    #[arg(long, env = "TREESYNC_DEBOUNCE_MS", default_value = "2000")]
    debounce_ms: u64,

    /// Capacity of the raw event channel
    #[arg(long, default_value_t = DEFAULT_EVENT_BUFFER)]
    event_buffer: usize,

    /// Print change sets as JSON lines
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    ignore: IgnoreArgs,
}

#[derive(Args, Debug)]
struct WalkArgs {
    /// Directory to walk
    root: PathBuf,

    #[command(flatten)]
    ignore: IgnoreArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&TracingConfig {
        level: cli.log_level.clone(),
        json: cli.log_json,
    });

    tracing::info!("Treesync v{} starting...", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Watch(args) => watch(args, cli.log_level).await,
        Command::Walk(args) => walk(&args),
    }
}

async fn watch(args: WatchArgs, log_level: String) -> anyhow::Result<()> {
    let config = Config {
        root: args.root,
        rate: Duration::from_millis(args.rate_ms),
        debounce: Duration::from_millis(args.debounce_ms),
        log_level,
        event_buffer: args.event_buffer,
        ignore: args.ignore.config(),
    };

    tracing::debug!(?config, "Configuration loaded");

    let mut session = tokio::task::spawn_blocking(move || session::start(&config))
        .await?
        .context("failed to start watching")?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut baseline = true;
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("interrupt received");
                break;
            }
            changes = session.next_changes() => {
                let Some(changes) = changes else { break };
                if baseline {
                    baseline = false;
                    tracing::info!(paths = changes.added.len(), "baseline ready");
                    continue;
                }
                print_changes(&changes, args.json)?;
            }
        }
    }

    tokio::task::spawn_blocking(move || session.stop()).await??;
    Ok(())
}

fn print_changes(changes: &ChangeSet, json: bool) -> anyhow::Result<()> {
    let mut out = std::io::stdout().lock();

    if json {
        serde_json::to_writer(&mut out, changes)?;
        writeln!(out)?;
    } else {
        for (marker, map) in [
            ('+', &changes.added),
            ('-', &changes.removed),
            ('~', &changes.modified),
        ] {
            for file in sorted_files(map) {
                writeln!(out, "{marker} {}", file.path.display())?;
            }
        }
    }

    out.flush()?;
    Ok(())
}

fn walk(args: &WalkArgs) -> anyhow::Result<()> {
    let root = std::fs::canonicalize(&args.root)
        .with_context(|| format!("cannot resolve '{}'", args.root.display()))?;
    let walker = Walker::new(StaticIgnore::new(&args.ignore.config())?);

    let started = Instant::now();
    let walk = walker.walk(&root)?;
    let walked = started.elapsed();
    let visited = walk.files.len();

    let started = Instant::now();
    let files = filter_ignored(walk.files, &walk.rulesets);
    let filtered = started.elapsed();

    let started = Instant::now();
    let folders = filter_directories_only(&files);
    let foldered = started.elapsed();

    let started = Instant::now();
    let file_by_path = index_by_path(files)?;
    let indexed = started.elapsed();

    println!("root:       {}", root.display());
    println!("walk:       {walked:?} ({visited} entries, {} pruned)", walk.stats.pruned);
    println!("gitignores: {}", walk.rulesets.len());
    println!("filter:     {filtered:?} ({} kept)", file_by_path.len());
    println!("folders:    {foldered:?} ({} folders)", folders.len());
    println!("index:      {indexed:?}");

    Ok(())
}
