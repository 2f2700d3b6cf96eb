//! Identifies which files on disk correspond to the files listed inside a
//! set of BitTorrent .torrent files, by content rather than by name.

use std::path::PathBuf;

use clap::Parser;
use torrent_matcher::engine::{Engine, EngineConfig};
use torrent_matcher::error::Error;
use torrent_matcher::verify::DEFAULT_MAX_SPAN_COMBINATIONS;

#[derive(Parser)]
#[command(name = "torrent-matcher")]
#[command(about = "Matches downloaded files against .torrent metainfo by content")]
struct Cli {
    /// A .torrent file, or a directory to scan recursively for .torrent
    /// files. Repeatable.
    #[arg(short, long, required = true)]
    torrent: Vec<PathBuf>,

    /// A directory to scan recursively for candidate files. Repeatable.
    #[arg(short, long, required = true)]
    downloads: Vec<PathBuf>,

    /// Staging store location. `:memory:` (the default) is ephemeral.
    #[arg(long, default_value = ":memory:")]
    database: PathBuf,

    /// Write a JSON report to this path instead of printing text to stdout.
    #[arg(long)]
    json: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("torrent_matcher=info")
        .init();

    let cli = Cli::parse();

    for root in &cli.torrent {
        if !root.exists() {
            return Err(Error::Config(format!(
                "torrent path does not exist: {}",
                root.display()
            ))
            .into());
        }
    }
    for root in &cli.downloads {
        if !root.is_dir() {
            return Err(Error::Config(format!(
                "downloads path is not a directory: {}",
                root.display()
            ))
            .into());
        }
    }

    let engine = Engine::new(EngineConfig {
        torrent_roots: cli.torrent,
        download_roots: cli.downloads,
        database: cli.database,
        max_span_combinations: DEFAULT_MAX_SPAN_COMBINATIONS,
    });

    let (report, warnings) = engine.run()?;

    for warning in &warnings {
        tracing::warn!(?warning, "matcher warning");
    }

    match cli.json {
        Some(path) => torrent_matcher::report::write_json(&report, &path)?,
        None => torrent_matcher::report::render_text(&report, std::io::stdout())?,
    }

    Ok(())
}
