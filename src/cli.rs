//! CLI argument definitions using clap derive macros.

use std::path::{Path, PathBuf};

use clap::{Args as ClapArgs, Parser, Subcommand};

/// Harvest single-ticker articles and their comment threads into SQLite.
#[derive(Parser, Debug)]
#[command(name = "harvester")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// JSON configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// File holding the raw Cookie header of a logged-in session
    #[arg(long, global = true, value_name = "PATH")]
    pub cookie_file: Option<PathBuf>,

    /// SQLite database file (overrides config)
    #[arg(long, global = true, value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Attempts per request, including the first (1-10)
    #[arg(long, global = true, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub max_attempts: Option<u32>,

    /// Minimum delay between requests to the same host in milliseconds (0 disables, max 60000)
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub rate_limit: Option<u64>,

    /// Site root URL (overrides config)
    #[arg(long, global = true, value_name = "URL")]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Find article ids on a symbol's listing pages and write them to a file
    Discover(DiscoverArgs),
    /// Fetch articles and comments for a list of ids and store them
    Collect(CollectArgs),
    /// Compute negative-word ratios for stored text that has none
    Score(ScoreArgs),
}

/// Arguments of `discover`.
#[derive(ClapArgs, Debug)]
pub struct DiscoverArgs {
    /// Ticker symbol, e.g. AAPL
    pub symbol: String,

    /// First listing page
    #[arg(long, default_value_t = 1)]
    pub start_page: u32,

    /// Page after the last one to fetch; discovery also ends at the first empty page
    #[arg(long, default_value_t = 10_000)]
    pub end_page: u32,

    /// Output file for the comma-separated ids
    #[arg(short, long, value_name = "PATH")]
    pub output: PathBuf,

    /// End discovery at a page that fails instead of skipping it
    #[arg(long)]
    pub stop_on_failed_page: bool,
}

/// Arguments of `collect`.
#[derive(ClapArgs, Debug)]
pub struct CollectArgs {
    /// File with comma-separated article ids
    pub ids_file: PathBuf,

    /// Only fetch and store comments
    #[arg(long)]
    pub comments_only: bool,

    /// First list index to process
    #[arg(long, default_value_t = 0)]
    pub start: usize,

    /// Index after the last one to process
    #[arg(long)]
    pub stop: Option<usize>,

    /// Continue after the last committed id of this run key
    #[arg(long)]
    pub resume: bool,

    /// Checkpoint name (defaults to the ids file name)
    #[arg(long)]
    pub run_key: Option<String>,

    /// Strip non-ASCII characters from comment text
    #[arg(long)]
    pub ascii_only: bool,
}

impl CollectArgs {
    /// Explicit run key, or the ids file stem.
    #[must_use]
    pub fn effective_run_key(&self) -> String {
        self.run_key.clone().unwrap_or_else(|| file_stem(&self.ids_file))
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| "default".to_string(), |s| s.to_string_lossy().into_owned())
}

/// Arguments of `score`.
#[derive(ClapArgs, Debug)]
pub struct ScoreArgs {
    /// File with comma-separated negative words
    #[arg(long, value_name = "PATH")]
    pub vocabulary: PathBuf,
}
