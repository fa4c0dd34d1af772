//! CLI entry point for the article harvester.

use std::io::{self, IsTerminal};
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use futures_util::StreamExt;
use harvester_core::analysis::{Vocabulary, score_unscored};
use harvester_core::ids::{read_id_list, write_id_list};
use harvester_core::{
    ArticleParser, Collector, CommentFetcher, ContentPolicy, Credentials, Database, Discoverer,
    FailedPagePolicy, Fetcher, HarvestConfig, RunOptions, Store,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

mod cli;

use cli::{Args, CollectArgs, Command, DiscoverArgs, ScoreArgs};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let config = load_config(&args)?;
    let credentials = load_credentials(&args)?;
    let fetcher = Fetcher::from_settings(&config.fetch).context("failed to set up HTTP client")?;

    match &args.command {
        Command::Discover(discover) => {
            run_discover(discover, &config, fetcher, credentials, args.quiet).await
        }
        Command::Collect(collect) => run_collect(collect, config, fetcher, credentials).await,
        Command::Score(score) => run_score(score, &config).await,
    }
}

/// Loads the config file (if any) and applies CLI overrides.
fn load_config(args: &Args) -> Result<HarvestConfig> {
    let mut config = match &args.config {
        Some(path) => HarvestConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => HarvestConfig::default(),
    };

    if let Some(database) = &args.database {
        config.database_path.clone_from(database);
    }
    if let Some(max_attempts) = args.max_attempts {
        config.fetch.max_attempts = max_attempts;
    }
    if let Some(rate_limit) = args.rate_limit {
        config.fetch.rate_limit_ms = rate_limit;
    }
    if let Some(base_url) = &args.base_url {
        config.endpoints.base_url.clone_from(base_url);
    }
    if let Command::Collect(collect) = &args.command {
        if collect.ascii_only {
            config.comments.content_policy = ContentPolicy::AsciiOnly;
        }
    }
    if let Command::Discover(discover) = &args.command {
        if discover.stop_on_failed_page {
            config.discovery.failed_page_policy = FailedPagePolicy::Stop;
        }
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn load_credentials(args: &Args) -> Result<Credentials> {
    match &args.cookie_file {
        Some(path) => {
            let credentials = Credentials::load(path)
                .with_context(|| format!("failed to load cookies from {}", path.display()))?;
            info!(cookies = credentials.len(), "session cookies loaded");
            Ok(credentials)
        }
        None => {
            if !matches!(args.command, Command::Score(_)) {
                warn!("no --cookie-file given, requests will be anonymous");
            }
            Ok(Credentials::anonymous())
        }
    }
}

async fn run_discover(
    args: &DiscoverArgs,
    config: &HarvestConfig,
    fetcher: Fetcher,
    credentials: Credentials,
    quiet: bool,
) -> Result<()> {
    let discoverer = Discoverer::new(fetcher, config.endpoints.clone(), credentials)
        .with_settings(&config.discovery);

    let spinner = if !quiet && io::stderr().is_terminal() {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner
    } else {
        ProgressBar::hidden()
    };

    info!(symbol = %args.symbol, start = args.start_page, end = args.end_page, "discovering articles");
    let mut ids = Vec::new();
    let mut stream = pin!(discoverer.discover(&args.symbol, args.start_page, args.end_page));
    while let Some(id) = stream.next().await {
        ids.push(id);
        spinner.set_message(format!("{}: {} article ids", args.symbol, ids.len()));
    }
    spinner.finish_and_clear();

    write_id_list(&args.output, &ids)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    info!(count = ids.len(), output = %args.output.display(), "discovery complete");
    Ok(())
}

async fn run_collect(
    args: &CollectArgs,
    config: HarvestConfig,
    fetcher: Fetcher,
    credentials: Credentials,
) -> Result<()> {
    let ids = read_id_list(&args.ids_file)
        .with_context(|| format!("failed to read ids from {}", args.ids_file.display()))?;
    let db = Database::new(&config.database_path).await.with_context(|| {
        format!(
            "failed to open database {}",
            config.database_path.display()
        )
    })?;

    let stop = Arc::new(AtomicBool::new(false));
    let stop_signal = Arc::clone(&stop);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing current article");
            stop_signal.store(true, Ordering::SeqCst);
        }
    });

    let collector = Collector::new(
        ArticleParser::new(fetcher.clone(), config.endpoints.clone()),
        CommentFetcher::new(fetcher.clone(), config.endpoints.clone())
            .with_content_policy(config.comments.content_policy),
        Store::new(&db),
        credentials,
    )
    .with_stop_flag(Arc::clone(&stop));

    let options = RunOptions {
        comments_only: args.comments_only,
        start_index: args.start,
        stop_index: args.stop,
        resume: args.resume,
        run_key: args.effective_run_key(),
    };
    let summary = collector
        .run(&ids, &options)
        .await
        .context("collection run could not start")?;

    for failure in &summary.failures {
        warn!(
            position = failure.position,
            article_id = %failure.article_id,
            reason = %failure.reason,
            "failed"
        );
    }
    info!(
        requests = fetcher.stats().attempts(),
        backoff_waits = fetcher.stats().backoff_waits(),
        failed_statuses = fetcher.stats().failed_statuses(),
        "fetch totals"
    );
    if summary.stopped_early {
        if let Some(position) = summary.last_committed {
            info!(position, "stopped early; rerun with --resume to continue");
        }
    }

    db.close().await;
    Ok(())
}

async fn run_score(args: &ScoreArgs, config: &HarvestConfig) -> Result<()> {
    let vocabulary = Vocabulary::load(&args.vocabulary)
        .with_context(|| format!("failed to load vocabulary {}", args.vocabulary.display()))?;
    let db = Database::new(&config.database_path)
        .await
        .with_context(|| format!("failed to open database {}", config.database_path.display()))?;

    let summary = score_unscored(&db, &vocabulary)
        .await
        .context("scoring failed")?;
    info!(
        articles = summary.articles,
        comments = summary.comments,
        "scored"
    );

    db.close().await;
    Ok(())
}
