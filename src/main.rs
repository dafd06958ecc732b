//! Site-Crawler main entry point
//!
//! This is the command-line interface for the single-server heading crawler.

use anyhow::{Context, Result};
use clap::Parser;
use site_crawler::config::{load_config_with_hash, validate, Config};
use site_crawler::crawler::Coordinator;
use site_crawler::output::{print_report, print_statistics};
use site_crawler::storage::SqliteSink;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Site-Crawler: crawl one server and index its page headings
///
/// Starting from a seed URL, Site-Crawler fetches every HTML page reachable
/// on the same scheme, host and port, records each page's first heading and
/// stores the results in a SQLite database.
#[derive(Parser, Debug)]
#[command(name = "site-crawler")]
#[command(version)]
#[command(about = "A single-server heading crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Crawl from this URL instead of the configured seed
    #[arg(long, value_name = "URL")]
    seed: Option<String>,

    /// Stop after this many fetches (0 = unlimited)
    #[arg(long, value_name = "N")]
    max_pages: Option<u64>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the results database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e).with_context(|| format!("loading {}", cli.config.display()));
        }
    };

    if let Some(seed) = cli.seed {
        config.crawler.seed_url = seed;
    }
    if let Some(max_pages) = cli.max_pages {
        config.crawler.max_pages = max_pages;
    }
    validate(&config).context("invalid command-line override")?;

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config, &config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("site_crawler=info,warn"),
            1 => EnvFilter::new("site_crawler=debug,info"),
            2 => EnvFilter::new("site_crawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Site-Crawler Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Seed URL: {}", config.crawler.seed_url);
    println!(
        "  Max concurrent fetches: {}",
        config.crawler.max_concurrent_fetches
    );
    println!("  Request timeout: {}ms", config.crawler.request_timeout_ms);
    match config.crawler.page_budget() {
        Some(limit) => println!("  Page budget: {}", limit),
        None => println!("  Page budget: unlimited"),
    }

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let sink = SqliteSink::new(Path::new(&config.output.database_path))
        .context("opening results database")?;
    let stats = sink.statistics().context("loading statistics")?;

    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: &str) -> Result<()> {
    let mut sink = SqliteSink::new(Path::new(&config.output.database_path))
        .context("opening results database")?;

    let coordinator = match Coordinator::new(config) {
        Ok(coordinator) => coordinator,
        Err(e) => {
            tracing::error!("Failed to start crawl: {}", e);
            return Err(e.into());
        }
    };

    let run_id = sink
        .begin_run(coordinator.seed().as_str(), config_hash)
        .context("recording crawl run")?;
    tracing::info!("Starting crawl run {}", run_id);

    let cancel = coordinator.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, finishing in-flight fetches");
            cancel.cancel();
        }
    });

    let report = coordinator.run(&mut sink).await;
    print_report(&report);

    Ok(())
}
