//! Forum-Harvest main entry point
//!
//! This is the command-line interface for the incremental forum archiver.

use anyhow::Context;
use clap::Parser;
use forum_harvest::config::{load_config_or_default, Config, Credentials};
use forum_harvest::crawler::{harvest, RunOutcome};
use forum_harvest::output::{write_filtered, DEFAULT_FILTER_OUTPUT};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Forum-Harvest: an incremental forum archiver
///
/// Logs into the forum, walks the configured thread index and every thread
/// in it, and appends posts newer than the last run to a JSON archive.
#[derive(Parser, Debug)]
#[command(name = "forum-harvest")]
#[command(version = "1.0.0")]
#[command(about = "An incremental forum archiver", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply if it does not exist)
    #[arg(short, long, value_name = "CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Re-scrape everything, ignoring the saved watermark
    #[arg(short, long)]
    full: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and credentials and show what would be harvested
    #[arg(long, conflicts_with_all = ["filter", "full"])]
    dry_run: bool,

    /// Export archived threads whose title contains any PATTERN and exit
    #[arg(long, value_name = "PATTERN", num_args = 1..)]
    filter: Vec<String>,

    /// Treat filter patterns as case-insensitive regular expressions
    #[arg(long, requires = "filter")]
    regex: bool,

    /// Match filter patterns case-sensitively
    #[arg(long, requires = "filter", conflicts_with = "regex")]
    case_sensitive: bool,

    /// Where to write filtered threads
    #[arg(long, value_name = "PATH", default_value = DEFAULT_FILTER_OUTPUT)]
    filter_output: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = load_config_or_default(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    match config_hash {
        Some(hash) => tracing::info!(
            path = %cli.config.display(),
            hash = %hash,
            "Configuration loaded"
        ),
        None => tracing::info!(
            path = %cli.config.display(),
            "No configuration file, using defaults"
        ),
    }

    if !cli.filter.is_empty() {
        return handle_filter(&cli, &config);
    }

    let credentials = Credentials::from_env().context("Forum credentials are required")?;

    if cli.dry_run {
        handle_dry_run(&config, &credentials);
        return Ok(());
    }

    handle_harvest(config, &credentials, cli.full, cli.quiet).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("forum_harvest=info,warn"),
            1 => EnvFilter::new("forum_harvest=debug,info"),
            2 => EnvFilter::new("forum_harvest=trace,debug"),
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

/// Handles --filter: exports matching threads from the archive and exits
fn handle_filter(cli: &Cli, config: &Config) -> anyhow::Result<()> {
    let input = Path::new(&config.output.archive_path);
    let matched = write_filtered(
        input,
        &cli.filter_output,
        &cli.filter,
        cli.regex,
        cli.case_sensitive,
    )
    .with_context(|| format!("Failed to filter {}", input.display()))?;

    println!(
        "Found {} matching threads, saved to {}",
        matched.len(),
        cli.filter_output.display()
    );
    for (i, thread) in matched.iter().take(5).enumerate() {
        println!("  {}. {}", i + 1, thread.thread_title);
    }
    if matched.len() > 5 {
        println!("  ... and {} more threads", matched.len() - 5);
    }

    Ok(())
}

/// Handles --dry-run: shows the effective settings without any network I/O
fn handle_dry_run(config: &Config, credentials: &Credentials) {
    println!("=== Forum-Harvest Dry Run ===\n");

    println!("Forum:");
    println!("  Base URL: {}", config.forum.base_url);
    println!("  Index: {}", config.forum.index_path);
    println!("  Login: {}", config.forum.login_path);
    println!("  User: {}", credentials.username);
    match config.forum.max_threads {
        Some(limit) => println!("  Thread limit: {}", limit),
        None => println!("  Thread limit: none"),
    }

    println!("\nSkipped thread titles ({}):", config.forum.skip_thread_titles.len());
    for title in &config.forum.skip_thread_titles {
        println!("  - {}", title);
    }

    println!("\nCrawler:");
    println!(
        "  Delay between threads: {}s",
        config.crawler.delay_between_requests_sec
    );
    println!("  Delay between pages: {}ms", config.crawler.page_delay_ms);
    println!("  Max retries: {}", config.crawler.max_retries);
    println!("  Max pages per walk: {}", config.crawler.max_pages_per_walk);

    println!("\nOutput:");
    println!("  State: {}", config.output.state_path);
    println!("  Archive: {}", config.output.archive_path);

    println!("\n✓ Configuration is valid");
}

/// Handles the main harvest operation
async fn handle_harvest(
    config: Config,
    credentials: &Credentials,
    full: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    if full {
        tracing::info!("Forcing a full harvest (ignoring saved watermark)");
    }

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current request");
            signal_token.cancel();
        }
    });

    let report = match harvest(config, credentials, full, &cancel).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            return Err(e.into());
        }
    };

    report.log_summary();
    match report.outcome {
        RunOutcome::Completed => {}
        RunOutcome::Interrupted => {
            tracing::warn!("Run was interrupted; the next run will pick up from the previous watermark")
        }
        RunOutcome::Incomplete => {
            tracing::warn!("Some pages could not be read; the next run will pick up from the previous watermark")
        }
    }

    if !quiet {
        println!("\n{}", report);
    }

    Ok(())
}
