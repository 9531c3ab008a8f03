//! Careers-Crawl main entry point
//!
//! This is the command-line interface for the resumable job-listing crawler.

use careers_crawl::config::{load_config_with_hash, Config};
use careers_crawl::storage::{open_store, ProgressStore, SqliteStore};
use chrono::Local;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Careers-Crawl: a resumable job-listing harvester
///
/// Careers-Crawl opens the configured careers site in a browser, narrows it
/// to one region, and walks every result page. Progress is saved after each
/// page, so an interrupted crawl picks up where it stopped when run again on
/// the same day.
#[derive(Parser, Debug)]
#[command(name = "careers-crawl")]
#[command(version = "1.0.0")]
#[command(about = "A resumable job-listing harvester", long_about = None)]
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

    /// Validate config and show where results would be saved without crawling
    #[arg(long, conflicts_with_all = ["stats", "export_csv"])]
    dry_run: bool,

    /// Show statistics from the store and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_csv"])]
    stats: bool,

    /// Write the stored jobs to a CSV file and exit
    #[arg(long, value_name = "PATH", conflicts_with_all = ["dry_run", "stats"])]
    export_csv: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let store_path = config.output.resolve_store_path(Local::now().date_naive());

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config, &store_path);
    } else if cli.stats {
        handle_stats(&store_path)?;
    } else if let Some(csv_path) = &cli.export_csv {
        handle_export_csv(&store_path, csv_path)?;
    } else {
        handle_crawl(config, &store_path).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("careers_crawl=info,warn"),
            1 => EnvFilter::new("careers_crawl=debug,info"),
            2 => EnvFilter::new("careers_crawl=trace,debug"),
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

/// Handles the --dry-run mode: shows the validated configuration
fn handle_dry_run(config: &Config, store_path: &Path) {
    println!("=== Careers-Crawl Dry Run ===\n");

    println!("Site:");
    println!("  URL: {}", config.site.url);
    println!("  Results container: {}", config.site.results_selector);

    println!("\nFilter:");
    println!("  Region: {}", config.filter.label);
    println!("  Option: {}", config.filter.option_selector);
    println!(
        "  Unchanged count allowed: {}",
        config.filter.allow_unchanged_count
    );

    println!("\nPagination:");
    println!("  Max retries: {}", config.pagination.max_retries);
    println!("  Retry delay: {}ms", config.pagination.retry_delay_ms);
    println!(
        "  Preference reset after: {} failures",
        config.pagination.max_consecutive_failures
    );
    println!(
        "  expand-in-place: {}",
        config.pagination.expand_in_place.selector
    );
    println!("  next-link: {}", config.pagination.next_link.selector);

    println!("\nCrawler:");
    println!("  Page delay: {}ms", config.crawler.page_delay_ms);
    println!("  Headless: {}", config.browser.headless);

    println!("\nOutput:");
    println!("  Store: {}", store_path.display());
    if store_path.exists() {
        println!("  (existing store found, the crawl would resume)");
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the store
fn handle_stats(store_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    use careers_crawl::output::{load_statistics, print_statistics};

    let store = open_existing_store(store_path)?;
    let stats = load_statistics(&store)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export-csv mode: writes stored records to a CSV file
fn handle_export_csv(
    store_path: &Path,
    csv_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    use careers_crawl::output::export_csv;

    println!("=== Exporting Jobs ===\n");
    println!("Store: {}", store_path.display());
    println!("Output: {}", csv_path.display());
    println!();

    let store = open_existing_store(store_path)?;
    let records = store.load()?.records;
    let written = export_csv(&records, csv_path)?;

    println!("✓ Exported {} jobs to: {}", written, csv_path.display());

    Ok(())
}

fn open_existing_store(path: &Path) -> Result<SqliteStore, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No store found at {}", path.display()).into());
    }
    Ok(open_store(path)?)
}

/// Handles the main crawl operation
#[cfg(feature = "chromium")]
async fn handle_crawl(
    config: Config,
    store_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    use careers_crawl::driver::{shutdown_channel, ChromiumDriver};
    use careers_crawl::Coordinator;

    let store = open_store(store_path)?;
    if store.existed() {
        tracing::info!("Found existing store: {}", store_path.display());
    }

    // Ctrl-C stops the crawl at the next wait; progress is flushed on the way out
    let (trigger, shutdown) = shutdown_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing up");
            trigger.trigger();
        }
    });

    let driver = ChromiumDriver::launch(&config.browser).await?;
    let mut coordinator = Coordinator::new(config, driver, store, shutdown)?;

    match coordinator.run().await {
        Ok(report) => {
            report.log();
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

#[cfg(not(feature = "chromium"))]
async fn handle_crawl(
    _config: Config,
    _store_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    Err("careers-crawl was built without a browser backend (enable the `chromium` feature)".into())
}
