//! flatwatch CLI
//!
//! Runs the crawl once, periodically, or just validates configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use flatwatch::{
    error::Result,
    models::AppConfig,
    notify::{ConsoleSink, ListingSink, TelegramNotifier},
    pipeline,
    storage::LocalMarkerStore,
    utils::http,
};

/// flatwatch - flat listing watcher
#[derive(Parser, Debug)]
#[command(
    name = "flatwatch",
    version,
    about = "Watches flat listing search results and notifies about new ones"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single crawl and deliver new listings
    Crawl {
        /// Log new listings instead of sending them to Telegram
        #[arg(long)]
        dry_run: bool,
    },

    /// Crawl periodically until interrupted
    Watch,

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Pick the delivery sink: Telegram when configured, console otherwise.
fn build_sink(
    config: &AppConfig,
    client: &reqwest::Client,
    dry_run: bool,
) -> Result<Box<dyn ListingSink>> {
    if dry_run || config.telegram.token.is_empty() {
        return Ok(Box::new(ConsoleSink));
    }
    Ok(Box::new(TelegramNotifier::new(
        client.clone(),
        &config.telegram,
    )?))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = AppConfig::load_or_init(&cli.config)?;
    config.validate()?;

    match cli.command {
        Command::Crawl { dry_run } => {
            let client = http::create_async_client(&config.crawler)?;
            let store = LocalMarkerStore::new(&config.cache_dir);
            let sink = build_sink(&config, &client, dry_run)?;

            let stats = pipeline::run_crawler(&config, &client, &store, sink.as_ref()).await?;
            log::info!("sent {} new listings", stats.listings_delivered);
        }

        Command::Watch => {
            let client = http::create_async_client(&config.crawler)?;
            let store = LocalMarkerStore::new(&config.cache_dir);
            let sink = build_sink(&config, &client, false)?;

            let period = Duration::from_secs(config.poll_interval_minutes * 60);
            let mut ticker = tokio::time::interval(period);
            log::info!(
                "watching every {} minutes, Ctrl-C to stop",
                config.poll_interval_minutes
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let stats =
                            pipeline::run_crawler(&config, &client, &store, sink.as_ref()).await?;
                        log::info!("sent {} new listings", stats.listings_delivered);
                    }
                    _ = tokio::signal::ctrl_c() => {
                        log::info!("shutting down");
                        break;
                    }
                }
            }
        }

        Command::Validate => {
            log::info!("configuration OK");
        }
    }

    Ok(())
}
