use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};

use nba_gamecast::api::NbaApiClient;
use nba_gamecast::config::{AppConfig, CONFIG_PATH, Credentials};
use nba_gamecast::engine::{Engine, RunMode};
use nba_gamecast::notifier::{Channel, PreviewSink, SlackWebhook};
use nba_gamecast::state::DedupStore;

#[derive(Parser)]
#[command(name = "gamecast", about = "Live NBA game updates posted to Slack")]
struct Args {
    /// Run a single poll cycle and exit
    #[arg(long)]
    once: bool,

    /// Print messages to stdout instead of posting; never writes state
    #[arg(long)]
    dry_run: bool,

    /// Path to the TOML config file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Verbose logging (overridden by RUST_LOG)
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = AppConfig::load_or_default(&args.config)?;
    config.settings.dry_run |= args.dry_run;
    let dry_run = config.settings.dry_run;
    info!("Loaded config from {}", args.config.display());

    let creds = Credentials::from_env(dry_run)?;
    config.settings.validate()?;

    let base_url = creds.base_url_override.as_deref().unwrap_or(&config.api.base_url);
    url::Url::parse(base_url).map_err(|e| anyhow::anyhow!("Invalid API base URL {base_url}: {e}"))?;
    let feed = NbaApiClient::new(base_url, &creds.schedule_api_key, &creds.stats_api_key)?;

    let notifier = match (&creds.slack_webhook_url, dry_run) {
        (Some(url), false) => Channel::Slack(SlackWebhook::new(url.clone())?),
        _ => Channel::Preview(PreviewSink),
    };

    let mut store = DedupStore::load(&config.state.path);
    let cutoff = Utc::now() - chrono::Duration::days(config.state.retention_days.max(1));
    let pruned = store.prune_before(cutoff);
    if pruned > 0 {
        info!("Dropped {pruned} dedup record(s) older than {} day(s)", config.state.retention_days);
    }

    let mode = if args.once { RunMode::Once } else { RunMode::Continuous };
    info!(
        "Starting gamecast ({}, {:?}) poll={}s state={} records={}",
        if dry_run { "dry-run" } else { "live" },
        mode,
        config.settings.poll_interval_secs,
        config.state.path.display(),
        store.len(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl+C received, finishing current cycle");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                warn!("Failed to listen for Ctrl+C: {e}");
                // Keep the sender alive so the engine keeps polling.
                std::future::pending::<()>().await;
            }
        }
    });

    let mut engine = Engine::new(feed, notifier, store, &config);
    engine.run(mode, shutdown_rx).await;

    info!("Stopped");
    Ok(())
}
