//! init-config: write a default `config.toml` for the gamecast service.
//!
//! Refuses to overwrite an existing file unless `--force` is given. Checks
//! which environment credentials are visible and tells you what is missing.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;

use nba_gamecast::config::{AppConfig, CONFIG_PATH, Credentials};

#[derive(Parser)]
#[command(name = "init-config", about = "Write a default config.toml and check credentials")]
struct Cli {
    /// Where to write the config
    #[arg(long, default_value = CONFIG_PATH)]
    path: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    println!("=== NBA Gamecast: Config Setup ===\n");

    if cli.path.exists() && !cli.force {
        bail!("{} already exists; pass --force to overwrite", cli.path.display());
    }

    let config = AppConfig::default();
    config.save(&cli.path)?;
    println!("Wrote defaults to {}", cli.path.display());
    println!("  poll interval:  {}s", config.settings.poll_interval_secs);
    println!("  state file:     {}", config.state.path.display());
    println!("  API base URL:   {}", config.api.base_url);
    println!();

    println!("Checking environment (.env is read too)...");
    match Credentials::from_env(false) {
        Ok(_) => println!("  All credentials present"),
        Err(e) => {
            println!("  {e}");
            println!("  Set them in the environment or a .env file before running live.");
        }
    }
    println!();

    println!("Next steps:");
    println!("  cargo run --bin gamecast -- --once --dry-run");
    println!("  cargo run --bin gamecast");

    Ok(())
}
