//! Probe: schedule + boxscore payloads
//!
//! Fetches the rolling schedule for a date and, for each game (or a single
//! `--game-id`), the boxscore. Prints:
//! - Raw schedule entry and the fields present on it
//! - Raw boxscore top-level fields, period and clock
//! - The normalized snapshot, or the reason it was rejected
//! - Candidate events against an empty dedup store
//! - Latency per request

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use serde_json::Value;

use nba_gamecast::api::{GameFeed, NbaApiClient};
use nba_gamecast::config::{AppConfig, CONFIG_PATH, Credentials};
use nba_gamecast::detector::detect;
use nba_gamecast::formatter::format_event;
use nba_gamecast::normalize::{normalize, schedule_game_id};

#[derive(Parser)]
#[command(name = "probe_boxscore", about = "Dump raw and normalized NBA payloads")]
struct Args {
    /// Schedule date (YYYY-MM-DD), defaults to today
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Only probe this game
    #[arg(long)]
    game_id: Option<String>,

    /// Print the full raw boxscore instead of a field summary
    #[arg(long)]
    raw: bool,

    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = AppConfig::load_or_default(&args.config)?;
    let creds = Credentials::from_env(true)?;
    let base_url = creds.base_url_override.as_deref().unwrap_or(&config.api.base_url);
    let client = NbaApiClient::new(base_url, &creds.schedule_api_key, &creds.stats_api_key)?;
    let date = args.date.unwrap_or_else(|| Local::now().date_naive());

    println!("=== Probe: schedule + boxscore ===");
    println!("Base URL: {base_url}");
    println!("Date: {date}");
    println!();

    println!("--- 1. Schedule ---");
    let start = Instant::now();
    let games = client.schedule(date).await.context("schedule request failed")?;
    println!("Latency: {:?}", start.elapsed());
    println!("Games on {date}: {}", games.len());
    if let Some(first) = games.first().and_then(Value::as_object) {
        println!("Fields present on a schedule entry:");
        for key in first.keys() {
            println!("  - {key}");
        }
    }
    println!();

    for (i, entry) in games.iter().enumerate() {
        let Some(game_id) = schedule_game_id(entry) else {
            println!("{}. <entry without gameId>", i + 1);
            continue;
        };
        if args.game_id.as_ref().is_some_and(|only| *only != game_id) {
            continue;
        }

        println!("--- {}. Game {game_id} ---", i + 1);
        println!(
            "Schedule: status={} text={:?} period={}",
            entry.get("gameStatus").unwrap_or(&Value::Null),
            entry.get("gameStatusText").and_then(Value::as_str).unwrap_or(""),
            entry.get("period").unwrap_or(&Value::Null),
        );

        let start = Instant::now();
        let boxscore = match client.boxscore(&game_id).await {
            Ok(b) => b,
            Err(e) => {
                println!("Boxscore request failed ({:?}): {e}", start.elapsed());
                println!();
                continue;
            }
        };
        println!("Boxscore latency: {:?}", start.elapsed());
        if args.raw {
            println!("{}", serde_json::to_string_pretty(&boxscore)?);
        } else if let Some(obj) = boxscore.as_object() {
            let keys: Vec<&str> = obj.keys().map(String::as_str).collect();
            println!("Boxscore fields: {}", keys.join(", "));
            println!(
                "Boxscore: status={} text={:?} period={} clock={:?}",
                obj.get("gameStatus").unwrap_or(&Value::Null),
                obj.get("gameStatusText").and_then(Value::as_str).unwrap_or(""),
                obj.get("period").unwrap_or(&Value::Null),
                obj.get("gameClock").and_then(Value::as_str).unwrap_or(""),
            );
        }

        match normalize(entry, Some(&boxscore), &config.normalize) {
            Ok(snapshot) => {
                println!(
                    "Normalized: {} {} - {} {} | {:?} period={} ended={} fallback={} players={}",
                    snapshot.away.tricode,
                    snapshot.away.score,
                    snapshot.home.score,
                    snapshot.home.tricode,
                    snapshot.status,
                    snapshot.period,
                    snapshot.period_ended,
                    snapshot.regulation_fallback,
                    snapshot.players.len(),
                );
                let events = detect(0, None, &snapshot, &config.alerts);
                println!("Candidate events (fresh store): {}", events.len());
                for event in &events {
                    println!("  {}", event.key);
                }
                if let Some(last) = events.last() {
                    println!("\nPreview of {}:", last.key);
                    println!("{}", format_event(last, &snapshot));
                }
            }
            Err(e) => println!("Rejected by normalizer: {e}"),
        }
        println!();
    }

    Ok(())
}
