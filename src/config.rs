use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::NBA_API_BASE;

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Upper bound for `fetch_attempts` and `flush_attempts`.
pub const MAX_ATTEMPTS: u32 = 10;

/// Default location of the persisted dedup state.
pub const STATE_PATH: &str = ".game_state.json";

/// Top-level application config deserialized from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub alerts: AlertThresholds,
    #[serde(default)]
    pub normalize: NormalizeRules,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

/// Runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Polling interval in seconds between cycles.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Attach daily leaders to the end-of-night recap.
    #[serde(default = "default_true")]
    pub include_leaders: bool,
    /// Preview messages on stdout instead of posting; never touches the state file.
    #[serde(default)]
    pub dry_run: bool,
    /// Upper bound on concurrent boxscore requests within one cycle.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    /// Attempts per provider request before deferring to the next cycle.
    #[serde(default = "default_attempts")]
    pub fetch_attempts: u32,
    /// Base backoff delay in milliseconds (doubles each attempt).
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Attempts at writing the state file at the end of a cycle.
    #[serde(default = "default_attempts")]
    pub flush_attempts: u32,
}

fn default_poll_interval() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

fn default_max_concurrent_fetches() -> usize {
    8
}

fn default_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            include_leaders: true,
            dry_run: false,
            max_concurrent_fetches: default_max_concurrent_fetches(),
            fetch_attempts: default_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            flush_attempts: default_attempts(),
        }
    }
}

impl SettingsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.fetch_attempts.max(1),
            base_backoff: Duration::from_millis(self.backoff_base_ms),
            max_backoff: self.poll_interval(),
        }
    }

    /// Reject settings the poll loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            bail!("settings.poll_interval_secs must be positive");
        }
        if self.max_concurrent_fetches == 0 {
            bail!("settings.max_concurrent_fetches must be positive");
        }
        for (name, value) in [
            ("fetch_attempts", self.fetch_attempts),
            ("flush_attempts", self.flush_attempts),
        ] {
            if value > MAX_ATTEMPTS {
                bail!("settings.{name} is {value}, at most {MAX_ATTEMPTS} allowed");
            }
        }
        Ok(())
    }
}

/// Bounded exponential backoff for provider requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    /// Ceiling for a single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        SettingsConfig::default().retry_policy()
    }
}

/// Thresholds for close-game and performance alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertThresholds {
    /// Maximum point differential that counts as a close game.
    #[serde(default = "default_close_game_margin")]
    pub close_game_margin: u32,
    /// First period in which close-game alerts fire (4 = fourth quarter).
    #[serde(default = "default_close_game_period")]
    pub close_game_period: u8,
    #[serde(default = "default_high_scorer_points")]
    pub high_scorer_points: u32,
    /// Per-category minimum for a triple-double.
    #[serde(default = "default_milestone_threshold")]
    pub milestone_threshold: u32,
}

fn default_close_game_margin() -> u32 {
    5
}

fn default_close_game_period() -> u8 {
    4
}

fn default_high_scorer_points() -> u32 {
    40
}

fn default_milestone_threshold() -> u32 {
    10
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            close_game_margin: default_close_game_margin(),
            close_game_period: default_close_game_period(),
            high_scorer_points: default_high_scorer_points(),
            milestone_threshold: default_milestone_threshold(),
        }
    }
}

/// Provider quirk handling applied by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeRules {
    /// Read an end-of-regulation status text as period 4 when the period field
    /// is missing or disagrees (seen on games that run past midnight).
    #[serde(default = "default_true")]
    pub regulation_fallback: bool,
    /// Status text fragments that mark the end of regulation.
    #[serde(default = "default_regulation_markers")]
    pub regulation_markers: Vec<String>,
}

fn default_regulation_markers() -> Vec<String> {
    vec!["End of Q4".to_string(), "End of 4th".to_string()]
}

impl Default for NormalizeRules {
    fn default() -> Self {
        Self {
            regulation_fallback: true,
            regulation_markers: default_regulation_markers(),
        }
    }
}

/// Where and how long dedup records are kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
    /// Records older than this are dropped at load.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

fn default_state_path() -> PathBuf {
    PathBuf::from(STATE_PATH)
}

fn default_retention_days() -> i64 {
    3
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
            retention_days: default_retention_days(),
        }
    }
}

/// Provider endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    NBA_API_BASE.to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Load config if the file exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write config to the given TOML file path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}

/// Credentials and endpoints read from the environment (`.env` supported).
#[derive(Debug, Clone)]
pub struct Credentials {
    pub schedule_api_key: String,
    pub stats_api_key: String,
    /// Required unless running dry.
    pub slack_webhook_url: Option<Url>,
    pub base_url_override: Option<String>,
}

impl Credentials {
    /// Read credentials, failing fast on anything the run cannot do without.
    pub fn from_env(dry_run: bool) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut missing = Vec::new();
        let schedule_api_key = non_empty_var("SCHEDULE_API_KEY");
        let stats_api_key = non_empty_var("STATS_API_KEY");
        let webhook = non_empty_var("SLACK_WEBHOOK_URL");

        if schedule_api_key.is_none() {
            missing.push("SCHEDULE_API_KEY");
        }
        if stats_api_key.is_none() {
            missing.push("STATS_API_KEY");
        }
        if webhook.is_none() && !dry_run {
            missing.push("SLACK_WEBHOOK_URL");
        }
        if !missing.is_empty() {
            anyhow::bail!("missing required environment: {}", missing.join(", "));
        }

        let slack_webhook_url = webhook
            .map(|raw| Url::parse(&raw).context("SLACK_WEBHOOK_URL is not a valid URL"))
            .transpose()?;

        Ok(Self {
            schedule_api_key: schedule_api_key.unwrap_or_default(),
            stats_api_key: stats_api_key.unwrap_or_default(),
            slack_webhook_url,
            base_url_override: non_empty_var("NBA_BASE_URL"),
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
