use std::future::Future;
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::RetryPolicy;
use crate::error::FetchError;
use crate::normalize::parse_schedule;

/// HTTP timeout for provider requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Source of raw schedule and boxscore payloads.
pub trait GameFeed {
    /// Raw schedule entries for `date`, one JSON object per game.
    fn schedule(&self, date: NaiveDate) -> impl Future<Output = Result<Vec<Value>, FetchError>> + Send;

    /// Raw boxscore payload for one game.
    fn boxscore(&self, game_id: &str) -> impl Future<Output = Result<Value, FetchError>> + Send;
}

/// Client for the NBA schedule and stats endpoints.
pub struct NbaApiClient {
    http: Client,
    base_url: String,
    schedule_api_key: String,
    stats_api_key: String,
}

impl NbaApiClient {
    pub fn new(base_url: &str, schedule_api_key: &str, stats_api_key: &str) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Rejected(format!("http client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            schedule_api_key: schedule_api_key.to_string(),
            stats_api_key: stats_api_key.to_string(),
        })
    }

    /// Fetch the raw rolling schedule payload.
    pub async fn rolling_schedule(&self, date: NaiveDate) -> Result<Value, FetchError> {
        let url = format!("{}/api/schedule/rolling", self.base_url);
        let game_date = date.format("%Y-%m-%d").to_string();
        let resp = self
            .http
            .get(&url)
            .header("X-NBA-Api-Key", &self.schedule_api_key)
            .query(&[("leagueId", "00"), ("gameDate", game_date.as_str())])
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }
}

impl GameFeed for NbaApiClient {
    async fn schedule(&self, date: NaiveDate) -> Result<Vec<Value>, FetchError> {
        let payload = self.rolling_schedule(date).await?;
        let games = parse_schedule(&payload, date).map_err(|e| FetchError::Rejected(e.to_string()))?;
        debug!("Fetched {} scheduled game(s) for {date}", games.len());
        Ok(games)
    }

    async fn boxscore(&self, game_id: &str) -> Result<Value, FetchError> {
        let url = format!("{}/api/stats/boxscore", self.base_url);
        let resp = self
            .http
            .get(&url)
            .header("X-NBA-Api-Key", &self.stats_api_key)
            .query(&[("gameId", game_id), ("measureType", "Traditional")])
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }
}

/// Delay before retry number `attempt + 1`: doubles from `base_backoff`,
/// never above `max_backoff`.
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    policy.base_backoff.saturating_mul(factor).min(policy.max_backoff)
}

/// Run `op` with exponential backoff on transient failures.
///
/// Non-transient errors return immediately. After `max_attempts` the last
/// transient error is returned and the caller defers to the next cycle.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && attempt + 1 < attempts => {
                let delay = backoff_delay(policy, attempt);
                warn!(
                    "Transient error fetching {what} (attempt {}/{}): {e}; retrying in {:?}",
                    attempt + 1,
                    attempts,
                    delay,
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
