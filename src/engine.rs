//! Poll orchestration: fetch, normalize, detect, publish, persist.

use std::collections::{HashMap, HashSet};

use chrono::{Local, NaiveDate, Utc};
use futures_util::{StreamExt, stream};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::api::{GameFeed, with_retry};
use crate::config::{AlertThresholds, AppConfig, NormalizeRules, SettingsConfig};
use crate::detector::detect_new;
use crate::error::FetchError;
use crate::formatter::{format_event, format_night_recap};
use crate::normalize::{normalize, schedule_game_id, schedule_status};
use crate::notifier::Notifier;
use crate::ranker::daily_leaders;
use crate::reporter;
use crate::state::DedupStore;
use crate::types::{CycleReport, EventKey, EventKind, GameSnapshot, GameStatus, RECAP_LABEL};

/// Where a cycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Fetching,
    Detecting,
    Publishing,
    Persisting,
    Sleeping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Poll until the shutdown flag is raised.
    Continuous,
    /// A single cycle, then exit.
    Once,
}

/// Owns the dedup store and drives one cycle at a time.
pub struct Engine<F, N> {
    feed: F,
    notifier: N,
    store: DedupStore,
    settings: SettingsConfig,
    thresholds: AlertThresholds,
    rules: NormalizeRules,
    phase: CyclePhase,
}

/// A schedule entry that made it past id extraction.
struct ScheduledGame {
    game_id: String,
    entry: Value,
    status: Option<GameStatus>,
}

impl<F: GameFeed, N: Notifier> Engine<F, N> {
    pub fn new(feed: F, notifier: N, store: DedupStore, config: &AppConfig) -> Self {
        Self {
            feed,
            notifier,
            store,
            settings: config.settings.clone(),
            thresholds: config.alerts,
            rules: config.normalize.clone(),
            phase: CyclePhase::Idle,
        }
    }

    pub fn store(&self) -> &DedupStore {
        &self.store
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    fn enter(&mut self, phase: CyclePhase) {
        debug!("Cycle phase: {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// Run cycles until `shutdown` flips to true (or once, for `RunMode::Once`).
    ///
    /// The flag is only looked at between cycles; a cycle in flight always
    /// finishes.
    pub async fn run(&mut self, mode: RunMode, mut shutdown: watch::Receiver<bool>) {
        let interval = self.settings.poll_interval();
        loop {
            let report = self.run_cycle(Local::now().date_naive()).await;
            reporter::report_cycle(&report);

            if mode == RunMode::Once || *shutdown.borrow() {
                break;
            }

            self.enter(CyclePhase::Sleeping);
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        warn!("Shutdown channel closed, stopping");
                        break;
                    }
                }
            }
            if *shutdown.borrow() {
                info!("Shutdown signal received");
                break;
            }
        }

        // A flush that failed during the last cycle gets one more try.
        if !self.settings.dry_run && self.store.is_dirty() {
            if let Err(e) = self.store.flush() {
                error!("Failed to persist dedup state on shutdown: {e}");
            }
        }
        self.enter(CyclePhase::Idle);
    }

    /// One full cycle for `date`. Never fails: problems end up in the report.
    pub async fn run_cycle(&mut self, date: NaiveDate) -> CycleReport {
        let mut report = CycleReport {
            timestamp: Utc::now().to_rfc3339(),
            dry_run: self.settings.dry_run,
            ..Default::default()
        };

        self.enter(CyclePhase::Fetching);
        let policy = self.settings.retry_policy();
        let feed = &self.feed;
        let entries = match with_retry(&policy, "schedule", || feed.schedule(date)).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Schedule unavailable for {date}, skipping cycle: {e}");
                report.schedule_error = Some(e.to_string());
                self.persist(&mut report);
                return report;
            }
        };
        report.games_scheduled = entries.len();
        if entries.is_empty() {
            info!("No games scheduled for {date}");
        }

        let mut games = Vec::with_capacity(entries.len());
        for entry in entries {
            match schedule_game_id(&entry) {
                Some(game_id) => games.push(ScheduledGame {
                    status: schedule_status(&entry),
                    game_id,
                    entry,
                }),
                None => {
                    warn!("Schedule entry without gameId, skipping");
                    report.malformed.push("?".to_string());
                }
            }
        }

        let recap_key = EventKey::new(date.format("%Y-%m-%d").to_string(), EventKind::NightRecap, RECAP_LABEL);
        let recap_pending = !games.is_empty()
            && !self.store.has(&recap_key)
            && games
                .iter()
                .all(|g| g.status == Some(GameStatus::Final) || self.store.is_closed(&g.game_id));

        // Closed games are only refetched while the recap still needs them.
        let wanted: Vec<usize> = games
            .iter()
            .enumerate()
            .filter(|(_, g)| g.status != Some(GameStatus::Scheduled))
            .filter(|(_, g)| recap_pending || !self.store.is_closed(&g.game_id))
            .map(|(i, _)| i)
            .collect();
        debug!(
            "{} of {} game(s) need a boxscore (recap pending: {recap_pending})",
            wanted.len(),
            games.len()
        );

        let fetched: Vec<(usize, Result<Value, FetchError>)> = stream::iter(wanted)
            .map(|i| {
                let game_id = games[i].game_id.as_str();
                async move { (i, with_retry(&policy, game_id, || feed.boxscore(game_id)).await) }
            })
            .buffer_unordered(self.settings.max_concurrent_fetches.max(1))
            .collect()
            .await;

        let mut boxscores = HashMap::new();
        for (i, result) in fetched {
            match result {
                Ok(boxscore) => {
                    boxscores.insert(i, boxscore);
                }
                Err(e) => {
                    warn!("Skipping {} this cycle: {e}", games[i].game_id);
                    report.fetch_failures.push(games[i].game_id.clone());
                }
            }
        }
        report.games_fetched = boxscores.len();

        self.enter(CyclePhase::Detecting);
        let mut snapshots = Vec::with_capacity(boxscores.len());
        for (i, game) in games.iter().enumerate() {
            let Some(boxscore) = boxscores.get(&i) else {
                continue;
            };
            match normalize(&game.entry, Some(boxscore), &self.rules) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => {
                    warn!("Malformed payload, skipping: {e}");
                    report.malformed.push(game.game_id.clone());
                }
            }
        }

        self.enter(CyclePhase::Publishing);
        let mut closed_now = HashSet::new();
        for snapshot in &snapshots {
            if self.store.is_closed(&snapshot.game_id) {
                continue;
            }
            if self.publish_game(snapshot, &mut report).await {
                closed_now.insert(snapshot.game_id.clone());
            }
        }

        if recap_pending && snapshots.len() == games.len() && games.len() == report.games_scheduled {
            let all_closed = snapshots.iter().all(|s| {
                s.status == GameStatus::Final
                    && (closed_now.contains(&s.game_id) || self.store.is_closed(&s.game_id))
            });
            if all_closed {
                self.publish_recap(date, recap_key, &snapshots, &mut report).await;
            }
        }

        self.persist(&mut report);
        info!(
            "Cycle done: {} scheduled, {} fetched, {} published, {} failed",
            report.games_scheduled,
            report.games_fetched,
            report.published.len(),
            report.publish_failures.len() + report.fetch_failures.len() + report.malformed.len(),
        );
        report
    }

    /// Post every new event for one game, in order. Stops at the first
    /// failure so later events never overtake an earlier one.
    ///
    /// Returns whether a final for this game went out.
    async fn publish_game(&mut self, snapshot: &GameSnapshot, report: &mut CycleReport) -> bool {
        let mut finished = false;
        for event in detect_new(&self.store, snapshot, &self.thresholds) {
            let text = format_event(&event, snapshot);
            match self.notifier.post(&text).await {
                Ok(()) => {
                    info!("Published {}", event.key);
                    report.published.push(event.key.to_string());
                    finished |= event.key.kind == EventKind::Final;
                    if !self.settings.dry_run {
                        self.store.record(event.key, Utc::now());
                    }
                }
                Err(e) => {
                    warn!("Failed to publish {}, will retry next cycle: {e}", event.key);
                    report.publish_failures.push(event.key.to_string());
                    break;
                }
            }
        }
        finished
    }

    async fn publish_recap(
        &mut self,
        date: NaiveDate,
        key: EventKey,
        snapshots: &[GameSnapshot],
        report: &mut CycleReport,
    ) {
        let leaders = self
            .settings
            .include_leaders
            .then(|| daily_leaders(snapshots));
        let text = format_night_recap(date, snapshots, leaders.as_ref());
        match self.notifier.post(&text).await {
            Ok(()) => {
                info!("Published night recap for {date}");
                report.published.push(key.to_string());
                if !self.settings.dry_run {
                    self.store.record(key, Utc::now());
                }
            }
            Err(e) => {
                warn!("Failed to publish night recap, will retry next cycle: {e}");
                report.publish_failures.push(key.to_string());
            }
        }
    }

    fn persist(&mut self, report: &mut CycleReport) {
        self.enter(CyclePhase::Persisting);
        if self.settings.dry_run {
            return;
        }
        let attempts = self.settings.flush_attempts.max(1);
        for attempt in 1..=attempts {
            match self.store.flush() {
                Ok(written) => {
                    report.state_flushed = written;
                    return;
                }
                Err(e) if attempt < attempts => {
                    warn!("Failed to persist dedup state (attempt {attempt}/{attempts}): {e}");
                }
                Err(e) => {
                    error!("Failed to persist dedup state after {attempts} attempt(s): {e}");
                }
            }
        }
    }
}
