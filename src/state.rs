use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::PersistenceError;
use crate::types::{DedupRecord, EventKey, EventKind, GameStatus, period_from_label};

/// On-disk layout version.
const STATE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    version: u32,
    records: Vec<DedupRecord>,
}

/// Durable set of posted events keyed by `(game_id, kind, period_label)`.
///
/// Everything the detector needs to know about earlier cycles is derived from
/// these records, so a restart that reloads the file resumes exactly where the
/// last successful flush left off.
pub struct DedupStore {
    /// Backing file; `None` keeps the store in memory only.
    path: Option<PathBuf>,
    records: HashMap<EventKey, DateTime<Utc>>,
    /// In-memory set differs from what was last written.
    dirty: bool,
}

impl DedupStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            records: HashMap::new(),
            dirty: false,
        }
    }

    /// Load the store from `path`.
    ///
    /// A missing file is a normal first run. An unreadable or corrupt file is
    /// logged and replaced by an empty set; the next flush overwrites it.
    pub fn load(path: &Path) -> Self {
        let mut store = Self {
            path: Some(path.to_path_buf()),
            records: HashMap::new(),
            dirty: false,
        };

        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No state file at {}, starting fresh", path.display());
                return store;
            }
            Err(e) => {
                warn!("Could not read state file {}: {e} — starting with empty state", path.display());
                return store;
            }
        };

        match serde_json::from_str::<StateFile>(&contents) {
            Ok(file) => {
                if file.version != STATE_VERSION {
                    warn!(
                        "State file {} has version {}, expected {STATE_VERSION} — loading anyway",
                        path.display(),
                        file.version
                    );
                }
                store.records = file
                    .records
                    .into_iter()
                    .map(|r| (r.key, r.posted_at))
                    .collect();
                info!("Loaded {} posted event(s) from {}", store.records.len(), path.display());
            }
            Err(e) => {
                warn!("Could not parse state file {}: {e} — starting with empty state", path.display());
            }
        }
        store
    }

    pub fn has(&self, key: &EventKey) -> bool {
        self.records.contains_key(key)
    }

    /// Record a posted event. Returns `false` if the key was already present
    /// (the original timestamp is kept).
    pub fn record(&mut self, key: EventKey, posted_at: DateTime<Utc>) -> bool {
        if self.records.contains_key(&key) {
            return false;
        }
        self.records.insert(key, posted_at);
        self.dirty = true;
        true
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// All records, sorted by key for stable output.
    pub fn records(&self) -> Vec<DedupRecord> {
        let mut out: Vec<DedupRecord> = self
            .records
            .iter()
            .map(|(key, at)| DedupRecord {
                key: key.clone(),
                posted_at: *at,
            })
            .collect();
        out.sort_by(|a, b| a.key.cmp(&b.key));
        out
    }

    /// Drop records posted before `cutoff`. Returns how many were removed.
    pub fn prune_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.records.len();
        self.records.retain(|_, at| *at >= cutoff);
        let removed = before - self.records.len();
        if removed > 0 {
            self.dirty = true;
            debug!("Pruned {removed} dedup record(s) older than {cutoff}");
        }
        removed
    }

    /// Write the set to disk if it changed since the last flush.
    ///
    /// Returns whether a write happened. On failure the dirty flag stays set
    /// so the next flush tries again.
    pub fn flush(&mut self) -> Result<bool, PersistenceError> {
        if !self.dirty {
            return Ok(false);
        }
        let Some(path) = self.path.clone() else {
            self.dirty = false;
            return Ok(false);
        };

        let file = StateFile {
            version: STATE_VERSION,
            records: self.records(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        // Write next to the target and rename, so a crash mid-write never
        // leaves a truncated state file behind.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|source| PersistenceError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &path).map_err(|source| PersistenceError::Io {
            path: path.clone(),
            source,
        })?;

        self.dirty = false;
        debug!("State saved to {} ({} records)", path.display(), self.records.len());
        Ok(true)
    }

    /// Highest period whose end (quarter-end, halftime or final) was posted.
    pub fn last_processed_period(&self, game_id: &str) -> u8 {
        self.records
            .keys()
            .filter(|k| k.game_id == game_id)
            .filter(|k| {
                matches!(
                    k.kind,
                    EventKind::QuarterEnd | EventKind::Halftime | EventKind::Final
                )
            })
            .filter_map(|k| period_from_label(&k.period_label))
            .max()
            .unwrap_or(0)
    }

    /// Furthest game status already reported, if any.
    pub fn last_reported_status(&self, game_id: &str) -> Option<GameStatus> {
        let mut status = None;
        for key in self.records.keys().filter(|k| k.game_id == game_id) {
            let seen = match key.kind {
                EventKind::Final => GameStatus::Final,
                EventKind::Halftime => GameStatus::Halftime,
                EventKind::GameStart
                | EventKind::QuarterEnd
                | EventKind::CloseGameAlert
                | EventKind::PerformanceAlert => GameStatus::InProgress,
                EventKind::NightRecap => continue,
            };
            status = Some(match status {
                Some(prev) if status_rank(prev) >= status_rank(seen) => prev,
                _ => seen,
            });
        }
        status
    }

    /// A final for this game has been posted.
    pub fn is_closed(&self, game_id: &str) -> bool {
        self.records
            .keys()
            .any(|k| k.game_id == game_id && k.kind == EventKind::Final)
    }
}

fn status_rank(status: GameStatus) -> u8 {
    match status {
        GameStatus::Scheduled => 0,
        GameStatus::InProgress => 1,
        GameStatus::Halftime => 2,
        GameStatus::Final => 3,
    }
}
