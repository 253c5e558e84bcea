use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a game as reported by the providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameStatus {
    Scheduled,
    InProgress,
    Halftime,
    Final,
}

impl GameStatus {
    /// True once the ball has been tipped (including finished games).
    pub fn has_started(self) -> bool {
        !matches!(self, GameStatus::Scheduled)
    }
}

/// One team's side of a game.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamLine {
    pub name: String,
    pub tricode: String,
    pub score: u32,
    /// Points per period, as far as the boxscore has them.
    pub linescore: Vec<u32>,
    /// Team totals; only boxscores carry them.
    pub stats: Option<TeamStats>,
}

impl TeamLine {
    pub fn new(name: impl Into<String>, tricode: impl Into<String>, score: u32) -> Self {
        Self {
            name: name.into(),
            tricode: tricode.into(),
            score,
            ..Self::default()
        }
    }
}

/// Team totals from the boxscore.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamStats {
    pub field_goals_made: u32,
    pub field_goals_attempted: u32,
    pub three_pointers_made: u32,
    pub three_pointers_attempted: u32,
    pub rebounds: u32,
    pub assists: u32,
    pub steals: u32,
    pub blocks: u32,
    pub bench_points: u32,
    pub biggest_lead: u32,
    pub biggest_run: u32,
    pub points_in_paint: u32,
}

impl TeamStats {
    /// Whole-number FG percentage, truncated.
    pub fn field_goal_pct(&self) -> u32 {
        percent(self.field_goals_made, self.field_goals_attempted)
    }

    pub fn three_point_pct(&self) -> u32 {
        percent(self.three_pointers_made, self.three_pointers_attempted)
    }
}

fn percent(made: u32, attempted: u32) -> u32 {
    if attempted == 0 {
        0
    } else {
        made * 100 / attempted
    }
}

/// A single player's box score line within one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerStatLine {
    pub name: String,
    /// Tricode of the player's team.
    pub team: String,
    pub played: bool,
    pub points: u32,
    pub rebounds: u32,
    pub assists: u32,
    pub three_pointers_made: u32,
    pub steals: u32,
    pub blocks: u32,
    pub field_goals_made: u32,
    pub field_goals_attempted: u32,
}

impl PlayerStatLine {
    /// PTS + REB + AST, the ranking tie-breaker.
    pub fn production(&self) -> u32 {
        self.points + self.rebounds + self.assists
    }

    pub fn is_perfect_shooting(&self) -> bool {
        self.field_goals_made > 0 && self.field_goals_made == self.field_goals_attempted
    }
}

/// Which side of the matchup a team is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Home,
    Away,
}

/// Canonical per-game view produced by the normalizer for one poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSnapshot {
    pub game_id: String,
    pub home: TeamLine,
    pub away: TeamLine,
    pub status: GameStatus,
    /// Current period: 0 before tip, 1..=4 regulation, 5+ overtime.
    pub period: u8,
    /// The current period has closed (end-of-period text, 0:00 clock, or final).
    pub period_ended: bool,
    /// The end-of-regulation normalization rule was applied to this snapshot.
    pub regulation_fallback: bool,
    pub status_text: String,
    pub clock: String,
    /// Players in provider order: away roster first, then home.
    pub players: Vec<PlayerStatLine>,
}

impl GameSnapshot {
    pub fn team(&self, side: Side) -> &TeamLine {
        match side {
            Side::Home => &self.home,
            Side::Away => &self.away,
        }
    }

    pub fn players_for(&self, side: Side) -> impl Iterator<Item = &PlayerStatLine> {
        let tricode = self.team(side).tricode.clone();
        self.players.iter().filter(move |p| p.team == tricode)
    }

    pub fn is_tied(&self) -> bool {
        self.home.score == self.away.score
    }

    pub fn margin(&self) -> u32 {
        self.home.score.abs_diff(self.away.score)
    }

    /// `(leader, trailer)`, away first when tied.
    pub fn leader_and_trailer(&self) -> (Side, Side) {
        if self.home.score > self.away.score {
            (Side::Home, Side::Away)
        } else {
            (Side::Away, Side::Home)
        }
    }

    /// The most recently completed period, or 0 if none has closed yet.
    pub fn last_ended_period(&self) -> u8 {
        if self.period_ended || self.status == GameStatus::Final {
            self.period
        } else {
            self.period.saturating_sub(1)
        }
    }
}

/// Display label for a period: `1Q`..`4Q`, then `OT`, `2OT`, `3OT`...
pub fn period_label(period: u8) -> String {
    match period {
        0 => "PRE".to_string(),
        1..=4 => format!("{period}Q"),
        5 => "OT".to_string(),
        p => format!("{}OT", p - 4),
    }
}

/// Inverse of [`period_label`]. Returns `None` for fixed labels like `TIP`.
pub fn period_from_label(label: &str) -> Option<u8> {
    if label == "OT" {
        return Some(5);
    }
    if let Some(n) = label.strip_suffix("OT") {
        return n.parse::<u8>().ok().filter(|n| *n >= 2).map(|n| n + 4);
    }
    label
        .strip_suffix('Q')
        .and_then(|n| n.parse::<u8>().ok())
        .filter(|n| (1..=4).contains(n))
}

/// Reportable event categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    GameStart,
    QuarterEnd,
    Halftime,
    Final,
    PerformanceAlert,
    CloseGameAlert,
    NightRecap,
}

impl EventKind {
    pub fn label(self) -> &'static str {
        match self {
            EventKind::GameStart => "game-start",
            EventKind::QuarterEnd => "quarter-end",
            EventKind::Halftime => "halftime",
            EventKind::Final => "final",
            EventKind::PerformanceAlert => "performance-alert",
            EventKind::CloseGameAlert => "close-game-alert",
            EventKind::NightRecap => "night-recap",
        }
    }
}

/// Label used for events that fire once per game regardless of period.
pub const TIP_LABEL: &str = "TIP";
pub const LATE_LABEL: &str = "LATE";
pub const RECAP_LABEL: &str = "ALL";

/// Composite dedup key: `(game_id, kind, period_label)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventKey {
    pub game_id: String,
    pub kind: EventKind,
    pub period_label: String,
}

impl EventKey {
    pub fn new(game_id: impl Into<String>, kind: EventKind, period_label: impl Into<String>) -> Self {
        Self {
            game_id: game_id.into(),
            kind,
            period_label: period_label.into(),
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.game_id, self.kind.label(), self.period_label)
    }
}

/// A milestone crossed by a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Milestone {
    TripleDouble,
    HighScorer,
}

/// Kind-specific data carried by an event for formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventDetail {
    GameStart,
    QuarterEnd { period: u8 },
    Halftime,
    Final { period: u8 },
    CloseGame { margin: u32, period: u8 },
    Performance {
        player: PlayerStatLine,
        milestones: Vec<Milestone>,
    },
}

/// A newly detected transition. Consumed once by the publisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportableEvent {
    pub key: EventKey,
    pub detail: EventDetail,
}

/// Persisted proof that an event was posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupRecord {
    #[serde(flatten)]
    pub key: EventKey,
    pub posted_at: DateTime<Utc>,
}

/// Stat categories tracked for the daily leaders board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeaderCategory {
    Points,
    Rebounds,
    Assists,
    Threes,
    Steals,
    Blocks,
}

impl LeaderCategory {
    pub const ALL: [LeaderCategory; 6] = [
        LeaderCategory::Points,
        LeaderCategory::Rebounds,
        LeaderCategory::Assists,
        LeaderCategory::Threes,
        LeaderCategory::Steals,
        LeaderCategory::Blocks,
    ];

    pub fn label(self) -> &'static str {
        match self {
            LeaderCategory::Points => "PTS",
            LeaderCategory::Rebounds => "REB",
            LeaderCategory::Assists => "AST",
            LeaderCategory::Threes => "3PM",
            LeaderCategory::Steals => "STL",
            LeaderCategory::Blocks => "BLK",
        }
    }

    pub fn value(self, line: &PlayerStatLine) -> u32 {
        match self {
            LeaderCategory::Points => line.points,
            LeaderCategory::Rebounds => line.rebounds,
            LeaderCategory::Assists => line.assists,
            LeaderCategory::Threes => line.three_pointers_made,
            LeaderCategory::Steals => line.steals,
            LeaderCategory::Blocks => line.blocks,
        }
    }
}

/// Best line in one category across the day's completed games.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderEntry {
    pub category: LeaderCategory,
    pub player: String,
    pub team: String,
    pub value: u32,
}

/// Derived view rebuilt from snapshots whenever it is needed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailyLeaders {
    pub entries: Vec<LeaderEntry>,
}

impl DailyLeaders {
    pub fn get(&self, category: LeaderCategory) -> Option<&LeaderEntry> {
        self.entries.iter().find(|e| e.category == category)
    }
}

/// Outcome of one poll cycle, emitted as a JSON line on stdout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub timestamp: String,
    pub dry_run: bool,
    pub games_scheduled: usize,
    pub games_fetched: usize,
    pub fetch_failures: Vec<String>,
    pub malformed: Vec<String>,
    pub published: Vec<String>,
    pub publish_failures: Vec<String>,
    pub schedule_error: Option<String>,
    pub state_flushed: bool,
}
