use tracing::debug;

use crate::config::AlertThresholds;
use crate::state::DedupStore;
use crate::types::{
    EventDetail, EventKey, EventKind, GameSnapshot, GameStatus, LATE_LABEL, Milestone,
    PlayerStatLine, ReportableEvent, TIP_LABEL, period_label,
};

/// Candidate events for `snapshot` given what was already processed.
///
/// `previous_period` is the last period whose end was reported and
/// `previous_status` the furthest status reported (`None` if nothing was).
/// The result is ordered the way messages should go out: start, period
/// boundaries, then alerts.
pub fn detect(
    previous_period: u8,
    previous_status: Option<GameStatus>,
    snapshot: &GameSnapshot,
    thresholds: &AlertThresholds,
) -> Vec<ReportableEvent> {
    let mut events = Vec::new();
    let game_id = snapshot.game_id.as_str();
    let status = snapshot.status;

    let fresh = matches!(previous_status, None | Some(GameStatus::Scheduled));
    if fresh && matches!(status, GameStatus::InProgress | GameStatus::Halftime) {
        events.push(event(game_id, EventKind::GameStart, TIP_LABEL, EventDetail::GameStart));
    }

    let ended = snapshot.last_ended_period();
    let mut quarter_end = (ended > 0 && ended > previous_period).then_some(ended);

    if status == GameStatus::Halftime {
        // Halftime is the end-of-2Q message.
        if quarter_end == Some(2) {
            quarter_end = None;
        }
        events.push(event(game_id, EventKind::Halftime, period_label(2), EventDetail::Halftime));
    }

    if status == GameStatus::Final {
        // A missing period on a finished game still means regulation ended.
        let period = snapshot.period.max(4);
        // Final wins over the quarter-end of the same period.
        if quarter_end.is_some_and(|p| p == period || p == snapshot.period) {
            quarter_end = None;
        }
        events.push(event(
            game_id,
            EventKind::Final,
            period_label(period),
            EventDetail::Final { period },
        ));
    }

    if let Some(p) = quarter_end {
        events.push(event(
            game_id,
            EventKind::QuarterEnd,
            period_label(p),
            EventDetail::QuarterEnd { period: p },
        ));
    }

    if status == GameStatus::InProgress
        && snapshot.period >= thresholds.close_game_period
        && snapshot.margin() <= thresholds.close_game_margin
    {
        events.push(event(
            game_id,
            EventKind::CloseGameAlert,
            LATE_LABEL,
            EventDetail::CloseGame {
                margin: snapshot.margin(),
                period: snapshot.period,
            },
        ));
    }

    if status.has_started() {
        for player in snapshot.players.iter().filter(|p| p.played) {
            let milestones = milestones(player, thresholds);
            if !milestones.is_empty() {
                events.push(event(
                    game_id,
                    EventKind::PerformanceAlert,
                    player.name.as_str(),
                    EventDetail::Performance {
                        player: player.clone(),
                        milestones,
                    },
                ));
            }
        }
    }

    events
}

/// Candidates for `snapshot` that the store has not seen yet.
pub fn detect_new(
    store: &DedupStore,
    snapshot: &GameSnapshot,
    thresholds: &AlertThresholds,
) -> Vec<ReportableEvent> {
    let previous_period = store.last_processed_period(&snapshot.game_id);
    let previous_status = store.last_reported_status(&snapshot.game_id);
    let candidates = detect(previous_period, previous_status, snapshot, thresholds);
    let total = candidates.len();
    let fresh: Vec<ReportableEvent> = candidates
        .into_iter()
        .filter(|e| !store.has(&e.key))
        .collect();
    if total > fresh.len() {
        debug!(
            "{}: {} candidate(s) already posted",
            snapshot.game_id,
            total - fresh.len()
        );
    }
    fresh
}

/// Milestones a stat line has reached.
pub fn milestones(player: &PlayerStatLine, thresholds: &AlertThresholds) -> Vec<Milestone> {
    let mut out = Vec::new();
    let doubled = [
        player.points,
        player.rebounds,
        player.assists,
        player.steals,
        player.blocks,
    ]
    .into_iter()
    .filter(|v| *v >= thresholds.milestone_threshold)
    .count();
    if doubled >= 3 {
        out.push(Milestone::TripleDouble);
    }
    if player.points >= thresholds.high_scorer_points {
        out.push(Milestone::HighScorer);
    }
    out
}

fn event(
    game_id: &str,
    kind: EventKind,
    label: impl Into<String>,
    detail: EventDetail,
) -> ReportableEvent {
    ReportableEvent {
        key: EventKey::new(game_id, kind, label),
        detail,
    }
}
