//! Schema validation for provider payloads.
//!
//! Raw JSON is deserialized into permissive `Raw*` structs (every field
//! optional), then checked for the fields a snapshot cannot do without.
//! Boxscore fields win over schedule fields when both are present, since the
//! schedule's status text is known to lag behind.

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::NormalizeRules;
use crate::error::MalformedPayload;
use crate::types::{GameSnapshot, GameStatus, PlayerStatLine, TeamLine, TeamStats};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawScheduleGame {
    game_id: Option<String>,
    game_status: Option<u8>,
    game_status_text: Option<String>,
    period: Option<u8>,
    #[serde(alias = "gameClock")]
    clock: Option<String>,
    home_team: Option<RawTeam>,
    visitor_team: Option<RawTeam>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTeam {
    team_name: Option<String>,
    team_tricode: Option<String>,
    score: Option<u32>,
    #[serde(default)]
    players: Vec<RawPlayer>,
    /// Team totals, decoded on their own so a quirk here never rejects the game.
    statistics: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawTeamStats {
    field_goals_made: u32,
    field_goals_attempted: u32,
    three_pointers_made: u32,
    three_pointers_attempted: u32,
    rebounds_personal: u32,
    assists: u32,
    steals: u32,
    blocks: u32,
    bench_points: u32,
    biggest_lead: u32,
    biggest_scoring_run: u32,
    points_in_the_paint: u32,
    periods: Vec<RawPeriodScore>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPeriodScore {
    points: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBoxscore {
    game_status: Option<u8>,
    game_status_text: Option<String>,
    period: Option<u8>,
    game_clock: Option<String>,
    home_team: Option<RawTeam>,
    away_team: Option<RawTeam>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPlayer {
    name: Option<String>,
    #[serde(default)]
    played: Value,
    #[serde(default)]
    statistics: RawPlayerStats,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawPlayerStats {
    points: u32,
    rebounds_total: u32,
    assists: u32,
    steals: u32,
    blocks: u32,
    three_pointers_made: u32,
    field_goals_made: u32,
    field_goals_attempted: u32,
}

/// Extract the given date's games from a rolling schedule payload.
///
/// Dates in the payload look like `MM/DD/YYYY HH:MM:SS`. A date with no
/// entry yields an empty list, not an error.
pub fn parse_schedule(payload: &Value, date: NaiveDate) -> Result<Vec<Value>, MalformedPayload> {
    let game_dates = payload
        .get("rollingSchedule")
        .and_then(|s| s.get("gameDates"))
        .and_then(Value::as_array)
        .ok_or_else(|| MalformedPayload::new("schedule", "missing rollingSchedule.gameDates"))?;

    let prefix = date.format("%m/%d/%Y").to_string();
    for entry in game_dates {
        let matches = entry
            .get("gameDate")
            .and_then(Value::as_str)
            .is_some_and(|d| d.starts_with(&prefix));
        if matches {
            return entry
                .get("games")
                .and_then(Value::as_array)
                .cloned()
                .ok_or_else(|| MalformedPayload::new("schedule", format!("{prefix} has no games array")));
        }
    }
    Ok(Vec::new())
}

/// Game id of a schedule entry, if it has one.
pub fn schedule_game_id(entry: &Value) -> Option<String> {
    entry
        .get("gameId")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Coarse status of a schedule entry on its own, without scores or period.
///
/// Used to decide which boxscores to fetch; `None` when the entry carries no
/// usable status code.
pub fn schedule_status(entry: &Value) -> Option<GameStatus> {
    let text = entry
        .get("gameStatusText")
        .and_then(Value::as_str)
        .unwrap_or_default();
    match entry.get("gameStatus").and_then(Value::as_u64)? {
        1 => Some(GameStatus::Scheduled),
        3 => Some(GameStatus::Final),
        2 if text.contains("Final") => Some(GameStatus::Final),
        2 if text.contains("Half") => Some(GameStatus::Halftime),
        2 => Some(GameStatus::InProgress),
        _ => None,
    }
}

/// Build a snapshot from a schedule entry and, when available, its boxscore.
pub fn normalize(
    schedule_entry: &Value,
    boxscore: Option<&Value>,
    rules: &NormalizeRules,
) -> Result<GameSnapshot, MalformedPayload> {
    let sched: RawScheduleGame = serde_json::from_value(schedule_entry.clone())
        .map_err(|e| MalformedPayload::new(schedule_game_id(schedule_entry).unwrap_or_default(), e.to_string()))?;
    let game_id = sched
        .game_id
        .clone()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| MalformedPayload::new("", "missing gameId"))?;

    let bx: RawBoxscore = match boxscore {
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| MalformedPayload::new(&game_id, format!("boxscore: {e}")))?,
        None => RawBoxscore::default(),
    };

    let home = merge_team(&game_id, "home", bx.home_team.as_ref(), sched.home_team.as_ref())?;
    let away = merge_team(&game_id, "away", bx.away_team.as_ref(), sched.visitor_team.as_ref())?;

    let status_code = bx
        .game_status
        .or(sched.game_status)
        .ok_or_else(|| MalformedPayload::new(&game_id, "missing gameStatus"))?;
    let status_text = bx
        .game_status_text
        .or(sched.game_status_text)
        .unwrap_or_default()
        .trim()
        .to_string();
    let clock = bx
        .game_clock
        .or(sched.clock)
        .unwrap_or_default()
        .trim()
        .to_string();
    let tied = home.score == away.score;

    let regulation_end = rules
        .regulation_markers
        .iter()
        .any(|m| !m.is_empty() && status_text.contains(m.as_str()));

    let mut period = bx.period.or(sched.period);
    let mut regulation_fallback = false;
    if regulation_end && rules.regulation_fallback && period != Some(4) {
        period = Some(4);
        regulation_fallback = true;
    }

    let mut status = match status_code {
        1 => GameStatus::Scheduled,
        2 if status_text.contains("Half") => GameStatus::Halftime,
        2 => GameStatus::InProgress,
        3 => GameStatus::Final,
        other => {
            return Err(MalformedPayload::new(&game_id, format!("unknown gameStatus {other}")));
        }
    };
    if status != GameStatus::Scheduled && status_text.contains("Final") {
        status = GameStatus::Final;
    }
    // End of regulation with a winner is final even before gameStatus flips;
    // tied means overtime is coming.
    if regulation_end && status == GameStatus::InProgress && !tied {
        status = GameStatus::Final;
    }

    let period = match (period, status) {
        (Some(p), _) => p,
        (None, GameStatus::Scheduled) => 0,
        (None, _) => return Err(MalformedPayload::new(&game_id, "missing period")),
    };

    let clock_expired = matches!(clock.as_str(), "0:00" | "00:00" | "0:00.0" | "PT00M00.00S");
    let period_ended = status == GameStatus::Final
        || status == GameStatus::Halftime
        || (status == GameStatus::InProgress
            && period > 0
            && (status_text.starts_with("End") || clock_expired));

    if status == GameStatus::InProgress && period == 2 && period_ended {
        status = GameStatus::Halftime;
    }
    // The buzzer at the end of the 4th or an overtime with a winner ends the
    // game, whatever gameStatus says yet.
    if status == GameStatus::InProgress && period >= 4 && period_ended && !tied {
        status = GameStatus::Final;
    }

    let mut players = Vec::new();
    for (team, raw) in [(&away, bx.away_team.as_ref()), (&home, bx.home_team.as_ref())] {
        if let Some(raw) = raw {
            players.extend(raw.players.iter().map(|p| player_line(p, &team.tricode)));
        }
    }

    Ok(GameSnapshot {
        game_id,
        home,
        away,
        status,
        period,
        period_ended,
        regulation_fallback,
        status_text,
        clock,
        players,
    })
}

fn merge_team(
    game_id: &str,
    side: &str,
    boxscore: Option<&RawTeam>,
    schedule: Option<&RawTeam>,
) -> Result<TeamLine, MalformedPayload> {
    let pick = |f: fn(&RawTeam) -> Option<String>| {
        boxscore.and_then(f).or_else(|| schedule.and_then(f))
    };
    let score = boxscore
        .and_then(|t| t.score)
        .or_else(|| schedule.and_then(|t| t.score))
        .ok_or_else(|| MalformedPayload::new(game_id, format!("missing {side} score")))?;
    let tricode = pick(|t| t.team_tricode.clone())
        .ok_or_else(|| MalformedPayload::new(game_id, format!("missing {side} teamTricode")))?;
    let name = pick(|t| t.team_name.clone()).unwrap_or_else(|| tricode.clone());

    let totals = boxscore
        .and_then(|t| t.statistics.as_ref())
        .and_then(|v| match RawTeamStats::deserialize(v) {
            Ok(stats) => Some(stats),
            Err(e) => {
                debug!("{game_id}: ignoring {side} team statistics: {e}");
                None
            }
        });
    let linescore = totals
        .as_ref()
        .map(|t| t.periods.iter().map(|p| p.points).collect())
        .unwrap_or_default();
    let stats = totals.map(|t| TeamStats {
        field_goals_made: t.field_goals_made,
        field_goals_attempted: t.field_goals_attempted,
        three_pointers_made: t.three_pointers_made,
        three_pointers_attempted: t.three_pointers_attempted,
        rebounds: t.rebounds_personal,
        assists: t.assists,
        steals: t.steals,
        blocks: t.blocks,
        bench_points: t.bench_points,
        biggest_lead: t.biggest_lead,
        biggest_run: t.biggest_scoring_run,
        points_in_paint: t.points_in_the_paint,
    });

    Ok(TeamLine {
        name,
        tricode,
        score,
        linescore,
        stats,
    })
}

fn player_line(raw: &RawPlayer, team: &str) -> PlayerStatLine {
    let played = match &raw.played {
        Value::String(s) => s == "1",
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_u64() == Some(1),
        _ => false,
    };
    let s = &raw.statistics;
    PlayerStatLine {
        name: raw.name.clone().unwrap_or_else(|| "Unknown".to_string()),
        team: team.to_string(),
        played,
        points: s.points,
        rebounds: s.rebounds_total,
        assists: s.assists,
        three_pointers_made: s.three_pointers_made,
        steals: s.steals,
        blocks: s.blocks,
        field_goals_made: s.field_goals_made,
        field_goals_attempted: s.field_goals_attempted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(status: u8, text: &str, period: Option<u8>, home: u32, away: u32) -> Value {
        let mut v = json!({
            "gameId": "0022400101",
            "gameStatus": status,
            "gameStatusText": text,
            "homeTeam": { "teamName": "Celtics", "teamTricode": "BOS", "score": home },
            "visitorTeam": { "teamName": "Knicks", "teamTricode": "NYK", "score": away },
        });
        if let Some(p) = period {
            v["period"] = json!(p);
        }
        v
    }

    fn boxscore() -> Value {
        json!({
            "homeTeam": {
                "teamTricode": "BOS",
                "score": 61,
                "players": [
                    { "name": "Jayson Tatum", "played": "1",
                      "statistics": { "points": 20, "reboundsTotal": 5, "assists": 3, "threePointersMade": 4 } },
                    { "name": "Bench Guy", "played": "0", "statistics": {} }
                ]
            },
            "awayTeam": {
                "teamTricode": "NYK",
                "score": 51,
                "players": [
                    { "name": "Jalen Brunson", "played": "1",
                      "statistics": { "points": 14, "assists": 6 } }
                ]
            }
        })
    }

    // ── schedule ────────────────────────────────────────────────────

    #[test]
    fn schedule_picks_matching_date() {
        let payload = json!({
            "rollingSchedule": { "gameDates": [
                { "gameDate": "10/18/2026 00:00:00", "games": [ { "gameId": "a" } ] },
                { "gameDate": "10/19/2026 00:00:00", "games": [ { "gameId": "b" }, { "gameId": "c" } ] }
            ]}
        });
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let games = parse_schedule(&payload, date).unwrap();
        assert_eq!(games.len(), 2);
        assert_eq!(schedule_game_id(&games[0]).as_deref(), Some("b"));
    }

    #[test]
    fn schedule_without_date_is_empty() {
        let payload = json!({ "rollingSchedule": { "gameDates": [] } });
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert!(parse_schedule(&payload, date).unwrap().is_empty());
    }

    #[test]
    fn schedule_status_without_boxscore() {
        assert_eq!(schedule_status(&entry(1, "7:30 pm ET", None, 0, 0)), Some(GameStatus::Scheduled));
        assert_eq!(schedule_status(&entry(2, "Q2 3:10", Some(2), 40, 38)), Some(GameStatus::InProgress));
        assert_eq!(schedule_status(&entry(2, "Final", Some(4), 99, 97)), Some(GameStatus::Final));
        assert_eq!(schedule_status(&entry(3, "Final/OT", Some(5), 110, 108)), Some(GameStatus::Final));
        assert_eq!(schedule_status(&json!({ "gameId": "x" })), None);
    }

    #[test]
    fn schedule_without_root_is_malformed() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert!(parse_schedule(&json!({ "oops": 1 }), date).is_err());
    }

    // ── normalize ───────────────────────────────────────────────────

    #[test]
    fn end_of_first_quarter_with_boxscore() {
        let rules = NormalizeRules::default();
        let snap = normalize(&entry(2, "End of Q1", Some(1), 0, 0), Some(&boxscore()), &rules).unwrap();
        assert_eq!(snap.status, GameStatus::InProgress);
        assert_eq!(snap.period, 1);
        assert!(snap.period_ended);
        // boxscore scores win over the lagging schedule
        assert_eq!(snap.home.score, 61);
        assert_eq!(snap.away.score, 51);
        assert_eq!(snap.home.name, "Celtics");
        assert_eq!(snap.players.len(), 3);
        assert_eq!(snap.players[0].name, "Jalen Brunson");
        assert_eq!(snap.players[0].team, "NYK");
        assert!(snap.players[1].played);
        assert!(!snap.players[2].played);
        assert_eq!(snap.players[1].three_pointers_made, 4);
    }

    #[test]
    fn mid_quarter_is_not_ended() {
        let rules = NormalizeRules::default();
        let snap = normalize(&entry(2, "Q3 5:32", Some(3), 70, 66), None, &rules).unwrap();
        assert_eq!(snap.status, GameStatus::InProgress);
        assert!(!snap.period_ended);
        assert_eq!(snap.last_ended_period(), 2);
    }

    #[test]
    fn halftime_from_text_and_from_clock() {
        let rules = NormalizeRules::default();
        let snap = normalize(&entry(2, "Halftime", Some(2), 50, 48), None, &rules).unwrap();
        assert_eq!(snap.status, GameStatus::Halftime);
        assert!(snap.period_ended);

        let mut e = entry(2, "Q2", Some(2), 50, 48);
        e["clock"] = json!("0:00");
        let snap = normalize(&e, None, &rules).unwrap();
        assert_eq!(snap.status, GameStatus::Halftime);
    }

    #[test]
    fn final_status() {
        let rules = NormalizeRules::default();
        let snap = normalize(&entry(3, "Final", Some(4), 101, 99), None, &rules).unwrap();
        assert_eq!(snap.status, GameStatus::Final);
        assert_eq!(snap.last_ended_period(), 4);
    }

    #[test]
    fn buzzer_with_a_winner_is_final() {
        let rules = NormalizeRules::default();
        let mut e = entry(2, "Q4 0:00", Some(4), 101, 99);
        e["clock"] = json!("0:00");
        let snap = normalize(&e, None, &rules).unwrap();
        assert_eq!(snap.status, GameStatus::Final);
        assert_eq!(snap.period, 4);
        assert!(!snap.regulation_fallback);

        let mut e = entry(2, "End of 2OT", Some(6), 130, 124);
        e["clock"] = json!("0:00");
        assert_eq!(normalize(&e, None, &rules).unwrap().status, GameStatus::Final);
    }

    #[test]
    fn buzzer_with_a_tie_goes_to_overtime() {
        let rules = NormalizeRules::default();
        let mut e = entry(2, "Q4 0:00", Some(4), 99, 99);
        e["clock"] = json!("0:00");
        let snap = normalize(&e, None, &rules).unwrap();
        assert_eq!(snap.status, GameStatus::InProgress);
        assert!(snap.period_ended);

        // end of the 3rd with a lead is just a quarter end
        let mut e = entry(2, "Q3 0:00", Some(3), 80, 70);
        e["clock"] = json!("0:00");
        assert_eq!(normalize(&e, None, &rules).unwrap().status, GameStatus::InProgress);
    }

    #[test]
    fn team_totals_and_linescore_from_boxscore() {
        let rules = NormalizeRules::default();
        let mut bx = boxscore();
        bx["homeTeam"]["statistics"] = json!({
            "fieldGoalsMade": 23, "fieldGoalsAttempted": 45,
            "threePointersMade": 9, "threePointersAttempted": 20,
            "fieldGoalsPercentage": 0.511,
            "reboundsPersonal": 22, "reboundsTotal": 24, "assists": 14,
            "benchPoints": 12, "biggestLead": 14, "biggestScoringRun": 9, "pointsInThePaint": 24,
            "periods": [ { "period": 1, "points": 30 }, { "period": 2, "points": 31 } ]
        });
        let snap = normalize(&entry(2, "Halftime", Some(2), 0, 0), Some(&bx), &rules).unwrap();
        assert_eq!(snap.home.linescore, vec![30, 31]);
        let stats = snap.home.stats.unwrap();
        assert_eq!(stats.field_goals_made, 23);
        assert_eq!(stats.rebounds, 22);
        assert_eq!(stats.biggest_run, 9);
        assert_eq!(stats.points_in_paint, 24);
        assert_eq!(stats.field_goal_pct(), 51);
        // no totals on the away side, and the schedule never has them
        assert!(snap.away.stats.is_none());
        assert!(snap.away.linescore.is_empty());
    }

    #[test]
    fn garbled_team_totals_are_dropped_not_fatal() {
        let rules = NormalizeRules::default();
        let mut bx = boxscore();
        bx["homeTeam"]["statistics"] = json!({ "fieldGoalsMade": "lots", "periods": 3 });
        let snap = normalize(&entry(2, "Q1 4:00", Some(1), 0, 0), Some(&bx), &rules).unwrap();
        assert!(snap.home.stats.is_none());
        assert!(snap.home.linescore.is_empty());
        assert_eq!(snap.home.score, 61);
    }

    #[test]
    fn regulation_fallback_when_period_missing() {
        let rules = NormalizeRules::default();
        let snap = normalize(&entry(2, "End of Q4", None, 101, 99), None, &rules).unwrap();
        assert_eq!(snap.period, 4);
        assert!(snap.regulation_fallback);
        assert_eq!(snap.status, GameStatus::Final);
    }

    #[test]
    fn regulation_fallback_overrides_bogus_period() {
        let rules = NormalizeRules::default();
        let snap = normalize(&entry(2, "End of Q4", Some(5), 99, 99), None, &rules).unwrap();
        assert_eq!(snap.period, 4);
        assert!(snap.regulation_fallback);
        // tied at the end of regulation means overtime, not final
        assert_eq!(snap.status, GameStatus::InProgress);
        assert!(snap.period_ended);
    }

    #[test]
    fn fallback_disabled_leaves_period_missing() {
        let rules = NormalizeRules {
            regulation_fallback: false,
            ..NormalizeRules::default()
        };
        let err = normalize(&entry(2, "End of Q4", None, 101, 99), None, &rules).unwrap_err();
        assert!(err.reason.contains("period"));
    }

    #[test]
    fn scheduled_game_without_period() {
        let rules = NormalizeRules::default();
        let snap = normalize(&entry(1, "7:30 pm ET", None, 0, 0), None, &rules).unwrap();
        assert_eq!(snap.status, GameStatus::Scheduled);
        assert_eq!(snap.period, 0);
        assert!(!snap.period_ended);
    }

    #[test]
    fn missing_score_is_malformed() {
        let rules = NormalizeRules::default();
        let mut e = entry(2, "Q1", Some(1), 0, 0);
        e["homeTeam"].as_object_mut().unwrap().remove("score");
        let err = normalize(&e, None, &rules).unwrap_err();
        assert_eq!(err.game_id, "0022400101");
        assert!(err.reason.contains("home score"));
    }

    #[test]
    fn non_numeric_score_is_malformed() {
        let rules = NormalizeRules::default();
        let mut e = entry(2, "Q1", Some(1), 0, 0);
        e["homeTeam"]["score"] = json!("sixty");
        assert!(normalize(&e, None, &rules).is_err());
    }

    #[test]
    fn negative_score_is_malformed() {
        let rules = NormalizeRules::default();
        let mut e = entry(2, "Q1", Some(1), 0, 0);
        e["homeTeam"]["score"] = json!(-3);
        assert!(normalize(&e, None, &rules).is_err());
    }

    #[test]
    fn missing_status_is_malformed() {
        let rules = NormalizeRules::default();
        let mut e = entry(2, "Q1", Some(1), 0, 0);
        e.as_object_mut().unwrap().remove("gameStatus");
        assert!(normalize(&e, None, &rules).is_err());
    }

    #[test]
    fn garbage_boxscore_is_malformed() {
        let rules = NormalizeRules::default();
        let bad = json!({ "homeTeam": { "players": "nope" } });
        let err = normalize(&entry(2, "Q1", Some(1), 3, 2), Some(&bad), &rules).unwrap_err();
        assert!(err.reason.starts_with("boxscore"));
    }
}
