//! Slack mrkdwn rendering for detected events.

use chrono::NaiveDate;

use crate::ranker::{TOP_PERFORMERS, rank};
use crate::types::{
    DailyLeaders, EventDetail, GameSnapshot, LeaderCategory, Milestone, PlayerStatLine,
    ReportableEvent, Side, TeamStats, period_label,
};

/// Render one event for the given game snapshot.
pub fn format_event(event: &ReportableEvent, snapshot: &GameSnapshot) -> String {
    match &event.detail {
        EventDetail::GameStart => format!(
            ":basketball: Tip-off: *{} at {}*",
            snapshot.away.name, snapshot.home.name
        ),
        EventDetail::QuarterEnd { period } => {
            let phase = if snapshot.regulation_fallback && *period == 4 {
                "End of Q4".to_string()
            } else {
                format!("End of {}", period_label(*period))
            };
            period_update(snapshot, &phase)
        }
        EventDetail::Halftime => period_update(snapshot, "Halftime"),
        EventDetail::Final { period } => period_update(snapshot, &final_phase(*period)),
        EventDetail::CloseGame { margin, period } => format!(
            ":rotating_light: Close game in the {}: {} ({} pt margin)",
            period_label(*period),
            score_line(snapshot),
            margin
        ),
        EventDetail::Performance { player, milestones } => {
            let what = milestones
                .iter()
                .map(|m| milestone_text(*m, player))
                .collect::<Vec<_>>()
                .join(" + ");
            let opponent = match side_of(snapshot, player) {
                Some(Side::Home) => &snapshot.away.tricode,
                _ => &snapshot.home.tricode,
            };
            format!(
                ":fire: *{}* ({} vs {}) {}: {}",
                player.name,
                player.team,
                opponent,
                what,
                box_line(player)
            )
        }
    }
}

/// `Final`, `Final/OT`, `Final/2OT`...
pub fn final_phase(period: u8) -> String {
    if period <= 4 {
        "Final".to_string()
    } else {
        format!("Final/{}", period_label(period))
    }
}

/// Leader first; away first when tied.
pub fn score_line(snapshot: &GameSnapshot) -> String {
    let (leader, trailer) = snapshot.leader_and_trailer();
    let (l, t) = (snapshot.team(leader), snapshot.team(trailer));
    let tied = if snapshot.is_tied() { " (tied)" } else { "" };
    format!("*{} {}-{} {}*{}", l.name, l.score, t.score, t.name, tied)
}

fn period_update(snapshot: &GameSnapshot, phase: &str) -> String {
    let mut lines = vec![
        format!("{} | {}", score_line(snapshot), phase),
        linescore_line(snapshot),
    ];
    let (leader, trailer) = snapshot.leader_and_trailer();
    for side in [leader, trailer] {
        let team = snapshot.team(side);
        lines.push(format!("*Top Performers* | {}", team.name));
        let top = rank(snapshot, side, TOP_PERFORMERS);
        if top.is_empty() {
            lines.push("  _No player stats yet_".to_string());
        }
        for player in top {
            lines.push(format!("  • {}: {}", player.name, box_line(player)));
        }
        if let Some(stats) = &team.stats {
            lines.extend(team_stat_lines(stats));
        }
    }
    lines.join("\n")
}

/// Per-period scores (away first) followed by the box score link.
///
/// Only periods both teams have scores for, and never past the current one.
pub fn linescore_line(snapshot: &GameSnapshot) -> String {
    let (away, home) = (&snapshot.away, &snapshot.home);
    let mut played = away.linescore.len().min(home.linescore.len());
    if snapshot.period > 0 {
        played = played.min(usize::from(snapshot.period));
    }
    let link = format!("<https://www.nba.com/game/{}/box-score|Box Score>", snapshot.game_id);
    if played == 0 {
        return link;
    }
    let periods = (0..played)
        .map(|i| {
            // Periods are 1-based; linescores never run past 255 entries.
            let label = period_label(u8::try_from(i + 1).unwrap_or(u8::MAX));
            format!("{label} {}-{}", away.linescore[i], home.linescore[i])
        })
        .collect::<Vec<_>>()
        .join(" | ");
    format!("_{} @ {}: {periods}_ | {link}", away.tricode, home.tricode)
}

/// Shooting, bench, counting stats, then game flow.
pub fn team_stat_lines(stats: &TeamStats) -> [String; 3] {
    [
        format!(
            "  _{}/{} {}% FG | {}/{} {}% 3P | {} Bench PTS_",
            stats.field_goals_made,
            stats.field_goals_attempted,
            stats.field_goal_pct(),
            stats.three_pointers_made,
            stats.three_pointers_attempted,
            stats.three_point_pct(),
            stats.bench_points
        ),
        format!(
            "  _{} REB | {} AST | {} STL | {} BLK_",
            stats.rebounds, stats.assists, stats.steals, stats.blocks
        ),
        format!(
            "  _Lead {} | Run {} | Paint {}_",
            stats.biggest_lead, stats.biggest_run, stats.points_in_paint
        ),
    ]
}

/// `PTS | REB | AST`, plus the single most notable extra stat.
pub fn box_line(player: &PlayerStatLine) -> String {
    let mut line = format!(
        "{} PTS | {} REB | {} AST",
        player.points, player.rebounds, player.assists
    );
    if let Some(extra) = notable_stat(player) {
        line.push_str(" | ");
        line.push_str(&extra);
    }
    line
}

/// Perfect shooting beats threes, threes beat steals/blocks.
pub fn notable_stat(player: &PlayerStatLine) -> Option<String> {
    if player.is_perfect_shooting() {
        return Some(format!(
            "{}-{} FG",
            player.field_goals_made, player.field_goals_attempted
        ));
    }
    if player.three_pointers_made > 0 {
        return Some(format!("{} 3PM", player.three_pointers_made));
    }
    if player.steals > 0 && player.steals >= player.blocks {
        return Some(format!("{} STL", player.steals));
    }
    if player.blocks > 0 {
        return Some(format!("{} BLK", player.blocks));
    }
    None
}

fn milestone_text(milestone: Milestone, player: &PlayerStatLine) -> String {
    match milestone {
        Milestone::TripleDouble => "triple-double".to_string(),
        Milestone::HighScorer => format!("{}-point game", player.points),
    }
}

fn format_night_recap_header(date: NaiveDate) -> String {
    format!("*NBA Final Scores | {}*", date.format("%B %-d, %Y"))
}

/// End-of-night recap: every final score, overtime games first, then by
/// combined points; optionally followed by the day's leaders.
pub fn format_night_recap(
    date: NaiveDate,
    snapshots: &[GameSnapshot],
    leaders: Option<&DailyLeaders>,
) -> String {
    let mut games: Vec<&GameSnapshot> = snapshots.iter().collect();
    games.sort_by_key(|g| std::cmp::Reverse((g.period > 4, g.home.score + g.away.score)));

    let mut lines = vec![format_night_recap_header(date)];
    for game in games {
        let (winner, loser) = game.leader_and_trailer();
        let (w, l) = (game.team(winner), game.team(loser));
        let ot = if game.period > 4 {
            format!(" ({})", period_label(game.period))
        } else {
            String::new()
        };
        lines.push(format!("• {} {}-{} {}{}", w.name, w.score, l.score, l.name, ot));
    }

    if let Some(leaders) = leaders.filter(|l| !l.entries.is_empty()) {
        lines.push(String::new());
        lines.push("*Tonight's Leaders*".to_string());
        for category in LeaderCategory::ALL {
            if let Some(entry) = leaders.get(category) {
                lines.push(format!(
                    "  {}: {} ({}) {}",
                    category.label(),
                    entry.player,
                    entry.team,
                    entry.value
                ));
            }
        }
    }
    lines.join("\n")
}

/// Which side a player's team is on, if either.
pub fn side_of(snapshot: &GameSnapshot, player: &PlayerStatLine) -> Option<Side> {
    if player.team == snapshot.home.tricode {
        Some(Side::Home)
    } else if player.team == snapshot.away.tricode {
        Some(Side::Away)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventKey, EventKind, GameStatus, LeaderEntry, TeamLine};

    fn line(name: &str, team: &str, pts: u32, reb: u32, ast: u32) -> PlayerStatLine {
        PlayerStatLine {
            name: name.into(),
            team: team.into(),
            played: true,
            points: pts,
            rebounds: reb,
            assists: ast,
            three_pointers_made: 0,
            steals: 0,
            blocks: 0,
            field_goals_made: 0,
            field_goals_attempted: 0,
        }
    }

    fn game(home: u32, away: u32, period: u8) -> GameSnapshot {
        let mut tatum = line("Jayson Tatum", "BOS", 20, 5, 3);
        tatum.three_pointers_made = 4;
        let mut brown = line("Jaylen Brown", "BOS", 14, 2, 1);
        brown.field_goals_made = 6;
        brown.field_goals_attempted = 6;
        let mut brunson = line("Jalen Brunson", "NYK", 16, 1, 6);
        brunson.steals = 2;
        GameSnapshot {
            game_id: "0022400101".into(),
            home: TeamLine::new("Celtics", "BOS", home),
            away: TeamLine::new("Knicks", "NYK", away),
            status: GameStatus::InProgress,
            period,
            period_ended: true,
            regulation_fallback: false,
            status_text: String::new(),
            clock: String::new(),
            players: vec![
                brunson,
                line("Josh Hart", "NYK", 8, 7, 2),
                line("OG Anunoby", "NYK", 8, 3, 1),
                tatum,
                brown,
                line("Al Horford", "BOS", 5, 4, 1),
            ],
        }
    }

    fn ev(kind: EventKind, label: &str, detail: EventDetail) -> ReportableEvent {
        ReportableEvent {
            key: EventKey::new("0022400101", kind, label),
            detail,
        }
    }

    // ── period updates ─────────────────────────────────────────────

    #[test]
    fn end_of_first_quarter_message() {
        let snap = game(61, 51, 1);
        let msg = format_event(
            &ev(EventKind::QuarterEnd, "1Q", EventDetail::QuarterEnd { period: 1 }),
            &snap,
        );
        let lines: Vec<&str> = msg.lines().collect();
        assert_eq!(lines[0], "*Celtics 61-51 Knicks* | End of 1Q");
        assert_eq!(lines[1], "<https://www.nba.com/game/0022400101/box-score|Box Score>");
        assert_eq!(lines[2], "*Top Performers* | Celtics");
        assert_eq!(lines[3], "  • Jayson Tatum: 20 PTS | 5 REB | 3 AST | 4 3PM");
        assert_eq!(lines[4], "  • Jaylen Brown: 14 PTS | 2 REB | 1 AST | 6-6 FG");
        assert_eq!(lines[5], "*Top Performers* | Knicks");
        assert_eq!(lines[6], "  • Jalen Brunson: 16 PTS | 1 REB | 6 AST | 2 STL");
        // Hart and Anunoby tie on points; Hart has more production
        assert_eq!(lines[7], "  • Josh Hart: 8 PTS | 7 REB | 2 AST");
        assert_eq!(lines.len(), 8);
    }

    #[test]
    fn linescore_stops_at_current_period() {
        let mut snap = game(88, 80, 3);
        snap.away.linescore = vec![28, 25, 27, 0];
        snap.home.linescore = vec![30, 21, 37, 0];
        assert_eq!(
            linescore_line(&snap),
            "_NYK @ BOS: 1Q 28-30 | 2Q 25-21 | 3Q 27-37_ | \
             <https://www.nba.com/game/0022400101/box-score|Box Score>"
        );

        // one side missing its periods means no linescore at all
        snap.home.linescore.clear();
        assert_eq!(
            linescore_line(&snap),
            "<https://www.nba.com/game/0022400101/box-score|Box Score>"
        );
    }

    #[test]
    fn linescore_labels_overtime() {
        let mut snap = game(120, 118, 5);
        snap.away.linescore = vec![30, 30, 30, 20, 8];
        snap.home.linescore = vec![25, 35, 30, 20, 10];
        let line = linescore_line(&snap);
        assert!(line.contains("| 4Q 20-20 | OT 8-10_"));
    }

    #[test]
    fn team_stats_follow_each_teams_performers() {
        let mut snap = game(61, 51, 1);
        snap.home.stats = Some(TeamStats {
            field_goals_made: 23,
            field_goals_attempted: 45,
            three_pointers_made: 9,
            three_pointers_attempted: 20,
            rebounds: 22,
            assists: 14,
            steals: 5,
            blocks: 3,
            bench_points: 12,
            biggest_lead: 14,
            biggest_run: 9,
            points_in_paint: 24,
        });
        let msg = format_event(
            &ev(EventKind::QuarterEnd, "1Q", EventDetail::QuarterEnd { period: 1 }),
            &snap,
        );
        let lines: Vec<&str> = msg.lines().collect();
        assert_eq!(lines[4], "  • Jaylen Brown: 14 PTS | 2 REB | 1 AST | 6-6 FG");
        assert_eq!(lines[5], "  _23/45 51% FG | 9/20 45% 3P | 12 Bench PTS_");
        assert_eq!(lines[6], "  _22 REB | 14 AST | 5 STL | 3 BLK_");
        assert_eq!(lines[7], "  _Lead 14 | Run 9 | Paint 24_");
        assert_eq!(lines[8], "*Top Performers* | Knicks");
        // the Knicks have no totals, so nothing follows their performers
        assert_eq!(lines.len(), 11);
    }

    #[test]
    fn percentages_without_attempts_are_zero() {
        let stats = TeamStats::default();
        assert_eq!(team_stat_lines(&stats)[0], "  _0/0 0% FG | 0/0 0% 3P | 0 Bench PTS_");
    }

    #[test]
    fn trailing_home_team_goes_second() {
        let snap = game(40, 44, 2);
        let msg = format_event(&ev(EventKind::Halftime, "2Q", EventDetail::Halftime), &snap);
        assert!(msg.starts_with("*Knicks 44-40 Celtics* | Halftime"));
        let knicks = msg.find("| Knicks").unwrap();
        let celtics = msg.find("| Celtics").unwrap();
        assert!(knicks < celtics);
    }

    #[test]
    fn tied_score_lists_away_first() {
        let snap = game(99, 99, 4);
        assert_eq!(score_line(&snap), "*Knicks 99-99 Celtics* (tied)");
    }

    #[test]
    fn regulation_fallback_phrasing() {
        let mut snap = game(101, 99, 4);
        snap.regulation_fallback = true;
        let msg = format_event(
            &ev(EventKind::QuarterEnd, "4Q", EventDetail::QuarterEnd { period: 4 }),
            &snap,
        );
        assert!(msg.lines().next().unwrap().ends_with("| End of Q4"));
    }

    #[test]
    fn final_phrasing() {
        assert_eq!(final_phase(4), "Final");
        assert_eq!(final_phase(5), "Final/OT");
        assert_eq!(final_phase(7), "Final/3OT");
        let snap = game(110, 108, 5);
        let msg = format_event(&ev(EventKind::Final, "OT", EventDetail::Final { period: 5 }), &snap);
        assert!(msg.starts_with("*Celtics 110-108 Knicks* | Final/OT"));
    }

    #[test]
    fn empty_rosters_say_so() {
        let mut snap = game(2, 0, 1);
        snap.players.clear();
        let msg = format_event(
            &ev(EventKind::QuarterEnd, "1Q", EventDetail::QuarterEnd { period: 1 }),
            &snap,
        );
        assert_eq!(msg.matches("No player stats yet").count(), 2);
    }

    // ── alerts ─────────────────────────────────────────────────────

    #[test]
    fn alert_messages() {
        let snap = game(95, 92, 4);
        let start = format_event(&ev(EventKind::GameStart, "TIP", EventDetail::GameStart), &snap);
        assert_eq!(start, ":basketball: Tip-off: *Knicks at Celtics*");

        let close = format_event(
            &ev(EventKind::CloseGameAlert, "LATE", EventDetail::CloseGame { margin: 3, period: 4 }),
            &snap,
        );
        assert_eq!(close, ":rotating_light: Close game in the 4Q: *Celtics 95-92 Knicks* (3 pt margin)");

        let star = line("Jalen Brunson", "NYK", 42, 10, 11);
        let perf = format_event(
            &ev(
                EventKind::PerformanceAlert,
                "Jalen Brunson",
                EventDetail::Performance {
                    player: star,
                    milestones: vec![Milestone::TripleDouble, Milestone::HighScorer],
                },
            ),
            &snap,
        );
        assert_eq!(
            perf,
            ":fire: *Jalen Brunson* (NYK vs BOS) triple-double + 42-point game: 42 PTS | 10 REB | 11 AST"
        );
    }

    #[test]
    fn notable_stat_priority() {
        let mut p = line("P", "BOS", 10, 0, 0);
        assert_eq!(notable_stat(&p), None);
        p.blocks = 3;
        assert_eq!(notable_stat(&p).as_deref(), Some("3 BLK"));
        p.steals = 3;
        assert_eq!(notable_stat(&p).as_deref(), Some("3 STL"));
        p.three_pointers_made = 1;
        assert_eq!(notable_stat(&p).as_deref(), Some("1 3PM"));
        p.field_goals_made = 4;
        p.field_goals_attempted = 4;
        assert_eq!(notable_stat(&p).as_deref(), Some("4-4 FG"));
    }

    // ── night recap ────────────────────────────────────────────────

    #[test]
    fn night_recap_orders_overtime_first() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let mut regulation = game(130, 120, 4);
        regulation.status = GameStatus::Final;
        let mut overtime = game(101, 103, 5);
        overtime.status = GameStatus::Final;
        let leaders = DailyLeaders {
            entries: vec![LeaderEntry {
                category: LeaderCategory::Points,
                player: "Jayson Tatum".into(),
                team: "BOS".into(),
                value: 20,
            }],
        };
        let msg = format_night_recap(date, &[regulation, overtime], Some(&leaders));
        let lines: Vec<&str> = msg.lines().collect();
        assert_eq!(lines[0], "*NBA Final Scores | October 19, 2026*");
        assert_eq!(lines[1], "• Knicks 103-101 Celtics (OT)");
        assert_eq!(lines[2], "• Celtics 130-120 Knicks");
        assert_eq!(lines[4], "*Tonight's Leaders*");
        assert_eq!(lines[5], "  PTS: Jayson Tatum (BOS) 20");
    }

    #[test]
    fn night_recap_without_leaders() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let msg = format_night_recap(date, &[game(100, 90, 4)], None);
        assert!(!msg.contains("Leaders"));
        assert_eq!(msg.lines().count(), 2);
    }
}
