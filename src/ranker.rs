use std::cmp::Ordering;

use crate::types::{
    DailyLeaders, GameSnapshot, GameStatus, LeaderCategory, LeaderEntry, PlayerStatLine, Side,
};

/// Number of performers shown per team in a message.
pub const TOP_PERFORMERS: usize = 2;

/// Ranking order: points, then PTS+REB+AST, both descending.
fn compare(a: &PlayerStatLine, b: &PlayerStatLine) -> Ordering {
    b.points
        .cmp(&a.points)
        .then_with(|| b.production().cmp(&a.production()))
}

/// Select the top `n` players who played, without sorting the whole roster.
///
/// Keeps an `n`-slot buffer ordered best-first; a candidate only displaces an
/// entry it strictly beats, so equal lines keep their input order.
pub fn top_performers<'a, I>(players: I, n: usize) -> Vec<&'a PlayerStatLine>
where
    I: IntoIterator<Item = &'a PlayerStatLine>,
{
    let mut best: Vec<&PlayerStatLine> = Vec::with_capacity(n + 1);
    if n == 0 {
        return best;
    }
    for player in players.into_iter().filter(|p| p.played) {
        let pos = best
            .iter()
            .position(|held| compare(player, held) == Ordering::Less)
            .unwrap_or(best.len());
        if pos < n {
            best.insert(pos, player);
            best.truncate(n);
        }
    }
    best
}

/// Top `n` performers for one side of a snapshot.
pub fn rank(snapshot: &GameSnapshot, side: Side, n: usize) -> Vec<&PlayerStatLine> {
    top_performers(snapshot.players_for(side), n)
}

/// Best line per category across the completed games in `snapshots`.
///
/// Ties keep the first line seen, so the result follows schedule order.
pub fn daily_leaders<'a, I>(snapshots: I) -> DailyLeaders
where
    I: IntoIterator<Item = &'a GameSnapshot>,
{
    let mut best: Vec<Option<&PlayerStatLine>> = vec![None; LeaderCategory::ALL.len()];
    for snapshot in snapshots
        .into_iter()
        .filter(|s| s.status == GameStatus::Final)
    {
        for player in snapshot.players.iter().filter(|p| p.played) {
            for (slot, category) in best.iter_mut().zip(LeaderCategory::ALL) {
                let value = category.value(player);
                let better = match *slot {
                    Some(held) => value > category.value(held),
                    None => value > 0,
                };
                if better {
                    *slot = Some(player);
                }
            }
        }
    }

    let entries = LeaderCategory::ALL
        .into_iter()
        .zip(best)
        .filter_map(|(category, line)| {
            line.map(|p| LeaderEntry {
                category,
                player: p.name.clone(),
                team: p.team.clone(),
                value: category.value(p),
            })
        })
        .collect();
    DailyLeaders { entries }
}
