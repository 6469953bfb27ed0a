// Regular-season standings, playoff seeding, and waiver priority order.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::model::{Bot, Matchup, BYE_BOT_ID};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Standing {
    pub bot_id: String,
    pub wins: u32,
    pub losses: u32,
    pub points_for: f64,
    pub points_against: f64,
}

/// Standings from finished regular-season matchups, best first: wins desc,
/// points-for desc, bot id asc. Bye weeks, playoff games, and unfinished
/// matchups do not count.
pub fn leaderboard(bots: &[Bot], matchups: &[Matchup]) -> Vec<Standing> {
    let mut table: HashMap<&str, Standing> = bots
        .iter()
        .map(|b| {
            (
                b.id.as_str(),
                Standing {
                    bot_id: b.id.clone(),
                    wins: 0,
                    losses: 0,
                    points_for: 0.0,
                    points_against: 0.0,
                },
            )
        })
        .collect();

    for m in matchups {
        if !counts_for_standings(m) {
            continue;
        }
        let Some(winner) = m.winner_bot_id.as_deref() else {
            continue;
        };
        let sides = [
            (m.home_bot_id.as_str(), m.home_score, m.visitor_score),
            (m.visitor_bot_id.as_str(), m.visitor_score, m.home_score),
        ];
        for (bot_id, scored, allowed) in sides {
            if let Some(row) = table.get_mut(bot_id) {
                row.points_for += scored;
                row.points_against += allowed;
                if bot_id == winner {
                    row.wins += 1;
                } else {
                    row.losses += 1;
                }
            }
        }
    }

    let mut rows: Vec<Standing> = table.into_values().collect();
    rows.sort_by(|a, b| {
        b.wins
            .cmp(&a.wins)
            .then_with(|| b.points_for.total_cmp(&a.points_for))
            .then_with(|| a.bot_id.cmp(&b.bot_id))
    });
    rows
}

/// Rank (1 = best) to bot id, as consumed by the bracket builder.
pub fn rankings(standings: &[Standing]) -> BTreeMap<u32, String> {
    standings
        .iter()
        .enumerate()
        .map(|(i, s)| (i as u32 + 1, s.bot_id.clone()))
        .collect()
}

/// Waiver priority per bot: 1 goes to the worst record. Bots level on wins
/// and points keep the order of their stored priority.
pub fn waiver_priorities(bots: &[Bot], standings: &[Standing]) -> Vec<(String, u32)> {
    let stored: HashMap<&str, u32> = bots
        .iter()
        .map(|b| (b.id.as_str(), b.waiver_priority))
        .collect();

    let mut order: Vec<&Standing> = standings.iter().collect();
    order.sort_by(|a, b| {
        a.wins
            .cmp(&b.wins)
            .then_with(|| a.points_for.total_cmp(&b.points_for))
            .then_with(|| {
                let pa = stored.get(a.bot_id.as_str()).copied().unwrap_or(u32::MAX);
                let pb = stored.get(b.bot_id.as_str()).copied().unwrap_or(u32::MAX);
                pa.cmp(&pb)
            })
            .then_with(|| a.bot_id.cmp(&b.bot_id))
    });

    order
        .into_iter()
        .enumerate()
        .map(|(i, s)| (s.bot_id.clone(), i as u32 + 1))
        .collect()
}

/// Regular-season game between two real bots.
pub fn counts_for_standings(m: &Matchup) -> bool {
    !m.is_playoff && m.home_bot_id != BYE_BOT_ID && m.visitor_bot_id != BYE_BOT_ID
}
