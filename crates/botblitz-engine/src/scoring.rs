// Week scoring: lineups, matchup results, and playoff advancement.

use std::collections::HashMap;

use anyhow::Context;
use tracing::{debug, info, warn};

use botblitz_core::config::PlayoffConfig;
use botblitz_core::lineup::{optimize_lineup, Lineup};
use botblitz_core::model::{Matchup, BYE_BOT_ID, UNDETERMINED_BOT_ID};
use botblitz_core::playoffs::{build_bracket, resolve_participants, PLAYOFF_MATCHUP_ID_OFFSET};
use botblitz_core::report::WeekReport;
use botblitz_core::standings::{leaderboard, rankings};
use botblitz_core::store::GameStateStore;

use crate::session::Session;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSummary {
    /// The week that was scored.
    pub week: u32,
    pub next_week: u32,
    pub lineups: Vec<(String, Lineup)>,
    pub results: Vec<Matchup>,
    /// Playoff matchups created or resolved for `next_week`.
    pub playoff_matchups: Vec<Matchup>,
    pub champion: Option<String>,
}

/// Final `(home_score, visitor_score, winner)` of one matchup. The home side
/// wins ties; a bye opponent scores zero and the real bot advances.
pub fn decide(matchup: &Matchup, totals: &HashMap<String, f64>) -> (f64, f64, String) {
    let score = |bot: &str| totals.get(bot).copied().unwrap_or(0.0);
    if matchup.visitor_bot_id == BYE_BOT_ID {
        return (score(&matchup.home_bot_id), 0.0, matchup.home_bot_id.clone());
    }
    if matchup.home_bot_id == BYE_BOT_ID {
        return (0.0, score(&matchup.visitor_bot_id), matchup.visitor_bot_id.clone());
    }
    let home = score(&matchup.home_bot_id);
    let visitor = score(&matchup.visitor_bot_id);
    let winner = if home >= visitor {
        &matchup.home_bot_id
    } else {
        &matchup.visitor_bot_id
    };
    (home, visitor, winner.clone())
}

/// Score the store's current week and advance to the next one.
pub async fn score_week(
    session: &Session<'_>,
    playoffs: &PlayoffConfig,
) -> anyhow::Result<ScoreSummary> {
    let store = session.store;
    let week = store.get_current_week()?;
    let slots = session.settings().starting_slots();

    // ---- lineups ----
    let mut lineups = Vec::with_capacity(session.bots().len());
    let mut totals = HashMap::new();
    for bot in session.bots() {
        let roster = store.get_roster_scores(&bot.id, week)?;
        let lineup = optimize_lineup(&slots, &roster);
        store
            .save_lineup(week, &bot.id, &lineup)
            .with_context(|| format!("failed to save week {week} lineup for {}", bot.id))?;
        debug!(
            "week {week}: {} starts {} of {} slots for {:.2}",
            bot.id,
            lineup.filled_count(),
            slots.len(),
            lineup.total
        );
        totals.insert(bot.id.clone(), lineup.total);
        lineups.push((bot.id.clone(), lineup));
    }

    // ---- results ----
    let mut results = Vec::new();
    for matchup in store.get_matchups_for_week(week)? {
        if matchup.home_bot_id == UNDETERMINED_BOT_ID || matchup.visitor_bot_id == UNDETERMINED_BOT_ID {
            warn!("week {week}: matchup {} has undetermined participants; not scored", matchup.id);
            continue;
        }
        let (home_score, visitor_score, winner) = decide(&matchup, &totals);
        store.set_match_result(matchup.id, home_score, visitor_score, Some(winner.as_str()))?;
        info!(
            "week {week}: #{} {} {home_score:.2} vs {} {visitor_score:.2}, {winner} wins",
            matchup.id, matchup.home_bot_id, matchup.visitor_bot_id
        );
        results.push(Matchup {
            home_score,
            visitor_score,
            winner_bot_id: Some(winner),
            ..matchup
        });
    }
    if results.is_empty() {
        warn!("week {week}: no matchups to score");
    }

    let next_week = store.increment_week()?;
    let playoff_matchups = advance_playoffs(store, playoffs, next_week)?;

    // The last playoff game has been played once nothing is scheduled after it
    let champion = match results.iter().filter(|m| m.is_playoff).max_by_key(|m| m.id) {
        Some(last) if store.get_matchups_for_week(next_week)?.is_empty() => {
            let champion = last.winner_bot_id.clone();
            if let Some(bot) = &champion {
                info!("{bot} wins the championship");
            }
            champion
        }
        _ => None,
    };

    session.sink.record_week(&WeekReport::Scores {
        week,
        lineups: lineups.clone(),
        matchups: results.clone(),
    });

    Ok(ScoreSummary {
        week,
        next_week,
        lineups,
        results,
        playoff_matchups,
        champion,
    })
}

/// Create the bracket when `next_week` opens the playoffs, or fill in
/// referenced participants for a later playoff week.
fn advance_playoffs(
    store: &dyn GameStateStore,
    playoffs: &PlayoffConfig,
    next_week: u32,
) -> anyhow::Result<Vec<Matchup>> {
    if playoffs.num_teams == 0 || next_week < playoffs.start_week {
        return Ok(Vec::new());
    }

    if next_week == playoffs.start_week {
        if store.get_matchup(PLAYOFF_MATCHUP_ID_OFFSET)?.is_some() {
            warn!("playoff bracket already exists; not rebuilding");
            return Ok(store.get_matchups_for_week(next_week)?);
        }
        let bots = store.get_bots()?;
        let standings = leaderboard(&bots, &store.get_past_matchups(next_week)?);
        let bracket = build_bracket(
            playoffs.start_week,
            playoffs.num_teams,
            playoffs.byes,
            &rankings(&standings),
        )
        .context("failed to build playoff bracket")?;
        store.add_matchups(&bracket)?;
        info!(
            "playoff bracket created: {} matchups from week {}",
            bracket.len(),
            playoffs.start_week
        );
        return Ok(bracket.into_iter().filter(|m| m.week == next_week).collect());
    }

    let mut resolved = Vec::new();
    for matchup in store.get_matchups_for_week(next_week)? {
        if matchup.home_ref.is_none() && matchup.visitor_ref.is_none() {
            continue;
        }
        let mut feeders = HashMap::new();
        for reference in matchup.home_ref.into_iter().chain(matchup.visitor_ref) {
            if let Some(feeder) = store.get_matchup(reference)? {
                feeders.insert(reference, feeder);
            }
        }
        let (home, visitor) = resolve_participants(&matchup, &feeders)
            .with_context(|| format!("failed to resolve playoff matchup {}", matchup.id))?;
        store.update_matchup_bots(matchup.id, &home, &visitor)?;
        info!("week {next_week}: playoff matchup #{} is {home} vs {visitor}", matchup.id);
        resolved.push(Matchup {
            home_bot_id: home,
            visitor_bot_id: visitor,
            ..matchup
        });
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{give, seeded_store, session_for, FakeSandbox, RecordingSink};
    use botblitz_core::report::NullSink;
    use botblitz_core::store::{SqliteStore, StatLine};

    fn playoffs(start_week: u32, num_teams: u32, byes: u32) -> PlayoffConfig {
        PlayoffConfig {
            start_week,
            num_teams,
            byes,
        }
    }

    fn stat(player: &str, week: u32, fpts: f64) -> StatLine {
        StatLine {
            player_id: player.to_string(),
            week,
            fpts,
        }
    }

    /// Four bots, each owning one QB/RB/WR/TE starting at p{4k+1}.
    fn rostered_store() -> SqliteStore {
        let store = seeded_store(4, 4, 16);
        for i in 1..=16u32 {
            give(&store, &format!("p{i}"), &format!("bot{}", (i - 1) / 4 + 1));
        }
        store
    }

    fn totals(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(b, s)| (b.to_string(), *s)).collect()
    }

    // -----------------------------------------------------------------------
    // decide
    // -----------------------------------------------------------------------

    #[test]
    fn higher_score_wins_and_home_wins_ties() {
        let m = Matchup::new(1, 1, "bot1", "bot2");
        let (_, _, w) = decide(&m, &totals(&[("bot1", 10.0), ("bot2", 12.5)]));
        assert_eq!(w, "bot2");
        let (h, v, w) = decide(&m, &totals(&[("bot1", 10.0), ("bot2", 10.0)]));
        assert_eq!((h, v, w.as_str()), (10.0, 10.0, "bot1"));
    }

    #[test]
    fn bye_opponent_scores_zero() {
        let m = Matchup::new(1000, 15, "bot1", BYE_BOT_ID);
        let (h, v, w) = decide(&m, &totals(&[("bot1", 0.0)]));
        assert_eq!((h, v, w.as_str()), (0.0, 0.0, "bot1"));
    }

    #[test]
    fn missing_total_counts_as_zero() {
        let m = Matchup::new(1, 1, "bot1", "bot2");
        let (h, v, w) = decide(&m, &totals(&[("bot2", 3.0)]));
        assert_eq!((h, v, w.as_str()), (0.0, 3.0, "bot2"));
    }

    // -----------------------------------------------------------------------
    // score_week
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn scores_week_and_advances() {
        let store = rostered_store();
        store
            .import_weekly_stats(&[stat("p1", 1, 20.0), stat("p2", 1, 5.5), stat("p13", 1, 30.0)])
            .unwrap();
        let sandbox = FakeSandbox::default();
        let sink = RecordingSink::default();
        let session = session_for(&store, &sandbox, &sink);

        let summary = score_week(&session, &playoffs(15, 4, 0)).await.unwrap();
        assert_eq!((summary.week, summary.next_week), (1, 2));
        assert_eq!(store.get_current_week().unwrap(), 2);

        // Week 1 pairs bot1 with bot4 and bot2 with bot3
        let bot1_vs_bot4 = summary.results.iter().find(|m| m.involves("bot1")).unwrap();
        assert_eq!(bot1_vs_bot4.home_score, 25.5);
        assert_eq!(bot1_vs_bot4.visitor_score, 30.0);
        assert_eq!(bot1_vs_bot4.winner_bot_id.as_deref(), Some("bot4"));

        let bot2_vs_bot3 = summary.results.iter().find(|m| m.involves("bot2")).unwrap();
        assert_eq!(bot2_vs_bot3.winner_bot_id.as_deref(), Some("bot2"));

        let stored = store.get_matchup(bot1_vs_bot4.id).unwrap().unwrap();
        assert_eq!(stored.winner_bot_id.as_deref(), Some("bot4"));

        assert_eq!(summary.lineups.len(), 4);
        assert_eq!(sink.weeks().len(), 1);
        assert!(summary.playoff_matchups.is_empty());
        assert_eq!(summary.champion, None);
    }

    #[tokio::test]
    async fn lineup_covers_starting_slots_only() {
        let store = seeded_store(2, 4, 8);
        // A QB and two RBs: the second RB fills FLEX and WR stays empty
        for p in ["p1", "p2", "p6"] {
            give(&store, p, "bot1");
        }
        store
            .import_weekly_stats(&[stat("p1", 1, 10.0), stat("p2", 1, 7.0), stat("p6", 1, 4.0)])
            .unwrap();
        let sandbox = FakeSandbox::default();
        let session = session_for(&store, &sandbox, &NullSink);
        let summary = score_week(&session, &playoffs(15, 2, 0)).await.unwrap();

        let (_, lineup) = summary.lineups.iter().find(|(b, _)| b == "bot1").unwrap();
        assert_eq!(lineup.slots.len(), 4);
        assert_eq!(lineup.total, 21.0);
        assert_eq!(lineup.filled_count(), 3);
    }

    #[tokio::test]
    async fn bracket_is_built_entering_playoff_week() {
        let store = rostered_store();
        let sandbox = FakeSandbox::default();
        let session = session_for(&store, &sandbox, &NullSink);
        let config = playoffs(4, 4, 0);

        for _ in 0..2 {
            let summary = score_week(&session, &config).await.unwrap();
            assert!(summary.playoff_matchups.is_empty());
        }
        let summary = score_week(&session, &config).await.unwrap();
        assert_eq!(summary.next_week, 4);
        assert_eq!(summary.playoff_matchups.len(), 2);
        assert!(summary.playoff_matchups.iter().all(|m| m.is_playoff && m.week == 4));

        let final_game = store.get_matchup(PLAYOFF_MATCHUP_ID_OFFSET + 2).unwrap().unwrap();
        assert_eq!(final_game.week, 5);
        assert_eq!(final_game.home_bot_id, UNDETERMINED_BOT_ID);
    }

    #[tokio::test]
    async fn playoffs_run_to_a_champion() {
        let store = rostered_store();
        // bot3 outscores everyone every week
        let stats: Vec<StatLine> = (1..=5).map(|w| stat("p9", w, 50.0)).collect();
        store.import_weekly_stats(&stats).unwrap();
        let sandbox = FakeSandbox::default();
        let session = session_for(&store, &sandbox, &NullSink);
        let config = playoffs(4, 4, 0);

        for _ in 0..3 {
            score_week(&session, &config).await.unwrap();
        }
        // Semifinals in week 4, final resolved for week 5
        let semis = score_week(&session, &config).await.unwrap();
        assert_eq!(semis.results.len(), 2);
        assert_eq!(semis.playoff_matchups.len(), 1);
        let final_game = &semis.playoff_matchups[0];
        assert!(final_game.involves("bot3"));
        assert_ne!(final_game.home_bot_id, UNDETERMINED_BOT_ID);
        assert_ne!(final_game.visitor_bot_id, UNDETERMINED_BOT_ID);
        assert_eq!(semis.champion, None);

        let last = score_week(&session, &config).await.unwrap();
        assert_eq!(last.champion.as_deref(), Some("bot3"));
    }

    #[tokio::test]
    async fn byes_advance_top_seeds() {
        let store = seeded_store(6, 1, 6);
        for i in 1..=6u32 {
            give(&store, &format!("p{i}"), &format!("bot{i}"));
        }
        // Rank by points: lower id scores more
        let stats: Vec<StatLine> = (1..=6u32)
            .flat_map(|i| (1..=4).map(move |w| stat(&format!("p{i}"), w, 100.0 - i as f64)))
            .collect();
        store.import_weekly_stats(&stats).unwrap();
        let sandbox = FakeSandbox::default();
        let session = session_for(&store, &sandbox, &NullSink);
        let config = playoffs(4, 6, 2);

        for _ in 0..2 {
            score_week(&session, &config).await.unwrap();
        }
        let opening = score_week(&session, &config).await.unwrap();
        assert_eq!(opening.playoff_matchups.len(), 4);
        let byes: Vec<&str> = opening
            .playoff_matchups
            .iter()
            .filter(|m| m.is_bye())
            .map(|m| m.home_bot_id.as_str())
            .collect();
        assert_eq!(byes, vec!["bot1", "bot2"]);

        let round_one = score_week(&session, &config).await.unwrap();
        let bye_results: Vec<&Matchup> = round_one.results.iter().filter(|m| m.is_bye()).collect();
        assert!(bye_results.iter().all(|m| m.visitor_score == 0.0));
        assert!(bye_results
            .iter()
            .all(|m| m.winner_bot_id.as_deref() == Some(m.home_bot_id.as_str())));
        assert_eq!(round_one.playoff_matchups.len(), 2);
    }

    #[tokio::test]
    async fn existing_bracket_is_not_rebuilt() {
        let store = rostered_store();
        let seeds: std::collections::BTreeMap<u32, String> =
            (1..=4u32).map(|r| (r, format!("bot{r}"))).collect();
        store.add_matchups(&build_bracket(4, 4, 0, &seeds).unwrap()).unwrap();

        let opening = advance_playoffs(&store, &playoffs(4, 4, 0), 4).unwrap();
        assert_eq!(opening.len(), 2);
        assert_eq!(store.get_matchups_for_week(4).unwrap().len(), 2);
        assert_eq!(store.get_matchups_for_week(5).unwrap().len(), 1);
    }
}
