// Playoff bracket construction and reference resolution.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::model::{Matchup, BYE_BOT_ID, UNDETERMINED_BOT_ID};

/// Playoff matchup ids start here, clear of any regular-season id.
pub const PLAYOFF_MATCHUP_ID_OFFSET: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BracketError {
    #[error("playoff team count must be a positive even number, got {0}")]
    InvalidTeamCount(u32),

    #[error("bye count must be even and at most {teams}, got {byes}")]
    InvalidByeCount { teams: u32, byes: u32 },

    #[error("{teams} teams with {byes} byes cannot be reduced to a single final")]
    Unbalanced { teams: u32, byes: u32 },

    #[error("no bot holds rank {0}")]
    MissingRank(u32),

    #[error("matchup {id} is fed by unknown matchup {reference}")]
    UnknownReference { id: u32, reference: u32 },

    #[error("matchup {reference} feeding {id} has no winner yet")]
    Unresolved { id: u32, reference: u32 },
}

/// Build the full bracket from final standings.
///
/// `rankings` maps rank (1 = best) to bot id. Round one is played in
/// `start_week` and holds `(teams + byes) / 2` matchups: the top `byes`
/// seeds meet the bye sentinel, the rest pair highest against lowest. Each
/// following week pairs the earliest unpaired matchup with the latest one,
/// working inward, and stores references to those matchups instead of
/// participants. The last matchup generated is the final.
pub fn build_bracket(
    start_week: u32,
    teams: u32,
    byes: u32,
    rankings: &BTreeMap<u32, String>,
) -> Result<Vec<Matchup>, BracketError> {
    if teams == 0 || teams % 2 != 0 {
        return Err(BracketError::InvalidTeamCount(teams));
    }
    if byes % 2 != 0 || byes > teams {
        return Err(BracketError::InvalidByeCount { teams, byes });
    }
    let field = teams + byes;
    if !field.is_power_of_two() {
        return Err(BracketError::Unbalanced { teams, byes });
    }

    let seed = |rank: u32| {
        rankings
            .get(&rank)
            .cloned()
            .ok_or(BracketError::MissingRank(rank))
    };

    let mut matchups: Vec<Matchup> = Vec::new();
    let next_id = |matchups: &Vec<Matchup>| PLAYOFF_MATCHUP_ID_OFFSET + matchups.len() as u32;

    for i in 0..field / 2 {
        let home = seed(i + 1)?;
        let visitor = if i < byes {
            BYE_BOT_ID.to_string()
        } else {
            seed(field - i)?
        };
        let mut m = Matchup::new(next_id(&matchups), start_week, &home, &visitor);
        m.is_playoff = true;
        matchups.push(m);
    }

    let mut week = start_week;
    let mut start = 0;
    let mut end = matchups.len() - 1;
    while start != end {
        week += 1;
        let pairs = (end - start + 1) / 2;
        for i in 0..pairs {
            let home_ref = matchups[start + i].id;
            let visitor_ref = matchups[end - i].id;
            let mut m = Matchup::new(next_id(&matchups), week, UNDETERMINED_BOT_ID, UNDETERMINED_BOT_ID);
            m.is_playoff = true;
            m.home_ref = Some(home_ref);
            m.visitor_ref = Some(visitor_ref);
            matchups.push(m);
        }
        start = end + 1;
        end = matchups.len() - 1;
    }

    Ok(matchups)
}

/// Winner recorded on a finished matchup.
fn winner_of(id: u32, reference: u32, feeders: &HashMap<u32, Matchup>) -> Result<String, BracketError> {
    let feeder = feeders
        .get(&reference)
        .ok_or(BracketError::UnknownReference { id, reference })?;
    feeder
        .winner_bot_id
        .clone()
        .ok_or(BracketError::Unresolved { id, reference })
}

/// Concrete `(home, visitor)` for a matchup. Sides without a reference keep
/// their stored participant.
pub fn resolve_participants(
    matchup: &Matchup,
    feeders: &HashMap<u32, Matchup>,
) -> Result<(String, String), BracketError> {
    let home = match matchup.home_ref {
        Some(r) => winner_of(matchup.id, r, feeders)?,
        None => matchup.home_bot_id.clone(),
    };
    let visitor = match matchup.visitor_ref {
        Some(r) => winner_of(matchup.id, r, feeders)?,
        None => matchup.visitor_bot_id.clone(),
    };
    Ok((home, visitor))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rankings(n: u32) -> BTreeMap<u32, String> {
        (1..=n).map(|r| (r, format!("T{r}"))).collect()
    }

    fn pair(m: &Matchup) -> (&str, &str) {
        (m.home_bot_id.as_str(), m.visitor_bot_id.as_str())
    }

    #[test]
    fn six_teams_two_byes() {
        let bracket = build_bracket(15, 6, 2, &rankings(6)).unwrap();

        assert_eq!(bracket.len(), 7);
        let round_one: Vec<_> = bracket.iter().filter(|m| m.week == 15).map(pair).collect();
        assert_eq!(
            round_one,
            vec![("T1", BYE_BOT_ID), ("T2", BYE_BOT_ID), ("T3", "T6"), ("T4", "T5")]
        );
        assert!(bracket.iter().all(|m| m.is_playoff));

        // Semifinals pair outermost with innermost
        assert_eq!(bracket[4].week, 16);
        assert_eq!((bracket[4].home_ref, bracket[4].visitor_ref), (Some(1000), Some(1003)));
        assert_eq!((bracket[5].home_ref, bracket[5].visitor_ref), (Some(1001), Some(1002)));

        let last = &bracket[6];
        assert_eq!(last.week, 17);
        assert_eq!(last.home_ref, Some(bracket[4].id));
        assert_eq!(last.visitor_ref, Some(bracket[5].id));
        assert_eq!(pair(last), (UNDETERMINED_BOT_ID, UNDETERMINED_BOT_ID));
    }

    #[test]
    fn eight_teams_no_byes() {
        let bracket = build_bracket(15, 8, 0, &rankings(8)).unwrap();
        assert_eq!(bracket.len(), 7);
        let round_one: Vec<_> = bracket[..4].iter().map(pair).collect();
        assert_eq!(round_one, vec![("T1", "T8"), ("T2", "T7"), ("T3", "T6"), ("T4", "T5")]);
        assert!(bracket.iter().all(|m| m.is_playoff));
    }

    #[test]
    fn ids_are_sequential_from_offset() {
        let bracket = build_bracket(14, 4, 0, &rankings(4)).unwrap();
        let ids: Vec<u32> = bracket.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1000, 1001, 1002]);
        assert_eq!(bracket[2].week, 15);
    }

    #[test]
    fn reference_graph_has_single_root() {
        let bracket = build_bracket(15, 6, 2, &rankings(6)).unwrap();
        let referenced: Vec<u32> = bracket
            .iter()
            .flat_map(|m| [m.home_ref, m.visitor_ref])
            .flatten()
            .collect();
        let roots: Vec<u32> = bracket
            .iter()
            .map(|m| m.id)
            .filter(|id| !referenced.contains(id))
            .collect();
        assert_eq!(roots, vec![1006]);
        // Every reference points backwards, so the graph cannot cycle
        for m in &bracket {
            for r in [m.home_ref, m.visitor_ref].into_iter().flatten() {
                assert!(r < m.id);
            }
        }
    }

    #[test]
    fn bracket_is_deterministic() {
        let first = build_bracket(15, 6, 2, &rankings(8)).unwrap();
        for _ in 0..5 {
            assert_eq!(build_bracket(15, 6, 2, &rankings(8)).unwrap(), first);
        }
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert_eq!(
            build_bracket(15, 5, 0, &rankings(5)),
            Err(BracketError::InvalidTeamCount(5))
        );
        assert_eq!(
            build_bracket(15, 6, 8, &rankings(6)),
            Err(BracketError::InvalidByeCount { teams: 6, byes: 8 })
        );
        assert_eq!(
            build_bracket(15, 4, 2, &rankings(4)),
            Err(BracketError::Unbalanced { teams: 4, byes: 2 })
        );
        assert_eq!(
            build_bracket(15, 6, 2, &rankings(5)),
            Err(BracketError::MissingRank(6))
        );
    }

    #[test]
    fn resolve_uses_recorded_winners() {
        let bracket = build_bracket(15, 6, 2, &rankings(6)).unwrap();
        let mut feeders: HashMap<u32, Matchup> = HashMap::new();
        for (i, winner) in ["T1", "T2", "T6", "T4"].iter().enumerate() {
            let mut m = bracket[i].clone();
            m.winner_bot_id = Some(winner.to_string());
            feeders.insert(m.id, m);
        }

        let semi_one = resolve_participants(&bracket[4], &feeders).unwrap();
        assert_eq!(semi_one, ("T1".to_string(), "T4".to_string()));
        let semi_two = resolve_participants(&bracket[5], &feeders).unwrap();
        assert_eq!(semi_two, ("T2".to_string(), "T6".to_string()));
    }

    #[test]
    fn resolve_fails_on_unplayed_feeder() {
        let bracket = build_bracket(15, 8, 0, &rankings(8)).unwrap();
        let feeders: HashMap<u32, Matchup> = bracket[..4].iter().map(|m| (m.id, m.clone())).collect();
        assert_eq!(
            resolve_participants(&bracket[4], &feeders),
            Err(BracketError::Unresolved { id: 1004, reference: 1000 })
        );
        assert_eq!(
            resolve_participants(&bracket[6], &feeders),
            Err(BracketError::UnknownReference { id: 1006, reference: 1004 })
        );
    }

    #[test]
    fn resolve_keeps_concrete_participants() {
        let bracket = build_bracket(15, 8, 0, &rankings(8)).unwrap();
        let resolved = resolve_participants(&bracket[0], &HashMap::new()).unwrap();
        assert_eq!(resolved, ("T1".to_string(), "T8".to_string()));
    }
}
