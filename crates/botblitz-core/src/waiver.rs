// Sealed-bid free-agent auction (FAAB) resolution.
//
// One pass turns every bot's submitted claims into at most one winner per
// add-player:
// 1. Drop claims whose bid exceeds the bot's remaining budget
// 2. Per bot and add-player, keep only the highest bid (first wins ties)
// 3. Per add-player, the highest bid wins; equal bids go to the bot with
//    the better waiver priority (1 is best, assigned to the worst standing)
// 4. Per bot, winning claims that release the same drop player collapse to
//    the highest bid; the losers are discarded without a runner-up

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ResourceConflict, ValidationError};
use crate::model::WaiverClaim;

/// What the auctioneer needs to know about one participating bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bidder {
    pub bot_id: String,
    pub remaining_budget: u32,
    /// 1 is the highest priority. Only consulted on exactly equal bids.
    pub priority: u32,
}

/// The winner of one contested add-player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionResult {
    pub add_player_id: String,
    pub bot_id: String,
    pub drop_player_id: String,
    pub bid: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuctionOutcome {
    /// Winning claims per bot, in the bot's submission order.
    pub winners: BTreeMap<String, Vec<WaiverClaim>>,
    /// Winning claims discarded because another win shared their drop.
    pub conflicts: Vec<ResourceConflict>,
    /// Claims removed before resolution.
    pub rejected: Vec<(WaiverClaim, ValidationError)>,
}

impl AuctionOutcome {
    pub fn is_empty(&self) -> bool {
        self.winners.values().all(Vec::is_empty)
    }

    /// Winners keyed by add-player.
    pub fn results(&self) -> BTreeMap<String, AuctionResult> {
        self.winners
            .values()
            .flatten()
            .map(|c| {
                (
                    c.add_player_id.clone(),
                    AuctionResult {
                        add_player_id: c.add_player_id.clone(),
                        bot_id: c.bot_id.clone(),
                        drop_player_id: c.drop_player_id.clone(),
                        bid: c.bid,
                    },
                )
            })
            .collect()
    }

    pub fn winning_claim(&self, bot_id: &str, add_player_id: &str) -> Option<&WaiverClaim> {
        self.winners
            .get(bot_id)?
            .iter()
            .find(|c| c.add_player_id == add_player_id)
    }
}

/// A claim plus its position in the submission stream.
#[derive(Debug, Clone)]
struct Ranked<'a> {
    seq: usize,
    claim: &'a WaiverClaim,
    priority: u32,
}

/// Resolve one round of claims. `claims` is the flat submission stream;
/// each claim names its bot. Claims from bots missing in `bidders` are
/// rejected as over budget against a zero balance.
pub fn resolve_claims(bidders: &[Bidder], claims: &[WaiverClaim]) -> AuctionOutcome {
    let by_bot: HashMap<&str, &Bidder> = bidders.iter().map(|b| (b.bot_id.as_str(), b)).collect();
    let mut outcome = AuctionOutcome::default();

    // Budget filter
    let mut affordable: Vec<Ranked<'_>> = Vec::with_capacity(claims.len());
    for (seq, claim) in claims.iter().enumerate() {
        let (budget, priority) = by_bot
            .get(claim.bot_id.as_str())
            .map_or((0, u32::MAX), |b| (b.remaining_budget, b.priority));
        if claim.bid > budget {
            debug!(
                "rejecting claim of {} on {}: bid {} over budget {}",
                claim.bot_id, claim.add_player_id, claim.bid, budget
            );
            outcome.rejected.push((
                claim.clone(),
                ValidationError::OverBudget {
                    bot_id: claim.bot_id.clone(),
                    bid: claim.bid,
                    budget,
                },
            ));
            continue;
        }
        affordable.push(Ranked { seq, claim, priority });
    }

    // Per-bot dedup on add-player; a later claim replaces only on a strictly
    // higher bid.
    let mut deduped: Vec<Ranked<'_>> = Vec::new();
    let mut slot_of: HashMap<(&str, &str), usize> = HashMap::new();
    for ranked in affordable {
        let key = (ranked.claim.bot_id.as_str(), ranked.claim.add_player_id.as_str());
        match slot_of.get(&key) {
            Some(&i) => {
                let (held, offered) = (deduped[i].claim.bid, ranked.claim.bid);
                debug!(
                    "{} claimed {} twice: keeping bid {}, discarding bid {}",
                    ranked.claim.bot_id,
                    ranked.claim.add_player_id,
                    held.max(offered),
                    held.min(offered)
                );
                if offered > held {
                    deduped[i] = ranked;
                }
            }
            None => {
                slot_of.insert(key, deduped.len());
                deduped.push(ranked);
            }
        }
    }

    // Cross-bot resolution per add-player
    let mut best: BTreeMap<&str, Ranked<'_>> = BTreeMap::new();
    for ranked in deduped {
        let add = ranked.claim.add_player_id.as_str();
        let replace = best
            .get(add)
            .map_or(true, |current| outbids(&ranked, current));
        if replace {
            best.insert(add, ranked);
        }
    }

    // Group wins by bot, then settle shared drop targets
    let mut wins_by_bot: BTreeMap<&str, Vec<Ranked<'_>>> = BTreeMap::new();
    for ranked in best.into_values() {
        wins_by_bot
            .entry(ranked.claim.bot_id.as_str())
            .or_default()
            .push(ranked);
    }

    for (bot_id, mut wins) in wins_by_bot {
        wins.sort_by_key(|r| r.seq);

        let mut keeper_for_drop: HashMap<&str, usize> = HashMap::new();
        let mut kept: Vec<Option<Ranked<'_>>> = Vec::with_capacity(wins.len());
        for ranked in wins {
            let drop = ranked.claim.drop_player_id.as_str();
            match keeper_for_drop.get(drop) {
                Some(&i) => {
                    let Some(incumbent) = kept[i].take() else {
                        continue;
                    };
                    let (keep, discard) = if ranked.claim.bid > incumbent.claim.bid {
                        (ranked, incumbent)
                    } else {
                        (incumbent, ranked)
                    };
                    let conflict = ResourceConflict {
                        bot_id: bot_id.to_string(),
                        drop_player_id: drop.to_string(),
                        kept_add: keep.claim.add_player_id.clone(),
                        discarded_add: discard.claim.add_player_id.clone(),
                    };
                    debug!("{conflict}");
                    outcome.conflicts.push(conflict);
                    kept[i] = Some(keep);
                }
                None => {
                    keeper_for_drop.insert(drop, kept.len());
                    kept.push(Some(ranked));
                }
            }
        }

        let mut claims: Vec<Ranked<'_>> = kept.into_iter().flatten().collect();
        claims.sort_by_key(|r| r.seq);
        outcome.winners.insert(
            bot_id.to_string(),
            claims.into_iter().map(|r| r.claim.clone()).collect(),
        );
    }

    outcome
}

/// Whether `challenger` beats `incumbent` for the same add-player.
fn outbids(challenger: &Ranked<'_>, incumbent: &Ranked<'_>) -> bool {
    if challenger.claim.bid != incumbent.claim.bid {
        return challenger.claim.bid > incumbent.claim.bid;
    }
    if challenger.priority != incumbent.priority {
        return challenger.priority < incumbent.priority;
    }
    challenger.seq < incumbent.seq
}
