// Weekly-Fantasy Mode: the free-agent waiver cycle.
//
// Order of a cycle:
//   1. ON_HOLD players from last week's drops return to the pool
//   2. waiver priority is reset from standings (worst record = 1)
//   3. each bot, in priority order, proposes claims through its sandbox
//   4. claims are checked against live state and resolved as one auction
//   5. winners are applied one add/drop at a time

use anyhow::Context;
use tracing::{info, warn};

use botblitz_core::error::{StorageError, ValidationError};
use botblitz_core::model::{Player, PlayerStatus, Transaction, WaiverClaim};
use botblitz_core::report::WeekReport;
use botblitz_core::standings::{leaderboard, waiver_priorities};
use botblitz_core::waiver::{resolve_claims, Bidder};

use crate::session::Session;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WaiverSummary {
    pub week: u32,
    pub released: usize,
    pub submitted: usize,
    pub rejected: usize,
    pub conflicts: usize,
    pub applied: Vec<Transaction>,
    pub cancelled: bool,
}

/// Check one claim against the looked-up add and drop players.
pub fn check_claim(
    claim: &WaiverClaim,
    add: Option<&Player>,
    drop: Option<&Player>,
) -> Result<(), ValidationError> {
    let Some(add) = add else {
        return Err(ValidationError::UnknownPlayer {
            player_id: claim.add_player_id.clone(),
        });
    };
    if add.status != PlayerStatus::Available {
        return Err(ValidationError::PlayerUnavailable {
            player_id: add.id.clone(),
            status: add.status,
        });
    }
    let owned = drop.is_some_and(|d| d.current_bot_id.as_deref() == Some(claim.bot_id.as_str()));
    if !owned {
        return Err(ValidationError::DropNotOwned {
            bot_id: claim.bot_id.clone(),
            player_id: claim.drop_player_id.clone(),
        });
    }
    Ok(())
}

/// Run one waiver cycle for the store's current week.
pub async fn run_waiver_cycle(
    session: &Session<'_>,
    max_claims_per_run: usize,
) -> anyhow::Result<WaiverSummary> {
    let store = session.store;
    let week = store.get_current_week()?;
    let mut summary = WaiverSummary {
        week,
        ..Default::default()
    };

    summary.released = store
        .release_on_hold_players()
        .context("failed to release on-hold players")?;

    let bots = store.get_bots()?;
    let past = store.get_past_matchups(week)?;
    let priorities = waiver_priorities(&bots, &leaderboard(&bots, &past));
    store
        .set_waiver_priorities(&priorities)
        .context("failed to store waiver priorities")?;
    info!("week {week} waivers: released {}, priority {:?}", summary.released, priorities);

    let mut submitted: Vec<WaiverClaim> = Vec::new();
    for (bot_id, _) in &priorities {
        if session.cancel.is_cancelled() {
            warn!("waiver cycle cancelled before {bot_id}");
            summary.cancelled = true;
            break;
        }
        let Some(descriptor) = session.descriptor(bot_id) else {
            warn!("week {week}: {bot_id} has no sandbox descriptor; no claims");
            continue;
        };
        store.set_current_turn(bot_id)?;
        let snapshot = session.snapshot(bot_id)?;

        let mut claims = match session.sandbox.request_claims(descriptor, &snapshot).await {
            Ok(claims) => claims,
            Err(e) => {
                warn!("week {week}: sandbox failed for {bot_id}: {e}");
                continue;
            }
        };
        if claims.len() > max_claims_per_run {
            warn!(
                "week {week}: {bot_id} sent {} claims, keeping the first {max_claims_per_run}",
                claims.len()
            );
            claims.truncate(max_claims_per_run);
        }

        for mut claim in claims {
            // Claims always belong to the bot that was asked
            claim.bot_id = bot_id.clone();
            summary.submitted += 1;
            let add = store.get_player_by_id(&claim.add_player_id)?;
            let drop = store.get_player_by_id(&claim.drop_player_id)?;
            match check_claim(&claim, add.as_ref(), drop.as_ref()) {
                Ok(()) => submitted.push(claim),
                Err(e) => {
                    warn!("week {week}: rejected claim from {bot_id}: {e}");
                    summary.rejected += 1;
                }
            }
        }
    }

    let bidders: Vec<Bidder> = store
        .get_bots()?
        .into_iter()
        .map(|b| Bidder {
            bot_id: b.id,
            remaining_budget: b.remaining_waiver_budget,
            priority: b.waiver_priority,
        })
        .collect();
    let outcome = resolve_claims(&bidders, &submitted);

    for (claim, reason) in &outcome.rejected {
        warn!("week {week}: rejected claim from {}: {reason}", claim.bot_id);
    }
    summary.rejected += outcome.rejected.len();
    for conflict in &outcome.conflicts {
        warn!("week {week}: {conflict}");
    }
    summary.conflicts = outcome.conflicts.len();

    for claims in outcome.winners.values() {
        for claim in claims {
            match store.perform_add_drop(week, claim) {
                Ok(record) => {
                    info!(
                        "week {week}: {} adds {} and drops {} for ${}",
                        claim.bot_id, claim.add_player_id, claim.drop_player_id, claim.bid
                    );
                    summary.applied.push(record);
                }
                // Live state moved since resolution (budget spent by an
                // earlier win); skip this claim only
                Err(StorageError::Invariant { message }) => {
                    warn!("week {week}: could not apply claim from {}: {message}", claim.bot_id);
                    summary.rejected += 1;
                }
                Err(e) => return Err(e).context("failed to apply waiver claim"),
            }
        }
    }

    session.sink.record_week(&WeekReport::Waivers {
        week,
        applied: summary.applied.clone(),
        conflicts: outcome.conflicts.clone(),
        rejected: summary.rejected,
    });
    Ok(summary)
}
