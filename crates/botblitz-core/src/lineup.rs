// Starting-lineup selection: greedy assignment of a scored roster to slots.

use serde::{Deserialize, Serialize};

use crate::model::ScoredPlayer;
use crate::position::Position;

/// Name shown for a slot nobody could fill.
pub const NONE_PLAYER_NAME: &str = "None";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotAssignment {
    pub slot: Position,
    pub player: Option<ScoredPlayer>,
}

impl SlotAssignment {
    /// Points this slot contributes. An empty slot contributes exactly zero.
    pub fn points(&self) -> f64 {
        self.player.as_ref().map_or(0.0, |p| p.points)
    }

    pub fn player_name(&self) -> &str {
        self.player.as_ref().map_or(NONE_PLAYER_NAME, |p| p.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lineup {
    /// Slots in evaluation order (narrowest eligibility first).
    pub slots: Vec<SlotAssignment>,
    pub total: f64,
}

impl Lineup {
    pub fn filled_count(&self) -> usize {
        self.slots.iter().filter(|s| s.player.is_some()).count()
    }
}

/// Pick a starting lineup for `slots` out of `roster`.
///
/// Slots are visited in ascending order of eligible-set size so that
/// single-position slots are filled before FLEX-style slots can absorb the
/// players they need. For each slot the roster is scanned by descending
/// points and the first unassigned eligible player is taken. Both sorts are
/// stable, so ties keep the caller's order.
pub fn optimize_lineup(slots: &[Position], roster: &[ScoredPlayer]) -> Lineup {
    let mut ordered_slots = slots.to_vec();
    ordered_slots.sort_by_key(|s| s.eligible().len());

    let mut players: Vec<&ScoredPlayer> = roster.iter().collect();
    players.sort_by(|a, b| b.points.total_cmp(&a.points));

    let mut taken = vec![false; players.len()];
    let mut assignments = Vec::with_capacity(ordered_slots.len());

    for slot in ordered_slots {
        let pick = players
            .iter()
            .enumerate()
            .find(|(i, p)| !taken[*i] && slot.accepts(&p.allowed_positions))
            .map(|(i, _)| i);

        let player = pick.map(|i| {
            taken[i] = true;
            players[i].clone()
        });
        assignments.push(SlotAssignment { slot, player });
    }

    let total = assignments.iter().map(SlotAssignment::points).sum();
    Lineup {
        slots: assignments,
        total,
    }
}
