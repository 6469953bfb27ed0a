// Position tags and the slot-eligibility expansion table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Football position tags. The first six are concrete playing positions; the
/// last three are roster-slot kinds that expand to a set of concrete ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Position {
    #[serde(rename = "QB")]
    Quarterback,
    #[serde(rename = "RB")]
    RunningBack,
    #[serde(rename = "WR")]
    WideReceiver,
    #[serde(rename = "TE")]
    TightEnd,
    #[serde(rename = "K")]
    Kicker,
    #[serde(rename = "DST")]
    Defense,
    #[serde(rename = "FLEX")]
    Flex,
    #[serde(rename = "SUPERFLEX")]
    SuperFlex,
    #[serde(rename = "BENCH")]
    Bench,
}

// ---------------------------------------------------------------------------
// Expansion table
// ---------------------------------------------------------------------------

const QB_SET: &[Position] = &[Position::Quarterback];
const RB_SET: &[Position] = &[Position::RunningBack];
const WR_SET: &[Position] = &[Position::WideReceiver];
const TE_SET: &[Position] = &[Position::TightEnd];
const K_SET: &[Position] = &[Position::Kicker];
const DST_SET: &[Position] = &[Position::Defense];
const FLEX_SET: &[Position] = &[
    Position::RunningBack,
    Position::WideReceiver,
    Position::TightEnd,
];
const SUPERFLEX_SET: &[Position] = &[
    Position::Quarterback,
    Position::RunningBack,
    Position::WideReceiver,
    Position::TightEnd,
];
const BENCH_SET: &[Position] = &[
    Position::Quarterback,
    Position::RunningBack,
    Position::WideReceiver,
    Position::TightEnd,
    Position::Kicker,
    Position::Defense,
];

impl Position {
    /// All tags, concrete positions first.
    pub const ALL: [Position; 9] = [
        Position::Quarterback,
        Position::RunningBack,
        Position::WideReceiver,
        Position::TightEnd,
        Position::Kicker,
        Position::Defense,
        Position::Flex,
        Position::SuperFlex,
        Position::Bench,
    ];

    /// Parse a tag such as "QB", "flex" or "D/ST". Case-insensitive.
    pub fn from_str_pos(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "QB" => Some(Position::Quarterback),
            "RB" => Some(Position::RunningBack),
            "WR" => Some(Position::WideReceiver),
            "TE" => Some(Position::TightEnd),
            "K" => Some(Position::Kicker),
            "DST" | "D/ST" | "DEF" => Some(Position::Defense),
            "FLEX" => Some(Position::Flex),
            "SUPERFLEX" => Some(Position::SuperFlex),
            "BENCH" | "BN" | "BE" => Some(Position::Bench),
            _ => None,
        }
    }

    pub fn display_str(&self) -> &'static str {
        match self {
            Position::Quarterback => "QB",
            Position::RunningBack => "RB",
            Position::WideReceiver => "WR",
            Position::TightEnd => "TE",
            Position::Kicker => "K",
            Position::Defense => "DST",
            Position::Flex => "FLEX",
            Position::SuperFlex => "SUPERFLEX",
            Position::Bench => "BENCH",
        }
    }

    /// The concrete positions this tag accepts. Concrete tags expand to
    /// themselves.
    pub fn eligible(&self) -> &'static [Position] {
        match self {
            Position::Quarterback => QB_SET,
            Position::RunningBack => RB_SET,
            Position::WideReceiver => WR_SET,
            Position::TightEnd => TE_SET,
            Position::Kicker => K_SET,
            Position::Defense => DST_SET,
            Position::Flex => FLEX_SET,
            Position::SuperFlex => SUPERFLEX_SET,
            Position::Bench => BENCH_SET,
        }
    }

    /// Whether this is a slot kind rather than a concrete playing position.
    pub fn is_meta_slot(&self) -> bool {
        matches!(self, Position::Flex | Position::SuperFlex | Position::Bench)
    }

    /// Whether a player carrying `tags` may fill a slot of this kind. Both
    /// sides are expanded before intersecting.
    pub fn accepts(&self, tags: &[Position]) -> bool {
        let slot_set = self.eligible();
        tags.iter()
            .flat_map(|t| t.eligible().iter())
            .any(|p| slot_set.contains(p))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

/// Parse a `/`-separated position list such as "RB/WR". Unknown tags are
/// skipped.
pub fn parse_position_list(s: &str) -> Vec<Position> {
    let mut out: Vec<Position> = Vec::new();
    for tag in s.split(['/', ',']) {
        if let Some(pos) = Position::from_str_pos(tag) {
            if !out.contains(&pos) {
                out.push(pos);
            }
        }
    }
    out
}

/// Concrete positions common to both tag lists after expansion, in the
/// canonical order.
pub fn find_intersection(a: &[Position], b: &[Position]) -> Vec<Position> {
    let expand = |tags: &[Position]| -> Vec<Position> {
        tags.iter().flat_map(|t| t.eligible().iter().copied()).collect()
    };
    let left = expand(a);
    let right = expand(b);
    Position::ALL
        .iter()
        .copied()
        .filter(|p| left.contains(p) && right.contains(p))
        .collect()
}
