// Season data model shared by the store, the resolvers and the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::position::Position;

/// Opponent id used for the top seeds in the first playoff round.
pub const BYE_BOT_ID: &str = "BYE";

/// Participant id for a bracket matchup whose feeders have not been played.
pub const UNDETERMINED_BOT_ID: &str = "TBD";

// ---------------------------------------------------------------------------
// Bots
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bot {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub remaining_waiver_budget: u32,
    /// 1-based position in round one of the draft.
    pub draft_order: u32,
    /// 1 is the highest waiver priority; 0 means not yet assigned.
    pub waiver_priority: u32,
}

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerStatus {
    Available,
    OnHold,
    Drafted,
}

impl PlayerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerStatus::Available => "AVAILABLE",
            PlayerStatus::OnHold => "ON_HOLD",
            PlayerStatus::Drafted => "DRAFTED",
        }
    }

    pub fn from_str_status(s: &str) -> Option<Self> {
        match s {
            "AVAILABLE" => Some(PlayerStatus::Available),
            "ON_HOLD" => Some(PlayerStatus::OnHold),
            "DRAFTED" => Some(PlayerStatus::Drafted),
            _ => None,
        }
    }
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub allowed_positions: Vec<Position>,
    pub team: String,
    pub rank: u32,
    pub status: PlayerStatus,
    pub pick_chosen: Option<u32>,
    pub current_bot_id: Option<String>,
}

/// A player together with the fantasy points credited for one week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPlayer {
    pub player_id: String,
    pub name: String,
    pub allowed_positions: Vec<Position>,
    pub points: f64,
}

// ---------------------------------------------------------------------------
// League settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeagueSettings {
    pub year: u32,
    pub num_teams: u32,
    pub is_snake_draft: bool,
    pub total_rounds: u32,
    pub points_per_reception: f64,
    /// Roster layout in configured order, bench slots included.
    pub slots: Vec<Position>,
}

impl LeagueSettings {
    /// The roster slots that count toward a weekly score.
    pub fn starting_slots(&self) -> Vec<Position> {
        self.slots
            .iter()
            .copied()
            .filter(|s| *s != Position::Bench)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Matchups
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matchup {
    pub id: u32,
    pub week: u32,
    pub home_bot_id: String,
    pub visitor_bot_id: String,
    pub home_score: f64,
    pub visitor_score: f64,
    pub winner_bot_id: Option<String>,
    pub is_playoff: bool,
    /// Matchup whose winner becomes the home participant.
    pub home_ref: Option<u32>,
    /// Matchup whose winner becomes the visiting participant.
    pub visitor_ref: Option<u32>,
}

impl Matchup {
    pub fn new(id: u32, week: u32, home: &str, visitor: &str) -> Self {
        Self {
            id,
            week,
            home_bot_id: home.to_string(),
            visitor_bot_id: visitor.to_string(),
            home_score: 0.0,
            visitor_score: 0.0,
            winner_bot_id: None,
            is_playoff: false,
            home_ref: None,
            visitor_ref: None,
        }
    }

    pub fn is_bye(&self) -> bool {
        self.home_bot_id == BYE_BOT_ID || self.visitor_bot_id == BYE_BOT_ID
    }

    pub fn is_final(&self) -> bool {
        self.winner_bot_id.is_some()
    }

    pub fn involves(&self, bot_id: &str) -> bool {
        self.home_bot_id == bot_id || self.visitor_bot_id == bot_id
    }
}

// ---------------------------------------------------------------------------
// Waivers
// ---------------------------------------------------------------------------

/// One sealed-bid request: add `add_player_id`, release `drop_player_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaiverClaim {
    pub bot_id: String,
    pub add_player_id: String,
    pub drop_player_id: String,
    pub bid: u32,
}

/// Ledger row for a completed add/drop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub week: u32,
    pub bot_id: String,
    pub added_player_id: String,
    pub dropped_player_id: String,
    pub bid: u32,
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}

// ---------------------------------------------------------------------------
// Snapshot handed to bots
// ---------------------------------------------------------------------------

/// Public game state serialized for a bot decision request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub acting_bot_id: String,
    pub league: LeagueSettings,
    pub current_pick: u32,
    pub current_week: u32,
    pub bots: Vec<Bot>,
    pub players: Vec<Player>,
}
