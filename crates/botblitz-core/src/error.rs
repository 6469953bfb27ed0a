// Error types shared across the engine.

use thiserror::Error;

use crate::model::PlayerStatus;

/// Failures of the persistent game-state store. Always fatal to the
/// enclosing operation.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to (de)serialize stored value: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to read csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store invariant violated: {message}")]
    Invariant { message: String },
}

/// A bot decision that does not hold up against the current game state.
/// Rejected decisions are routed to a fallback or excluded, never fatal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("bot returned an empty selection")]
    EmptySelection,

    #[error("player {player_id} does not exist")]
    UnknownPlayer { player_id: String },

    #[error("player {player_id} is {status}, not AVAILABLE")]
    PlayerUnavailable {
        player_id: String,
        status: PlayerStatus,
    },

    #[error("player {player_id} is not on the roster of {bot_id}")]
    DropNotOwned { bot_id: String, player_id: String },

    #[error("bid {bid} exceeds remaining budget {budget} of {bot_id}")]
    OverBudget { bot_id: String, bid: u32, budget: u32 },
}

/// Two winning claims of one bot name the same drop player. Resolved inside
/// the auctioneer by keeping the higher bid; recorded for logging only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "{bot_id} won {kept_add} and {discarded_add} with the same drop {drop_player_id}; kept {kept_add}"
)]
pub struct ResourceConflict {
    pub bot_id: String,
    pub drop_player_id: String,
    pub kept_add: String,
    pub discarded_add: String,
}
