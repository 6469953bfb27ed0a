// Persistent game state: the store contract consumed by the engine.

pub mod import;
pub mod sqlite;

use crate::error::StorageError;
use crate::lineup::Lineup;
use crate::model::{
    Bot, LeagueSettings, Matchup, Player, PlayerStatus, ScoredPlayer, Transaction, WaiverClaim,
};

pub use import::{load_players_csv, load_weekly_stats_csv, StatLine};
pub use sqlite::SqliteStore;

pub type StoreResult<T> = Result<T, StorageError>;

/// Partial update of a player row. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerUpdate {
    pub status: Option<PlayerStatus>,
    pub pick_chosen: Option<u32>,
    pub current_bot_id: Option<String>,
}

/// Everything written once when a season is created.
#[derive(Debug, Clone)]
pub struct SeasonSeed {
    pub settings: LeagueSettings,
    pub bots: Vec<Bot>,
    pub players: Vec<Player>,
    pub schedule: Vec<Matchup>,
}

/// Persistent bots, players, settings, matchups, and the transaction ledger.
///
/// Every call is synchronous and any error is fatal to the caller's
/// operation. Only the orchestrator writes, and only between turns.
pub trait GameStateStore: Send + Sync {
    fn initialize_season(&self, seed: &SeasonSeed) -> StoreResult<()>;

    // --- bots and settings ---
    fn get_bots(&self) -> StoreResult<Vec<Bot>>;
    fn get_league_settings(&self) -> StoreResult<LeagueSettings>;
    fn set_waiver_priorities(&self, priorities: &[(String, u32)]) -> StoreResult<()>;

    // --- players ---
    fn get_player_by_id(&self, id: &str) -> StoreResult<Option<Player>>;
    fn get_random_player(&self) -> StoreResult<Option<Player>>;
    fn get_players(&self) -> StoreResult<Vec<Player>>;
    fn get_players_for_bot(&self, bot_id: &str) -> StoreResult<Vec<Player>>;
    fn update_player(&self, id: &str, update: &PlayerUpdate) -> StoreResult<()>;
    /// Flip every ON_HOLD player back to AVAILABLE; returns how many moved.
    fn release_on_hold_players(&self) -> StoreResult<usize>;

    // --- turn and calendar ---
    fn set_current_turn(&self, bot_id: &str) -> StoreResult<()>;
    fn get_current_turn(&self) -> StoreResult<Option<String>>;
    fn get_current_draft_pick(&self) -> StoreResult<u32>;
    /// Returns the new pick number.
    fn increment_draft_pick(&self) -> StoreResult<u32>;
    fn get_current_week(&self) -> StoreResult<u32>;
    /// Returns the new week number.
    fn increment_week(&self) -> StoreResult<u32>;

    // --- matchups ---
    fn add_matchups(&self, matchups: &[Matchup]) -> StoreResult<()>;
    fn get_matchup(&self, id: u32) -> StoreResult<Option<Matchup>>;
    fn get_matchups_for_week(&self, week: u32) -> StoreResult<Vec<Matchup>>;
    fn get_past_matchups(&self, before_week: u32) -> StoreResult<Vec<Matchup>>;
    /// Record scores; `winner` is `None` for an in-progress update.
    fn set_match_result(
        &self,
        id: u32,
        home_score: f64,
        visitor_score: f64,
        winner: Option<&str>,
    ) -> StoreResult<()>;
    fn update_matchup_bots(&self, id: u32, home: &str, visitor: &str) -> StoreResult<()>;

    // --- waivers ---
    /// Apply one won claim atomically: the add player joins the bot as
    /// DRAFTED, the drop player leaves as ON_HOLD, the bid is debited, and a
    /// ledger row is written. Returns the row.
    fn perform_add_drop(&self, week: u32, claim: &WaiverClaim) -> StoreResult<Transaction>;
    fn get_transactions(&self) -> StoreResult<Vec<Transaction>>;

    // --- scoring ---
    fn import_weekly_stats(&self, stats: &[StatLine]) -> StoreResult<usize>;
    /// The bot's players with their points for `week` (0 when unrecorded),
    /// highest first.
    fn get_roster_scores(&self, bot_id: &str, week: u32) -> StoreResult<Vec<ScoredPlayer>>;
    fn save_lineup(&self, week: u32, bot_id: &str, lineup: &Lineup) -> StoreResult<()>;
}
