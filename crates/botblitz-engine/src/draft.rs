// Draft Mode: snake-order turns, bot picks through the sandbox, and the
// random autodraft fallback.

use thiserror::Error;
use tracing::{info, warn};

use botblitz_core::error::{StorageError, ValidationError};
use botblitz_core::model::{Bot, LeagueSettings, Player, PlayerStatus};
use botblitz_core::report::PickReport;
use botblitz_core::store::{GameStateStore, PlayerUpdate};

use crate::session::Session;

/// Random draws before autodraft gives up.
pub const AUTODRAFT_MAX_ATTEMPTS: u32 = 100;

#[derive(Debug, Error)]
pub enum DraftError {
    #[error("invalid draft settings: {0}")]
    InvalidSettings(String),

    #[error("autodraft found no available player in {attempts} attempts")]
    AutodraftExhausted { attempts: u32 },

    #[error("storage failure during draft: {0}")]
    Storage(#[from] StorageError),
}

// ---------------------------------------------------------------------------
// Turn order
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub pick: u32,
    pub round: u32,
    pub bot_id: String,
}

/// Snake-draft state machine over `(round, direction, index)`. Odd rounds
/// walk the bots forward, even rounds backward.
#[derive(Debug, Clone)]
pub struct SnakeOrder {
    bot_ids: Vec<String>,
    rounds: u32,
    round: u32,
    direction: Direction,
    index: usize,
    pick: u32,
}

impl SnakeOrder {
    pub fn new(bot_ids: Vec<String>, rounds: u32) -> Self {
        Self {
            bot_ids,
            rounds,
            round: 1,
            direction: Direction::Forward,
            index: 0,
            pick: 1,
        }
    }

    pub fn total_picks(&self) -> u32 {
        self.rounds * self.bot_ids.len() as u32
    }

    /// Fast-forward so the next turn is `pick` (1-based).
    pub fn starting_at(mut self, pick: u32) -> Self {
        while self.pick < pick && self.next().is_some() {}
        self
    }

    fn advance(&mut self) {
        let last = self.bot_ids.len().saturating_sub(1);
        match self.direction {
            Direction::Forward if self.index < last => self.index += 1,
            Direction::Backward if self.index > 0 => self.index -= 1,
            _ => {
                // End of the row: same bot picks again, heading back
                self.round += 1;
                self.direction = match self.direction {
                    Direction::Forward => Direction::Backward,
                    Direction::Backward => Direction::Forward,
                };
            }
        }
        self.pick += 1;
    }
}

impl Iterator for SnakeOrder {
    type Item = Turn;

    fn next(&mut self) -> Option<Turn> {
        if self.bot_ids.is_empty() || self.round > self.rounds {
            return None;
        }
        let turn = Turn {
            pick: self.pick,
            round: self.round,
            bot_id: self.bot_ids[self.index].clone(),
        };
        self.advance();
        Some(turn)
    }
}

// ---------------------------------------------------------------------------
// Validation and fallback
// ---------------------------------------------------------------------------

pub fn validate_draft_settings(settings: &LeagueSettings, bots: &[Bot]) -> Result<(), DraftError> {
    if !settings.is_snake_draft {
        return Err(DraftError::InvalidSettings(
            "only snake drafts are supported".into(),
        ));
    }
    if settings.total_rounds == 0 {
        return Err(DraftError::InvalidSettings("total_rounds must be > 0".into()));
    }
    if settings.num_teams == 0 {
        return Err(DraftError::InvalidSettings("num_teams must be > 0".into()));
    }
    if bots.is_empty() {
        return Err(DraftError::InvalidSettings("no bots registered".into()));
    }
    if bots.len() as u32 != settings.num_teams {
        return Err(DraftError::InvalidSettings(format!(
            "{} bots registered for {} teams",
            bots.len(),
            settings.num_teams
        )));
    }
    Ok(())
}

/// Check a bot's returned player id against the looked-up player.
pub fn check_pick(player_id: &str, found: Option<&Player>) -> Result<(), ValidationError> {
    if player_id.trim().is_empty() {
        return Err(ValidationError::EmptySelection);
    }
    let Some(player) = found else {
        return Err(ValidationError::UnknownPlayer {
            player_id: player_id.to_string(),
        });
    };
    if player.status != PlayerStatus::Available {
        return Err(ValidationError::PlayerUnavailable {
            player_id: player_id.to_string(),
            status: player.status,
        });
    }
    Ok(())
}

/// Draw random players until one is AVAILABLE, at most `max_attempts` times.
pub fn autodraft(store: &dyn GameStateStore, max_attempts: u32) -> Result<Player, DraftError> {
    for _ in 0..max_attempts {
        if let Some(player) = store.get_random_player()? {
            if player.status == PlayerStatus::Available {
                return Ok(player);
            }
        }
    }
    Err(DraftError::AutodraftExhausted {
        attempts: max_attempts,
    })
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftSummary {
    pub picks_made: u32,
    pub autodrafted: u32,
    pub cancelled: bool,
}

/// The bot's own choice, or `None` when it has to be replaced.
async fn requested_pick(session: &Session<'_>, turn: &Turn) -> Result<Option<Player>, DraftError> {
    let Some(descriptor) = session.descriptor(&turn.bot_id) else {
        warn!("pick {}: {} has no sandbox descriptor", turn.pick, turn.bot_id);
        return Ok(None);
    };
    let snapshot = session.snapshot(&turn.bot_id)?;

    let player_id = match session.sandbox.request_draft_pick(descriptor, &snapshot).await {
        Ok(id) => id,
        Err(e) => {
            warn!("pick {}: sandbox failed for {}: {e}", turn.pick, turn.bot_id);
            return Ok(None);
        }
    };

    let found = session.store.get_player_by_id(player_id.trim())?;
    match check_pick(&player_id, found.as_ref()) {
        Ok(()) => Ok(found),
        Err(e) => {
            warn!("pick {}: rejected choice from {}: {e}", turn.pick, turn.bot_id);
            Ok(None)
        }
    }
}

/// Run the draft from the store's current pick to the end, or until
/// cancelled. A bot's failed turn is filled by autodraft; only storage
/// failures and an exhausted autodraft abort the run.
pub async fn run_draft(session: &Session<'_>) -> Result<DraftSummary, DraftError> {
    let settings = session.settings();
    validate_draft_settings(settings, session.bots())?;

    let order: Vec<String> = session.bots().iter().map(|b| b.id.clone()).collect();
    let start = session.store.get_current_draft_pick()?;
    let schedule = SnakeOrder::new(order, settings.total_rounds);
    let total = schedule.total_picks();
    if start > total {
        info!("draft already complete ({total} picks)");
        return Ok(DraftSummary::default());
    }
    info!("draft starting at pick {start} of {total}");

    let mut summary = DraftSummary::default();
    for turn in schedule.starting_at(start) {
        if session.cancel.is_cancelled() {
            warn!("draft cancelled before pick {}", turn.pick);
            summary.cancelled = true;
            break;
        }
        session.store.set_current_turn(&turn.bot_id)?;

        let (player, autodrafted) = match requested_pick(session, &turn).await? {
            Some(player) => (player, false),
            None => (autodraft(session.store, AUTODRAFT_MAX_ATTEMPTS)?, true),
        };

        session.store.update_player(
            &player.id,
            &PlayerUpdate {
                status: Some(PlayerStatus::Drafted),
                pick_chosen: Some(turn.pick),
                current_bot_id: Some(turn.bot_id.clone()),
            },
        )?;
        session.store.increment_draft_pick()?;

        summary.picks_made += 1;
        if autodrafted {
            summary.autodrafted += 1;
        }
        session.sink.record_pick(&PickReport {
            pick: turn.pick,
            round: turn.round,
            bot_id: turn.bot_id.clone(),
            player_id: player.id.clone(),
            player_name: player.name.clone(),
            autodrafted,
        });
    }

    info!(
        "draft finished: {} picks, {} autodrafted",
        summary.picks_made, summary.autodrafted
    );
    Ok(summary)
}
