// Season initialization: bots, player pool, and regular-season schedule.

use std::path::Path;

use anyhow::{bail, Context};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{info, warn};

use botblitz_core::config::Config;
use botblitz_core::model::{Bot, Player};
use botblitz_core::schedule::round_robin;
use botblitz_core::store::{load_players_csv, GameStateStore, SeasonSeed};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonSummary {
    pub bots: usize,
    pub players: usize,
    pub matchups: usize,
    pub regular_season_weeks: u32,
}

/// Everything a new season starts with. Draft order follows the order bots
/// are configured in; initial waiver priority is a random permutation.
pub fn build_seed<R: Rng + ?Sized>(config: &Config, players: Vec<Player>, rng: &mut R) -> SeasonSeed {
    let mut priorities: Vec<u32> = (1..=config.bots.len() as u32).collect();
    priorities.shuffle(rng);

    let bots: Vec<Bot> = config
        .bots
        .iter()
        .zip(priorities)
        .enumerate()
        .map(|(i, (b, priority))| Bot {
            id: b.id.clone(),
            name: b.name.clone(),
            owner: b.owner.clone(),
            remaining_waiver_budget: config.waivers.initial_budget,
            draft_order: i as u32 + 1,
            waiver_priority: priority,
        })
        .collect();

    let ids: Vec<String> = bots.iter().map(|b| b.id.clone()).collect();
    let weeks = config.playoffs.start_week.saturating_sub(1);

    SeasonSeed {
        settings: config.league_settings(),
        bots,
        players,
        schedule: round_robin(&ids, weeks),
    }
}

/// Create the season in an empty store from config and the ranked player
/// pool at `players_csv`.
pub fn initialize(
    config: &Config,
    store: &dyn GameStateStore,
    players_csv: &Path,
) -> anyhow::Result<SeasonSummary> {
    let players = load_players_csv(players_csv)
        .with_context(|| format!("failed to load player pool from {}", players_csv.display()))?;
    if players.is_empty() {
        bail!("player pool {} has no usable rows", players_csv.display());
    }
    if config.bots.len() as u32 != config.league.num_teams {
        warn!(
            "{} bots configured for a {}-team league; the draft will refuse to start",
            config.bots.len(),
            config.league.num_teams
        );
    }
    let needed = (config.league.num_teams * config.league.total_rounds) as usize;
    if players.len() < needed {
        warn!("player pool has {} players, draft needs {needed}", players.len());
    }

    let seed = build_seed(config, players, &mut rand::rng());
    store
        .initialize_season(&seed)
        .context("failed to initialize season")?;

    let summary = SeasonSummary {
        bots: seed.bots.len(),
        players: seed.players.len(),
        matchups: seed.schedule.len(),
        regular_season_weeks: config.playoffs.start_week.saturating_sub(1),
    };
    info!(
        "season {} initialized: {} bots, {} players, {} matchups over {} weeks",
        config.league.year,
        summary.bots,
        summary.players,
        summary.matchups,
        summary.regular_season_weeks
    );
    Ok(summary)
}
