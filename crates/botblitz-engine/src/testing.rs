// Shared fixtures for the engine's unit tests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use botblitz_core::model::{Bot, GameSnapshot, LeagueSettings, Player, PlayerStatus, WaiverClaim};
use botblitz_core::position::Position;
use botblitz_core::report::{PickReport, ReportSink, WeekReport};
use botblitz_core::schedule::round_robin;
use botblitz_core::store::{GameStateStore, SeasonSeed, SqliteStore};
use botblitz_sandbox::{BotDescriptor, BotSandbox, SandboxError};

use crate::cancel::CancelFlag;
use crate::session::Session;

pub(crate) enum PickScript {
    Fixed(String),
    Fail,
}

/// Scripted sandbox. Unscripted bots take the best-ranked available player
/// and submit no claims.
#[derive(Default)]
pub(crate) struct FakeSandbox {
    picks: Mutex<HashMap<String, PickScript>>,
    claims: Mutex<HashMap<String, Option<Vec<WaiverClaim>>>>,
    draft_calls: Mutex<Vec<String>>,
    claim_calls: Mutex<Vec<String>>,
}

impl FakeSandbox {
    pub(crate) fn script(&self, bot_id: &str, script: PickScript) {
        self.picks.lock().unwrap().insert(bot_id.to_string(), script);
    }

    /// `(add, drop, bid)` triples the bot submits.
    pub(crate) fn claims(&self, bot_id: &str, claims: &[(&str, &str, u32)]) {
        let claims = claims
            .iter()
            .map(|(add, drop, bid)| WaiverClaim {
                bot_id: bot_id.to_string(),
                add_player_id: add.to_string(),
                drop_player_id: drop.to_string(),
                bid: *bid,
            })
            .collect();
        self.claims.lock().unwrap().insert(bot_id.to_string(), Some(claims));
    }

    pub(crate) fn fail_claims(&self, bot_id: &str) {
        self.claims.lock().unwrap().insert(bot_id.to_string(), None);
    }

    pub(crate) fn draft_calls(&self) -> Vec<String> {
        self.draft_calls.lock().unwrap().clone()
    }

    pub(crate) fn claim_calls(&self) -> Vec<String> {
        self.claim_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BotSandbox for FakeSandbox {
    async fn request_draft_pick(
        &self,
        bot: &BotDescriptor,
        snapshot: &GameSnapshot,
    ) -> Result<String, SandboxError> {
        self.draft_calls.lock().unwrap().push(bot.id.clone());
        match self.picks.lock().unwrap().get(&bot.id) {
            Some(PickScript::Fixed(id)) => Ok(id.clone()),
            Some(PickScript::Fail) => Err(SandboxError::Remote {
                message: "bot crashed".into(),
            }),
            None => snapshot
                .players
                .iter()
                .filter(|p| p.status == PlayerStatus::Available)
                .min_by_key(|p| p.rank)
                .map(|p| p.id.clone())
                .ok_or(SandboxError::Remote {
                    message: "nothing left".into(),
                }),
        }
    }

    async fn request_claims(
        &self,
        bot: &BotDescriptor,
        _snapshot: &GameSnapshot,
    ) -> Result<Vec<WaiverClaim>, SandboxError> {
        self.claim_calls.lock().unwrap().push(bot.id.clone());
        match self.claims.lock().unwrap().get(&bot.id) {
            Some(Some(claims)) => Ok(claims.clone()),
            Some(None) => Err(SandboxError::Timeout {
                deadline: Duration::from_secs(60),
            }),
            None => Ok(Vec::new()),
        }
    }
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    picks: Mutex<Vec<PickReport>>,
    weeks: Mutex<Vec<WeekReport>>,
}

impl RecordingSink {
    pub(crate) fn picks(&self) -> Vec<PickReport> {
        self.picks.lock().unwrap().clone()
    }

    pub(crate) fn weeks(&self) -> Vec<WeekReport> {
        self.weeks.lock().unwrap().clone()
    }
}

impl ReportSink for RecordingSink {
    fn record_pick(&self, pick: &PickReport) {
        self.picks.lock().unwrap().push(pick.clone());
    }

    fn record_week(&self, report: &WeekReport) {
        self.weeks.lock().unwrap().push(report.clone());
    }
}

const POSITION_CYCLE: [Position; 4] = [
    Position::Quarterback,
    Position::RunningBack,
    Position::WideReceiver,
    Position::TightEnd,
];

/// In-memory season: `bots` bots (`bot1`..) in a league of `num_teams`,
/// `players` players (`p1`.. ranked in order, positions cycling QB, RB, WR,
/// TE) and a three-week round robin.
pub(crate) fn store_with(num_teams: u32, bots: u32, rounds: u32, players: u32) -> SqliteStore {
    let store = SqliteStore::open(":memory:").unwrap();
    let bot_rows: Vec<Bot> = (1..=bots)
        .map(|i| Bot {
            id: format!("bot{i}"),
            name: format!("Bot {i}"),
            owner: "tests".into(),
            remaining_waiver_budget: 100,
            draft_order: i,
            waiver_priority: i,
        })
        .collect();
    let player_rows: Vec<Player> = (1..=players)
        .map(|i| Player {
            id: format!("p{i}"),
            name: format!("Player {i}"),
            allowed_positions: vec![POSITION_CYCLE[(i as usize - 1) % POSITION_CYCLE.len()]],
            team: "FA".into(),
            rank: i,
            status: PlayerStatus::Available,
            pick_chosen: None,
            current_bot_id: None,
        })
        .collect();
    let ids: Vec<String> = bot_rows.iter().map(|b| b.id.clone()).collect();
    store
        .initialize_season(&SeasonSeed {
            settings: LeagueSettings {
                year: 2024,
                num_teams,
                is_snake_draft: true,
                total_rounds: rounds,
                points_per_reception: 1.0,
                slots: vec![
                    Position::Quarterback,
                    Position::RunningBack,
                    Position::WideReceiver,
                    Position::Flex,
                    Position::Bench,
                ],
            },
            bots: bot_rows,
            players: player_rows,
            schedule: round_robin(&ids, 3),
        })
        .unwrap();
    store
}

pub(crate) fn seeded_store(bots: u32, rounds: u32, players: u32) -> SqliteStore {
    store_with(bots, bots, rounds, players)
}

/// Give `player_id` to `bot_id` as a drafted player.
pub(crate) fn give(store: &dyn GameStateStore, player_id: &str, bot_id: &str) {
    store
        .update_player(
            player_id,
            &botblitz_core::store::PlayerUpdate {
                status: Some(PlayerStatus::Drafted),
                pick_chosen: None,
                current_bot_id: Some(bot_id.to_string()),
            },
        )
        .unwrap();
}

pub(crate) fn session_for<'a>(
    store: &'a SqliteStore,
    sandbox: &'a FakeSandbox,
    sink: &'a dyn ReportSink,
) -> Session<'a> {
    let descriptors = store
        .get_bots()
        .unwrap()
        .into_iter()
        .map(|b| BotDescriptor {
            source_path: PathBuf::from(format!("bots/{}.py", b.id)),
            id: b.id,
            env_path: None,
        })
        .collect();
    Session::load(store, sandbox, sink, descriptors, CancelFlag::new()).unwrap()
}
