// Per-run session: the collaborators every mode needs, plus league settings
// and the bot roster read once at startup.

use std::collections::HashMap;

use tracing::warn;

use botblitz_core::error::StorageError;
use botblitz_core::model::{Bot, GameSnapshot, LeagueSettings};
use botblitz_core::report::ReportSink;
use botblitz_core::store::{GameStateStore, StoreResult};
use botblitz_sandbox::{BotDescriptor, BotSandbox};

use crate::cancel::CancelFlag;

pub struct Session<'a> {
    pub store: &'a dyn GameStateStore,
    pub sandbox: &'a dyn BotSandbox,
    pub sink: &'a dyn ReportSink,
    pub cancel: CancelFlag,
    settings: LeagueSettings,
    bots: Vec<Bot>,
    descriptors: HashMap<String, BotDescriptor>,
}

impl<'a> Session<'a> {
    /// Read league settings and the bot roster. Either failing ends the run.
    pub fn load(
        store: &'a dyn GameStateStore,
        sandbox: &'a dyn BotSandbox,
        sink: &'a dyn ReportSink,
        descriptors: Vec<BotDescriptor>,
        cancel: CancelFlag,
    ) -> StoreResult<Self> {
        let settings = store.get_league_settings()?;
        let mut bots = store.get_bots()?;
        if bots.is_empty() {
            return Err(StorageError::NotFound {
                entity: "bot roster",
                id: "*".to_string(),
            });
        }
        bots.sort_by(|a, b| a.draft_order.cmp(&b.draft_order).then_with(|| a.id.cmp(&b.id)));

        let descriptors: HashMap<String, BotDescriptor> =
            descriptors.into_iter().map(|d| (d.id.clone(), d)).collect();
        for bot in &bots {
            match descriptors.get(&bot.id) {
                None => warn!("bot {} has no configured source; its turns fall back", bot.id),
                Some(d) if !d.source_exists() => warn!(
                    "bot {} source {} is missing; its turns fall back",
                    bot.id,
                    d.source_path.display()
                ),
                Some(_) => {}
            }
        }

        Ok(Self {
            store,
            sandbox,
            sink,
            cancel,
            settings,
            bots,
            descriptors,
        })
    }

    pub fn settings(&self) -> &LeagueSettings {
        &self.settings
    }

    /// Bots in draft order.
    pub fn bots(&self) -> &[Bot] {
        &self.bots
    }

    pub fn descriptor(&self, bot_id: &str) -> Option<&BotDescriptor> {
        self.descriptors.get(bot_id)
    }

    /// Public state for `acting_bot_id`. Budgets and players are read fresh;
    /// they change between turns.
    pub fn snapshot(&self, acting_bot_id: &str) -> StoreResult<GameSnapshot> {
        Ok(GameSnapshot {
            acting_bot_id: acting_bot_id.to_string(),
            league: self.settings.clone(),
            current_pick: self.store.get_current_draft_pick()?,
            current_week: self.store.get_current_week()?,
            bots: self.store.get_bots()?,
            players: self.store.get_players()?,
        })
    }
}
