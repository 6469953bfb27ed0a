// SQLite-backed game-state store.

use std::sync::{Mutex, MutexGuard};

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use super::{GameStateStore, PlayerUpdate, SeasonSeed, StatLine, StoreResult};
use crate::error::StorageError;
use crate::lineup::Lineup;
use crate::model::{
    Bot, LeagueSettings, Matchup, Player, PlayerStatus, ScoredPlayer, Transaction, WaiverClaim,
};
use crate::position::Position;

const PLAYER_COLUMNS: &str =
    "id, name, allowed_positions, team, rank, availability, pick_chosen, current_bot_id";

const MATCHUP_COLUMNS: &str = "id, week, home_bot_id, visitor_bot_id, home_score, visitor_score,
     winning_bot_id, is_playoff, home_ref, visitor_ref";

/// One season of game state in a single SQLite file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the store at `path` and ensure all tables exist.
    /// Pass `":memory:"` for an ephemeral store.
    pub fn open(path: &str) -> StoreResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS bots (
                id                      TEXT PRIMARY KEY,
                name                    TEXT NOT NULL,
                owner                   TEXT NOT NULL,
                remaining_waiver_budget INTEGER NOT NULL,
                draft_order             INTEGER NOT NULL,
                waiver_priority         INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS game_status (
                id                   INTEGER PRIMARY KEY CHECK (id = 1),
                current_draft_pick   INTEGER NOT NULL DEFAULT 1,
                current_bot_id       TEXT,
                current_fantasy_week INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS league_settings (
                id                   INTEGER PRIMARY KEY CHECK (id = 1),
                year                 INTEGER NOT NULL,
                num_teams            INTEGER NOT NULL,
                is_snake_draft       INTEGER NOT NULL,
                total_rounds         INTEGER NOT NULL,
                points_per_reception REAL NOT NULL,
                player_slots         TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS players (
                id                TEXT PRIMARY KEY,
                name              TEXT NOT NULL,
                allowed_positions TEXT NOT NULL,
                team              TEXT NOT NULL,
                rank              INTEGER NOT NULL,
                availability      TEXT NOT NULL,
                pick_chosen       INTEGER,
                current_bot_id    TEXT REFERENCES bots(id)
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_players_pick
                ON players(pick_chosen) WHERE pick_chosen IS NOT NULL;

            CREATE TABLE IF NOT EXISTS matchups (
                id             INTEGER PRIMARY KEY,
                week           INTEGER NOT NULL,
                home_bot_id    TEXT NOT NULL,
                visitor_bot_id TEXT NOT NULL,
                home_score     REAL NOT NULL DEFAULT 0,
                visitor_score  REAL NOT NULL DEFAULT 0,
                winning_bot_id TEXT,
                is_playoff     INTEGER NOT NULL DEFAULT 0,
                home_ref       INTEGER,
                visitor_ref    INTEGER
            );

            CREATE TABLE IF NOT EXISTS weekly_stats (
                player_id TEXT NOT NULL,
                week      INTEGER NOT NULL,
                fpts      REAL NOT NULL,
                PRIMARY KEY (player_id, week)
            );

            CREATE TABLE IF NOT EXISTS transactions (
                id                INTEGER PRIMARY KEY AUTOINCREMENT,
                week              INTEGER NOT NULL,
                bot_id            TEXT NOT NULL REFERENCES bots(id),
                added_player_id   TEXT NOT NULL,
                dropped_player_id TEXT NOT NULL,
                bid               INTEGER NOT NULL,
                recorded_at       TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS weekly_lineups (
                week       INTEGER NOT NULL,
                bot_id     TEXT NOT NULL,
                slot_index INTEGER NOT NULL,
                slot       TEXT NOT NULL,
                player_id  TEXT,
                points     REAL NOT NULL,
                PRIMARY KEY (week, bot_id, slot_index)
            );

            INSERT OR IGNORE INTO game_status (id) VALUES (1);
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the connection. Panics if the mutex is poisoned, which only
    /// happens after another thread panicked mid-query.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("store mutex poisoned")
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn player_from_row(row: &Row<'_>) -> rusqlite::Result<Player> {
    let positions_json: String = row.get(2)?;
    let allowed_positions: Vec<Position> = serde_json::from_str(&positions_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
    let availability: String = row.get(5)?;
    let status = PlayerStatus::from_str_status(&availability)
        .ok_or_else(|| conversion_error(5, format!("unknown availability {availability}")))?;
    Ok(Player {
        id: row.get(0)?,
        name: row.get(1)?,
        allowed_positions,
        team: row.get(3)?,
        rank: row.get(4)?,
        status,
        pick_chosen: row.get(6)?,
        current_bot_id: row.get(7)?,
    })
}

fn matchup_from_row(row: &Row<'_>) -> rusqlite::Result<Matchup> {
    Ok(Matchup {
        id: row.get(0)?,
        week: row.get(1)?,
        home_bot_id: row.get(2)?,
        visitor_bot_id: row.get(3)?,
        home_score: row.get(4)?,
        visitor_score: row.get(5)?,
        winner_bot_id: row.get(6)?,
        is_playoff: row.get(7)?,
        home_ref: row.get(8)?,
        visitor_ref: row.get(9)?,
    })
}

fn bot_from_row(row: &Row<'_>) -> rusqlite::Result<Bot> {
    Ok(Bot {
        id: row.get(0)?,
        name: row.get(1)?,
        owner: row.get(2)?,
        remaining_waiver_budget: row.get(3)?,
        draft_order: row.get(4)?,
        waiver_priority: row.get(5)?,
    })
}

fn insert_matchup(conn: &Connection, m: &Matchup) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO matchups (id, week, home_bot_id, visitor_bot_id, home_score, visitor_score,
                               winning_bot_id, is_playoff, home_ref, visitor_ref)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            m.id,
            m.week,
            m.home_bot_id,
            m.visitor_bot_id,
            m.home_score,
            m.visitor_score,
            m.winner_bot_id,
            m.is_playoff,
            m.home_ref,
            m.visitor_ref,
        ],
    )?;
    Ok(())
}

fn not_found(entity: &'static str, id: impl ToString) -> StorageError {
    StorageError::NotFound {
        entity,
        id: id.to_string(),
    }
}

// ---------------------------------------------------------------------------
// GameStateStore
// ---------------------------------------------------------------------------

impl GameStateStore for SqliteStore {
    fn initialize_season(&self, seed: &SeasonSeed) -> StoreResult<()> {
        let mut conn = self.conn();
        let existing: u32 = conn.query_row("SELECT COUNT(*) FROM bots", [], |r| r.get(0))?;
        if existing > 0 {
            return Err(StorageError::Invariant {
                message: format!("season already initialized with {existing} bots"),
            });
        }

        let tx = conn.transaction()?;
        let s = &seed.settings;
        tx.execute(
            "INSERT INTO league_settings
                (id, year, num_teams, is_snake_draft, total_rounds, points_per_reception, player_slots)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                s.year,
                s.num_teams,
                s.is_snake_draft,
                s.total_rounds,
                s.points_per_reception,
                serde_json::to_string(&s.slots)?,
            ],
        )?;

        for bot in &seed.bots {
            tx.execute(
                "INSERT INTO bots (id, name, owner, remaining_waiver_budget, draft_order, waiver_priority)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    bot.id,
                    bot.name,
                    bot.owner,
                    bot.remaining_waiver_budget,
                    bot.draft_order,
                    bot.waiver_priority,
                ],
            )?;
        }

        for p in &seed.players {
            tx.execute(
                "INSERT INTO players (id, name, allowed_positions, team, rank, availability,
                                      pick_chosen, current_bot_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    p.id,
                    p.name,
                    serde_json::to_string(&p.allowed_positions)?,
                    p.team,
                    p.rank,
                    p.status.as_str(),
                    p.pick_chosen,
                    p.current_bot_id,
                ],
            )?;
        }

        for m in &seed.schedule {
            insert_matchup(&tx, m)?;
        }

        tx.execute(
            "UPDATE game_status SET current_draft_pick = 1, current_bot_id = NULL,
                                    current_fantasy_week = 1
             WHERE id = 1",
            [],
        )?;
        tx.commit()?;

        info!(
            "season {} initialized: {} bots, {} players, {} matchups",
            s.year,
            seed.bots.len(),
            seed.players.len(),
            seed.schedule.len()
        );
        Ok(())
    }

    fn get_bots(&self) -> StoreResult<Vec<Bot>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, owner, remaining_waiver_budget, draft_order, waiver_priority
             FROM bots ORDER BY id ASC",
        )?;
        let bots = stmt
            .query_map([], bot_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(bots)
    }

    fn get_league_settings(&self) -> StoreResult<LeagueSettings> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT year, num_teams, is_snake_draft, total_rounds, points_per_reception, player_slots
                 FROM league_settings WHERE id = 1",
                [],
                |r| {
                    Ok((
                        r.get::<_, u32>(0)?,
                        r.get::<_, u32>(1)?,
                        r.get::<_, bool>(2)?,
                        r.get::<_, u32>(3)?,
                        r.get::<_, f64>(4)?,
                        r.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;
        let Some((year, num_teams, is_snake_draft, total_rounds, points_per_reception, slots)) = row
        else {
            return Err(not_found("league settings", 1));
        };
        Ok(LeagueSettings {
            year,
            num_teams,
            is_snake_draft,
            total_rounds,
            points_per_reception,
            slots: serde_json::from_str(&slots)?,
        })
    }

    fn set_waiver_priorities(&self, priorities: &[(String, u32)]) -> StoreResult<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for (bot_id, priority) in priorities {
            let changed = tx.execute(
                "UPDATE bots SET waiver_priority = ?1 WHERE id = ?2",
                params![priority, bot_id],
            )?;
            if changed == 0 {
                return Err(not_found("bot", bot_id));
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get_player_by_id(&self, id: &str) -> StoreResult<Option<Player>> {
        let conn = self.conn();
        let player = conn
            .query_row(
                &format!("SELECT {PLAYER_COLUMNS} FROM players WHERE id = ?1"),
                params![id],
                player_from_row,
            )
            .optional()?;
        Ok(player)
    }

    fn get_random_player(&self) -> StoreResult<Option<Player>> {
        let conn = self.conn();
        let player = conn
            .query_row(
                &format!("SELECT {PLAYER_COLUMNS} FROM players ORDER BY RANDOM() LIMIT 1"),
                [],
                player_from_row,
            )
            .optional()?;
        Ok(player)
    }

    fn get_players(&self) -> StoreResult<Vec<Player>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PLAYER_COLUMNS} FROM players ORDER BY rank ASC, id ASC"
        ))?;
        let players = stmt
            .query_map([], player_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(players)
    }

    fn get_players_for_bot(&self, bot_id: &str) -> StoreResult<Vec<Player>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PLAYER_COLUMNS} FROM players WHERE current_bot_id = ?1
             ORDER BY pick_chosen ASC, rank ASC"
        ))?;
        let players = stmt
            .query_map(params![bot_id], player_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(players)
    }

    fn update_player(&self, id: &str, update: &PlayerUpdate) -> StoreResult<()> {
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE players SET
                availability   = COALESCE(?2, availability),
                pick_chosen    = COALESCE(?3, pick_chosen),
                current_bot_id = COALESCE(?4, current_bot_id)
             WHERE id = ?1",
            params![
                id,
                update.status.map(|s| s.as_str()),
                update.pick_chosen,
                update.current_bot_id,
            ],
        )?;
        if changed == 0 {
            return Err(not_found("player", id));
        }
        Ok(())
    }

    fn release_on_hold_players(&self) -> StoreResult<usize> {
        let conn = self.conn();
        let released = conn.execute(
            "UPDATE players SET availability = 'AVAILABLE' WHERE availability = 'ON_HOLD'",
            [],
        )?;
        Ok(released)
    }

    fn set_current_turn(&self, bot_id: &str) -> StoreResult<()> {
        let conn = self.conn();
        conn.execute(
            "UPDATE game_status SET current_bot_id = ?1 WHERE id = 1",
            params![bot_id],
        )?;
        Ok(())
    }

    fn get_current_turn(&self) -> StoreResult<Option<String>> {
        let conn = self.conn();
        let bot: Option<String> = conn.query_row(
            "SELECT current_bot_id FROM game_status WHERE id = 1",
            [],
            |r| r.get(0),
        )?;
        Ok(bot)
    }

    fn get_current_draft_pick(&self) -> StoreResult<u32> {
        let conn = self.conn();
        let pick = conn.query_row(
            "SELECT current_draft_pick FROM game_status WHERE id = 1",
            [],
            |r| r.get(0),
        )?;
        Ok(pick)
    }

    fn increment_draft_pick(&self) -> StoreResult<u32> {
        let conn = self.conn();
        let pick = conn.query_row(
            "UPDATE game_status SET current_draft_pick = current_draft_pick + 1
             WHERE id = 1 RETURNING current_draft_pick",
            [],
            |r| r.get(0),
        )?;
        Ok(pick)
    }

    fn get_current_week(&self) -> StoreResult<u32> {
        let conn = self.conn();
        let week = conn.query_row(
            "SELECT current_fantasy_week FROM game_status WHERE id = 1",
            [],
            |r| r.get(0),
        )?;
        Ok(week)
    }

    fn increment_week(&self) -> StoreResult<u32> {
        let conn = self.conn();
        let week = conn.query_row(
            "UPDATE game_status SET current_fantasy_week = current_fantasy_week + 1
             WHERE id = 1 RETURNING current_fantasy_week",
            [],
            |r| r.get(0),
        )?;
        Ok(week)
    }

    fn add_matchups(&self, matchups: &[Matchup]) -> StoreResult<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for m in matchups {
            insert_matchup(&tx, m)?;
        }
        tx.commit()?;
        debug!("added {} matchups", matchups.len());
        Ok(())
    }

    fn get_matchup(&self, id: u32) -> StoreResult<Option<Matchup>> {
        let conn = self.conn();
        let m = conn
            .query_row(
                &format!("SELECT {MATCHUP_COLUMNS} FROM matchups WHERE id = ?1"),
                params![id],
                matchup_from_row,
            )
            .optional()?;
        Ok(m)
    }

    fn get_matchups_for_week(&self, week: u32) -> StoreResult<Vec<Matchup>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {MATCHUP_COLUMNS} FROM matchups WHERE week = ?1 ORDER BY id ASC"
        ))?;
        let rows = stmt
            .query_map(params![week], matchup_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn get_past_matchups(&self, before_week: u32) -> StoreResult<Vec<Matchup>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {MATCHUP_COLUMNS} FROM matchups WHERE week < ?1 ORDER BY week ASC, id ASC"
        ))?;
        let rows = stmt
            .query_map(params![before_week], matchup_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn set_match_result(
        &self,
        id: u32,
        home_score: f64,
        visitor_score: f64,
        winner: Option<&str>,
    ) -> StoreResult<()> {
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE matchups SET home_score = ?2, visitor_score = ?3, winning_bot_id = ?4
             WHERE id = ?1",
            params![id, home_score, visitor_score, winner],
        )?;
        if changed == 0 {
            return Err(not_found("matchup", id));
        }
        Ok(())
    }

    fn update_matchup_bots(&self, id: u32, home: &str, visitor: &str) -> StoreResult<()> {
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE matchups SET home_bot_id = ?2, visitor_bot_id = ?3 WHERE id = ?1",
            params![id, home, visitor],
        )?;
        if changed == 0 {
            return Err(not_found("matchup", id));
        }
        Ok(())
    }

    fn perform_add_drop(&self, week: u32, claim: &WaiverClaim) -> StoreResult<Transaction> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let dropped = tx.execute(
            "UPDATE players SET availability = 'ON_HOLD', current_bot_id = NULL
             WHERE id = ?1 AND current_bot_id = ?2",
            params![claim.drop_player_id, claim.bot_id],
        )?;
        if dropped == 0 {
            return Err(StorageError::Invariant {
                message: format!(
                    "{} does not own drop player {}",
                    claim.bot_id, claim.drop_player_id
                ),
            });
        }

        let added = tx.execute(
            "UPDATE players SET availability = 'DRAFTED', current_bot_id = ?2
             WHERE id = ?1 AND availability = 'AVAILABLE'",
            params![claim.add_player_id, claim.bot_id],
        )?;
        if added == 0 {
            return Err(StorageError::Invariant {
                message: format!("add player {} is not available", claim.add_player_id),
            });
        }

        let debited = tx.execute(
            "UPDATE bots SET remaining_waiver_budget = remaining_waiver_budget - ?2
             WHERE id = ?1 AND remaining_waiver_budget >= ?2",
            params![claim.bot_id, claim.bid],
        )?;
        if debited == 0 {
            return Err(StorageError::Invariant {
                message: format!("{} cannot cover bid {}", claim.bot_id, claim.bid),
            });
        }

        let record = Transaction {
            week,
            bot_id: claim.bot_id.clone(),
            added_player_id: claim.add_player_id.clone(),
            dropped_player_id: claim.drop_player_id.clone(),
            bid: claim.bid,
            recorded_at: chrono::Utc::now(),
        };
        tx.execute(
            "INSERT INTO transactions (week, bot_id, added_player_id, dropped_player_id, bid, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.week,
                record.bot_id,
                record.added_player_id,
                record.dropped_player_id,
                record.bid,
                record.recorded_at.to_rfc3339(),
            ],
        )?;

        // Dropping `tx` without commit rolls back every early return above.
        tx.commit()?;
        Ok(record)
    }

    fn get_transactions(&self) -> StoreResult<Vec<Transaction>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT week, bot_id, added_player_id, dropped_player_id, bid, recorded_at
             FROM transactions ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map([], |r| {
                let recorded: String = r.get(5)?;
                let recorded_at = chrono::DateTime::parse_from_rfc3339(&recorded)
                    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?
                    .with_timezone(&chrono::Utc);
                Ok(Transaction {
                    week: r.get(0)?,
                    bot_id: r.get(1)?,
                    added_player_id: r.get(2)?,
                    dropped_player_id: r.get(3)?,
                    bid: r.get(4)?,
                    recorded_at,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn import_weekly_stats(&self, stats: &[StatLine]) -> StoreResult<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for line in stats {
            tx.execute(
                "INSERT OR REPLACE INTO weekly_stats (player_id, week, fpts) VALUES (?1, ?2, ?3)",
                params![line.player_id, line.week, line.fpts],
            )?;
        }
        tx.commit()?;
        Ok(stats.len())
    }

    fn get_roster_scores(&self, bot_id: &str, week: u32) -> StoreResult<Vec<ScoredPlayer>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT p.id, p.name, p.allowed_positions, COALESCE(s.fpts, 0.0) AS points
             FROM players p
             LEFT JOIN weekly_stats s ON s.player_id = p.id AND s.week = ?2
             WHERE p.current_bot_id = ?1
             ORDER BY points DESC, p.rank ASC",
        )?;
        let rows = stmt
            .query_map(params![bot_id, week], |r| {
                let positions: String = r.get(2)?;
                Ok(ScoredPlayer {
                    player_id: r.get(0)?,
                    name: r.get(1)?,
                    allowed_positions: serde_json::from_str(&positions).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e))
                    })?,
                    points: r.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn save_lineup(&self, week: u32, bot_id: &str, lineup: &Lineup) -> StoreResult<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM weekly_lineups WHERE week = ?1 AND bot_id = ?2",
            params![week, bot_id],
        )?;
        for (i, slot) in lineup.slots.iter().enumerate() {
            tx.execute(
                "INSERT INTO weekly_lineups (week, bot_id, slot_index, slot, player_id, points)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    week,
                    bot_id,
                    i as u32,
                    slot.slot.display_str(),
                    slot.player.as_ref().map(|p| p.player_id.as_str()),
                    slot.points(),
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}
