// CSV readers for the ranked player pool and weekly fantasy points.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::error::StorageError;
use crate::model::{Player, PlayerStatus};
use crate::position::parse_position_list;

#[derive(Debug, Deserialize)]
struct PlayerRow {
    id: String,
    name: String,
    pos: String,
    #[serde(default)]
    team: String,
    rank: u32,
}

/// One player's fantasy points for one week.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatLine {
    pub player_id: String,
    pub week: u32,
    pub fpts: f64,
}

/// Read the ranked player pool. Extra columns (bye, tier, ...) are ignored;
/// rows whose positions are all unknown are skipped with a warning.
pub fn load_players_csv(path: &Path) -> Result<Vec<Player>, StorageError> {
    let file = std::fs::File::open(path)?;
    read_players(file)
}

pub(crate) fn read_players<R: Read>(reader: R) -> Result<Vec<Player>, StorageError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut players = Vec::new();
    for row in rdr.deserialize::<PlayerRow>() {
        let row = row?;
        let positions = parse_position_list(&row.pos);
        if positions.is_empty() {
            warn!("skipping player {} ({}): no known position in {:?}", row.id, row.name, row.pos);
            continue;
        }
        players.push(Player {
            id: row.id,
            name: row.name,
            allowed_positions: positions,
            team: row.team,
            rank: row.rank,
            status: PlayerStatus::Available,
            pick_chosen: None,
            current_bot_id: None,
        });
    }
    Ok(players)
}

/// Read `player_id,week,fpts` rows.
pub fn load_weekly_stats_csv(path: &Path) -> Result<Vec<StatLine>, StorageError> {
    let file = std::fs::File::open(path)?;
    read_weekly_stats(file)
}

pub(crate) fn read_weekly_stats<R: Read>(reader: R) -> Result<Vec<StatLine>, StorageError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut out = Vec::new();
    for row in rdr.deserialize::<StatLine>() {
        out.push(row?);
    }
    Ok(out)
}
