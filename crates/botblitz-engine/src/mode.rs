use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameMode {
    Draft,
    Weekly,
    Score,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown game mode `{0}` (expected draft, weekly or score)")]
pub struct UnknownMode(pub String);

impl FromStr for GameMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(GameMode::Draft),
            "weekly" => Ok(GameMode::Weekly),
            "score" => Ok(GameMode::Score),
            _ => Err(UnknownMode(s.to_string())),
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GameMode::Draft => "draft",
            GameMode::Weekly => "weekly",
            GameMode::Score => "score",
        };
        f.write_str(s)
    }
}
