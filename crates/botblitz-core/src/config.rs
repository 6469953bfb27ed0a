// Configuration loading and parsing (league.toml, engine.toml).

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::model::LeagueSettings;
use crate::position::Position;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub league: LeagueConfig,
    pub playoffs: PlayoffConfig,
    pub waivers: WaiverConfig,
    pub db_path: String,
    pub players_csv: String,
    pub sandbox: SandboxConfig,
    pub bots: Vec<BotConfig>,
}

impl Config {
    /// League settings as stored at season initialization. Slot tags have
    /// already been checked by `validate`, so unknown tags cannot appear.
    pub fn league_settings(&self) -> LeagueSettings {
        LeagueSettings {
            year: self.league.year,
            num_teams: self.league.num_teams,
            is_snake_draft: self.league.is_snake_draft,
            total_rounds: self.league.total_rounds,
            points_per_reception: self.league.points_per_reception,
            slots: self
                .league
                .slots
                .iter()
                .filter_map(|s| Position::from_str_pos(s))
                .collect(),
        }
    }

    pub fn bot_config(&self, bot_id: &str) -> Option<&BotConfig> {
        self.bots.iter().find(|b| b.id == bot_id)
    }
}

// ---------------------------------------------------------------------------
// league.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct LeagueFile {
    league: LeagueConfig,
    playoffs: PlayoffConfig,
    waivers: WaiverConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeagueConfig {
    pub year: u32,
    pub num_teams: u32,
    #[serde(default = "default_true")]
    pub is_snake_draft: bool,
    pub total_rounds: u32,
    #[serde(default)]
    pub points_per_reception: f64,
    /// Slot tags in roster order, e.g. `["QB", "RB", "FLEX", "BENCH"]`.
    pub slots: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayoffConfig {
    pub start_week: u32,
    pub num_teams: u32,
    pub byes: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaiverConfig {
    pub initial_budget: u32,
    pub max_claims_per_run: usize,
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// engine.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct EngineFile {
    database: DatabaseSection,
    data: DataSection,
    sandbox: SandboxConfig,
    #[serde(default)]
    bots: Vec<BotConfig>,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
struct DataSection {
    players_csv: String,
}

/// Container limits and timing for one bot decision.
#[derive(Debug, Clone, Deserialize)]
pub struct SandboxConfig {
    pub image: String,
    pub container_name: String,
    pub port: u16,
    pub memory_mb: u32,
    pub cpus: f64,
    pub connect_timeout_secs: u64,
    pub call_timeout_secs: u64,
    /// Host directory the bot source is written to and mounted read-only.
    pub source_dir: String,
    pub log_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub owner: String,
    /// Local path to the bot's source file.
    pub source_path: String,
    /// Optional `KEY=VALUE` file passed to the sandbox environment.
    #[serde(default)]
    pub env_path: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/league.toml` and
/// `config/engine.toml`, both relative to `base_dir`.
///
/// Does not copy defaults; `load_config()` does.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    let league_path = config_dir.join("league.toml");
    let league_text = read_file(&league_path)?;
    let league_file: LeagueFile =
        toml::from_str(&league_text).map_err(|e| ConfigError::ParseError {
            path: league_path.clone(),
            source: e,
        })?;

    let engine_path = config_dir.join("engine.toml");
    let engine_text = read_file(&engine_path)?;
    let engine_file: EngineFile =
        toml::from_str(&engine_text).map_err(|e| ConfigError::ParseError {
            path: engine_path.clone(),
            source: e,
        })?;

    let config = Config {
        league: league_file.league,
        playoffs: league_file.playoffs,
        waivers: league_file.waivers,
        db_path: engine_file.database.path,
        players_csv: engine_file.data.players_csv,
        sandbox: engine_file.sandbox,
        bots: engine_file.bots,
    };

    validate(&config)?;

    Ok(config)
}

/// Files the engine reads from `config/`.
pub const CONFIG_FILES: [&str; 2] = ["league.toml", "engine.toml"];

/// Seed `config/` with each of [`CONFIG_FILES`] it lacks, copied from
/// `defaults/`. Anything else in `defaults/` (bot env templates) stays put.
/// Returns the files that were copied.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.is_dir() {
        if config_dir.is_dir() {
            return Ok(Vec::new());
        }
        return Err(copy_error(format!(
            "neither defaults/ nor config/ directory found in {}; \
             run from the project root or pass --base-dir",
            base_dir.display()
        )));
    }
    std::fs::create_dir_all(&config_dir)
        .map_err(|e| copy_error(format!("cannot create {}: {e}", config_dir.display())))?;

    let mut copied = Vec::new();
    for name in CONFIG_FILES {
        let source = defaults_dir.join(name);
        if !source.is_file() {
            debug!("defaults/ has no {name}");
            continue;
        }
        let target = config_dir.join(name);
        if copy_if_missing(&source, &target)? {
            info!("seeded {} from {}", target.display(), source.display());
            copied.push(target);
        }
    }
    Ok(copied)
}

/// Returns false when `target` already exists; an edited config is never
/// overwritten, even by a concurrent run.
fn copy_if_missing(source: &Path, target: &Path) -> Result<bool, ConfigError> {
    let content = std::fs::read(source)
        .map_err(|e| copy_error(format!("cannot read {}: {e}", source.display())))?;
    let mut dest = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(copy_error(format!("cannot create {}: {e}", target.display()))),
    };
    std::io::Write::write_all(&mut dest, &content)
        .map_err(|e| copy_error(format!("cannot write {}: {e}", target.display())))?;
    Ok(true)
}

fn copy_error(message: String) -> ConfigError {
    ConfigError::DefaultsCopyError { message }
}

/// Loads config relative to the current working directory, copying
/// defaults first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let league = &config.league;
    if league.num_teams == 0 {
        return Err(invalid("league.num_teams", "must be greater than 0"));
    }
    if league.total_rounds == 0 {
        return Err(invalid("league.total_rounds", "must be greater than 0"));
    }
    if league.slots.is_empty() {
        return Err(invalid("league.slots", "must list at least one slot"));
    }
    if let Some(bad) = league
        .slots
        .iter()
        .find(|s| Position::from_str_pos(s).is_none())
    {
        return Err(invalid("league.slots", format!("unknown slot tag `{bad}`")));
    }

    let playoffs = &config.playoffs;
    if playoffs.start_week <= 1 {
        return Err(invalid(
            "playoffs.start_week",
            "must leave at least one regular-season week",
        ));
    }
    if playoffs.num_teams == 0 || playoffs.num_teams % 2 != 0 {
        return Err(invalid(
            "playoffs.num_teams",
            format!("must be a positive even number, got {}", playoffs.num_teams),
        ));
    }
    if playoffs.num_teams > league.num_teams {
        return Err(invalid(
            "playoffs.num_teams",
            format!(
                "{} playoff teams exceed {} league teams",
                playoffs.num_teams, league.num_teams
            ),
        ));
    }
    if playoffs.byes % 2 != 0 || playoffs.byes > playoffs.num_teams {
        return Err(invalid(
            "playoffs.byes",
            format!(
                "must be even and at most playoffs.num_teams, got {}",
                playoffs.byes
            ),
        ));
    }
    if !(playoffs.num_teams + playoffs.byes).is_power_of_two() {
        return Err(invalid(
            "playoffs.byes",
            "num_teams + byes must be a power of two",
        ));
    }

    if config.waivers.max_claims_per_run == 0 {
        return Err(invalid("waivers.max_claims_per_run", "must be greater than 0"));
    }

    let sandbox = &config.sandbox;
    if sandbox.connect_timeout_secs == 0 {
        return Err(invalid("sandbox.connect_timeout_secs", "must be greater than 0"));
    }
    if sandbox.call_timeout_secs == 0 {
        return Err(invalid("sandbox.call_timeout_secs", "must be greater than 0"));
    }
    if sandbox.memory_mb == 0 || sandbox.cpus <= 0.0 {
        return Err(invalid("sandbox", "resource ceilings must be positive"));
    }

    let mut seen = HashSet::new();
    for bot in &config.bots {
        if bot.id.trim().is_empty() {
            return Err(invalid("bots.id", "bot ids must be non-empty"));
        }
        if !seen.insert(bot.id.as_str()) {
            return Err(invalid("bots.id", format!("duplicate bot id `{}`", bot.id)));
        }
    }

    Ok(())
}
