use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use botblitz_core::config::{ensure_config_files, load_config_from, Config};
use botblitz_core::report::{format_matchup, LogSink};
use botblitz_core::standings::leaderboard;
use botblitz_core::store::{load_weekly_stats_csv, GameStateStore, SqliteStore};
use botblitz_engine::cancel::{cancel_on_ctrl_c, CancelFlag};
use botblitz_engine::draft::run_draft;
use botblitz_engine::mode::GameMode;
use botblitz_engine::scoring::score_week;
use botblitz_engine::season;
use botblitz_engine::session::Session;
use botblitz_engine::weekly::run_waiver_cycle;
use botblitz_sandbox::{BotDescriptor, BotSandbox, ContainerSandbox, SandboxSettings};

#[derive(Parser)]
#[command(name = "botblitz")]
#[command(about = "Fantasy football league played by sandboxed bots")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding config/, defaults/, and relative data paths
    #[arg(long, default_value = ".")]
    base_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the season: bots, player pool, regular-season schedule
    Init {
        /// Ranked player CSV (defaults to [data] players_csv)
        #[arg(long)]
        players: Option<PathBuf>,
    },
    /// Run one game mode: draft, weekly, or score
    Run {
        mode: GameMode,
    },
    /// Print the regular-season leaderboard
    Standings,
    /// Load a `player_id,week,fpts` CSV into weekly stats
    ImportStats {
        csv: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let base = cli.base_dir;

    init_tracing(&base)?;
    info!("botblitz starting up");

    ensure_config_files(&base).context("failed to prepare config directory")?;
    let config = load_config_from(&base).context("failed to load configuration")?;
    info!(
        "Config loaded: season {}, {} teams, {} rounds, {} bots",
        config.league.year,
        config.league.num_teams,
        config.league.total_rounds,
        config.bots.len()
    );

    let db_path = base.join(&config.db_path);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let store = SqliteStore::open(&db_path.to_string_lossy()).context("failed to open database")?;
    info!("Database opened at {}", db_path.display());

    let result = dispatch(cli.command, &base, &config, &store).await;
    match &result {
        Ok(()) => info!("botblitz shut down cleanly"),
        Err(e) => error!("botblitz failed: {e:#}"),
    }
    result
}

async fn dispatch(
    command: Commands,
    base: &Path,
    config: &Config,
    store: &SqliteStore,
) -> anyhow::Result<()> {
    match command {
        Commands::Init { players } => {
            let csv = players.unwrap_or_else(|| base.join(&config.players_csv));
            let summary = season::initialize(config, store, &csv)?;
            println!(
                "season {} ready: {} bots, {} players, {} matchups",
                config.league.year, summary.bots, summary.players, summary.matchups
            );
            Ok(())
        }
        Commands::Run { mode } => run_mode(base, config, store, mode).await,
        Commands::Standings => print_standings(store),
        Commands::ImportStats { csv } => {
            let stats = load_weekly_stats_csv(&csv)
                .with_context(|| format!("failed to read stats from {}", csv.display()))?;
            let n = store.import_weekly_stats(&stats)?;
            println!("imported {n} stat lines");
            Ok(())
        }
    }
}

async fn run_mode(base: &Path, config: &Config, store: &SqliteStore, mode: GameMode) -> anyhow::Result<()> {
    let mut settings = SandboxSettings::from_config(&config.sandbox);
    settings.log_dir = base.join(&settings.log_dir);
    let sandbox = ContainerSandbox::docker(settings);

    let descriptors: Vec<BotDescriptor> = config
        .bots
        .iter()
        .map(|b| {
            let d = BotDescriptor::from(b);
            BotDescriptor {
                source_path: base.join(&d.source_path),
                env_path: d.env_path.map(|p| base.join(p)),
                id: d.id,
            }
        })
        .collect();

    let cancel = CancelFlag::new();
    cancel_on_ctrl_c(cancel.clone());
    let sink = LogSink;
    let session = Session::load(store, &sandbox, &sink, descriptors, cancel)
        .context("failed to load league settings and bot roster")?;
    info!("running {mode} mode");

    // Leftovers from a crashed run hold the fixed port
    sandbox.sweep().await;
    let outcome = play(&session, config, mode).await;
    sandbox.sweep().await;
    outcome
}

async fn play(session: &Session<'_>, config: &Config, mode: GameMode) -> anyhow::Result<()> {
    match mode {
        GameMode::Draft => {
            let summary = run_draft(session).await?;
            println!(
                "draft: {} picks ({} autodrafted){}",
                summary.picks_made,
                summary.autodrafted,
                if summary.cancelled { ", cancelled" } else { "" }
            );
        }
        GameMode::Weekly => {
            let summary = run_waiver_cycle(session, config.waivers.max_claims_per_run).await?;
            println!(
                "week {} waivers: {} applied, {} rejected, {} conflicts",
                summary.week,
                summary.applied.len(),
                summary.rejected,
                summary.conflicts
            );
        }
        GameMode::Score => {
            let summary = score_week(session, &config.playoffs).await?;
            for m in &summary.results {
                println!("{}", format_matchup(m));
            }
            if let Some(champion) = &summary.champion {
                println!("champion: {champion}");
            }
        }
    }
    Ok(())
}

fn print_standings(store: &dyn GameStateStore) -> anyhow::Result<()> {
    let bots = store.get_bots()?;
    if bots.is_empty() {
        warn!("standings requested before the season was initialized");
    }
    let week = store.get_current_week()?;
    let table = leaderboard(&bots, &store.get_past_matchups(week)?);
    println!("{:<4} {:<16} {:>3} {:>3} {:>9} {:>9}", "Rank", "Bot", "W", "L", "PF", "PA");
    for (i, row) in table.iter().enumerate() {
        println!(
            "{:<4} {:<16} {:>3} {:>3} {:>9.2} {:>9.2}",
            i + 1,
            row.bot_id,
            row.wins,
            row.losses,
            row.points_for,
            row.points_against
        );
    }
    Ok(())
}

/// Initialize tracing to log to a file under `<base>/logs`.
fn init_tracing(base: &Path) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = base.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("botblitz.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("botblitz=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
