// Reporting sinks for draft picks and weekly results.
//
// The engine hands every finished pick and every weekly phase to a
// `ReportSink`. `NullSink` discards them; `LogSink` writes them through
// tracing. Other sinks (spreadsheets, dashboards) plug in behind the trait.

use std::fmt::Write as _;

use tracing::info;

use crate::error::ResourceConflict;
use crate::lineup::Lineup;
use crate::model::{Matchup, Transaction};

/// One completed draft pick.
#[derive(Debug, Clone, PartialEq)]
pub struct PickReport {
    pub pick: u32,
    pub round: u32,
    pub bot_id: String,
    pub player_id: String,
    pub player_name: String,
    /// True when the engine picked for the bot.
    pub autodrafted: bool,
}

/// Summary of one phase of a fantasy week.
#[derive(Debug, Clone, PartialEq)]
pub enum WeekReport {
    Waivers {
        week: u32,
        applied: Vec<Transaction>,
        conflicts: Vec<ResourceConflict>,
        rejected: usize,
    },
    Scores {
        week: u32,
        lineups: Vec<(String, Lineup)>,
        matchups: Vec<Matchup>,
    },
}

impl WeekReport {
    pub fn week(&self) -> u32 {
        match self {
            WeekReport::Waivers { week, .. } | WeekReport::Scores { week, .. } => *week,
        }
    }
}

pub trait ReportSink: Send + Sync {
    fn record_pick(&self, pick: &PickReport);
    fn record_week(&self, report: &WeekReport);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ReportSink for NullSink {
    fn record_pick(&self, _pick: &PickReport) {}
    fn record_week(&self, _report: &WeekReport) {}
}

/// Writes reports to the tracing log at `info`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn record_pick(&self, pick: &PickReport) {
        info!(
            "pick {} (round {}): {} took {} [{}]{}",
            pick.pick,
            pick.round,
            pick.bot_id,
            pick.player_name,
            pick.player_id,
            if pick.autodrafted { " (autodraft)" } else { "" }
        );
    }

    fn record_week(&self, report: &WeekReport) {
        match report {
            WeekReport::Waivers {
                week,
                applied,
                conflicts,
                rejected,
            } => {
                info!(
                    "week {week} waivers: {} applied, {} conflicts, {rejected} rejected",
                    applied.len(),
                    conflicts.len()
                );
                for t in applied {
                    info!(
                        "  {} added {} dropped {} for ${}",
                        t.bot_id, t.added_player_id, t.dropped_player_id, t.bid
                    );
                }
            }
            WeekReport::Scores {
                week,
                lineups,
                matchups,
            } => {
                for (bot_id, lineup) in lineups {
                    info!("week {week} lineup for {bot_id}\n{}", format_lineup(lineup));
                }
                for m in matchups {
                    info!("week {week}: {}", format_matchup(m));
                }
            }
        }
    }
}

/// Render a lineup as an aligned slot / player / points table.
pub fn format_lineup(lineup: &Lineup) -> String {
    let name_width = lineup
        .slots
        .iter()
        .map(|s| s.player_name().len())
        .max()
        .unwrap_or(0)
        .max("Player".len());

    let mut out = String::new();
    let _ = writeln!(out, "{:<9} {:<name_width$} {:>7}", "Slot", "Player", "Points");
    for s in &lineup.slots {
        let _ = writeln!(
            out,
            "{:<9} {:<name_width$} {:>7.2}",
            s.slot.display_str(),
            s.player_name(),
            s.points()
        );
    }
    let _ = write!(out, "{:<9} {:<name_width$} {:>7.2}", "TOTAL", "", lineup.total);
    out
}

pub fn format_matchup(m: &Matchup) -> String {
    let winner = m.winner_bot_id.as_deref().unwrap_or("undecided");
    format!(
        "#{} {} {:.2} vs {} {:.2} -> {}",
        m.id, m.home_bot_id, m.home_score, m.visitor_bot_id, m.visitor_score, winner
    )
}
