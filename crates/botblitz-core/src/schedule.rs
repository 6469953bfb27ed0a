// Regular-season round-robin schedule.

use crate::model::{Matchup, BYE_BOT_ID};

/// Generate `weeks` weeks of round-robin matchups with the circle method.
///
/// The first bot stays fixed while the others rotate one place per week. An
/// odd field gets a bye placeholder; whoever draws it has no matchup that
/// week. Ids run from 1 in generation order.
pub fn round_robin(bot_ids: &[String], weeks: u32) -> Vec<Matchup> {
    let mut ring: Vec<&str> = bot_ids.iter().map(String::as_str).collect();
    if ring.len() % 2 != 0 {
        ring.push(BYE_BOT_ID);
    }
    let n = ring.len();
    if n < 2 {
        return Vec::new();
    }

    let mut matchups = Vec::new();
    for week in 1..=weeks {
        for i in 0..n / 2 {
            let home = ring[i];
            let visitor = ring[n - 1 - i];
            if home == BYE_BOT_ID || visitor == BYE_BOT_ID {
                continue;
            }
            matchups.push(Matchup::new(matchups.len() as u32 + 1, week, home, visitor));
        }
        // Last element moves into slot 1; slot 0 stays put
        let last = ring.remove(n - 1);
        ring.insert(1, last);
    }
    matchups
}
