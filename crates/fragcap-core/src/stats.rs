// Raw per-unit statistics as delivered by the scrape/API layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::role::Game;

/// CS2 counters for one match, summed over the maps played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cs2Stats {
    pub kills: u32,
    /// Total assists, flash assists included.
    pub assists: u32,
    pub flash_assists: u32,
    pub deaths: u32,
    /// First kills minus first deaths. May be negative.
    pub first_kill_diff: i32,
}

/// Dota2 counters for one game.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Dota2Stats {
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    /// Scoring runes picked up (see `points::SCORING_RUNES`).
    pub runes: u32,
    pub camps_stacked: u32,
    pub obs_placed: u32,
    /// Lane, neutral and ancient creep kills.
    pub last_hits: u32,
    pub courier_kills: u32,
    pub towers_killed: u32,
    pub roshans_killed: u32,
    /// Fraction of team fights the player took part in, 0.0..=1.0.
    pub teamfight_participation: f64,
    pub gold_per_min: u32,
}

/// One player's raw counted events for one unit (a CS2 match or a Dota2 game).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "game", rename_all = "lowercase")]
pub enum StatRecord {
    Cs2(Cs2Stats),
    Dota2(Dota2Stats),
}

impl StatRecord {
    pub fn game(&self) -> Game {
        match self {
            StatRecord::Cs2(_) => Game::Cs2,
            StatRecord::Dota2(_) => Game::Dota2,
        }
    }
}

/// A player's line in a match record.
///
/// Data sources do not always carry a display name (OpenDota leaves `name`
/// empty for unregistered accounts), so the numeric account id is kept as a
/// fallback key for roster resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerLine {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub account_id: Option<u64>,
    /// Side or team marker, compared against `MatchRecord::winning_side`.
    #[serde(default)]
    pub side: Option<String>,
    pub stats: StatRecord,
}

impl PlayerLine {
    /// Label used in logs and diagnostics.
    pub fn label(&self) -> String {
        match (&self.name, self.account_id) {
            (Some(name), _) => name.clone(),
            (None, Some(id)) => format!("account:{id}"),
            (None, None) => "<anonymous>".to_string(),
        }
    }
}

/// One unit of play (one CS2 match, one Dota2 game) with its player lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: u64,
    /// Groups games of one best-of-N series. `None` means the record is its
    /// own series.
    #[serde(default)]
    pub series_id: Option<u64>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// Maps played inside this unit; the normalization unit for scoring.
    #[serde(default = "default_maps_played")]
    pub maps_played: u32,
    #[serde(default)]
    pub duration_secs: f64,
    #[serde(default)]
    pub winning_side: Option<String>,
    pub players: Vec<PlayerLine>,
}

fn default_maps_played() -> u32 {
    1
}

impl MatchRecord {
    /// Key used to group units of one series for multiplier computation.
    pub fn series_key(&self) -> u64 {
        self.series_id.unwrap_or(self.id)
    }

    /// Whether the given player line is on the winning side. Unknown sides
    /// count as a loss.
    pub fn is_win(&self, line: &PlayerLine) -> bool {
        match (&line.side, &self.winning_side) {
            (Some(side), Some(winner)) => side == winner,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(side: Option<&str>) -> PlayerLine {
        PlayerLine {
            name: Some("s1mple".into()),
            account_id: None,
            side: side.map(String::from),
            stats: StatRecord::Cs2(Cs2Stats::default()),
        }
    }

    #[test]
    fn win_requires_both_sides_known() {
        let mut record = MatchRecord {
            id: 7,
            series_id: None,
            started_at: None,
            maps_played: 2,
            duration_secs: 0.0,
            winning_side: Some("NAVI".into()),
            players: vec![],
        };
        assert!(record.is_win(&line(Some("NAVI"))));
        assert!(!record.is_win(&line(Some("FaZe"))));
        assert!(!record.is_win(&line(None)));
        record.winning_side = None;
        assert!(!record.is_win(&line(Some("NAVI"))));
    }

    #[test]
    fn series_key_falls_back_to_id() {
        let record = MatchRecord {
            id: 42,
            series_id: None,
            started_at: None,
            maps_played: 1,
            duration_secs: 0.0,
            winning_side: None,
            players: vec![],
        };
        assert_eq!(record.series_key(), 42);
    }

    #[test]
    fn label_prefers_name_then_account() {
        let mut l = line(None);
        assert_eq!(l.label(), "s1mple");
        l.name = None;
        l.account_id = Some(311360822);
        assert_eq!(l.label(), "account:311360822");
    }
}
