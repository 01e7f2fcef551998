// HLTV statistic cache (CS2).
//
// One entry per match with the maps played and per-player totals over all
// maps of the match. Player lines carry no team, so sides are filled in from
// the roster afterwards (`assign_sides`).

use fragcap_core::{Cs2Stats, MatchRecord, PlayerLine, Roster, StatRecord};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

use super::{json_error, open, IngestError, MatchData};

// ---------------------------------------------------------------------------
// Raw serde structs (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawCache {
    #[serde(default)]
    matches: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawMatch {
    id: u64,
    #[serde(default)]
    url: String,
    #[serde(default)]
    maps_played: Option<u32>,
    players_stats: RawMatchStats,
}

#[derive(Debug, Deserialize)]
struct RawMatchStats {
    #[serde(default)]
    team1_name: String,
    #[serde(default)]
    team1_maps: u32,
    #[serde(default)]
    team2_name: String,
    #[serde(default)]
    team2_maps: u32,
    #[serde(default)]
    players: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawPlayerStats {
    kills: u32,
    assists: u32,
    flashes: u32,
    deaths: u32,
    fkdiff: i32,
    #[serde(default)]
    team: Option<String>,
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

fn winner(stats: &RawMatchStats) -> Option<String> {
    let name = match stats.team1_maps.cmp(&stats.team2_maps) {
        std::cmp::Ordering::Greater => &stats.team1_name,
        std::cmp::Ordering::Less => &stats.team2_name,
        std::cmp::Ordering::Equal => return None,
    };
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn convert_match(raw: RawMatch, data: &mut MatchData) -> MatchRecord {
    let stats = raw.players_stats;
    let maps_played = raw
        .maps_played
        .unwrap_or(stats.team1_maps + stats.team2_maps);
    let winning_side = winner(&stats);

    let mut players = Vec::with_capacity(stats.players.len());
    for (name, value) in stats.players {
        let name = name.trim().to_string();
        let line: RawPlayerStats = match serde_json::from_value(value) {
            Ok(line) => line,
            Err(e) => {
                data.skip_line(raw.id, name, e);
                continue;
            }
        };
        players.push(PlayerLine {
            name: Some(name),
            account_id: None,
            side: line.team.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
            stats: StatRecord::Cs2(Cs2Stats {
                kills: line.kills,
                assists: line.assists,
                flash_assists: line.flashes,
                deaths: line.deaths,
                first_kill_diff: line.fkdiff,
            }),
        });
    }

    debug!("match {} ({}): {} map(s), {} player line(s)", raw.id, raw.url, maps_played, players.len());
    MatchRecord {
        id: raw.id,
        series_id: None,
        started_at: None,
        maps_played,
        duration_secs: 0.0,
        winning_side,
        players,
    }
}

// ---------------------------------------------------------------------------
// Loaders
// ---------------------------------------------------------------------------

fn load_statistic_cache_from_reader<R: Read>(rdr: R) -> Result<MatchData, serde_json::Error> {
    let cache: RawCache = serde_json::from_reader(rdr)?;
    let mut data = MatchData::default();
    for value in cache.matches {
        match serde_json::from_value::<RawMatch>(value) {
            Ok(raw) => {
                let record = convert_match(raw, &mut data);
                data.records.push(record);
            }
            Err(e) => warn!("skipping malformed match entry: {}", e),
        }
    }
    data.records.sort_by_key(|r| r.id);
    Ok(data)
}

/// Load the CS2 statistic cache. Malformed player lines are kept aside in
/// `MatchData::skipped`.
pub fn load_statistic_cache(path: &Path) -> Result<MatchData, IngestError> {
    let rdr = open(path)?;
    load_statistic_cache_from_reader(rdr).map_err(|e| json_error(path, e))
}

/// Fill unknown sides with the roster team of each resolved player, so wins
/// can be matched against the winning team name.
pub fn assign_sides(records: &mut [MatchRecord], roster: &Roster) {
    for record in records {
        for line in &mut record.players {
            if line.side.is_some() {
                continue;
            }
            if let Some(player) = roster.resolve(line) {
                line.side = Some(player.team.clone());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
