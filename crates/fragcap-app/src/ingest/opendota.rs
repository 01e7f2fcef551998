// OpenDota caches (Dota2).
//
// The league file lists the event's matches; each match has its own parsed
// file `<match_dir>/<match_id>.json`. A missing or unreadable match file skips
// the match; a player line with missing counters skips that line only.

use chrono::{DateTime, Utc};
use fragcap_core::points::SCORING_RUNES;
use fragcap_core::{Dota2Stats, MatchRecord, PlayerLine, StatRecord};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

use super::{json_error, open, IngestError, MatchData};

const RADIANT: &str = "radiant";
const DIRE: &str = "dire";

// ---------------------------------------------------------------------------
// Raw serde structs (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawLeague {
    #[serde(default)]
    matches: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawLeagueMatch {
    match_id: u64,
    #[serde(default)]
    series_id: Option<u64>,
    #[serde(default)]
    start_time: Option<i64>,
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    radiant_win: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawMatchFile {
    players: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawPlayer {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    account_id: Option<u64>,
    #[serde(rename = "isRadiant")]
    is_radiant: bool,
    kills: u32,
    deaths: u32,
    assists: u32,
    #[serde(default)]
    runes: BTreeMap<String, u32>,
    camps_stacked: u32,
    obs_placed: u32,
    lane_kills: u32,
    neutral_kills: u32,
    ancient_kills: u32,
    courier_kills: u32,
    towers_killed: u32,
    roshans_killed: u32,
    teamfight_participation: f64,
    gold_per_min: u32,
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

fn scoring_runes(runes: &BTreeMap<String, u32>) -> u32 {
    runes
        .iter()
        .filter(|(id, _)| {
            id.parse::<u8>()
                .map(|id| SCORING_RUNES.contains(&id))
                .unwrap_or(false)
        })
        .map(|(_, count)| *count)
        .sum()
}

fn convert_player(raw: RawPlayer) -> PlayerLine {
    let runes = scoring_runes(&raw.runes);
    PlayerLine {
        name: raw.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        account_id: raw.account_id.filter(|id| *id != 0),
        side: Some(if raw.is_radiant { RADIANT } else { DIRE }.to_string()),
        stats: StatRecord::Dota2(Dota2Stats {
            kills: raw.kills,
            deaths: raw.deaths,
            assists: raw.assists,
            runes,
            camps_stacked: raw.camps_stacked,
            obs_placed: raw.obs_placed,
            last_hits: raw.lane_kills + raw.neutral_kills + raw.ancient_kills,
            courier_kills: raw.courier_kills,
            towers_killed: raw.towers_killed,
            roshans_killed: raw.roshans_killed,
            teamfight_participation: raw.teamfight_participation,
            gold_per_min: raw.gold_per_min,
        }),
    }
}

/// Label of an unreadable player line: its name, else its account id, else
/// its position in the match file.
fn line_label(value: &serde_json::Value, index: usize) -> String {
    if let Some(name) = value.get("name").and_then(|n| n.as_str()) {
        if !name.trim().is_empty() {
            return name.trim().to_string();
        }
    }
    match value.get("account_id").and_then(|id| id.as_u64()) {
        Some(id) if id != 0 => format!("account {id}"),
        _ => format!("player #{index}"),
    }
}

fn convert_match(entry: &RawLeagueMatch, file: RawMatchFile, data: &mut MatchData) -> MatchRecord {
    let mut players = Vec::with_capacity(file.players.len());
    for (index, value) in file.players.into_iter().enumerate() {
        let label = line_label(&value, index);
        match serde_json::from_value::<RawPlayer>(value) {
            Ok(raw) => players.push(convert_player(raw)),
            Err(e) => data.skip_line(entry.match_id, label, e),
        }
    }
    MatchRecord {
        id: entry.match_id,
        series_id: entry.series_id.filter(|id| *id != 0),
        started_at: entry
            .start_time
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
        maps_played: 1,
        duration_secs: entry.duration,
        winning_side: entry
            .radiant_win
            .map(|win| if win { RADIANT } else { DIRE }.to_string()),
        players,
    }
}

// ---------------------------------------------------------------------------
// Loaders
// ---------------------------------------------------------------------------

fn load_league_from_reader<R: Read>(rdr: R) -> Result<Vec<RawLeagueMatch>, serde_json::Error> {
    let league: RawLeague = serde_json::from_reader(rdr)?;
    let mut entries = Vec::with_capacity(league.matches.len());
    for value in league.matches {
        match serde_json::from_value::<RawLeagueMatch>(value) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!("skipping malformed league entry: {}", e),
        }
    }
    Ok(entries)
}

fn load_match_from_reader<R: Read>(rdr: R) -> Result<RawMatchFile, serde_json::Error> {
    serde_json::from_reader(rdr)
}

/// Load every parsed match of a league. `league_path` is the league matches
/// file; `match_dir` holds one `<match_id>.json` per match.
pub fn load_league(league_path: &Path, match_dir: &Path) -> Result<MatchData, IngestError> {
    let rdr = open(league_path)?;
    let entries = load_league_from_reader(rdr).map_err(|e| json_error(league_path, e))?;

    let mut data = MatchData::default();
    for entry in &entries {
        let path = match_dir.join(format!("{}.json", entry.match_id));
        let rdr = match open(&path) {
            Ok(rdr) => rdr,
            Err(e) => {
                warn!("match {} has no saved data: {}", entry.match_id, e);
                continue;
            }
        };
        match load_match_from_reader(rdr) {
            Ok(file) => {
                let record = convert_match(entry, file, &mut data);
                data.records.push(record);
            }
            Err(e) => warn!("match {} is not ready: {}", entry.match_id, e),
        }
    }

    data.records.sort_by_key(|r| r.id);
    debug!(
        "{} of {} league match(es) loaded from {}",
        data.records.len(),
        entries.len(),
        match_dir.display()
    );
    Ok(data)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
