// Loaders for the on-disk caches the scrapers leave behind: the roster JSON,
// the HLTV statistic cache (CS2) and OpenDota match files (Dota2).

pub mod hltv;
pub mod opendota;
pub mod roster;

use fragcap_core::{CoreError, Game, MatchRecord, SkippedUnit};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

pub use roster::{import_roster_tsv, load_roster, roster_template, write_roster, RosterEntry, RosterFile};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to write file {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },

    #[error("invalid roster {path}: {source}")]
    Roster { path: String, source: CoreError },

    #[error("validation error: {0}")]
    Validation(String),
}

/// Match records of an event and the player lines dropped while reading them.
#[derive(Debug, Clone, Default)]
pub struct MatchData {
    pub records: Vec<MatchRecord>,
    pub skipped: Vec<SkippedUnit>,
}

impl MatchData {
    pub(crate) fn skip_line(&mut self, match_id: u64, player: impl Into<String>, e: serde_json::Error) {
        let player = player.into();
        tracing::warn!("match {}: skipping malformed stats for '{}': {}", match_id, player, e);
        self.skipped.push(SkippedUnit {
            match_id,
            player,
            reason: CoreError::InvalidInput {
                context: format!("match {match_id}"),
                message: e.to_string(),
            },
        });
    }
}

/// Load every match record of an event for `game`.
///
/// CS2 reads one statistic cache file. Dota2 reads the league file and one
/// match file per entry from `match_dir`.
pub fn load_matches(
    game: Game,
    matches: &Path,
    match_dir: Option<&Path>,
) -> Result<MatchData, IngestError> {
    let data = match game {
        Game::Cs2 => hltv::load_statistic_cache(matches)?,
        Game::Dota2 => {
            let dir = match_dir.ok_or_else(|| {
                IngestError::Validation("dota2 events need a match directory".into())
            })?;
            opendota::load_league(matches, dir)?
        }
    };
    tracing::info!(
        "loaded {} {} match record(s) from {}, {} malformed player line(s)",
        data.records.len(),
        game,
        matches.display(),
        data.skipped.len()
    );
    Ok(data)
}

pub(crate) fn open(path: &Path) -> Result<BufReader<File>, IngestError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| IngestError::Io {
            path: path.display().to_string(),
            source: e,
        })
}

pub(crate) fn json_error(path: &Path, source: serde_json::Error) -> IngestError {
    IngestError::Json {
        path: path.display().to_string(),
        source,
    }
}
