// Roster JSON: an object keyed by player display name.
//
//   { "ZywOo": { "team": "Vitality", "role": "sniper", "cost": 22 }, ... }
//
// Optional keys: `save_as` (aggregate under another name) and `account_id`
// (OpenDota lookups). An account id of 0 means "unknown".
//
// Two helpers produce roster files: a TSV import of `team, name, role, cost`
// rows copied from a fantasy site, and a skeleton listing every player seen in
// the match data with role and cost left blank.

use fragcap_core::{MatchRecord, Player, Role, Roster};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use tracing::{info, warn};

use super::{json_error, open, IngestError};

#[derive(Debug, Deserialize)]
struct RawRosterEntry {
    #[serde(default)]
    team: String,
    role: String,
    cost: u32,
    #[serde(default)]
    save_as: Option<String>,
    #[serde(default)]
    account_id: Option<u64>,
}

fn load_roster_from_reader<R: Read>(rdr: R) -> Result<Vec<Player>, serde_json::Error> {
    let raw: BTreeMap<String, serde_json::Value> = serde_json::from_reader(rdr)?;
    let mut players = Vec::with_capacity(raw.len());

    for (name, value) in raw {
        let name = name.trim().to_string();
        let entry: RawRosterEntry = match serde_json::from_value(value) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("skipping roster entry '{}': {}", name, e);
                continue;
            }
        };
        let role: Role = match entry.role.parse() {
            Ok(role) => role,
            Err(e) => {
                warn!("skipping roster entry '{}': {}", name, e);
                continue;
            }
        };
        if entry.cost == 0 {
            warn!("skipping roster entry '{}': cost is 0", name);
            continue;
        }
        players.push(Player {
            name,
            team: entry.team.trim().to_string(),
            role,
            cost: entry.cost,
            save_as: entry
                .save_as
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            account_id: entry.account_id.filter(|id| *id != 0),
        });
    }

    Ok(players)
}

/// Load and validate a roster file.
pub fn load_roster(path: &Path) -> Result<Roster, IngestError> {
    let rdr = open(path)?;
    let players = load_roster_from_reader(rdr).map_err(|e| json_error(path, e))?;
    if players.is_empty() {
        return Err(IngestError::Validation(format!(
            "roster {} has no usable entries",
            path.display()
        )));
    }
    let roster = Roster::new(players).map_err(|e| IngestError::Roster {
        path: path.display().to_string(),
        source: e,
    })?;
    info!("loaded {} roster entries from {}", roster.len(), path.display());
    Ok(roster)
}

// ---------------------------------------------------------------------------
// Roster files
// ---------------------------------------------------------------------------

/// One entry of a written roster file. A blank `role` and a `null` cost mark
/// entries still to be filled in; the loader skips them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterEntry {
    pub team: String,
    pub role: String,
    pub cost: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<u64>,
}

/// Roster file contents keyed by player name.
pub type RosterFile = BTreeMap<String, RosterEntry>;

#[derive(Debug, Deserialize)]
struct RawTsvRow(String, String, String, u32);

fn import_roster_from_reader<R: Read>(rdr: R) -> Result<RosterFile, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quoting(false)
        .trim(csv::Trim::All)
        .from_reader(rdr);

    let mut entries = RosterFile::new();
    for result in reader.deserialize::<RawTsvRow>() {
        let RawTsvRow(team, name, role, cost) = match result {
            Ok(row) => row,
            Err(e) => {
                warn!("skipping malformed roster row: {}", e);
                continue;
            }
        };
        let role: Role = match role.parse() {
            Ok(role) => role,
            Err(e) => {
                warn!("skipping roster row '{}': {}", name, e);
                continue;
            }
        };
        let entry = RosterEntry {
            team,
            role: role.display_str().to_string(),
            cost: Some(cost),
            account_id: None,
        };
        if entries.insert(name.clone(), entry).is_some() {
            warn!("roster row '{}' listed twice, keeping the last one", name);
        }
    }
    Ok(entries)
}

/// Read a tab-separated `team, name, role, cost` export.
pub fn import_roster_tsv(path: &Path) -> Result<RosterFile, IngestError> {
    let rdr = open(path)?;
    let entries = import_roster_from_reader(rdr).map_err(|e| IngestError::Csv {
        path: path.display().to_string(),
        source: e,
    })?;
    if entries.is_empty() {
        return Err(IngestError::Validation(format!(
            "{} has no usable roster rows",
            path.display()
        )));
    }
    info!("imported {} roster row(s) from {}", entries.len(), path.display());
    Ok(entries)
}

/// Every player seen in `records`, with team, role and cost left blank.
/// Lines without a name are listed as `account <id>` when they carry one.
pub fn roster_template(records: &[MatchRecord]) -> RosterFile {
    let mut entries = RosterFile::new();
    for line in records.iter().flat_map(|r| &r.players) {
        let name = line.name.as_deref().map(str::trim).filter(|n| !n.is_empty());
        let key = match (name, line.account_id) {
            (Some(name), _) => name.to_string(),
            (None, Some(id)) => format!("account {id}"),
            (None, None) => continue,
        };
        let entry = entries.entry(key).or_insert_with(|| RosterEntry {
            team: String::new(),
            role: String::new(),
            cost: None,
            account_id: None,
        });
        if entry.account_id.is_none() {
            entry.account_id = line.account_id;
        }
    }
    entries
}

/// Write a roster file as pretty JSON.
pub fn write_roster(path: &Path, entries: &RosterFile) -> Result<(), IngestError> {
    let write_err = |e: std::io::Error| IngestError::Write {
        path: path.display().to_string(),
        source: e,
    };
    let mut wtr = BufWriter::new(File::create(path).map_err(write_err)?);
    serde_json::to_writer_pretty(&mut wtr, entries).map_err(|e| json_error(path, e))?;
    wtr.write_all(b"\n").map_err(write_err)?;
    wtr.flush().map_err(write_err)?;
    info!("wrote {} roster entries to {}", entries.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const ROSTER: &str = r#"{
      "ZywOo": {"team": "Vitality", "role": "sniper", "cost": 22},
      " NiKo ": {"team": "G2", "role": "rifler", "cost": 19},
      "Yatoro": {"team": "Team Spirit", "role": "carry", "cost": 20, "account_id": 321580662},
      "Collapse": {"team": "Team Spirit", "role": "offlane", "cost": 17, "account_id": 0},
      "coach": {"team": "G2", "role": "coach", "cost": 1},
      "free": {"team": "G2", "role": "rifler", "cost": 0},
      "broken": {"team": "G2"}
    }"#;

    fn temp_file(name: &str, contents: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join("fragcap_test_roster");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn parses_entries_and_skips_bad_ones() {
        let players = load_roster_from_reader(ROSTER.as_bytes()).unwrap();
        let mut names: Vec<&str> = players.iter().map(|p| p.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["Collapse", "NiKo", "Yatoro", "ZywOo"]);

        let yatoro = players.iter().find(|p| p.name == "Yatoro").unwrap();
        assert_eq!(yatoro.role, Role::Carry);
        assert_eq!(yatoro.account_id, Some(321580662));

        let collapse = players.iter().find(|p| p.name == "Collapse").unwrap();
        assert_eq!(collapse.account_id, None);
    }

    #[test]
    fn load_roster_from_file() {
        let path = temp_file("roster.json", ROSTER);
        let roster = load_roster(&path).unwrap();
        assert_eq!(roster.len(), 4);
        assert_eq!(roster.get("ZywOo").unwrap().cost, 22);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn empty_roster_is_rejected() {
        let path = temp_file("empty.json", "{}");
        let err = load_roster(&path).unwrap_err();
        assert!(matches!(err, IngestError::Validation(_)));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn tsv_rows_parse_and_bad_rows_are_skipped() {
        let tsv = "Vitality\tZywOo\tsniper\t22\n\
                   G2\tNiKo\tRifler\t19\n\
                   team\tname\trole\tcost\n\
                   G2\tcoach\tcoach\t1\n\
                   Spirit\tdonk\trifler\t23\t\n";
        let entries = import_roster_from_reader(tsv.as_bytes()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries["ZywOo"],
            RosterEntry {
                team: "Vitality".into(),
                role: "sniper".into(),
                cost: Some(22),
                account_id: None,
            }
        );
        assert_eq!(entries["NiKo"].role, "rifler");
    }

    #[test]
    fn duplicate_tsv_rows_keep_the_last() {
        let tsv = "G2\tNiKo\trifler\t19\nFalcons\tNiKo\trifler\t21\n";
        let entries = import_roster_from_reader(tsv.as_bytes()).unwrap();
        assert_eq!(entries["NiKo"].team, "Falcons");
        assert_eq!(entries["NiKo"].cost, Some(21));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_roster(Path::new("/nonexistent/fragcap/roster.json")).unwrap_err();
        assert!(matches!(err, IngestError::Io { .. }));
    }
}
