// Configuration loading and parsing (config/fragcap.toml).

use chrono::{DateTime, Utc};
use fragcap_core::{
    Game, LineupOptions, LineupTemplate, RankingStrategy, ScoringRules, SlotSpec, SortField, Window,
};
use serde::Deserialize;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const CONFIG_FILE: &str = "fragcap.toml";

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

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub event: EventConfig,
    #[serde(default)]
    pub scoring: ScoringRules,
    pub lineup: LineupConfig,
    #[serde(default)]
    pub days: Vec<DayConfig>,
    #[serde(default)]
    pub overall: OverallConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventConfig {
    pub name: String,
    pub game: Game,
    /// Roster JSON used for day reports.
    pub roster: String,
    /// CS2: statistic cache JSON. Dota2: OpenDota league matches JSON.
    pub matches: String,
    /// Dota2 only: directory of `<match_id>.json` files.
    #[serde(default)]
    pub match_dir: Option<String>,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Series ids that never count (show matches, replays of forfeits).
    #[serde(default)]
    pub excluded_series: BTreeSet<u64>,
}

fn default_output_dir() -> String {
    "reports".into()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyName {
    Exhaustive,
    FirstFound,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineupConfig {
    pub budget: u32,
    pub top_k: usize,
    #[serde(default)]
    pub sort_field: SortField,
    #[serde(default = "default_strategy")]
    pub strategy: StrategyName,
    #[serde(default)]
    pub parallel: bool,
    /// Budgets for the lineup-count table. Empty means no table.
    #[serde(default)]
    pub distribution: Vec<u32>,
    /// Custom lineup shape; the game default when absent.
    #[serde(default)]
    pub template: Option<Vec<SlotSpec>>,
}

fn default_strategy() -> StrategyName {
    StrategyName::Exhaustive
}

#[derive(Debug, Clone, Deserialize)]
pub struct DayConfig {
    pub name: String,
    #[serde(default)]
    pub min_id: u64,
    #[serde(default)]
    pub max_id: Option<u64>,
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub until: Option<DateTime<Utc>>,
    /// Overrides `lineup.budget` for this day.
    #[serde(default)]
    pub budget: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OverallConfig {
    #[serde(default = "default_overall_sort_fields")]
    pub sort_fields: Vec<SortField>,
    /// Roster with current costs and teams for overall reports. Falls back to
    /// `event.roster`.
    #[serde(default)]
    pub roster: Option<String>,
    /// First match id of the playoff stage. When set, separate group-stage
    /// and playoff reports are written.
    #[serde(default)]
    pub playoff_first_match: Option<u64>,
    /// Earlier tournaments folded into the overall report.
    #[serde(default)]
    pub merge: Vec<MergedTournament>,
}

impl Default for OverallConfig {
    fn default() -> Self {
        OverallConfig {
            sort_fields: default_overall_sort_fields(),
            roster: None,
            playoff_first_match: None,
            merge: Vec::new(),
        }
    }
}

fn default_overall_sort_fields() -> Vec<SortField> {
    vec![
        SortField::MeanPoints,
        SortField::MeanPointsPerWin,
        SortField::MeanPointsPerLose,
    ]
}

#[derive(Debug, Clone, Deserialize)]
pub struct MergedTournament {
    pub name: String,
    pub roster: String,
    pub matches: String,
    #[serde(default)]
    pub match_dir: Option<String>,
    #[serde(default)]
    pub excluded_series: BTreeSet<u64>,
}

// ---------------------------------------------------------------------------
// Derived values
// ---------------------------------------------------------------------------

impl Config {
    pub fn template(&self) -> Result<LineupTemplate, ConfigError> {
        match &self.lineup.template {
            Some(slots) => LineupTemplate::new(slots.clone())
                .map_err(|e| invalid("lineup.template", e.to_string())),
            None => Ok(LineupTemplate::for_game(self.event.game)),
        }
    }

    pub fn strategy(&self) -> RankingStrategy {
        match self.lineup.strategy {
            StrategyName::Exhaustive => RankingStrategy::Exhaustive {
                parallel: self.lineup.parallel,
            },
            StrategyName::FirstFound => RankingStrategy::FirstFound,
        }
    }

    /// Lineup options for a day, with the day's budget override applied.
    pub fn lineup_options(&self, day: Option<&DayConfig>) -> LineupOptions {
        LineupOptions {
            budget: day.and_then(|d| d.budget).unwrap_or(self.lineup.budget),
            top_k: self.lineup.top_k,
            sort_field: self.lineup.sort_field,
            strategy: self.strategy(),
        }
    }
}

impl DayConfig {
    pub fn window(&self, excluded_series: &BTreeSet<u64>) -> Window {
        Window {
            min_id: self.min_id,
            max_id: self.max_id,
            from: self.from,
            until: self.until,
            excluded_series: excluded_series.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/fragcap.toml` relative to `base_dir`.
///
/// Does not copy defaults; `load_config()` does.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = read_file(&path)?;
    let config = parse_config(&text).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        source: e,
    })?;
    validate(&config)?;
    Ok(config)
}

fn parse_config(text: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(text)
}

fn copy_error(message: String) -> ConfigError {
    ConfigError::DefaultsCopyError { message }
}

/// Copy `src` to `target` unless `target` exists. Returns whether it copied.
fn copy_if_missing(src: &Path, target: &Path) -> Result<bool, ConfigError> {
    let mut dest = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
    {
        Ok(dest) => dest,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(copy_error(format!("failed to create {}: {e}", target.display()))),
    };
    let mut source = std::fs::File::open(src)
        .map_err(|e| copy_error(format!("failed to read {}: {e}", src.display())))?;
    std::io::copy(&mut source, &mut dest)
        .map_err(|e| copy_error(format!("failed to write {}: {e}", target.display())))?;
    Ok(true)
}

/// Copy every file of `defaults/` that `config/` lacks, in file-name order.
/// Returns the files that were copied.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if config_dir.exists() {
            return Ok(vec![]);
        }
        return Err(copy_error(format!(
            "neither defaults/ nor config/ directory found in {}",
            base_dir.display()
        )));
    }

    std::fs::create_dir_all(&config_dir)
        .map_err(|e| copy_error(format!("failed to create config directory: {e}")))?;

    let mut sources = Vec::new();
    for entry in std::fs::read_dir(&defaults_dir)
        .map_err(|e| copy_error(format!("failed to read defaults directory: {e}")))?
    {
        let path = entry
            .map_err(|e| copy_error(format!("failed to read defaults entry: {e}")))?
            .path();
        if path.is_file() {
            sources.push(path);
        }
    }
    sources.sort();

    let mut copied = Vec::new();
    for src in sources {
        let Some(file_name) = src.file_name() else {
            continue;
        };
        let target = config_dir.join(file_name);
        if copy_if_missing(&src, &target)? {
            info!("copied default {} to {}", src.display(), target.display());
            copied.push(target);
        }
    }
    Ok(copied)
}

/// Load config relative to the current working directory, copying defaults
/// first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.event.name.trim().is_empty() {
        return Err(invalid("event.name", "must not be empty"));
    }

    if config.lineup.budget == 0 {
        return Err(invalid("lineup.budget", "must be greater than 0"));
    }
    if config.lineup.top_k == 0 {
        return Err(invalid("lineup.top_k", "must be greater than 0"));
    }
    if config.lineup.parallel && config.lineup.strategy == StrategyName::FirstFound {
        return Err(invalid(
            "lineup.parallel",
            "first_found scans in a fixed order and cannot run in parallel",
        ));
    }

    let template = config.template()?;
    if template.game() != config.event.game {
        return Err(invalid(
            "lineup.template",
            format!("template roles are {} roles, event is {}", template.game(), config.event.game),
        ));
    }

    let mut day_names = HashSet::new();
    for (i, day) in config.days.iter().enumerate() {
        let field = |name: &str| format!("days[{i}].{name}");
        if day.name.trim().is_empty() {
            return Err(invalid(field("name"), "must not be empty"));
        }
        if !day_names.insert(day.name.as_str()) {
            return Err(invalid(field("name"), format!("duplicate day `{}`", day.name)));
        }
        if day.max_id.is_some_and(|max| max <= day.min_id) {
            return Err(invalid(field("max_id"), "must be greater than min_id"));
        }
        if let (Some(from), Some(until)) = (day.from, day.until) {
            if until <= from {
                return Err(invalid(field("until"), "must be after `from`"));
            }
        }
        if day.budget == Some(0) {
            return Err(invalid(field("budget"), "must be greater than 0"));
        }
    }

    if config.overall.sort_fields.is_empty() {
        return Err(invalid("overall.sort_fields", "must list at least one field"));
    }

    let weights = config
        .scoring
        .cs2
        .fields()
        .into_iter()
        .map(|(name, value)| (format!("scoring.cs2.{name}"), value))
        .chain(
            config
                .scoring
                .dota2
                .fields()
                .into_iter()
                .map(|(name, value)| (format!("scoring.dota2.{name}"), value)),
        );
    for (name, value) in weights {
        if !value.is_finite() {
            return Err(invalid(name, format!("must be a finite number, got {value}")));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
