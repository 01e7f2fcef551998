// Fantasy point calculation: raw stat record -> weighted per-category breakdown.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::CoreError;
use crate::role::Game;
use crate::stats::{Cs2Stats, Dota2Stats, StatRecord};

/// OpenDota rune ids that score points: double damage, haste, illusion,
/// invisibility, shield, magic, wisdom, regeneration. Bounty (5) and water (7)
/// runes are excluded.
pub const SCORING_RUNES: &[u8] = &[0, 1, 2, 3, 4, 6, 8, 9];

/// Round to 3 decimal places, half away from zero.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// A named scoring category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Kills,
    Assists,
    Flashes,
    Deaths,
    #[serde(rename = "fkdiff")]
    FirstKillDiff,
    Runes,
    CampsStacked,
    ObsPlaced,
    LastHits,
    CourierKills,
    TowersKilled,
    RoshansKilled,
    TeamfightParticipation,
    GoldPerMin,
}

const CS2_CATEGORIES: &[Category] = &[
    Category::Kills,
    Category::Assists,
    Category::Flashes,
    Category::Deaths,
    Category::FirstKillDiff,
];

const DOTA2_CATEGORIES: &[Category] = &[
    Category::Kills,
    Category::Runes,
    Category::CampsStacked,
    Category::ObsPlaced,
    Category::LastHits,
    Category::CourierKills,
    Category::TowersKilled,
    Category::RoshansKilled,
    Category::Assists,
    Category::TeamfightParticipation,
    Category::GoldPerMin,
    Category::Deaths,
];

impl Category {
    /// Categories scored for a game, in report column order.
    pub fn for_game(game: Game) -> &'static [Category] {
        match game {
            Game::Cs2 => CS2_CATEGORIES,
            Game::Dota2 => DOTA2_CATEGORIES,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Category::Kills => "kills",
            Category::Assists => "assists",
            Category::Flashes => "flashes",
            Category::Deaths => "deaths",
            Category::FirstKillDiff => "fkdiff",
            Category::Runes => "runes",
            Category::CampsStacked => "camps_stacked",
            Category::ObsPlaced => "obs_placed",
            Category::LastHits => "last_hits",
            Category::CourierKills => "courier_kills",
            Category::TowersKilled => "towers_killed",
            Category::RoshansKilled => "roshans_killed",
            Category::TeamfightParticipation => "teamfight_participation",
            Category::GoldPerMin => "gold_per_min",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ---------------------------------------------------------------------------
// Breakdown
// ---------------------------------------------------------------------------

/// Points contributed by each category for one unit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PointBreakdown {
    values: BTreeMap<Category, f64>,
}

impl PointBreakdown {
    pub fn get(&self, category: Category) -> f64 {
        self.values.get(&category).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, f64)> + '_ {
        self.values.iter().map(|(c, v)| (*c, *v))
    }

    /// Unrounded sum of all categories.
    pub fn total(&self) -> f64 {
        self.values.values().sum()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn set(&mut self, category: Category, value: f64) {
        self.values.insert(category, value);
    }
}

impl FromIterator<(Category, f64)> for PointBreakdown {
    fn from_iter<I: IntoIterator<Item = (Category, f64)>>(iter: I) -> Self {
        PointBreakdown {
            values: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Scoring rules
// ---------------------------------------------------------------------------

/// CS2 category weights. `death_ceiling` is the per-map number of deaths at
/// which the deaths category reaches zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cs2Weights {
    pub kills: f64,
    pub assists: f64,
    pub flashes: f64,
    pub deaths: f64,
    pub death_ceiling: f64,
    pub fkdiff: f64,
}

impl Default for Cs2Weights {
    fn default() -> Self {
        Cs2Weights {
            kills: 1.0,
            assists: 0.6,
            flashes: 0.2,
            deaths: 0.6,
            death_ceiling: 12.0,
            fkdiff: 0.75,
        }
    }
}

impl Cs2Weights {
    /// Every weight with its config key.
    pub fn fields(&self) -> [(&'static str, f64); 6] {
        [
            ("kills", self.kills),
            ("assists", self.assists),
            ("flashes", self.flashes),
            ("deaths", self.deaths),
            ("death_ceiling", self.death_ceiling),
            ("fkdiff", self.fkdiff),
        ]
    }
}

/// Dota2 category weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dota2Weights {
    pub kills: f64,
    pub runes: f64,
    pub camps_stacked: f64,
    pub obs_placed: f64,
    pub last_hits: f64,
    pub courier_kills: f64,
    pub towers_killed: f64,
    pub roshans_killed: f64,
    pub assists: f64,
    pub teamfight_participation: f64,
    pub gold_per_min: f64,
    pub deaths: f64,
    pub death_ceiling: f64,
}

impl Default for Dota2Weights {
    fn default() -> Self {
        Dota2Weights {
            kills: 1.5,
            runes: 1.25,
            camps_stacked: 1.5,
            obs_placed: 1.5,
            last_hits: 0.015,
            courier_kills: 2.0,
            towers_killed: 2.5,
            roshans_killed: 5.0,
            assists: 1.0,
            teamfight_participation: 15.0,
            gold_per_min: 0.01,
            deaths: 1.0,
            death_ceiling: 15.0,
        }
    }
}

impl Dota2Weights {
    /// Every weight with its config key.
    pub fn fields(&self) -> [(&'static str, f64); 13] {
        [
            ("kills", self.kills),
            ("runes", self.runes),
            ("camps_stacked", self.camps_stacked),
            ("obs_placed", self.obs_placed),
            ("last_hits", self.last_hits),
            ("courier_kills", self.courier_kills),
            ("towers_killed", self.towers_killed),
            ("roshans_killed", self.roshans_killed),
            ("assists", self.assists),
            ("teamfight_participation", self.teamfight_participation),
            ("gold_per_min", self.gold_per_min),
            ("deaths", self.deaths),
            ("death_ceiling", self.death_ceiling),
        ]
    }
}

/// The full ruleset used by the points calculator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringRules {
    pub cs2: Cs2Weights,
    pub dota2: Dota2Weights,
}

impl ScoringRules {
    /// Convert one stat record into a weighted point breakdown.
    ///
    /// `normalization_unit` is the number of maps the record covers; it scales
    /// the deaths ceiling and must be at least 1.
    pub fn compute_points(
        &self,
        stat: &StatRecord,
        normalization_unit: u32,
    ) -> Result<PointBreakdown, CoreError> {
        if normalization_unit == 0 {
            return Err(CoreError::invalid(
                "normalization_unit",
                "must be at least 1",
            ));
        }
        let unit = normalization_unit as f64;
        match stat {
            StatRecord::Cs2(s) => cs2_points(s, unit, &self.cs2),
            StatRecord::Dota2(s) => dota2_points(s, unit, &self.dota2),
        }
    }
}

/// Compute points with the default ruleset.
pub fn compute_points(
    stat: &StatRecord,
    normalization_unit: u32,
) -> Result<PointBreakdown, CoreError> {
    ScoringRules::default().compute_points(stat, normalization_unit)
}

fn cs2_points(s: &Cs2Stats, unit: f64, w: &Cs2Weights) -> Result<PointBreakdown, CoreError> {
    if s.flash_assists > s.assists {
        return Err(CoreError::invalid(
            "cs2 stats",
            format!(
                "flash assists ({}) exceed total assists ({})",
                s.flash_assists, s.assists
            ),
        ));
    }

    let mut b = PointBreakdown::default();
    b.set(Category::Kills, s.kills as f64 * w.kills);
    b.set(
        Category::Assists,
        (s.assists - s.flash_assists) as f64 * w.assists,
    );
    b.set(Category::Flashes, s.flash_assists as f64 * w.flashes);
    b.set(
        Category::Deaths,
        (w.death_ceiling * unit - s.deaths as f64) * w.deaths,
    );
    // No penalty below zero.
    b.set(
        Category::FirstKillDiff,
        s.first_kill_diff.max(0) as f64 * w.fkdiff,
    );
    Ok(b)
}

fn dota2_points(s: &Dota2Stats, unit: f64, w: &Dota2Weights) -> Result<PointBreakdown, CoreError> {
    if !s.teamfight_participation.is_finite() || s.teamfight_participation < 0.0 {
        return Err(CoreError::invalid(
            "dota2 stats",
            format!(
                "teamfight participation must be a non-negative number, got {}",
                s.teamfight_participation
            ),
        ));
    }

    let mut b = PointBreakdown::default();
    b.set(Category::Kills, s.kills as f64 * w.kills);
    b.set(Category::Runes, s.runes as f64 * w.runes);
    b.set(Category::CampsStacked, s.camps_stacked as f64 * w.camps_stacked);
    b.set(Category::ObsPlaced, s.obs_placed as f64 * w.obs_placed);
    b.set(Category::LastHits, s.last_hits as f64 * w.last_hits);
    b.set(Category::CourierKills, s.courier_kills as f64 * w.courier_kills);
    b.set(Category::TowersKilled, s.towers_killed as f64 * w.towers_killed);
    b.set(Category::RoshansKilled, s.roshans_killed as f64 * w.roshans_killed);
    b.set(Category::Assists, s.assists as f64 * w.assists);
    b.set(
        Category::TeamfightParticipation,
        s.teamfight_participation * w.teamfight_participation,
    );
    b.set(Category::GoldPerMin, s.gold_per_min as f64 * w.gold_per_min);
    b.set(
        Category::Deaths,
        (w.death_ceiling * unit - s.deaths as f64) * w.deaths,
    );
    Ok(b)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
