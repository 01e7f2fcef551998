// Aggregation of per-unit points into per-player series, bucketed by role.
//
// One `Aggregator` covers one computation run (a day, a stage, a whole
// tournament). It never keeps state across runs: the set of unresolved
// players and skipped units is handed back to the caller in `Diagnostics`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::points::{round3, Category, PointBreakdown, ScoringRules};
use crate::role::{Game, Role};
use crate::roster::Roster;
use crate::stats::MatchRecord;

// ---------------------------------------------------------------------------
// Player series
// ---------------------------------------------------------------------------

/// One unit's contribution to a player's series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitEntry {
    /// Raw unit total, rounded to 3 decimals.
    pub points: f64,
    /// Unit total scaled by the series multiplier, rounded to 3 decimals.
    pub fantasy_points: f64,
    pub breakdown: PointBreakdown,
    pub win: bool,
    /// Unit duration in seconds (0 when unknown).
    pub duration: f64,
}

/// Everything accrued for one player across the qualifying units of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerSeries {
    pub team: String,
    units: Vec<UnitEntry>,
    category_sums: BTreeMap<Category, f64>,
    wins: u32,
    losses: u32,
}

impl PlayerSeries {
    pub fn new(team: impl Into<String>) -> Self {
        PlayerSeries {
            team: team.into(),
            ..PlayerSeries::default()
        }
    }

    /// Append one unit.
    ///
    /// `series_multiplier` scales the fantasy points and the category running
    /// sums; the raw unit total is kept unscaled.
    pub fn accumulate(
        &mut self,
        breakdown: PointBreakdown,
        series_multiplier: f64,
        win: bool,
        duration: f64,
    ) {
        for (category, value) in breakdown.iter() {
            *self.category_sums.entry(category).or_insert(0.0) += value * series_multiplier;
        }

        let points_sum = breakdown.total();
        if win {
            self.wins += 1;
        } else {
            self.losses += 1;
        }
        self.units.push(UnitEntry {
            points: round3(points_sum),
            fantasy_points: round3(points_sum * series_multiplier),
            breakdown,
            win,
            duration,
        });
    }

    pub fn units(&self) -> &[UnitEntry] {
        &self.units
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn wins(&self) -> u32 {
        self.wins
    }

    pub fn losses(&self) -> u32 {
        self.losses
    }

    /// Running sum for one category, rounded to 3 decimals.
    pub fn category_sum(&self, category: Category) -> f64 {
        round3(self.category_sums.get(&category).copied().unwrap_or(0.0))
    }

    /// All running sums, rounded to 3 decimals.
    pub fn category_sums(&self) -> BTreeMap<Category, f64> {
        self.category_sums
            .iter()
            .map(|(c, v)| (*c, round3(*v)))
            .collect()
    }

    /// Combine two series of the same player. Units are concatenated
    /// (`self` first), counters and category sums are added, and the team
    /// of `other` wins.
    pub fn combine(mut self, other: PlayerSeries) -> PlayerSeries {
        for (category, value) in other.category_sums {
            *self.category_sums.entry(category).or_insert(0.0) += value;
        }
        self.units.extend(other.units);
        self.wins += other.wins;
        self.losses += other.losses;
        if !other.team.is_empty() {
            self.team = other.team;
        }
        self
    }
}

/// Role → canonical player name → series.
pub type RoleBuckets = BTreeMap<Role, BTreeMap<String, PlayerSeries>>;

// ---------------------------------------------------------------------------
// Series multiplier
// ---------------------------------------------------------------------------

/// How units of a multi-unit series are normalized so one logical match is
/// not counted several times.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MultiplierPolicy {
    /// Each unit counts `1 / units in its series`.
    DivideByUnits,
    /// A unit that spans more than `max_full_units` maps counts `factor`.
    LongSeriesDiscount { max_full_units: u32, factor: f64 },
}

impl MultiplierPolicy {
    pub fn for_game(game: Game) -> Self {
        match game {
            Game::Cs2 => MultiplierPolicy::LongSeriesDiscount {
                max_full_units: 2,
                factor: 2.0 / 3.0,
            },
            Game::Dota2 => MultiplierPolicy::DivideByUnits,
        }
    }

    pub fn multiplier(&self, maps_played: u32, units_in_series: usize) -> f64 {
        match *self {
            MultiplierPolicy::DivideByUnits => 1.0 / units_in_series.max(1) as f64,
            MultiplierPolicy::LongSeriesDiscount {
                max_full_units,
                factor,
            } => {
                if maps_played <= max_full_units {
                    1.0
                } else {
                    factor
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Window
// ---------------------------------------------------------------------------

/// Which records take part in a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Window {
    /// Inclusive lower id bound.
    pub min_id: u64,
    /// Exclusive upper id bound; `None` is unbounded.
    pub max_id: Option<u64>,
    /// Inclusive start-time bound. Records without a start time pass.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive start-time bound.
    pub until: Option<DateTime<Utc>>,
    pub excluded_series: BTreeSet<u64>,
}

impl Window {
    pub fn all() -> Self {
        Window::default()
    }

    pub fn ids(min_id: u64, max_id: Option<u64>) -> Self {
        Window {
            min_id,
            max_id,
            ..Window::default()
        }
    }

    pub fn contains(&self, record: &MatchRecord) -> bool {
        if record.id < self.min_id {
            return false;
        }
        if self.max_id.is_some_and(|max| record.id >= max) {
            return false;
        }
        if let Some(series) = record.series_id {
            if self.excluded_series.contains(&series) {
                return false;
            }
        }
        if let Some(started) = record.started_at {
            if self.from.is_some_and(|from| started < from) {
                return false;
            }
            if self.until.is_some_and(|until| started >= until) {
                return false;
            }
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// A unit that was dropped with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedUnit {
    pub match_id: u64,
    pub player: String,
    pub reason: CoreError,
}

/// Per-run diagnostics returned alongside the buckets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    /// Player labels seen in match data but absent from the roster.
    pub unresolved: BTreeSet<String>,
    pub skipped_units: Vec<SkippedUnit>,
    pub units_accepted: usize,
    pub records_in_window: usize,
}

/// Result of an aggregation pass.
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub buckets: RoleBuckets,
    pub diagnostics: Diagnostics,
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

pub struct Aggregator<'a> {
    game: Game,
    roster: &'a Roster,
    rules: &'a ScoringRules,
    policy: MultiplierPolicy,
    buckets: RoleBuckets,
    diagnostics: Diagnostics,
}

impl<'a> Aggregator<'a> {
    /// Create empty series for every roster player of `game`, each in the
    /// bucket of its role and under its canonical name.
    pub fn new(
        game: Game,
        roster: &'a Roster,
        rules: &'a ScoringRules,
        policy: MultiplierPolicy,
    ) -> Self {
        let mut buckets: RoleBuckets = game.roles().iter().map(|r| (*r, BTreeMap::new())).collect();

        for player in roster.players() {
            if player.role.game() != game {
                debug!("roster entry '{}' is a {} player, ignored", player.name, player.role.game());
                continue;
            }
            let canonical = player.canonical_name().to_string();
            let team = roster
                .canonical_player(&canonical)
                .map(|p| p.team.clone())
                .unwrap_or_else(|| player.team.clone());
            buckets
                .entry(player.role)
                .or_default()
                .entry(canonical)
                .or_insert_with(|| PlayerSeries::new(team));
        }

        Aggregator {
            game,
            roster,
            rules,
            policy,
            buckets,
            diagnostics: Diagnostics::default(),
        }
    }

    /// Aggregate every record inside `window`, in ascending id order.
    /// Returns the number of units accepted by this call.
    pub fn ingest(&mut self, records: &[MatchRecord], window: &Window) -> usize {
        let mut selected: Vec<&MatchRecord> = records.iter().filter(|r| window.contains(r)).collect();
        selected.sort_by_key(|r| r.id);

        let mut series_counts: HashMap<u64, usize> = HashMap::new();
        for record in &selected {
            *series_counts.entry(record.series_key()).or_insert(0) += 1;
        }

        let before = self.diagnostics.units_accepted;
        self.diagnostics.records_in_window += selected.len();

        for record in selected {
            let units_in_series = series_counts.get(&record.series_key()).copied().unwrap_or(1);
            let multiplier = self.policy.multiplier(record.maps_played, units_in_series);
            self.ingest_record(record, multiplier);
        }

        let accepted = self.diagnostics.units_accepted - before;
        info!(
            "aggregated {} unit(s) from {} record(s) in window",
            accepted, self.diagnostics.records_in_window
        );
        accepted
    }

    fn ingest_record(&mut self, record: &MatchRecord, multiplier: f64) {
        for line in &record.players {
            let Some(player) = self.roster.resolve(line) else {
                let label = line.label();
                if self.diagnostics.unresolved.insert(label.clone()) {
                    warn!("player '{}' not in roster, skipped", label);
                }
                continue;
            };

            if line.stats.game() != self.game {
                self.skip(
                    record.id,
                    &player.name,
                    CoreError::invalid(
                        format!("match {}", record.id),
                        format!("{} stats in a {} run", line.stats.game(), self.game),
                    ),
                );
                continue;
            }

            let breakdown = match self.rules.compute_points(&line.stats, record.maps_played) {
                Ok(b) => b,
                Err(e) => {
                    self.skip(record.id, &player.name, e);
                    continue;
                }
            };

            let win = record.is_win(line);
            let canonical = player.canonical_name();
            let Some(series) = self
                .buckets
                .get_mut(&player.role)
                .and_then(|bucket| bucket.get_mut(canonical))
            else {
                // Roster entries of another game never get a series.
                continue;
            };
            series.accumulate(breakdown, multiplier, win, record.duration_secs);
            self.diagnostics.units_accepted += 1;
        }
    }

    fn skip(&mut self, match_id: u64, player: &str, reason: CoreError) {
        warn!("match {}: skipping unit for '{}': {}", match_id, player, reason);
        self.diagnostics.skipped_units.push(SkippedUnit {
            match_id,
            player: player.to_string(),
            reason,
        });
    }

    /// Drop players without units and hand back the buckets.
    pub fn finish(mut self) -> Aggregation {
        for bucket in self.buckets.values_mut() {
            bucket.retain(|_, series| !series.is_empty());
        }
        Aggregation {
            buckets: self.buckets,
            diagnostics: self.diagnostics,
        }
    }
}

/// Run a single aggregation pass.
pub fn aggregate(
    game: Game,
    roster: &Roster,
    rules: &ScoringRules,
    records: &[MatchRecord],
    window: &Window,
) -> Aggregation {
    let mut aggregator = Aggregator::new(game, roster, rules, MultiplierPolicy::for_game(game));
    aggregator.ingest(records, window);
    aggregator.finish()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::Player;
    use crate::stats::{Cs2Stats, Dota2Stats, PlayerLine, StatRecord};

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn player(name: &str, role: Role, cost: u32) -> Player {
        Player {
            name: name.into(),
            team: "Vitality".into(),
            role,
            cost,
            save_as: None,
            account_id: None,
        }
    }

    fn cs2_line(name: &str, side: &str, kills: u32, deaths: u32) -> PlayerLine {
        PlayerLine {
            name: Some(name.into()),
            account_id: None,
            side: Some(side.into()),
            stats: StatRecord::Cs2(Cs2Stats {
                kills,
                assists: 0,
                flash_assists: 0,
                deaths,
                first_kill_diff: 0,
            }),
        }
    }

    fn cs2_match(id: u64, maps: u32, players: Vec<PlayerLine>) -> MatchRecord {
        MatchRecord {
            id,
            series_id: None,
            started_at: None,
            maps_played: maps,
            duration_secs: 0.0,
            winning_side: Some("Vitality".into()),
            players,
        }
    }

    #[test]
    fn accumulate_scales_fantasy_points_and_sums() {
        let mut series = PlayerSeries::new("Spirit");
        let b: PointBreakdown = [(Category::Kills, 30.0), (Category::Deaths, 3.0)]
            .into_iter()
            .collect();
        series.accumulate(b.clone(), 2.0 / 3.0, true, 0.0);
        series.accumulate(b, 1.0, false, 0.0);

        assert_eq!(series.unit_count(), 2);
        assert_eq!(series.units()[0].points, 33.0);
        assert_eq!(series.units()[0].fantasy_points, 22.0);
        assert_eq!(series.units()[1].fantasy_points, 33.0);
        assert!(approx_eq(series.category_sum(Category::Kills), 50.0));
        assert!(approx_eq(series.category_sum(Category::Deaths), 5.0));
        assert_eq!(series.wins(), 1);
        assert_eq!(series.losses(), 1);
    }

    #[test]
    fn long_series_discount_applies_to_bo3() {
        let policy = MultiplierPolicy::for_game(Game::Cs2);
        assert_eq!(policy.multiplier(2, 1), 1.0);
        assert!(approx_eq(policy.multiplier(3, 1), 2.0 / 3.0));
    }

    #[test]
    fn divide_by_units_uses_series_size() {
        let policy = MultiplierPolicy::DivideByUnits;
        assert!(approx_eq(policy.multiplier(1, 3), 1.0 / 3.0));
        assert_eq!(policy.multiplier(1, 0), 1.0);
    }

    #[test]
    fn players_without_units_are_dropped() {
        let roster = Roster::new([
            player("ZywOo", Role::Sniper, 20),
            player("apEX", Role::Rifler, 10),
            player("flameZ", Role::Rifler, 12),
        ])
        .unwrap();
        let records = vec![cs2_match(
            1,
            2,
            vec![cs2_line("ZywOo", "Vitality", 50, 20), cs2_line("apEX", "Vitality", 30, 25)],
        )];
        let agg = aggregate(Game::Cs2, &roster, &ScoringRules::default(), &records, &Window::all());

        assert!(agg.buckets[&Role::Sniper].contains_key("ZywOo"));
        assert!(agg.buckets[&Role::Rifler].contains_key("apEX"));
        assert!(!agg.buckets[&Role::Rifler].contains_key("flameZ"));
        assert_eq!(agg.diagnostics.units_accepted, 2);
    }

    #[test]
    fn unresolved_players_are_reported_once() {
        let roster = Roster::new([player("ZywOo", Role::Sniper, 20)]).unwrap();
        let records = vec![
            cs2_match(1, 1, vec![cs2_line("s1mple", "NAVI", 20, 10)]),
            cs2_match(2, 1, vec![cs2_line("s1mple", "NAVI", 25, 12)]),
        ];
        let agg = aggregate(Game::Cs2, &roster, &ScoringRules::default(), &records, &Window::all());
        assert_eq!(agg.diagnostics.unresolved.len(), 1);
        assert!(agg.diagnostics.unresolved.contains("s1mple"));
    }

    #[test]
    fn invalid_units_are_skipped_not_fatal() {
        let roster = Roster::new([player("ZywOo", Role::Sniper, 20)]).unwrap();
        let records = vec![
            cs2_match(1, 0, vec![cs2_line("ZywOo", "Vitality", 20, 10)]),
            cs2_match(2, 1, vec![cs2_line("ZywOo", "Vitality", 25, 12)]),
        ];
        let agg = aggregate(Game::Cs2, &roster, &ScoringRules::default(), &records, &Window::all());
        assert_eq!(agg.diagnostics.skipped_units.len(), 1);
        assert_eq!(agg.diagnostics.skipped_units[0].match_id, 1);
        assert_eq!(agg.buckets[&Role::Sniper]["ZywOo"].unit_count(), 1);
    }

    #[test]
    fn window_filters_by_id_range_and_series() {
        let mut window = Window::ids(10, Some(20));
        window.excluded_series.insert(903653);
        let mut record = cs2_match(15, 1, vec![]);
        assert!(window.contains(&record));
        record.series_id = Some(903653);
        assert!(!window.contains(&record));
        assert!(!window.contains(&cs2_match(20, 1, vec![])));
        assert!(!window.contains(&cs2_match(9, 1, vec![])));
    }

    #[test]
    fn dota_series_units_are_divided_by_series_size() {
        let roster = Roster::new([player("Yatoro", Role::Carry, 20)]).unwrap();
        let line = PlayerLine {
            name: Some("Yatoro".into()),
            account_id: None,
            side: Some("radiant".into()),
            stats: StatRecord::Dota2(Dota2Stats {
                kills: 10,
                deaths: 15,
                ..Dota2Stats::default()
            }),
        };
        let game = |id| MatchRecord {
            id,
            series_id: Some(77),
            started_at: None,
            maps_played: 1,
            duration_secs: 1800.0,
            winning_side: Some("radiant".into()),
            players: vec![line.clone()],
        };
        let records = vec![game(1), game(2)];
        let agg = aggregate(Game::Dota2, &roster, &ScoringRules::default(), &records, &Window::all());
        let series = &agg.buckets[&Role::Carry]["Yatoro"];
        assert_eq!(series.units()[0].points, 15.0);
        assert_eq!(series.units()[0].fantasy_points, 7.5);
        assert!(approx_eq(series.category_sum(Category::Kills), 15.0));
        assert_eq!(series.wins(), 2);
    }

    #[test]
    fn combine_concatenates_and_keeps_latest_team() {
        let b: PointBreakdown = [(Category::Kills, 10.0)].into_iter().collect();
        let mut first = PlayerSeries::new("Team Spirit");
        first.accumulate(b.clone(), 1.0, true, 0.0);
        let mut second = PlayerSeries::new("Spirit");
        second.accumulate(b, 0.5, false, 0.0);

        let merged = first.combine(second);
        assert_eq!(merged.unit_count(), 2);
        assert_eq!(merged.team, "Spirit");
        assert!(approx_eq(merged.category_sum(Category::Kills), 15.0));
        assert_eq!((merged.wins(), merged.losses()), (1, 1));
    }
}
