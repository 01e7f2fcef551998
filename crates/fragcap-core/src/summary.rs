// Player-level summary metrics derived from an aggregated series, plus the
// per-role leaderboards built from them.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::aggregate::{PlayerSeries, RoleBuckets};
use crate::error::CoreError;
use crate::points::{round3, Category};
use crate::role::Role;
use crate::roster::{Player, Roster};

// ---------------------------------------------------------------------------
// Summary metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub player: String,
    pub team: String,
    pub role: Role,
    pub cost: u32,
    pub match_count: usize,
    /// Sum of multiplier-scaled unit points.
    pub total_points: f64,
    /// Mean of raw unit points.
    pub mean_points: f64,
    pub min_points: f64,
    pub max_points: f64,
    pub wins: u32,
    pub losses: u32,
    pub mean_points_per_win: f64,
    pub mean_points_per_lose: f64,
    pub points_per_cost: f64,
    pub mean_per_cost: f64,
    /// Minutes. Zero when no unit carried a duration.
    pub mean_duration: f64,
    pub mean_per_duration: f64,
    pub category_sums: BTreeMap<Category, f64>,
    /// Raw points of each unit, in aggregation order.
    pub unit_points: Vec<f64>,
}

/// Derive summary metrics for one player.
///
/// `player` supplies the cost and role; the team comes from the series,
/// which carries the latest team seen for the player.
pub fn summarize(series: &PlayerSeries, player: &Player) -> SummaryMetrics {
    let units = series.units();
    let unit_points: Vec<f64> = units.iter().map(|u| u.points).collect();
    let count = units.len();

    let total_points = round3(units.iter().map(|u| u.fantasy_points).sum());
    let mean_points = if count == 0 {
        0.0
    } else {
        round3(unit_points.iter().sum::<f64>() / count as f64)
    };
    let min_points = unit_points.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max_points = unit_points.iter().copied().reduce(f64::max).unwrap_or(0.0);

    let mean_points_per_win = conditional_mean(series, series.wins(), true);
    let mean_points_per_lose = conditional_mean(series, series.losses(), false);

    let cost = player.cost.max(1) as f64;
    let mean_duration = if count == 0 {
        0.0
    } else {
        round3(units.iter().map(|u| u.duration).sum::<f64>() / count as f64 / 60.0)
    };
    let mean_per_duration = if mean_duration > 0.0 {
        round3(mean_points / mean_duration)
    } else {
        0.0
    };

    SummaryMetrics {
        player: player.canonical_name().to_string(),
        team: if series.team.is_empty() {
            player.team.clone()
        } else {
            series.team.clone()
        },
        role: player.role,
        cost: player.cost,
        match_count: count,
        total_points,
        mean_points,
        min_points,
        max_points,
        wins: series.wins(),
        losses: series.losses(),
        mean_points_per_win,
        mean_points_per_lose,
        points_per_cost: round3(total_points / cost),
        mean_per_cost: round3(mean_points / cost),
        mean_duration,
        mean_per_duration,
        category_sums: series.category_sums(),
        unit_points,
    }
}

/// Σ round3(p / n) over units with the given outcome; 0 when there are none.
fn conditional_mean(series: &PlayerSeries, n: u32, win: bool) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let sum: f64 = series
        .units()
        .iter()
        .filter(|u| u.win == win)
        .map(|u| round3(u.points / n as f64))
        .sum();
    round3(sum)
}

// ---------------------------------------------------------------------------
// Sort field
// ---------------------------------------------------------------------------

/// The metric used to order leaderboards and to score lineup members.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortField {
    #[default]
    #[serde(rename = "total points")]
    TotalPoints,
    #[serde(rename = "mean points per match")]
    MeanPoints,
    #[serde(rename = "mean points per win")]
    MeanPointsPerWin,
    #[serde(rename = "mean points per lose")]
    MeanPointsPerLose,
    #[serde(rename = "points per cost")]
    PointsPerCost,
    #[serde(rename = "mean per cost")]
    MeanPerCost,
    #[serde(rename = "mean per duration")]
    MeanPerDuration,
}

impl SortField {
    pub const ALL: [SortField; 7] = [
        SortField::TotalPoints,
        SortField::MeanPoints,
        SortField::MeanPointsPerWin,
        SortField::MeanPointsPerLose,
        SortField::PointsPerCost,
        SortField::MeanPerCost,
        SortField::MeanPerDuration,
    ];

    pub fn display_str(&self) -> &'static str {
        match self {
            SortField::TotalPoints => "total points",
            SortField::MeanPoints => "mean points per match",
            SortField::MeanPointsPerWin => "mean points per win",
            SortField::MeanPointsPerLose => "mean points per lose",
            SortField::PointsPerCost => "points per cost",
            SortField::MeanPerCost => "mean per cost",
            SortField::MeanPerDuration => "mean per duration",
        }
    }

    pub fn value(&self, m: &SummaryMetrics) -> f64 {
        match self {
            SortField::TotalPoints => m.total_points,
            SortField::MeanPoints => m.mean_points,
            SortField::MeanPointsPerWin => m.mean_points_per_win,
            SortField::MeanPointsPerLose => m.mean_points_per_lose,
            SortField::PointsPerCost => m.points_per_cost,
            SortField::MeanPerCost => m.mean_per_cost,
            SortField::MeanPerDuration => m.mean_per_duration,
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

impl FromStr for SortField {
    type Err = CoreError;

    /// Accepts the display form ("mean points per win") as well as
    /// snake_case ("mean_points_per_win").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', " ");
        let field = match normalized.as_str() {
            "total points" | "total" => SortField::TotalPoints,
            "mean points per match" | "mean points" | "mean" => SortField::MeanPoints,
            "mean points per win" => SortField::MeanPointsPerWin,
            "mean points per lose" | "mean points per loss" => SortField::MeanPointsPerLose,
            "points per cost" => SortField::PointsPerCost,
            "mean per cost" => SortField::MeanPerCost,
            "mean per duration" => SortField::MeanPerDuration,
            _ => return Err(CoreError::UnknownSortField(s.to_string())),
        };
        Ok(field)
    }
}

/// Stable descending order by the field value.
pub(crate) fn sort_desc<T>(items: &mut [T], value: impl Fn(&T) -> f64) {
    items.sort_by(|a, b| value(b).partial_cmp(&value(a)).unwrap_or(Ordering::Equal));
}

// ---------------------------------------------------------------------------
// Leaderboards
// ---------------------------------------------------------------------------

/// Captain rating: a player's total points doubled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptainRating {
    pub player: String,
    pub team: String,
    pub role: Role,
    pub rating: f64,
}

/// Summaries per role, keyed by player name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Leaderboards {
    boards: BTreeMap<Role, BTreeMap<String, SummaryMetrics>>,
}

impl Leaderboards {
    pub fn roles(&self) -> impl Iterator<Item = Role> + '_ {
        self.boards.keys().copied()
    }

    pub fn role(&self, role: Role) -> Option<&BTreeMap<String, SummaryMetrics>> {
        self.boards.get(&role)
    }

    pub fn get(&self, role: Role, player: &str) -> Option<&SummaryMetrics> {
        self.boards.get(&role).and_then(|b| b.get(player))
    }

    /// Number of players with a summary in `role`.
    pub fn role_len(&self, role: Role) -> usize {
        self.boards.get(&role).map_or(0, |b| b.len())
    }

    pub fn insert(&mut self, metrics: SummaryMetrics) {
        self.boards
            .entry(metrics.role)
            .or_default()
            .insert(metrics.player.clone(), metrics);
    }

    /// The players of a role ordered by `field`, descending. Ties keep name
    /// order.
    pub fn sorted(&self, role: Role, field: SortField) -> Vec<&SummaryMetrics> {
        let mut rows: Vec<&SummaryMetrics> = self
            .boards
            .get(&role)
            .map(|b| b.values().collect())
            .unwrap_or_default();
        sort_desc(&mut rows, |m| field.value(m));
        rows
    }

    /// Every player with `2 × total_points`, best first.
    pub fn captain_ratings(&self) -> Vec<CaptainRating> {
        let mut ratings: Vec<CaptainRating> = self
            .boards
            .values()
            .flat_map(|b| b.values())
            .map(|m| CaptainRating {
                player: m.player.clone(),
                team: m.team.clone(),
                role: m.role,
                rating: round3(m.total_points * 2.0),
            })
            .collect();
        sort_desc(&mut ratings, |r| r.rating);
        ratings
    }
}

/// Summarize every aggregated player. Empty role buckets stay present so a
/// later lineup pass can report which role is short.
pub fn summarize_buckets(buckets: &RoleBuckets, roster: &Roster) -> Result<Leaderboards, CoreError> {
    let mut boards = Leaderboards::default();
    for (role, bucket) in buckets {
        boards.boards.entry(*role).or_default();
        for (name, series) in bucket {
            let player = roster
                .canonical_player(name)
                .ok_or_else(|| CoreError::MissingCost {
                    player: name.clone(),
                })?;
            let mut metrics = summarize(series, player);
            metrics.role = *role;
            boards.insert(metrics);
        }
    }
    Ok(boards)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::points::PointBreakdown;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    fn player(name: &str, role: Role, cost: u32) -> Player {
        Player {
            name: name.into(),
            team: "Team Spirit".into(),
            role,
            cost,
            save_as: None,
            account_id: None,
        }
    }

    fn unit(points: f64) -> PointBreakdown {
        [(Category::Kills, points)].into_iter().collect()
    }

    fn series(units: &[(f64, bool, f64)]) -> PlayerSeries {
        let mut s = PlayerSeries::new("Team Spirit");
        for (points, win, duration) in units {
            s.accumulate(unit(*points), 1.0, *win, *duration);
        }
        s
    }

    #[test]
    fn basic_metrics() {
        let s = series(&[(30.0, true, 2400.0), (10.0, false, 1800.0), (20.0, true, 2100.0)]);
        let m = summarize(&s, &player("Yatoro", Role::Carry, 20));

        assert_eq!(m.match_count, 3);
        assert_eq!(m.total_points, 60.0);
        assert_eq!(m.mean_points, 20.0);
        assert_eq!(m.min_points, 10.0);
        assert_eq!(m.max_points, 30.0);
        assert_eq!((m.wins, m.losses), (2, 1));
        assert_eq!(m.mean_points_per_win, 25.0);
        assert_eq!(m.mean_points_per_lose, 10.0);
        assert_eq!(m.points_per_cost, 3.0);
        assert_eq!(m.mean_per_cost, 1.0);
        assert_eq!(m.mean_duration, 35.0);
        assert!(approx_eq(m.mean_per_duration, 0.571));
        assert_eq!(m.unit_points, vec![30.0, 10.0, 20.0]);
    }

    #[test]
    fn no_wins_means_zero_per_win() {
        let s = series(&[(12.0, false, 0.0), (8.0, false, 0.0)]);
        let m = summarize(&s, &player("Larl", Role::Mid, 10));
        assert_eq!(m.mean_points_per_win, 0.0);
        assert_eq!(m.mean_points_per_lose, 10.0);
        assert_eq!(m.mean_duration, 0.0);
        assert_eq!(m.mean_per_duration, 0.0);
    }

    #[test]
    fn total_uses_scaled_points_and_mean_uses_raw() {
        let mut s = PlayerSeries::new("FaZe");
        s.accumulate(unit(30.0), 2.0 / 3.0, true, 0.0);
        s.accumulate(unit(30.0), 1.0, true, 0.0);
        let m = summarize(&s, &player("ropz", Role::Rifler, 10));
        assert_eq!(m.total_points, 50.0);
        assert_eq!(m.mean_points, 30.0);
        assert_eq!(m.points_per_cost, 5.0);
    }

    #[test]
    fn win_and_lose_means_reconstruct_overall_mean() {
        let s = series(&[(13.37, true, 0.0), (7.5, false, 0.0), (21.004, true, 0.0), (3.2, false, 0.0)]);
        let m = summarize(&s, &player("Collapse", Role::Offlane, 18));
        let rebuilt = (m.mean_points_per_win * m.wins as f64
            + m.mean_points_per_lose * m.losses as f64)
            / m.match_count as f64;
        assert!((rebuilt - m.mean_points).abs() < 0.01);
    }

    #[test]
    fn sort_field_parses_both_forms() {
        assert_eq!("total points".parse::<SortField>().unwrap(), SortField::TotalPoints);
        assert_eq!(
            "mean_points_per_win".parse::<SortField>().unwrap(),
            SortField::MeanPointsPerWin
        );
        assert_eq!(
            " Mean per Duration ".parse::<SortField>().unwrap(),
            SortField::MeanPerDuration
        );
        assert!(matches!(
            "kda".parse::<SortField>(),
            Err(CoreError::UnknownSortField(_))
        ));
        for field in SortField::ALL {
            assert_eq!(field.to_string().parse::<SortField>().unwrap(), field);
        }
    }

    #[test]
    fn sorted_is_stable_on_ties() {
        let roster = Roster::new([
            player("b_player", Role::Support, 10),
            player("a_player", Role::Support, 10),
            player("c_player", Role::Support, 10),
        ])
        .unwrap();
        let mut buckets = RoleBuckets::new();
        let bucket = buckets.entry(Role::Support).or_default();
        bucket.insert("b_player".into(), series(&[(12.0, true, 0.0)]));
        bucket.insert("a_player".into(), series(&[(12.0, true, 0.0)]));
        bucket.insert("c_player".into(), series(&[(15.0, true, 0.0)]));

        let boards = summarize_buckets(&buckets, &roster).unwrap();
        let names: Vec<&str> = boards
            .sorted(Role::Support, SortField::TotalPoints)
            .iter()
            .map(|m| m.player.as_str())
            .collect();
        assert_eq!(names, vec!["c_player", "a_player", "b_player"]);
    }

    #[test]
    fn captain_ratings_double_totals() {
        let roster = Roster::new([player("ZywOo", Role::Sniper, 20), player("apEX", Role::Rifler, 8)])
            .unwrap();
        let mut buckets = RoleBuckets::new();
        buckets
            .entry(Role::Sniper)
            .or_default()
            .insert("ZywOo".into(), series(&[(40.0, true, 0.0)]));
        buckets
            .entry(Role::Rifler)
            .or_default()
            .insert("apEX".into(), series(&[(25.5, true, 0.0)]));

        let ratings = summarize_buckets(&buckets, &roster).unwrap().captain_ratings();
        assert_eq!(ratings[0].player, "ZywOo");
        assert_eq!(ratings[0].rating, 80.0);
        assert_eq!(ratings[1].rating, 51.0);
    }

    #[test]
    fn unknown_player_in_bucket_is_missing_cost() {
        let roster = Roster::new([player("ZywOo", Role::Sniper, 20)]).unwrap();
        let mut buckets = RoleBuckets::new();
        buckets
            .entry(Role::Sniper)
            .or_default()
            .insert("device".into(), series(&[(10.0, true, 0.0)]));
        let err = summarize_buckets(&buckets, &roster).unwrap_err();
        assert_eq!(err, CoreError::MissingCost { player: "device".into() });
    }
}
