// Report output.
//
// `ReportSink` receives finished tables; `CsvSink` writes one CSV file per
// table as `<dir>/<report>_<table>.csv`.

use fragcap_core::{
    BudgetDistribution, Category, Leaderboards, LineupCandidate, Role, SortField, SummaryMetrics,
};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to create report directory {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to write report {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("failed to flush report {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

/// Receives report tables as they are produced. Every method defaults to a
/// no-op so a sink only implements what it keeps.
pub trait ReportSink {
    /// One role's leaderboard, rows already in display order.
    fn leaderboard(
        &mut self,
        _report: &str,
        _role: Role,
        _rows: &[&SummaryMetrics],
        _categories: &[Category],
    ) -> Result<(), ReportError> {
        Ok(())
    }

    /// Captain ratings across all roles.
    fn captains(&mut self, _report: &str, _boards: &Leaderboards) -> Result<(), ReportError> {
        Ok(())
    }

    /// A ranked lineup list. `table` is "teams" (budget) or "dream_teams".
    fn lineups(
        &mut self,
        _report: &str,
        _table: &str,
        _lineups: &[LineupCandidate],
    ) -> Result<(), ReportError> {
        Ok(())
    }

    /// How many player sets fit each budget.
    fn distribution(
        &mut self,
        _report: &str,
        _distribution: &BudgetDistribution,
    ) -> Result<(), ReportError> {
        Ok(())
    }
}

/// A sink that drops everything.
pub struct NullSink;
impl ReportSink for NullSink {}

/// File-name form of a sort field, e.g. `mean_points_per_win`.
pub fn sort_field_slug(field: SortField) -> String {
    field.display_str().replace(' ', "_")
}

// ---------------------------------------------------------------------------
// CSV sink
// ---------------------------------------------------------------------------

pub struct CsvSink {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl CsvSink {
    /// Create the output directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ReportError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| ReportError::Io {
            path: dir.display().to_string(),
            source: e,
        })?;
        Ok(CsvSink {
            dir,
            written: Vec::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Files written so far, in write order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn write_table(
        &mut self,
        report: &str,
        table: &str,
        header: Vec<String>,
        rows: Vec<Vec<String>>,
    ) -> Result<(), ReportError> {
        let path = self.dir.join(format!("{report}_{table}.csv"));
        let wtr = csv::Writer::from_path(&path).map_err(|e| ReportError::Csv {
            path: path.display().to_string(),
            source: e,
        })?;
        write_rows(wtr, &path.display().to_string(), &header, &rows)?;

        debug!("wrote {} row(s) to {}", rows.len(), path.display());
        self.written.push(path);
        Ok(())
    }
}

fn write_rows<W: std::io::Write>(
    mut wtr: csv::Writer<W>,
    path: &str,
    header: &[String],
    rows: &[Vec<String>],
) -> Result<(), ReportError> {
    let csv_err = |e: csv::Error| ReportError::Csv {
        path: path.to_string(),
        source: e,
    };
    wtr.write_record(header).map_err(csv_err)?;
    for row in rows {
        wtr.write_record(row).map_err(csv_err)?;
    }
    wtr.flush().map_err(|e| ReportError::Write {
        path: path.to_string(),
        source: e,
    })
}

fn num(value: f64) -> String {
    value.to_string()
}

fn leaderboard_header(categories: &[Category]) -> Vec<String> {
    let mut header: Vec<String> = [
        "name",
        "team",
        "cost",
        "matches",
        "total points",
        "mean points per match",
        "min points",
        "max points",
        "wins",
        "loses",
        "mean points per win",
        "mean points per lose",
        "points per cost",
        "mean per cost",
        "mean duration",
        "mean per duration",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    header.extend(categories.iter().map(|c| c.name().to_string()));
    header.push("match points".to_string());
    header
}

fn leaderboard_row(m: &SummaryMetrics, categories: &[Category]) -> Vec<String> {
    let mut row = vec![
        m.player.clone(),
        m.team.clone(),
        m.cost.to_string(),
        m.match_count.to_string(),
        num(m.total_points),
        num(m.mean_points),
        num(m.min_points),
        num(m.max_points),
        m.wins.to_string(),
        m.losses.to_string(),
        num(m.mean_points_per_win),
        num(m.mean_points_per_lose),
        num(m.points_per_cost),
        num(m.mean_per_cost),
        num(m.mean_duration),
        num(m.mean_per_duration),
    ];
    row.extend(
        categories
            .iter()
            .map(|c| num(m.category_sums.get(c).copied().unwrap_or(0.0))),
    );
    row.push(
        m.unit_points
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(" "),
    );
    row
}

fn member_label(candidate: &LineupCandidate, player: &str) -> String {
    if candidate.captain == player {
        format!("{player} (c)")
    } else {
        player.to_string()
    }
}

impl ReportSink for CsvSink {
    fn leaderboard(
        &mut self,
        report: &str,
        role: Role,
        rows: &[&SummaryMetrics],
        categories: &[Category],
    ) -> Result<(), ReportError> {
        let body = rows.iter().map(|m| leaderboard_row(m, categories)).collect();
        self.write_table(report, role.display_str(), leaderboard_header(categories), body)
    }

    fn captains(&mut self, report: &str, boards: &Leaderboards) -> Result<(), ReportError> {
        let header = ["name", "team", "cost", "role", "rating"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let body = boards
            .captain_ratings()
            .into_iter()
            .map(|r| {
                let cost = boards
                    .get(r.role, &r.player)
                    .map(|m| m.cost.to_string())
                    .unwrap_or_default();
                vec![r.player, r.team, cost, r.role.to_string(), num(r.rating)]
            })
            .collect();
        self.write_table(report, "captains", header, body)
    }

    fn lineups(
        &mut self,
        report: &str,
        table: &str,
        lineups: &[LineupCandidate],
    ) -> Result<(), ReportError> {
        let size = lineups.first().map_or(0, |c| c.members.len());
        let mut header: Vec<String> = ["rank", "points", "cost", "captain"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        header.extend((1..=size).map(|i| format!("player {i}")));

        let body = lineups
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let mut row = vec![
                    (i + 1).to_string(),
                    num(c.total_points),
                    c.total_cost.to_string(),
                    c.captain.clone(),
                ];
                row.extend(c.members.iter().map(|m| member_label(c, &m.player)));
                row
            })
            .collect();
        self.write_table(report, table, header, body)
    }

    fn distribution(
        &mut self,
        report: &str,
        distribution: &BudgetDistribution,
    ) -> Result<(), ReportError> {
        let header = ["budget", "lineups", "share"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let total = distribution.total;
        let mut body: Vec<Vec<String>> = distribution
            .within
            .iter()
            .map(|(budget, count)| {
                let share = if total == 0 {
                    0.0
                } else {
                    fragcap_core::round3(*count as f64 / total as f64)
                };
                vec![budget.to_string(), count.to_string(), num(share)]
            })
            .collect();
        body.push(vec!["all".to_string(), total.to_string(), num(1.0)]);
        info!("{}: {} player set(s) in total", report, total);
        self.write_table(report, "budgets", header, body)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
