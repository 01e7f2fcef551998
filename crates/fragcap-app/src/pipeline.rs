// Report pipeline.
//
// Day reports: aggregate one window, summarize, rank lineups, write tables.
// Overall reports: aggregate the whole event (optionally split at the playoff
// stage), fold in earlier tournaments and write one leaderboard set per sort
// field.

use anyhow::Context;
use fragcap_core::{
    aggregate, budget_distribution, generate_lineups, merge_all, Category, CoreError, Diagnostics,
    Game, Leaderboards, MatchRecord, Rankings, RoleBuckets, Roster, SkippedUnit, SortField, Window,
};
use fragcap_core::overall::{retain_played, unit_counts};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::{Config, DayConfig};
use crate::ingest;
use crate::report::{sort_field_slug, ReportSink};

/// Roster and match records of one tournament.
#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    pub game: Game,
    pub roster: Roster,
    pub records: Vec<MatchRecord>,
    /// Player lines that could not be read from the match data.
    pub skipped: Vec<SkippedUnit>,
    pub excluded_series: BTreeSet<u64>,
}

/// Result of one day report.
#[derive(Debug)]
pub struct DayOutcome {
    pub name: String,
    pub diagnostics: Diagnostics,
    pub boards: Leaderboards,
    /// `None` when some role had too few players for a lineup.
    pub rankings: Option<Rankings>,
}

/// Result of the overall reports.
#[derive(Debug)]
pub struct OverallOutcome {
    /// Report names written, e.g. `overall_mean_points_per_match`.
    pub reports: Vec<String>,
    pub boards: Leaderboards,
}

fn resolve(base_dir: &Path, path: &str) -> PathBuf {
    base_dir.join(path)
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Event {
    /// Load a tournament's roster and match records. CS2 lines get their
    /// side from the roster team.
    pub fn load(
        name: &str,
        game: Game,
        roster: &Path,
        matches: &Path,
        match_dir: Option<&Path>,
        excluded_series: BTreeSet<u64>,
    ) -> anyhow::Result<Self> {
        let roster = ingest::load_roster(roster)
            .with_context(|| format!("failed to load roster for {name}"))?;
        let mut data = ingest::load_matches(game, matches, match_dir)
            .with_context(|| format!("failed to load matches for {name}"))?;
        if game == Game::Cs2 {
            ingest::hltv::assign_sides(&mut data.records, &roster);
        }
        Ok(Event {
            name: name.to_string(),
            game,
            roster,
            records: data.records,
            skipped: data.skipped,
            excluded_series,
        })
    }

    /// The configured event.
    pub fn from_config(config: &Config, base_dir: &Path) -> anyhow::Result<Self> {
        let ev = &config.event;
        let match_dir = ev.match_dir.as_deref().map(|d| resolve(base_dir, d));
        Event::load(
            &ev.name,
            ev.game,
            &resolve(base_dir, &ev.roster),
            &resolve(base_dir, &ev.matches),
            match_dir.as_deref(),
            ev.excluded_series.clone(),
        )
    }

    fn aggregate(&self, config: &Config, mut window: Window) -> (RoleBuckets, Diagnostics) {
        window.excluded_series.extend(self.excluded_series.iter().copied());
        let mut agg = aggregate(self.game, &self.roster, &config.scoring, &self.records, &window);
        // Lines dropped at ingest count against the window of their match.
        let in_window = |id: u64| {
            self.records
                .iter()
                .any(|r| r.id == id && window.contains(r))
        };
        agg.diagnostics.skipped_units.extend(
            self.skipped
                .iter()
                .filter(|u| in_window(u.match_id))
                .cloned(),
        );
        (agg.buckets, agg.diagnostics)
    }
}

fn log_diagnostics(report: &str, diagnostics: &Diagnostics) {
    info!(
        "{}: {} record(s) in window, {} unit(s) accepted, {} skipped, {} unresolved name(s)",
        report,
        diagnostics.records_in_window,
        diagnostics.units_accepted,
        diagnostics.skipped_units.len(),
        diagnostics.unresolved.len()
    );
}

fn write_leaderboards(
    sink: &mut dyn ReportSink,
    report: &str,
    boards: &Leaderboards,
    game: Game,
    field: SortField,
) -> anyhow::Result<()> {
    let categories = Category::for_game(game);
    for role in game.roles() {
        let rows = boards.sorted(*role, field);
        sink.leaderboard(report, *role, &rows, categories)
            .with_context(|| format!("failed to write {report} {role} leaderboard"))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Day reports
// ---------------------------------------------------------------------------

/// Build and write the report for one day.
pub fn run_day(
    config: &Config,
    event: &Event,
    day: &DayConfig,
    sink: &mut dyn ReportSink,
) -> anyhow::Result<DayOutcome> {
    let report = day.name.as_str();
    let (buckets, diagnostics) = event.aggregate(config, day.window(&BTreeSet::new()));
    log_diagnostics(report, &diagnostics);

    let boards = fragcap_core::summarize_buckets(&buckets, &event.roster)
        .with_context(|| format!("failed to summarize {report}"))?;
    write_leaderboards(sink, report, &boards, event.game, SortField::TotalPoints)?;
    sink.captains(report, &boards)
        .with_context(|| format!("failed to write {report} captains"))?;

    let template = config.template()?;
    let costs = event.roster.costs();
    let options = config.lineup_options(Some(day));
    let rankings = match generate_lineups(&boards, &costs, &template, &options) {
        Ok(rankings) => Some(rankings),
        Err(e @ CoreError::InsufficientRoster { .. }) => {
            warn!("{}: no lineups: {}", report, e);
            None
        }
        Err(e) => return Err(e).with_context(|| format!("failed to rank {report} lineups")),
    };

    if let Some(rankings) = &rankings {
        sink.lineups(report, "teams", &rankings.budget)
            .with_context(|| format!("failed to write {report} teams"))?;
        sink.lineups(report, "dream_teams", &rankings.dream)
            .with_context(|| format!("failed to write {report} dream teams"))?;

        if !config.lineup.distribution.is_empty() {
            let dist = budget_distribution(&boards, &costs, &template, &config.lineup.distribution)
                .with_context(|| format!("failed to count {report} lineups"))?;
            sink.distribution(report, &dist)
                .with_context(|| format!("failed to write {report} budgets"))?;
        }
    }

    info!("{}: report written", report);
    Ok(DayOutcome {
        name: day.name.clone(),
        diagnostics,
        boards,
        rankings,
    })
}

// ---------------------------------------------------------------------------
// Overall reports
// ---------------------------------------------------------------------------

/// Drop players the summarizing roster does not know.
fn retain_known(buckets: &mut RoleBuckets, roster: &Roster, report: &str) {
    for bucket in buckets.values_mut() {
        bucket.retain(|name, _| {
            let known = roster.canonical_player(name).is_some();
            if !known {
                warn!("{}: '{}' is not on the overall roster, dropped", report, name);
            }
            known
        });
    }
}

fn write_overall(
    sink: &mut dyn ReportSink,
    report: &str,
    mut buckets: RoleBuckets,
    roster: &Roster,
    game: Game,
    fields: &[SortField],
    written: &mut Vec<String>,
) -> anyhow::Result<Leaderboards> {
    retain_known(&mut buckets, roster, report);
    retain_played(&mut buckets);
    debug!("{}: {} player(s) after merge", report, unit_counts(&buckets).len());
    let boards = fragcap_core::summarize_buckets(&buckets, roster)
        .with_context(|| format!("failed to summarize {report}"))?;
    for field in fields {
        let name = format!("{report}_{}", sort_field_slug(*field));
        write_leaderboards(sink, &name, &boards, game, *field)?;
        written.push(name);
    }
    Ok(boards)
}

/// Build and write the overall reports for the event and every merged
/// tournament.
pub fn run_overall(
    config: &Config,
    base_dir: &Path,
    event: &Event,
    sink: &mut dyn ReportSink,
) -> anyhow::Result<OverallOutcome> {
    let overall = &config.overall;
    let roster = match &overall.roster {
        Some(path) => ingest::load_roster(&resolve(base_dir, path))
            .context("failed to load overall roster")?,
        None => event.roster.clone(),
    };
    let fields = overall.sort_fields.as_slice();
    let mut written = Vec::new();

    let (current, diagnostics) = event.aggregate(config, Window::all());
    log_diagnostics("overall", &diagnostics);

    if let Some(first) = overall.playoff_first_match {
        let (groups, _) = event.aggregate(config, Window::ids(0, Some(first)));
        write_overall(sink, "groups_overall", groups, &roster, event.game, fields, &mut written)?;
        let (playoff, _) = event.aggregate(config, Window::ids(first, None));
        write_overall(sink, "playoff_overall", playoff, &roster, event.game, fields, &mut written)?;
    }

    let mut parts = Vec::with_capacity(overall.merge.len() + 1);
    for t in &overall.merge {
        let match_dir = t.match_dir.as_deref().map(|d| resolve(base_dir, d));
        let earlier = Event::load(
            &t.name,
            event.game,
            &resolve(base_dir, &t.roster),
            &resolve(base_dir, &t.matches),
            match_dir.as_deref(),
            t.excluded_series.clone(),
        )?;
        let (buckets, diagnostics) = earlier.aggregate(config, Window::all());
        log_diagnostics(&t.name, &diagnostics);
        parts.push(buckets);
    }
    // The current event goes last so its teams win.
    parts.push(current);

    let boards = write_overall(
        sink,
        "overall",
        merge_all(parts),
        &roster,
        event.game,
        fields,
        &mut written,
    )?;

    info!("overall: {} report(s) written", written.len());
    Ok(OverallOutcome {
        reports: written,
        boards,
    })
}

/// Every configured day, then the overall reports.
pub fn run_all(
    config: &Config,
    base_dir: &Path,
    event: &Event,
    sink: &mut dyn ReportSink,
) -> anyhow::Result<(Vec<DayOutcome>, OverallOutcome)> {
    let mut days = Vec::with_capacity(config.days.len());
    for day in &config.days {
        days.push(run_day(config, event, day, sink)?);
    }
    let overall = run_overall(config, base_dir, event, sink)?;
    Ok((days, overall))
}
