// End-to-end tests: config file on disk, fixture caches, CSV output.

use std::fs;
use std::path::{Path, PathBuf};

use fragcap_app::config::{load_config_from, Config, CONFIG_FILE};
use fragcap_app::pipeline::{run_all, run_day, run_overall, Event};
use fragcap_app::report::{CsvSink, NullSink};
use fragcap_core::{Game, Role};
use pretty_assertions::assert_eq;

// ===========================================================================
// Test helpers
// ===========================================================================

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

fn fixture(path: &str) -> String {
    fixtures().join(path).display().to_string()
}

/// Write `config/fragcap.toml` under a fresh temp dir and load it.
fn setup(name: &str, toml: &str) -> (PathBuf, Config) {
    let base = std::env::temp_dir().join(name);
    let _ = fs::remove_dir_all(&base);
    fs::create_dir_all(base.join("config")).unwrap();
    fs::write(base.join("config").join(CONFIG_FILE), toml).unwrap();
    let config = load_config_from(&base).unwrap();
    (base, config)
}

fn cs2_config(overall: &str) -> String {
    format!(
        r#"
[event]
name = "test-major"
game = "cs2"
roster = '{roster}'
matches = '{matches}'

[lineup]
budget = 70
top_k = 5
distribution = [60, 80]

[[days]]
name = "day1"
min_id = 2370000
max_id = 2370780

[[days]]
name = "day2"
min_id = 2370780

[[days]]
name = "rest_day"
min_id = 9000000

{overall}
"#,
        roster = fixture("cs2/pro_players.json"),
        matches = fixture("cs2/statistic_cache.json"),
    )
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// ===========================================================================
// CS2
// ===========================================================================

#[test]
fn cs2_run_all_writes_every_table() {
    let (base, config) = setup("fragcap_pipeline_cs2_all", &cs2_config(""));
    let event = Event::from_config(&config, &base).unwrap();
    assert_eq!(event.records.len(), 3);
    assert_eq!(event.skipped.len(), 1);

    let out = base.join("reports");
    let mut sink = CsvSink::new(&out).unwrap();
    let (days, overall) = run_all(&config, &base, &event, &mut sink).unwrap();
    assert_eq!(days.len(), 3);

    let mut expected: Vec<String> = Vec::new();
    for day in ["day1", "day2"] {
        for table in ["budgets", "captains", "dream_teams", "rifler", "sniper", "teams"] {
            expected.push(format!("{day}_{table}.csv"));
        }
    }
    for field in ["mean_points_per_lose", "mean_points_per_match", "mean_points_per_win"] {
        for role in ["rifler", "sniper"] {
            expected.push(format!("overall_{field}_{role}.csv"));
        }
    }
    for table in ["captains", "rifler", "sniper"] {
        expected.push(format!("rest_day_{table}.csv"));
    }
    expected.sort();
    assert_eq!(file_names(&out), expected);
    assert_eq!(sink.written().len(), expected.len());
    assert_eq!(overall.reports.len(), 3);

    let _ = fs::remove_dir_all(&base);
}

#[test]
fn cs2_days_split_by_match_id() {
    let (base, config) = setup("fragcap_pipeline_cs2_days", &cs2_config(""));
    let event = Event::from_config(&config, &base).unwrap();

    let day1 = run_day(&config, &event, &config.days[0], &mut NullSink).unwrap();
    assert_eq!(day1.diagnostics.records_in_window, 2);
    assert!(day1.diagnostics.unresolved.contains("coach"));
    assert!(day1.diagnostics.skipped_units.iter().all(|u| u.player != "ghost"));
    let zywoo = day1.boards.get(Role::Sniper, "ZywOo").unwrap();
    assert_eq!(zywoo.match_count, 2);
    // Won the Bo3, lost the Bo1.
    assert_eq!((zywoo.wins, zywoo.losses), (1, 1));
    let niko = day1.boards.get(Role::Rifler, "NiKo").unwrap();
    assert_eq!((niko.wins, niko.losses), (1, 1));
    assert!(day1.boards.get(Role::Sniper, "s1mple").is_none());

    let rankings = day1.rankings.unwrap();
    assert_eq!(rankings.dream.len(), 5);
    assert!(!rankings.budget.is_empty());
    assert!(rankings.budget.iter().all(|c| c.total_cost <= 70));

    // Drawn Bo2: nobody wins.
    let day2 = run_day(&config, &event, &config.days[1], &mut NullSink).unwrap();
    assert_eq!(day2.diagnostics.records_in_window, 1);
    // The unreadable line of match 2370800 lands in that day's diagnostics.
    let ghost: Vec<_> = day2
        .diagnostics
        .skipped_units
        .iter()
        .filter(|u| u.player == "ghost")
        .collect();
    assert_eq!(ghost.len(), 1);
    assert_eq!(ghost[0].match_id, 2370800);
    let zywoo = day2.boards.get(Role::Sniper, "ZywOo").unwrap();
    assert_eq!((zywoo.wins, zywoo.losses), (0, 1));

    let _ = fs::remove_dir_all(&base);
}

#[test]
fn empty_day_has_no_lineups() {
    let (base, config) = setup("fragcap_pipeline_cs2_empty", &cs2_config(""));
    let event = Event::from_config(&config, &base).unwrap();
    let rest = run_day(&config, &event, &config.days[2], &mut NullSink).unwrap();
    assert_eq!(rest.diagnostics.records_in_window, 0);
    assert_eq!(rest.boards.role_len(Role::Sniper), 0);
    assert!(rest.rankings.is_none());
    let _ = fs::remove_dir_all(&base);
}

#[test]
fn overall_splits_merges_and_uses_actual_roster() {
    let overall = format!(
        r#"
[overall]
roster = '{actual}'
playoff_first_match = 2370800

[[overall.merge]]
name = "earlier-major"
roster = '{roster}'
matches = '{matches}'
"#,
        actual = fixture("cs2/pro_players_actual.json"),
        roster = fixture("cs2/pro_players.json"),
        matches = fixture("cs2/statistic_cache.json"),
    );
    let (base, config) = setup("fragcap_pipeline_cs2_overall", &cs2_config(&overall));
    let event = Event::from_config(&config, &base).unwrap();
    let outcome = run_overall(&config, &base, &event, &mut NullSink).unwrap();

    assert_eq!(
        outcome.reports,
        vec![
            "groups_overall_mean_points_per_match",
            "groups_overall_mean_points_per_win",
            "groups_overall_mean_points_per_lose",
            "playoff_overall_mean_points_per_match",
            "playoff_overall_mean_points_per_win",
            "playoff_overall_mean_points_per_lose",
            "overall_mean_points_per_match",
            "overall_mean_points_per_win",
            "overall_mean_points_per_lose",
        ]
    );

    // Same cache merged twice: every unit counted twice.
    let zywoo = outcome.boards.get(Role::Sniper, "ZywOo").unwrap();
    assert_eq!(zywoo.match_count, 6);
    assert_eq!((zywoo.wins, zywoo.losses), (2, 4));

    // Costs come from the actual roster; players missing there are dropped.
    assert_eq!(outcome.boards.get(Role::Rifler, "NiKo").unwrap().cost, 25);
    assert!(outcome.boards.get(Role::Rifler, "Snax").is_none());

    let _ = fs::remove_dir_all(&base);
}

// ===========================================================================
// Dota2
// ===========================================================================

#[test]
fn dota2_day_resolves_account_ids_and_series() {
    let toml = format!(
        r#"
[event]
name = "test-international"
game = "dota2"
roster = '{roster}'
matches = '{league}'
match_dir = '{dir}'

[lineup]
budget = 75
top_k = 10

[[days]]
name = "groups"
min_id = 7800000
"#,
        roster = fixture("dota2/pro_players.json"),
        league = fixture("dota2/league.json"),
        dir = fixture("dota2/matches"),
    );
    let (base, config) = setup("fragcap_pipeline_dota2", &toml);
    let event = Event::from_config(&config, &base).unwrap();
    assert_eq!(event.game, Game::Dota2);
    // 7800003 has no match file.
    assert_eq!(event.records.len(), 2);

    let day = run_day(&config, &event, &config.days[0], &mut NullSink).unwrap();
    assert!(day.diagnostics.unresolved.is_empty());

    // Larl's lines carry no name and resolve through the account id.
    let larl = day.boards.get(Role::Mid, "Larl").unwrap();
    assert_eq!(larl.match_count, 2);

    let yatoro = day.boards.get(Role::Carry, "Yatoro").unwrap();
    assert_eq!((yatoro.wins, yatoro.losses), (2, 0));
    assert_eq!(yatoro.mean_duration, 35.0);
    let ace = day.boards.get(Role::Carry, "Ace").unwrap();
    assert_eq!((ace.wins, ace.losses), (0, 2));

    let rankings = day.rankings.unwrap();
    assert_eq!(rankings.dream.len(), 10);
    for lineup in &rankings.dream {
        assert_eq!(lineup.members.len(), 5);
    }
    assert!(rankings.budget.iter().all(|c| c.total_cost <= 75));

    let _ = fs::remove_dir_all(&base);
}
