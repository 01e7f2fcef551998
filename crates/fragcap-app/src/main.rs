// fragcap entry point.
//
// Usage: fragcap [all | overall | <day name>]
//        fragcap import-roster <export.tsv> <roster.json>
//        fragcap roster-template <roster.json>
//
// 1. Initialize tracing (log to file)
// 2. Load config (copies defaults/ on first run)
// 3. Load the event's roster and match records
// 4. Write the requested reports under <output_dir>/<event name>/

use fragcap_app::config::{self, Config};
use fragcap_app::ingest;
use fragcap_app::pipeline::{self, Event};
use fragcap_app::report::CsvSink;

use anyhow::{bail, Context};
use std::path::Path;
use tracing::info;

fn main() -> anyhow::Result<()> {
    init_tracing()?;
    info!("fragcap starting up");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let target = args.first().map(String::as_str).unwrap_or("all");

    if target == "import-roster" {
        let [_, tsv, out] = args.as_slice() else {
            bail!("usage: fragcap import-roster <export.tsv> <roster.json>");
        };
        let entries = ingest::import_roster_tsv(Path::new(tsv))?;
        ingest::write_roster(Path::new(out), &entries)?;
        println!("wrote {} roster entries to {}", entries.len(), out);
        return Ok(());
    }

    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: event={}, game={}, {} day(s)",
        config.event.name,
        config.event.game,
        config.days.len()
    );

    let base_dir = std::env::current_dir().context("failed to resolve working directory")?;

    if target == "roster-template" {
        let [_, out] = args.as_slice() else {
            bail!("usage: fragcap roster-template <roster.json>");
        };
        return write_roster_template(&config, &base_dir, Path::new(out));
    }

    let out_dir = base_dir
        .join(&config.event.output_dir)
        .join(&config.event.name);
    let mut sink = CsvSink::new(&out_dir).context("failed to prepare output directory")?;

    let event = Event::from_config(&config, &base_dir)?;
    info!(
        "Loaded {} roster entries and {} match record(s)",
        event.roster.len(),
        event.records.len()
    );

    match target {
        "all" => {
            pipeline::run_all(&config, &base_dir, &event, &mut sink)?;
        }
        "overall" => {
            pipeline::run_overall(&config, &base_dir, &event, &mut sink)?;
        }
        name => {
            let Some(day) = config.days.iter().find(|d| d.name == name) else {
                bail!("unknown day `{name}` (expected all, overall or a configured day)");
            };
            pipeline::run_day(&config, &event, day, &mut sink)?;
        }
    }

    println!(
        "wrote {} report file(s) to {}",
        sink.written().len(),
        sink.dir().display()
    );
    info!("fragcap finished");
    Ok(())
}

/// Roster skeleton of every player in the configured event's match data.
fn write_roster_template(config: &Config, base_dir: &Path, out: &Path) -> anyhow::Result<()> {
    let ev = &config.event;
    let match_dir = ev.match_dir.as_deref().map(|d| base_dir.join(d));
    let data = ingest::load_matches(ev.game, &base_dir.join(&ev.matches), match_dir.as_deref())
        .with_context(|| format!("failed to load matches for {}", ev.name))?;
    let entries = ingest::roster_template(&data.records);
    ingest::write_roster(out, &entries)?;
    println!("wrote {} roster entries to {}", entries.len(), out.display());
    Ok(())
}

/// Initialize tracing to log to a file.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("fragcap.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("fragcap=info,fragcap_app=info,fragcap_core=info,warn")
            }),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
