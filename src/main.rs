use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use superlig_data::cache::{CacheKey, MatchCache};
use superlig_data::config::{
    AggregatePolicy, DEFAULT_MAX_ROUND, DuplicatePolicy, FailurePolicy, Settings,
};
use superlig_data::fetcher::{FetchReport, MatchFetcher};
use superlig_data::fixtures;
use superlig_data::loader::{DataLoader, DataSource};
use superlig_data::provider::SofascoreProvider;
use superlig_data::records::Fixture;

/// Süper Lig match results: download, cache and merge per-round files
#[derive(Parser, Debug)]
#[command(name = "superlig_data", version, about)]
struct Cli {
    /// Directory holding the round and aggregate cache files
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Last round to load, counting from round 1
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_ROUND,
        value_parser = clap::value_parser!(u32).range(1..=64)
    )]
    max_round: u32,

    #[arg(long, value_enum)]
    aggregate_policy: Option<AggregatePolicy>,

    #[arg(long, value_enum)]
    failure_policy: Option<FailurePolicy>,

    #[arg(long, value_enum)]
    duplicate_policy: Option<DuplicatePolicy>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Load from cache tiers, fetching only when nothing local is usable
    Load,
    /// Walk every round through the round cache and the provider
    Fetch,
    /// Print the fixture table and which fixtures have no result yet
    Fixtures,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = apply_cli(Settings::from_env()?, &cli);
    let cache = settings.file_cache();

    match cli.command.unwrap_or(Command::Load) {
        Command::Load => {
            let provider = SofascoreProvider::new(&settings)?;
            let outcome = DataLoader::from_settings(&cache, &provider, &settings)
                .load_data(cli.max_round)?;
            println!("Match data loaded");
            match &outcome.source {
                DataSource::Aggregate => {
                    println!("Source: {}", cache.location(CacheKey::Aggregate));
                }
                DataSource::PerRound { rounds_loaded } => {
                    println!("Source: {rounds_loaded} round files in {}", cache.dir().display());
                }
                DataSource::Alternate { path } => {
                    println!("Source: {}", path.display());
                }
                DataSource::Fetched(report) => print_fetch_report(report),
            }
            println!("Matches: {}", outcome.dataset.len());
        }
        Command::Fetch => {
            let provider = SofascoreProvider::new(&settings)?;
            let outcome = MatchFetcher::from_settings(&cache, &provider, &settings)
                .get_match_data(cli.max_round)?;
            print_fetch_report(&outcome.report);
            println!("Saved: {}", cache.location(CacheKey::Aggregate));
        }
        Command::Fixtures => print_fixtures(&cache)?,
    }

    Ok(())
}

fn apply_cli(mut settings: Settings, cli: &Cli) -> Settings {
    if let Some(dir) = cli.data_dir.clone() {
        settings.data_dir = dir;
    }
    if let Some(policy) = cli.aggregate_policy {
        settings.aggregate_policy = policy;
    }
    if let Some(policy) = cli.failure_policy {
        settings.failure_policy = policy;
    }
    if let Some(policy) = cli.duplicate_policy {
        settings.duplicate_policy = policy;
    }
    settings
}

fn print_fetch_report(report: &FetchReport) {
    println!("Fetch run {} -> {}", report.started_at, report.finished_at);
    println!(
        "Rounds: {}/{} ({} from cache)",
        report.succeeded(),
        report.max_round,
        report.cache_hits()
    );
    println!("Matches: {}", report.rows_total);
    let failures = report.failures().collect::<Vec<_>>();
    if !failures.is_empty() {
        println!("Skipped rounds: {}", failures.len());
        for (round, failure) in failures.iter().take(8) {
            println!(" - round {round}: {failure}");
        }
    }
}

fn print_fixtures(cache: &dyn MatchCache) -> Result<()> {
    for (round, list) in fixtures::get_fixtures() {
        let open = open_fixtures(cache, round)?;
        println!("Round {round} ({} without result)", open.len());
        for fixture in &list {
            let marker = if open.contains(fixture) { " " } else { "*" };
            println!(" {marker} {} - {}", fixture.home, fixture.away);
        }
    }
    Ok(())
}

/// Fixtures of `round` with no result in that round's cache entry.
fn open_fixtures(cache: &dyn MatchCache, round: u32) -> Result<Vec<Fixture>> {
    let played = cache
        .read(CacheKey::Round(round))
        .with_context(|| format!("read round {round} match cache"))?
        .unwrap_or_default();
    Ok(fixtures::unplayed_fixtures(round, &played))
}
