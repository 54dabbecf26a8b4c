use std::fmt;

use chrono::{Duration, FixedOffset};
use coach_core::model::{ProductId, ScoreBreakdown, SessionRecordDraft, Turn};
use coach_core::time::{offset_from_minutes, utc_offset};
use rand::Rng;
use services::{AppServices, Clock, ProgressService};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidOffset { raw: String },
    InvalidCount { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidOffset { raw } => write!(f, "invalid --utc-offset value: {raw}"),
            ArgsError::InvalidCount { raw } => write!(f, "invalid --count value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

const DEFAULT_SEED_COUNT: u32 = 10;

struct Args {
    db_url: String,
    offset: FixedOffset,
    count: u32,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- stats    [--db <sqlite_url>] [--utc-offset <minutes>]");
    eprintln!("  cargo run -p app -- progress [--db <sqlite_url>] [--utc-offset <minutes>]");
    eprintln!("  cargo run -p app -- seed     [--db <sqlite_url>] [--count <n>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:coach.sqlite3");
    eprintln!("  --utc-offset 0");
    eprintln!("  --count {DEFAULT_SEED_COUNT}");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  COACH_DB_URL, COACH_UTC_OFFSET_MINUTES, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Stats,
    Progress,
    Seed,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "stats" => Some(Self::Stats),
            "progress" => Some(Self::Progress),
            "seed" => Some(Self::Seed),
            _ => None,
        }
    }
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("COACH_DB_URL")
            .ok()
            .map_or_else(
                || normalize_sqlite_url("sqlite:coach.sqlite3".into()),
                normalize_sqlite_url,
            );
        let mut offset = std::env::var("COACH_UTC_OFFSET_MINUTES")
            .ok()
            .and_then(|value| value.trim().parse::<i32>().ok())
            .map_or_else(utc_offset, offset_from_minutes);
        let mut count = DEFAULT_SEED_COUNT;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--utc-offset" => {
                    let value = require_value(args, "--utc-offset")?;
                    let minutes: i32 = value
                        .trim()
                        .parse()
                        .map_err(|_| ArgsError::InvalidOffset { raw: value.clone() })?;
                    offset = minutes
                        .checked_mul(60)
                        .and_then(FixedOffset::east_opt)
                        .ok_or(ArgsError::InvalidOffset { raw: value })?;
                }
                "--count" => {
                    let value = require_value(args, "--count")?;
                    count = value
                        .trim()
                        .parse()
                        .map_err(|_| ArgsError::InvalidCount { raw: value.clone() })?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            offset,
            count,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

async fn print_stats(progress: &ProgressService) {
    let stats = progress.stats().await;
    let catalog = progress.catalog();

    println!("sessions        {}", stats.total_sessions);
    println!(
        "score           avg {} / best {} / worst {}",
        stats.average_score, stats.highest_score, stats.lowest_score
    );
    println!("practice time   {} min", stats.total_time_secs / 60);
    println!("trend           {:?}", stats.recent_trend);
    println!(
        "streak          {} day(s), {} this week",
        stats.streak_days, stats.sessions_this_week
    );

    if !stats.by_scenario.is_empty() {
        println!();
        for (id, rollup) in &stats.by_scenario {
            println!(
                "  {:<40} {:>3} sessions  avg {:>3}  best {:>3}",
                catalog.scenario_label(id),
                rollup.count,
                rollup.average,
                rollup.best
            );
        }
    }

    if !stats.personal_bests.is_empty() {
        println!();
        println!("personal bests");
        for best in &stats.personal_bests {
            println!(
                "  {:>3}  {} / {}",
                best.score,
                catalog.scenario_label(&best.scenario_id),
                catalog.product_label(&best.product_id)
            );
        }
    }
}

async fn print_progress(progress: &ProgressService) {
    let newly = progress.check_and_unlock().await;
    for id in &newly {
        println!("unlocked: {}", progress.catalog().scenario_label(id));
    }

    let summary = progress.summary().await;
    println!(
        "tier            {} ({} of {} scenarios)",
        summary.tier.name, summary.unlocked_count, summary.total_scenarios
    );
    if let Some(next) = summary.next_tier {
        println!(
            "next tier       {} at {} ({}%)",
            next.name, next.threshold, summary.next_tier_progress
        );
    }
    for achievement in &summary.achievements {
        println!("achievement     {}", achievement.title());
    }

    println!();
    for item in progress.scenario_states().await {
        let mark = if item.unlocked { "open" } else { "lock" };
        println!("  [{mark}] {:<40} {:>3}%", item.label, item.progress);
        for req in item.outstanding() {
            println!(
                "         needs {:?} ({}/{})",
                req.requirement,
                req.current,
                req.requirement.threshold()
            );
        }
    }
}

/// Append synthetic completed sessions across whatever is currently unlocked.
async fn seed(progress: &ProgressService, count: u32) -> Result<(), Box<dyn std::error::Error>> {
    let products = [
        ProductId::new("cardiozen"),
        ProductId::new("glucobalance"),
        ProductId::new("oncoshield"),
    ];
    let mut rng = rand::rng();
    let now = progress.now();

    for i in 0..count {
        let open: Vec<_> = progress
            .scenario_states()
            .await
            .into_iter()
            .filter(|item| item.unlocked)
            .map(|item| item.scenario_id)
            .collect();
        let Some(scenario_id) = open.get(rng.random_range(0..open.len().max(1))).cloned() else {
            break;
        };

        let completed_at = now - Duration::hours(i64::from(count - i));
        let breakdown = ScoreBreakdown::new(
            rng.random_range(50..=100),
            rng.random_range(50..=100),
            rng.random_range(50..=100),
            rng.random_range(50..=100),
            rng.random_range(60..=100),
            rng.random_range(45..=100),
        )?;
        let draft = SessionRecordDraft {
            scenario_id,
            product_id: products[rng.random_range(0..products.len())].clone(),
            turns: vec![
                Turn::counterpart("I have five minutes. What is this about?"),
                Turn::user("What outcomes matter most for your patients right now?"),
            ],
            breakdown,
            overall: None,
            started_at: completed_at - Duration::seconds(rng.random_range(180..=420)),
            completed_at,
        };
        progress.complete_session(draft).await?;
        progress.check_and_unlock().await;
    }

    info!(count, "seeded sessions");
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Stats,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Stats,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup; services never see file paths.
    prepare_sqlite_file(&parsed.db_url)?;
    let app = AppServices::new_sqlite(&parsed.db_url, Clock::default_clock(), parsed.offset).await?;
    let progress = app.progress();
    if progress.is_degraded() {
        eprintln!("warning: progress store unavailable, results will not be saved");
    }

    match cmd {
        Command::Stats => print_stats(&progress).await,
        Command::Progress => print_progress(&progress).await,
        Command::Seed => seed(&progress, parsed.count).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
