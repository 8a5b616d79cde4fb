//! Command-line front end for the task sync engine.
//!
//! # Responsibility
//! - Wire config, SQLite storage and a remote source into one engine session.
//! - Print the merged task list and dashboard stats once startup sync settles.

use chrono::Utc;
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use taskflow_core::{
    init_logging, time_remaining, HttpTaskSource, InMemoryTaskSource, KeyValueStore,
    RemoteTaskSource, SqliteKeyValueStore, StatusFilter, SyncEngine, SyncOutcome, Task,
    TaskCategory, TaskFilter, TaskListStore, TaskStats, TaskflowConfig, TimeRemaining,
};

#[derive(Parser, Debug)]
#[command(name = "taskflow", version, about = "Local-first task list with background sync")]
struct Cli {
    /// SQLite file for the durable task list; in-memory when omitted
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    /// REST base URL; a seeded in-process source is used when omitted
    #[arg(long, value_name = "URL")]
    remote: Option<String>,

    /// JSON config file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory for rolling log files; logging is off when omitted
    #[arg(long, value_name = "DIR", env = "TASKFLOW_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Replace local state with the remote list after startup
    #[arg(long)]
    sync: bool,

    /// Show only `all`, `completed` or `pending` tasks
    #[arg(long, default_value = "all", value_parser = parse_status)]
    status: StatusFilter,

    /// Show only one category (`work`, `personal`, `urgent`)
    #[arg(long, value_parser = parse_category)]
    category: Option<TaskCategory>,

    /// Case-insensitive title/description search
    #[arg(long, default_value = "")]
    search: String,
}

fn parse_status(value: &str) -> Result<StatusFilter, String> {
    StatusFilter::parse(value).ok_or_else(|| format!("unknown status filter `{value}`"))
}

fn parse_category(value: &str) -> Result<TaskCategory, String> {
    TaskCategory::parse(value).ok_or_else(|| format!("unknown category `{value}`"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => TaskflowConfig::load(path)?,
        None => TaskflowConfig::default(),
    };
    let env_level = std::env::var(taskflow_core::config::LOG_LEVEL_ENV).ok();
    let config = config.with_log_level_override(env_level.as_deref());
    config.validate()?;

    if let Some(log_dir) = &cli.log_dir {
        let log_dir = std::path::absolute(log_dir)?;
        init_logging(&config.log_level, &log_dir.to_string_lossy())?;
    }

    let backend: Arc<dyn KeyValueStore> = match &cli.db {
        Some(path) => Arc::new(SqliteKeyValueStore::open(path)?),
        None => Arc::new(SqliteKeyValueStore::open_in_memory()?),
    };
    let store = TaskListStore::new(backend, config.storage_key.clone());

    let base_url = cli.remote.clone().or_else(|| config.remote.base_url.clone());
    let remote: Arc<dyn RemoteTaskSource> = match base_url {
        Some(url) => Arc::new(HttpTaskSource::new(url, config.remote.timeout())?),
        None => Arc::new(InMemoryTaskSource::with_example_tasks(Utc::now())),
    };

    let (engine, startup) = SyncEngine::start(store, remote, config.sync_policy());
    report_outcome("startup sync", startup.settled().await);
    if cli.sync {
        report_outcome("server sync", engine.sync_with_server().settled().await);
    }
    info!(
        "event=cli_run module=cli status=ok count={}",
        engine.tasks().len()
    );

    let snapshot = engine.snapshot();
    if let Some(error) = &snapshot.error {
        println!("! {error}");
    }

    let mut filter = TaskFilter::new().status(cli.status).search(cli.search);
    if let Some(category) = cli.category {
        filter = filter.category(category);
    }
    let now = Utc::now();
    for task in filter.apply(&snapshot.tasks) {
        println!("{}", format_task(&task, now));
    }

    print_stats(&TaskStats::compute(&snapshot.tasks, now));
    Ok(())
}

fn report_outcome(label: &str, outcome: SyncOutcome) {
    match outcome {
        SyncOutcome::Synced | SyncOutcome::Skipped => {}
        SyncOutcome::Failed(reason) => eprintln!("{label} failed: {reason}"),
    }
}

fn format_task(task: &Task, now: chrono::DateTime<Utc>) -> String {
    let mark = if task.completed { "x" } else { " " };
    let due = match time_remaining(task, now) {
        None => String::new(),
        Some(TimeRemaining::Overdue) if !task.completed => " (overdue)".to_string(),
        Some(TimeRemaining::Overdue) => String::new(),
        Some(TimeRemaining::Days(days)) => format!(" ({days}d left)"),
        Some(TimeRemaining::Hours(hours)) => format!(" ({hours}h left)"),
        Some(TimeRemaining::DueSoon) => " (due soon)".to_string(),
    };
    format!(
        "[{mark}] #{} {} [{}]{due}",
        task.id, task.title, task.category
    )
}

fn print_stats(stats: &TaskStats) {
    println!();
    println!(
        "total={} completed={} pending={} completion={:.0}%",
        stats.total, stats.completed, stats.pending, stats.completion_rate
    );
    for entry in &stats.by_category {
        println!(
            "  {}: {} ({}%)",
            entry.category, entry.count, entry.percentage
        );
    }
    if !stats.overdue.is_empty() {
        println!("overdue: {}", stats.overdue.len());
    }
    for task in &stats.upcoming_deadlines {
        if let Some(deadline) = task.deadline {
            println!("  due {} #{} {}", deadline.format("%Y-%m-%d %H:%M"), task.id, task.title);
        }
    }
}
