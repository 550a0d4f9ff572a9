use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};

use batchwarden::config::Config;
use batchwarden::schedule::ScheduleSpec;
use batchwarden::scheduler::RunOutcome;

#[derive(Parser)]
#[command(
    name = "batchwarden",
    about = "Single-instance periodic batch scheduler",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file (otherwise layered lookup applies)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the scheduler daemon
    Run {
        /// Schedule expression (cron or interval shorthand like "1h")
        #[arg(long)]
        schedule: Option<String>,

        /// Run record database path
        #[arg(long)]
        db: Option<String>,

        /// Kill the job after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Job command and arguments (after `--`)
        #[arg(last = true)]
        command: Vec<String>,
    },

    /// Execute the job once and exit with its status
    Once {
        /// Run record database path
        #[arg(long)]
        db: Option<String>,

        /// Kill the job after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Job command and arguments (after `--`)
        #[arg(last = true)]
        command: Vec<String>,
    },

    /// Validate configuration and preview upcoming fire instants
    Check {
        /// Schedule expression to check instead of the configured one
        #[arg(long)]
        schedule: Option<String>,

        /// Number of fire instants to preview
        #[arg(long, default_value = "5")]
        count: usize,
    },

    /// Show recent run records
    History {
        /// Run record database path
        #[arg(long)]
        db: Option<String>,

        /// Maximum number of records to show
        #[arg(long, default_value = "20")]
        limit: usize,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Delete run records older than the retention window
    Prune {
        /// Run record database path
        #[arg(long)]
        db: Option<String>,

        /// Retention window override in days
        #[arg(long)]
        older_than_days: Option<u32>,
    },
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => Config::load(p),
        None => Ok(Config::load_or_default()),
    }
}

fn apply_job_override(cfg: &mut Config, command: &[String]) {
    if let Some((program, args)) = command.split_first() {
        cfg.job.command = program.clone();
        cfg.job.args = args.to_vec();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut cfg = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            schedule,
            db,
            timeout_secs,
            command,
        } => {
            apply_job_override(&mut cfg, &command);
            if let Some(expr) = schedule {
                cfg.schedule.expr = expr;
            }
            if let Some(db) = db {
                cfg.storage.db_path = db;
            }
            if let Some(secs) = timeout_secs {
                cfg.job.timeout_secs = Some(secs);
            }
            tracing::info!(
                job = %cfg.job.name,
                schedule = %cfg.schedule.expr,
                "Starting batchwarden daemon"
            );
            batchwarden::run_daemon(&cfg).await?;
        }
        Commands::Once {
            db,
            timeout_secs,
            command,
        } => {
            apply_job_override(&mut cfg, &command);
            if let Some(db) = db {
                cfg.storage.db_path = db;
            }
            if let Some(secs) = timeout_secs {
                cfg.job.timeout_secs = Some(secs);
            }
            let record = batchwarden::run_job_once(&cfg).await?;
            let code = match record.outcome {
                RunOutcome::Success => 0,
                RunOutcome::TimedOut => 124,
                RunOutcome::Failure | RunOutcome::SkippedOverlap => {
                    record.exit_code.unwrap_or(1)
                }
            };
            std::process::exit(code);
        }
        Commands::Check { schedule, count } => {
            if let Some(expr) = schedule {
                cfg.schedule.expr = expr;
            }
            let spec = ScheduleSpec::parse(&cfg.schedule.expr, Utc::now())?;
            println!("Schedule '{}' is valid.", spec.expr());
            if let Err(e) = cfg.validate() {
                println!("Config warning: {e}");
            }
            println!("Next {} fire instants (UTC):", count);
            for instant in spec.upcoming(Utc::now(), count) {
                println!("  {}", instant.to_rfc3339());
            }
        }
        Commands::History { db, limit, json } => {
            if let Some(db) = db {
                cfg.storage.db_path = db;
            }
            let pool = batchwarden::storage::open_pool(&cfg.storage.db_path)?;
            let records = batchwarden::storage::recent_records(&pool, limit)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No run records found.");
            } else {
                println!(
                    "{:<19} | {:<15} | {:<9} | {:<5} | Command",
                    "Started (UTC)", "Outcome", "Duration", "Exit"
                );
                println!(
                    "{:-<19}-|-{:-<15}-|-{:-<9}-|-{:-<5}-|-{:-<30}",
                    "", "", "", "", ""
                );
                for record in &records {
                    let duration = match record.finished_at {
                        Some(end) => {
                            let ms = (end - record.started_at).num_milliseconds();
                            format!("{:.1}s", ms as f64 / 1000.0)
                        }
                        None => "-".to_string(),
                    };
                    let exit = record
                        .exit_code
                        .map_or_else(|| "-".to_string(), |c| c.to_string());
                    println!(
                        "{:<19} | {:<15} | {:<9} | {:<5} | {}",
                        record.started_at.format("%Y-%m-%d %H:%M:%S"),
                        record.outcome,
                        duration,
                        exit,
                        record.command
                    );
                }
            }
        }
        Commands::Prune { db, older_than_days } => {
            if let Some(db) = db {
                cfg.storage.db_path = db;
            }
            let days = older_than_days
                .or(cfg.storage.retention_days)
                .context("no retention window: pass --older-than-days or set [storage] retention_days")?;
            let pool = batchwarden::storage::open_pool(&cfg.storage.db_path)?;
            let removed = batchwarden::storage::prune_older_than(&pool, days)?;
            println!("Removed {} run record(s) older than {} day(s).", removed, days);
        }
    }

    Ok(())
}
