//! TOML configuration for batchwarden.
//!
//! Layered model: the `BATCHWARDEN_CONFIG` environment variable overrides
//! the config file path, then the standard system location is tried, then
//! compiled-in defaults apply. CLI flags override individual fields on top.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Root configuration for the scheduler process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub job: JobConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub lock: LockConfig,
}

/// The external command the scheduler runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Display name used in run records and log lines.
    #[serde(default = "default_job_name")]
    pub name: String,
    /// Program to execute.
    #[serde(default)]
    pub command: String,
    /// Arguments passed to the program.
    #[serde(default)]
    pub args: Vec<String>,
    /// Kill the job after this many seconds. Absent means no timeout.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Cap on the captured stdout/stderr excerpt stored per run.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Cron expression or interval shorthand ("1h", "30m", "90s").
    #[serde(default = "default_schedule_expr")]
    pub expr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database holding the run record log.
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Delete run records older than this many days. Absent disables pruning.
    #[serde(default)]
    pub retention_days: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LockConfig {
    /// Lease on the run lock: an acquisition older than this stops blocking
    /// new runs. Absent means the lock is held until released.
    #[serde(default)]
    pub lease_secs: Option<u64>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            name: default_job_name(),
            command: String::new(),
            args: Vec::new(),
            timeout_secs: None,
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            expr: default_schedule_expr(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            retention_days: None,
        }
    }
}

fn default_job_name() -> String {
    "batch-job".to_string()
}

fn default_max_output_bytes() -> usize {
    8 * 1024
}

fn default_schedule_expr() -> String {
    "1h".to_string()
}

fn default_db_path() -> String {
    "data/batchwarden.db".to_string()
}

impl Config {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Try to load configuration from, in order:
    /// 1. The path specified by the `BATCHWARDEN_CONFIG` environment variable.
    /// 2. `/etc/batchwarden/batchwarden.toml`.
    /// 3. Fall back to compiled-in defaults.
    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var("BATCHWARDEN_CONFIG") {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "BATCHWARDEN_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let system_path = Path::new("/etc/batchwarden/batchwarden.toml");
        if system_path.exists() {
            match Self::load(system_path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %system_path.display(),
                        error = %e,
                        "system config could not be loaded, using defaults"
                    );
                }
            }
        }

        Self::default()
    }

    /// Reject configurations the daemon cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.job.command.trim().is_empty() {
            anyhow::bail!("no job command configured (set [job] command or pass one after `--`)");
        }
        if self.job.max_output_bytes == 0 {
            anyhow::bail!("[job] max_output_bytes must be positive");
        }
        Ok(())
    }
}
