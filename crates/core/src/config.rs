use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_parse<T: std::str::FromStr>(profile: &str, key: &str) -> Option<T> {
    let raw = profiled_env_opt(profile, key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key = key, value = %raw, "ignoring unparsable env override");
            None
        }
    }
}

// ── Top-level config ──────────────────────────────────────────

/// Full configuration for the matchd server.
///
/// Built from an optional TOML file, then overridden by `MATCHD_SECTION_KEY`
/// environment variables (optionally prefixed by the `MATCHD_PROFILE` name).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    #[serde(default)]
    pub profile: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub matching: MatchConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

impl Config {
    /// Parse config from a TOML string, then apply env overrides and validate.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Build config from defaults plus environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load `.env`, then either the given TOML file or pure env config.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        load_dotenv();
        match path {
            Some(p) => Self::from_file(p),
            None => Self::from_env(),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// Convention: `MATCHD_SECTION_KEY` overrides `section.key`, and when
    /// `MATCHD_PROFILE` is set (e.g. `TEST`), `TEST_MATCHD_SECTION_KEY` wins.
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Some(p) = env_opt("MATCHD_PROFILE") {
            self.profile = p.to_uppercase();
        }
        let p = self.profile.clone();
        let p = p.as_str();

        if let Some(v) = profiled_env_opt(p, "MATCHD_SERVER_HOST") {
            self.server.host = v;
        }
        if let Some(v) = profiled_env_parse(p, "MATCHD_SERVER_PORT") {
            self.server.port = v;
        }
        if let Some(v) = profiled_env_parse(p, "MATCHD_SCHEDULER_WORKER_LIMIT") {
            self.scheduler.worker_limit = v;
        }
        if let Some(v) = profiled_env_parse(p, "MATCHD_SCHEDULER_POLL_INTERVAL_MS") {
            self.scheduler.poll_interval_ms = v;
        }
        if let Some(v) = profiled_env_opt(p, "MATCHD_MATCHING_EXECUTABLE_BIN") {
            self.matching.executable_bin = v;
        }
        if let Some(v) = profiled_env_opt(p, "MATCHD_MATCHING_SERVER_DIR") {
            self.matching.server_dir = PathBuf::from(v);
        }
        if let Some(v) = profiled_env_opt(p, "MATCHD_BATCH_ENABLED") {
            self.batch.enabled = v == "true" || v == "1";
        }
        if let Some(v) = profiled_env_opt(p, "MATCHD_BATCH_PATH") {
            self.batch.path = Some(PathBuf::from(v));
        }
        if let Some(v) = profiled_env_parse(p, "MATCHD_BATCH_MAX_ENTRIES") {
            self.batch.max_entries = v;
        }
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.worker_limit == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.worker_limit must be at least 1".into(),
            ));
        }
        if self.scheduler.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.poll_interval_ms must be at least 1".into(),
            ));
        }
        if self.batch.enabled && self.batch.path.is_none() {
            return Err(ConfigError::Invalid(
                "batch.path is required when batch.enabled = true".into(),
            ));
        }
        Ok(())
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:      {}:{}", self.server.host, self.server.port);
        tracing::info!(
            "  scheduler:   worker_limit={}, poll_interval={}ms",
            self.scheduler.worker_limit,
            self.scheduler.poll_interval_ms
        );
        tracing::info!(
            "  matching:    bin={}, server_dir={}",
            if self.matching.executable_bin.is_empty() { "(PATH)" } else { &self.matching.executable_bin },
            self.matching.server_dir.display()
        );
        tracing::info!(
            "  batch:       enabled={}, path={}, max_entries={}",
            self.batch.enabled,
            self.batch.path.as_deref().map(|p| p.display().to_string()).unwrap_or_else(|| "(none)".into()),
            self.batch.max_entries
        );
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    42424
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ── Scheduler ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Maximum number of jobs executing at once.
    #[serde(default = "default_worker_limit")]
    pub worker_limit: usize,
    /// Interval between process polls / cancellation checks.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_worker_limit() -> usize { 8 }
fn default_poll_interval_ms() -> u64 { 500 }

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            worker_limit: default_worker_limit(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

// ── MATCH install ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Directory holding `calcsfh`, `zcombine`, `sspcombine`. Empty = resolve via PATH.
    #[serde(default)]
    pub executable_bin: String,
    /// Directory holding `scripts/` with the post-processing shell scripts.
    #[serde(default = "default_server_dir")]
    pub server_dir: PathBuf,
}

fn default_server_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            executable_bin: String::new(),
            server_dir: default_server_dir(),
        }
    }
}

impl MatchConfig {
    /// Resolve a MATCH tool name against the configured binary directory.
    pub fn tool(&self, name: &str) -> String {
        if self.executable_bin.is_empty() {
            name.to_string()
        } else {
            Path::new(&self.executable_bin).join(name).display().to_string()
        }
    }

    /// Path of a post-processing script under `<server_dir>/scripts/`.
    pub fn script(&self, name: &str) -> PathBuf {
        self.server_dir.join("scripts").join(name)
    }
}

// ── Batch submission ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Hand `-group=` jobs to the batch file instead of running them locally.
    #[serde(default)]
    pub enabled: bool,
    /// Batch configuration file receiving one line per submitted job.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Upper bound on entries in the batch file.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_max_entries() -> usize { 3000 }

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: None,
            max_entries: default_max_entries(),
        }
    }
}
