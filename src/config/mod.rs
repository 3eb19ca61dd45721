//! Configuration layering.
//!
//! Settings merge in increasing precedence: built-in defaults, a JSON
//! config file (`dbpulse.json` in the working directory unless an
//! explicit path is given), `DBPULSE_*` environment variables, then
//! whatever the CLI overlays on top.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{PulseError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "dbpulse.json";
pub const ENV_PREFIX: &str = "DBPULSE_";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database connection string, e.g. `sqlite://load.db`.
    pub dsn: Option<String>,

    /// Paths to annotated SQL files.
    pub sql: Vec<PathBuf>,

    /// Ignore errors during query and scenario execution.
    pub ignore: bool,

    /// Row limit for printed result tables. Zero disables the limit.
    pub limit: usize,

    /// Log verbosity: 0 = error .. 3 = debug.
    pub verbose: u8,

    /// Do not print non-error results.
    pub quiet: bool,

    /// Name of a predefined simulation to load instead of the
    /// configured SQL files.
    pub predefined: Option<String>,

    /// Schedule for the `work` command: unit name to interval seconds.
    pub schedule: BTreeMap<String, u64>,

    /// Worker threads for the task queue.
    pub workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dsn: None,
            sql: Vec::new(),
            ignore: false,
            limit: 50,
            verbose: 0,
            quiet: false,
            predefined: None,
            schedule: BTreeMap::new(),
            workers: 8,
        }
    }
}

impl Config {
    /// Load defaults, overlay the config file, then the environment.
    ///
    /// A missing file at the default path is tolerated; an explicitly
    /// requested path must exist and parse.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = Config::default();

        let explicit = config_path.is_some();
        let path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        match fs::read_to_string(&path) {
            Ok(text) => {
                let file_config: Config = serde_json::from_str(&text).map_err(|e| {
                    PulseError::Config(format!("could not parse '{}': {}", path.display(), e))
                })?;
                config = file_config;

                // Paths in a config file loaded from elsewhere are
                // relative to that file, not to the working directory.
                if explicit {
                    if let Some(parent) = path.parent() {
                        config.anchor_paths(parent);
                    }
                }
                debug!("Loaded configuration from '{}'", path.display());
            }
            Err(err) if !explicit => {
                debug!(
                    "No configuration file at '{}' ({}), using defaults",
                    path.display(),
                    err
                );
            }
            Err(err) => {
                return Err(PulseError::Config(format!(
                    "could not read '{}': {}",
                    path.display(),
                    err
                )));
            }
        }

        config.apply_env();
        Ok(config)
    }

    fn anchor_paths(&mut self, parent: &Path) {
        for sql_path in self.sql.iter_mut() {
            if sql_path.is_relative() {
                *sql_path = parent.join(&*sql_path);
            }
        }
    }

    /// Overlay `DBPULSE_*` environment variables.
    fn apply_env(&mut self) {
        if let Some(dsn) = env_var("DSN") {
            self.dsn = Some(dsn);
        }
        if let Some(sql) = env_var("SQL") {
            self.sql = sql.split(',').map(PathBuf::from).collect();
        }
        if let Some(ignore) = env_var("IGNORE") {
            self.ignore = is_truthy(&ignore);
        }
        if let Some(limit) = env_var("LIMIT") {
            if let Ok(limit) = limit.parse() {
                self.limit = limit;
            }
        }
        if let Some(quiet) = env_var("QUIET") {
            self.quiet = is_truthy(&quiet);
        }
        if let Some(verbose) = env_var("VERBOSE") {
            if let Ok(verbose) = verbose.parse() {
                self.verbose = verbose;
            }
        }
        if let Some(predefined) = env_var("PREDEFINED") {
            self.predefined = Some(predefined);
        }
        if let Some(workers) = env_var("WORKERS") {
            if let Ok(workers) = workers.parse() {
                self.workers = workers;
            }
        }
    }

    /// Read every configured SQL file. An empty file is a configuration
    /// error, not something to silently skip.
    pub fn sources(&self) -> Result<Vec<String>> {
        let mut texts = Vec::with_capacity(self.sql.len());
        for path in &self.sql {
            let text = fs::read_to_string(path).map_err(|e| {
                PulseError::Config(format!("could not read '{}': {}", path.display(), e))
            })?;
            if text.is_empty() {
                return Err(PulseError::SqlSourceEmpty(path.clone()));
            }
            texts.push(text);
        }
        Ok(texts)
    }

    /// Settings as `(key, value)` rows for listing.
    pub fn to_rows(&self) -> Vec<(String, String)> {
        let mut rows = vec![
            (
                "dsn".to_string(),
                self.dsn.clone().unwrap_or_else(|| "-".to_string()),
            ),
            (
                "sql".to_string(),
                self.sql
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            ("ignore".to_string(), self.ignore.to_string()),
            ("limit".to_string(), self.limit.to_string()),
            ("verbose".to_string(), self.verbose.to_string()),
            ("quiet".to_string(), self.quiet.to_string()),
            (
                "predefined".to_string(),
                self.predefined.clone().unwrap_or_else(|| "-".to_string()),
            ),
            ("workers".to_string(), self.workers.to_string()),
        ];
        for (name, every) in &self.schedule {
            rows.push((format!("schedule.{}", name), format!("every {}s", every)));
        }
        rows
    }
}

fn env_var(suffix: &str) -> Option<String> {
    env::var(format!("{}{}", ENV_PREFIX, suffix)).ok()
}

fn is_truthy(raw: &str) -> bool {
    matches!(raw, "1" | "true" | "TRUE" | "yes" | "on")
}
