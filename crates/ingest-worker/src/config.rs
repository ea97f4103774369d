//! Worker configuration: a `config.json` next to the executable or in the
//! working directory, with environment variables taking precedence.

use std::env;
use std::path::PathBuf;

use serde_json::Value;
use tracing::warn;

use crate::error::WorkerError;

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Path to the UCI engine executable.
    pub engine_path: String,

    /// Upper bound on per-ply search time, in seconds.
    pub analysis_seconds_per_move: u64,

    /// Target depth for the depth-quorum condition.
    pub analysis_depth: u32,

    /// Parallel worker count.
    pub worker_count: usize,

    /// Name of the game ingestion queue.
    pub game_ingestion_queue: String,

    /// Static queue credential pair; the default provider chain is used
    /// when absent.
    pub storage_account_name: Option<String>,
    pub storage_account_key: Option<String>,

    /// Custom queue endpoint for local development (environment only).
    pub queue_endpoint_url: Option<String>,

    /// Puzzle store connection string.
    pub puzzle_db_connection_string: String,

    /// `Development` enables verbose diagnostics.
    pub environment: String,
}

impl WorkerConfig {
    pub fn load() -> Result<Self, WorkerError> {
        let file = read_config_file();
        let get = |key: &str| setting(file.as_ref(), key);

        let engine_path =
            get("EnginePath").unwrap_or_else(|| "/usr/local/bin/stockfish".to_string());
        let analysis_seconds_per_move = parse_setting(get("AnalysisSecondsPerMove"), 30)?;
        let analysis_depth = parse_setting(get("AnalysisDepth"), 20)?;
        let worker_count = parse_setting(get("WorkerCount"), num_cpus::get())?;

        let game_ingestion_queue = get("GameIngestionQueue")
            .ok_or_else(|| WorkerError::Config("GameIngestionQueue not set".to_string()))?;
        let puzzle_db_connection_string = get("PuzzleDbConnectionString")
            .ok_or_else(|| WorkerError::Config("PuzzleDbConnectionString not set".to_string()))?;

        Ok(Self {
            engine_path,
            analysis_seconds_per_move,
            analysis_depth,
            worker_count,
            game_ingestion_queue,
            storage_account_name: get("StorageAccountName"),
            storage_account_key: get("StorageAccountKey"),
            queue_endpoint_url: env::var("QueueEndpointUrl").ok(),
            puzzle_db_connection_string,
            environment: get("Environment").unwrap_or_default(),
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment == "Development"
    }

    pub fn analysis_options(&self) -> tactics::AnalysisOptions {
        tactics::AnalysisOptions {
            engine_path: self.engine_path.clone(),
            seconds_per_move: self.analysis_seconds_per_move,
            target_depth: self.analysis_depth,
        }
    }
}

/// Environment first, then the config file.
fn setting(file: Option<&Value>, key: &str) -> Option<String> {
    if let Ok(value) = env::var(key) {
        return Some(value);
    }
    file.and_then(|f| f.get(key)).and_then(value_to_string)
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_setting<T: std::str::FromStr>(raw: Option<String>, default: T) -> Result<T, WorkerError> {
    match raw {
        None => Ok(default),
        Some(s) => s
            .parse()
            .map_err(|_| WorkerError::Config(format!("unparseable numeric option: {s:?}"))),
    }
}

/// Look for `config.json` next to the executable and in the current working
/// directory. A missing file is fine; env vars can carry everything.
fn read_config_file() -> Option<Value> {
    for dir in candidate_dirs() {
        let path = dir.join("config.json");
        let Ok(contents) = std::fs::read_to_string(&path) else {
            continue;
        };
        match serde_json::from_str(&contents) {
            Ok(value) => return Some(value),
            Err(e) => warn!(path = %path.display(), error = %e, "ignoring malformed config file"),
        }
    }
    None
}

fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(exe) = env::current_exe() {
        if let Some(dir) = exe.parent() {
            dirs.push(dir.to_path_buf());
        }
    }
    if let Ok(cwd) = env::current_dir() {
        dirs.push(cwd);
    }
    dirs
}
