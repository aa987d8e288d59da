use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "memlayout";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Parse slots available to one ingestion run when nothing else is configured.
pub const DEFAULT_PARSE_CONCURRENCY: usize = 5;

const DB_FILE_NAME: &str = "memlayout.db";
const ENV_PARSE_CONCURRENCY: &str = "MEMLAYOUT_PARSE_CONCURRENCY";
const ENV_DATABASE: &str = "MEMLAYOUT_DB";

/// Get the application data directory.
/// ~/.memlayout/ when a home directory is known, ./.memlayout/ otherwise.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".memlayout")
}

/// Default on-disk location of the layout database
pub fn default_database_path() -> PathBuf {
    app_data_dir().join(DB_FILE_NAME)
}

/// Log filter used when `RUST_LOG` is not set
pub fn default_log_filter() -> &'static str {
    "info,memlayout_lib=info"
}

/// Runtime knobs for one ingestion process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// Upper bound on concurrently running parse operations.
    pub parse_concurrency: usize,
    /// SQLite database receiving the decomposed graph.
    pub database_path: PathBuf,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            parse_concurrency: DEFAULT_PARSE_CONCURRENCY,
            database_path: default_database_path(),
        }
    }
}

impl IngestConfig {
    /// Defaults overridden by `MEMLAYOUT_PARSE_CONCURRENCY` and `MEMLAYOUT_DB`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_PARSE_CONCURRENCY) {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.parse_concurrency = n,
                _ => tracing::warn!(
                    value = %raw,
                    default = DEFAULT_PARSE_CONCURRENCY,
                    "Ignoring invalid {ENV_PARSE_CONCURRENCY}"
                ),
            }
        }

        if let Some(path) = lookup(ENV_DATABASE) {
            if !path.trim().is_empty() {
                config.database_path = PathBuf::from(path);
            }
        }

        config
    }
}
