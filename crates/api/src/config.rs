use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use cra_core::manager::{DocumentSettings, DEFAULT_MAX_TAGS, DEFAULT_TRASH_RETENTION_DAYS};

const MIB: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server host to bind to.
    pub host: String,
    /// Server port to bind to.
    pub port: u16,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Maximum database connections in the pool.
    pub db_max_connections: u32,
    /// Minimum database connections in the pool.
    pub db_min_connections: u32,
    /// Secret used to verify HS256 bearer tokens.
    pub jwt_secret: String,
    /// Event bus channel capacity.
    pub event_bus_capacity: usize,
    /// Log level (e.g., "info", "debug", "trace").
    pub log_level: String,
    /// Directory holding uploaded file bytes.
    pub storage_root: PathBuf,
    /// Days a trashed document stays restorable.
    pub trash_retention_days: i64,
    /// Seconds between scheduled trash sweeps; 0 disables the sweeper.
    pub trash_sweep_interval_secs: u64,
    /// Per-file upload cap in bytes.
    pub max_upload_bytes: usize,
    /// Files accepted in one upload request.
    pub max_files_per_upload: usize,
    /// Tags a document may carry.
    pub max_tags: usize,
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

impl AppConfig {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let config = Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", 3030)?,
            database_url: lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 20)?,
            db_min_connections: parse_or(&lookup, "DB_MIN_CONNECTIONS", 5)?,
            jwt_secret: lookup("JWT_SECRET")
                .unwrap_or_else(|| "dev-secret-change-me-in-production".to_string()),
            event_bus_capacity: parse_or(&lookup, "EVENT_BUS_CAPACITY", 1024)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            storage_root: lookup("STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./uploads")),
            trash_retention_days: parse_or(
                &lookup,
                "TRASH_RETENTION_DAYS",
                DEFAULT_TRASH_RETENTION_DAYS,
            )?,
            trash_sweep_interval_secs: parse_or(&lookup, "TRASH_SWEEP_INTERVAL_SECS", 3600)?,
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", 50 * MIB)?,
            max_files_per_upload: parse_or(&lookup, "MAX_FILES_PER_UPLOAD", 5)?,
            max_tags: parse_or(&lookup, "MAX_TAGS", DEFAULT_MAX_TAGS)?,
        };

        if config.trash_retention_days < 1 {
            return Err(ConfigError::Invalid {
                key: "TRASH_RETENTION_DAYS",
                value: config.trash_retention_days.to_string(),
            });
        }
        if config.max_files_per_upload == 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_FILES_PER_UPLOAD",
                value: "0".to_string(),
            });
        }
        Ok(config)
    }

    /// Build the socket address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn document_settings(&self) -> DocumentSettings {
        DocumentSettings {
            trash_retention: chrono::Duration::days(self.trash_retention_days),
            max_tags: self.max_tags,
        }
    }

    /// Largest request body the upload route accepts.
    pub fn upload_body_limit(&self) -> usize {
        self.max_upload_bytes
            .saturating_mul(self.max_files_per_upload)
            .saturating_add(MIB)
    }

    pub fn sweep_interval(&self) -> Option<std::time::Duration> {
        (self.trash_sweep_interval_secs > 0)
            .then(|| std::time::Duration::from_secs(self.trash_sweep_interval_secs))
    }
}
