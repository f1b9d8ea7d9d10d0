//! Configuration validation and the typed settings derived from it.

use crate::domain::error::IndexError;
use crate::domain::returns::MissingClosePolicy;
use crate::domain::selection::DEFAULT_INDEX_SIZE;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_CACHE_TTL_SECONDS: i64 = 3600;
pub const DEFAULT_LOG_LEVEL: &str = "info";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq)]
pub struct IndexConfig {
    pub index_size: usize,
    pub emit_inception_entries: bool,
    pub missing_close_policy: MissingClosePolicy,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_size: DEFAULT_INDEX_SIZE,
            emit_inception_entries: false,
            missing_close_policy: MissingClosePolicy::Exclude,
        }
    }
}

impl IndexConfig {
    /// Read and validate the `[index]` section.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, IndexError> {
        validate_index_config(config)?;
        let missing_close_policy = match config.get_string("index", "missing_close_policy") {
            Some(raw) => raw
                .parse()
                .map_err(|reason| invalid("index", "missing_close_policy", reason))?,
            None => MissingClosePolicy::default(),
        };
        Ok(Self {
            index_size: config.get_int("index", "size", DEFAULT_INDEX_SIZE as i64) as usize,
            emit_inception_entries: config.get_bool("index", "emit_inception_entries", false),
            missing_close_policy,
        })
    }
}

/// `[cache]` settings. The cache is in-process: it speeds up library callers
/// that keep one `IndexQueries` alive, while each CLI command starts cold.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_seconds: u64,
}

impl CacheConfig {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, IndexError> {
        validate_cache_config(config)?;
        Ok(Self {
            enabled: config.get_bool("cache", "enabled", true),
            ttl_seconds: config.get_int("cache", "ttl_seconds", DEFAULT_CACHE_TTL_SECONDS)
                as u64,
        })
    }
}

/// Check every section a command may read before any storage is touched.
pub fn validate_all(config: &dyn ConfigPort) -> Result<(), IndexError> {
    validate_index_config(config)?;
    validate_cache_config(config)?;
    validate_log_config(config)?;
    Ok(())
}

pub fn validate_index_config(config: &dyn ConfigPort) -> Result<(), IndexError> {
    validate_index_size(config)?;
    validate_bool(config, "index", "emit_inception_entries")?;
    if let Some(raw) = config.get_string("index", "missing_close_policy") {
        raw.parse::<MissingClosePolicy>()
            .map_err(|reason| invalid("index", "missing_close_policy", reason))?;
    }
    Ok(())
}

pub fn validate_cache_config(config: &dyn ConfigPort) -> Result<(), IndexError> {
    validate_bool(config, "cache", "enabled")?;
    if let Some(raw) = config.get_string("cache", "ttl_seconds") {
        match raw.trim().parse::<i64>() {
            Ok(v) if v > 0 => {}
            _ => {
                return Err(invalid(
                    "cache",
                    "ttl_seconds",
                    "ttl_seconds must be a positive integer".to_string(),
                ));
            }
        }
    }
    Ok(())
}

pub fn validate_log_config(config: &dyn ConfigPort) -> Result<(), IndexError> {
    if let Some(level) = config.get_string("log", "level") {
        if !LOG_LEVELS.contains(&level.trim().to_lowercase().as_str()) {
            return Err(invalid(
                "log",
                "level",
                format!("level must be one of {}", LOG_LEVELS.join(", ")),
            ));
        }
    }
    Ok(())
}

fn validate_index_size(config: &dyn ConfigPort) -> Result<(), IndexError> {
    if let Some(raw) = config.get_string("index", "size") {
        match raw.trim().parse::<i64>() {
            Ok(v) if v >= 1 => {}
            _ => {
                return Err(invalid(
                    "index",
                    "size",
                    "size must be an integer of at least 1".to_string(),
                ));
            }
        }
    }
    Ok(())
}

fn validate_bool(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), IndexError> {
    if let Some(raw) = config.get_string(section, key) {
        if !matches!(
            raw.trim().to_lowercase().as_str(),
            "true" | "false" | "yes" | "no" | "1" | "0"
        ) {
            return Err(invalid(section, key, format!("{key} must be true or false")));
        }
    }
    Ok(())
}

fn invalid(section: &str, key: &str, reason: String) -> IndexError {
    IndexError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason,
    }
}
