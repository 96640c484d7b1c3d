//! Monitor configuration from environment variables
//!
//! Every setting has a default; unparsable values fall back to it.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the monitor runtime
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Append-only file the key finder writes to
    pub data_file: PathBuf,

    /// File overwritten with the latest aggregate balance
    pub state_file: PathBuf,

    /// Directory holding `app-YYYY-MM-DD.log` files
    pub log_dir: PathBuf,

    /// Root directory for timestamped backups
    pub backup_dir: PathBuf,

    pub host: String,
    pub port: u16,

    /// Balance endpoint (queried with `?active=addr1,addr2,...`)
    pub lookup_url: String,
    pub lookup_timeout: Duration,

    pub cache_ttl: Duration,

    /// Quiet period before a burst of file writes fires one pipeline run
    pub debounce: Duration,

    /// How often the watcher stats the data file
    pub poll_interval: Duration,

    pub backup_interval: Duration,
    pub memory_check_interval: Duration,
    pub memory_limit_bytes: u64,
    pub compress_interval: Duration,
    pub log_retention: Duration,
}

impl MonitorConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `KEYWATCH_DATA_FILE` (default: keys.txt)
    /// - `KEYWATCH_STATE_FILE` (default: balance.txt)
    /// - `KEYWATCH_LOG_DIR` (default: logs)
    /// - `KEYWATCH_BACKUP_DIR` (default: backups)
    /// - `KEYWATCH_HOST` / `KEYWATCH_PORT` (default: 0.0.0.0 / 3000)
    /// - `KEYWATCH_LOOKUP_URL` (default: https://blockchain.info/balance)
    /// - `KEYWATCH_LOOKUP_TIMEOUT_SECS` (default: 10)
    /// - `KEYWATCH_CACHE_TTL_SECS` (default: 60)
    /// - `KEYWATCH_DEBOUNCE_MS` (default: 1000)
    /// - `KEYWATCH_POLL_INTERVAL_MS` (default: 250)
    /// - `KEYWATCH_BACKUP_INTERVAL_SECS` (default: 21600)
    /// - `KEYWATCH_MEMORY_CHECK_SECS` (default: 60)
    /// - `KEYWATCH_MEMORY_LIMIT_MB` (default: 500)
    /// - `KEYWATCH_COMPRESS_INTERVAL_SECS` (default: 86400)
    /// - `KEYWATCH_LOG_RETENTION_DAYS` (default: 7)
    pub fn from_env() -> Self {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_source<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let number = |key: &str, default: u64| {
            lookup(key)
                .and_then(|s| s.trim().parse::<u64>().ok())
                .unwrap_or(default)
        };

        Self {
            data_file: PathBuf::from(string("KEYWATCH_DATA_FILE", "keys.txt")),
            state_file: PathBuf::from(string("KEYWATCH_STATE_FILE", "balance.txt")),
            log_dir: PathBuf::from(string("KEYWATCH_LOG_DIR", "logs")),
            backup_dir: PathBuf::from(string("KEYWATCH_BACKUP_DIR", "backups")),

            host: string("KEYWATCH_HOST", "0.0.0.0"),
            port: lookup("KEYWATCH_PORT")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(3000),

            lookup_url: string("KEYWATCH_LOOKUP_URL", "https://blockchain.info/balance"),
            lookup_timeout: Duration::from_secs(number("KEYWATCH_LOOKUP_TIMEOUT_SECS", 10)),

            cache_ttl: Duration::from_secs(number("KEYWATCH_CACHE_TTL_SECS", 60)),
            debounce: Duration::from_millis(number("KEYWATCH_DEBOUNCE_MS", 1_000)),
            poll_interval: Duration::from_millis(number("KEYWATCH_POLL_INTERVAL_MS", 250)),

            backup_interval: Duration::from_secs(number("KEYWATCH_BACKUP_INTERVAL_SECS", 6 * 60 * 60)),
            memory_check_interval: Duration::from_secs(number("KEYWATCH_MEMORY_CHECK_SECS", 60)),
            memory_limit_bytes: number("KEYWATCH_MEMORY_LIMIT_MB", 500) * 1024 * 1024,
            compress_interval: Duration::from_secs(number("KEYWATCH_COMPRESS_INTERVAL_SECS", 24 * 60 * 60)),
            log_retention: Duration::from_secs(number("KEYWATCH_LOG_RETENTION_DAYS", 7) * 24 * 60 * 60),
        }
    }

    /// `host:port` string for the HTTP listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::from_source(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        // Test: Defaults when nothing is set
        let config = MonitorConfig::default();

        assert_eq!(config.data_file, PathBuf::from("keys.txt"));
        assert_eq!(config.state_file, PathBuf::from("balance.txt"));
        assert_eq!(config.port, 3000);
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.debounce, Duration::from_millis(1_000));
        assert_eq!(config.backup_interval, Duration::from_secs(21_600));
        assert_eq!(config.memory_limit_bytes, 500 * 1024 * 1024);
        assert_eq!(config.log_retention, Duration::from_secs(7 * 86_400));
        assert_eq!(config.listen_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn test_custom_config() {
        // Test: Values from the source override defaults, garbage falls back
        let vars: HashMap<&str, &str> = [
            ("KEYWATCH_DATA_FILE", "/tmp/found.txt"),
            ("KEYWATCH_PORT", "8081"),
            ("KEYWATCH_DEBOUNCE_MS", "250"),
            ("KEYWATCH_CACHE_TTL_SECS", "not-a-number"),
            ("KEYWATCH_MEMORY_LIMIT_MB", "64"),
        ]
        .into_iter()
        .collect();

        let config = MonitorConfig::from_source(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.data_file, PathBuf::from("/tmp/found.txt"));
        assert_eq!(config.port, 8081);
        assert_eq!(config.debounce, Duration::from_millis(250));
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.memory_limit_bytes, 64 * 1024 * 1024);
    }
}
