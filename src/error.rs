//! Error taxonomy for the monitor
//!
//! - `FileAccess` - data/state file could not be read or written
//! - `ExternalLookup` - the balance endpoint failed, timed out, or returned garbage
//! - `Internal` - anything else reaching a boundary; carries a correlation id
//! - `Config` - invalid startup configuration

use rand::{distributions::Alphanumeric, Rng};
use std::path::PathBuf;
use thiserror::Error;

/// Length of generated correlation ids
const CORRELATION_ID_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("file access error on {path}: {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("external lookup failed: {0}")]
    ExternalLookup(String),

    #[error("internal error (ref {correlation_id}): {detail}")]
    Internal {
        correlation_id: String,
        detail: String,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type MonitorResult<T> = Result<T, MonitorError>;

impl MonitorError {
    pub fn file_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MonitorError::FileAccess {
            path: path.into(),
            source,
        }
    }

    /// Wrap an unexpected fault, assigning it a fresh correlation id.
    ///
    /// The full detail is logged here; callers should only surface the id.
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        let correlation_id = new_correlation_id();
        let detail = detail.to_string();
        log::error!("Error ID {}: {}", correlation_id, detail);
        MonitorError::Internal {
            correlation_id,
            detail,
        }
    }

    /// Correlation id if this is an `Internal` error
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            MonitorError::Internal { correlation_id, .. } => Some(correlation_id),
            _ => None,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, MonitorError::ExternalLookup(_))
    }
}

impl From<reqwest::Error> for MonitorError {
    fn from(err: reqwest::Error) -> Self {
        MonitorError::ExternalLookup(err.to_string())
    }
}

/// Short random alphanumeric id used to correlate a user-facing failure with its log line
pub fn new_correlation_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CORRELATION_ID_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_id_shape() {
        let id = new_correlation_id();
        assert_eq!(id.len(), CORRELATION_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_internal_carries_id() {
        let err = MonitorError::internal("boom");
        let id = err.correlation_id().expect("internal errors carry an id");
        assert!(err.to_string().contains(id));
        assert!(!err.is_external());
    }

    #[test]
    fn test_external_is_flagged() {
        let err = MonitorError::ExternalLookup("timeout".to_string());
        assert!(err.is_external());
        assert!(err.correlation_id().is_none());
    }
}
