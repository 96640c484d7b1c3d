//! Record reader for the watched key file
//!
//! One record per line: any line containing `Private key: <hex>`. Everything
//! else is ignored. The file is re-parsed in full on every read.

use regex::Regex;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::OnceLock;

/// A single discovered private key, as written by the finder (hex, unvalidated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Record(String);

impl Record {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn record_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"Private key: ([a-fA-F0-9]+)").expect("record pattern is a valid regex")
    })
}

/// Extract records from file content, preserving line order
pub fn parse_records(content: &str) -> Vec<Record> {
    let pattern = record_pattern();
    content
        .lines()
        .filter_map(|line| pattern.captures(line))
        .filter_map(|caps| caps.get(1))
        .map(|m| Record::new(m.as_str()))
        .collect()
}

/// Read and parse the data file
///
/// Never fails: a missing file and other I/O errors are logged (separately)
/// and yield an empty set.
pub async fn read_records(path: &Path) -> Vec<Record> {
    match tokio::fs::read(path).await {
        Ok(bytes) => parse_records(&String::from_utf8_lossy(&bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::warn!("📭 Data file not found: {}", path.display());
            Vec::new()
        }
        Err(e) => {
            log::error!("❌ Failed to read data file {}: {}", path.display(), e);
            Vec::new()
        }
    }
}
