//! Process-wide counters and memory sampling for the status endpoints

use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

/// Counters shared by the pipeline, hub, and HTTP surface
///
/// All fields are monotonic except `records_found`, which mirrors the last
/// record count the pipeline observed.
#[derive(Debug)]
pub struct MonitorMetrics {
    started: Instant,
    records_found: AtomicUsize,
    file_changes: AtomicU64,
    pipeline_runs: AtomicU64,
    cache_hits: AtomicU64,
    recomputes: AtomicU64,
    lookup_failures: AtomicU64,
    notifications_sent: AtomicU64,
    subscribers_connected: AtomicU64,
    subscribers_disconnected: AtomicU64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub records_found: usize,
    pub file_changes: u64,
    pub pipeline_runs: u64,
    pub cache_hits: u64,
    pub recomputes: u64,
    pub lookup_failures: u64,
    pub notifications_sent: u64,
    pub subscribers_connected: u64,
    pub subscribers_disconnected: u64,
    pub active_subscribers: u64,
    pub memory_used: Option<u64>,
    pub uptime: u64,
}

impl MonitorMetrics {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            records_found: AtomicUsize::new(0),
            file_changes: AtomicU64::new(0),
            pipeline_runs: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            recomputes: AtomicU64::new(0),
            lookup_failures: AtomicU64::new(0),
            notifications_sent: AtomicU64::new(0),
            subscribers_connected: AtomicU64::new(0),
            subscribers_disconnected: AtomicU64::new(0),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub fn set_records_found(&self, count: usize) {
        self.records_found.store(count, Ordering::Relaxed);
    }

    pub fn record_file_change(&self) {
        self.file_changes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pipeline_run(&self) {
        self.pipeline_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_recompute(&self) {
        self.recomputes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lookup_failure(&self) {
        self.lookup_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_notification(&self) {
        self.notifications_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connect(&self) {
        self.subscribers_connected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disconnect(&self) {
        self.subscribers_disconnected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn recomputes(&self) -> u64 {
        self.recomputes.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let connected = self.subscribers_connected.load(Ordering::Relaxed);
        let disconnected = self.subscribers_disconnected.load(Ordering::Relaxed);
        MetricsSnapshot {
            records_found: self.records_found.load(Ordering::Relaxed),
            file_changes: self.file_changes.load(Ordering::Relaxed),
            pipeline_runs: self.pipeline_runs.load(Ordering::Relaxed),
            cache_hits: self.cache_hits(),
            recomputes: self.recomputes(),
            lookup_failures: self.lookup_failures.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            subscribers_connected: connected,
            subscribers_disconnected: disconnected,
            active_subscribers: connected.saturating_sub(disconnected),
            memory_used: resident_memory_bytes(),
            uptime: self.uptime_secs(),
        }
    }
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Resident set size of this process in bytes (Linux only)
///
/// Read from the `VmRSS:` line of `/proc/self/status`, which the kernel
/// reports in kB regardless of page size.
pub fn resident_memory_bytes() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        parse_vm_rss(&status)
    }

    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_vm_rss(status: &str) -> Option<u64> {
    let line = status.lines().find(|line| line.starts_with("VmRSS:"))?;
    let kb: u64 = line["VmRSS:".len()..]
        .split_whitespace()
        .next()?
        .parse()
        .ok()?;
    Some(kb * 1024)
}

/// Whole megabytes, for human-readable status output
pub fn format_mb(bytes: u64) -> String {
    format!("{}MB", (bytes as f64 / 1024.0 / 1024.0).round() as u64)
}
