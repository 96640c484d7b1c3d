//! Ops sidecar - independent background timers
//!
//! - `backup` - copy data + state files into a timestamped directory (6h)
//! - `memory` - resident memory watchdog with optional reclaim hook (60s)
//! - `compress` - gzip day logs older than the retention window (daily)
//!
//! None of these coordinate with the pipeline or with each other. Every
//! failure is logged and absorbed; the next tick simply tries again.

pub mod backup;
pub mod compress;
pub mod memory;

pub use backup::{spawn_backup_task, BackupConfig};
pub use compress::spawn_compress_task;
pub use memory::{MemoryReclaimer, MemoryWatchdog};

use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Interval whose first tick is one full period from now
pub(crate) fn delayed_interval(period: Duration) -> Interval {
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}
