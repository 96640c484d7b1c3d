//! Resident memory watchdog

use super::delayed_interval;
use crate::hub::{BroadcastHub, NotificationKind};
use crate::metrics::resident_memory_bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Optional hook to release memory when the watchdog trips
///
/// There is no collector to force in this runtime, so the binary installs
/// none; absence is a no-op.
pub trait MemoryReclaimer: Send + Sync {
    fn reclaim(&self);
}

pub struct MemoryWatchdog {
    limit_bytes: u64,
    hub: Arc<BroadcastHub>,
    reclaimer: Option<Arc<dyn MemoryReclaimer>>,
}

impl MemoryWatchdog {
    pub fn new(limit_bytes: u64, hub: Arc<BroadcastHub>) -> Self {
        Self {
            limit_bytes,
            hub,
            reclaimer: None,
        }
    }

    pub fn with_reclaimer(mut self, reclaimer: Arc<dyn MemoryReclaimer>) -> Self {
        self.reclaimer = Some(reclaimer);
        self
    }

    /// Compare one sample against the limit; returns true on breach
    pub fn check(&self, used_bytes: Option<u64>) -> bool {
        let Some(used) = used_bytes else {
            log::debug!("Memory usage unavailable on this platform");
            return false;
        };

        if used <= self.limit_bytes {
            return false;
        }

        log::warn!(
            "⚠️  Memory alert: {:.2}MB in use",
            used as f64 / 1024.0 / 1024.0
        );
        self.hub
            .broadcast_notification(NotificationKind::Warning, "High memory usage detected");

        if let Some(reclaimer) = &self.reclaimer {
            reclaimer.reclaim();
            log::info!("🧹 Memory reclaim hook executed");
        }
        true
    }

    pub fn spawn(self, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            log::info!(
                "⏰ Starting memory watchdog (interval: {}s, limit: {}MB)",
                period.as_secs(),
                self.limit_bytes / 1024 / 1024
            );
            let mut timer = delayed_interval(period);

            loop {
                timer.tick().await;
                self.check(resident_memory_bytes());
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::HubEvent;
    use crate::metrics::MonitorMetrics;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingReclaimer(AtomicUsize);

    impl MemoryReclaimer for CountingReclaimer {
        fn reclaim(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    const MB: u64 = 1024 * 1024;

    #[tokio::test]
    async fn test_breach_warns_and_reclaims() {
        let hub = Arc::new(BroadcastHub::new(8, Arc::new(MonitorMetrics::new())));
        let mut sub = hub.register();
        let reclaimer = Arc::new(CountingReclaimer(AtomicUsize::new(0)));
        let watchdog = MemoryWatchdog::new(500 * MB, hub).with_reclaimer(reclaimer.clone());

        assert!(watchdog.check(Some(501 * MB)));
        assert_eq!(reclaimer.0.load(Ordering::SeqCst), 1);

        match sub.events.recv().await {
            Some(HubEvent::Notification(n)) => {
                assert_eq!(n.kind, NotificationKind::Warning);
                assert_eq!(n.message, "High memory usage detected");
            }
            other => panic!("expected warning notification, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_under_limit_is_quiet() {
        let hub = Arc::new(BroadcastHub::new(8, Arc::new(MonitorMetrics::new())));
        let mut sub = hub.register();
        let watchdog = MemoryWatchdog::new(500 * MB, hub);

        assert!(!watchdog.check(Some(500 * MB)));
        assert!(!watchdog.check(None));
        assert!(sub.events.try_recv().is_err());
    }

    #[test]
    fn test_breach_without_reclaimer_is_fine() {
        let hub = Arc::new(BroadcastHub::new(8, Arc::new(MonitorMetrics::new())));
        let watchdog = MemoryWatchdog::new(MB, hub);
        assert!(watchdog.check(Some(2 * MB)));
    }
}
