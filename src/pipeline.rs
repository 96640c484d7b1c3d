//! Monitor pipeline - change detection → cache → aggregation → broadcast
//!
//! ## Flow
//!
//! ```text
//! FileChanged / SubscriberJoined
//!     ↓
//! read_records()            (full re-parse of the data file)
//!     ↓
//! AggregateCache::lookup()  (valid iff age < TTL and count unchanged)
//!     ↓ miss
//! BalanceAggregator::recompute()  → AggregateCache::set()
//!     ↓
//! BroadcastHub
//! ```
//!
//! ## Concurrency
//!
//! The cache sits behind a mutex that is only held for pure state
//! transitions, never across the balance lookup. Two overlapping runs (a
//! file change and a new subscriber) may both miss and both recompute; the
//! cache is always replaced whole, so the worst case is one redundant call.

use crate::aggregator::BalanceAggregator;
use crate::cache::{Aggregate, AggregateCache};
use crate::error::{MonitorError, MonitorResult};
use crate::hub::{BroadcastHub, HubEvent, NotificationKind, SubscriberId};
use crate::metrics::MonitorMetrics;
use crate::records::{read_records, Record};
use crate::watcher::FileChanged;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;

/// What caused a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    FileChanged,
    SubscriberJoined(SubscriberId),
}

pub struct MonitorPipeline {
    data_file: PathBuf,
    cache: Mutex<AggregateCache>,
    aggregator: BalanceAggregator,
    hub: Arc<BroadcastHub>,
    metrics: Arc<MonitorMetrics>,
}

impl MonitorPipeline {
    pub fn new(
        data_file: impl Into<PathBuf>,
        cache_ttl: Duration,
        aggregator: BalanceAggregator,
        hub: Arc<BroadcastHub>,
        metrics: Arc<MonitorMetrics>,
    ) -> Self {
        Self {
            data_file: data_file.into(),
            cache: Mutex::new(AggregateCache::new(cache_ttl)),
            aggregator,
            hub,
            metrics,
        }
    }

    pub fn data_file(&self) -> &Path {
        &self.data_file
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn metrics(&self) -> &Arc<MonitorMetrics> {
        &self.metrics
    }

    /// Last cached aggregate, valid or not
    pub fn cached(&self) -> Option<Aggregate> {
        self.cache_lock().get().cloned()
    }

    pub async fn read_records(&self) -> Vec<Record> {
        read_records(&self.data_file).await
    }

    /// Cached aggregate if still valid for `records`, otherwise recompute and cache
    pub async fn aggregate_for(&self, records: &[Record]) -> MonitorResult<Aggregate> {
        let hit = self.cache_lock().lookup(records.len());
        if let Some(aggregate) = hit {
            self.metrics.record_cache_hit();
            log::info!("📦 Using cached balance: {} BTC", aggregate.value);
            return Ok(aggregate);
        }

        self.metrics.record_recompute();
        match self.aggregator.recompute(records).await {
            Ok(aggregate) => {
                self.cache_lock().set(aggregate.clone());
                Ok(aggregate)
            }
            Err(e) => {
                if e.is_external() {
                    self.metrics.record_lookup_failure();
                }
                Err(e)
            }
        }
    }

    /// Read the data file and return its aggregate (cached or fresh)
    pub async fn current_aggregate(&self) -> MonitorResult<Aggregate> {
        let records = self.read_records().await;
        self.aggregate_for(&records).await
    }

    /// Handle one debounced change of the data file
    pub async fn on_file_changed(&self) -> MonitorResult<Aggregate> {
        self.metrics.record_pipeline_run();

        let records = self.read_records().await;
        let count = records.len();
        self.metrics.set_records_found(count);

        if count > 0 {
            self.hub.broadcast_notification(
                NotificationKind::Success,
                format!("New wallet found! Total: {}", count),
            );
        }
        self.hub.broadcast_count(count);

        let aggregate = self
            .aggregate_for(&records)
            .await
            .map_err(|e| self.report_failure(e))?;
        self.hub.broadcast_aggregate(aggregate.value);

        log::info!("🔄 Data file updated: {} keys found", count);
        Ok(aggregate)
    }

    /// Handle a newly connected subscriber
    ///
    /// The count goes to the new subscriber only; the aggregate is global and
    /// is broadcast to everyone.
    pub async fn on_subscriber_joined(&self, id: SubscriberId) -> MonitorResult<Aggregate> {
        self.metrics.record_pipeline_run();

        let records = self.read_records().await;
        self.metrics.set_records_found(records.len());
        self.hub.send_to(id, HubEvent::RecordsFound(records.len()));

        let aggregate = self
            .aggregate_for(&records)
            .await
            .map_err(|e| self.report_failure(e))?;
        self.hub.broadcast_aggregate(aggregate.value);
        Ok(aggregate)
    }

    /// Run one trigger, containing panics at this boundary
    ///
    /// A panic becomes an `Internal` error with a correlation id; subscribers
    /// only see the id.
    pub async fn dispatch(&self, trigger: Trigger) -> MonitorResult<Aggregate> {
        let run = async {
            match trigger {
                Trigger::FileChanged => self.on_file_changed().await,
                Trigger::SubscriberJoined(id) => self.on_subscriber_joined(id).await,
            }
        };

        match AssertUnwindSafe(run).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let err = MonitorError::internal(format!(
                    "pipeline panicked handling {:?}: {}",
                    trigger,
                    panic_message(&*panic)
                ));
                if let Some(id) = err.correlation_id() {
                    self.hub.broadcast_notification(
                        NotificationKind::Error,
                        format!("Internal error (ref {})", id),
                    );
                }
                Err(err)
            }
        }
    }

    /// Consume debounced file-change signals until the watcher goes away
    pub async fn run(self: Arc<Self>, mut signals: mpsc::Receiver<FileChanged>) {
        log::info!("🚀 Pipeline running for {}", self.data_file.display());

        while let Some(FileChanged) = signals.recv().await {
            self.metrics.record_file_change();
            if let Err(e) = self.dispatch(Trigger::FileChanged).await {
                log::debug!("File change run ended with error: {}", e);
            }
        }

        log::info!("Pipeline stopped: watcher channel closed");
    }

    fn report_failure(&self, err: MonitorError) -> MonitorError {
        log::error!("❌ Error processing update: {}", err);
        self.hub
            .broadcast_notification(NotificationKind::Error, "Error processing update");
        err
    }

    fn cache_lock(&self) -> MutexGuard<'_, AggregateCache> {
        // The cache is only ever replaced whole, so a poisoned guard is still consistent
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Best-effort text of a caught panic payload
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
