//! Broadcast hub for live subscribers
//!
//! Each subscriber gets its own bounded queue. Delivery uses `try_send`, so
//! a slow subscriber only loses its own events and a closed one is dropped
//! from the registry; neither can hold up the others.

use crate::cache::Balance;
use crate::metrics::MonitorMetrics;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, error::TrySendError};

pub type SubscriberId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Info,
    Warning,
    Error,
}

/// Ephemeral message shown to every viewer; never persisted or retried
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Wire event pushed to subscribers as `{"event": ..., "data": ...}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum HubEvent {
    AggregateUpdated(Balance),
    RecordsFound(usize),
    Notification(Notification),
}

/// Receiving half handed to a connection when it registers
pub struct Subscription {
    pub id: SubscriberId,
    pub events: mpsc::Receiver<HubEvent>,
}

pub struct BroadcastHub {
    subscribers: Mutex<HashMap<SubscriberId, mpsc::Sender<HubEvent>>>,
    next_id: AtomicU64,
    queue_size: usize,
    metrics: Arc<MonitorMetrics>,
}

impl BroadcastHub {
    pub fn new(queue_size: usize, metrics: Arc<MonitorMetrics>) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            queue_size: queue_size.max(1),
            metrics,
        }
    }

    pub fn register(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.queue_size);
        self.lock().insert(id, tx);
        self.metrics.record_connect();
        log::info!("🔌 Subscriber {} connected", id);
        Subscription { id, events: rx }
    }

    pub fn unregister(&self, id: SubscriberId) {
        if self.lock().remove(&id).is_some() {
            self.metrics.record_disconnect();
            log::info!("👋 Subscriber {} disconnected", id);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    /// Push to every subscriber, returning how many accepted the event
    pub fn broadcast(&self, event: HubEvent) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();
        {
            let subscribers = self.lock();
            for (id, tx) in subscribers.iter() {
                match tx.try_send(event.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        log::warn!("⚠️  Subscriber {} queue full, dropping event", id);
                    }
                    Err(TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }
        for id in closed {
            self.unregister(id);
        }
        delivered
    }

    /// Push to a single subscriber
    pub fn send_to(&self, id: SubscriberId, event: HubEvent) -> bool {
        let result = match self.lock().get(&id) {
            Some(tx) => tx.try_send(event),
            None => return false,
        };
        match result {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::warn!("⚠️  Subscriber {} queue full, dropping event", id);
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.unregister(id);
                false
            }
        }
    }

    pub fn broadcast_aggregate(&self, value: Balance) -> usize {
        self.broadcast(HubEvent::AggregateUpdated(value))
    }

    pub fn broadcast_count(&self, count: usize) -> usize {
        self.broadcast(HubEvent::RecordsFound(count))
    }

    pub fn broadcast_notification(&self, kind: NotificationKind, message: impl Into<String>) -> usize {
        self.metrics.record_notification();
        self.broadcast(HubEvent::Notification(Notification::new(kind, message)))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SubscriberId, mpsc::Sender<HubEvent>>> {
        // Registry holds no invariants a panicking holder could break
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
