//! Shared fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use keywatch::{
    AddressDeriver, BalanceAggregator, BalanceLookup, BroadcastHub, HubEvent, MonitorError,
    MonitorMetrics, MonitorPipeline, MonitorResult, Record,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Address == record value, so tests can key balances by record
pub struct EchoDeriver;

impl AddressDeriver for EchoDeriver {
    fn derive(&self, record: &Record) -> Option<String> {
        Some(record.as_str().to_string())
    }
}

/// In-memory balance endpoint that counts calls and can be told to fail
pub struct StubLookup {
    balances: HashMap<String, u64>,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl StubLookup {
    pub fn new(pairs: &[(&str, u64)]) -> Self {
        Self {
            balances: pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl BalanceLookup for StubLookup {
    async fn fetch_balances(&self, addresses: &[String]) -> MonitorResult<HashMap<String, u64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(MonitorError::ExternalLookup("503 Service Unavailable".to_string()));
        }
        Ok(addresses
            .iter()
            .filter_map(|a| self.balances.get(a).map(|v| (a.clone(), *v)))
            .collect())
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub lookup: Arc<StubLookup>,
    pub metrics: Arc<MonitorMetrics>,
    pub hub: Arc<BroadcastHub>,
    pub pipeline: Arc<MonitorPipeline>,
}

impl Harness {
    pub fn new(balances: &[(&str, u64)]) -> Self {
        Self::with_ttl(balances, Duration::from_secs(60))
    }

    pub fn with_ttl(balances: &[(&str, u64)], ttl: Duration) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let lookup = Arc::new(StubLookup::new(balances));
        let metrics = Arc::new(MonitorMetrics::new());
        let hub = Arc::new(BroadcastHub::new(64, metrics.clone()));
        let aggregator = BalanceAggregator::new(
            Arc::new(EchoDeriver),
            lookup.clone(),
            dir.path().join("balance.txt"),
        );
        let pipeline = Arc::new(MonitorPipeline::new(
            dir.path().join("keys.txt"),
            ttl,
            aggregator,
            hub.clone(),
            metrics.clone(),
        ));

        Self {
            dir,
            lookup,
            metrics,
            hub,
            pipeline,
        }
    }

    pub fn data_file(&self) -> PathBuf {
        self.dir.path().join("keys.txt")
    }

    pub fn write_data(&self, content: &str) {
        std::fs::write(self.data_file(), content).unwrap();
    }

    pub fn read_state(&self) -> Option<String> {
        std::fs::read_to_string(self.dir.path().join("balance.txt")).ok()
    }
}

pub fn drain(rx: &mut mpsc::Receiver<HubEvent>) -> Vec<HubEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
