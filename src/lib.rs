//! # keywatch
//!
//! Live monitor for an append-only key file. When the finder appends a key,
//! the watcher debounces the burst, the pipeline re-reads the file, sums the
//! balance of every derived address (one batched lookup, cached for a TTL
//! while the record count is unchanged), and pushes the result to every
//! connected WebSocket viewer.
//!
//! ## Module Organization
//!
//! - `records` - parse `Private key: <hex>` lines
//! - `cache` - `Balance`, `Aggregate`, TTL + count validity
//! - `derive` - record → public address
//! - `lookup` - batched balance endpoint client
//! - `aggregator` - derive, look up, sum, persist
//! - `watcher` - stat polling + debounce state machine
//! - `hub` - subscriber registry and fan-out
//! - `pipeline` - ties the above together per trigger
//! - `metrics` - counters and memory sampling
//! - `server` - axum routes (`/ws`, `/health`, `/metrics`, `/status`)
//! - `ops` - backup, memory watchdog, log compression timers
//! - `logging` - stderr + day-partitioned file logger
//! - `config` / `error` - environment config and error taxonomy

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod derive;
pub mod error;
pub mod hub;
pub mod logging;
pub mod lookup;
pub mod metrics;
pub mod ops;
pub mod pipeline;
pub mod records;
pub mod server;
pub mod watcher;

// Re-export commonly used types
pub use aggregator::BalanceAggregator;
pub use cache::{Aggregate, AggregateCache, Balance};
pub use config::MonitorConfig;
pub use derive::{AddressDeriver, P2pkhDeriver};
pub use error::{MonitorError, MonitorResult};
pub use hub::{BroadcastHub, HubEvent, Notification, NotificationKind};
pub use lookup::{BalanceLookup, HttpBalanceLookup};
pub use metrics::MonitorMetrics;
pub use pipeline::{MonitorPipeline, Trigger};
pub use records::Record;
pub use watcher::{ChangeWatcher, FileChanged};
