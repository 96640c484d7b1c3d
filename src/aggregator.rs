//! Balance aggregator
//!
//! Turns a record set into one `Aggregate`:
//! 1. Derive an address per record
//! 2. One batched balance lookup for all addresses
//! 3. Sum returned subunits (absent addresses contribute zero)
//! 4. Convert to a two-decimal balance (half-up)
//! 5. Overwrite the state file with the decimal value
//!
//! Either all steps succeed or an error is returned; nothing partial is
//! written. Caching the result is the caller's job.

use crate::cache::{Aggregate, Balance};
use crate::derive::AddressDeriver;
use crate::error::{MonitorError, MonitorResult};
use crate::lookup::BalanceLookup;
use crate::records::Record;
use std::path::PathBuf;
use std::sync::Arc;

pub struct BalanceAggregator {
    deriver: Arc<dyn AddressDeriver>,
    lookup: Arc<dyn BalanceLookup>,
    state_file: PathBuf,
}

impl BalanceAggregator {
    pub fn new(
        deriver: Arc<dyn AddressDeriver>,
        lookup: Arc<dyn BalanceLookup>,
        state_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            deriver,
            lookup,
            state_file: state_file.into(),
        }
    }

    /// Addresses for every derivable record, in record order
    pub fn derive_addresses(&self, records: &[Record]) -> Vec<String> {
        records
            .iter()
            .filter_map(|record| {
                let address = self.deriver.derive(record);
                if address.is_none() {
                    log::warn!("⚠️  Skipping record that is not a valid secret key");
                }
                address
            })
            .collect()
    }

    /// Recompute the aggregate for `records` and persist it
    pub async fn recompute(&self, records: &[Record]) -> MonitorResult<Aggregate> {
        let addresses = self.derive_addresses(records);

        let total_subunits: u128 = if addresses.is_empty() {
            0
        } else {
            let balances = self.lookup.fetch_balances(&addresses).await.map_err(|e| {
                log::error!("Error fetching balance: {}", e);
                e
            })?;
            balances.values().map(|&v| v as u128).sum()
        };

        let value = Balance::from_subunits(total_subunits);

        tokio::fs::write(&self.state_file, value.to_string())
            .await
            .map_err(|e| {
                log::error!(
                    "❌ Failed to write state file {}: {}",
                    self.state_file.display(),
                    e
                );
                MonitorError::file_access(&self.state_file, e)
            })?;

        log::info!("💰 Balance updated: {} BTC ({} records)", value, records.len());

        Ok(Aggregate::new(value, records.len()))
    }
}
