//! Balance endpoint integration
//!
//! One batched request per recompute:
//!
//! ```text
//! GET {base_url}?active=addr1,addr2,addr3
//! → { "addr1": { "final_balance": 100000000, ... }, ... }
//! ```
//!
//! Addresses missing from the response simply don't appear in the result.

use crate::error::{MonitorError, MonitorResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Per-address entry in the balance response
#[derive(Debug, Clone, Deserialize)]
pub struct AddressBalance {
    /// Confirmed balance in subunits (satoshis)
    pub final_balance: u64,
}

/// Source of per-address subunit balances
#[async_trait]
pub trait BalanceLookup: Send + Sync {
    /// Fetch balances for all `addresses` in a single call
    async fn fetch_balances(&self, addresses: &[String]) -> MonitorResult<HashMap<String, u64>>;
}

pub struct HttpBalanceLookup {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBalanceLookup {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> MonitorResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MonitorError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl BalanceLookup for HttpBalanceLookup {
    async fn fetch_balances(&self, addresses: &[String]) -> MonitorResult<HashMap<String, u64>> {
        let active = addresses.join(",");

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("active", active.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MonitorError::ExternalLookup(format!(
                "balance API error: {}",
                response.status()
            )));
        }

        let body: HashMap<String, AddressBalance> = response.json().await?;

        log::debug!(
            "Balance API returned {} of {} addresses",
            body.len(),
            addresses.len()
        );

        Ok(body
            .into_iter()
            .map(|(address, entry)| (address, entry.final_balance))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_batches_addresses_in_one_call() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/balance"))
            .and(query_param("active", "addrA,addrB"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "addrA": { "final_balance": 100000000, "n_tx": 2, "total_received": 100000000 },
                "addrB": { "final_balance": 0 }
            })))
            .expect(1)
            .mount(&mock)
            .await;

        let lookup =
            HttpBalanceLookup::new(format!("{}/balance", mock.uri()), Duration::from_secs(5)).unwrap();
        let balances = lookup
            .fetch_balances(&["addrA".to_string(), "addrB".to_string()])
            .await
            .unwrap();

        assert_eq!(balances.get("addrA"), Some(&100_000_000));
        assert_eq!(balances.get("addrB"), Some(&0));
    }

    #[tokio::test]
    async fn test_server_error_is_external_lookup_error() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock)
            .await;

        let lookup = HttpBalanceLookup::new(mock.uri(), Duration::from_secs(5)).unwrap();
        let err = lookup.fetch_balances(&["addrA".to_string()]).await.unwrap_err();
        assert!(err.is_external());
    }

    #[tokio::test]
    async fn test_malformed_body_is_external_lookup_error() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Invalid Bitcoin Address"))
            .mount(&mock)
            .await;

        let lookup = HttpBalanceLookup::new(mock.uri(), Duration::from_secs(5)).unwrap();
        let err = lookup.fetch_balances(&["bogus".to_string()]).await.unwrap_err();
        assert!(err.is_external());
    }

    #[tokio::test]
    async fn test_timeout_is_external_lookup_error() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock)
            .await;

        let lookup = HttpBalanceLookup::new(mock.uri(), Duration::from_millis(200)).unwrap();
        let err = lookup.fetch_balances(&["addrA".to_string()]).await.unwrap_err();
        assert!(err.is_external());
    }
}
