//! Aggregate cache
//!
//! Holds at most one computed aggregate. A cached aggregate is valid only
//! while it is younger than the TTL AND was computed from the same number
//! of records that the data file holds now. A count mismatch invalidates it
//! regardless of age.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::{Duration, Instant};

/// Satoshis per whole coin
pub const SUBUNITS_PER_UNIT: u64 = 100_000_000;

/// Subunits per 0.01 of a coin
const SUBUNITS_PER_CENT: u64 = SUBUNITS_PER_UNIT / 100;

/// Decimal balance with two-place precision, stored as hundredths
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Balance {
    cents: u64,
}

impl Balance {
    pub const ZERO: Balance = Balance { cents: 0 };

    pub fn from_cents(cents: u64) -> Self {
        Self { cents }
    }

    /// Convert a raw subunit total to two decimals, rounding half up
    pub fn from_subunits(subunits: u128) -> Self {
        let cents = (subunits + (SUBUNITS_PER_CENT / 2) as u128) / SUBUNITS_PER_CENT as u128;
        Self {
            cents: u64::try_from(cents).unwrap_or(u64::MAX),
        }
    }

    pub fn cents(&self) -> u64 {
        self.cents
    }
}

impl std::fmt::Display for Balance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.cents / 100, self.cents % 100)
    }
}

impl Serialize for Balance {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Summed balance of every record in the data file at one point in time
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub value: Balance,
    /// Number of records the value was computed from
    pub count: usize,
    pub computed_at: Instant,
    pub computed_at_utc: DateTime<Utc>,
}

impl Aggregate {
    pub fn new(value: Balance, count: usize) -> Self {
        Self {
            value,
            count,
            computed_at: Instant::now(),
            computed_at_utc: Utc::now(),
        }
    }
}

#[derive(Debug)]
pub struct AggregateCache {
    entry: Option<Aggregate>,
    ttl: Duration,
}

impl AggregateCache {
    pub fn new(ttl: Duration) -> Self {
        Self { entry: None, ttl }
    }

    pub fn get(&self) -> Option<&Aggregate> {
        self.entry.as_ref()
    }

    /// Replace the cached aggregate wholesale
    pub fn set(&mut self, aggregate: Aggregate) {
        self.entry = Some(aggregate);
    }

    pub fn is_valid(&self, current_count: usize) -> bool {
        self.is_valid_at(current_count, Instant::now())
    }

    pub fn is_valid_at(&self, current_count: usize, now: Instant) -> bool {
        match &self.entry {
            Some(agg) => {
                agg.count == current_count
                    && now.saturating_duration_since(agg.computed_at) < self.ttl
            }
            None => false,
        }
    }

    /// The cached aggregate, if it is still valid for `current_count` records
    pub fn lookup(&self, current_count: usize) -> Option<Aggregate> {
        if self.is_valid(current_count) {
            self.entry.clone()
        } else {
            None
        }
    }
}
