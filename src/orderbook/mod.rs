//! Order book module
//!
//! Maintains per-symbol order book state from depth snapshots and diffs and
//! publishes an aggregated view after every mutation.

mod aggregate;
mod book;
mod config;
pub mod format;
mod levels;
mod manager;
mod metrics;

pub use aggregate::{aggregate, aggregate_side, TickSize};
pub use book::{BookStatus, OrderBook, SnapshotOutcome, UpdateOutcome};
pub use config::{AggregationConfig, MAX_DECIMALS};
pub use levels::{LevelIter, PriceLevelMap};
pub use manager::{BookListener, OrderBookManager};
pub use metrics::OrderBookMetrics;

#[cfg(test)]
pub use manager::MockBookListener;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Side of the order book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
}

/// One bucket of the published view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedLevel {
    pub price: Decimal,
    pub quantity: Decimal,
    /// Sum of quantities from the best bucket through this one
    pub cumulative_quantity: Decimal,
}

/// Order book view handed to listeners
///
/// Recomputed from the authoritative maps on every publish; the same book and
/// config always produce an equal view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedView {
    pub symbol: String,
    /// Best (highest) first
    pub bids: Vec<AggregatedLevel>,
    /// Best (lowest) first
    pub asks: Vec<AggregatedLevel>,
    /// Largest final cumulative quantity of the two sides
    pub max_cumulative_quantity: Decimal,
    pub last_update_id: Option<u64>,
    pub event_time: Option<DateTime<Utc>>,
    /// Set after a sequence gap or a dropped pre-snapshot update
    pub resync_needed: bool,
    pub config: AggregationConfig,
    pub metrics: OrderBookMetrics,
}

impl AggregatedView {
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

/// Advisory signal that updates were lost between two sequence ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceGap {
    pub symbol: String,
    /// Id the book expected next
    pub expected: u64,
    /// First id the update actually carried
    pub actual: u64,
}
