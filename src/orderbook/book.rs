//! Core order book implementation
//!
//! Per-symbol state machine: `Uninitialized → AwaitingSnapshot → Live`.
//! Snapshot-synchronised feeds buffer diffs until a snapshot arrives;
//! incremental feeds seed the book from their first diff.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::VecDeque;
use tracing::{debug, warn};

use super::aggregate::aggregate_side;
use super::levels::PriceLevelMap;
use super::{AggregatedView, AggregationConfig, OrderBookMetrics, SequenceGap, Side};
use crate::parser::{DepthSnapshot, DepthUpdate, PriceLevel, SyncMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookStatus {
    Uninitialized,
    AwaitingSnapshot,
    Live,
}

/// Result of applying a snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotOutcome {
    /// Buffered diffs merged on top of the snapshot
    pub replayed: usize,
    /// Buffered diffs already covered by the snapshot
    pub dropped: usize,
    pub gaps: Vec<SequenceGap>,
}

/// Result of applying a diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Merged into a live book
    Applied { gap: Option<SequenceGap> },
    /// First diff of an incremental feed, installed as the whole book
    Seeded,
    /// Held until a snapshot arrives; nothing was published
    Buffered { evicted: bool },
}

impl UpdateOutcome {
    /// Whether the book changed and a view must be published
    pub fn mutated(&self) -> bool {
        !matches!(self, UpdateOutcome::Buffered { .. })
    }
}

/// Order book for a single symbol
#[derive(Debug, Clone)]
pub struct OrderBook {
    symbol: String,
    bids: PriceLevelMap,
    asks: PriceLevelMap,
    status: BookStatus,
    /// Last processed update ID
    last_update_id: Option<u64>,
    last_snapshot_id: Option<u64>,
    /// Diffs received before the first snapshot
    pending: VecDeque<DepthUpdate>,
    pending_capacity: usize,
    /// Maximum depth levels to maintain per side
    depth_limit: usize,
    resync_needed: bool,
    /// Timestamp of last update
    last_event_time: Option<DateTime<Utc>>,
}

impl OrderBook {
    /// Create a new empty order book
    pub fn new(symbol: &str, depth_limit: usize, pending_capacity: usize) -> Self {
        Self {
            symbol: symbol.to_string(),
            bids: PriceLevelMap::new(Side::Bid),
            asks: PriceLevelMap::new(Side::Ask),
            status: BookStatus::Uninitialized,
            last_update_id: None,
            last_snapshot_id: None,
            pending: VecDeque::new(),
            pending_capacity,
            depth_limit,
            resync_needed: false,
            last_event_time: None,
        }
    }

    /// Replace the book wholesale, then replay any buffered diffs on top
    pub fn apply_snapshot(&mut self, snapshot: &DepthSnapshot) -> SnapshotOutcome {
        self.bids.snapshot_replace(&snapshot.bids);
        self.asks.snapshot_replace(&snapshot.asks);
        self.last_update_id = Some(snapshot.last_update_id);
        self.last_snapshot_id = Some(snapshot.last_update_id);
        self.status = BookStatus::Live;
        self.resync_needed = false;

        let mut outcome = SnapshotOutcome::default();
        while let Some(update) = self.pending.pop_front() {
            if update
                .final_update_id
                .is_some_and(|id| id <= snapshot.last_update_id)
            {
                outcome.dropped += 1;
                continue;
            }
            if let Some(gap) = self.merge(&update) {
                outcome.gaps.push(gap);
            }
            outcome.replayed += 1;
        }

        self.trim_depth();
        outcome
    }

    /// Apply a depth diff according to the current state
    pub fn apply_update(&mut self, update: &DepthUpdate) -> UpdateOutcome {
        if self.status == BookStatus::Live {
            let gap = self.merge(update);
            self.trim_depth();
            return UpdateOutcome::Applied { gap };
        }

        match update.sync {
            SyncMode::Incremental => {
                self.bids.snapshot_replace(&update.bids);
                self.asks.snapshot_replace(&update.asks);
                self.last_update_id = update.final_update_id;
                self.last_event_time = update.event_time;
                self.status = BookStatus::Live;
                self.trim_depth();
                UpdateOutcome::Seeded
            }
            SyncMode::Snapshot => {
                self.status = BookStatus::AwaitingSnapshot;
                self.pending.push_back(update.clone());

                let mut evicted = false;
                while self.pending.len() > self.pending_capacity {
                    if let Some(dropped) = self.pending.pop_front() {
                        warn!(
                            symbol = %self.symbol,
                            final_update_id = ?dropped.final_update_id,
                            "Pre-snapshot buffer full, dropping oldest update"
                        );
                    }
                    evicted = true;
                }
                if evicted {
                    self.resync_needed = true;
                }
                debug!(symbol = %self.symbol, pending = self.pending.len(), "Buffered update awaiting snapshot");
                UpdateOutcome::Buffered { evicted }
            }
        }
    }

    /// Merge a diff into a live book, reporting a discontinuity if any
    ///
    /// Continuous when `first <= last + 1 <= final`. A gap is reported but the
    /// diff is applied regardless. Diffs without ids skip the check.
    fn merge(&mut self, update: &DepthUpdate) -> Option<SequenceGap> {
        let gap = match (self.last_update_id, update.first_update_id, update.final_update_id) {
            (Some(last), Some(first), Some(final_id)) => {
                let expected = last.saturating_add(1);
                let continuous = first <= expected && expected <= final_id;
                (!continuous).then(|| SequenceGap {
                    symbol: self.symbol.clone(),
                    expected,
                    actual: first,
                })
            }
            _ => None,
        };
        if gap.is_some() {
            self.resync_needed = true;
        }

        for level in &update.bids {
            self.bids.upsert(level.price, level.quantity);
        }
        for level in &update.asks {
            self.asks.upsert(level.price, level.quantity);
        }

        if update.final_update_id.is_some() {
            self.last_update_id = update.final_update_id;
        }
        if update.event_time.is_some() {
            self.last_event_time = update.event_time;
        }
        gap
    }

    /// Trim the book to max depth
    fn trim_depth(&mut self) {
        self.bids.truncate(self.depth_limit);
        self.asks.truncate(self.depth_limit);
    }

    /// Back to `Uninitialized` with no levels, ids or buffered diffs
    pub fn reset(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.pending.clear();
        self.last_update_id = None;
        self.last_snapshot_id = None;
        self.resync_needed = false;
        self.last_event_time = None;
        self.status = BookStatus::Uninitialized;
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn status(&self) -> BookStatus {
        self.status
    }

    pub fn bids(&self) -> &PriceLevelMap {
        &self.bids
    }

    pub fn asks(&self) -> &PriceLevelMap {
        &self.asks
    }

    /// Get best bid price
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.best_price()
    }

    /// Get best ask price
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.best_price()
    }

    /// Get last update ID
    pub fn last_update_id(&self) -> Option<u64> {
        self.last_update_id
    }

    pub fn last_snapshot_id(&self) -> Option<u64> {
        self.last_snapshot_id
    }

    pub fn resync_needed(&self) -> bool {
        self.resync_needed
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Raw levels, best first
    pub fn levels(&self, side: Side) -> Vec<PriceLevel> {
        match side {
            Side::Bid => self.bids.iter().collect(),
            Side::Ask => self.asks.iter().collect(),
        }
    }

    pub fn metrics(&self) -> OrderBookMetrics {
        OrderBookMetrics::calculate(&self.bids, &self.asks)
    }

    /// Aggregate both sides under `config` into a publishable view
    pub fn view(&self, config: &AggregationConfig, max_rows: usize) -> AggregatedView {
        let bids = aggregate_side(&self.bids, config.tick_size(), max_rows);
        let asks = aggregate_side(&self.asks, config.tick_size(), max_rows);
        let max_cumulative_quantity = bids
            .last()
            .map(|l| l.cumulative_quantity)
            .into_iter()
            .chain(asks.last().map(|l| l.cumulative_quantity))
            .max()
            .unwrap_or(Decimal::ZERO);

        AggregatedView {
            symbol: self.symbol.clone(),
            bids,
            asks,
            max_cumulative_quantity,
            last_update_id: self.last_update_id,
            event_time: self.last_event_time,
            resync_needed: self.resync_needed,
            config: *config,
            metrics: self.metrics(),
        }
    }
}
