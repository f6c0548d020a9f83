//! Order book metrics calculation

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::levels::PriceLevelMap;

/// Levels counted on each side for [`OrderBookMetrics::imbalance`]
const IMBALANCE_LEVELS: usize = 5;

/// Computed metrics for an order book, taken from the raw (unaggregated) levels
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookMetrics {
    pub best_bid: Option<Decimal>,

    pub best_ask: Option<Decimal>,

    /// Mid price (average of best bid and ask)
    pub mid_price: Option<Decimal>,

    /// Best ask minus best bid
    pub spread: Option<Decimal>,

    /// Spread in basis points
    pub spread_bps: Option<Decimal>,

    /// Simple imbalance over the top levels: (bid_vol - ask_vol) / (bid_vol + ask_vol)
    pub imbalance: Option<Decimal>,

    /// Total bid depth (volume)
    pub bid_depth: Decimal,

    /// Total ask depth (volume)
    pub ask_depth: Decimal,

    /// Number of bid levels
    pub bid_levels: usize,

    /// Number of ask levels
    pub ask_levels: usize,
}

impl OrderBookMetrics {
    pub fn calculate(bids: &PriceLevelMap, asks: &PriceLevelMap) -> Self {
        let best_bid = bids.best_price();
        let best_ask = asks.best_price();

        let (mid_price, spread, spread_bps) = match (best_bid, best_ask) {
            (Some(bid), Some(ask)) => {
                let mid = (bid + ask) / Decimal::TWO;
                let spread = ask - bid;
                let bps = (mid > Decimal::ZERO).then(|| (spread / mid * Decimal::from(10000)).round_dp(4));
                (Some(mid), Some(spread), bps)
            }
            _ => (None, None, None),
        };

        let bid_volume: Decimal = bids.iter().take(IMBALANCE_LEVELS).map(|l| l.quantity).sum();
        let ask_volume: Decimal = asks.iter().take(IMBALANCE_LEVELS).map(|l| l.quantity).sum();
        let total = bid_volume + ask_volume;
        let imbalance = (total > Decimal::ZERO).then(|| ((bid_volume - ask_volume) / total).round_dp(8));

        Self {
            best_bid,
            best_ask,
            mid_price,
            spread,
            spread_bps,
            imbalance,
            bid_depth: bids.total_quantity(),
            ask_depth: asks.total_quantity(),
            bid_levels: bids.len(),
            ask_levels: asks.len(),
        }
    }

    /// Check if the order book is healthy (both sides present, not crossed)
    pub fn is_healthy(&self) -> bool {
        matches!((self.best_bid, self.best_ask), (Some(bid), Some(ask)) if bid < ask)
    }

    /// Get volume ratio (bid_depth / ask_depth)
    pub fn volume_ratio(&self) -> Option<Decimal> {
        if self.ask_depth > Decimal::ZERO {
            Some(self.bid_depth / self.ask_depth)
        } else {
            None
        }
    }
}
