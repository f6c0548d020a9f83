//! Wire payload shapes
//!
//! Both dialects share the short field codes (`e`, `E`, `s`, `b`, `a`, ...);
//! they differ in framing, which is handled by the dialect modules.

use rust_decimal::Decimal;
use serde::Deserialize;

use super::de;
use super::events::{
    millis_to_datetime, DepthSnapshot, DepthUpdate, Kline, PriceLevel, SyncMode, Ticker, Trade,
    TradeSide, UserOrderUpdate,
};

/// Depth diff (`depthUpdate`)
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireDepthUpdate {
    /// Event time (milliseconds)
    #[serde(rename = "E", default, deserialize_with = "de::opt_unsigned")]
    pub event_time: Option<u64>,

    #[serde(rename = "s", alias = "symbol", default)]
    pub symbol: Option<String>,

    /// First update ID in event
    #[serde(rename = "U", alias = "firstUpdateId", default, deserialize_with = "de::opt_unsigned")]
    pub first_update_id: Option<u64>,

    /// Final update ID in event
    #[serde(rename = "u", alias = "finalUpdateId", default, deserialize_with = "de::opt_unsigned")]
    pub final_update_id: Option<u64>,

    #[serde(rename = "b", alias = "bids", default, deserialize_with = "de::price_levels")]
    pub bids: Vec<PriceLevel>,

    #[serde(rename = "a", alias = "asks", default, deserialize_with = "de::price_levels")]
    pub asks: Vec<PriceLevel>,
}

impl WireDepthUpdate {
    pub fn into_event(self, symbol: String, sync: SyncMode) -> DepthUpdate {
        let final_update_id = self.final_update_id.or(self.first_update_id);
        // A diff without ids cannot be ordered against a snapshot, so it seeds.
        let sync = if final_update_id.is_some() {
            sync
        } else {
            SyncMode::Incremental
        };
        DepthUpdate {
            symbol,
            bids: self.bids,
            asks: self.asks,
            first_update_id: self.first_update_id.or(final_update_id),
            final_update_id,
            event_time: self.event_time.and_then(millis_to_datetime),
            sync,
        }
    }
}

/// Full depth (REST snapshot or partial-depth stream)
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireDepthSnapshot {
    #[serde(rename = "lastUpdateId", deserialize_with = "de::unsigned")]
    pub last_update_id: u64,

    #[serde(rename = "s", alias = "symbol", default)]
    pub symbol: Option<String>,

    #[serde(alias = "b", default, deserialize_with = "de::price_levels")]
    pub bids: Vec<PriceLevel>,

    #[serde(alias = "a", default, deserialize_with = "de::price_levels")]
    pub asks: Vec<PriceLevel>,
}

impl WireDepthSnapshot {
    pub fn into_event(self, symbol: String) -> DepthSnapshot {
        DepthSnapshot {
            symbol,
            bids: self.bids,
            asks: self.asks,
            last_update_id: self.last_update_id,
        }
    }
}

/// Public trade (`trade` / `aggTrade`)
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireTrade {
    #[serde(rename = "s", alias = "symbol", default)]
    pub symbol: Option<String>,

    #[serde(rename = "t", alias = "tradeId", default, deserialize_with = "de::opt_text")]
    pub trade_id: Option<String>,

    /// Aggregate trade ID
    #[serde(rename = "a", default, deserialize_with = "de::opt_text")]
    pub agg_trade_id: Option<String>,

    #[serde(rename = "p", alias = "price", deserialize_with = "de::decimal")]
    pub price: Decimal,

    #[serde(rename = "q", alias = "quantity", deserialize_with = "de::decimal")]
    pub quantity: Decimal,

    /// Trade time, falling back to event time
    #[serde(rename = "T", default, deserialize_with = "de::opt_unsigned")]
    pub trade_time: Option<u64>,

    #[serde(rename = "E", default, deserialize_with = "de::opt_unsigned")]
    pub event_time: Option<u64>,

    /// Is buyer maker
    #[serde(rename = "m", default, deserialize_with = "de::lenient_bool")]
    pub is_buyer_maker: bool,

    /// Explicit aggressor side, when the venue sends one
    #[serde(default)]
    pub side: Option<String>,
}

impl WireTrade {
    pub fn into_event(self, symbol: String) -> Trade {
        let side = match self.side.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("buy") => TradeSide::Buy,
            Some("sell") => TradeSide::Sell,
            // The buyer resting as maker means the seller took liquidity.
            _ if self.is_buyer_maker => TradeSide::Sell,
            _ => TradeSide::Buy,
        };
        Trade {
            symbol,
            trade_id: self.trade_id.or(self.agg_trade_id),
            price: self.price,
            quantity: self.quantity,
            side,
            trade_time: self.trade_time.or(self.event_time).and_then(millis_to_datetime),
        }
    }
}

/// Rolling ticker (`24hrTicker` / `miniTicker`)
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireTicker {
    #[serde(rename = "s", alias = "symbol", alias = "S", default)]
    pub symbol: Option<String>,

    #[serde(rename = "c", deserialize_with = "de::decimal")]
    pub last_price: Decimal,

    #[serde(rename = "o", default, deserialize_with = "de::opt_decimal")]
    pub open_price: Option<Decimal>,

    #[serde(rename = "h", default, deserialize_with = "de::opt_decimal")]
    pub high_price: Option<Decimal>,

    #[serde(rename = "l", default, deserialize_with = "de::opt_decimal")]
    pub low_price: Option<Decimal>,

    #[serde(rename = "v", default, deserialize_with = "de::opt_decimal")]
    pub volume: Option<Decimal>,

    #[serde(rename = "q", default, deserialize_with = "de::opt_decimal")]
    pub quote_volume: Option<Decimal>,

    #[serde(rename = "E", alias = "dsTime", default, deserialize_with = "de::opt_unsigned")]
    pub event_time: Option<u64>,
}

impl WireTicker {
    pub fn into_event(self, symbol: String) -> Ticker {
        let (price_change, price_change_percent) = match self.open_price {
            Some(open) if open > Decimal::ZERO => {
                let change = self.last_price - open;
                let percent = (change / open * Decimal::ONE_HUNDRED).round_dp(8);
                (Some(change), Some(percent))
            }
            _ => (None, None),
        };
        Ticker {
            symbol,
            last_price: self.last_price,
            open_price: self.open_price,
            high_price: self.high_price,
            low_price: self.low_price,
            volume: self.volume,
            quote_volume: self.quote_volume,
            price_change,
            price_change_percent,
            event_time: self.event_time.and_then(millis_to_datetime),
        }
    }
}

/// Kline event body; the candle itself sits under `k`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireKlineEvent {
    #[serde(rename = "E", alias = "dsTime", default, deserialize_with = "de::opt_unsigned")]
    pub event_time: Option<u64>,

    #[serde(rename = "s", default)]
    pub symbol: Option<String>,

    #[serde(rename = "k")]
    pub candle: WireCandle,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireCandle {
    #[serde(rename = "t", default, deserialize_with = "de::opt_unsigned")]
    pub open_time: Option<u64>,

    #[serde(rename = "T", default, deserialize_with = "de::opt_unsigned")]
    pub close_time: Option<u64>,

    #[serde(rename = "s", default)]
    pub symbol: Option<String>,

    #[serde(rename = "i", default)]
    pub interval: Option<String>,

    #[serde(rename = "o", deserialize_with = "de::decimal")]
    pub open: Decimal,

    #[serde(rename = "h", deserialize_with = "de::decimal")]
    pub high: Decimal,

    #[serde(rename = "l", deserialize_with = "de::decimal")]
    pub low: Decimal,

    #[serde(rename = "c", deserialize_with = "de::decimal")]
    pub close: Decimal,

    #[serde(rename = "v", deserialize_with = "de::decimal")]
    pub volume: Decimal,

    #[serde(rename = "q", default, deserialize_with = "de::opt_decimal")]
    pub quote_volume: Option<Decimal>,

    #[serde(rename = "n", default, deserialize_with = "de::opt_unsigned")]
    pub trades: Option<u64>,

    #[serde(rename = "x", default, deserialize_with = "de::lenient_bool")]
    pub is_closed: bool,
}

impl WireKlineEvent {
    /// Symbol carried by the payload itself, candle first
    pub fn symbol(&self) -> Option<&str> {
        self.candle.symbol.as_deref().or(self.symbol.as_deref())
    }

    pub fn into_event(self, symbol: String, interval: Option<String>) -> Kline {
        let candle = self.candle;
        Kline {
            symbol,
            interval: interval.or(candle.interval).unwrap_or_default(),
            open_time: candle.open_time.and_then(millis_to_datetime),
            close_time: candle.close_time.and_then(millis_to_datetime),
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
            volume: candle.volume,
            quote_volume: candle.quote_volume,
            trades: candle.trades,
            is_closed: candle.is_closed,
            event_time: self.event_time.and_then(millis_to_datetime),
        }
    }
}

/// Order update; short codes follow `executionReport`, long names the
/// flatter `orderUpdate` payloads
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct WireUserOrder {
    #[serde(rename = "i", alias = "id", alias = "orderId", default, deserialize_with = "de::opt_text")]
    pub order_id: Option<String>,

    #[serde(rename = "c", alias = "clientOrderId", default, deserialize_with = "de::opt_text")]
    pub client_order_id: Option<String>,

    #[serde(rename = "s", alias = "symbol", alias = "symbolCode", default)]
    pub symbol: Option<String>,

    #[serde(rename = "S", alias = "side", alias = "action", default)]
    pub side: Option<String>,

    #[serde(rename = "o", alias = "type", default)]
    pub order_type: Option<String>,

    #[serde(rename = "X", alias = "status", default)]
    pub status: Option<String>,

    #[serde(rename = "p", alias = "price", default, deserialize_with = "de::opt_decimal")]
    pub price: Option<Decimal>,

    #[serde(rename = "q", alias = "quantity", default, deserialize_with = "de::opt_decimal")]
    pub quantity: Option<Decimal>,

    #[serde(rename = "z", alias = "baseFilled", default, deserialize_with = "de::opt_decimal")]
    pub filled_quantity: Option<Decimal>,

    #[serde(rename = "avgPrice", alias = "avrPrice", default, deserialize_with = "de::opt_decimal")]
    pub average_price: Option<Decimal>,

    #[serde(rename = "e", alias = "eventType", alias = "event", default)]
    pub event_type: Option<String>,

    #[serde(rename = "E", alias = "updatedAt", default, deserialize_with = "de::opt_unsigned")]
    pub event_time: Option<u64>,
}

impl WireUserOrder {
    pub fn into_event(self) -> UserOrderUpdate {
        UserOrderUpdate {
            order_id: self.order_id,
            client_order_id: self.client_order_id,
            symbol: self.symbol.map(|s| super::normalize_symbol(&s)),
            side: self.side,
            order_type: self.order_type,
            status: self.status,
            price: self.price,
            quantity: self.quantity,
            filled_quantity: self.filled_quantity,
            average_price: self.average_price,
            event_type: self.event_type,
            event_time: self.event_time.and_then(millis_to_datetime),
        }
    }
}
