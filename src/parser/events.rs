//! Canonical events produced by the decoder
//!
//! Every supported wire dialect decodes into these shapes; nothing past the
//! decoder looks at raw JSON.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Price level (price, quantity pair)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, quantity: Decimal) -> Self {
        Self { price, quantity }
    }
}

/// How a depth feed establishes its initial book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    /// Updates are only meaningful on top of a snapshot; earlier ones are buffered.
    Snapshot,
    /// Continuous incremental feed; the first update seeds the book.
    Incremental,
}

/// Full replacement of one symbol's book
#[derive(Debug, Clone, PartialEq)]
pub struct DepthSnapshot {
    pub symbol: String,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    pub last_update_id: u64,
}

/// Incremental change set for one symbol's book
#[derive(Debug, Clone, PartialEq)]
pub struct DepthUpdate {
    pub symbol: String,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    /// First update ID in event
    pub first_update_id: Option<u64>,
    /// Final update ID in event; feeds without sequence ids leave both unset
    pub final_update_id: Option<u64>,
    pub event_time: Option<DateTime<Utc>>,
    pub sync: SyncMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// Public trade
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub symbol: String,
    pub trade_id: Option<String>,
    pub price: Decimal,
    pub quantity: Decimal,
    pub side: TradeSide,
    pub trade_time: Option<DateTime<Utc>>,
}

/// 24h rolling ticker (full or mini)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ticker {
    pub symbol: String,
    pub last_price: Decimal,
    pub open_price: Option<Decimal>,
    pub high_price: Option<Decimal>,
    pub low_price: Option<Decimal>,
    pub volume: Option<Decimal>,
    pub quote_volume: Option<Decimal>,
    pub price_change: Option<Decimal>,
    pub price_change_percent: Option<Decimal>,
    pub event_time: Option<DateTime<Utc>>,
}

/// Candlestick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kline {
    pub symbol: String,
    pub interval: String,
    pub open_time: Option<DateTime<Utc>>,
    pub close_time: Option<DateTime<Utc>>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub quote_volume: Option<Decimal>,
    pub trades: Option<u64>,
    pub is_closed: bool,
    pub event_time: Option<DateTime<Utc>>,
}

/// Order update from the private user-data stream
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserOrderUpdate {
    pub order_id: Option<String>,
    pub client_order_id: Option<String>,
    pub symbol: Option<String>,
    pub side: Option<String>,
    pub order_type: Option<String>,
    pub status: Option<String>,
    pub price: Option<Decimal>,
    pub quantity: Option<Decimal>,
    pub filled_quantity: Option<Decimal>,
    pub average_price: Option<Decimal>,
    pub event_type: Option<String>,
    pub event_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolKind {
    Login,
    Subscribe,
    Unsubscribe,
    Ack,
    Error,
}

/// Session-level acknowledgement or error
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolMessage {
    pub kind: ProtocolKind,
    pub id: Option<String>,
    pub stream: Option<String>,
    pub error: Option<String>,
}

/// Decoded message
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalEvent {
    DepthUpdate(DepthUpdate),
    DepthSnapshot(DepthSnapshot),
    Trades(Vec<Trade>),
    Tickers(Vec<Ticker>),
    Kline(Kline),
    UserOrderUpdate(UserOrderUpdate),
    Protocol(ProtocolMessage),
    Unknown(String),
}

impl CanonicalEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            CanonicalEvent::DepthUpdate(_) => EventKind::DepthUpdate,
            CanonicalEvent::DepthSnapshot(_) => EventKind::DepthSnapshot,
            CanonicalEvent::Trades(_) => EventKind::Trade,
            CanonicalEvent::Tickers(_) => EventKind::Ticker,
            CanonicalEvent::Kline(_) => EventKind::Kline,
            CanonicalEvent::UserOrderUpdate(_) => EventKind::UserOrderUpdate,
            CanonicalEvent::Protocol(_) => EventKind::Protocol,
            CanonicalEvent::Unknown(_) => EventKind::Unknown,
        }
    }
}

/// Payload-free tag of a [`CanonicalEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    DepthUpdate,
    DepthSnapshot,
    Trade,
    Ticker,
    Kline,
    UserOrderUpdate,
    Protocol,
    Unknown,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::DepthUpdate => "depth_update",
            EventKind::DepthSnapshot => "depth_snapshot",
            EventKind::Trade => "trade",
            EventKind::Ticker => "ticker",
            EventKind::Kline => "kline",
            EventKind::UserOrderUpdate => "user_order_update",
            EventKind::Protocol => "protocol",
            EventKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Convert exchange epoch milliseconds
pub(crate) fn millis_to_datetime(millis: u64) -> Option<DateTime<Utc>> {
    i64::try_from(millis)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
}
