//! Market Data SDK
//!
//! Decodes exchange WebSocket messages from two wire dialects, keeps live
//! per-symbol order books aggregated to a configurable tick size, and fans
//! books, trades, tickers, klines and user orders out to listeners.
//!
//! ```no_run
//! use market_data_sdk::{AggregatedView, EngineConfig, MarketDataSdk};
//!
//! let mut sdk = MarketDataSdk::new(EngineConfig::default()).unwrap();
//! sdk.subscribe_book(|symbol: &str, view: &AggregatedView| {
//!     println!("{symbol}: {} bids", view.bids.len());
//! });
//! sdk.process_message(r#"{"e":"depthUpdate","s":"BTCUSDT","U":1,"u":1,"b":[["100","1"]],"a":[]}"#);
//! sdk.set_aggregation("BTCUSDT", "1").unwrap();
//! ```

pub mod config;
pub mod error;
pub mod feeds;
pub mod monitor;
pub mod orderbook;
pub mod parser;
pub mod pipeline;
pub mod publisher;
pub mod sdk;

pub use config::{Config, EngineConfig};
pub use error::{Result, SdkError};
pub use orderbook::{
    AggregatedLevel, AggregatedView, AggregationConfig, BookListener, BookStatus, OrderBook,
    OrderBookManager, OrderBookMetrics, SequenceGap, Side, TickSize,
};
pub use parser::{CanonicalEvent, DecodeError, Decoder, Dialect, EventKind};
pub use pipeline::PipelineHandle;
pub use publisher::SubscriptionId;
pub use sdk::MarketDataSdk;
