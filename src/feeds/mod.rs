//! Non-book feeds
//!
//! Trades, tickers, klines and user orders. Each store keeps the latest state
//! the UI needs and fans every decoded event out to its own listeners.

mod kline;
mod orders;
mod ticker;
mod trades;

pub use kline::{KlineListener, KlineStore};
pub use orders::{OrderListener, UserOrders};
pub use ticker::{TickerBatchListener, TickerBoard, TickerListener};
pub use trades::{TradeListener, TradeTape};
