//! SDK facade
//!
//! [`MarketDataSdk`] is the single owner of every book and feed store. Raw
//! messages go in through [`MarketDataSdk::process_message`]; views, trades,
//! tickers, klines and order updates come out through the subscribe calls.
//! It is not thread-safe by itself: one task owns it (see [`crate::pipeline`]).

use prometheus::Registry;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::feeds::{KlineStore, TickerBoard, TradeTape, UserOrders};
use crate::monitor::SdkCounters;
use crate::orderbook::{
    AggregatedView, AggregationConfig, BookListener, BookStatus, OrderBookManager, UpdateOutcome,
};
use crate::parser::{
    CanonicalEvent, Decoder, DepthSnapshot, DepthUpdate, EventKind, Kline, ProtocolKind, Ticker,
    Trade, UserOrderUpdate,
};
use crate::publisher::SubscriptionId;

pub struct MarketDataSdk {
    decoder: Decoder,
    books: OrderBookManager,
    trades: TradeTape,
    tickers: TickerBoard,
    klines: KlineStore,
    orders: UserOrders,
    counters: SdkCounters,
}

impl std::fmt::Debug for MarketDataSdk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketDataSdk")
            .field("decoder", &self.decoder)
            .field("books", &self.books)
            .field("trades", &self.trades)
            .finish_non_exhaustive()
    }
}

impl MarketDataSdk {
    /// SDK whose counters live on a private registry
    pub fn new(engine: EngineConfig) -> Result<Self> {
        Self::build(engine, SdkCounters::unregistered()?)
    }

    /// SDK whose counters are exported through `registry`
    pub fn with_registry(engine: EngineConfig, registry: &Registry) -> Result<Self> {
        Self::build(engine, SdkCounters::register(registry)?)
    }

    fn build(engine: EngineConfig, counters: SdkCounters) -> Result<Self> {
        let trades = TradeTape::new(engine.trades_max_rows);
        Ok(Self {
            decoder: Decoder::new(),
            books: OrderBookManager::new(engine)?,
            trades,
            tickers: TickerBoard::new(),
            klines: KlineStore::new(),
            orders: UserOrders::new(),
            counters,
        })
    }

    /// Replace the decoder, e.g. with one pinned to a dialect
    pub fn with_decoder(mut self, decoder: Decoder) -> Self {
        self.decoder = decoder;
        self
    }

    /// Decode one raw message and route it
    ///
    /// Undecodable input is logged, counted and dropped; `None` is returned
    /// and no state changes.
    pub fn process_message(&mut self, raw: &str) -> Option<EventKind> {
        match self.decoder.decode(raw) {
            Ok(event) => {
                let kind = event.kind();
                self.dispatch(event);
                Some(kind)
            }
            Err(e) => {
                self.counters.decode_error();
                debug!(error = %e, len = raw.len(), "Dropping undecodable message");
                None
            }
        }
    }

    /// Decode and apply a REST depth snapshot for `symbol`
    pub fn process_snapshot(&mut self, symbol: &str, raw: &str) -> Result<()> {
        let snapshot = self.decoder.decode_snapshot(symbol, raw).map_err(|e| {
            self.counters.decode_error();
            warn!(symbol = %symbol, error = %e, "Rejected depth snapshot");
            e
        })?;
        self.counters.message(EventKind::DepthSnapshot);
        self.apply_snapshot(&snapshot);
        Ok(())
    }

    /// Route an already decoded event
    pub fn dispatch(&mut self, event: CanonicalEvent) {
        self.counters.message(event.kind());
        match event {
            CanonicalEvent::DepthSnapshot(snapshot) => self.apply_snapshot(&snapshot),
            CanonicalEvent::DepthUpdate(update) => self.apply_update(&update),
            CanonicalEvent::Trades(trades) => self.trades.record(trades),
            CanonicalEvent::Tickers(tickers) => self.tickers.update(tickers),
            CanonicalEvent::Kline(kline) => self.klines.update(kline),
            CanonicalEvent::UserOrderUpdate(update) => self.orders.deliver(&update),
            CanonicalEvent::Protocol(message) => match message.kind {
                ProtocolKind::Error => warn!(
                    id = ?message.id,
                    error = ?message.error,
                    "Exchange reported an error"
                ),
                kind => debug!(kind = ?kind, id = ?message.id, stream = ?message.stream, "Protocol message"),
            },
            CanonicalEvent::Unknown(tag) => debug!(tag = %tag, "Ignoring unrecognised message"),
        }
    }

    fn apply_snapshot(&mut self, snapshot: &DepthSnapshot) {
        let before = self.books.published();
        let outcome = self.books.apply_snapshot(snapshot);
        self.counters.sequence_gaps(outcome.gaps.len());
        self.count_views(before);
    }

    fn apply_update(&mut self, update: &DepthUpdate) {
        let before = self.books.published();
        match self.books.apply_update(update) {
            UpdateOutcome::Buffered { .. } => self.counters.update_buffered(),
            UpdateOutcome::Applied { gap: Some(_) } => self.counters.sequence_gaps(1),
            _ => {}
        }
        self.count_views(before);
    }

    fn count_views(&self, before: u64) {
        self.counters
            .views_published_by(self.books.published().saturating_sub(before));
    }

    /// Aggregate `symbol` to a tick given as text, e.g. `"0.10"`
    pub fn set_aggregation(&mut self, symbol: &str, tick_size: &str) -> Result<()> {
        let before = self.books.published();
        self.books.set_aggregation(symbol, tick_size)?;
        self.count_views(before);
        Ok(())
    }

    pub fn set_tick_size(&mut self, symbol: &str, tick_size: Decimal) -> Result<()> {
        let before = self.books.published();
        self.books.set_tick_size(symbol, tick_size)?;
        self.count_views(before);
        Ok(())
    }

    pub fn clear_aggregation(&mut self, symbol: &str) {
        let before = self.books.published();
        self.books.clear_aggregation(symbol);
        self.count_views(before);
    }

    pub fn set_decimals(
        &mut self,
        symbol: &str,
        base_decimals: Option<u8>,
        quote_decimals: Option<u8>,
    ) -> Result<()> {
        let before = self.books.published();
        self.books.set_decimals(symbol, base_decimals, quote_decimals)?;
        self.count_views(before);
        Ok(())
    }

    /// Reset the book and trade tape of `symbol`
    pub fn reset(&mut self, symbol: &str) {
        let before = self.books.published();
        self.books.reset(symbol);
        self.trades.reset(symbol);
        self.count_views(before);
    }

    pub fn view(&self, symbol: &str) -> Option<AggregatedView> {
        self.books.view(symbol)
    }

    pub fn aggregation(&self, symbol: &str) -> Option<AggregationConfig> {
        self.books.config(symbol)
    }

    pub fn status(&self, symbol: &str) -> BookStatus {
        self.books.status(symbol)
    }

    pub fn symbols(&self) -> Vec<String> {
        self.books.symbols()
    }

    pub fn books(&self) -> &OrderBookManager {
        &self.books
    }

    pub fn recent_trades(&self, symbol: &str) -> Vec<Trade> {
        self.trades.recent(symbol)
    }

    pub fn ticker(&self, symbol: &str) -> Option<&Ticker> {
        self.tickers.get(symbol)
    }

    pub fn tickers(&self) -> &TickerBoard {
        &self.tickers
    }

    pub fn kline(&self, symbol: &str, interval: &str) -> Option<&Kline> {
        self.klines.latest(symbol, interval)
    }

    pub fn counters(&self) -> &SdkCounters {
        &self.counters
    }

    pub fn subscribe_book<L>(&mut self, listener: L) -> SubscriptionId
    where
        L: BookListener + 'static,
    {
        self.books.subscribe(Box::new(listener))
    }

    pub fn subscribe_trades<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&Trade) + Send + 'static,
    {
        self.trades.subscribe(listener)
    }

    pub fn subscribe_ticker<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&Ticker) + Send + 'static,
    {
        self.tickers.subscribe(listener)
    }

    pub fn subscribe_all_tickers<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&[Ticker]) + Send + 'static,
    {
        self.tickers.subscribe_batch(listener)
    }

    pub fn subscribe_klines<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&Kline) + Send + 'static,
    {
        self.klines.subscribe(listener)
    }

    pub fn subscribe_user_orders<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&UserOrderUpdate) + Send + 'static,
    {
        self.orders.subscribe(listener)
    }

    /// Remove a listener from whichever feed it was registered on
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.books.unsubscribe(id)
            || self.trades.unsubscribe(id)
            || self.tickers.unsubscribe(id)
            || self.klines.unsubscribe(id)
            || self.orders.unsubscribe(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::{Arc, Mutex};

    fn sdk() -> MarketDataSdk {
        MarketDataSdk::new(EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_routes_every_feed() {
        let mut sdk = sdk();
        let trades = Arc::new(Mutex::new(0));
        let sink = trades.clone();
        sdk.subscribe_trades(move |_: &Trade| *sink.lock().unwrap() += 1);

        let messages = [
            r#"{"stream":"btcusdt@trade","data":{"e":"trade","s":"BTCUSDT","t":1,"p":"100.5","q":"0.1","T":1700000000000,"m":true}}"#,
            r#"{"e":"24hrMiniTicker","s":"ETHUSDT","c":"2000","o":"1900","h":"2100","l":"1800","v":"10","q":"20000"}"#,
            r#"{"stream":"btcusdt@kline_1m","data":{"e":"kline","s":"BTCUSDT","k":{"t":1,"T":2,"s":"BTCUSDT","i":"1m","o":"1","h":"2","l":"0.5","c":"1.5","v":"10","x":false}}}"#,
            r#"{"id":1,"result":null}"#,
        ];
        let kinds: Vec<_> = messages.iter().filter_map(|m| sdk.process_message(m)).collect();
        assert_eq!(
            kinds,
            vec![EventKind::Trade, EventKind::Ticker, EventKind::Kline, EventKind::Protocol]
        );

        assert_eq!(*trades.lock().unwrap(), 1);
        assert_eq!(sdk.recent_trades("BTCUSDT").len(), 1);
        assert_eq!(sdk.ticker("ETHUSDT").unwrap().last_price, dec!(2000));
        assert_eq!(sdk.kline("BTCUSDT", "1m").unwrap().close, dec!(1.5));
        assert_eq!(sdk.counters().messages_of(EventKind::Trade), 1);
    }

    #[test]
    fn test_decode_errors_are_swallowed() {
        let mut sdk = sdk();
        sdk.process_message(r#"{"e":"depthUpdate","s":"BTCUSDT","U":1,"u":1,"b":[["100","1"]],"a":[]}"#);
        let before = sdk.view("BTCUSDT").unwrap();

        assert_eq!(sdk.process_message("{not json"), None);
        assert_eq!(sdk.process_message(r#"{"e":"depthUpdate","s":"BTCUSDT","u":"x"}"#), None);
        assert_eq!(sdk.counters().decode_errors(), 2);
        assert_eq!(sdk.view("BTCUSDT").unwrap(), before);
    }

    #[test]
    fn test_counts_views_and_buffering() {
        let mut sdk = sdk();
        let diff = r#"{"stream":"btcusdt@depth","data":{"e":"depthUpdate","U":5,"u":6,"b":[["99","1"]],"a":[]}}"#;
        assert_eq!(sdk.process_message(diff), Some(EventKind::DepthUpdate));
        assert_eq!(sdk.counters().updates_buffered(), 1);
        assert_eq!(sdk.counters().views_published(), 0);
        assert_eq!(sdk.status("BTCUSDT"), BookStatus::AwaitingSnapshot);

        sdk.process_snapshot("btcusdt", r#"{"lastUpdateId":5,"bids":[["100","2"]],"asks":[["101","1"]]}"#)
            .unwrap();
        assert_eq!(sdk.status("BTCUSDT"), BookStatus::Live);
        assert_eq!(sdk.counters().views_published(), 1);
        assert_eq!(sdk.view("BTCUSDT").unwrap().bids.len(), 2);

        assert!(sdk.set_aggregation("BTCUSDT", "0").is_err());
        sdk.set_aggregation("BTCUSDT", "10").unwrap();
        assert_eq!(sdk.counters().views_published(), 2);
    }

    #[test]
    fn test_unsubscribe_any_feed() {
        let mut sdk = sdk();
        let book = sdk.subscribe_book(|_: &str, _: &AggregatedView| {});
        let orders = sdk.subscribe_user_orders(|_: &UserOrderUpdate| {});
        assert!(sdk.unsubscribe(orders));
        assert!(sdk.unsubscribe(book));
        assert!(!sdk.unsubscribe(book));
    }
}
