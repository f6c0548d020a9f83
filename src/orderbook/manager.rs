//! Order book manager
//!
//! Owns every symbol's book and aggregation config, and publishes exactly one
//! view to the registered listeners per accepted mutation.

use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{info, trace, warn};

use super::{AggregatedView, AggregationConfig, BookStatus, OrderBook, SequenceGap};
use super::book::{SnapshotOutcome, UpdateOutcome};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::parser::{normalize_symbol, DepthSnapshot, DepthUpdate};
use crate::publisher::{Registry, SubscriptionId};

/// Receives published views and sequence-gap signals
///
/// Called synchronously on the thread that mutates the book.
#[cfg_attr(test, mockall::automock)]
pub trait BookListener: Send {
    fn on_update(&mut self, symbol: &str, view: &AggregatedView);

    fn on_sequence_gap(&mut self, _gap: &SequenceGap) {}
}

impl<F> BookListener for F
where
    F: FnMut(&str, &AggregatedView) + Send,
{
    fn on_update(&mut self, symbol: &str, view: &AggregatedView) {
        self(symbol, view)
    }
}

#[derive(Debug)]
struct BookEntry {
    book: OrderBook,
    config: AggregationConfig,
}

/// Manages order books for multiple symbols
pub struct OrderBookManager {
    books: HashMap<String, BookEntry>,
    engine: EngineConfig,
    default_config: AggregationConfig,
    listeners: Registry<dyn BookListener>,
    published: u64,
}

impl Default for OrderBookManager {
    fn default() -> Self {
        Self {
            books: HashMap::new(),
            engine: EngineConfig::default(),
            default_config: AggregationConfig::default(),
            listeners: Registry::new(),
            published: 0,
        }
    }
}

impl std::fmt::Debug for OrderBookManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderBookManager")
            .field("books", &self.books.len())
            .field("engine", &self.engine)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl OrderBookManager {
    /// Create a manager sized by `engine`
    pub fn new(engine: EngineConfig) -> Result<Self> {
        engine.validate()?;
        Ok(Self {
            default_config: engine.default_aggregation()?,
            engine,
            ..Self::default()
        })
    }

    pub fn engine(&self) -> &EngineConfig {
        &self.engine
    }

    fn entry(&mut self, symbol: &str) -> &mut BookEntry {
        let engine = &self.engine;
        let default_config = self.default_config;
        self.books
            .entry(symbol.to_string())
            .or_insert_with(|| BookEntry {
                book: OrderBook::new(symbol, engine.depth_limit, engine.pending_updates),
                config: default_config,
            })
    }

    /// Replace a book from a snapshot and publish once
    pub fn apply_snapshot(&mut self, snapshot: &DepthSnapshot) -> SnapshotOutcome {
        let symbol = normalize_symbol(&snapshot.symbol);
        let outcome = self.entry(&symbol).book.apply_snapshot(snapshot);
        info!(
            symbol = %symbol,
            last_update_id = snapshot.last_update_id,
            replayed = outcome.replayed,
            dropped = outcome.dropped,
            "Applied snapshot"
        );

        for gap in &outcome.gaps {
            self.notify_gap(gap);
        }
        self.publish(&symbol);
        outcome
    }

    /// Apply a diff; publishes unless the diff was only buffered
    pub fn apply_update(&mut self, update: &DepthUpdate) -> UpdateOutcome {
        let symbol = normalize_symbol(&update.symbol);
        let outcome = self.entry(&symbol).book.apply_update(update);

        match &outcome {
            UpdateOutcome::Applied { gap: Some(gap) } => self.notify_gap(gap),
            UpdateOutcome::Seeded => {
                info!(symbol = %symbol, update_id = ?update.final_update_id, "Seeded book from first update")
            }
            _ => {}
        }
        if outcome.mutated() {
            self.publish(&symbol);
        }
        outcome
    }

    /// Validate a config change on a copy, then commit it and republish
    ///
    /// A rejected change neither creates the book nor publishes.
    fn reconfigure<F>(&mut self, symbol: &str, change: F) -> Result<()>
    where
        F: FnOnce(&mut AggregationConfig) -> Result<()>,
    {
        let symbol = normalize_symbol(symbol);
        let mut config = self.config(&symbol).unwrap_or(self.default_config);
        change(&mut config)?;
        self.entry(&symbol).config = config;
        self.publish(&symbol);
        Ok(())
    }

    /// Set the tick size from text such as `"0.01"` and republish
    pub fn set_aggregation(&mut self, symbol: &str, tick_size: &str) -> Result<()> {
        self.reconfigure(symbol, |config| config.set_tick_size_str(tick_size))
    }

    pub fn set_tick_size(&mut self, symbol: &str, tick_size: Decimal) -> Result<()> {
        self.reconfigure(symbol, |config| config.set_tick_size(tick_size))
    }

    /// Back to raw exchange levels and republish
    pub fn clear_aggregation(&mut self, symbol: &str) {
        let symbol = normalize_symbol(symbol);
        self.entry(&symbol).config.clear_tick_size();
        self.publish(&symbol);
    }

    /// Update display precision; `None` keeps the current value
    pub fn set_decimals(
        &mut self,
        symbol: &str,
        base_decimals: Option<u8>,
        quote_decimals: Option<u8>,
    ) -> Result<()> {
        self.reconfigure(symbol, |config| {
            config.set_decimals(base_decimals, quote_decimals)
        })
    }

    /// Clear a book to `Uninitialized` and publish the empty view
    ///
    /// Aggregation settings are kept.
    pub fn reset(&mut self, symbol: &str) {
        let symbol = normalize_symbol(symbol);
        self.entry(&symbol).book.reset();
        info!(symbol = %symbol, "Order book reset");
        self.publish(&symbol);
    }

    /// Current view without publishing
    pub fn view(&self, symbol: &str) -> Option<AggregatedView> {
        self.books
            .get(&normalize_symbol(symbol))
            .map(|entry| entry.book.view(&entry.config, self.engine.max_rows))
    }

    pub fn config(&self, symbol: &str) -> Option<AggregationConfig> {
        self.books.get(&normalize_symbol(symbol)).map(|entry| entry.config)
    }

    pub fn book(&self, symbol: &str) -> Option<&OrderBook> {
        self.books.get(&normalize_symbol(symbol)).map(|entry| &entry.book)
    }

    pub fn status(&self, symbol: &str) -> BookStatus {
        self.book(symbol)
            .map(OrderBook::status)
            .unwrap_or(BookStatus::Uninitialized)
    }

    /// Get list of symbols being tracked
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.books.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn subscribe(&mut self, listener: Box<dyn BookListener>) -> SubscriptionId {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Views published since creation
    pub fn published(&self) -> u64 {
        self.published
    }

    fn notify_gap(&mut self, gap: &SequenceGap) {
        warn!(
            symbol = %gap.symbol,
            expected = gap.expected,
            actual = gap.actual,
            "Sequence gap detected, resync may be needed"
        );
        self.listeners.dispatch(|listener| listener.on_sequence_gap(gap));
    }

    fn publish(&mut self, symbol: &str) {
        let Some(view) = self.view(symbol) else {
            return;
        };
        trace!(
            symbol = %symbol,
            bids = view.bids.len(),
            asks = view.asks.len(),
            last_update_id = ?view.last_update_id,
            "Publishing view"
        );
        self.published += 1;
        self.listeners
            .dispatch(|listener| listener.on_update(symbol, &view));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{PriceLevel, SyncMode};
    use rust_decimal_macros::dec;
    use std::sync::{Arc, Mutex};

    fn snapshot(bids: &[(Decimal, Decimal)], asks: &[(Decimal, Decimal)], id: u64) -> DepthSnapshot {
        DepthSnapshot {
            symbol: "BTCUSDT".to_string(),
            bids: bids.iter().map(|(p, q)| PriceLevel::new(*p, *q)).collect(),
            asks: asks.iter().map(|(p, q)| PriceLevel::new(*p, *q)).collect(),
            last_update_id: id,
        }
    }

    fn update(first: u64, last: u64, bids: &[(Decimal, Decimal)]) -> DepthUpdate {
        DepthUpdate {
            symbol: "BTCUSDT".to_string(),
            bids: bids.iter().map(|(p, q)| PriceLevel::new(*p, *q)).collect(),
            asks: vec![],
            first_update_id: Some(first),
            final_update_id: Some(last),
            event_time: None,
            sync: SyncMode::Snapshot,
        }
    }

    /// Listener that records every view it receives
    fn recorder(manager: &mut OrderBookManager) -> Arc<Mutex<Vec<AggregatedView>>> {
        let views = Arc::new(Mutex::new(Vec::new()));
        let sink = views.clone();
        manager.subscribe(Box::new(move |_: &str, view: &AggregatedView| {
            sink.lock().unwrap().push(view.clone());
        }));
        views
    }

    #[test]
    fn test_exactly_one_publish_per_mutation() {
        let mut manager = OrderBookManager::default();
        let mut listener = MockBookListener::new();
        listener
            .expect_on_update()
            .withf(|_, view| view.symbol == "BTCUSDT")
            .times(6)
            .return_const(());
        listener.expect_on_sequence_gap().never();
        manager.subscribe(Box::new(listener));

        manager.apply_snapshot(&snapshot(&[(dec!(100), dec!(1))], &[], 1));
        manager.apply_update(&update(2, 2, &[(dec!(99), dec!(1))]));
        manager.set_aggregation("btcusdt", "1").unwrap();
        manager.set_decimals("BTCUSDT", Some(3), None).unwrap();
        manager.clear_aggregation("BTCUSDT");
        manager.reset("BTCUSDT");

        assert_eq!(manager.published(), 6);
    }

    #[test]
    fn test_rejected_config_publishes_nothing() {
        let mut manager = OrderBookManager::default();
        let mut listener = MockBookListener::new();
        listener.expect_on_update().never();
        manager.subscribe(Box::new(listener));

        assert!(manager.set_aggregation("BTCUSDT", "0").is_err());
        assert!(manager.set_aggregation("BTCUSDT", "-0.1").is_err());
        assert!(manager.set_decimals("BTCUSDT", Some(99), Some(2)).is_err());
        assert!(manager.set_tick_size("BTCUSDT", dec!(-1)).is_err());
        assert!(manager.symbols().is_empty());
        assert_eq!(manager.config("BTCUSDT"), None);

        // On an existing book the config is left as it was.
        manager.books.insert(
            "BTCUSDT".to_string(),
            BookEntry {
                book: OrderBook::new("BTCUSDT", 10, 4),
                config: AggregationConfig::default(),
            },
        );
        assert!(manager.set_decimals("BTCUSDT", Some(4), Some(19)).is_err());
        assert_eq!(manager.config("BTCUSDT"), Some(AggregationConfig::default()));
        assert_eq!(manager.symbols(), vec!["BTCUSDT".to_string()]);
    }

    #[test]
    fn test_buffered_update_publishes_nothing() {
        let mut manager = OrderBookManager::default();
        let views = recorder(&mut manager);

        let outcome = manager.apply_update(&update(5, 6, &[(dec!(10), dec!(1))]));
        assert_eq!(outcome, UpdateOutcome::Buffered { evicted: false });
        assert!(views.lock().unwrap().is_empty());
        assert_eq!(manager.status("BTCUSDT"), BookStatus::AwaitingSnapshot);

        manager.apply_snapshot(&snapshot(&[(dec!(11), dec!(1))], &[], 5));
        let views = views.lock().unwrap();
        // Snapshot and replayed diff arrive as a single view.
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].bids.len(), 2);
        assert_eq!(views[0].last_update_id, Some(6));
    }

    #[test]
    fn test_gap_signalled_before_view() {
        let mut manager = OrderBookManager::default();
        manager.apply_snapshot(&snapshot(&[(dec!(100), dec!(1))], &[], 10));

        let order = Arc::new(Mutex::new(Vec::new()));
        let mut listener = MockBookListener::new();
        let seen = order.clone();
        listener
            .expect_on_sequence_gap()
            .withf(|gap| gap.expected == 11 && gap.actual == 15)
            .times(1)
            .returning(move |_| seen.lock().unwrap().push("gap"));
        let seen = order.clone();
        listener
            .expect_on_update()
            .withf(|_, view| view.resync_needed)
            .times(1)
            .returning(move |_, _| seen.lock().unwrap().push("view"));
        manager.subscribe(Box::new(listener));

        manager.apply_update(&update(15, 16, &[(dec!(98), dec!(2))]));
        assert_eq!(*order.lock().unwrap(), vec!["gap", "view"]);
        assert_eq!(manager.book("BTCUSDT").unwrap().best_bid(), Some(dec!(100)));
        assert_eq!(manager.book("BTCUSDT").unwrap().bids().len(), 2);
    }

    #[test]
    fn test_reconfig_keeps_levels() {
        let mut manager = OrderBookManager::default();
        manager.apply_snapshot(&snapshot(
            &[(dec!(100.40), dec!(1)), (dec!(100.10), dec!(2)), (dec!(99.90), dec!(3))],
            &[(dec!(100.50), dec!(1))],
            1,
        ));

        manager.set_aggregation("BTCUSDT", "1.00").unwrap();
        let coarse = manager.view("BTCUSDT").unwrap();
        assert_eq!(coarse.bids.len(), 2);

        manager.clear_aggregation("BTCUSDT");
        let fine = manager.view("BTCUSDT").unwrap();
        assert_eq!(fine.bids.len(), 3);
        assert_eq!(fine.config.tick_size(), None);
    }

    #[test]
    fn test_same_tick_twice_is_idempotent() {
        let mut manager = OrderBookManager::default();
        let views = recorder(&mut manager);
        manager.apply_snapshot(&snapshot(&[(dec!(10.5), dec!(1)), (dec!(10.2), dec!(1))], &[], 1));

        manager.set_aggregation("BTCUSDT", "0.5").unwrap();
        manager.set_aggregation("BTCUSDT", "0.5").unwrap();

        let views = views.lock().unwrap();
        assert_eq!(views.len(), 3);
        assert_eq!(views[1], views[2]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut manager = OrderBookManager::default();
        let views = Arc::new(Mutex::new(0));
        let sink = views.clone();
        let id = manager.subscribe(Box::new(move |_: &str, _: &AggregatedView| {
            *sink.lock().unwrap() += 1;
        }));

        manager.reset("BTCUSDT");
        assert!(manager.unsubscribe(id));
        manager.reset("BTCUSDT");
        assert_eq!(*views.lock().unwrap(), 1);
    }

    #[test]
    fn test_engine_sizing() {
        let engine = EngineConfig {
            max_rows: 1,
            ..EngineConfig::default()
        };
        let mut manager = OrderBookManager::new(engine).unwrap();
        manager.apply_snapshot(&snapshot(&[(dec!(2), dec!(1)), (dec!(1), dec!(1))], &[], 1));
        assert_eq!(manager.view("BTCUSDT").unwrap().bids.len(), 1);

        let invalid = EngineConfig {
            max_rows: 0,
            ..EngineConfig::default()
        };
        assert!(OrderBookManager::new(invalid).is_err());
    }
}
