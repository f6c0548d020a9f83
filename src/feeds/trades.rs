//! Recent trades per symbol

use std::collections::{HashMap, VecDeque};
use tracing::debug;

use crate::parser::{normalize_symbol, Trade};
use crate::publisher::{Registry, SubscriptionId};

pub type TradeListener = dyn FnMut(&Trade) + Send;

/// Bounded tape of the latest trades for every symbol
///
/// Each symbol keeps at most `max_rows` trades; the oldest fall off first.
pub struct TradeTape {
    max_rows: usize,
    tapes: HashMap<String, VecDeque<Trade>>,
    listeners: Registry<TradeListener>,
}

impl std::fmt::Debug for TradeTape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeTape")
            .field("max_rows", &self.max_rows)
            .field("symbols", &self.tapes.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl TradeTape {
    pub fn new(max_rows: usize) -> Self {
        Self {
            max_rows: max_rows.max(1),
            tapes: HashMap::new(),
            listeners: Registry::new(),
        }
    }

    /// Record trades in arrival order, notifying listeners once per trade
    pub fn record(&mut self, trades: impl IntoIterator<Item = Trade>) {
        for trade in trades {
            self.listeners.dispatch(|listener| listener(&trade));

            let tape = self
                .tapes
                .entry(normalize_symbol(&trade.symbol))
                .or_default();
            tape.push_back(trade);
            while tape.len() > self.max_rows {
                tape.pop_front();
            }
        }
    }

    /// Trades for `symbol`, newest first
    pub fn recent(&self, symbol: &str) -> Vec<Trade> {
        self.tapes
            .get(&normalize_symbol(symbol))
            .map(|tape| tape.iter().rev().cloned().collect())
            .unwrap_or_default()
    }

    pub fn last(&self, symbol: &str) -> Option<&Trade> {
        self.tapes.get(&normalize_symbol(symbol)).and_then(VecDeque::back)
    }

    pub fn len(&self, symbol: &str) -> usize {
        self.tapes.get(&normalize_symbol(symbol)).map_or(0, VecDeque::len)
    }

    pub fn max_rows(&self) -> usize {
        self.max_rows
    }

    /// Change the tape length, dropping the oldest trades if it shrinks
    pub fn set_max_rows(&mut self, max_rows: usize) {
        self.max_rows = max_rows.max(1);
        for tape in self.tapes.values_mut() {
            while tape.len() > self.max_rows {
                tape.pop_front();
            }
        }
    }

    pub fn reset(&mut self, symbol: &str) {
        if self.tapes.remove(&normalize_symbol(symbol)).is_some() {
            debug!(symbol = %symbol, "Trade tape cleared");
        }
    }

    pub fn clear(&mut self) {
        self.tapes.clear();
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&Trade) + Send + 'static,
    {
        self.listeners.subscribe(Box::new(listener))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::TradeSide;
    use rust_decimal::Decimal;
    use std::sync::{Arc, Mutex};

    fn trade(symbol: &str, id: u64) -> Trade {
        Trade {
            symbol: symbol.to_string(),
            trade_id: Some(id.to_string()),
            price: Decimal::from(100 + id),
            quantity: Decimal::ONE,
            side: TradeSide::Buy,
            trade_time: None,
        }
    }

    #[test]
    fn test_tape_is_bounded() {
        let mut tape = TradeTape::new(3);
        tape.record((1..=5).map(|id| trade("BTCUSDT", id)));

        let recent = tape.recent("btcusdt");
        let ids: Vec<_> = recent.iter().filter_map(|t| t.trade_id.as_deref()).collect();
        assert_eq!(ids, vec!["5", "4", "3"]);
        assert_eq!(tape.last("BTCUSDT").unwrap().trade_id.as_deref(), Some("5"));
    }

    #[test]
    fn test_listener_sees_every_trade() {
        let mut tape = TradeTape::new(1);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let id = tape.subscribe(move |t: &Trade| sink.lock().unwrap().push(t.price));

        tape.record(vec![trade("ETHUSDT", 1), trade("ETHUSDT", 2)]);
        assert_eq!(seen.lock().unwrap().len(), 2);
        assert_eq!(tape.len("ETHUSDT"), 1);

        assert!(tape.unsubscribe(id));
        tape.record(vec![trade("ETHUSDT", 3)]);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_reset_and_resize() {
        let mut tape = TradeTape::new(10);
        tape.record((1..=6).map(|id| trade("BTCUSDT", id)));
        tape.record(vec![trade("ETHUSDT", 1)]);

        tape.set_max_rows(2);
        assert_eq!(tape.len("BTCUSDT"), 2);

        tape.reset("BTCUSDT");
        assert!(tape.recent("BTCUSDT").is_empty());
        assert_eq!(tape.len("ETHUSDT"), 1);
    }
}
