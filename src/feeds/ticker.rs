//! Latest 24h ticker per symbol

use std::collections::BTreeMap;

use crate::parser::{normalize_symbol, Ticker};
use crate::publisher::{Registry, SubscriptionId};

pub type TickerListener = dyn FnMut(&Ticker) + Send;

/// Receives every ticker batch as it arrived, e.g. a whole `!miniTicker@arr` frame
pub type TickerBatchListener = dyn FnMut(&[Ticker]) + Send;

#[derive(Debug, Default)]
pub struct TickerBoard {
    tickers: BTreeMap<String, Ticker>,
    listeners: Registry<TickerListener>,
    batch_listeners: Registry<TickerBatchListener>,
}

impl TickerBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a batch, then notify per-ticker listeners followed by batch listeners
    pub fn update(&mut self, tickers: Vec<Ticker>) {
        if tickers.is_empty() {
            return;
        }
        for ticker in &tickers {
            self.listeners.dispatch(|listener| listener(ticker));
            self.tickers
                .insert(normalize_symbol(&ticker.symbol), ticker.clone());
        }
        self.batch_listeners.dispatch(|listener| listener(&tickers));
    }

    pub fn get(&self, symbol: &str) -> Option<&Ticker> {
        self.tickers.get(&normalize_symbol(symbol))
    }

    /// Every known ticker ordered by symbol
    pub fn all(&self) -> impl Iterator<Item = &Ticker> {
        self.tickers.values()
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    pub fn remove(&mut self, symbol: &str) -> Option<Ticker> {
        self.tickers.remove(&normalize_symbol(symbol))
    }

    pub fn clear(&mut self) {
        self.tickers.clear();
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&Ticker) + Send + 'static,
    {
        self.listeners.subscribe(Box::new(listener))
    }

    pub fn subscribe_batch<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&[Ticker]) + Send + 'static,
    {
        self.batch_listeners.subscribe(Box::new(listener))
    }

    /// Remove a listener registered by either subscribe call
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id) || self.batch_listeners.unsubscribe(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::{Arc, Mutex};

    fn ticker(symbol: &str, last: rust_decimal::Decimal) -> Ticker {
        Ticker {
            symbol: symbol.to_string(),
            last_price: last,
            open_price: None,
            high_price: None,
            low_price: None,
            volume: None,
            quote_volume: None,
            price_change: None,
            price_change_percent: None,
            event_time: None,
        }
    }

    #[test]
    fn test_latest_wins() {
        let mut board = TickerBoard::new();
        board.update(vec![ticker("BTCUSDT", dec!(100))]);
        board.update(vec![ticker("BTCUSDT", dec!(101)), ticker("ETHUSDT", dec!(5))]);

        assert_eq!(board.len(), 2);
        assert_eq!(board.get("btcusdt").unwrap().last_price, dec!(101));
        let symbols: Vec<_> = board.all().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTCUSDT", "ETHUSDT"]);
    }

    #[test]
    fn test_single_and_batch_listeners() {
        let mut board = TickerBoard::new();
        let singles = Arc::new(Mutex::new(0));
        let batches = Arc::new(Mutex::new(Vec::new()));

        let sink = singles.clone();
        board.subscribe(move |_: &Ticker| *sink.lock().unwrap() += 1);
        let sink = batches.clone();
        let batch_id = board.subscribe_batch(move |batch: &[Ticker]| sink.lock().unwrap().push(batch.len()));

        board.update(vec![ticker("BTCUSDT", dec!(1)), ticker("ETHUSDT", dec!(2))]);
        board.update(vec![]);
        assert_eq!(*singles.lock().unwrap(), 2);
        assert_eq!(*batches.lock().unwrap(), vec![2]);

        assert!(board.unsubscribe(batch_id));
        board.update(vec![ticker("BTCUSDT", dec!(3))]);
        assert_eq!(*singles.lock().unwrap(), 3);
        assert_eq!(batches.lock().unwrap().len(), 1);
    }
}
