//! Latest candle per symbol and interval

use std::collections::HashMap;

use crate::parser::{normalize_symbol, Kline};
use crate::publisher::{Registry, SubscriptionId};

pub type KlineListener = dyn FnMut(&Kline) + Send;

#[derive(Debug, Default)]
pub struct KlineStore {
    latest: HashMap<(String, String), Kline>,
    listeners: Registry<KlineListener>,
}

impl KlineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the candle for its `(symbol, interval)` and notify listeners
    pub fn update(&mut self, kline: Kline) {
        self.listeners.dispatch(|listener| listener(&kline));
        let key = (normalize_symbol(&kline.symbol), kline.interval.clone());
        self.latest.insert(key, kline);
    }

    pub fn latest(&self, symbol: &str, interval: &str) -> Option<&Kline> {
        self.latest
            .get(&(normalize_symbol(symbol), interval.to_string()))
    }

    /// Intervals with a candle for `symbol`, sorted
    pub fn intervals(&self, symbol: &str) -> Vec<String> {
        let symbol = normalize_symbol(symbol);
        let mut intervals: Vec<String> = self
            .latest
            .keys()
            .filter(|(s, _)| *s == symbol)
            .map(|(_, interval)| interval.clone())
            .collect();
        intervals.sort();
        intervals
    }

    pub fn reset(&mut self, symbol: &str) {
        let symbol = normalize_symbol(symbol);
        self.latest.retain(|(s, _), _| *s != symbol);
    }

    pub fn clear(&mut self) {
        self.latest.clear();
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&Kline) + Send + 'static,
    {
        self.listeners.subscribe(Box::new(listener))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }
}
