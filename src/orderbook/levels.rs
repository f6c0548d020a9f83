//! Price-level map for one side of one book
//!
//! Uses BTreeMap for efficient sorted price level management. Keys are stored
//! ascending; bids are walked from the back so both sides yield best price
//! first.

use rust_decimal::Decimal;
use std::collections::btree_map;
use std::collections::BTreeMap;

use super::Side;
use crate::parser::PriceLevel;

/// Ordered price → quantity map; never holds a quantity ≤ 0
#[derive(Debug, Clone, PartialEq)]
pub struct PriceLevelMap {
    side: Side,
    levels: BTreeMap<Decimal, Decimal>,
}

impl PriceLevelMap {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Insert, overwrite, or (on a zero quantity) remove the level at `price`
    pub fn upsert(&mut self, price: Decimal, quantity: Decimal) {
        if quantity <= Decimal::ZERO {
            self.levels.remove(&price);
        } else {
            // Stored without trailing zeros so views do not depend on wire formatting.
            self.levels.insert(price.normalize(), quantity);
        }
    }

    /// Replace every level with `entries`, dropping non-positive quantities
    pub fn snapshot_replace<'a, I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = &'a PriceLevel>,
    {
        self.levels = entries
            .into_iter()
            .filter(|level| level.quantity > Decimal::ZERO)
            .map(|level| (level.price.normalize(), level.quantity))
            .collect();
    }

    /// Best price: highest bid or lowest ask
    pub fn best_price(&self) -> Option<Decimal> {
        self.iter().next().map(|level| level.price)
    }

    /// Levels best-first; clone the iterator to walk the side again
    pub fn to_ordered_sequence(&self) -> LevelIter<'_> {
        self.iter()
    }

    pub fn iter(&self) -> LevelIter<'_> {
        LevelIter {
            side: self.side,
            inner: self.levels.iter(),
        }
    }

    pub fn quantity_at(&self, price: Decimal) -> Option<Decimal> {
        self.levels.get(&price.normalize()).copied()
    }

    /// Drop the worst levels beyond `depth_limit`
    pub fn truncate(&mut self, depth_limit: usize) {
        while self.levels.len() > depth_limit {
            match self.side {
                Side::Bid => self.levels.pop_first(),
                Side::Ask => self.levels.pop_last(),
            };
        }
    }

    /// Total quantity across all levels
    pub fn total_quantity(&self) -> Decimal {
        self.levels.values().copied().sum()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn clear(&mut self) {
        self.levels.clear();
    }
}

/// Best-first iterator over a [`PriceLevelMap`]
#[derive(Debug, Clone)]
pub struct LevelIter<'a> {
    side: Side,
    inner: btree_map::Iter<'a, Decimal, Decimal>,
}

impl Iterator for LevelIter<'_> {
    type Item = PriceLevel;

    fn next(&mut self) -> Option<PriceLevel> {
        let (price, quantity) = match self.side {
            Side::Bid => self.inner.next_back()?,
            Side::Ask => self.inner.next()?,
        };
        Some(PriceLevel::new(*price, *quantity))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for LevelIter<'_> {}
