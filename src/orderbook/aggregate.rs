//! Tick-size aggregation
//!
//! Bids are bucketed with `floor(price / tick) * tick` and asks with
//! `ceil(price / tick) * tick`, so an aggregated best bid never overstates the
//! raw best bid and an aggregated best ask never understates the raw best ask.
//! All arithmetic stays in `Decimal`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::levels::PriceLevelMap;
use super::{AggregatedLevel, Side};
use crate::error::{Result, SdkError};

/// Validated, strictly positive tick size
///
/// Keeps the scale it was written with: `0.10` displays two price decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct TickSize(Decimal);

impl TickSize {
    pub fn new(tick: Decimal) -> Result<Self> {
        if tick <= Decimal::ZERO {
            return Err(SdkError::InvalidConfig(format!(
                "tick size must be positive, got {tick}"
            )));
        }
        Ok(Self(tick))
    }

    pub fn value(self) -> Decimal {
        self.0
    }

    /// Bucket `price` falls into on `side`
    ///
    /// A tick too fine to divide `price` by within `Decimal` range leaves the
    /// price as its own bucket.
    pub fn bucket(self, price: Decimal, side: Side) -> Decimal {
        let Some(steps) = price.checked_div(self.0) else {
            return price;
        };
        let steps = match side {
            Side::Bid => steps.floor(),
            Side::Ask => steps.ceil(),
        };
        steps
            .checked_mul(self.0)
            .map_or(price, |d| d.normalize())
    }
}

impl TryFrom<Decimal> for TickSize {
    type Error = SdkError;

    fn try_from(tick: Decimal) -> Result<Self> {
        TickSize::new(tick)
    }
}

impl From<TickSize> for Decimal {
    fn from(tick: TickSize) -> Decimal {
        tick.0
    }
}

impl fmt::Display for TickSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Aggregate one side best-first into at most `max_levels` buckets
///
/// With no tick size every raw level is its own bucket. Buckets at or below
/// zero are skipped. Levels past the last emitted bucket are ignored.
pub fn aggregate_side(
    levels: &PriceLevelMap,
    tick_size: Option<TickSize>,
    max_levels: usize,
) -> Vec<AggregatedLevel> {
    let side = levels.side();
    let mut out: Vec<AggregatedLevel> = Vec::with_capacity(max_levels.min(levels.len()));
    let mut cumulative = Decimal::ZERO;

    for level in levels.to_ordered_sequence() {
        let bucket = match tick_size {
            Some(tick) => tick.bucket(level.price, side),
            None => level.price,
        };
        if bucket <= Decimal::ZERO {
            continue;
        }

        match out.last_mut() {
            Some(last) if last.price == bucket => {
                last.quantity += level.quantity;
                last.cumulative_quantity += level.quantity;
            }
            _ => {
                if out.len() == max_levels {
                    break;
                }
                out.push(AggregatedLevel {
                    price: bucket,
                    quantity: level.quantity,
                    cumulative_quantity: cumulative + level.quantity,
                });
            }
        }
        cumulative += level.quantity;
    }

    out
}

/// Aggregate with an unchecked tick size, rejecting non-positive ticks
pub fn aggregate(
    levels: &PriceLevelMap,
    tick_size: Decimal,
    max_levels: usize,
) -> Result<Vec<AggregatedLevel>> {
    let tick = TickSize::new(tick_size)?;
    Ok(aggregate_side(levels, Some(tick), max_levels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn side(side: Side, levels: &[(Decimal, Decimal)]) -> PriceLevelMap {
        let mut map = PriceLevelMap::new(side);
        for (price, quantity) in levels {
            map.upsert(*price, *quantity);
        }
        map
    }

    fn triples(levels: &[AggregatedLevel]) -> Vec<(Decimal, Decimal, Decimal)> {
        levels
            .iter()
            .map(|l| (l.price, l.quantity, l.cumulative_quantity))
            .collect()
    }

    #[test]
    fn test_bids_floor_into_buckets() {
        let bids = side(
            Side::Bid,
            &[(dec!(100.40), dec!(1)), (dec!(100.10), dec!(2)), (dec!(99.90), dec!(3))],
        );
        let out = aggregate(&bids, dec!(1.00), 50).unwrap();

        assert_eq!(
            triples(&out),
            vec![(dec!(100), dec!(3), dec!(3)), (dec!(99), dec!(3), dec!(6))]
        );
    }

    #[test]
    fn test_asks_ceil_into_buckets() {
        let asks = side(
            Side::Ask,
            &[(dec!(100.10), dec!(1)), (dec!(100.90), dec!(1)), (dec!(101.00), dec!(4))],
        );
        let out = aggregate(&asks, dec!(1), 50).unwrap();

        // A price on a boundary maps to itself.
        assert_eq!(
            triples(&out),
            vec![(dec!(101), dec!(6), dec!(6))]
        );
    }

    #[test]
    fn test_fine_tick_is_identity() {
        let bids = side(Side::Bid, &[(dec!(100.00), dec!(2)), (dec!(99.50), dec!(1))]);
        let out = aggregate(&bids, dec!(0.01), 50).unwrap();
        assert_eq!(
            triples(&out),
            vec![(dec!(100), dec!(2), dec!(2)), (dec!(99.5), dec!(1), dec!(3))]
        );
        assert_eq!(out, aggregate_side(&bids, None, 50));
    }

    #[test]
    fn test_max_levels_drops_excess() {
        let asks = side(
            Side::Ask,
            &[(dec!(1), dec!(1)), (dec!(2), dec!(1)), (dec!(3), dec!(1)), (dec!(4), dec!(1))],
        );
        let out = aggregate_side(&asks, None, 2);

        // Excess depth is dropped, not folded into the last visible level.
        assert_eq!(
            triples(&out),
            vec![(dec!(1), dec!(1), dec!(1)), (dec!(2), dec!(1), dec!(2))]
        );
        assert!(aggregate_side(&asks, None, 0).is_empty());
    }

    #[test]
    fn test_last_bucket_is_complete() {
        let bids = side(
            Side::Bid,
            &[(dec!(10.9), dec!(1)), (dec!(10.1), dec!(1)), (dec!(9.5), dec!(5))],
        );
        let out = aggregate(&bids, dec!(1), 1).unwrap();
        assert_eq!(triples(&out), vec![(dec!(10), dec!(2), dec!(2))]);
    }

    #[test]
    fn test_bucket_at_zero_is_skipped() {
        let bids = side(Side::Bid, &[(dec!(1.5), dec!(1)), (dec!(0.4), dec!(7))]);
        let out = aggregate(&bids, dec!(1), 50).unwrap();
        assert_eq!(triples(&out), vec![(dec!(1), dec!(1), dec!(1))]);
    }

    #[test]
    fn test_invalid_tick_rejected() {
        let bids = side(Side::Bid, &[(dec!(1), dec!(1))]);
        assert!(matches!(aggregate(&bids, dec!(0), 10), Err(SdkError::InvalidConfig(_))));
        assert!(matches!(aggregate(&bids, dec!(-0.5), 10), Err(SdkError::InvalidConfig(_))));
    }

    #[test]
    fn test_extreme_tick_does_not_overflow() {
        let tick = TickSize::new(dec!(0.0000000000000000000000000001)).unwrap();
        assert_eq!(tick.bucket(dec!(100), Side::Bid), dec!(100));
        assert_eq!(tick.bucket(dec!(100), Side::Ask), dec!(100));

        let bids = side(Side::Bid, &[(dec!(100), dec!(1)), (dec!(99.5), dec!(2))]);
        let out = aggregate_side(&bids, Some(tick), 5);
        assert_eq!(
            triples(&out),
            vec![(dec!(100), dec!(1), dec!(1)), (dec!(99.5), dec!(2), dec!(3))]
        );

        // Ratios that still fit bucket normally.
        let tick = TickSize::new(dec!(0.00000000000000000001)).unwrap();
        assert_eq!(tick.bucket(dec!(100.5), Side::Ask), dec!(100.5));
    }

    #[test]
    fn test_empty_side() {
        let asks = PriceLevelMap::new(Side::Ask);
        assert!(aggregate(&asks, dec!(0.5), 10).unwrap().is_empty());
    }

    #[test]
    fn test_cumulative_is_monotonic() {
        let bids = side(
            Side::Bid,
            &[(dec!(5.55), dec!(0.1)), (dec!(5.21), dec!(2)), (dec!(4.99), dec!(3)), (dec!(3.01), dec!(1))],
        );
        let out = aggregate(&bids, dec!(0.5), 50).unwrap();

        assert!(out.windows(2).all(|w| w[0].price > w[1].price));
        assert!(out.windows(2).all(|w| w[0].cumulative_quantity <= w[1].cumulative_quantity));
        assert_eq!(out.last().unwrap().cumulative_quantity, bids.total_quantity());
    }
}
