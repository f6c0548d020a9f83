//! Per-symbol aggregation and precision settings

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::aggregate::TickSize;
use crate::error::{Result, SdkError};
use crate::parser::de::parse_decimal;

/// Largest number of decimals accepted for base or quote display
pub const MAX_DECIMALS: u8 = 18;

/// Tick size and display precision for one symbol
///
/// Setters validate before mutating: a rejected call leaves every field as it
/// was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// `None` means no aggregation (raw exchange levels)
    tick_size: Option<TickSize>,
    base_decimals: u8,
    quote_decimals: u8,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            tick_size: None,
            base_decimals: 5,
            quote_decimals: 2,
        }
    }
}

fn check_decimals(what: &str, value: u8) -> Result<()> {
    if value > MAX_DECIMALS {
        return Err(SdkError::InvalidConfig(format!(
            "{what} decimals must be at most {MAX_DECIMALS}, got {value}"
        )));
    }
    Ok(())
}

impl AggregationConfig {
    pub fn new(base_decimals: u8, quote_decimals: u8) -> Result<Self> {
        check_decimals("base", base_decimals)?;
        check_decimals("quote", quote_decimals)?;
        Ok(Self {
            tick_size: None,
            base_decimals,
            quote_decimals,
        })
    }

    pub fn tick_size(&self) -> Option<TickSize> {
        self.tick_size
    }

    pub fn base_decimals(&self) -> u8 {
        self.base_decimals
    }

    pub fn quote_decimals(&self) -> u8 {
        self.quote_decimals
    }

    pub fn set_tick_size(&mut self, tick: Decimal) -> Result<()> {
        self.tick_size = Some(TickSize::new(tick)?);
        Ok(())
    }

    /// Parse and set a tick size given as text, e.g. `"0.01"`
    pub fn set_tick_size_str(&mut self, tick: &str) -> Result<()> {
        let value = parse_decimal(tick)
            .map_err(|e| SdkError::InvalidConfig(format!("invalid tick size {tick:?}: {e}")))?;
        self.set_tick_size(value)
    }

    pub fn clear_tick_size(&mut self) {
        self.tick_size = None;
    }

    /// Update either precision; `None` keeps the current value
    pub fn set_decimals(&mut self, base: Option<u8>, quote: Option<u8>) -> Result<()> {
        if let Some(base) = base {
            check_decimals("base", base)?;
        }
        if let Some(quote) = quote {
            check_decimals("quote", quote)?;
        }
        if let Some(base) = base {
            self.base_decimals = base;
        }
        if let Some(quote) = quote {
            self.quote_decimals = quote;
        }
        Ok(())
    }

    /// Decimals used when displaying prices
    ///
    /// Quote decimals without aggregation, none for whole-number ticks, and
    /// the tick's own scale otherwise.
    pub fn price_decimals(&self) -> u32 {
        match self.tick_size {
            None => u32::from(self.quote_decimals),
            Some(tick) if tick.value() >= Decimal::ONE => 0,
            Some(tick) => tick.value().scale(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults() {
        let config = AggregationConfig::default();
        assert_eq!(config.tick_size(), None);
        assert_eq!(config.base_decimals(), 5);
        assert_eq!(config.price_decimals(), 2);
    }

    #[test]
    fn test_price_decimals_follow_tick() {
        let mut config = AggregationConfig::default();
        config.set_tick_size_str("0.10").unwrap();
        assert_eq!(config.price_decimals(), 2);

        config.set_tick_size(dec!(0.001)).unwrap();
        assert_eq!(config.price_decimals(), 3);

        config.set_tick_size_str("10").unwrap();
        assert_eq!(config.price_decimals(), 0);

        config.clear_tick_size();
        assert_eq!(config.price_decimals(), 2);
    }

    #[test]
    fn test_rejected_tick_keeps_previous() {
        let mut config = AggregationConfig::default();
        config.set_tick_size(dec!(0.5)).unwrap();

        assert!(config.set_tick_size(dec!(0)).is_err());
        assert!(config.set_tick_size_str("-1").is_err());
        assert!(config.set_tick_size_str("abc").is_err());
        assert_eq!(config.tick_size().map(TickSize::value), Some(dec!(0.5)));
    }

    #[test]
    fn test_rejected_decimals_are_atomic() {
        let mut config = AggregationConfig::default();
        assert!(config.set_decimals(Some(8), Some(40)).is_err());
        assert_eq!(config.base_decimals(), 5);

        config.set_decimals(None, Some(4)).unwrap();
        assert_eq!(config.base_decimals(), 5);
        assert_eq!(config.quote_decimals(), 4);
        assert!(AggregationConfig::new(19, 2).is_err());
    }
}
