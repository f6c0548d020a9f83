//! Display formatting for published views
//!
//! Runs outside the engine: the view stays exact and this module turns it
//! into fixed-decimal strings for a UI.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use super::{AggregatedLevel, AggregatedView};

/// One formatted row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayRow {
    /// Price, thousands-separated, price decimals
    pub price: String,
    /// Level quantity, thousands-separated, base decimals
    pub quantity: String,
    /// Cumulative quantity, base decimals, no separators
    pub cumulative: String,
}

/// View formatted for display; each side is padded with `None` to `max_rows`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayView {
    pub symbol: String,
    pub bids: Vec<Option<DisplayRow>>,
    pub asks: Vec<Option<DisplayRow>>,
    pub max_cumulative: String,
    pub price_decimals: u32,
}

/// Round half away from zero to exactly `decimals` places
pub fn format_fixed(value: Decimal, decimals: u32) -> String {
    let mut rounded = value.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(decimals);
    rounded.to_string()
}

/// [`format_fixed`] with `,` between thousands in the integer part
pub fn format_with_separators(value: Decimal, decimals: u32) -> String {
    let fixed = format_fixed(value, decimals);
    let (sign, unsigned) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed.as_str()),
    };
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (unsigned, None),
    };

    let mut out = String::with_capacity(fixed.len() + integer.len() / 3);
    out.push_str(sign);
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    if let Some(fraction) = fraction {
        out.push('.');
        out.push_str(fraction);
    }
    out
}

fn rows(levels: &[AggregatedLevel], price_decimals: u32, base_decimals: u32, max_rows: usize) -> Vec<Option<DisplayRow>> {
    let mut rows: Vec<Option<DisplayRow>> = levels
        .iter()
        .take(max_rows)
        .map(|level| {
            Some(DisplayRow {
                price: format_with_separators(level.price, price_decimals),
                quantity: format_with_separators(level.quantity, base_decimals),
                cumulative: format_fixed(level.cumulative_quantity, base_decimals),
            })
        })
        .collect();
    rows.resize(max_rows.max(rows.len()), None);
    rows
}

impl DisplayView {
    pub fn from_view(view: &AggregatedView, max_rows: usize) -> Self {
        let price_decimals = view.config.price_decimals();
        let base_decimals = u32::from(view.config.base_decimals());

        Self {
            symbol: view.symbol.clone(),
            bids: rows(&view.bids, price_decimals, base_decimals, max_rows),
            asks: rows(&view.asks, price_decimals, base_decimals, max_rows),
            max_cumulative: view.max_cumulative_quantity.normalize().to_string(),
            price_decimals,
        }
    }
}
