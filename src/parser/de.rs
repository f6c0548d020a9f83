//! Field deserializers shared by both wire dialects
//!
//! Exchanges are inconsistent about quoting: prices arrive as `"50000.00"` or
//! `50000.0`, update ids as `101` or `"101"`. Everything here accepts both.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use std::str::FromStr;

use super::events::PriceLevel;

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(serde_json::Number),
    Flag(bool),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Scalar::Text(s) => s,
            Scalar::Number(n) => n.to_string(),
            Scalar::Flag(b) => b.to_string(),
        }
    }
}

/// Parse a decimal string, tolerating thousands separators and exponents
pub(crate) fn parse_decimal(raw: &str) -> Result<Decimal, rust_decimal::Error> {
    let cleaned: String;
    let text = if raw.contains([',', ' ']) {
        cleaned = raw.chars().filter(|c| *c != ',' && *c != ' ').collect();
        cleaned.as_str()
    } else {
        raw.trim()
    };

    match Decimal::from_str(text) {
        Ok(value) => Ok(value),
        Err(err) if text.contains(['e', 'E']) => Decimal::from_scientific(text).map_err(|_| err),
        Err(err) => Err(err),
    }
}

fn scalar_to_decimal<E: serde::de::Error>(scalar: Scalar) -> Result<Decimal, E> {
    match scalar {
        Scalar::Flag(_) => Err(E::custom("expected a decimal, found a boolean")),
        other => {
            let text = other.into_text();
            parse_decimal(&text).map_err(|e| E::custom(format!("invalid decimal {text:?}: {e}")))
        }
    }
}

fn scalar_to_u64<E: serde::de::Error>(scalar: Scalar) -> Result<u64, E> {
    match scalar {
        Scalar::Number(n) => n
            .as_u64()
            .ok_or_else(|| E::custom(format!("expected an unsigned integer, found {n}"))),
        Scalar::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| E::custom(format!("expected an unsigned integer, found {s:?}"))),
        Scalar::Flag(_) => Err(E::custom("expected an unsigned integer, found a boolean")),
    }
}

/// Custom deserializer for Decimal from string or number
pub(crate) fn decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    scalar_to_decimal(Scalar::deserialize(deserializer)?)
}

pub(crate) fn opt_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Scalar>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Scalar::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(scalar) => scalar_to_decimal(scalar).map(Some),
    }
}

/// Sequence ids and epoch times, quoted or not
pub(crate) fn unsigned<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    scalar_to_u64(Scalar::deserialize(deserializer)?)
}

pub(crate) fn opt_unsigned<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Scalar>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Scalar::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(scalar) => scalar_to_u64(scalar).map(Some),
    }
}

/// Identifiers that some venues send as numbers and others as strings
pub(crate) fn opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?
        .map(Scalar::into_text)
        .filter(|s| !s.is_empty()))
}

/// `true`/`false`, or the strings `"true"`/`"1"`
pub(crate) fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::Flag(b)) => b,
        Some(Scalar::Text(s)) => s == "true" || s == "1",
        Some(Scalar::Number(n)) => n.as_u64() == Some(1),
        None => false,
    })
}

/// Custom deserializer for price levels from array of pairs
///
/// Extra trailing elements in a level (some venues append an order count)
/// are ignored.
pub(crate) fn price_levels<'de, D>(deserializer: D) -> Result<Vec<PriceLevel>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<Vec<Scalar>> = Deserialize::deserialize(deserializer)?;
    raw.into_iter()
        .map(|pair| {
            if pair.len() < 2 {
                return Err(serde::de::Error::custom("Invalid price level format"));
            }
            let mut items = pair.into_iter();
            let price = items.next().map(scalar_to_decimal::<D::Error>).transpose()?;
            let quantity = items.next().map(scalar_to_decimal::<D::Error>).transpose()?;
            match (price, quantity) {
                (Some(price), Some(quantity)) => Ok(PriceLevel { price, quantity }),
                _ => Err(serde::de::Error::custom("Invalid price level format")),
            }
        })
        .collect()
}
