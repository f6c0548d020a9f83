//! Stream dialect: `{"stream": "<symbol>@<channel>", "data": {...}}`

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::events::{CanonicalEvent, EventKind, SyncMode, Ticker, Trade};
use super::wire::{WireDepthSnapshot, WireDepthUpdate, WireKlineEvent, WireTicker, WireTrade, WireUserOrder};
use super::{flat, normalize_symbol, protocol, DecodeError};

/// Stream name split at the first `@`
#[derive(Debug, PartialEq, Eq)]
struct StreamName<'a> {
    /// `None` for `!`-prefixed all-market streams
    symbol: Option<&'a str>,
    channel: &'a str,
}

fn split_stream(stream: &str) -> StreamName<'_> {
    if let Some(all_market) = stream.strip_prefix('!') {
        // `!miniTicker@arr` names the channel before the `@`
        let channel = all_market.split_once('@').map_or(all_market, |(c, _)| c);
        return StreamName { symbol: None, channel };
    }
    match stream.split_once('@') {
        Some((symbol, channel)) => StreamName {
            symbol: Some(symbol),
            channel,
        },
        None => StreamName {
            symbol: None,
            channel: stream,
        },
    }
}

fn parse<T: DeserializeOwned>(kind: EventKind, value: Value) -> Result<T, DecodeError> {
    serde_json::from_value(value).map_err(|source| DecodeError::Malformed { kind, source })
}

fn resolve_symbol(payload: Option<&str>, stream: Option<&str>) -> Result<String, DecodeError> {
    payload
        .or(stream)
        .filter(|s| !s.is_empty())
        .map(normalize_symbol)
        .ok_or(DecodeError::MissingSymbol)
}

pub(crate) fn decode(root: Map<String, Value>) -> Result<CanonicalEvent, DecodeError> {
    if let Some(message) = protocol::detect(&root) {
        return Ok(CanonicalEvent::Protocol(message));
    }

    let stream = root
        .get("stream")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let data = root.get("data").cloned().unwrap_or(Value::Null);

    if stream == "userData" {
        return decode_user_data(data);
    }

    let name = split_stream(&stream);
    let channel = name.channel;

    if channel.starts_with("depth") {
        decode_depth(name.symbol, data)
    } else if channel == "trade" || channel == "aggTrade" {
        decode_trades(name.symbol, data)
    } else if channel.starts_with("kline") {
        let interval = channel.strip_prefix("kline_").map(str::to_string);
        let event: WireKlineEvent = parse(EventKind::Kline, data)?;
        let symbol = resolve_symbol(event.symbol(), name.symbol)?;
        Ok(CanonicalEvent::Kline(event.into_event(symbol, interval)))
    } else if channel.starts_with("miniTicker") || channel.starts_with("ticker") {
        decode_tickers(name.symbol, data)
    } else if let Value::Object(inner) = data {
        // Unrecognised channel; the payload may still announce itself with `e`.
        match flat::decode_event(inner, SyncMode::Snapshot, name.symbol) {
            Some(result) => result,
            None => Ok(CanonicalEvent::Unknown(stream)),
        }
    } else {
        Ok(CanonicalEvent::Unknown(stream))
    }
}

fn decode_depth(stream_symbol: Option<&str>, data: Value) -> Result<CanonicalEvent, DecodeError> {
    let is_snapshot = data.get("lastUpdateId").is_some();
    if is_snapshot {
        let wire: WireDepthSnapshot = parse(EventKind::DepthSnapshot, data)?;
        let symbol = resolve_symbol(wire.symbol.as_deref(), stream_symbol)?;
        Ok(CanonicalEvent::DepthSnapshot(wire.into_event(symbol)))
    } else {
        let wire: WireDepthUpdate = parse(EventKind::DepthUpdate, data)?;
        let symbol = resolve_symbol(wire.symbol.as_deref(), stream_symbol)?;
        Ok(CanonicalEvent::DepthUpdate(wire.into_event(symbol, SyncMode::Snapshot)))
    }
}

fn decode_trades(stream_symbol: Option<&str>, data: Value) -> Result<CanonicalEvent, DecodeError> {
    let items = match data {
        Value::Array(items) => items,
        other => vec![other],
    };
    let trades = items
        .into_iter()
        .map(|item| {
            let wire: WireTrade = parse(EventKind::Trade, item)?;
            let symbol = resolve_symbol(wire.symbol.as_deref(), stream_symbol)?;
            Ok(wire.into_event(symbol))
        })
        .collect::<Result<Vec<Trade>, DecodeError>>()?;
    Ok(CanonicalEvent::Trades(trades))
}

fn decode_tickers(stream_symbol: Option<&str>, data: Value) -> Result<CanonicalEvent, DecodeError> {
    let items = match data {
        Value::Array(items) => items,
        other => vec![other],
    };
    let tickers = items
        .into_iter()
        .map(|item| {
            // Batch items are sometimes wrapped as `{"data": {...}}`.
            let item = match item {
                Value::Object(mut obj) if obj.len() == 1 && obj.contains_key("data") => {
                    obj.remove("data").unwrap_or(Value::Null)
                }
                other => other,
            };
            let wire: WireTicker = parse(EventKind::Ticker, item)?;
            let symbol = resolve_symbol(wire.symbol.as_deref(), stream_symbol)?;
            Ok(wire.into_event(symbol))
        })
        .collect::<Result<Vec<Ticker>, DecodeError>>()?;
    Ok(CanonicalEvent::Tickers(tickers))
}

fn decode_user_data(data: Value) -> Result<CanonicalEvent, DecodeError> {
    let mut body = match data {
        Value::Object(obj) => obj,
        _ => return Ok(CanonicalEvent::Unknown("userData".to_string())),
    };
    let event_type = body.get("event").and_then(Value::as_str).map(str::to_string);

    let order = match body.remove("order") {
        Some(order @ Value::Object(_)) => order,
        _ => match body.remove("orders") {
            Some(Value::Array(mut orders)) if !orders.is_empty() => orders.swap_remove(0),
            _ => Value::Object(body),
        },
    };

    let mut wire: WireUserOrder = parse(EventKind::UserOrderUpdate, order)?;
    if wire.event_type.is_none() {
        wire.event_type = event_type;
    }
    Ok(CanonicalEvent::UserOrderUpdate(wire.into_event()))
}
