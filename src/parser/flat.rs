//! Flat dialect: the event type sits at the top level in `e`

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::events::{CanonicalEvent, EventKind, SyncMode};
use super::wire::{WireDepthSnapshot, WireDepthUpdate, WireKlineEvent, WireTicker, WireTrade, WireUserOrder};
use super::{normalize_symbol, protocol, DecodeError};

fn parse<T: DeserializeOwned>(kind: EventKind, root: Map<String, Value>) -> Result<T, DecodeError> {
    serde_json::from_value(Value::Object(root)).map_err(|source| DecodeError::Malformed { kind, source })
}

fn resolve_symbol(payload: Option<&str>, fallback: Option<&str>) -> Result<String, DecodeError> {
    payload
        .or(fallback)
        .filter(|s| !s.is_empty())
        .map(normalize_symbol)
        .ok_or(DecodeError::MissingSymbol)
}

pub(crate) fn decode(root: Map<String, Value>) -> Result<CanonicalEvent, DecodeError> {
    if let Some(message) = protocol::detect(&root) {
        return Ok(CanonicalEvent::Protocol(message));
    }

    let label = root
        .get("e")
        .and_then(Value::as_str)
        .unwrap_or("unrecognised")
        .to_string();

    decode_event(root, SyncMode::Incremental, None).unwrap_or(Ok(CanonicalEvent::Unknown(label)))
}

/// Decode an object keyed by its `e` field
///
/// `None` when the object names no event this crate understands.
pub(crate) fn decode_event(
    root: Map<String, Value>,
    sync: SyncMode,
    fallback_symbol: Option<&str>,
) -> Option<Result<CanonicalEvent, DecodeError>> {
    let event_type = root.get("e").and_then(Value::as_str).map(str::to_string);

    let result = match event_type.as_deref() {
        Some("depthUpdate") => parse::<WireDepthUpdate>(EventKind::DepthUpdate, root).and_then(|wire| {
            let symbol = resolve_symbol(wire.symbol.as_deref(), fallback_symbol)?;
            Ok(CanonicalEvent::DepthUpdate(wire.into_event(symbol, sync)))
        }),
        Some("trade") | Some("aggTrade") => parse::<WireTrade>(EventKind::Trade, root).and_then(|wire| {
            let symbol = resolve_symbol(wire.symbol.as_deref(), fallback_symbol)?;
            Ok(CanonicalEvent::Trades(vec![wire.into_event(symbol)]))
        }),
        Some("24hrTicker") | Some("24hrMiniTicker") | Some("miniTicker") => {
            parse::<WireTicker>(EventKind::Ticker, root).and_then(|wire| {
                let symbol = resolve_symbol(wire.symbol.as_deref(), fallback_symbol)?;
                Ok(CanonicalEvent::Tickers(vec![wire.into_event(symbol)]))
            })
        }
        Some("kline") => parse::<WireKlineEvent>(EventKind::Kline, root).and_then(|wire| {
            let symbol = resolve_symbol(wire.symbol(), fallback_symbol)?;
            Ok(CanonicalEvent::Kline(wire.into_event(symbol, None)))
        }),
        Some("orderUpdate") | Some("executionReport") => {
            parse::<WireUserOrder>(EventKind::UserOrderUpdate, root)
                .map(|wire| CanonicalEvent::UserOrderUpdate(wire.into_event()))
        }
        None if root.contains_key("lastUpdateId") => {
            parse::<WireDepthSnapshot>(EventKind::DepthSnapshot, root).and_then(|wire| {
                let symbol = resolve_symbol(wire.symbol.as_deref(), fallback_symbol)?;
                Ok(CanonicalEvent::DepthSnapshot(wire.into_event(symbol)))
            })
        }
        _ => return None,
    };
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::events::{PriceLevel, ProtocolKind};
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn run(value: Value) -> Result<CanonicalEvent, DecodeError> {
        match value {
            Value::Object(root) => decode(root),
            _ => Err(DecodeError::NotAnObject),
        }
    }

    #[test]
    fn test_depth_update_seeds_incrementally() {
        let event = run(json!({
            "e": "depthUpdate", "s": "usdt_kdg", "firstUpdateId": "11", "finalUpdateId": "12",
            "b": [[1.25, 100]], "a": [["1.30", "50"]]
        }))
        .unwrap();

        match event {
            CanonicalEvent::DepthUpdate(update) => {
                assert_eq!(update.symbol, "USDT_KDG");
                assert_eq!(update.sync, SyncMode::Incremental);
                assert_eq!(update.first_update_id, Some(11));
                assert_eq!(update.final_update_id, Some(12));
                assert_eq!(update.bids, vec![PriceLevel::new(dec!(1.25), dec!(100))]);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_missing_first_id_defaults_to_final() {
        let event = run(json!({"e": "depthUpdate", "s": "BTCUSDT", "u": 9, "b": [], "a": []})).unwrap();
        match event {
            CanonicalEvent::DepthUpdate(update) => {
                assert_eq!(update.first_update_id, Some(9));
                assert_eq!(update.final_update_id, Some(9));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_rest_snapshot_shape() {
        let event = run(json!({
            "lastUpdateId": 1027024, "symbol": "BTCUSDT",
            "bids": [["4.00000000", "431.00000000"]], "asks": [["4.00000200", "12.00000000"]]
        }))
        .unwrap();

        match event {
            CanonicalEvent::DepthSnapshot(snapshot) => {
                assert_eq!(snapshot.last_update_id, 1027024);
                assert_eq!(snapshot.asks[0].price, dec!(4.000002));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_execution_report() {
        let event = run(json!({
            "e": "executionReport", "E": 1499405658658u64, "s": "ETHBTC", "c": "mUvoqJxFIILMdfAW5iGSOW",
            "S": "BUY", "o": "LIMIT", "q": "1.00000000", "p": "0.10264410", "X": "NEW",
            "i": 4293153, "z": "0.00000000"
        }))
        .unwrap();

        match event {
            CanonicalEvent::UserOrderUpdate(order) => {
                assert_eq!(order.order_id.as_deref(), Some("4293153"));
                assert_eq!(order.side.as_deref(), Some("BUY"));
                assert_eq!(order.status.as_deref(), Some("NEW"));
                assert_eq!(order.price, Some(dec!(0.10264410)));
                assert_eq!(order.event_type.as_deref(), Some("executionReport"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_protocol_before_events() {
        let event = run(json!({"method": "subscribe", "result": "ok"})).unwrap();
        assert!(matches!(
            event,
            CanonicalEvent::Protocol(ref message) if message.kind == ProtocolKind::Subscribe
        ));
    }

    #[test]
    fn test_unknown_event_type() {
        let event = run(json!({"e": "outboundAccountPosition", "B": []})).unwrap();
        assert_eq!(event, CanonicalEvent::Unknown("outboundAccountPosition".to_string()));
    }

    #[test]
    fn test_trade_without_symbol() {
        let result = run(json!({"e": "trade", "p": "1", "q": "1"}));
        assert!(matches!(result, Err(DecodeError::MissingSymbol)));
    }
}
