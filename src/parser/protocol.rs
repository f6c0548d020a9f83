//! Session-level messages shared by both dialects

use serde_json::{Map, Value};

use super::events::{ProtocolKind, ProtocolMessage};

fn text(root: &Map<String, Value>, key: &str) -> Option<String> {
    match root.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn error_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj
            .get("msg")
            .or_else(|| obj.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| Some(value.to_string())),
        other => Some(other.to_string()),
    }
}

/// Recognise login/subscribe acknowledgements and errors
///
/// Returns `None` for anything that is market data.
pub(crate) fn detect(root: &Map<String, Value>) -> Option<ProtocolMessage> {
    let id = text(root, "id");
    let stream = text(root, "stream");

    if let Some(method) = root.get("method").and_then(Value::as_str) {
        let kind = match method.to_ascii_lowercase().as_str() {
            "login" => ProtocolKind::Login,
            "subscribe" => ProtocolKind::Subscribe,
            "unsubscribe" => ProtocolKind::Unsubscribe,
            _ => return None,
        };
        return Some(ProtocolMessage {
            kind,
            id,
            stream,
            error: root.get("error").and_then(error_text),
        });
    }

    if let Some(error) = root.get("error").and_then(error_text) {
        return Some(ProtocolMessage {
            kind: ProtocolKind::Error,
            id,
            stream,
            error: Some(error),
        });
    }

    if id.is_some() && root.contains_key("result") {
        return Some(ProtocolMessage {
            kind: ProtocolKind::Ack,
            id,
            stream,
            error: None,
        });
    }

    if !root.contains_key("e") && !root.contains_key("data") {
        if let Some(code) = text(root, "code") {
            let error = text(root, "msg").map_or(code.clone(), |msg| format!("{code}: {msg}"));
            return Some(ProtocolMessage {
                kind: ProtocolKind::Error,
                id,
                stream,
                error: Some(error),
            });
        }
    }

    None
}
