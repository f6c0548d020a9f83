//! Wire decoder
//!
//! Turns one raw text message into one [`CanonicalEvent`]. Two dialects are
//! supported and told apart by a structural probe on each message:
//!
//! - [`Dialect::Stream`]: `{"stream": "btcusdt@depth", "data": {...}}` envelopes
//! - [`Dialect::Flat`]: top-level payloads keyed by `e`, plain REST snapshots
//!   and session acknowledgements
//!
//! Decoding never touches book state; failures come back as [`DecodeError`].

pub(crate) mod de;
pub mod events;
mod flat;
mod protocol;
mod stream;
mod wire;

pub use events::{
    CanonicalEvent, DepthSnapshot, DepthUpdate, EventKind, Kline, PriceLevel, ProtocolKind,
    ProtocolMessage, SyncMode, Ticker, Trade, TradeSide, UserOrderUpdate,
};

use serde_json::{Map, Value};
use thiserror::Error;

use wire::WireDepthSnapshot;

/// Why a raw message could not be decoded
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message is not a JSON object")]
    NotAnObject,

    #[error("message carries no symbol")]
    MissingSymbol,

    #[error("malformed {kind} payload: {source}")]
    Malformed {
        kind: EventKind,
        #[source]
        source: serde_json::Error,
    },
}

/// Upper-case symbol key; stream prefixes arrive lower case
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}

/// Supported wire dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `{stream, data}` envelopes; depth diffs need a snapshot
    Stream,
    /// Flat `e`-tagged payloads; depth diffs seed the book
    Flat,
}

impl Dialect {
    /// Pick the dialect from the shape of a parsed message
    pub fn probe(value: &Value) -> Self {
        match value {
            Value::Object(root) if root.contains_key("stream") && root.contains_key("data") => {
                Dialect::Stream
            }
            _ => Dialect::Flat,
        }
    }

    /// How depth diffs from this dialect establish a book
    pub fn sync_mode(self) -> SyncMode {
        match self {
            Dialect::Stream => SyncMode::Snapshot,
            Dialect::Flat => SyncMode::Incremental,
        }
    }

    fn decode(self, root: Map<String, Value>) -> Result<CanonicalEvent, DecodeError> {
        match self {
            Dialect::Stream => stream::decode(root),
            Dialect::Flat => flat::decode(root),
        }
    }
}

/// Message decoder, probing the dialect per message unless pinned
#[derive(Debug, Clone, Copy, Default)]
pub struct Decoder {
    pinned: Option<Dialect>,
    sync: Option<SyncMode>,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder that always uses `dialect`
    pub fn pinned(dialect: Dialect) -> Self {
        Self {
            pinned: Some(dialect),
            sync: None,
        }
    }

    /// Force every depth diff to `sync`, whatever its dialect
    ///
    /// For venues that stream `{stream, data}` envelopes but never serve a
    /// REST snapshot: `SyncMode::Incremental` lets their first diff seed.
    pub fn with_sync(mut self, sync: SyncMode) -> Self {
        self.sync = Some(sync);
        self
    }

    pub fn decode(&self, raw: &str) -> Result<CanonicalEvent, DecodeError> {
        let value: Value = serde_json::from_str(raw)?;
        let dialect = self.pinned.unwrap_or_else(|| Dialect::probe(&value));
        let mut event = match value {
            Value::Object(root) => dialect.decode(root)?,
            _ => return Err(DecodeError::NotAnObject),
        };
        if let (CanonicalEvent::DepthUpdate(update), Some(sync)) = (&mut event, self.sync) {
            update.sync = sync;
        }
        Ok(event)
    }

    /// Decode a REST depth snapshot, which names no symbol of its own
    pub fn decode_snapshot(&self, symbol: &str, raw: &str) -> Result<DepthSnapshot, DecodeError> {
        let wire: WireDepthSnapshot = serde_json::from_str(raw).map_err(|source| {
            if source.is_syntax() || source.is_eof() {
                DecodeError::Json(source)
            } else {
                DecodeError::Malformed {
                    kind: EventKind::DepthSnapshot,
                    source,
                }
            }
        })?;
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() {
            return Err(DecodeError::MissingSymbol);
        }
        Ok(wire.into_event(symbol))
    }
}

/// Decode with a probing [`Decoder`]
pub fn decode(raw: &str) -> Result<CanonicalEvent, DecodeError> {
    Decoder::new().decode(raw)
}
