//! Single-writer processing task
//!
//! One tokio task owns the [`MarketDataSdk`] and applies commands from a
//! bounded queue in order, so no book is ever touched from two threads.
//! Config calls carry a `oneshot` reply and still fail synchronously from the
//! caller's point of view. [`PipelineHandle::watch_book`] hands out
//! latest-only receivers: every view is still computed and published, the
//! watch channel simply keeps the newest one for a slower consumer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{Result, SdkError};
use crate::orderbook::{AggregatedView, BookListener};
use crate::parser::normalize_symbol;
use crate::sdk::MarketDataSdk;

pub type ViewReceiver = watch::Receiver<Option<Arc<AggregatedView>>>;

type Watchers = Arc<Mutex<HashMap<String, watch::Sender<Option<Arc<AggregatedView>>>>>>;

/// Work for the pipeline task
#[derive(Debug)]
pub enum Command {
    Raw(String),
    Snapshot {
        symbol: String,
        raw: String,
        reply: oneshot::Sender<Result<()>>,
    },
    SetAggregation {
        symbol: String,
        tick_size: String,
        reply: oneshot::Sender<Result<()>>,
    },
    ClearAggregation {
        symbol: String,
    },
    SetDecimals {
        symbol: String,
        base_decimals: Option<u8>,
        quote_decimals: Option<u8>,
        reply: oneshot::Sender<Result<()>>,
    },
    Reset {
        symbol: String,
    },
    View {
        symbol: String,
        reply: oneshot::Sender<Option<AggregatedView>>,
    },
    WatchBook {
        symbol: String,
        reply: oneshot::Sender<ViewReceiver>,
    },
}

/// Forwards published views into per-symbol watch channels
struct WatchForwarder {
    watchers: Watchers,
}

impl BookListener for WatchForwarder {
    fn on_update(&mut self, symbol: &str, view: &AggregatedView) {
        let mut watchers = self.watchers.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = watchers.get(symbol) else {
            return;
        };
        if sender.receiver_count() > 0 {
            sender.send_replace(Some(Arc::new(view.clone())));
            return;
        }
        watchers.remove(symbol);
        debug!(symbol = %symbol, "Dropped book watch with no receivers");
    }
}

/// Cloneable sender side of the pipeline
#[derive(Debug, Clone)]
pub struct PipelineHandle {
    tx: mpsc::Sender<Command>,
}

impl PipelineHandle {
    async fn send(&self, command: Command) -> Result<()> {
        self.tx.send(command).await.map_err(|_| SdkError::ChannelClosed)
    }

    async fn request<T>(&self, command: Command, rx: oneshot::Receiver<T>) -> Result<T> {
        self.send(command).await?;
        rx.await.map_err(|_| SdkError::ChannelClosed)
    }

    /// Queue one raw message; waits only for queue space
    pub async fn send_raw(&self, raw: impl Into<String>) -> Result<()> {
        self.send(Command::Raw(raw.into())).await
    }

    /// Apply a REST depth snapshot for `symbol`
    pub async fn apply_snapshot(&self, symbol: &str, raw: impl Into<String>) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        let command = Command::Snapshot {
            symbol: symbol.to_string(),
            raw: raw.into(),
            reply,
        };
        self.request(command, rx).await?
    }

    pub async fn set_aggregation(&self, symbol: &str, tick_size: &str) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        let command = Command::SetAggregation {
            symbol: symbol.to_string(),
            tick_size: tick_size.to_string(),
            reply,
        };
        self.request(command, rx).await?
    }

    pub async fn clear_aggregation(&self, symbol: &str) -> Result<()> {
        self.send(Command::ClearAggregation {
            symbol: symbol.to_string(),
        })
        .await
    }

    pub async fn set_decimals(
        &self,
        symbol: &str,
        base_decimals: Option<u8>,
        quote_decimals: Option<u8>,
    ) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        let command = Command::SetDecimals {
            symbol: symbol.to_string(),
            base_decimals,
            quote_decimals,
            reply,
        };
        self.request(command, rx).await?
    }

    pub async fn reset(&self, symbol: &str) -> Result<()> {
        self.send(Command::Reset {
            symbol: symbol.to_string(),
        })
        .await
    }

    /// Current view, after every command queued before this one
    pub async fn view(&self, symbol: &str) -> Result<Option<AggregatedView>> {
        let (reply, rx) = oneshot::channel();
        let command = Command::View {
            symbol: symbol.to_string(),
            reply,
        };
        self.request(command, rx).await
    }

    /// Latest-only receiver of `symbol`'s views, starting at its current view
    pub async fn watch_book(&self, symbol: &str) -> Result<ViewReceiver> {
        let (reply, rx) = oneshot::channel();
        let command = Command::WatchBook {
            symbol: symbol.to_string(),
            reply,
        };
        self.request(command, rx).await
    }
}

/// Start the pipeline task
///
/// The task drains the queue once every handle is dropped and returns the SDK.
pub fn spawn(mut sdk: MarketDataSdk, capacity: usize) -> (PipelineHandle, JoinHandle<MarketDataSdk>) {
    let (tx, mut rx) = mpsc::channel(capacity.max(1));
    let watchers: Watchers = Arc::default();
    sdk.subscribe_book(WatchForwarder {
        watchers: watchers.clone(),
    });

    let task = tokio::spawn(async move {
        info!(capacity, "Pipeline started");
        let mut processed: u64 = 0;
        while let Some(command) = rx.recv().await {
            execute(&mut sdk, &watchers, command);
            processed += 1;
        }
        info!(processed, "Pipeline stopped");
        sdk
    });

    (PipelineHandle { tx }, task)
}

fn execute(sdk: &mut MarketDataSdk, watchers: &Watchers, command: Command) {
    // A dropped reply receiver only means the caller stopped waiting.
    match command {
        Command::Raw(raw) => {
            sdk.process_message(&raw);
        }
        Command::Snapshot { symbol, raw, reply } => {
            let _ = reply.send(sdk.process_snapshot(&symbol, &raw));
        }
        Command::SetAggregation {
            symbol,
            tick_size,
            reply,
        } => {
            let _ = reply.send(sdk.set_aggregation(&symbol, &tick_size));
        }
        Command::ClearAggregation { symbol } => sdk.clear_aggregation(&symbol),
        Command::SetDecimals {
            symbol,
            base_decimals,
            quote_decimals,
            reply,
        } => {
            let _ = reply.send(sdk.set_decimals(&symbol, base_decimals, quote_decimals));
        }
        Command::Reset { symbol } => sdk.reset(&symbol),
        Command::View { symbol, reply } => {
            let _ = reply.send(sdk.view(&symbol));
        }
        Command::WatchBook { symbol, reply } => {
            let symbol = normalize_symbol(&symbol);
            let current = sdk.view(&symbol).map(Arc::new);
            let mut watchers = watchers.lock().unwrap_or_else(PoisonError::into_inner);
            // Symbols that never publish again would otherwise keep their senders.
            watchers.retain(|_, sender| sender.receiver_count() > 0);
            let receiver = watchers
                .entry(symbol)
                .or_insert_with(|| watch::channel(current).0)
                .subscribe();
            let _ = reply.send(receiver);
        }
    }
}
