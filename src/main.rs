//! Market Data SDK - replay runner
//!
//! Feeds newline-delimited raw exchange messages (a capture file or stdin)
//! through the SDK pipeline, logs every published book view, and optionally
//! writes the views as MessagePack frames and serves health and metrics.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{routing::get, Json, Router};
use prometheus::Registry;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, BufWriter};
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use market_data_sdk::pipeline::{self, PipelineHandle};
use market_data_sdk::publisher::FrameWriter;
use market_data_sdk::{AggregatedView, BookListener, Config, MarketDataSdk, SequenceGap};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting market data SDK replay");

    let config = Config::load()?;
    info!(
        input = %config.input,
        max_rows = config.engine.max_rows,
        books = config.books.len(),
        "Configuration loaded"
    );

    let registry = Arc::new(Registry::new());
    let mut sdk = MarketDataSdk::with_registry(config.engine.clone(), &registry)?;
    apply_book_settings(&mut sdk, &config)?;

    if let Some(addr) = config.metrics_addr.clone() {
        let registry = registry.clone();
        tokio::spawn(async move {
            if let Err(e) = start_health_server(&addr, registry).await {
                warn!(error = %e, "Health server error");
            }
        });
    }

    // Views cross to the writer task by value, already computed.
    let (views_tx, views_rx) = mpsc::unbounded_channel();
    sdk.subscribe_book(ViewLogger { frames: views_tx });
    let writer = tokio::spawn(write_frames(config.frames_output.clone(), views_rx));

    let (handle, task) = pipeline::spawn(sdk, config.channel_capacity);
    let lines = if config.reads_stdin() {
        replay(BufReader::new(tokio::io::stdin()), &handle).await?
    } else {
        let file = tokio::fs::File::open(&config.input).await?;
        replay(BufReader::new(file), &handle).await?
    };
    drop(handle);

    let sdk = task.await?;
    let counters = sdk.counters();
    info!(
        lines,
        symbols = ?sdk.symbols(),
        views = counters.views_published(),
        decode_errors = counters.decode_errors(),
        sequence_gaps = counters.gaps(),
        "Replay finished"
    );
    // Dropping the SDK drops the logger and closes the frame channel.
    drop(sdk);

    let frames = writer.await??;
    if frames > 0 {
        info!(frames, "Frames written");
    }
    Ok(())
}

/// Apply per-symbol settings through the same validated setters as runtime calls
fn apply_book_settings(sdk: &mut MarketDataSdk, config: &Config) -> anyhow::Result<()> {
    for (symbol, settings) in config.book_settings() {
        if settings.base_decimals.is_some() || settings.quote_decimals.is_some() {
            sdk.set_decimals(&symbol, settings.base_decimals, settings.quote_decimals)?;
        }
        if let Some(tick_size) = &settings.tick_size {
            sdk.set_aggregation(&symbol, tick_size)?;
        }
        info!(symbol = %symbol, tick_size = ?settings.tick_size, "Book configured");
    }
    Ok(())
}

async fn replay<R>(reader: R, handle: &PipelineHandle) -> anyhow::Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut count = 0;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        handle.send_raw(line).await?;
        count += 1;
    }
    Ok(count)
}

/// Logs views and forwards them to the frame writer
struct ViewLogger {
    frames: mpsc::UnboundedSender<AggregatedView>,
}

impl BookListener for ViewLogger {
    fn on_update(&mut self, symbol: &str, view: &AggregatedView) {
        debug!(
            symbol = %symbol,
            best_bid = ?view.metrics.best_bid,
            best_ask = ?view.metrics.best_ask,
            spread = ?view.metrics.spread,
            bids = view.bids.len(),
            asks = view.asks.len(),
            resync_needed = view.resync_needed,
            "Book view"
        );
        // Receiver is gone only once the writer failed; it already logged why.
        let _ = self.frames.send(view.clone());
    }

    fn on_sequence_gap(&mut self, gap: &SequenceGap) {
        info!(symbol = %gap.symbol, expected = gap.expected, actual = gap.actual, "Resync advised");
    }
}

async fn write_frames(
    path: Option<std::path::PathBuf>,
    mut views: mpsc::UnboundedReceiver<AggregatedView>,
) -> anyhow::Result<u64> {
    let Some(path) = path else {
        while views.recv().await.is_some() {}
        return Ok(0);
    };

    let file = tokio::fs::File::create(&path).await?;
    let mut writer = FrameWriter::new(BufWriter::new(file));
    info!(path = %path.display(), "Writing view frames");

    while let Some(view) = views.recv().await {
        if let Err(e) = writer.write(&view).await {
            warn!(error = %e, "Frame output failed, stopping writer");
            return Err(e.into());
        }
    }
    writer.flush().await?;
    Ok(writer.frames_written())
}

/// Start HTTP server for health checks and metrics
async fn start_health_server(addr: &str, registry: Arc<Registry>) -> anyhow::Result<()> {
    let addr: SocketAddr = addr.parse()?;

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(registry);

    info!(addr = %addr, "Starting health check server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "component": "market-data-sdk",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn metrics(State(registry): State<Arc<Registry>>) -> Result<String, StatusCode> {
    use prometheus::{Encoder, TextEncoder};

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&registry.gather(), &mut buffer)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
