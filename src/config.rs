//! Configuration module for the market data SDK
//!
//! [`EngineConfig`] sizes the engine and is all a library user needs.
//! [`Config`] is the replay binary's configuration: an optional file layered
//! under `SDK__`-prefixed environment variables (`SDK__ENGINE__MAX_ROWS=30`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Result, SdkError};
use crate::orderbook::{AggregationConfig, MAX_DECIMALS};
use crate::parser::normalize_symbol;

/// Engine sizing and defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Aggregated levels published per side
    pub max_rows: usize,

    /// Raw levels retained per side
    pub depth_limit: usize,

    /// Diffs held per symbol while waiting for a snapshot
    pub pending_updates: usize,

    /// Recent trades kept per symbol
    pub trades_max_rows: usize,

    pub default_base_decimals: u8,

    pub default_quote_decimals: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_rows: 50,
            depth_limit: 1000,
            pending_updates: 256,
            trades_max_rows: 50,
            default_base_decimals: 5,
            default_quote_decimals: 2,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_rows == 0 {
            return Err(SdkError::InvalidConfig("max_rows must be at least 1".into()));
        }
        if self.depth_limit < self.max_rows {
            return Err(SdkError::InvalidConfig(format!(
                "depth_limit ({}) must not be below max_rows ({})",
                self.depth_limit, self.max_rows
            )));
        }
        self.default_aggregation().map(|_| ())
    }

    /// Settings a newly seen symbol starts with
    pub fn default_aggregation(&self) -> Result<AggregationConfig> {
        AggregationConfig::new(self.default_base_decimals, self.default_quote_decimals)
    }
}

/// Start-up settings for one symbol
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookSettings {
    /// Tick size as text so its scale survives (`"0.10"`)
    pub tick_size: Option<String>,
    pub base_decimals: Option<u8>,
    pub quote_decimals: Option<u8>,
}

/// Replay binary configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Newline-delimited raw messages; `-` reads stdin
    pub input: String,

    /// Where to write MessagePack view frames, if anywhere
    pub frames_output: Option<PathBuf>,

    /// `host:port` for `/health` and `/metrics`
    pub metrics_addr: Option<String>,

    /// Pipeline command queue capacity
    pub channel_capacity: usize,

    pub engine: EngineConfig,

    /// Per-symbol settings applied before the first message
    pub books: BTreeMap<String, BookSettings>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: "-".to_string(),
            frames_output: None,
            metrics_addr: None,
            channel_capacity: 1024,
            engine: EngineConfig::default(),
            books: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from `.env`, an optional file and the environment
    ///
    /// The file is named by `SDK_CONFIG` (any format the `config` crate
    /// recognises by extension), defaulting to `market-data-sdk.*` in the
    /// working directory.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let file = env::var("SDK_CONFIG").unwrap_or_else(|_| "market-data-sdk".to_string());
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(&file).required(false))
            .add_source(
                ::config::Environment::with_prefix("SDK")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from one explicit file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path.as_ref()).required(true))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(SdkError::InvalidConfig("channel_capacity must be at least 1".into()));
        }
        self.engine.validate()?;

        for (symbol, book) in &self.books {
            for decimals in [book.base_decimals, book.quote_decimals].into_iter().flatten() {
                if decimals > MAX_DECIMALS {
                    return Err(SdkError::InvalidConfig(format!(
                        "{symbol}: decimals must be at most {MAX_DECIMALS}, got {decimals}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Per-symbol settings keyed by upper-case symbol
    ///
    /// Keys are normalised because the `config` crate folds them to lower case.
    pub fn book_settings(&self) -> impl Iterator<Item = (String, &BookSettings)> + '_ {
        self.books
            .iter()
            .map(|(symbol, settings)| (normalize_symbol(symbol), settings))
    }

    /// Whether input comes from stdin
    pub fn reads_stdin(&self) -> bool {
        self.input == "-"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.reads_stdin());
        assert_eq!(config.engine.max_rows, 50);
        assert_eq!(config.engine.pending_updates, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let file = write_config(
            r#"
input = "capture.jsonl"
metrics_addr = "127.0.0.1:9090"

[engine]
max_rows = 20

[books.BTCUSDT]
tick_size = "0.10"
quote_decimals = 2
"#,
        );

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.input, "capture.jsonl");
        assert_eq!(config.engine.max_rows, 20);
        // Unset fields keep their defaults.
        assert_eq!(config.engine.depth_limit, 1000);
        assert_eq!(config.channel_capacity, 1024);

        let (symbol, book) = config.book_settings().next().unwrap();
        assert_eq!(symbol, "BTCUSDT");
        assert_eq!(book.tick_size.as_deref(), Some("0.10"));
        assert_eq!(book.base_decimals, None);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let file = write_config("channel_capacity = 0\n");
        assert!(matches!(Config::from_file(file.path()), Err(SdkError::InvalidConfig(_))));

        let file = write_config("[engine]\ndefault_quote_decimals = 30\n");
        assert!(Config::from_file(file.path()).is_err());

        let file = write_config("[books.ETHUSDT]\nbase_decimals = 19\n");
        assert!(Config::from_file(file.path()).is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Config::from_file("/nonexistent/market-data-sdk.toml"),
            Err(SdkError::Config(_))
        ));
    }
}
