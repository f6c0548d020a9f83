//! Error types for the market data SDK

use thiserror::Error;

use crate::parser::DecodeError;

/// SDK errors
///
/// Malformed input is reported as [`SdkError::Decode`] and is dropped by the
/// SDK before it reaches any book. API misuse (bad tick sizes or decimals) is
/// reported as [`SdkError::InvalidConfig`] and leaves the prior config intact.
#[derive(Error, Debug)]
pub enum SdkError {
    #[error("Failed to decode message: {0}")]
    Decode(#[from] DecodeError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Metrics error: {0}")]
    Metrics(String),

    #[error("Processing pipeline is closed")]
    ChannelClosed,
}

impl From<serde_json::Error> for SdkError {
    fn from(err: serde_json::Error) -> Self {
        SdkError::Decode(DecodeError::Json(err))
    }
}

impl From<rmp_serde::encode::Error> for SdkError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        SdkError::Serialization(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for SdkError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        SdkError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for SdkError {
    fn from(err: std::io::Error) -> Self {
        SdkError::Io(err.to_string())
    }
}

impl From<config::ConfigError> for SdkError {
    fn from(err: config::ConfigError) -> Self {
        SdkError::Config(err.to_string())
    }
}

impl From<prometheus::Error> for SdkError {
    fn from(err: prometheus::Error) -> Self {
        SdkError::Metrics(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SdkError>;
