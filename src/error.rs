//! Error types for columnkv

use thiserror::Error;
use std::io;

/// Result type alias for columnkv operations
pub type Result<T> = std::result::Result<T, ColumnKvError>;

/// Custom error types for columnkv
#[derive(Error, Debug)]
pub enum ColumnKvError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Client error: {0}")]
    Client(String),
}

impl From<nom::Err<nom::error::Error<&str>>> for ColumnKvError {
    fn from(err: nom::Err<nom::error::Error<&str>>) -> Self {
        ColumnKvError::Protocol(format!("Tokenize error: {:?}", err))
    }
}

impl From<tokio_rustls::rustls::Error> for ColumnKvError {
    fn from(err: tokio_rustls::rustls::Error) -> Self {
        ColumnKvError::Tls(err.to_string())
    }
}
