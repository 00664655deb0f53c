//! Error types for pixelshift.
//!
//! Provides a hierarchy of error types using `thiserror`. Conversion and
//! history failures have their own enums so callers can match on the exact
//! class; [`PixelshiftError`] gathers them for the outer layers.

use std::io;
use thiserror::Error;

/// Failure of a single format conversion.
///
/// Always per-item: the conversion queue marks the item `error` and keeps going.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    /// Source bytes could not be rasterized (corrupt or unsupported input)
    #[error("decode error: {0}")]
    Decode(String),

    /// The encoder produced no data for the requested format
    #[error("encode error: {0}")]
    Encode(String),

    /// The blocking worker running the conversion died
    #[error("conversion task failed: {0}")]
    Task(String),
}

impl ConvertError {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }
}

/// History store errors.
#[derive(Error, Debug)]
pub enum HistoryError {
    /// Id is not a positive integer
    #[error("invalid history id: {0}")]
    InvalidId(String),

    /// No record carries the requested id
    #[error("conversion history item not found: {0}")]
    NotFound(i64),

    /// Writing the serialized collection failed
    #[error("storage write failed: {0}")]
    Storage(String),

    /// The collection could not be serialized
    #[error("serialization error: {0}")]
    Serde(String),
}

impl HistoryError {
    pub fn invalid_id(id: impl ToString) -> Self {
        Self::InvalidId(id.to_string())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum PixelshiftError {
    #[error("conversion error: {0}")]
    Convert(#[from] ConvertError),

    #[error("history error: {0}")]
    History(#[from] HistoryError),

    /// Input or settings validation failed
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration could not be loaded or is inconsistent
    #[error("config error: {0}")]
    Config(String),

    /// The payment gate refused or failed
    #[error("payment error: {0}")]
    Payment(String),

    /// File IO error
    #[error("IO error: {0}")]
    Io(String),
}

/// Convenience result type for pixelshift operations.
pub type PixelshiftResult<T> = Result<T, PixelshiftError>;

impl PixelshiftError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn payment(msg: impl Into<String>) -> Self {
        Self::Payment(msg.into())
    }
}

impl From<io::Error> for PixelshiftError {
    fn from(err: io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for HistoryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err.to_string())
    }
}
