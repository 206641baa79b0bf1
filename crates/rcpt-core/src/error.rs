//! Error types for the rcpt-core library.

use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for the rcpt library.
#[derive(Error, Debug)]
pub enum RcptError {
    /// OCR processing error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// Receipt assembly error.
    #[error("assembly error: {0}")]
    Assembly(#[from] AssemblyError),

    /// Record store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Fuel gauge error.
    #[error("sensor error: {0}")]
    Sensor(#[from] SensorError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to image preprocessing and text recognition.
#[derive(Error, Debug)]
pub enum OcrError {
    /// The input image is corrupt or in an unsupported format.
    #[error("failed to decode image: {0}")]
    ImageDecode(String),

    /// The recognition engine could not be invoked (missing binary or model).
    #[error("recognition engine unavailable: {0}")]
    EngineUnavailable(String),

    /// The engine ran but failed.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// Image preprocessing failed.
    #[error("preprocessing failed: {0}")]
    Preprocessing(String),
}

/// Errors raised while assembling a canonical receipt.
#[derive(Error, Debug, PartialEq)]
pub enum AssemblyError {
    /// The total ended up negative, which no receipt can have.
    #[error("total amount is negative: {0}")]
    NegativeTotal(Decimal),
}

/// Errors related to the receipt store and its export.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite failure.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// CSV export failure.
    #[error("export error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O failure while writing the export.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No receipt with the given id.
    #[error("receipt not found: {0}")]
    NotFound(String),

    /// The requested change would leave the record in an impossible state.
    #[error("invalid update: {0}")]
    Invalid(String),

    /// A stored column could not be decoded.
    #[error("corrupt value in column {column}: {value}")]
    Corrupt { column: String, value: String },
}

/// Fuel gauge read failures. Always transient from the sampler's point of view.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    /// The device is absent or the read failed.
    #[error("sensor unavailable: {0}")]
    Unavailable(String),
}

/// Shutdown command failures. Logged, never propagated out of the sampler loop.
#[derive(Error, Debug)]
pub enum ShutdownError {
    /// The command could not be spawned or exited unsuccessfully.
    #[error("shutdown command failed: {0}")]
    CommandFailed(String),
}

/// Result type for the rcpt library.
pub type Result<T> = std::result::Result<T, RcptError>;
