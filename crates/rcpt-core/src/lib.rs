//! Core library for receipt capture.
//!
//! This crate provides:
//! - Image preprocessing and text recognition (Tesseract or pure ONNX)
//! - Heuristic field extraction (vendor, date, subtotal, tax, total, currency)
//! - Canonical receipt assembly and validation
//! - SQLite-backed storage with a flat CSV export
//! - Battery fuel gauge sampling with debounced low-battery shutdown

pub mod assemble;
pub mod battery;
pub mod error;
pub mod extract;
pub mod models;
pub mod ocr;
pub mod pipeline;
pub mod store;

pub use assemble::{Assembly, CaptureMetadata, ReceiptAssembler, TotalProvenance};
pub use battery::{BatteryController, BatteryMonitor, BatteryState};
pub use error::{RcptError, Result};
pub use extract::{ExtractedFields, FieldExtractionEngine};
pub use models::config::RcptConfig;
pub use models::receipt::{CanonicalReceipt, EditableField, ReceiptUpdate};
pub use ocr::{create_recognizer, OcrLine, RawOcrText, TextRecognizer};
pub use pipeline::{ProcessedReceipt, ReceiptParser, ReceiptPipeline};
pub use store::{ReceiptQuery, ReceiptStore, SqliteStore};
