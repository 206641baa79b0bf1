//! Configuration structures for the receipt pipeline and battery monitor.

use std::collections::BTreeMap;
use std::path::PathBuf;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Main configuration for rcpt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RcptConfig {
    /// Field extraction configuration.
    pub extraction: ExtractionConfig,

    /// OCR configuration.
    pub ocr: OcrConfig,

    /// Record store configuration.
    pub storage: StorageConfig,

    /// Battery monitor configuration.
    pub battery: BatteryConfig,
}

/// Field extraction heuristics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Keywords marking the grand total line.
    pub total_keywords: Vec<String>,

    /// Keywords marking the subtotal line. Checked before total keywords.
    pub subtotal_keywords: Vec<String>,

    /// Keywords marking a tax line.
    pub tax_keywords: Vec<String>,

    /// Currency symbol to ISO code mapping.
    pub currency_symbols: BTreeMap<String, String>,

    /// ISO 4217 codes recognized when printed next to an amount.
    pub currency_codes: Vec<String>,

    /// Currency used when none is detected.
    pub default_currency: String,

    /// Allowed difference between subtotal + tax and total before warning.
    pub total_tolerance: Decimal,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        let currency_symbols = [("$", "USD"), ("€", "EUR"), ("£", "GBP"), ("¥", "JPY")]
            .into_iter()
            .map(|(symbol, code)| (symbol.to_string(), code.to_string()))
            .collect();

        Self {
            total_keywords: to_strings(&["total", "grand total", "amount due", "balance", "balance due"]),
            subtotal_keywords: to_strings(&["subtotal", "sub total", "sub-total"]),
            tax_keywords: to_strings(&["tax", "vat", "gst", "hst"]),
            currency_symbols,
            currency_codes: to_strings(&["USD", "EUR", "GBP", "CAD", "AUD", "CHF", "JPY", "PLN"]),
            default_currency: "USD".to_string(),
            total_tolerance: Decimal::new(1, 2),
        }
    }
}

/// Recognition engine selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// External `tesseract` binary.
    Tesseract,
    /// Bundled pure Rust ONNX engine (PaddleOCR models).
    Onnx,
}

/// OCR configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Recognition engine to use.
    pub engine: EngineKind,

    /// Path or name of the tesseract binary.
    pub tesseract_binary: String,

    /// Tesseract language pack.
    pub language: String,

    /// Tesseract page segmentation mode. 4 ("single column of variable sizes") suits receipts.
    pub page_segmentation_mode: u8,

    /// Directory holding det.onnx, latin_rec.onnx and latin_dict.txt.
    pub model_dir: PathBuf,

    /// Keep `[UNK]` tokens emitted by the ONNX recognizer.
    pub keep_unk: bool,

    /// Maximum image dimension (longer side) before preprocessing.
    pub max_image_size: u32,

    /// Estimate and correct small rotations.
    pub deskew: bool,

    /// Largest skew angle searched, in degrees.
    pub max_skew_degrees: f32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::Tesseract,
            tesseract_binary: "tesseract".to_string(),
            language: "eng".to_string(),
            page_segmentation_mode: 4,
            model_dir: PathBuf::from("models"),
            keep_unk: false,
            max_image_size: 2048,
            deskew: true,
            max_skew_degrees: 5.0,
        }
    }
}

/// Record store locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file.
    pub database_path: PathBuf,

    /// CSV export rewritten after every change.
    pub export_path: PathBuf,

    /// Where captured and uploaded images are kept.
    pub image_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/receipts.db"),
            export_path: PathBuf::from("data/receipts.csv"),
            image_dir: PathBuf::from("data/images"),
        }
    }
}

/// A point on a voltage to charge curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub volts: f32,
    pub percent: f32,
}

/// Battery monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatteryConfig {
    /// Seconds between samples.
    pub poll_interval_secs: u64,

    /// Charge percentage below which a low warning is raised.
    pub warning_threshold: f32,

    /// Charge percentage below which the system is shut down.
    pub shutdown_threshold: f32,

    /// Consecutive readings required before a threshold transition. Minimum 2.
    pub debounce_readings: u32,

    /// Voltage of an empty cell (linear mapping).
    pub min_voltage: f32,

    /// Voltage of a full cell (linear mapping).
    pub max_voltage: f32,

    /// Optional voltage curve, ascending by voltage. Overrides the linear mapping when non-empty.
    pub voltage_curve: Vec<CurvePoint>,

    /// Shutdown command, program first.
    pub shutdown_command: Vec<String>,

    /// Root of the hwmon class directory.
    pub hwmon_root: PathBuf,

    /// hwmon chip name of the fuel gauge.
    pub chip_name: String,

    /// JSON lines log of every reading.
    pub log_path: PathBuf,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            warning_threshold: 20.0,
            shutdown_threshold: 10.0,
            debounce_readings: 2,
            min_voltage: 3.3,
            max_voltage: 4.2,
            voltage_curve: Vec::new(),
            shutdown_command: to_strings(&["sudo", "shutdown", "-h", "now"]),
            hwmon_root: PathBuf::from("/sys/class/hwmon"),
            chip_name: "ina219".to_string(),
            log_path: PathBuf::from("battery.log"),
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

impl RcptConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}
