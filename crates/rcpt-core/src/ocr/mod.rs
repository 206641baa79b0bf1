//! Image preprocessing and text recognition adapters.

mod preprocessing;
#[cfg(feature = "native")]
mod pure_engine;
mod tesseract;

pub use preprocessing::ImagePreprocessor;
#[cfg(feature = "native")]
pub use pure_engine::PureOcrRecognizer;
pub use tesseract::TesseractRecognizer;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::OcrError;
use crate::models::config::{EngineKind, OcrConfig};

/// One recognized line of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrLine {
    /// Recognized text, possibly empty.
    pub text: String,

    /// Recognition confidence (0.0 - 1.0), when the engine reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl OcrLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// Raw OCR output for one image: ordered lines, immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawOcrText {
    lines: Vec<OcrLine>,

    /// Recognition time in milliseconds.
    #[serde(default)]
    pub processing_time_ms: u64,
}

impl RawOcrText {
    pub fn new(lines: Vec<OcrLine>) -> Self {
        Self {
            lines,
            processing_time_ms: 0,
        }
    }

    /// Build from plain strings with no confidence information.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(lines.into_iter().map(OcrLine::new).collect())
    }

    /// Split a text blob into lines. Form feeds emitted by page-oriented engines are dropped.
    pub fn from_text(text: &str) -> Self {
        let cleaned = text.replace('\u{000c}', "");
        Self::from_lines(cleaned.lines())
    }

    pub fn with_processing_time(mut self, ms: u64) -> Self {
        self.processing_time_ms = ms;
        self
    }

    pub fn lines(&self) -> &[OcrLine] {
        &self.lines
    }

    /// Line texts in order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|l| l.text.as_str())
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Full text, lines joined with newlines.
    pub fn text(&self) -> String {
        self.texts().collect::<Vec<_>>().join("\n")
    }
}

/// Adapter over an OCR engine.
pub trait TextRecognizer {
    /// Engine name, recorded in logs.
    fn name(&self) -> &'static str;

    /// Recognize text in a preprocessed image.
    ///
    /// Fails with [`OcrError::EngineUnavailable`] when the engine cannot be
    /// invoked at all; callers must surface that rather than retry.
    fn recognize(&self, image: &DynamicImage) -> Result<RawOcrText, OcrError>;
}

/// Create the recognizer selected in the configuration.
pub fn create_recognizer(config: &OcrConfig) -> Result<Box<dyn TextRecognizer>, OcrError> {
    match config.engine {
        EngineKind::Tesseract => Ok(Box::new(TesseractRecognizer::from_config(config))),
        #[cfg(feature = "native")]
        EngineKind::Onnx => Ok(Box::new(PureOcrRecognizer::from_dir(
            &config.model_dir,
            config.keep_unk,
        )?)),
        #[cfg(not(feature = "native"))]
        EngineKind::Onnx => Err(OcrError::EngineUnavailable(
            "ONNX engine requires the `native` feature".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_text_keeps_empty_lines() {
        let raw = RawOcrText::from_text("STORE X\n\nTotal 11.00\n\u{000c}");
        let texts: Vec<&str> = raw.texts().collect();
        assert_eq!(texts, vec!["STORE X", "", "Total 11.00"]);
    }

    #[test]
    fn test_text_round_trip() {
        let raw = RawOcrText::from_lines(["a", "b"]);
        assert_eq!(raw.text(), "a\nb");
        assert_eq!(raw.len(), 2);
        assert!(RawOcrText::default().is_empty());
    }
}
