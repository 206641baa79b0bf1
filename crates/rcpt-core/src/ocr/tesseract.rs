//! Recognition through the external `tesseract` binary.

use std::io::ErrorKind;
use std::process::{Command, Stdio};
use std::time::Instant;

use image::{DynamicImage, ImageFormat};
use tracing::{debug, info};

use crate::error::OcrError;
use crate::models::config::OcrConfig;

use super::{RawOcrText, TextRecognizer};

/// Runs `tesseract <image> stdout` on a temporary PNG.
pub struct TesseractRecognizer {
    binary: String,
    language: String,
    page_segmentation_mode: u8,
}

impl TesseractRecognizer {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            language: "eng".to_string(),
            page_segmentation_mode: 4,
        }
    }

    pub fn from_config(config: &OcrConfig) -> Self {
        Self::new(config.tesseract_binary.clone())
            .with_language(config.language.clone())
            .with_page_segmentation_mode(config.page_segmentation_mode)
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_page_segmentation_mode(mut self, psm: u8) -> Self {
        self.page_segmentation_mode = psm;
        self
    }

    fn command(&self, input: &std::path::Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(input)
            .arg("stdout")
            .args(["-l", &self.language])
            .args(["--psm", &self.page_segmentation_mode.to_string()])
            .stdin(Stdio::null());
        cmd
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn recognize(&self, image: &DynamicImage) -> Result<RawOcrText, OcrError> {
        let start = Instant::now();

        let input = tempfile::Builder::new()
            .prefix("rcpt-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| OcrError::Recognition(format!("failed to create temp file: {}", e)))?;
        image
            .save_with_format(input.path(), ImageFormat::Png)
            .map_err(|e| OcrError::Recognition(format!("failed to write temp image: {}", e)))?;

        debug!("Running {} on {}", self.binary, input.path().display());

        let output = self.command(input.path()).output().map_err(|e| match e.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => OcrError::EngineUnavailable(
                format!("cannot run '{}': {}", self.binary, e),
            ),
            _ => OcrError::Recognition(format!("'{}' failed to start: {}", self.binary, e)),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // Missing traineddata is an installation problem, not a bad image.
            if stderr.contains("Failed loading language") || stderr.contains("Error opening data file") {
                return Err(OcrError::EngineUnavailable(stderr.trim().to_string()));
            }
            return Err(OcrError::Recognition(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        let elapsed = start.elapsed().as_millis() as u64;
        let raw = RawOcrText::from_text(&text).with_processing_time(elapsed);

        info!("tesseract recognized {} lines in {}ms", raw.len(), elapsed);

        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;

    #[test]
    fn test_missing_binary_is_engine_unavailable() {
        let recognizer = TesseractRecognizer::new("/nonexistent/bin/tesseract-rcpt");
        let image = DynamicImage::ImageLuma8(GrayImage::new(8, 8));

        let result = recognizer.recognize(&image);
        assert!(matches!(result, Err(OcrError::EngineUnavailable(_))));
    }

    #[test]
    fn test_command_arguments() {
        let recognizer = TesseractRecognizer::new("tesseract")
            .with_language("deu")
            .with_page_segmentation_mode(6);
        let cmd = recognizer.command(std::path::Path::new("in.png"));

        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, vec!["in.png", "stdout", "-l", "deu", "--psm", "6"]);
    }
}
