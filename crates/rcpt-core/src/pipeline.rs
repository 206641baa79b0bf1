//! End-to-end processing: image to canonical receipt.

use std::path::Path;
use std::time::Instant;

use image::DynamicImage;
use tracing::{debug, info};

use crate::assemble::{Assembly, CaptureMetadata, ReceiptAssembler};
use crate::error::Result;
use crate::extract::{ExtractedFields, FieldExtractionEngine};
use crate::models::config::RcptConfig;
use crate::ocr::{create_recognizer, ImagePreprocessor, RawOcrText, TextRecognizer};

/// Result of processing one receipt.
#[derive(Debug, Clone)]
pub struct ProcessedReceipt {
    /// Assembled record, warnings and total provenance.
    pub assembly: Assembly,
    /// Extraction winners and candidates.
    pub fields: ExtractedFields,
    /// Recognized text.
    pub raw: RawOcrText,
    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

/// Extraction plus assembly over already-recognized text.
pub struct ReceiptParser {
    engine: FieldExtractionEngine,
    assembler: ReceiptAssembler,
}

impl ReceiptParser {
    pub fn new(config: &RcptConfig) -> Result<Self> {
        Ok(Self {
            engine: FieldExtractionEngine::new(&config.extraction)?,
            assembler: ReceiptAssembler::new(&config.extraction),
        })
    }

    pub fn parse(&self, raw: RawOcrText, capture: &CaptureMetadata) -> Result<ProcessedReceipt> {
        let start = Instant::now();
        let fields = self.engine.extract(&raw);
        let assembly = self.assembler.assemble(&fields, capture, &raw)?;

        Ok(ProcessedReceipt {
            assembly,
            fields,
            processing_time_ms: raw.processing_time_ms + start.elapsed().as_millis() as u64,
            raw,
        })
    }
}

/// Preprocess, recognize, extract, assemble.
///
/// Holds no locks: concurrent callers each run their own blocking
/// preprocessing and recognition.
pub struct ReceiptPipeline {
    preprocessor: ImagePreprocessor,
    recognizer: Box<dyn TextRecognizer>,
    parser: ReceiptParser,
}

impl ReceiptPipeline {
    /// Build a pipeline with the recognizer selected in the configuration.
    pub fn new(config: &RcptConfig) -> Result<Self> {
        let recognizer = create_recognizer(&config.ocr)?;
        Self::with_recognizer(config, recognizer)
    }

    /// Build a pipeline around a given recognizer.
    pub fn with_recognizer(config: &RcptConfig, recognizer: Box<dyn TextRecognizer>) -> Result<Self> {
        info!("Using {} recognizer", recognizer.name());
        Ok(Self {
            preprocessor: ImagePreprocessor::from_config(&config.ocr),
            recognizer,
            parser: ReceiptParser::new(config)?,
        })
    }

    /// Process an image file. The file path becomes the image reference.
    pub fn process_path(&self, path: &Path, captured: Option<CaptureMetadata>) -> Result<ProcessedReceipt> {
        let capture = captured.unwrap_or_else(|| CaptureMetadata::now(path.display().to_string()));
        let image = self.preprocessor.process_path(path)?;
        self.recognize_and_parse(DynamicImage::ImageLuma8(image), &capture)
    }

    /// Process encoded image bytes.
    pub fn process_bytes(&self, bytes: &[u8], capture: &CaptureMetadata) -> Result<ProcessedReceipt> {
        let image = self.preprocessor.process_bytes(bytes)?;
        self.recognize_and_parse(DynamicImage::ImageLuma8(image), capture)
    }

    /// Run extraction and assembly on text recognized elsewhere.
    pub fn parse(&self, raw: RawOcrText, capture: &CaptureMetadata) -> Result<ProcessedReceipt> {
        self.parser.parse(raw, capture)
    }

    fn recognize_and_parse(&self, image: DynamicImage, capture: &CaptureMetadata) -> Result<ProcessedReceipt> {
        let start = Instant::now();
        let raw = self.recognizer.recognize(&image)?;
        debug!("Recognized {} lines from {}", raw.len(), capture.image_ref);

        let mut processed = self.parser.parse(raw, capture)?;
        processed.processing_time_ms = start.elapsed().as_millis() as u64;

        info!(
            "Processed {} in {}ms (total {:?}, {:?})",
            capture.image_ref,
            processed.processing_time_ms,
            processed.assembly.receipt.total,
            processed.assembly.total_provenance,
        );

        Ok(processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::TotalProvenance;
    use crate::error::{OcrError, RcptError};
    use image::{GrayImage, ImageFormat};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::io::Cursor;

    /// Recognizer returning fixed lines regardless of the image.
    struct FixedRecognizer(Vec<&'static str>);

    impl TextRecognizer for FixedRecognizer {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn recognize(&self, _image: &DynamicImage) -> std::result::Result<RawOcrText, OcrError> {
            Ok(RawOcrText::from_lines(self.0.iter().copied()))
        }
    }

    struct UnavailableRecognizer;

    impl TextRecognizer for UnavailableRecognizer {
        fn name(&self) -> &'static str {
            "unavailable"
        }

        fn recognize(&self, _image: &DynamicImage) -> std::result::Result<RawOcrText, OcrError> {
            Err(OcrError::EngineUnavailable("not installed".to_string()))
        }
    }

    fn png_bytes() -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageLuma8(GrayImage::from_pixel(32, 32, image::Luma([255])))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_process_bytes_end_to_end() {
        let pipeline = ReceiptPipeline::with_recognizer(
            &RcptConfig::default(),
            Box::new(FixedRecognizer(vec!["STORE X", "Total 11.00"])),
        )
        .unwrap();

        let processed = pipeline
            .process_bytes(&png_bytes(), &CaptureMetadata::now("mem"))
            .unwrap();

        assert_eq!(processed.assembly.receipt.vendor.as_deref(), Some("STORE X"));
        assert_eq!(processed.assembly.receipt.total, Some(Decimal::new(1100, 2)));
        assert_eq!(processed.assembly.total_provenance, TotalProvenance::Labeled);
        assert_eq!(processed.raw.len(), 2);
    }

    #[test]
    fn test_engine_unavailable_surfaces() {
        let pipeline =
            ReceiptPipeline::with_recognizer(&RcptConfig::default(), Box::new(UnavailableRecognizer)).unwrap();

        let result = pipeline.process_bytes(&png_bytes(), &CaptureMetadata::now("mem"));
        assert!(matches!(result, Err(RcptError::Ocr(OcrError::EngineUnavailable(_)))));
    }

    #[test]
    fn test_corrupt_image_is_decode_error() {
        let pipeline = ReceiptPipeline::with_recognizer(
            &RcptConfig::default(),
            Box::new(FixedRecognizer(vec![])),
        )
        .unwrap();

        let result = pipeline.process_bytes(b"not an image", &CaptureMetadata::now("mem"));
        assert!(matches!(result, Err(RcptError::Ocr(OcrError::ImageDecode(_)))));
    }

    #[test]
    fn test_parse_without_recognizer() {
        let parser = ReceiptParser::new(&RcptConfig::default()).unwrap();
        let processed = parser
            .parse(RawOcrText::from_lines(["4.50", "23.10", "9.99"]), &CaptureMetadata::now("text"))
            .unwrap();

        assert_eq!(processed.assembly.receipt.total, Some(Decimal::new(2310, 2)));
        assert_eq!(processed.assembly.total_provenance, TotalProvenance::LargestAmount);
    }
}
