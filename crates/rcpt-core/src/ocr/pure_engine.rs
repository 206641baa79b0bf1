//! Pure Rust recognition using `pure-onnx-ocr` (PaddleOCR models, no ONNX Runtime).

use std::path::Path;
use std::time::Instant;

use image::{DynamicImage, GenericImageView};
use tracing::{debug, info};

use crate::error::OcrError;

use super::{OcrLine, RawOcrText, TextRecognizer};

const DETECTION_MODEL: &str = "det.onnx";
const RECOGNITION_MODEL: &str = "latin_rec.onnx";
const DICTIONARY: &str = "latin_dict.txt";

/// Recognizer backed by `pure-onnx-ocr`.
pub struct PureOcrRecognizer {
    engine: pure_onnx_ocr::engine::OcrEngine,
    keep_unk: bool,
}

/// A detected text box reduced to what line grouping needs.
#[derive(Debug, Clone)]
struct DetectedBox {
    text: String,
    confidence: f32,
    left: f32,
    top: f32,
    bottom: f32,
}

impl DetectedBox {
    fn center_y(&self) -> f32 {
        (self.top + self.bottom) / 2.0
    }

    fn height(&self) -> f32 {
        (self.bottom - self.top).max(1.0)
    }
}

impl PureOcrRecognizer {
    /// Load models from a directory.
    ///
    /// Missing model files mean the engine cannot run at all, reported as
    /// [`OcrError::EngineUnavailable`].
    pub fn from_dir(model_dir: &Path, keep_unk: bool) -> Result<Self, OcrError> {
        let det_path = model_dir.join(DETECTION_MODEL);
        let rec_path = model_dir.join(RECOGNITION_MODEL);
        let dict_path = model_dir.join(DICTIONARY);

        let missing: Vec<String> = [&det_path, &rec_path, &dict_path]
            .iter()
            .filter(|p| !p.exists())
            .map(|p| p.display().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(OcrError::EngineUnavailable(format!(
                "missing model files: {}",
                missing.join(", ")
            )));
        }

        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(&det_path)
            .rec_model_path(&rec_path)
            .dictionary_path(&dict_path)
            .build()
            .map_err(|e| OcrError::EngineUnavailable(format!("pure-onnx-ocr: {}", e)))?;

        info!("Loaded pure-onnx-ocr engine from {}", model_dir.display());

        Ok(Self { engine, keep_unk })
    }
}

impl TextRecognizer for PureOcrRecognizer {
    fn name(&self) -> &'static str {
        "pure-onnx-ocr"
    }

    fn recognize(&self, image: &DynamicImage) -> Result<RawOcrText, OcrError> {
        let start = Instant::now();
        let (width, height) = image.dimensions();

        debug!("Recognizing image: {}x{}", width, height);

        let results = self
            .engine
            .run_from_image(image)
            .map_err(|e| OcrError::Recognition(format!("pure-onnx-ocr: {}", e)))?;

        debug!("pure-onnx-ocr returned {} text regions", results.len());

        let boxes: Vec<DetectedBox> = results
            .iter()
            .map(|r| {
                let (left, top, bottom) = polygon_extent(&r.bounding_box);
                let text = if self.keep_unk {
                    r.text.clone()
                } else {
                    r.text.replace("[UNK]", " ")
                };
                DetectedBox {
                    text,
                    confidence: r.confidence,
                    left,
                    top,
                    bottom,
                }
            })
            .collect();

        let lines = group_into_lines(boxes);
        let elapsed = start.elapsed().as_millis() as u64;

        info!("OCR complete: {} lines in {}ms", lines.len(), elapsed);

        Ok(RawOcrText::new(lines).with_processing_time(elapsed))
    }
}

/// Join boxes sharing a baseline into one line, so a label and its amount
/// ("TOTAL" ... "11.00") end up together as a receipt prints them.
fn group_into_lines(mut boxes: Vec<DetectedBox>) -> Vec<OcrLine> {
    boxes.sort_by(|a, b| a.center_y().total_cmp(&b.center_y()));

    let mut rows: Vec<Vec<DetectedBox>> = Vec::new();
    for b in boxes {
        match rows.last_mut() {
            Some(row) if same_row(row, &b) => row.push(b),
            _ => rows.push(vec![b]),
        }
    }

    rows.into_iter()
        .map(|mut row| {
            row.sort_by(|a, b| a.left.total_cmp(&b.left));
            let text = row
                .iter()
                .map(|b| b.text.trim())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            let confidence = row.iter().map(|b| b.confidence).fold(f32::INFINITY, f32::min);
            OcrLine::new(text).with_confidence(confidence)
        })
        .collect()
}

fn same_row(row: &[DetectedBox], candidate: &DetectedBox) -> bool {
    let count = row.len() as f32;
    let center = row.iter().map(DetectedBox::center_y).sum::<f32>() / count;
    let height = row.iter().map(DetectedBox::height).sum::<f32>() / count;
    (candidate.center_y() - center).abs() < height / 2.0
}

/// Left edge, top and bottom of a detection polygon.
fn polygon_extent(polygon: &pure_onnx_ocr::Polygon<f64>) -> (f32, f32, f32) {
    let mut left = f32::INFINITY;
    let mut top = f32::INFINITY;
    let mut bottom = f32::NEG_INFINITY;
    for coord in polygon.exterior().coords() {
        left = left.min(coord.x as f32);
        top = top.min(coord.y as f32);
        bottom = bottom.max(coord.y as f32);
    }
    (left, top, bottom)
}
