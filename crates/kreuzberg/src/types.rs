//! Core data model shared across the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// General extraction result returned by the extraction API.
///
/// Mutable while the post-processing pipeline runs, then frozen on return or
/// cache store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub content: String,
    pub mime_type: String,
    pub metadata: Metadata,

    /// Ordered, possibly overlapping text chunks (empty unless chunking ran).
    #[serde(default)]
    pub chunks: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<Entity>>,

    /// `(keyword, score)` pairs, best first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<(String, f64)>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_languages: Option<Vec<String>>,

    #[serde(default)]
    pub tables: Vec<Table>,

    #[serde(default)]
    pub images: Vec<ExtractedImage>,

    #[serde(default)]
    pub image_ocr_results: Vec<ImageOcrResult>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_type_confidence: Option<f64>,

    /// Word-level layout (text + bounding boxes) produced by TSV-capable OCR
    /// backends; consumed by vision-mode document classification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<Vec<TsvWord>>,
}

impl ExtractionResult {
    /// Build a bare result with empty metadata and derived fields.
    pub fn new(content: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            mime_type: mime_type.into(),
            metadata: Metadata::default(),
            chunks: Vec::new(),
            entities: None,
            keywords: None,
            detected_languages: None,
            tables: Vec::new(),
            images: Vec::new(),
            image_ocr_results: Vec::new(),
            document_type: None,
            document_type_confidence: None,
            layout: None,
        }
    }
}

/// Extraction result metadata.
///
/// Typed fields for pipeline bookkeeping plus a flattened map for
/// extractor-specific and hook-contributed entries.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Metadata {
    /// Set on batch error shells.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorMetadata>,

    /// Diagnostic map accompanying `error` (operation, index, input, trace).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_context: Option<serde_json::Value>,

    /// Failures of optional pipeline stages and hooks, in occurrence order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub processing_errors: Vec<ProcessingError>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_reduction: Option<TokenReductionStats>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_preprocessing: Option<ImagePreprocessingMetadata>,

    #[serde(flatten)]
    pub additional: HashMap<String, serde_json::Value>,
}

/// Error summary for batch error shells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMetadata {
    pub error_type: String,
    pub message: String,
}

/// A trapped optional-stage failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingError {
    pub feature: String,
    pub error_type: String,
    pub error_message: String,
}

/// A named entity span. Offsets are byte positions into `content`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub entity_type: String,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// A table artifact extracted from a document or reconstructed from OCR.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Page the table was found on (1-indexed; 0 when unknown).
    pub page_number: usize,
    /// Markdown rendering of the table.
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cropped_image: Option<Vec<u8>>,
    /// Cell grid (rows × columns) when structure is known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid: Option<Vec<Vec<String>>>,
}

/// An image extracted from a document.
///
/// Identity for deduplication is the SHA-256 of `data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedImage {
    pub data: Vec<u8>,
    /// Lowercase format name, e.g. "png", "jpeg".
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<(u32, u32)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Per-image OCR outcome inside a document extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageOcrResult {
    pub image: ExtractedImage,
    pub ocr_result: Box<ExtractionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    /// Wall-clock seconds spent in the backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<f64>,
    /// Why OCR was skipped for this image, when it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped_reason: Option<String>,
}

/// One word-level row of Tesseract TSV output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TsvWord {
    pub level: u32,
    pub page_num: u32,
    pub block_num: u32,
    pub par_num: u32,
    pub line_num: u32,
    pub word_num: u32,
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
    pub conf: f64,
    pub text: String,
}

/// Compute device description reported by the pool manager and OCR backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// One of "cpu", "cuda", "mps".
    pub device_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_total_gb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_available_gb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Statistics recorded by token reduction into result metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenReductionStats {
    pub character_reduction_ratio: f64,
    pub token_reduction_ratio: f64,
    pub original_characters: usize,
    pub reduced_characters: usize,
    pub original_tokens: usize,
    pub reduced_tokens: usize,
}

/// Transformations applied during OCR image pre-processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagePreprocessingMetadata {
    pub original_dimensions: (u32, u32),
    pub original_dpi: (f64, f64),
    pub target_dpi: u32,
    pub scale_factor: f64,
    pub auto_adjusted: bool,
    pub final_dpi: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_dimensions: Option<(u32, u32)>,
    /// Resampling algorithm used ("LANCZOS3", "CATMULLROM").
    pub resample_method: String,
    pub dimension_clamped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calculated_dpi: Option<u32>,
    pub skipped_resize: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_new_defaults() {
        let result = ExtractionResult::new("hello", "text/plain");
        assert_eq!(result.content, "hello");
        assert_eq!(result.mime_type, "text/plain");
        assert!(result.chunks.is_empty());
        assert!(result.entities.is_none());
        assert!(result.tables.is_empty());
        assert!(result.layout.is_none());
    }

    #[test]
    fn test_metadata_flattens_additional() {
        let mut metadata = Metadata::default();
        metadata
            .additional
            .insert("source_format".to_string(), serde_json::json!("tsv"));

        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json.get("source_format").unwrap(), "tsv");
        assert!(json.get("additional").is_none());
    }

    #[test]
    fn test_metadata_skips_empty_processing_errors() {
        let json = serde_json::to_value(Metadata::default()).unwrap();
        assert!(json.get("processing_errors").is_none());
    }

    #[test]
    fn test_result_roundtrip_serde() {
        let mut result = ExtractionResult::new("body", "text/markdown");
        result.tables.push(Table {
            page_number: 1,
            text: "| a |".to_string(),
            cropped_image: None,
            grid: Some(vec![vec!["a".to_string()]]),
        });
        result.keywords = Some(vec![("term".to_string(), 0.9)]);

        let bytes = rmp_serde::to_vec_named(&result).unwrap();
        let back: ExtractionResult = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(back.content, "body");
        assert_eq!(back.tables.len(), 1);
        assert_eq!(back.keywords.as_ref().unwrap()[0].0, "term");
    }

    #[test]
    fn test_entity_span_ordering() {
        let entity = Entity {
            entity_type: "EMAIL".to_string(),
            text: "a@b.co".to_string(),
            start: 10,
            end: 16,
        };
        assert!(entity.start <= entity.end);
    }
}
