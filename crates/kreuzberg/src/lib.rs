//! Kreuzberg - multi-format document text extraction.
//!
//! Given a file or an in-memory blob with a declared media type, the engine
//! produces normalized text (plain or Markdown), structured metadata, and
//! optional derived artifacts: chunks, entities, keywords, detected
//! languages, an inferred document type, tables, and per-image OCR results.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use kreuzberg::{ExtractionConfig, extract_file_sync};
//!
//! # fn main() -> kreuzberg::Result<()> {
//! let config = ExtractionConfig::default();
//! let result = extract_file_sync("document.pdf", None, &config)?;
//! println!("{}", result.content);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - `core` - orchestration, configuration, MIME handling, the pipeline
//! - `plugins` - extractor/OCR/validator/hook traits and registries
//! - `cache` - content-addressed result cache with single-flight coordination
//! - `pool` - memory-aware worker pool for CPU-bound work
//! - `ocr` - subprocess Tesseract, TSV table reconstruction, OCR cache
//! - `text` - token reduction and text utilities

#![deny(unsafe_code)]

pub mod cache;
pub mod chunking;
pub mod classification;
pub mod core;
pub mod entities;
pub mod error;
pub mod extractors;
pub mod keywords;
pub mod language_detection;
pub mod ocr;
pub mod pdf;
pub mod plugins;
pub mod pool;
pub mod runtime;
pub mod stopwords;
pub mod text;
pub mod types;

pub use error::{CallContext, KreuzbergError, Result, must_bubble};
pub use types::*;

pub use crate::core::config::{
    ClassificationMode, ExtractionConfig, ImageExtractionConfig, LanguageDetectionConfig, OcrBackendKind, OcrConfig,
};
pub use crate::core::extractor::{
    batch_extract_bytes, batch_extract_bytes_sync, batch_extract_file, batch_extract_file_sync, extract_bytes,
    extract_bytes_sync, extract_file, extract_file_sync,
};
pub use crate::core::mime::{
    MARKDOWN_MIME_TYPE, PDF_MIME_TYPE, PLAIN_TEXT_MIME_TYPE, detect_mime_type, detect_mime_type_from_bytes,
    detect_or_validate, validate_mime_type,
};

pub use plugins::registry::{get_document_extractor_registry, get_ocr_backend_registry};
pub use plugins::{DocumentExtractor, OcrBackend, Plugin, PostProcessor, Validator};

pub use ocr::{OcrProcessor, PsmMode, TesseractConfig};
pub use pool::{ProcessPoolManager, get_process_pool, optimal_worker_count, shutdown_process_pool};
pub use text::token_reduction::{ReductionMode, TokenReductionConfig, get_reduction_stats, reduce_tokens};
