//! Extraction configuration.
//!
//! [`ExtractionConfig`] aggregates every switch the orchestrator honors. It
//! is immutable once constructed: [`ExtractionConfig::validate`] rejects
//! inconsistent combinations up front, and a stable [`content_hash`] feeds
//! cache-key composition.
//!
//! [`content_hash`]: ExtractionConfig::content_hash

use crate::cache::content_digest;
use crate::error::{KreuzbergError, Result};
use crate::ocr::preprocess::ImagePreprocessConfig;
use crate::ocr::types::{EasyOcrConfig, PaddleOcrConfig, TesseractConfig};
use crate::plugins::{PostProcessor, Validator};
use crate::text::token_reduction::TokenReductionConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

/// Which OCR engine the orchestrator routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OcrBackendKind {
    #[default]
    Tesseract,
    EasyOcr,
    PaddleOcr,
    None,
}

impl OcrBackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OcrBackendKind::Tesseract => "tesseract",
            OcrBackendKind::EasyOcr => "easyocr",
            OcrBackendKind::PaddleOcr => "paddleocr",
            OcrBackendKind::None => "none",
        }
    }
}

impl std::str::FromStr for OcrBackendKind {
    type Err = KreuzbergError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "tesseract" => Ok(OcrBackendKind::Tesseract),
            "easyocr" => Ok(OcrBackendKind::EasyOcr),
            "paddleocr" => Ok(OcrBackendKind::PaddleOcr),
            "none" => Ok(OcrBackendKind::None),
            other => Err(KreuzbergError::validation(format!("Unknown OCR backend: {}", other))),
        }
    }
}

/// Backend-specific OCR configuration.
///
/// The variant must agree with [`ExtractionConfig::ocr_backend`]; a mismatch
/// is rejected at validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum OcrConfig {
    Tesseract(TesseractConfig),
    EasyOcr(EasyOcrConfig),
    PaddleOcr(PaddleOcrConfig),
}

impl OcrConfig {
    pub fn backend_name(&self) -> &'static str {
        self.kind().as_str()
    }

    pub fn kind(&self) -> OcrBackendKind {
        match self {
            OcrConfig::Tesseract(_) => OcrBackendKind::Tesseract,
            OcrConfig::EasyOcr(_) => OcrBackendKind::EasyOcr,
            OcrConfig::PaddleOcr(_) => OcrBackendKind::PaddleOcr,
        }
    }

    pub fn use_cache(&self) -> bool {
        match self {
            OcrConfig::Tesseract(config) => config.use_cache,
            _ => true,
        }
    }

    /// Stable hash of the backend configuration for OCR cache keys.
    pub fn config_hash(&self) -> String {
        match self {
            OcrConfig::Tesseract(config) => {
                let material: Vec<String> =
                    config.cache_items().into_iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                content_digest(material.join("&").as_bytes())
            }
            other => {
                let value = serde_json::to_value(other).unwrap_or_default();
                content_digest(value.to_string().as_bytes())
            }
        }
    }
}

/// How document classification scores a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationMode {
    #[default]
    Text,
    Vision,
}

/// Language detection tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageDetectionConfig {
    /// Minimum confidence (0.0-1.0) for a detection to count.
    pub min_confidence: f64,
    /// Detect several languages by scoring text chunks.
    pub detect_multiple: bool,
}

impl Default for LanguageDetectionConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.8,
            detect_multiple: false,
        }
    }
}

/// Image extraction and per-image OCR options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageExtractionConfig {
    pub extract_images: bool,
    /// Run OCR over every extracted image.
    pub ocr_extracted_images: bool,
    pub image_ocr_backend: OcrBackendKind,
    /// `(width, height)` below which images are skipped.
    pub min_dimensions: (u32, u32),
    /// `(width, height)` above which images are skipped.
    pub max_dimensions: (u32, u32),
    /// Lowercase format names eligible for OCR.
    pub allowed_formats: BTreeSet<String>,
    /// Deduplicate images by content digest before OCR.
    pub deduplicate_images: bool,
}

impl Default for ImageExtractionConfig {
    fn default() -> Self {
        Self {
            extract_images: false,
            ocr_extracted_images: false,
            image_ocr_backend: OcrBackendKind::Tesseract,
            min_dimensions: (50, 50),
            max_dimensions: (10000, 10000),
            allowed_formats: ["png", "jpg", "jpeg", "webp", "bmp", "tiff", "gif"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            deduplicate_images: true,
        }
    }
}

/// Main extraction configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    // Routing.
    pub ocr_backend: OcrBackendKind,
    pub ocr_config: Option<OcrConfig>,
    /// Skip the text-first attempt for PDFs and OCR immediately.
    pub force_ocr: bool,

    // Post-processing.
    pub chunk_content: bool,
    pub max_chars: usize,
    pub max_overlap: usize,
    pub extract_entities: bool,
    /// `(entity_type, regex)` pairs merged over the built-in patterns.
    pub custom_entity_patterns: Option<Vec<(String, String)>>,
    pub extract_keywords: bool,
    pub keyword_count: usize,
    pub auto_detect_language: bool,
    pub language_detection: LanguageDetectionConfig,
    pub auto_detect_document_type: bool,
    pub document_classification_mode: ClassificationMode,
    pub document_type_confidence_threshold: f64,

    // Content shaping.
    pub token_reduction: Option<TokenReductionConfig>,

    // Images and tables.
    pub extract_tables: bool,
    pub images: ImageExtractionConfig,

    // DPI normalization for OCR inputs.
    pub dpi: ImagePreprocessConfig,

    // Reliability.
    pub use_cache: bool,
    /// Passwords to try for encrypted PDFs, in order.
    pub pdf_password: Vec<String>,

    /// Concurrency ceiling for batch operations (default `2 * cpus`).
    pub max_concurrent_extractions: Option<usize>,

    // Extensibility. Not part of serialization or the content hash.
    #[serde(skip)]
    pub validators: Vec<Arc<dyn Validator>>,
    #[serde(skip)]
    pub post_processing_hooks: Vec<Arc<dyn PostProcessor>>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            ocr_backend: OcrBackendKind::Tesseract,
            ocr_config: None,
            force_ocr: false,
            chunk_content: false,
            max_chars: 1000,
            max_overlap: 200,
            extract_entities: false,
            custom_entity_patterns: None,
            extract_keywords: false,
            keyword_count: 10,
            auto_detect_language: false,
            language_detection: LanguageDetectionConfig::default(),
            auto_detect_document_type: false,
            document_classification_mode: ClassificationMode::Text,
            document_type_confidence_threshold: 0.5,
            token_reduction: None,
            extract_tables: false,
            images: ImageExtractionConfig::default(),
            dpi: ImagePreprocessConfig::default(),
            use_cache: true,
            pdf_password: Vec::new(),
            max_concurrent_extractions: None,
            validators: Vec::new(),
            post_processing_hooks: Vec::new(),
        }
    }
}

impl std::fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("ocr_backend", &self.ocr_backend)
            .field("ocr_config", &self.ocr_config)
            .field("force_ocr", &self.force_ocr)
            .field("chunk_content", &self.chunk_content)
            .field("max_chars", &self.max_chars)
            .field("max_overlap", &self.max_overlap)
            .field("extract_entities", &self.extract_entities)
            .field("extract_keywords", &self.extract_keywords)
            .field("auto_detect_language", &self.auto_detect_language)
            .field("auto_detect_document_type", &self.auto_detect_document_type)
            .field("token_reduction", &self.token_reduction)
            .field("extract_tables", &self.extract_tables)
            .field("use_cache", &self.use_cache)
            .field("validators", &self.validators.len())
            .field("post_processing_hooks", &self.post_processing_hooks.len())
            .finish_non_exhaustive()
    }
}

impl ExtractionConfig {
    /// Check construction-time invariants.
    pub fn validate(&self) -> Result<()> {
        if self.max_chars == 0 {
            return Err(KreuzbergError::validation("max_chars must be greater than zero"));
        }
        if self.max_overlap >= self.max_chars {
            return Err(KreuzbergError::validation(format!(
                "max_overlap ({}) must be smaller than max_chars ({})",
                self.max_overlap, self.max_chars
            )));
        }
        if self.extract_keywords && self.keyword_count == 0 {
            return Err(KreuzbergError::validation("keyword_count must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&self.document_type_confidence_threshold) {
            return Err(KreuzbergError::validation(format!(
                "document_type_confidence_threshold must be within [0, 1], got {}",
                self.document_type_confidence_threshold
            )));
        }
        if self.dpi.min_dpi >= self.dpi.max_dpi {
            return Err(KreuzbergError::validation(format!(
                "min_dpi ({}) must be smaller than max_dpi ({})",
                self.dpi.min_dpi, self.dpi.max_dpi
            )));
        }
        if self.dpi.target_dpi < self.dpi.min_dpi || self.dpi.target_dpi > self.dpi.max_dpi {
            return Err(KreuzbergError::validation(format!(
                "target_dpi ({}) must lie within [{}, {}]",
                self.dpi.target_dpi, self.dpi.min_dpi, self.dpi.max_dpi
            )));
        }
        if self.dpi.max_image_dimension == 0 {
            return Err(KreuzbergError::validation("max_image_dimension must be greater than zero"));
        }

        if let Some(ocr_config) = &self.ocr_config {
            if self.ocr_backend == OcrBackendKind::None {
                return Err(KreuzbergError::validation(
                    "ocr_config was provided but ocr_backend is 'none'",
                ));
            }
            if ocr_config.kind() != self.ocr_backend {
                return Err(KreuzbergError::validation(format!(
                    "ocr_config variant '{}' does not match ocr_backend '{}'",
                    ocr_config.backend_name(),
                    self.ocr_backend.as_str()
                )));
            }
        }

        if let Some(patterns) = &self.custom_entity_patterns {
            for (entity_type, pattern) in patterns {
                regex::Regex::new(pattern).map_err(|e| {
                    KreuzbergError::validation(format!(
                        "Invalid custom entity pattern for '{}': {}",
                        entity_type, e
                    ))
                })?;
            }
        }

        Ok(())
    }

    /// The OCR configuration the orchestrator routes with: explicit config if
    /// present, defaults for the selected backend otherwise, `None` when OCR
    /// is disabled.
    pub fn effective_ocr_config(&self) -> Option<OcrConfig> {
        if let Some(config) = &self.ocr_config {
            return Some(config.clone());
        }
        match self.ocr_backend {
            OcrBackendKind::Tesseract => Some(OcrConfig::Tesseract(TesseractConfig {
                enable_table_detection: self.extract_tables,
                ..Default::default()
            })),
            OcrBackendKind::EasyOcr => Some(OcrConfig::EasyOcr(EasyOcrConfig::default())),
            OcrBackendKind::PaddleOcr => Some(OcrConfig::PaddleOcr(PaddleOcrConfig::default())),
            OcrBackendKind::None => None,
        }
    }

    /// Stable content hash for cache-key composition.
    ///
    /// Serialization goes through `serde_json::Value`, whose object maps are
    /// ordered, so the hash is independent of field iteration order.
    /// Validators and hooks are excluded.
    pub fn content_hash(&self) -> String {
        let value = serde_json::to_value(self).unwrap_or_default();
        content_digest(value.to_string().as_bytes())
    }

    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            KreuzbergError::validation(format!("Failed to read config file {}: {}", path.as_ref().display(), e))
        })?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| KreuzbergError::validation(format!("Invalid TOML in {}: {}", path.as_ref().display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Discover `kreuzberg.toml` by walking upward from the working
    /// directory.
    pub fn discover() -> Result<Option<Self>> {
        let mut current = std::env::current_dir()?;

        loop {
            let candidate = current.join("kreuzberg.toml");
            if candidate.exists() {
                return Ok(Some(Self::from_toml_file(candidate)?));
            }
            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => break,
            }
        }

        Ok(None)
    }
}
