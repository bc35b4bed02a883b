//! Plugin traits and registries.
//!
//! Extractors, OCR backends, validators, and post-processing hooks all plug
//! into the engine through the traits defined here. Registration is explicit:
//! built-ins register at startup via [`crate::extractors::ensure_initialized`]
//! and callers may add their own implementations before extracting.

pub mod registry;

use crate::Result;
use crate::core::config::{ExtractionConfig, OcrConfig};
use crate::types::ExtractionResult;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Base trait for everything registered with the engine.
pub trait Plugin: Send + Sync {
    /// Unique kebab-case identifier.
    fn name(&self) -> &str;

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    /// Called once at registration; failing prevents registration.
    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Called when the plugin is removed or the registry shuts down.
    fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// A format-family extractor.
///
/// Contract: the returned `mime_type` is `text/plain` or `text/markdown`;
/// `chunks` stays empty unless the extractor pre-chunks; images respect
/// `config.images.extract_images`; a blob the extractor cannot parse raises
/// a `Parsing` error with file context rather than returning silently empty
/// content (unless the input was genuinely empty).
#[async_trait]
pub trait DocumentExtractor: Plugin {
    async fn extract_bytes(
        &self,
        content: &[u8],
        mime_type: &str,
        config: &ExtractionConfig,
    ) -> Result<ExtractionResult>;

    async fn extract_path(&self, path: &Path, mime_type: &str, config: &ExtractionConfig) -> Result<ExtractionResult> {
        let bytes = crate::core::io::read_file_async(path).await?;
        self.extract_bytes(&bytes, mime_type, config).await
    }

    fn extract_bytes_sync(&self, content: &[u8], mime_type: &str, config: &ExtractionConfig) -> Result<ExtractionResult> {
        crate::runtime::block_on(self.extract_bytes(content, mime_type, config))
    }

    fn extract_path_sync(&self, path: &Path, mime_type: &str, config: &ExtractionConfig) -> Result<ExtractionResult> {
        crate::runtime::block_on(self.extract_path(path, mime_type, config))
    }

    /// Exact MIME types plus optional `"image/*"`-style prefix patterns.
    fn supported_mime_types(&self) -> &[&str];

    /// Higher wins when several extractors claim a type. Default 50.
    fn priority(&self) -> i32 {
        50
    }
}

/// An OCR engine.
#[async_trait]
pub trait OcrBackend: Plugin {
    async fn process_image(&self, image: &[u8], config: &OcrConfig) -> Result<ExtractionResult>;

    async fn process_file(&self, path: &Path, config: &OcrConfig) -> Result<ExtractionResult>;

    async fn process_batch(&self, paths: &[PathBuf], config: &OcrConfig) -> Vec<Result<ExtractionResult>> {
        let mut results = Vec::with_capacity(paths.len());
        for path in paths {
            results.push(self.process_file(path, config).await);
        }
        results
    }

    fn process_image_sync(&self, image: &[u8], config: &OcrConfig) -> Result<ExtractionResult> {
        crate::runtime::block_on(self.process_image(image, config))
    }

    fn process_file_sync(&self, path: &Path, config: &OcrConfig) -> Result<ExtractionResult> {
        crate::runtime::block_on(self.process_file(path, config))
    }

    fn process_batch_sync(&self, paths: &[PathBuf], config: &OcrConfig) -> Vec<Result<ExtractionResult>> {
        crate::runtime::block_on(self.process_batch(paths, config))
    }

    fn supports_language(&self, _lang: &str) -> bool {
        true
    }

    fn supports_table_detection(&self) -> bool {
        false
    }
}

/// A fail-fast check over the finished extraction result.
#[async_trait]
pub trait Validator: Send + Sync {
    fn name(&self) -> &str {
        "validator"
    }

    async fn validate(&self, result: &ExtractionResult, config: &ExtractionConfig) -> Result<()>;
}

/// An error-isolated post-processing hook.
#[async_trait]
pub trait PostProcessor: Send + Sync {
    fn name(&self) -> &str {
        "post-processor"
    }

    async fn process(&self, result: &mut ExtractionResult, config: &ExtractionConfig) -> Result<()>;
}
