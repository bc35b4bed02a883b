//! Image extractor: dispatches to the OCR subsystem.

use crate::Result;
use crate::core::config::ExtractionConfig;
use crate::error::KreuzbergError;
use crate::ocr::OcrProcessor;
use crate::plugins::{DocumentExtractor, Plugin};
use crate::types::ExtractionResult;
use async_trait::async_trait;

#[derive(Default)]
pub struct ImageExtractor;

impl ImageExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for ImageExtractor {
    fn name(&self) -> &str {
        "image-extractor"
    }
}

#[async_trait]
impl DocumentExtractor for ImageExtractor {
    async fn extract_bytes(&self, content: &[u8], mime_type: &str, config: &ExtractionConfig) -> Result<ExtractionResult> {
        let Some(ocr_config) = config.effective_ocr_config() else {
            return Err(KreuzbergError::validation(format!(
                "Cannot extract text from '{}' with ocr_backend set to 'none'",
                mime_type
            )));
        };

        OcrProcessor::global().process_image(content, &ocr_config, config).await
    }

    fn supported_mime_types(&self) -> &[&str] {
        &["image/*"]
    }
}
