//! PDF collaborator seam.
//!
//! PDF parsing and page rasterization are external collaborators: a
//! [`PageRasterizer`] implementation may be installed at startup, and the
//! orchestrator's OCR fallback renders pages through it. Without one, the
//! fallback surfaces a `MissingDependency` so operators see the gap instead
//! of silently empty text.

use crate::Result;
use crate::core::config::{ExtractionConfig, OcrConfig};
use crate::error::KreuzbergError;
use crate::ocr::OcrProcessor;
use crate::types::ExtractionResult;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::sync::RwLock;

/// Proportion of control characters above which extracted PDF text is
/// considered garbage and OCR is preferred.
pub const CONTROL_CHAR_FALLBACK_THRESHOLD: f64 = 0.05;

/// Renders PDF pages to encoded images for OCR.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    /// Render every page of the document to PNG bytes.
    async fn rasterize(&self, pdf_bytes: &[u8], target_dpi: u32) -> Result<Vec<Vec<u8>>>;
}

static PAGE_RASTERIZER: Lazy<RwLock<Option<Arc<dyn PageRasterizer>>>> = Lazy::new(|| RwLock::new(None));

/// Install a rasterizer implementation.
pub fn set_page_rasterizer(rasterizer: Arc<dyn PageRasterizer>) {
    if let Ok(mut slot) = PAGE_RASTERIZER.write() {
        *slot = Some(rasterizer);
    }
}

fn page_rasterizer() -> Option<Arc<dyn PageRasterizer>> {
    PAGE_RASTERIZER.read().ok().and_then(|slot| slot.clone())
}

/// Whether extracted text is too corrupted to trust.
pub fn text_appears_corrupted(text: &str) -> bool {
    if text.is_empty() {
        return true;
    }
    let total = text.chars().count();
    let control = text
        .chars()
        .filter(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
        .count();
    control as f64 / total as f64 > CONTROL_CHAR_FALLBACK_THRESHOLD
}

/// OCR a PDF page by page through the installed rasterizer.
pub async fn ocr_pdf_pages(
    pdf_bytes: &[u8],
    ocr_config: &OcrConfig,
    config: &ExtractionConfig,
) -> Result<ExtractionResult> {
    let rasterizer = page_rasterizer().ok_or_else(|| {
        KreuzbergError::MissingDependency(
            "PDF OCR fallback requires a page rasterizer; install one with pdf::set_page_rasterizer".to_string(),
        )
    })?;

    let pages = rasterizer.rasterize(pdf_bytes, config.dpi.target_dpi).await?;
    let mut contents = Vec::with_capacity(pages.len());
    let mut merged = ExtractionResult::new(String::new(), "text/markdown");

    for (page_index, page) in pages.iter().enumerate() {
        let mut page_result = OcrProcessor::global().process_image(page, ocr_config, config).await?;
        contents.push(std::mem::take(&mut page_result.content));
        for mut table in std::mem::take(&mut page_result.tables) {
            table.page_number = page_index + 1;
            merged.tables.push(table);
        }
    }

    merged.content = contents.join("\n\n");
    merged
        .metadata
        .additional
        .insert("page_count".to_string(), serde_json::json!(pages.len()));
    merged
        .metadata
        .additional
        .insert("ocr_applied".to_string(), serde_json::json!(true));
    Ok(merged)
}
