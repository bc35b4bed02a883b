//! Plain text and Markdown extractors.

use crate::Result;
use crate::core::config::ExtractionConfig;
use crate::core::io::safe_decode;
use crate::plugins::{DocumentExtractor, Plugin};
use crate::types::ExtractionResult;
use async_trait::async_trait;

/// Extractor for plain text and, by prefix, any other `text/` subtype
/// nothing more specific claims.
#[derive(Default)]
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for PlainTextExtractor {
    fn name(&self) -> &str {
        "plain-text-extractor"
    }
}

#[async_trait]
impl DocumentExtractor for PlainTextExtractor {
    async fn extract_bytes(
        &self,
        content: &[u8],
        _mime_type: &str,
        _config: &ExtractionConfig,
    ) -> Result<ExtractionResult> {
        let text = safe_decode(content);

        let mut result = ExtractionResult::new(text, "text/plain");
        result
            .metadata
            .additional
            .insert("line_count".to_string(), serde_json::json!(result.content.lines().count()));
        result.metadata.additional.insert(
            "word_count".to_string(),
            serde_json::json!(result.content.split_whitespace().count()),
        );
        result.metadata.additional.insert(
            "character_count".to_string(),
            serde_json::json!(result.content.chars().count()),
        );
        Ok(result)
    }

    fn supported_mime_types(&self) -> &[&str] {
        &["text/plain", "text/*"]
    }

    /// Below default so exact-type extractors always win the prefix.
    fn priority(&self) -> i32 {
        40
    }
}

/// Markdown extractor: content passes through, structure lands in metadata.
#[derive(Default)]
pub struct MarkdownExtractor;

impl MarkdownExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for MarkdownExtractor {
    fn name(&self) -> &str {
        "markdown-extractor"
    }
}

#[async_trait]
impl DocumentExtractor for MarkdownExtractor {
    async fn extract_bytes(
        &self,
        content: &[u8],
        _mime_type: &str,
        _config: &ExtractionConfig,
    ) -> Result<ExtractionResult> {
        let text = safe_decode(content);

        let headers: Vec<String> = text
            .lines()
            .filter(|line| line.starts_with('#'))
            .map(|line| line.trim_start_matches('#').trim().to_string())
            .filter(|header| !header.is_empty())
            .collect();

        let mut result = ExtractionResult::new(text, "text/markdown");
        if !headers.is_empty() {
            result
                .metadata
                .additional
                .insert("headers".to_string(), serde_json::json!(headers));
        }
        Ok(result)
    }

    fn supported_mime_types(&self) -> &[&str] {
        &["text/markdown", "text/x-markdown"]
    }
}
