//! Content chunking for downstream model consumption.
//!
//! Chunk boundaries come from `text-splitter`, which respects semantic
//! boundaries (sentences, paragraphs, Markdown structure) where it can.
//! Markdown content uses the Markdown-aware splitter so headers and fenced
//! blocks do not straddle chunks.

use crate::error::{KreuzbergError, Result};
use text_splitter::{ChunkConfig, MarkdownSplitter, TextSplitter};

/// Split `content` into ordered, overlapping chunks.
///
/// `max_chars` bounds each chunk; `max_overlap` characters are shared
/// between neighbors. The media type selects plain-text or Markdown
/// splitting.
pub fn chunk_content(content: &str, mime_type: &str, max_chars: usize, max_overlap: usize) -> Result<Vec<String>> {
    if content.is_empty() {
        return Ok(Vec::new());
    }

    let chunk_config = ChunkConfig::new(max_chars)
        .with_overlap(max_overlap)
        .map_err(|e| KreuzbergError::validation(format!("Invalid chunking configuration: {}", e)))?;

    let chunks = if mime_type == crate::core::mime::MARKDOWN_MIME_TYPE {
        MarkdownSplitter::new(chunk_config)
            .chunks(content)
            .map(str::to_string)
            .collect()
    } else {
        TextSplitter::new(chunk_config).chunks(content).map(str::to_string).collect()
    };

    Ok(chunks)
}
