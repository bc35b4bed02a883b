//! MIME type validation and detection.
//!
//! Media types are opaque case-sensitive ASCII strings. Validation checks
//! shape (`type/subtype`); detection combines file-extension lookup with
//! magic-byte sniffing, and sniff outcomes are memoized in their own cache
//! namespace.

use crate::cache::{DocumentCache, content_digest};
use crate::error::{KreuzbergError, Result};
use once_cell::sync::Lazy;
use std::path::Path;

pub const PLAIN_TEXT_MIME_TYPE: &str = "text/plain";
pub const MARKDOWN_MIME_TYPE: &str = "text/markdown";
pub const HTML_MIME_TYPE: &str = "text/html";
pub const JSON_MIME_TYPE: &str = "application/json";
pub const TOML_MIME_TYPE: &str = "application/toml";
pub const PDF_MIME_TYPE: &str = "application/pdf";

static MIME_SNIFF_CACHE: Lazy<Option<DocumentCache>> =
    Lazy::new(|| DocumentCache::new("mime", None, 10_000, 16.0).ok());

/// Check that a caller-supplied media type is plausibly a MIME type.
pub fn validate_mime_type(mime_type: &str) -> Result<String> {
    let trimmed = mime_type.trim();
    let valid = trimmed.is_ascii()
        && trimmed.split_once('/').is_some_and(|(major, minor)| {
            !major.is_empty() && !minor.is_empty() && !major.contains(char::is_whitespace) && !minor.contains(char::is_whitespace)
        });

    if !valid {
        return Err(KreuzbergError::validation(format!(
            "Invalid MIME type: '{}'",
            mime_type
        )));
    }
    Ok(trimmed.to_string())
}

/// Detect a MIME type from an extension, falling back to magic bytes.
pub fn detect_mime_type(path: &Path) -> Option<String> {
    let by_extension = mime_guess::from_path(path).first_raw();
    if let Some(mime) = by_extension {
        // mime_guess maps .md to text/x-markdown on some databases.
        if mime.ends_with("markdown") {
            return Some(MARKDOWN_MIME_TYPE.to_string());
        }
        return Some(mime.to_string());
    }

    let bytes = std::fs::read(path).ok()?;
    detect_mime_type_from_bytes(&bytes)
}

/// Sniff a MIME type from magic bytes, memoized by content digest.
pub fn detect_mime_type_from_bytes(bytes: &[u8]) -> Option<String> {
    let preview = &bytes[..bytes.len().min(8192)];
    let key = content_digest(preview);

    if let Some(cache) = MIME_SNIFF_CACHE.as_ref()
        && let Some(cached) = cache.get_value::<String>(&key)
    {
        return Some(cached);
    }

    let sniffed = infer::get(bytes)
        .map(|kind| kind.mime_type().to_string())
        .or_else(|| {
            if std::str::from_utf8(preview).is_ok() {
                Some(PLAIN_TEXT_MIME_TYPE.to_string())
            } else {
                None
            }
        })?;

    if let Some(cache) = MIME_SNIFF_CACHE.as_ref() {
        let _ = cache.set_value(&key, &sniffed);
    }
    Some(sniffed)
}

/// Resolve the media type for a file: the caller hint wins after validation,
/// otherwise detection runs; a file with no detectable type fails.
pub fn detect_or_validate(path: Option<&Path>, mime_type: Option<&str>) -> Result<String> {
    if let Some(hint) = mime_type {
        return validate_mime_type(hint);
    }

    let path = path.ok_or_else(|| KreuzbergError::validation("A MIME type is required for byte input"))?;
    detect_mime_type(path).ok_or_else(|| {
        KreuzbergError::validation(format!("Could not determine MIME type of {}", path.display()))
    })
}
