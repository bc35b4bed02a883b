//! Built-in document extractors.
//!
//! Registration is an explicit startup step; [`ensure_initialized`] runs it
//! exactly once and is invoked on the first extraction.

pub mod image;
pub mod structured;
pub mod text;

pub use image::ImageExtractor;
pub use structured::StructuredExtractor;
pub use text::{MarkdownExtractor, PlainTextExtractor};

use crate::Result;
use crate::plugins::registry::get_document_extractor_registry;
use once_cell::sync::Lazy;
use std::sync::Arc;

static EXTRACTORS_INITIALIZED: Lazy<Result<()>> = Lazy::new(register_default_extractors);

/// Ensure the built-in extractors are registered.
///
/// Safe to call repeatedly; if the registry was cleared (tests do this),
/// built-ins re-register.
pub fn ensure_initialized() -> Result<()> {
    EXTRACTORS_INITIALIZED.as_ref().map(|_| ()).map_err(|e| crate::KreuzbergError::Plugin {
        message: format!("Failed to register default extractors: {}", e),
        plugin_name: "built-in-extractors".to_string(),
    })?;

    let registry = get_document_extractor_registry();
    let guard = registry
        .read()
        .map_err(|e| crate::KreuzbergError::LockPoisoned(format!("Document extractor registry: {}", e)))?;
    if guard.is_empty() {
        drop(guard);
        register_default_extractors()?;
    }

    Ok(())
}

/// Register every built-in extractor with the global registry.
pub fn register_default_extractors() -> Result<()> {
    let registry = get_document_extractor_registry();
    let mut registry = registry
        .write()
        .map_err(|e| crate::KreuzbergError::LockPoisoned(format!("Document extractor registry: {}", e)))?;

    registry.register(Arc::new(PlainTextExtractor::new()))?;
    registry.register(Arc::new(MarkdownExtractor::new()))?;
    registry.register(Arc::new(StructuredExtractor::new()))?;
    registry.register(Arc::new(ImageExtractor::new()))?;

    Ok(())
}
