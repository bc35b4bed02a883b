//! Plugin registration and lookup.

use crate::plugins::{DocumentExtractor, OcrBackend};
use crate::{KreuzbergError, Result};
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

fn validate_plugin_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(KreuzbergError::validation("Plugin name cannot be empty"));
    }
    if name.contains(char::is_whitespace) {
        return Err(KreuzbergError::validation(format!(
            "Plugin name '{}' cannot contain whitespace",
            name
        )));
    }
    Ok(())
}

/// Media-type → extractor dispatch table.
///
/// Exact entries resolve in O(1); `"image/*"`-style entries match by prefix.
/// When several extractors claim a type the highest priority wins.
#[derive(Default)]
pub struct ExtractorRegistry {
    extractors: HashMap<String, BTreeMap<i32, Arc<dyn DocumentExtractor>>>,
    names: Vec<String>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, extractor: Arc<dyn DocumentExtractor>) -> Result<()> {
        let name = extractor.name().to_string();
        validate_plugin_name(&name)?;
        extractor.initialize()?;

        let priority = extractor.priority();
        for mime_type in extractor.supported_mime_types() {
            self.extractors
                .entry((*mime_type).to_string())
                .or_default()
                .insert(priority, Arc::clone(&extractor));
        }
        if !self.names.contains(&name) {
            self.names.push(name);
        }
        Ok(())
    }

    /// Resolve the best extractor for a media type, if any.
    pub fn get(&self, mime_type: &str) -> Option<Arc<dyn DocumentExtractor>> {
        if let Some(by_priority) = self.extractors.get(mime_type)
            && let Some((_, extractor)) = by_priority.iter().next_back()
        {
            return Some(Arc::clone(extractor));
        }

        let mut best: Option<(i32, Arc<dyn DocumentExtractor>)> = None;
        for (registered, by_priority) in &self.extractors {
            if let Some(prefix) = registered.strip_suffix("/*")
                && mime_type.starts_with(prefix)
                && mime_type.as_bytes().get(prefix.len()) == Some(&b'/')
                && let Some((_, extractor)) = by_priority.iter().next_back()
            {
                let priority = extractor.priority();
                if best.as_ref().is_none_or(|(current, _)| priority > *current) {
                    best = Some((priority, Arc::clone(extractor)));
                }
            }
        }

        best.map(|(_, extractor)| extractor)
    }

    pub fn list(&self) -> Vec<String> {
        self.names.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    pub fn clear(&mut self) {
        self.extractors.clear();
        self.names.clear();
    }
}

/// Name → OCR backend table.
#[derive(Default)]
pub struct OcrBackendRegistry {
    backends: HashMap<String, Arc<dyn OcrBackend>>,
}

impl OcrBackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, backend: Arc<dyn OcrBackend>) -> Result<()> {
        let name = backend.name().to_string();
        validate_plugin_name(&name)?;
        backend.initialize()?;
        self.backends.insert(name, backend);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn OcrBackend>> {
        self.backends.get(name).cloned().ok_or_else(|| KreuzbergError::Plugin {
            message: format!("OCR backend '{}' not registered", name),
            plugin_name: name.to_string(),
        })
    }

    pub fn list(&self) -> Vec<String> {
        self.backends.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

static DOCUMENT_EXTRACTOR_REGISTRY: Lazy<Arc<RwLock<ExtractorRegistry>>> =
    Lazy::new(|| Arc::new(RwLock::new(ExtractorRegistry::new())));

static OCR_BACKEND_REGISTRY: Lazy<Arc<RwLock<OcrBackendRegistry>>> =
    Lazy::new(|| Arc::new(RwLock::new(OcrBackendRegistry::new())));

pub fn get_document_extractor_registry() -> Arc<RwLock<ExtractorRegistry>> {
    Arc::clone(&DOCUMENT_EXTRACTOR_REGISTRY)
}

pub fn get_ocr_backend_registry() -> Arc<RwLock<OcrBackendRegistry>> {
    Arc::clone(&OCR_BACKEND_REGISTRY)
}
