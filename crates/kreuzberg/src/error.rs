//! Error types for Kreuzberg.
//!
//! All fallible operations return [`Result`]. IO errors convert via `#[from]`
//! and always bubble up unchanged; application errors carry a message and an
//! optional source chain.
//!
//! Propagation is context-sensitive: [`must_bubble`] classifies an error
//! against the context it occurred in (single extraction, batch item, or
//! optional pipeline stage) and decides whether it propagates or is trapped
//! into result metadata.

use thiserror::Error;

/// Result type alias using `KreuzbergError`.
pub type Result<T> = std::result::Result<T, KreuzbergError>;

/// Main error type for all Kreuzberg operations.
#[derive(Debug, Error)]
pub enum KreuzbergError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parsing error: {message}")]
    Parsing {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("OCR error: {message}")]
    Ocr {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Cache error: {message}")]
    Cache {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Image processing error: {message}")]
    ImageProcessing {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Resource error: {message}")]
    Resource {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    #[error("Plugin error in '{plugin_name}': {message}")]
    Plugin { message: String, plugin_name: String },

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for KreuzbergError {
    fn from(err: serde_json::Error) -> Self {
        KreuzbergError::Serialization {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<rmp_serde::encode::Error> for KreuzbergError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        KreuzbergError::Serialization {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<rmp_serde::decode::Error> for KreuzbergError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        KreuzbergError::Serialization {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

macro_rules! error_constructor {
    ($name:ident, $with_source:ident, $variant:ident) => {
        pub fn $name<S: Into<String>>(message: S) -> Self {
            Self::$variant {
                message: message.into(),
                source: None,
            }
        }

        pub fn $with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
            message: S,
            source: E,
        ) -> Self {
            Self::$variant {
                message: message.into(),
                source: Some(Box::new(source)),
            }
        }
    };
}

impl KreuzbergError {
    error_constructor!(parsing, parsing_with_source, Parsing);
    error_constructor!(ocr, ocr_with_source, Ocr);
    error_constructor!(validation, validation_with_source, Validation);
    error_constructor!(cache, cache_with_source, Cache);
    error_constructor!(image_processing, image_processing_with_source, ImageProcessing);
    error_constructor!(serialization, serialization_with_source, Serialization);
    error_constructor!(resource, resource_with_source, Resource);

    /// Short tag used in batch error shells and processing-error records.
    pub fn kind(&self) -> &'static str {
        match self {
            KreuzbergError::Io(_) => "Io",
            KreuzbergError::Parsing { .. } => "Parsing",
            KreuzbergError::Ocr { .. } => "Ocr",
            KreuzbergError::Validation { .. } => "Validation",
            KreuzbergError::Cache { .. } => "Cache",
            KreuzbergError::ImageProcessing { .. } => "ImageProcessing",
            KreuzbergError::Serialization { .. } => "Serialization",
            KreuzbergError::Resource { .. } => "Resource",
            KreuzbergError::MissingDependency(_) => "MissingDependency",
            KreuzbergError::Plugin { .. } => "Plugin",
            KreuzbergError::LockPoisoned(_) => "LockPoisoned",
            KreuzbergError::UnsupportedFormat(_) => "UnsupportedFormat",
            KreuzbergError::Other(_) => "Other",
        }
    }
}

/// Where an error occurred, for propagation decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallContext {
    /// A direct single-document extraction call.
    SingleExtraction,
    /// One item of a batch; siblings must still complete.
    BatchProcessing,
    /// An optional pipeline stage (chunking, entities, keywords, language
    /// detection, document type, token reduction).
    OptionalFeature,
}

/// Decide whether an error propagates or is trapped into metadata.
///
/// System errors (IO, poisoned locks) always bubble: they indicate real
/// problems the operator needs to know about. `MissingDependency` always
/// bubbles for the same reason. Validation errors bubble only for single
/// extraction; in batch context everything non-system is trapped so sibling
/// items can still succeed, and in optional stages the extracted content is
/// preserved over the stage result.
pub fn must_bubble(error: &KreuzbergError, context: CallContext) -> bool {
    if matches!(error, KreuzbergError::Io(_) | KreuzbergError::LockPoisoned(_)) {
        return true;
    }

    if matches!(error, KreuzbergError::MissingDependency(_)) {
        return true;
    }

    match context {
        CallContext::BatchProcessing => false,
        CallContext::OptionalFeature => false,
        CallContext::SingleExtraction => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: KreuzbergError = io_err.into();
        assert!(matches!(err, KreuzbergError::Io(_)));
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_constructor_helpers() {
        assert_eq!(
            KreuzbergError::parsing("invalid format").to_string(),
            "Parsing error: invalid format"
        );
        assert_eq!(KreuzbergError::ocr("engine failed").to_string(), "OCR error: engine failed");
        assert_eq!(
            KreuzbergError::validation("bad input").to_string(),
            "Validation error: bad input"
        );
        assert_eq!(
            KreuzbergError::resource("no workers").to_string(),
            "Resource error: no workers"
        );
    }

    #[test]
    fn test_source_chain_preserved() {
        let source = std::io::Error::new(std::io::ErrorKind::InvalidData, "bad data");
        let err = KreuzbergError::parsing_with_source("invalid format", source);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_kind_tags() {
        assert_eq!(KreuzbergError::validation("x").kind(), "Validation");
        assert_eq!(KreuzbergError::MissingDependency("tesseract".into()).kind(), "MissingDependency");
    }

    #[test]
    fn test_io_always_bubbles() {
        let err = KreuzbergError::Io(std::io::Error::other("disk"));
        assert!(must_bubble(&err, CallContext::SingleExtraction));
        assert!(must_bubble(&err, CallContext::BatchProcessing));
        assert!(must_bubble(&err, CallContext::OptionalFeature));
    }

    #[test]
    fn test_missing_dependency_always_bubbles() {
        let err = KreuzbergError::MissingDependency("tesseract".into());
        assert!(must_bubble(&err, CallContext::BatchProcessing));
        assert!(must_bubble(&err, CallContext::OptionalFeature));
    }

    #[test]
    fn test_validation_context_sensitivity() {
        let err = KreuzbergError::validation("bad mime");
        assert!(must_bubble(&err, CallContext::SingleExtraction));
        assert!(!must_bubble(&err, CallContext::BatchProcessing));
        assert!(!must_bubble(&err, CallContext::OptionalFeature));
    }

    #[test]
    fn test_ocr_error_trapped_in_optional_stage() {
        let err = KreuzbergError::ocr("garbled page");
        assert!(must_bubble(&err, CallContext::SingleExtraction));
        assert!(!must_bubble(&err, CallContext::OptionalFeature));
    }
}
