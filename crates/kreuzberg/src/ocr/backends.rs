//! Optional OCR backends modeled as capabilities.
//!
//! EasyOCR and PaddleOCR are Python runtimes this crate does not embed. Each
//! backend constructs as `Unavailable` with a reason; invoking one surfaces a
//! `MissingDependency` so a misconfigured environment fails loudly instead of
//! silently degrading.

use crate::Result;
use crate::core::config::OcrConfig;
use crate::error::KreuzbergError;
use crate::plugins::{OcrBackend, Plugin};
use crate::types::ExtractionResult;
use async_trait::async_trait;
use std::path::Path;

/// Availability of an optional collaborator.
pub enum Capability<T> {
    Available(T),
    Unavailable { reason: String },
}

impl<T> Capability<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Capability::Available(_))
    }
}

macro_rules! unavailable_backend {
    ($name:ident, $plugin_name:literal, $reason:literal) => {
        pub struct $name {
            capability: Capability<()>,
        }

        impl $name {
            pub fn new() -> Self {
                Self {
                    capability: Capability::Unavailable {
                        reason: $reason.to_string(),
                    },
                }
            }

            fn unavailable_error(&self) -> KreuzbergError {
                match &self.capability {
                    Capability::Available(_) => unreachable!("no in-process runtime exists for this backend"),
                    Capability::Unavailable { reason } => {
                        KreuzbergError::MissingDependency(format!("{}: {}", $plugin_name, reason))
                    }
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Plugin for $name {
            fn name(&self) -> &str {
                $plugin_name
            }
        }

        #[async_trait]
        impl OcrBackend for $name {
            async fn process_image(&self, _image: &[u8], _config: &OcrConfig) -> Result<ExtractionResult> {
                Err(self.unavailable_error())
            }

            async fn process_file(&self, _path: &Path, _config: &OcrConfig) -> Result<ExtractionResult> {
                Err(self.unavailable_error())
            }
        }
    };
}

unavailable_backend!(
    EasyOcrBackend,
    "easyocr",
    "the EasyOCR runtime is not bundled; install and expose it as a custom OcrBackend plugin"
);

unavailable_backend!(
    PaddleOcrBackend,
    "paddleocr",
    "the PaddleOCR runtime is not bundled; install and expose it as a custom OcrBackend plugin"
);
