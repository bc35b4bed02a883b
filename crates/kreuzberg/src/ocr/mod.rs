//! OCR subsystem.
//!
//! The Tesseract backend drives the system `tesseract` binary as a
//! subprocess; EasyOCR and PaddleOCR are declared backends that surface a
//! missing-dependency error until an external runtime is plugged in.
//! [`OcrProcessor`] fronts every backend with a content-addressed result
//! cache under single-flight coordination.

pub mod backends;
pub mod error;
pub mod preprocess;
pub mod processor;
pub mod table;
pub mod tesseract;
pub mod types;
pub mod validation;

pub use error::OcrError;
pub use processor::{OcrProcessor, ocr_extracted_images};
pub use tesseract::TesseractBackend;
pub use types::{OutputFormat, PsmMode, TesseractConfig};
pub use validation::validate_language_code;
