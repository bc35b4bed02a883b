use std::fmt;

/// OCR-specific failure kinds.
///
/// These convert into the crate error taxonomy at the subsystem boundary:
/// version and installation problems become `MissingDependency`, bad caller
/// input becomes `Validation`, everything else becomes `Ocr`.
#[derive(Debug, Clone)]
pub enum OcrError {
    MissingBinary(String),
    UnsupportedVersion(String),
    InvalidConfiguration(String),
    InvalidLanguage(String),
    ImageProcessing(String),
    /// Non-zero exit; carries captured stderr.
    Failed(String),
    /// The subprocess died on a signal.
    Signal(String),
    /// The subprocess exceeded its deadline and was killed.
    Timeout(u64),
    Cache(String),
    Io(String),
}

impl fmt::Display for OcrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingBinary(msg) => write!(f, "Tesseract is not available: {}", msg),
            Self::UnsupportedVersion(msg) => write!(f, "Unsupported Tesseract version: {}", msg),
            Self::InvalidConfiguration(msg) => write!(f, "Invalid OCR configuration: {}", msg),
            Self::InvalidLanguage(msg) => write!(f, "Invalid language code: {}", msg),
            Self::ImageProcessing(msg) => write!(f, "Image processing failed: {}", msg),
            Self::Failed(stderr) => write!(f, "OCR failed with a non-zero return code: {}", stderr),
            Self::Signal(name) => write!(f, "OCR subprocess terminated by signal {}", name),
            Self::Timeout(secs) => write!(f, "OCR timed out after {} seconds", secs),
            Self::Cache(msg) => write!(f, "OCR cache error: {}", msg),
            Self::Io(msg) => write!(f, "OCR I/O error: {}", msg),
        }
    }
}

impl std::error::Error for OcrError {}

impl From<OcrError> for crate::KreuzbergError {
    fn from(err: OcrError) -> Self {
        match &err {
            OcrError::MissingBinary(_) | OcrError::UnsupportedVersion(_) => {
                crate::KreuzbergError::MissingDependency(err.to_string())
            }
            OcrError::InvalidConfiguration(_) | OcrError::InvalidLanguage(_) => {
                crate::KreuzbergError::validation_with_source(err.to_string(), err.clone())
            }
            _ => crate::KreuzbergError::ocr_with_source(err.to_string(), err.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KreuzbergError;

    #[test]
    fn test_version_error_maps_to_missing_dependency() {
        let err: KreuzbergError = OcrError::UnsupportedVersion("found 4".to_string()).into();
        assert!(matches!(err, KreuzbergError::MissingDependency(_)));
    }

    #[test]
    fn test_language_error_maps_to_validation() {
        let err: KreuzbergError = OcrError::InvalidLanguage("xyz".to_string()).into();
        assert!(matches!(err, KreuzbergError::Validation { .. }));
    }

    #[test]
    fn test_timeout_maps_to_ocr() {
        let err: KreuzbergError = OcrError::Timeout(120).into();
        assert!(matches!(err, KreuzbergError::Ocr { .. }));
        assert!(err.to_string().contains("120 seconds"));
    }
}
