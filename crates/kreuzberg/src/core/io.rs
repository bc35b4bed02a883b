//! File IO helpers shared by the orchestrator and extractors.

use crate::error::{KreuzbergError, Result};
use std::path::Path;

/// Fail with a validation error when the path is not an existing file.
pub fn validate_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(KreuzbergError::validation(format!(
            "The file does not exist: {}",
            path.display()
        )));
    }
    if !path.is_file() {
        return Err(KreuzbergError::validation(format!(
            "The path is not a regular file: {}",
            path.display()
        )));
    }
    Ok(())
}

pub async fn read_file_async(path: &Path) -> Result<Vec<u8>> {
    Ok(tokio::fs::read(path).await?)
}

/// Decode bytes as UTF-8, replacing invalid sequences, and strip a BOM.
pub fn safe_decode(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.strip_prefix('\u{FEFF}').map(str::to_string).unwrap_or_else(|| text.into_owned())
}
