//! Main extraction entry points.
//!
//! Single-document flow: cache probe under single-flight coordination, MIME
//! resolution, extractor dispatch (with a raw UTF-8 fallback when no
//! extractor claims the type), the PDF OCR fallback, the post-processing
//! pipeline, and cache population. Batch variants fan out with a bounded
//! concurrency ceiling and trap per-item failures into error shells so the
//! rest of the batch completes.

use crate::cache::{DocumentCache, ProcessingState, content_digest, file_fingerprint, generate_cache_key};
use crate::core::config::{ExtractionConfig, OcrBackendKind};
use crate::core::{io, mime};
use crate::error::{CallContext, KreuzbergError, Result, must_bubble};
use crate::types::{ErrorMetadata, ExtractionResult};
use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};

static DOCUMENT_CACHE: Lazy<DocumentCache> = Lazy::new(|| {
    DocumentCache::new("documents", None, 10_000, 1024.0)
        .or_else(|_| DocumentCache::new("documents", Some(std::env::temp_dir().join("kreuzberg-cache")), 10_000, 1024.0))
        .expect("failed to create a document cache directory in the cache root or temp dir")
});

/// The shared document-result cache.
pub fn document_cache() -> &'static DocumentCache {
    &DOCUMENT_CACHE
}

fn resolve_extractor(mime_type: &str) -> Result<Option<std::sync::Arc<dyn crate::plugins::DocumentExtractor>>> {
    crate::extractors::ensure_initialized()?;
    let registry = crate::plugins::registry::get_document_extractor_registry();
    let guard = registry
        .read()
        .map_err(|e| KreuzbergError::LockPoisoned(format!("Document extractor registry: {}", e)))?;
    Ok(guard.get(mime_type))
}

/// Whether a parsing failure on this input should fall back to OCR.
fn should_ocr_fallback(mime_type: &str, config: &ExtractionConfig) -> bool {
    mime_type == mime::PDF_MIME_TYPE && config.ocr_backend != OcrBackendKind::None
}

async fn extract_bytes_inner(content: &[u8], mime_type: &str, config: &ExtractionConfig) -> Result<ExtractionResult> {
    if mime_type == mime::PDF_MIME_TYPE
        && config.force_ocr
        && let Some(ocr_config) = config.effective_ocr_config()
    {
        return crate::pdf::ocr_pdf_pages(content, &ocr_config, config).await;
    }

    let Some(extractor) = resolve_extractor(mime_type)? else {
        // No extractor claims this type: the safest result is the raw bytes
        // decoded as UTF-8.
        return Ok(ExtractionResult::new(io::safe_decode(content), mime::PLAIN_TEXT_MIME_TYPE));
    };

    match extractor.extract_bytes(content, mime_type, config).await {
        Ok(result) => Ok(result),
        Err(error @ KreuzbergError::Parsing { .. }) if should_ocr_fallback(mime_type, config) => {
            let Some(ocr_config) = config.effective_ocr_config() else {
                return Err(error);
            };
            tracing::debug!("Falling back to OCR after parsing failure: {}", error);
            crate::pdf::ocr_pdf_pages(content, &ocr_config, config).await
        }
        Err(error) => Err(error),
    }
}

async fn run_cached<F, Fut>(key: String, use_cache: bool, produce: F) -> Result<ExtractionResult>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<ExtractionResult>>,
{
    if !use_cache {
        return produce().await;
    }

    let cache = document_cache();
    loop {
        if let Some(cached) = cache.get_value::<ExtractionResult>(&key) {
            return Ok(cached);
        }

        match cache.begin_processing(&key) {
            ProcessingState::Acquired(guard) => {
                let outcome = produce().await;
                if let Ok(result) = &outcome {
                    if let Err(e) = cache.set_value(&key, result) {
                        tracing::debug!("Failed to cache extraction result: {}", e);
                    }
                }
                drop(guard);
                return outcome;
            }
            ProcessingState::AlreadyProcessing(event) => {
                event.wait().await;
            }
        }
    }
}

/// Extract content from a byte buffer.
pub async fn extract_bytes(content: &[u8], mime_type: &str, config: &ExtractionConfig) -> Result<ExtractionResult> {
    config.validate()?;
    let validated_mime = mime::validate_mime_type(mime_type)?;

    let digest = content_digest(content);
    let config_hash = config.content_hash();
    let key = generate_cache_key(&[
        ("sha256", digest.as_str()),
        ("mime", validated_mime.as_str()),
        ("config", config_hash.as_str()),
    ]);

    let mime_ref: &str = &validated_mime;
    run_cached(key, config.use_cache, move || async move {
        let result = extract_bytes_inner(content, mime_ref, config).await?;
        crate::core::pipeline::run_pipeline(result, config, None).await
    })
    .await
}

/// Extract content from a file.
pub async fn extract_file(
    path: impl AsRef<Path>,
    mime_type: Option<&str>,
    config: &ExtractionConfig,
) -> Result<ExtractionResult> {
    config.validate()?;
    let path = path.as_ref();
    io::validate_file_exists(path)?;
    let detected_mime = mime::detect_or_validate(Some(path), mime_type)?;

    let (resolved, size, mtime) = file_fingerprint(path)?;
    let config_hash = config.content_hash();
    let key = generate_cache_key(&[
        ("path", resolved.as_str()),
        ("size", size.to_string().as_str()),
        ("mtime", mtime.to_string().as_str()),
        ("config", config_hash.as_str()),
    ]);

    let mime_ref: &str = &detected_mime;
    run_cached(key, config.use_cache, move || async move {
        let result = extract_file_inner(path, mime_ref, config).await?;
        crate::core::pipeline::run_pipeline(result, config, Some(path)).await
    })
    .await
}

async fn extract_file_inner(path: &Path, mime_type: &str, config: &ExtractionConfig) -> Result<ExtractionResult> {
    if mime_type == mime::PDF_MIME_TYPE
        && config.force_ocr
        && let Some(ocr_config) = config.effective_ocr_config()
    {
        let bytes = io::read_file_async(path).await?;
        return crate::pdf::ocr_pdf_pages(&bytes, &ocr_config, config).await;
    }

    let Some(extractor) = resolve_extractor(mime_type)? else {
        let bytes = io::read_file_async(path).await?;
        return Ok(ExtractionResult::new(io::safe_decode(&bytes), mime::PLAIN_TEXT_MIME_TYPE));
    };

    match extractor.extract_path(path, mime_type, config).await {
        Ok(result) => Ok(result),
        Err(error @ KreuzbergError::Parsing { .. }) if should_ocr_fallback(mime_type, config) => {
            let Some(ocr_config) = config.effective_ocr_config() else {
                return Err(error);
            };
            tracing::debug!("Falling back to OCR after parsing failure: {}", error);
            let bytes = io::read_file_async(path).await?;
            crate::pdf::ocr_pdf_pages(&bytes, &ocr_config, config).await
        }
        Err(error) => Err(error),
    }
}

fn batch_error_shell(error: &KreuzbergError, operation: &str, index: usize, input: serde_json::Value) -> ExtractionResult {
    let mut shell = ExtractionResult::new(format!("Error: {}", error), mime::PLAIN_TEXT_MIME_TYPE);
    shell.metadata.error = Some(ErrorMetadata {
        error_type: error.kind().to_string(),
        message: error.to_string(),
    });
    shell.metadata.error_context = Some(serde_json::json!({
        "operation": operation,
        "index": index,
        "input": input,
        "error_type": error.kind(),
        "message": error.to_string(),
    }));
    shell
}

fn batch_concurrency(len: usize, config: &ExtractionConfig) -> usize {
    let ceiling = config.max_concurrent_extractions.unwrap_or_else(|| num_cpus::get() * 2);
    len.min(ceiling).max(1)
}

/// Extract multiple files concurrently.
///
/// Output order matches input order. Item failures become error shells with
/// `metadata.error` and `metadata.error_context`; only system-critical
/// errors fail the whole batch.
pub async fn batch_extract_file(paths: Vec<impl AsRef<Path>>, config: &ExtractionConfig) -> Result<Vec<ExtractionResult>> {
    use std::sync::Arc;
    use tokio::sync::Semaphore;
    use tokio::task::JoinSet;

    if paths.is_empty() {
        return Ok(Vec::new());
    }

    config.validate()?;
    let config = Arc::new(config.clone());
    let semaphore = Arc::new(Semaphore::new(batch_concurrency(paths.len(), &config)));
    let mut tasks = JoinSet::new();

    for (index, path) in paths.into_iter().enumerate() {
        let path: PathBuf = path.as_ref().to_path_buf();
        let config = Arc::clone(&config);
        let semaphore = Arc::clone(&semaphore);

        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            let result = extract_file(&path, None, &config).await;
            (index, path, result)
        });
    }

    let mut results: Vec<Option<ExtractionResult>> = (0..tasks.len()).map(|_| None).collect();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, _path, Ok(result))) => {
                results[index] = Some(result);
            }
            Ok((index, path, Err(error))) => {
                if must_bubble(&error, CallContext::BatchProcessing) {
                    return Err(error);
                }
                results[index] = Some(batch_error_shell(
                    &error,
                    "batch_extract_file",
                    index,
                    serde_json::json!({ "path": path.display().to_string() }),
                ));
            }
            Err(join_error) => {
                return Err(KreuzbergError::Other(format!("Batch task panicked: {}", join_error)));
            }
        }
    }

    Ok(results
        .into_iter()
        .map(|slot| slot.expect("every index is filled exactly once"))
        .collect())
}

/// Extract multiple byte buffers concurrently.
pub async fn batch_extract_bytes(
    contents: Vec<(&[u8], &str)>,
    config: &ExtractionConfig,
) -> Result<Vec<ExtractionResult>> {
    use std::sync::Arc;
    use tokio::sync::Semaphore;
    use tokio::task::JoinSet;

    if contents.is_empty() {
        return Ok(Vec::new());
    }

    config.validate()?;
    let config = Arc::new(config.clone());
    let semaphore = Arc::new(Semaphore::new(batch_concurrency(contents.len(), &config)));

    let owned: Vec<(Vec<u8>, String)> = contents
        .into_iter()
        .map(|(bytes, mime_type)| (bytes.to_vec(), mime_type.to_string()))
        .collect();

    let mut tasks = JoinSet::new();
    for (index, (bytes, mime_type)) in owned.into_iter().enumerate() {
        let config = Arc::clone(&config);
        let semaphore = Arc::clone(&semaphore);

        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            let result = extract_bytes(&bytes, &mime_type, &config).await;
            (index, mime_type, result)
        });
    }

    let mut results: Vec<Option<ExtractionResult>> = (0..tasks.len()).map(|_| None).collect();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, _mime_type, Ok(result))) => {
                results[index] = Some(result);
            }
            Ok((index, mime_type, Err(error))) => {
                if must_bubble(&error, CallContext::BatchProcessing) {
                    return Err(error);
                }
                results[index] = Some(batch_error_shell(
                    &error,
                    "batch_extract_bytes",
                    index,
                    serde_json::json!({ "mime_type": mime_type }),
                ));
            }
            Err(join_error) => {
                return Err(KreuzbergError::Other(format!("Batch task panicked: {}", join_error)));
            }
        }
    }

    Ok(results
        .into_iter()
        .map(|slot| slot.expect("every index is filled exactly once"))
        .collect())
}

/// Synchronous wrapper for [`extract_file`].
pub fn extract_file_sync(
    path: impl AsRef<Path>,
    mime_type: Option<&str>,
    config: &ExtractionConfig,
) -> Result<ExtractionResult> {
    crate::runtime::block_on(extract_file(path, mime_type, config))
}

/// Synchronous wrapper for [`extract_bytes`].
pub fn extract_bytes_sync(content: &[u8], mime_type: &str, config: &ExtractionConfig) -> Result<ExtractionResult> {
    crate::runtime::block_on(extract_bytes(content, mime_type, config))
}

/// Synchronous wrapper for [`batch_extract_file`].
pub fn batch_extract_file_sync(paths: Vec<impl AsRef<Path>>, config: &ExtractionConfig) -> Result<Vec<ExtractionResult>> {
    crate::runtime::block_on(batch_extract_file(paths, config))
}

/// Synchronous wrapper for [`batch_extract_bytes`].
pub fn batch_extract_bytes_sync(contents: Vec<(&[u8], &str)>, config: &ExtractionConfig) -> Result<Vec<ExtractionResult>> {
    crate::runtime::block_on(batch_extract_bytes(contents, config))
}
