//! OCR orchestration: backend resolution, the per-image/per-file result
//! cache with single-flight coordination, batch scheduling, and the
//! extracted-image OCR pipeline.

use super::backends::{EasyOcrBackend, PaddleOcrBackend};
use super::preprocess::normalize_image_dpi;
use super::tesseract::TesseractBackend;
use crate::cache::{DocumentCache, ProcessingState, content_digest, file_fingerprint, generate_cache_key};
use crate::core::config::{ExtractionConfig, OcrBackendKind, OcrConfig};
use crate::error::Result;
use crate::plugins::OcrBackend;
use crate::plugins::registry::get_ocr_backend_registry;
use crate::pool::get_process_pool;
use crate::types::{ExtractionResult, ImageOcrResult};
use crate::{KreuzbergError, types::ExtractedImage};
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Batches at or below this size run as concurrent tasks in-process;
/// anything larger goes through the shared worker pool.
const SMALL_BATCH_THRESHOLD: usize = 3;
/// Estimated per-invocation memory footprint of a Tesseract subprocess.
const OCR_TASK_MEMORY_MB: f64 = 200.0;
/// Per-image byte ceiling for the extracted-image pipeline.
const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024;

static REGISTER_DEFAULT_BACKENDS: Lazy<()> = Lazy::new(|| {
    let registry = get_ocr_backend_registry();
    if let Ok(mut registry) = registry.write() {
        if registry.is_empty() {
            let _ = registry.register(Arc::new(TesseractBackend::new()));
            let _ = registry.register(Arc::new(EasyOcrBackend::new()));
            let _ = registry.register(Arc::new(PaddleOcrBackend::new()));
        }
    }
});

fn resolve_backend(config: &OcrConfig) -> Result<Arc<dyn OcrBackend>> {
    Lazy::force(&REGISTER_DEFAULT_BACKENDS);
    let registry = get_ocr_backend_registry();
    let guard = registry
        .read()
        .map_err(|e| KreuzbergError::LockPoisoned(format!("OCR backend registry: {}", e)))?;
    guard.get(config.backend_name())
}

pub struct OcrProcessor {
    cache: DocumentCache,
}

static GLOBAL_OCR_PROCESSOR: Lazy<OcrProcessor> = Lazy::new(|| {
    OcrProcessor::new(None)
        .or_else(|_| OcrProcessor::new(Some(std::env::temp_dir().join("kreuzberg-cache"))))
        .expect("failed to create an OCR cache directory in the cache root or temp dir")
});

impl OcrProcessor {
    pub fn new(cache_root: Option<PathBuf>) -> Result<Self> {
        Ok(Self {
            cache: DocumentCache::new("ocr", cache_root, 10_000, 512.0)?,
        })
    }

    /// Process-wide instance sharing one OCR cache.
    pub fn global() -> &'static OcrProcessor {
        &GLOBAL_OCR_PROCESSOR
    }

    /// OCR an in-memory image, normalizing DPI first.
    pub async fn process_image(
        &self,
        image: &[u8],
        config: &OcrConfig,
        extraction: &ExtractionConfig,
    ) -> Result<ExtractionResult> {
        let preprocessed = normalize_image_dpi(image, &extraction.dpi)?;

        let image_hash = content_digest(&preprocessed.data);
        let config_hash = config.config_hash();
        let key = generate_cache_key(&[
            ("image_hash", image_hash.as_str()),
            ("backend", config.backend_name()),
            ("config", config_hash.as_str()),
        ]);

        let mut result = self
            .run_single_flight(&key, config.use_cache(), || {
                let backend_config = config.clone();
                let bytes = preprocessed.data.clone();
                async move {
                    let backend = resolve_backend(&backend_config)?;
                    backend.process_image(&bytes, &backend_config).await
                }
            })
            .await?;

        result.metadata.image_preprocessing = Some(preprocessed.metadata);
        Ok(result)
    }

    /// OCR a file on disk, keyed by `(path, size, mtime)`.
    pub async fn process_file(
        &self,
        path: &Path,
        config: &OcrConfig,
    ) -> Result<ExtractionResult> {
        let (resolved, size, mtime) = file_fingerprint(path)?;
        let config_hash = config.config_hash();
        let key = generate_cache_key(&[
            ("path", resolved.as_str()),
            ("size", size.to_string().as_str()),
            ("mtime", mtime.to_string().as_str()),
            ("backend", config.backend_name()),
            ("config", config_hash.as_str()),
        ]);

        let path = path.to_path_buf();
        self.run_single_flight(&key, config.use_cache(), || {
            let backend_config = config.clone();
            let path = path.clone();
            async move {
                let backend = resolve_backend(&backend_config)?;
                backend.process_file(&path, &backend_config).await
            }
        })
        .await
    }

    pub fn process_image_sync(
        &self,
        image: &[u8],
        config: &OcrConfig,
        extraction: &ExtractionConfig,
    ) -> Result<ExtractionResult> {
        crate::runtime::block_on(self.process_image(image, config, extraction))
    }

    pub fn process_file_sync(&self, path: &Path, config: &OcrConfig) -> Result<ExtractionResult> {
        crate::runtime::block_on(self.process_file(path, config))
    }

    /// Probe the cache, or produce under the single-flight guard.
    ///
    /// Followers that observe an in-flight producer await its completion
    /// event and re-read; if the producer crashed without publishing, the
    /// follower retries as a fresh producer.
    async fn run_single_flight<F, Fut>(&self, key: &str, use_cache: bool, produce: F) -> Result<ExtractionResult>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<ExtractionResult>>,
    {
        if !use_cache {
            return produce().await;
        }

        loop {
            if let Some(cached) = self.cache.get_value::<ExtractionResult>(key) {
                return Ok(cached);
            }

            match self.cache.begin_processing(key) {
                ProcessingState::Acquired(guard) => {
                    let outcome = produce().await;
                    if let Ok(result) = &outcome {
                        if let Err(e) = self.cache.set_value(key, result) {
                            tracing::debug!("Failed to store OCR result in cache: {}", e);
                        }
                    }
                    // Completion fires on guard drop, success or error.
                    drop(guard);
                    return outcome;
                }
                ProcessingState::AlreadyProcessing(event) => {
                    event.wait().await;
                }
            }
        }
    }

    /// OCR a set of files.
    ///
    /// Small batches run as concurrent in-process tasks to avoid pool
    /// warm-up; larger batches amortize worker reuse through the shared
    /// pool. Output order matches input order.
    pub async fn process_batch(&'static self, paths: Vec<PathBuf>, config: &OcrConfig) -> Vec<Result<ExtractionResult>> {
        if paths.is_empty() {
            return Vec::new();
        }

        if paths.len() <= SMALL_BATCH_THRESHOLD {
            let mut tasks = tokio::task::JoinSet::new();
            for (index, path) in paths.into_iter().enumerate() {
                let config = config.clone();
                tasks.spawn(async move { (index, self.process_file(&path, &config).await) });
            }

            let mut results: Vec<Option<Result<ExtractionResult>>> = (0..tasks.len()).map(|_| None).collect();
            while let Some(joined) = tasks.join_next().await {
                if let Ok((index, result)) = joined {
                    results[index] = Some(result);
                }
            }
            return results
                .into_iter()
                .map(|slot| slot.unwrap_or_else(|| Err(KreuzbergError::ocr("OCR batch task vanished"))))
                .collect();
        }

        let config = config.clone();
        get_process_pool()
            .submit_batch(
                move |path: PathBuf| OcrProcessor::global().process_file_sync(&path, &config),
                paths,
                OCR_TASK_MEMORY_MB,
                None,
            )
            .await
    }

    pub fn process_batch_sync(&'static self, paths: Vec<PathBuf>, config: &OcrConfig) -> Vec<Result<ExtractionResult>> {
        crate::runtime::block_on(self.process_batch(paths, config))
    }

    pub fn clear_cache(&self) -> Result<(usize, f64)> {
        self.cache.clear()
    }
}

fn skipped(image: &ExtractedImage, reason: impl Into<String>) -> ImageOcrResult {
    ImageOcrResult {
        image: image.clone(),
        ocr_result: Box::new(ExtractionResult::new("", "text/plain")),
        confidence_score: None,
        processing_time: None,
        skipped_reason: Some(reason.into()),
    }
}

/// Run OCR over images extracted from a document.
///
/// Filters by format, dimensions, and a per-image memory ceiling; optionally
/// deduplicates by content digest; every input image yields exactly one
/// [`ImageOcrResult`], skipped entries carrying the reason.
pub async fn ocr_extracted_images(images: &[ExtractedImage], config: &ExtractionConfig) -> Vec<ImageOcrResult> {
    let image_config = &config.images;
    let ocr_config = match image_config.image_ocr_backend {
        OcrBackendKind::None => {
            return images.iter().map(|i| skipped(i, "image OCR backend is 'none'")).collect();
        }
        kind if kind == config.ocr_backend && config.ocr_config.is_some() => {
            config.ocr_config.clone().expect("presence checked above")
        }
        kind => ExtractionConfig {
            ocr_backend: kind,
            ocr_config: None,
            ..config.clone()
        }
        .effective_ocr_config()
        .expect("a non-none backend always yields a config"),
    };

    let mut seen_digests: HashSet<String> = HashSet::new();
    let mut results = Vec::with_capacity(images.len());

    for image in images {
        if image.data.len() > MAX_IMAGE_BYTES {
            results.push(skipped(image, format!("image exceeds {} byte ceiling", MAX_IMAGE_BYTES)));
            continue;
        }

        let format = image.format.to_lowercase();
        if !image_config.allowed_formats.contains(&format) {
            results.push(skipped(image, format!("format '{}' not in image_ocr_formats", format)));
            continue;
        }

        if let Some((width, height)) = image.dimensions {
            let (min_w, min_h) = image_config.min_dimensions;
            let (max_w, max_h) = image_config.max_dimensions;
            if width < min_w || height < min_h {
                results.push(skipped(image, "image below minimum dimensions"));
                continue;
            }
            if width > max_w || height > max_h {
                results.push(skipped(image, "image above maximum dimensions"));
                continue;
            }
        }

        if image_config.deduplicate_images {
            let digest = content_digest(&image.data);
            if !seen_digests.insert(digest) {
                results.push(skipped(image, "duplicate image"));
                continue;
            }
        }

        let started = Instant::now();
        match OcrProcessor::global().process_image(&image.data, &ocr_config, config).await {
            Ok(ocr_result) => {
                results.push(ImageOcrResult {
                    image: image.clone(),
                    ocr_result: Box::new(ocr_result),
                    confidence_score: None,
                    processing_time: Some(started.elapsed().as_secs_f64()),
                    skipped_reason: None,
                });
            }
            Err(e) => {
                results.push(skipped(image, format!("OCR failed: {}", e)));
            }
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::types::TesseractConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_processor() -> (tempfile::TempDir, OcrProcessor) {
        let dir = tempfile::tempdir().unwrap();
        let processor = OcrProcessor::new(Some(dir.path().to_path_buf())).unwrap();
        (dir, processor)
    }

    #[tokio::test]
    async fn test_single_flight_producer_runs_once() {
        let (_dir, processor) = test_processor();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let result = processor
                .run_single_flight("key", true, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok(ExtractionResult::new("produced", "text/plain")) }
                })
                .await
                .unwrap();
            assert_eq!(result.content, "produced");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1, "second and third calls must hit the cache");
    }

    #[tokio::test]
    async fn test_single_flight_error_not_cached() {
        let (_dir, processor) = test_processor();
        let calls = AtomicUsize::new(0);

        let first = processor
            .run_single_flight("key", true, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(KreuzbergError::ocr("boom")) }
            })
            .await;
        assert!(first.is_err());

        let second = processor
            .run_single_flight("key", true, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(ExtractionResult::new("recovered", "text/plain")) }
            })
            .await
            .unwrap();
        assert_eq!(second.content, "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cache_disabled_runs_every_time() {
        let (_dir, processor) = test_processor();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            processor
                .run_single_flight("key", false, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok(ExtractionResult::new("fresh", "text/plain")) }
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_process_file_missing_path_is_error() {
        let (_dir, processor) = test_processor();
        let config = OcrConfig::Tesseract(TesseractConfig::default());
        let result = processor.process_file(Path::new("/nonexistent/image.png"), &config).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_extracted_image_filters() {
        let config = ExtractionConfig {
            images: crate::core::config::ImageExtractionConfig {
                extract_images: true,
                ocr_extracted_images: true,
                min_dimensions: (50, 50),
                ..Default::default()
            },
            ..Default::default()
        };

        let images = vec![
            ExtractedImage {
                data: vec![1, 2, 3],
                format: "svg".to_string(),
                filename: None,
                page_number: None,
                dimensions: None,
                description: None,
            },
            ExtractedImage {
                data: vec![4, 5, 6],
                format: "png".to_string(),
                filename: None,
                page_number: None,
                dimensions: Some((10, 10)),
                description: None,
            },
        ];

        let results = ocr_extracted_images(&images, &config).await;
        assert_eq!(results.len(), 2);
        assert!(results[0].skipped_reason.as_ref().unwrap().contains("svg"));
        assert!(results[1].skipped_reason.as_ref().unwrap().contains("minimum dimensions"));
    }

    #[tokio::test]
    async fn test_extracted_image_dedup() {
        let config = ExtractionConfig {
            images: crate::core::config::ImageExtractionConfig {
                extract_images: true,
                ocr_extracted_images: true,
                deduplicate_images: true,
                // Dimensions unknown: filters pass, OCR itself will fail on
                // the bogus payload, which is fine for this test.
                ..Default::default()
            },
            ..Default::default()
        };

        let duplicate = ExtractedImage {
            data: vec![9, 9, 9],
            format: "png".to_string(),
            filename: None,
            page_number: None,
            dimensions: None,
            description: None,
        };
        let images = vec![duplicate.clone(), duplicate];

        let results = ocr_extracted_images(&images, &config).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].skipped_reason.as_deref(), Some("duplicate image"));
    }
}
