//! Post-processing pipeline: validators, guarded feature stages, hooks.
//!
//! Validators fail fast. Feature stages run in declared order inside a
//! guarded invocation: a failing stage yields its default value and appends
//! a record to `metadata.processing_errors`, unless [`must_bubble`]
//! classifies the error as fatal. Hooks are error-isolated individually; a
//! failing hook leaves the pre-hook result in place.

use crate::core::config::ExtractionConfig;
use crate::error::{CallContext, KreuzbergError, Result, must_bubble};
use crate::text::token_reduction::{ReductionMode, get_reduction_stats, reduce_tokens};
use crate::types::{ExtractionResult, ProcessingError};
use std::path::Path;

fn record_stage_failure(result: &mut ExtractionResult, feature: &str, error: &KreuzbergError) {
    tracing::debug!("Optional stage '{}' failed: {}", feature, error);
    result.metadata.processing_errors.push(ProcessingError {
        feature: feature.to_string(),
        error_type: error.kind().to_string(),
        error_message: error.to_string(),
    });
}

/// Run a stage under the optional-feature trap.
///
/// Returns `Ok(None)` when the stage failed recoverably (the default applies),
/// `Ok(Some(v))` on success, `Err` when the failure must propagate.
fn guarded<T>(
    result: &mut ExtractionResult,
    feature: &str,
    outcome: Result<T>,
) -> Result<Option<T>> {
    match outcome {
        Ok(value) => Ok(Some(value)),
        Err(error) => {
            if must_bubble(&error, CallContext::OptionalFeature) {
                return Err(error);
            }
            record_stage_failure(result, feature, &error);
            Ok(None)
        }
    }
}

/// Run the full post-processing pipeline over a freshly extracted result.
pub async fn run_pipeline(
    mut result: ExtractionResult,
    config: &ExtractionConfig,
    file_path: Option<&Path>,
) -> Result<ExtractionResult> {
    // Validators are fail-fast, in declared order.
    for validator in &config.validators {
        validator.validate(&result, config).await?;
    }

    if config.chunk_content {
        let outcome = crate::chunking::chunk_content(&result.content, &result.mime_type, config.max_chars, config.max_overlap);
        let chunks = guarded(&mut result, "chunking", outcome)?;
        result.chunks = chunks.unwrap_or_default();
    }

    if config.extract_entities {
        let outcome = crate::entities::extract_entities(&result.content, config.custom_entity_patterns.as_deref());
        let entities = guarded(&mut result, "entity_extraction", outcome)?;
        result.entities = entities;
    }

    if config.extract_keywords {
        let outcome = crate::keywords::extract_keywords(&result.content, config.keyword_count, None);
        let keywords = guarded(&mut result, "keyword_extraction", outcome)?;
        result.keywords = keywords;
    }

    if config.auto_detect_language {
        let outcome = crate::language_detection::detect_languages(&result.content, &config.language_detection);
        let detected = guarded(&mut result, "language_detection", outcome)?;
        result.detected_languages = match detected {
            Some(Some(languages)) => Some(languages),
            // No confident detection, or a trapped failure: an empty list.
            Some(None) | None => Some(Vec::new()),
        };
    }

    if config.auto_detect_document_type {
        let mut scratch = result.clone();
        let outcome = crate::classification::auto_detect_document_type(&mut scratch, config, file_path).await;
        if guarded(&mut result, "document_type_detection", outcome)?.is_some() {
            result.document_type = scratch.document_type;
            result.document_type_confidence = scratch.document_type_confidence;
        }
    }

    if let Some(reduction) = &config.token_reduction {
        if reduction.mode != ReductionMode::Off {
            let language_hint = result
                .detected_languages
                .as_ref()
                .and_then(|languages| languages.first())
                .cloned();
            let outcome = reduce_tokens(&result.content, reduction, language_hint.as_deref());
            if let Some(reduced) = guarded(&mut result, "token_reduction", outcome)? {
                result.metadata.token_reduction = Some(get_reduction_stats(&result.content, &reduced));
                result.content = reduced;
            }
        }
    }

    if config.images.extract_images && config.images.ocr_extracted_images && !result.images.is_empty() {
        let images = std::mem::take(&mut result.images);
        result.image_ocr_results = crate::ocr::ocr_extracted_images(&images, config).await;
        result.images = images;
    }

    // Hooks are isolated individually; a failing hook leaves the pre-hook
    // result in place and the pipeline continues.
    for (index, hook) in config.post_processing_hooks.iter().enumerate() {
        let snapshot = result.clone();
        match hook.process(&mut result, config).await {
            Ok(()) => {}
            Err(error) => {
                result = snapshot;
                record_stage_failure(&mut result, &format!("post_processing_hook_{}", index), &error);
            }
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::{PostProcessor, Validator};
    use async_trait::async_trait;
    use std::sync::Arc;

    fn result_with(content: &str) -> ExtractionResult {
        ExtractionResult::new(content, "text/plain")
    }

    #[tokio::test]
    async fn test_pipeline_noop_by_default() {
        let config = ExtractionConfig::default();
        let processed = run_pipeline(result_with("unchanged"), &config, None).await.unwrap();
        assert_eq!(processed.content, "unchanged");
        assert!(processed.chunks.is_empty());
        assert!(processed.metadata.processing_errors.is_empty());
    }

    #[tokio::test]
    async fn test_chunking_stage() {
        let config = ExtractionConfig {
            chunk_content: true,
            max_chars: 50,
            max_overlap: 5,
            ..Default::default()
        };
        let content = "A sentence goes here. ".repeat(20);
        let processed = run_pipeline(result_with(&content), &config, None).await.unwrap();
        assert!(processed.chunks.len() > 1);
    }

    #[tokio::test]
    async fn test_entity_stage() {
        let config = ExtractionConfig {
            extract_entities: true,
            ..Default::default()
        };
        let processed = run_pipeline(result_with("mail bob@example.org now"), &config, None).await.unwrap();
        let entities = processed.entities.unwrap();
        assert_eq!(entities[0].entity_type, "EMAIL");
    }

    #[tokio::test]
    async fn test_keyword_stage() {
        let config = ExtractionConfig {
            extract_keywords: true,
            keyword_count: 5,
            ..Default::default()
        };
        let processed = run_pipeline(
            result_with("machine learning systems process natural language data"),
            &config,
            None,
        )
        .await
        .unwrap();
        assert!(!processed.keywords.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_language_detection_stage_defaults_to_empty() {
        let config = ExtractionConfig {
            auto_detect_language: true,
            language_detection: crate::core::config::LanguageDetectionConfig {
                min_confidence: 0.999999,
                detect_multiple: false,
            },
            ..Default::default()
        };
        let processed = run_pipeline(result_with("hm"), &config, None).await.unwrap();
        assert_eq!(processed.detected_languages, Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_token_reduction_stage_records_stats() {
        let config = ExtractionConfig {
            token_reduction: Some(crate::text::token_reduction::TokenReductionConfig {
                mode: ReductionMode::Light,
                ..Default::default()
            }),
            ..Default::default()
        };
        let processed = run_pipeline(result_with("Too    many   spaces!!!"), &config, None).await.unwrap();
        assert_eq!(processed.content, "Too many spaces!");
        let stats = processed.metadata.token_reduction.unwrap();
        assert!(stats.character_reduction_ratio > 0.0);
    }

    #[tokio::test]
    async fn test_failing_stage_is_trapped() {
        // An invalid custom pattern makes entity extraction fail with a
        // Validation error, which the optional-feature context traps.
        let config = ExtractionConfig {
            extract_entities: true,
            custom_entity_patterns: Some(vec![("BAD".to_string(), "([".to_string())]),
            ..Default::default()
        };
        let processed = run_pipeline(result_with("text"), &config, None).await.unwrap();
        assert!(processed.entities.is_none());
        assert_eq!(processed.metadata.processing_errors.len(), 1);
        assert_eq!(processed.metadata.processing_errors[0].feature, "entity_extraction");
        assert_eq!(processed.metadata.processing_errors[0].error_type, "Validation");
    }

    struct RejectingValidator;

    #[async_trait]
    impl Validator for RejectingValidator {
        async fn validate(&self, _result: &ExtractionResult, _config: &ExtractionConfig) -> Result<()> {
            Err(KreuzbergError::validation("content rejected"))
        }
    }

    #[tokio::test]
    async fn test_validator_fails_fast() {
        let config = ExtractionConfig {
            validators: vec![Arc::new(RejectingValidator)],
            ..Default::default()
        };
        let outcome = run_pipeline(result_with("anything"), &config, None).await;
        assert!(matches!(outcome, Err(KreuzbergError::Validation { .. })));
    }

    struct FailingHook;

    #[async_trait]
    impl PostProcessor for FailingHook {
        async fn process(&self, result: &mut ExtractionResult, _config: &ExtractionConfig) -> Result<()> {
            result.content = "clobbered".to_string();
            Err(KreuzbergError::Other("hook exploded".to_string()))
        }
    }

    struct AppendingHook;

    #[async_trait]
    impl PostProcessor for AppendingHook {
        async fn process(&self, result: &mut ExtractionResult, _config: &ExtractionConfig) -> Result<()> {
            result.content.push_str(" +hook");
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_hook_failure_is_isolated() {
        let config = ExtractionConfig {
            post_processing_hooks: vec![Arc::new(FailingHook), Arc::new(AppendingHook)],
            ..Default::default()
        };
        let processed = run_pipeline(result_with("base"), &config, None).await.unwrap();

        // The failing hook's mutation is rolled back; the next hook still ran.
        assert_eq!(processed.content, "base +hook");
        assert_eq!(processed.metadata.processing_errors.len(), 1);
        assert!(processed.metadata.processing_errors[0].feature.starts_with("post_processing_hook_0"));
    }

    #[tokio::test]
    async fn test_post_processing_idempotence() {
        let config = ExtractionConfig {
            chunk_content: true,
            max_chars: 60,
            max_overlap: 10,
            extract_entities: true,
            extract_keywords: true,
            keyword_count: 5,
            ..Default::default()
        };
        let content = "Email carol@example.net about the machine learning report. ".repeat(5);

        let first = run_pipeline(result_with(&content), &config, None).await.unwrap();
        let second = run_pipeline(first.clone(), &config, None).await.unwrap();

        assert_eq!(first.chunks, second.chunks);
        assert_eq!(first.entities, second.entities);
        assert_eq!(first.keywords, second.keywords);
    }
}
