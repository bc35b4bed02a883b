//! Kreuzberg command line.
//!
//! Exit codes: 0 success, 1 extraction failure, 2 validation failure,
//! 3 missing dependency.

use anyhow::Context;
use clap::{Parser, Subcommand};
use kreuzberg::{ExtractionConfig, KreuzbergError, OcrBackendKind, ReductionMode, TokenReductionConfig};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "kreuzberg", version, about = "Extract text, metadata, and structure from documents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract content from a file.
    Extract {
        /// File to extract.
        path: PathBuf,

        /// MIME type override; auto-detected when omitted.
        #[arg(long)]
        mime: Option<String>,

        /// OCR even when the document carries a text layer.
        #[arg(long)]
        force_ocr: bool,

        /// OCR backend to route to.
        #[arg(long, value_parser = parse_backend)]
        ocr_backend: Option<OcrBackendKind>,

        /// OCR language code(s), `+`-joined (e.g. "eng+deu").
        #[arg(long)]
        lang: Option<String>,

        /// Chunk the content.
        #[arg(long)]
        chunk: bool,

        /// Extract entities.
        #[arg(long)]
        entities: bool,

        /// Extract keywords.
        #[arg(long)]
        keywords: bool,

        /// Detect languages.
        #[arg(long)]
        detect_language: bool,

        /// Classify the document type.
        #[arg(long)]
        detect_document_type: bool,

        /// Token reduction mode: off, light, moderate.
        #[arg(long)]
        token_reduction: Option<String>,

        /// Disable the result cache.
        #[arg(long)]
        no_cache: bool,

        /// Emit the full result as JSON instead of plain content.
        #[arg(long)]
        json: bool,

        /// Config file; `kreuzberg.toml` is discovered upward when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print cache statistics.
    CacheStats,

    /// Clear all cache namespaces.
    CacheClear,
}

fn parse_backend(value: &str) -> Result<OcrBackendKind, String> {
    value.parse::<OcrBackendKind>().map_err(|e| e.to_string())
}

fn load_base_config(explicit: Option<&PathBuf>) -> anyhow::Result<ExtractionConfig> {
    match explicit {
        Some(path) => {
            ExtractionConfig::from_toml_file(path).with_context(|| format!("loading config {}", path.display()))
        }
        None => Ok(ExtractionConfig::discover()?.unwrap_or_default()),
    }
}

fn exit_code_for(error: &KreuzbergError) -> ExitCode {
    match error {
        KreuzbergError::Validation { .. } | KreuzbergError::UnsupportedFormat(_) => ExitCode::from(2),
        KreuzbergError::MissingDependency(_) => ExitCode::from(3),
        _ => ExitCode::from(1),
    }
}

async fn run_extract(
    path: PathBuf,
    mime: Option<String>,
    config: ExtractionConfig,
    json: bool,
) -> Result<(), KreuzbergError> {
    let result = kreuzberg::extract_file(&path, mime.as_deref(), &config).await?;

    if json {
        let rendered = serde_json::to_string_pretty(&result)
            .map_err(|e| KreuzbergError::serialization_with_source("failed to render result", e))?;
        println!("{}", rendered);
    } else {
        println!("{}", result.content);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Extract {
            path,
            mime,
            force_ocr,
            ocr_backend,
            lang,
            chunk,
            entities,
            keywords,
            detect_language,
            detect_document_type,
            token_reduction,
            no_cache,
            json,
            config,
        } => {
            let mut extraction_config = match load_base_config(config.as_ref()) {
                Ok(config) => config,
                Err(error) => {
                    eprintln!("{:#}", error);
                    return ExitCode::from(2);
                }
            };

            extraction_config.force_ocr = force_ocr;
            if let Some(backend) = ocr_backend {
                extraction_config.ocr_backend = backend;
                extraction_config.ocr_config = None;
            }
            if let Some(language) = lang {
                extraction_config.ocr_config = Some(kreuzberg::OcrConfig::Tesseract(kreuzberg::TesseractConfig {
                    language,
                    enable_table_detection: extraction_config.extract_tables,
                    ..Default::default()
                }));
                extraction_config.ocr_backend = OcrBackendKind::Tesseract;
            }
            extraction_config.chunk_content |= chunk;
            extraction_config.extract_entities |= entities;
            extraction_config.extract_keywords |= keywords;
            extraction_config.auto_detect_language |= detect_language;
            extraction_config.auto_detect_document_type |= detect_document_type;
            if let Some(mode) = token_reduction {
                extraction_config.token_reduction = Some(TokenReductionConfig {
                    mode: ReductionMode::from(mode.as_str()),
                    ..Default::default()
                });
            }
            if no_cache {
                extraction_config.use_cache = false;
            }

            match run_extract(path, mime, extraction_config, json).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(error) => {
                    eprintln!("{}", error);
                    exit_code_for(&error)
                }
            }
        }

        Command::CacheStats => {
            let (entries, size_mb) = kreuzberg::core::extractor::document_cache().stats();
            println!("documents: {} entries, {:.2} MiB", entries, size_mb);
            ExitCode::SUCCESS
        }

        Command::CacheClear => match kreuzberg::core::extractor::document_cache().clear() {
            Ok((removed, freed)) => {
                println!("removed {} entries ({:.2} MiB)", removed, freed);
                ExitCode::SUCCESS
            }
            Err(error) => {
                eprintln!("{}", error);
                ExitCode::from(1)
            }
        },
    }
}
