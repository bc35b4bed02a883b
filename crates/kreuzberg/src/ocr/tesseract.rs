//! Subprocess-driven Tesseract backend.
//!
//! Tesseract is invoked as an external binary:
//!
//! ```text
//! tesseract <input> <output_base> -l <langs> --psm <n> --oem 1 --loglevel OFF \
//!     [-c <key>=<0|1>]* [tsv|hocr]?
//! ```
//!
//! On Linux `OMP_THREAD_LIMIT=1` is exported; Tesseract's internal OpenMP
//! threading deadlocks when many instances run inside a worker pool. The
//! binary resolves from `TESSERACT_CMD` or `PATH`, and `TESSDATA_PREFIX` is
//! respected when set, otherwise probed from well-known system locations.

use super::error::OcrError;
use super::table::{extract_words, reconstruct_table, table_to_markdown, words_to_text};
use super::types::{OutputFormat, TesseractConfig};
use super::validation::{parse_tesseract_version, validate_language_code, validate_tesseract_version};
use crate::Result;
use crate::core::config::OcrConfig;
use crate::plugins::{OcrBackend, Plugin};
use crate::text::normalize_spaces;
use crate::types::{ExtractionResult, Table};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{Duration, timeout};

static TESSERACT_MAJOR_VERSION: OnceCell<u32> = OnceCell::new();

const TESSDATA_PROBE_PATHS: &[&str] = &[
    "/opt/homebrew/share/tessdata",
    "/opt/homebrew/opt/tesseract/share/tessdata",
    "/usr/local/opt/tesseract/share/tessdata",
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\ProgramData\Tesseract-OCR\tessdata",
];

fn tesseract_command() -> String {
    std::env::var("TESSERACT_CMD").unwrap_or_else(|_| "tesseract".to_string())
}

/// RAII removal of a scratch file on every exit path.
struct TempFile {
    path: PathBuf,
}

impl TempFile {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!("Failed to remove temp file {}: {}", self.path.display(), e);
            }
        }
    }
}

fn temp_base(extension: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "kreuzberg_ocr_{}_{}{}",
        std::process::id(),
        uuid::Uuid::new_v4(),
        extension
    ))
}

/// Check `tesseract --version` once per process.
pub async fn validate_tesseract_installation() -> std::result::Result<(), OcrError> {
    if let Some(major) = TESSERACT_MAJOR_VERSION.get() {
        return validate_tesseract_version(*major);
    }

    let output = Command::new(tesseract_command())
        .arg("--version")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| OcrError::MissingBinary(format!("not found on PATH: {}", e)))?;

    // Some builds print the banner on stderr.
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let banner = if stdout.trim().is_empty() { stderr } else { stdout };

    let (major, _, _) = parse_tesseract_version(&banner)
        .ok_or_else(|| OcrError::MissingBinary(format!("could not parse version from: {}", banner.trim())))?;

    validate_tesseract_version(major)?;
    let _ = TESSERACT_MAJOR_VERSION.set(major);
    Ok(())
}

fn resolve_tessdata_prefix() -> Option<String> {
    if std::env::var_os("TESSDATA_PREFIX").is_some() {
        return None;
    }
    TESSDATA_PROBE_PATHS
        .iter()
        .find(|p| Path::new(p).exists())
        .map(|p| (*p).to_string())
}

/// The subprocess Tesseract OCR backend.
#[derive(Default)]
pub struct TesseractBackend;

impl TesseractBackend {
    pub fn new() -> Self {
        Self
    }

    fn tesseract_config<'a>(&self, config: &'a OcrConfig) -> std::result::Result<&'a TesseractConfig, OcrError> {
        match config {
            OcrConfig::Tesseract(tesseract) => Ok(tesseract),
            other => Err(OcrError::InvalidConfiguration(format!(
                "tesseract backend received a {} configuration",
                other.backend_name()
            ))),
        }
    }

    /// Run the binary over `input` and assemble the result.
    pub async fn run(&self, input: &Path, config: &TesseractConfig) -> std::result::Result<ExtractionResult, OcrError> {
        validate_tesseract_installation().await?;
        let language = validate_language_code(&config.language)?;

        let effective_format = if config.enable_table_detection {
            OutputFormat::Tsv
        } else {
            config.output_format
        };

        let output_base = temp_base("");
        let output_path = output_base.with_extension(effective_format.extension());
        let _output_guard = TempFile::new(output_path.clone());

        let mut command = Command::new(tesseract_command());
        command
            .arg(input)
            .arg(&output_base)
            .arg("-l")
            .arg(&language)
            .arg("--psm")
            .arg(config.psm.as_u8().to_string())
            .arg("--oem")
            .arg("1")
            .arg("--loglevel")
            .arg("OFF");

        for (name, value) in config.engine_variables() {
            command.arg("-c").arg(format!("{}={}", name, if value { 1 } else { 0 }));
        }

        match effective_format {
            OutputFormat::Tsv => {
                command.arg("tsv");
            }
            OutputFormat::Hocr => {
                command.arg("hocr");
            }
            OutputFormat::Text => {}
        }

        if cfg!(target_os = "linux") {
            command.env("OMP_THREAD_LIMIT", "1");
        }
        if let Some(prefix) = resolve_tessdata_prefix() {
            command.env("TESSDATA_PREFIX", prefix);
        }

        command.stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(true);

        let child = command
            .spawn()
            .map_err(|e| OcrError::MissingBinary(format!("failed to execute: {}", e)))?;

        let output = match timeout(Duration::from_secs(config.timeout_secs), child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(OcrError::Io(format!("failed to wait for tesseract: {}", e))),
            // The subprocess is killed on drop of the consumed child.
            Err(_) => return Err(OcrError::Timeout(config.timeout_secs)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

            #[cfg(unix)]
            {
                use std::os::unix::process::ExitStatusExt;
                if let Some(signal) = output.status.signal() {
                    return Err(OcrError::Signal(format!("{} (stderr: {})", signal_name(signal), stderr)));
                }
            }

            return Err(OcrError::Failed(stderr));
        }

        let raw = tokio::fs::read_to_string(&output_path)
            .await
            .map_err(|e| OcrError::Io(format!("failed to read OCR output {}: {}", output_path.display(), e)))?;

        Ok(self.assemble_result(&raw, effective_format, config))
    }

    fn assemble_result(&self, raw: &str, format: OutputFormat, config: &TesseractConfig) -> ExtractionResult {
        let mut result = ExtractionResult::new(String::new(), "text/markdown");
        result
            .metadata
            .additional
            .insert("source_format".to_string(), serde_json::json!(format.as_str()));

        let mut tables_detected = 0usize;

        match format {
            OutputFormat::Text => {
                result.content = normalize_spaces(raw);
            }
            OutputFormat::Hocr => {
                result.content = raw.trim().to_string();
            }
            OutputFormat::Tsv => {
                let words = extract_words(raw, config.table_min_confidence);
                let mut content = words_to_text(&words);

                if config.enable_table_detection && !words.is_empty() {
                    let grid = reconstruct_table(&words, config.table_column_threshold, config.table_row_threshold_ratio);
                    if !grid.is_empty() {
                        let markdown = table_to_markdown(&grid);
                        tables_detected = 1;
                        content.push_str("\n\n");
                        content.push_str(&markdown);
                        result.tables.push(Table {
                            page_number: words.first().map(|w| w.page_num as usize).unwrap_or(1),
                            text: markdown,
                            cropped_image: None,
                            grid: Some(grid),
                        });
                    }
                }

                result.layout = Some(words);
                result.content = content;
            }
        }

        result
            .metadata
            .additional
            .insert("tables_detected".to_string(), serde_json::json!(tables_detected));
        result
    }
}

#[cfg(unix)]
fn signal_name(signal: i32) -> String {
    match signal {
        1 => "SIGHUP".to_string(),
        2 => "SIGINT".to_string(),
        6 => "SIGABRT".to_string(),
        9 => "SIGKILL".to_string(),
        11 => "SIGSEGV".to_string(),
        15 => "SIGTERM".to_string(),
        other => format!("signal {}", other),
    }
}

impl Plugin for TesseractBackend {
    fn name(&self) -> &str {
        "tesseract"
    }
}

#[async_trait]
impl OcrBackend for TesseractBackend {
    async fn process_image(&self, image: &[u8], config: &OcrConfig) -> Result<ExtractionResult> {
        let tesseract = self.tesseract_config(config)?;

        let input_path = temp_base(".png");
        let _input_guard = TempFile::new(input_path.clone());
        tokio::fs::write(&input_path, image).await?;

        Ok(self.run(&input_path, tesseract).await?)
    }

    async fn process_file(&self, path: &Path, config: &OcrConfig) -> Result<ExtractionResult> {
        let tesseract = self.tesseract_config(config)?;
        Ok(self.run(path, tesseract).await?)
    }

    fn supports_language(&self, lang: &str) -> bool {
        validate_language_code(lang).is_ok()
    }

    fn supports_table_detection(&self) -> bool {
        true
    }
}
