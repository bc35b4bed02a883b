//! DPI and size normalization applied to every image before OCR.

use super::error::OcrError;
use crate::types::ImagePreprocessingMetadata;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

/// DPI assumed when the source carries none.
const DEFAULT_SOURCE_DPI: f64 = 72.0;
/// Scale factors within this window skip the resize entirely.
const SKIP_WINDOW: (f64, f64) = (0.95, 1.05);

/// Normalization parameters, mirroring the DPI group of the extraction
/// config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagePreprocessConfig {
    pub target_dpi: u32,
    pub auto_adjust_dpi: bool,
    pub min_dpi: u32,
    pub max_dpi: u32,
    pub max_image_dimension: u32,
}

impl Default for ImagePreprocessConfig {
    fn default() -> Self {
        Self {
            target_dpi: 300,
            auto_adjust_dpi: true,
            min_dpi: 72,
            max_dpi: 600,
            max_image_dimension: 4096,
        }
    }
}

/// Outcome of normalization: possibly re-encoded pixels plus a record of
/// what happened.
pub struct PreprocessedImage {
    pub data: Vec<u8>,
    pub metadata: ImagePreprocessingMetadata,
}

/// Pick the DPI to render at.
///
/// If the image at its physical size fits `max_image_dimension` when scanned
/// at the target DPI, the target wins; otherwise the largest DPI that fits,
/// clamped to `[min_dpi, max_dpi]`.
fn compute_optimal_dpi(width: u32, height: u32, current_dpi: f64, config: &ImagePreprocessConfig) -> (u32, bool) {
    let width_in = width as f64 / current_dpi;
    let height_in = height as f64 / current_dpi;
    let max_inches = width_in.max(height_in);

    if max_inches * config.target_dpi as f64 <= config.max_image_dimension as f64 {
        return (config.target_dpi, false);
    }

    let fitting = (config.max_image_dimension as f64 / max_inches).floor() as u32;
    let clamped = fitting.clamp(config.min_dpi, config.max_dpi);
    (clamped, true)
}

/// Normalize an image for OCR.
///
/// No-ops (returning the original bytes) when auto-adjust is off and the
/// image is already at the target DPI within bounds, or when the computed
/// scale factor falls inside the skip window.
pub fn normalize_image_dpi(image_bytes: &[u8], config: &ImagePreprocessConfig) -> Result<PreprocessedImage, OcrError> {
    let decoded = image::load_from_memory(image_bytes)
        .map_err(|e| OcrError::ImageProcessing(format!("Failed to decode image: {}", e)))?;

    let (width, height) = (decoded.width(), decoded.height());
    let current_dpi = DEFAULT_SOURCE_DPI;

    let base_metadata = ImagePreprocessingMetadata {
        original_dimensions: (width, height),
        original_dpi: (current_dpi, current_dpi),
        target_dpi: config.target_dpi,
        scale_factor: 1.0,
        auto_adjusted: config.auto_adjust_dpi,
        final_dpi: current_dpi as u32,
        new_dimensions: None,
        resample_method: "NONE".to_string(),
        dimension_clamped: false,
        calculated_dpi: None,
        skipped_resize: true,
    };

    if !config.auto_adjust_dpi
        && current_dpi as u32 == config.target_dpi
        && width.max(height) <= config.max_image_dimension
    {
        return Ok(PreprocessedImage {
            data: image_bytes.to_vec(),
            metadata: base_metadata,
        });
    }

    let (optimal_dpi, dimension_clamped) = if config.auto_adjust_dpi {
        compute_optimal_dpi(width, height, current_dpi, config)
    } else {
        (config.target_dpi, false)
    };

    let scale_factor = optimal_dpi as f64 / current_dpi;

    if scale_factor >= SKIP_WINDOW.0 && scale_factor <= SKIP_WINDOW.1 {
        return Ok(PreprocessedImage {
            data: image_bytes.to_vec(),
            metadata: ImagePreprocessingMetadata {
                scale_factor,
                calculated_dpi: Some(optimal_dpi),
                dimension_clamped,
                final_dpi: current_dpi as u32,
                ..base_metadata
            },
        });
    }

    let new_width = ((width as f64 * scale_factor).round() as u32).max(1);
    let new_height = ((height as f64 * scale_factor).round() as u32).max(1);

    let (filter, resample_method) = if scale_factor < 1.0 {
        (FilterType::Lanczos3, "LANCZOS3")
    } else {
        (FilterType::CatmullRom, "CATMULLROM")
    };

    let resized = decoded.resize_exact(new_width, new_height, filter);
    let mut buffer = std::io::Cursor::new(Vec::new());
    resized
        .write_to(&mut buffer, image::ImageFormat::Png)
        .map_err(|e| OcrError::ImageProcessing(format!("Failed to encode resized image: {}", e)))?;

    Ok(PreprocessedImage {
        data: buffer.into_inner(),
        metadata: ImagePreprocessingMetadata {
            scale_factor,
            final_dpi: optimal_dpi,
            new_dimensions: Some((new_width, new_height)),
            resample_method: resample_method.to_string(),
            dimension_clamped,
            calculated_dpi: Some(optimal_dpi),
            skipped_resize: false,
            ..base_metadata
        },
    })
}
