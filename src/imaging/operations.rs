//! High-level image operations.
//!
//! These functions combine calculations with backend execution.
//! They take configuration, compute parameters, and call the backend.

use super::backend::{BackendError, EncodedOutput, ImageBackend};
use super::calculations::plan_breakpoint;
use super::params::{Breakpoint, EncodeSettings, TranscodeParams};
use std::path::{Path, PathBuf};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Get image dimensions using the backend.
pub fn get_dimensions(backend: &impl ImageBackend, path: &Path) -> Result<(u32, u32)> {
    let dims = backend.identify(path)?;
    Ok((dims.width, dims.height))
}

/// Convert a whole image to another encoding without resizing.
pub fn transcode_image(
    backend: &impl ImageBackend,
    source: &Path,
    output: &Path,
    settings: EncodeSettings,
) -> Result<EncodedOutput> {
    backend.transcode(&TranscodeParams {
        source: source.to_path_buf(),
        output: output.to_path_buf(),
        resize: None,
        settings,
    })
}

/// Generated responsive variant with its file location and real dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedVariant {
    pub breakpoint: String,
    pub file_name: String,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub bytes: u64,
}

/// Configuration for responsive image generation.
#[derive(Debug, Clone)]
pub struct ResponsiveConfig {
    pub breakpoints: Vec<Breakpoint>,
    pub settings: EncodeSettings,
    /// Extension for generated files, without the dot.
    pub extension: String,
}

/// Create one variant per breakpoint that is narrower than the source.
///
/// Breakpoints are processed in configured order, one at a time. Files are
/// named `<stem>-<breakpoint>.<ext>` inside `output_dir`. The first backend
/// failure aborts the whole set; callers never see a partial list.
pub fn create_responsive_images(
    backend: &impl ImageBackend,
    source: &Path,
    output_dir: &Path,
    filename_stem: &str,
    original_dims: (u32, u32),
    config: &ResponsiveConfig,
) -> Result<Vec<GeneratedVariant>> {
    let mut variants = Vec::new();

    for breakpoint in &config.breakpoints {
        let Some(plan) = plan_breakpoint(original_dims, breakpoint) else {
            tracing::debug!(
                breakpoint = %breakpoint.name,
                target_width = breakpoint.width,
                source_width = original_dims.0,
                "skipping breakpoint: target width not smaller than original"
            );
            continue;
        };

        let file_name = format!("{}-{}.{}", filename_stem, plan.name, config.extension);
        let path = output_dir.join(&file_name);

        let encoded = backend.transcode(&TranscodeParams {
            source: source.to_path_buf(),
            output: path.clone(),
            resize: Some(plan.resize),
            settings: config.settings,
        })?;

        variants.push(GeneratedVariant {
            breakpoint: plan.name,
            file_name,
            path,
            width: encoded.width,
            height: encoded.height,
            bytes: encoded.bytes,
        });
    }

    Ok(variants)
}
