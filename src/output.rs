//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Every entity leads with its positional index and display name. URLs,
//! conversions and variants follow as indented context lines, so the output
//! reads as an inventory of what was uploaded while still pointing at the
//! files on disk.
//!
//! # Output Format
//!
//! ## Upload
//!
//! ```text
//! 001 photo.webp → /uploads/photo_3fa9c01b2e.webp
//!     Converted: webp
//!     Variants: thumbnail, small, medium, large
//! 002 logo.svg (unchanged)
//! 003 broken.jpg
//!     Error: identify failed: decode error: ...
//!
//! Processed 3 files: 1 updated, 1 unchanged, 1 failed
//! ```
//!
//! ## List
//!
//! ```text
//! 001 photo.webp (image/webp, 1200x800, 48.2 KB)
//!     URL: /uploads/photo_3fa9c01b2e.webp
//!     large: 1000x667 → /uploads/photo_3fa9c01b2e-large.webp
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::config::{UploadConfig, effective_threads};
use crate::pipeline::{PipelineError, UploadOutcome};
use crate::types::UploadedAsset;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Human-readable byte count.
fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}

fn format_dimensions(width: Option<u32>, height: Option<u32>) -> Option<String> {
    match (width, height) {
        (Some(w), Some(h)) => Some(format!("{}x{}", w, h)),
        (Some(w), None) => Some(format!("{}w", w)),
        _ => None,
    }
}

// ============================================================================
// Upload report
// ============================================================================

/// Format the results of an upload or reprocess run.
pub fn format_upload_report(results: &[Result<UploadOutcome, PipelineError>]) -> Vec<String> {
    let mut lines = Vec::new();
    let (mut updated, mut unchanged, mut failed) = (0, 0, 0);

    for (i, result) in results.iter().enumerate() {
        let index = format_index(i + 1);
        match result {
            Ok(outcome) if outcome.written => {
                updated += 1;
                let a = &outcome.asset;
                lines.push(format!("{} {} → {}", index, a.name, a.url));
                if let Some(encoding) = outcome.transcoded {
                    lines.push(format!("    Converted: {}", encoding));
                }
                if !outcome.variants.is_empty() {
                    lines.push(format!("    Variants: {}", outcome.variants.join(", ")));
                }
                if a.folder.is_some() {
                    lines.push(format!("    Folder: {}", a.folder_path));
                }
            }
            Ok(outcome) => {
                unchanged += 1;
                lines.push(format!("{} {} (unchanged)", index, outcome.asset.name));
            }
            Err(e) => {
                failed += 1;
                lines.push(format!("{} {}", index, e.asset));
                lines.push(format!("    Error: {} failed: {}", e.stage, e.kind));
            }
        }
    }

    if !results.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!(
        "Processed {} {}: {} updated, {} unchanged, {} failed",
        results.len(),
        if results.len() == 1 { "file" } else { "files" },
        updated,
        unchanged,
        failed
    ));
    lines
}

/// Print an upload report to stdout.
pub fn print_upload_report(results: &[Result<UploadOutcome, PipelineError>]) {
    for line in format_upload_report(results) {
        println!("{}", line);
    }
}

// ============================================================================
// Asset listing
// ============================================================================

/// Format the stored assets with their variants.
pub fn format_asset_list(assets: &[UploadedAsset]) -> Vec<String> {
    if assets.is_empty() {
        return vec!["No assets".to_string()];
    }

    let mut lines = Vec::new();
    for (i, a) in assets.iter().enumerate() {
        let mut details = vec![a.mime.clone()];
        if let Some(dims) = format_dimensions(a.width, a.height) {
            details.push(dims);
        }
        details.push(format_size(a.size));
        lines.push(format!(
            "{} {} ({})",
            format_index(i + 1),
            a.name,
            details.join(", ")
        ));
        lines.push(format!("    URL: {}", a.url));
        if a.folder.is_some() {
            lines.push(format!("    Folder: {}", a.folder_path));
        }
        // Widest first
        let mut variants: Vec<_> = a.formats.iter().collect();
        variants.sort_by(|x, y| y.1.width.cmp(&x.1.width));
        for (name, v) in variants {
            let dims = format_dimensions(Some(v.width), v.height).unwrap_or_default();
            lines.push(format!("    {}: {} → {}", name, dims, v.url));
        }
    }
    lines
}

/// Print the asset listing to stdout.
pub fn print_asset_list(assets: &[UploadedAsset]) {
    for line in format_asset_list(assets) {
        println!("{}", line);
    }
}

// ============================================================================
// Config summary
// ============================================================================

/// Format a summary of the effective configuration.
pub fn format_config_summary(config: &UploadConfig) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push(format!(
        "Output: {} ({})",
        config.output_format,
        config.encode_settings(config.output_format).describe()
    ));
    lines.push(format!(
        "Responsive: {}",
        if config.responsive_formats { "on" } else { "off" }
    ));
    let breakpoints: Vec<String> = config
        .breakpoints
        .iter()
        .map(|bp| match bp.height {
            Some(h) => format!("{} {}x{}", bp.name, bp.width, h),
            None => format!("{} {}", bp.name, bp.width),
        })
        .collect();
    lines.push(format!("Breakpoints: {}", breakpoints.join(", ")));
    if !config.exceptions.is_empty() {
        lines.push("Exceptions:".to_string());
        for (subtype, flags) in &config.exceptions {
            let names: Vec<&str> = flags.iter().map(|f| f.as_str()).collect();
            lines.push(format!("    {}: {}", subtype, names.join(", ")));
        }
    }
    lines.push(format!("API folder: /uploads/{}", config.api_folder_name()));
    lines.push(format!("Workers: {}", effective_threads(&config.processing)));
    lines
}

/// Print the config summary to stdout.
pub fn print_config_summary(config: &UploadConfig) {
    for line in format_config_summary(config) {
        println!("{}", line);
    }
}
