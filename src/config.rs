//! Pipeline configuration module.
//!
//! Handles loading, validating, and merging `upload.toml`. Stock defaults are
//! serialized to a TOML table and the user file is merged on top, so a config
//! file only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! output_format = "webp"       # Canonical encoding for processed images
//! responsive_formats = true    # Generate breakpoint variants
//! api_folder = "uploads-api"   # Folder for uploads arriving through the API
//!
//! [settings]
//! quality = 80                 # Shared lossy quality (1-100)
//!
//! [settings.webp]
//! lossless = false
//! effort = 4
//!
//! [settings.png]
//! compression_level = 9
//! palette = true
//!
//! [[breakpoints]]
//! name = "thumbnail"
//! width = 245
//! height = 156                 # Fixed height → cover crop
//!
//! [[breakpoints]]
//! name = "small"
//! width = 500
//!
//! [exceptions]
//! "svg+xml" = ["disable_processing", "disable_responsive"]
//! gif = ["disable_processing", "disable_processing_responsive"]
//! jpeg = ["disable_processing_responsive"]
//!
//! [processing]
//! max_processes = 4            # Max parallel workers (omit for auto = CPU cores)
//! max_image_dimension = 16384  # Reject larger sources
//! max_upload_bytes = 262144000 # Reject larger uploads (250 MiB)
//! ```
//!
//! ## Merge Semantics
//!
//! Tables merge key by key, so `[exceptions]` in a user file adds to or
//! replaces individual subtypes. Arrays replace wholesale: a user file that
//! declares any `[[breakpoints]]` declares all of them.
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{
    AvifSettings, Breakpoint, EncodeSettings, GifSettings, ImageEncoding, JpegSettings,
    PngSettings, Quality, WebpSettings,
};
use crate::policy::{ExceptionTable, default_exceptions};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Name of the config file looked up in the project root.
pub const CONFIG_FILENAME: &str = "upload.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Upload pipeline configuration.
///
/// Built once at startup and handed to the pipeline by value; nothing reads
/// configuration from global state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    /// Canonical encoding every processed image converges to.
    pub output_format: ImageEncoding,
    /// Whether breakpoint variants are generated at all.
    pub responsive_formats: bool,
    /// Folder (under `uploads/`) that content-API uploads are moved into.
    pub api_folder: String,
    /// Encoder settings.
    pub settings: QualitySettings,
    /// Responsive breakpoints, in generation order.
    pub breakpoints: Vec<Breakpoint>,
    /// Per-MIME-subtype processing exceptions.
    pub exceptions: ExceptionTable,
    /// Parallelism and decoder limits.
    pub processing: ProcessingConfig,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            output_format: ImageEncoding::Webp,
            responsive_formats: true,
            api_folder: "uploads-api".to_string(),
            settings: QualitySettings::default(),
            breakpoints: default_breakpoints(),
            exceptions: default_exceptions(),
            processing: ProcessingConfig::default(),
        }
    }
}

pub fn default_breakpoints() -> Vec<Breakpoint> {
    vec![
        Breakpoint::cropped("thumbnail", 245, 156),
        Breakpoint::new("small", 500),
        Breakpoint::new("medium", 750),
        Breakpoint::new("large", 1000),
    ]
}

impl UploadConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.settings.quality > 100 {
            return Err(ConfigError::Validation(
                "settings.quality must be 0-100".into(),
            ));
        }
        for (format, quality) in [
            ("jpeg", self.settings.jpeg.quality),
            ("webp", self.settings.webp.quality),
            ("avif", self.settings.avif.quality),
        ] {
            if quality.is_some_and(|q| q > 100) {
                return Err(ConfigError::Validation(format!(
                    "settings.{format}.quality must be 0-100"
                )));
            }
        }
        if self.settings.png.compression_level > 9 {
            return Err(ConfigError::Validation(
                "settings.png.compression_level must be 0-9".into(),
            ));
        }
        if self.settings.webp.effort > 6 {
            return Err(ConfigError::Validation(
                "settings.webp.effort must be 0-6".into(),
            ));
        }
        if !(1..=30).contains(&self.settings.gif.speed) {
            return Err(ConfigError::Validation(
                "settings.gif.speed must be 1-30".into(),
            ));
        }
        if !(1..=10).contains(&self.settings.avif.speed) {
            return Err(ConfigError::Validation(
                "settings.avif.speed must be 1-10".into(),
            ));
        }

        let mut seen = HashSet::new();
        for bp in &self.breakpoints {
            if bp.name.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "breakpoint names must not be empty".into(),
                ));
            }
            if !seen.insert(bp.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate breakpoint name: {}",
                    bp.name
                )));
            }
            if bp.width == 0 || bp.height == Some(0) {
                return Err(ConfigError::Validation(format!(
                    "breakpoint {} must have non-zero dimensions",
                    bp.name
                )));
            }
        }

        let folder = self.api_folder.trim_matches('/');
        if folder.is_empty() || folder.contains('/') || folder == ".." {
            return Err(ConfigError::Validation(
                "api_folder must be a single directory name".into(),
            ));
        }
        if self.processing.max_image_dimension == 0 {
            return Err(ConfigError::Validation(
                "processing.max_image_dimension must be non-zero".into(),
            ));
        }
        if self.processing.max_upload_bytes == 0 {
            return Err(ConfigError::Validation(
                "processing.max_upload_bytes must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// The API folder name without surrounding slashes.
    pub fn api_folder_name(&self) -> &str {
        self.api_folder.trim_matches('/')
    }

    /// Encoder settings for `encoding`, with the shared quality filled in
    /// wherever the format-specific table doesn't override it.
    pub fn encode_settings(&self, encoding: ImageEncoding) -> EncodeSettings {
        let s = &self.settings;
        let shared = s.quality;
        match encoding {
            ImageEncoding::Jpeg => EncodeSettings::Jpeg(JpegSettings {
                quality: Quality::new(s.jpeg.quality.unwrap_or(shared)),
            }),
            ImageEncoding::Png => EncodeSettings::Png(PngSettings {
                compression_level: s.png.compression_level,
                palette: s.png.palette,
            }),
            ImageEncoding::Webp => EncodeSettings::Webp(WebpSettings {
                quality: Quality::new(s.webp.quality.unwrap_or(shared)),
                lossless: s.webp.lossless,
                effort: s.webp.effort,
            }),
            ImageEncoding::Gif => EncodeSettings::Gif(GifSettings {
                speed: s.gif.speed,
            }),
            ImageEncoding::Avif => EncodeSettings::Avif(AvifSettings {
                quality: Quality::new(s.avif.quality.unwrap_or(shared)),
                speed: s.avif.speed,
            }),
            ImageEncoding::Tiff => EncodeSettings::Tiff,
        }
    }

    /// Non-fatal observations about the config, logged at load time.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.output_format == ImageEncoding::Webp && !self.settings.webp.lossless {
            warnings.push(
                "settings.webp.lossless = false: WebP output is always encoded losslessly".into(),
            );
        }
        if self.settings.png.palette {
            warnings.push("settings.png.palette is accepted but has no effect".into());
        }
        warnings
    }
}

/// Encoder settings: one shared quality plus per-format tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualitySettings {
    /// Shared lossy quality (0 = worst, 100 = best).
    pub quality: u32,
    pub jpeg: JpegOptions,
    pub png: PngOptions,
    pub webp: WebpOptions,
    pub gif: GifOptions,
    pub avif: AvifOptions,
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self {
            quality: 80,
            jpeg: JpegOptions::default(),
            png: PngOptions::default(),
            webp: WebpOptions::default(),
            gif: GifOptions::default(),
            avif: AvifOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JpegOptions {
    /// Overrides the shared quality.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PngOptions {
    pub compression_level: u8,
    pub palette: bool,
}

impl Default for PngOptions {
    fn default() -> Self {
        Self {
            compression_level: 9,
            palette: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WebpOptions {
    /// Overrides the shared quality.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u32>,
    pub lossless: bool,
    pub effort: u8,
}

impl Default for WebpOptions {
    fn default() -> Self {
        Self {
            quality: None,
            lossless: false,
            effort: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GifOptions {
    pub speed: i32,
}

impl Default for GifOptions {
    fn default() -> Self {
        Self { speed: 10 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AvifOptions {
    /// Overrides the shared quality.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u32>,
    pub speed: u8,
}

impl Default for AvifOptions {
    fn default() -> Self {
        Self {
            quality: None,
            speed: 6,
        }
    }
}

/// Largest accepted upload body, 250 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 250 * 1024 * 1024;

/// Worker count and resource limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel upload workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
    /// Largest accepted source width or height in pixels.
    pub max_image_dimension: u32,
    /// Largest accepted upload in bytes. Bodies are never buffered past it.
    pub max_upload_bytes: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_processes: None,
            max_image_dimension: crate::imaging::rust_backend::DEFAULT_MAX_DIMENSION,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(UploadConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `upload.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no config file exists in the directory.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = path.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<UploadConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: UploadConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `upload.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(root: &Path) -> Result<UploadConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(root)?;
    let config = resolve_config(base, overlay)?;
    for warning in config.warnings() {
        tracing::warn!("{}", warning);
    }
    Ok(config)
}

/// Returns a fully-commented stock `upload.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Upload Imaging Configuration
# ============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# Canonical encoding every processed image is converted to.
# One of: jpeg, png, webp, gif, avif, tiff.
output_format = "webp"

# Generate responsive breakpoint variants.
responsive_formats = true

# Uploads arriving through the content API are moved into uploads/<api_folder>/.
api_folder = "uploads-api"

# ---------------------------------------------------------------------------
# Encoder settings
# ---------------------------------------------------------------------------
[settings]
# Shared lossy quality (0 = worst, 100 = best). Per-format tables may override.
quality = 80

[settings.jpeg]
# quality = 85

[settings.png]
# zlib scale 0-9, bucketed into fast / default / best.
compression_level = 9
# Accepted for compatibility; the encoder always writes truecolor.
palette = true

[settings.webp]
# WebP output is always lossless with the built-in encoder.
lossless = false
effort = 4
# quality = 80

[settings.gif]
# NeuQuant sampling factor, 1 (best) to 30 (fastest).
speed = 10

[settings.avif]
# rav1e preset, 1 (slowest) to 10 (fastest).
speed = 6
# quality = 80

# ---------------------------------------------------------------------------
# Responsive breakpoints (generated in this order)
# ---------------------------------------------------------------------------
# A breakpoint is only generated when its width is smaller than the source.
# Setting a height crops to exactly width x height.

[[breakpoints]]
name = "thumbnail"
width = 245
height = 156

[[breakpoints]]
name = "small"
width = 500

[[breakpoints]]
name = "medium"
width = 750

[[breakpoints]]
name = "large"
width = 1000

# ---------------------------------------------------------------------------
# Per-format exceptions, keyed by MIME subtype
# ---------------------------------------------------------------------------
# disable_processing             keep the main file in its original encoding
# disable_responsive             generate no responsive variants
# disable_processing_responsive  generate variants in the original encoding
[exceptions]
"svg+xml" = ["disable_processing", "disable_responsive"]
gif = ["disable_processing", "disable_processing_responsive"]
jpeg = ["disable_processing_responsive"]

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel upload workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# Sources wider or taller than this are rejected before decoding.
max_image_dimension = 16384

# Uploads larger than this many bytes are rejected (250 MiB).
max_upload_bytes = 262144000
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ExceptionFlag;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = UploadConfig::default();
        assert_eq!(config.output_format, ImageEncoding::Webp);
        assert!(config.responsive_formats);
        assert_eq!(config.settings.quality, 80);
        assert_eq!(config.breakpoints.len(), 4);
        assert_eq!(config.breakpoints[0], Breakpoint::cropped("thumbnail", 245, 156));
        assert_eq!(config.api_folder_name(), "uploads-api");
        config.validate().unwrap();
    }

    #[test]
    fn stock_toml_matches_defaults() {
        let parsed: UploadConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(parsed, UploadConfig::default());
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
output_format = "avif"

[settings]
quality = 60
"#;
        let config: UploadConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.output_format, ImageEncoding::Avif);
        assert_eq!(config.settings.quality, 60);
        // Defaults preserved
        assert_eq!(config.settings.webp.effort, 4);
        assert_eq!(config.breakpoints.len(), 4);
    }

    #[test]
    fn encode_settings_merge_shared_quality() {
        let mut config = UploadConfig::default();
        config.settings.quality = 70;
        config.settings.jpeg.quality = Some(90);

        assert_eq!(
            config.encode_settings(ImageEncoding::Webp),
            EncodeSettings::Webp(WebpSettings {
                quality: Quality::new(70),
                lossless: false,
                effort: 4,
            })
        );
        assert_eq!(
            config.encode_settings(ImageEncoding::Jpeg),
            EncodeSettings::Jpeg(JpegSettings {
                quality: Quality::new(90)
            })
        );
        assert_eq!(
            config.encode_settings(ImageEncoding::Png),
            EncodeSettings::Png(PngSettings {
                compression_level: 9,
                palette: true
            })
        );
    }

    #[test]
    fn webp_lossy_request_produces_warning() {
        let config = UploadConfig::default();
        assert!(config.warnings().iter().any(|w| w.contains("lossless")));

        let mut lossless = UploadConfig::default();
        lossless.settings.webp.lossless = true;
        lossless.settings.png.palette = false;
        assert!(lossless.warnings().is_empty());
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn validate_rejects_quality_over_100() {
        let mut config = UploadConfig::default();
        config.settings.quality = 101;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_duplicate_breakpoints() {
        let mut config = UploadConfig::default();
        config.breakpoints.push(Breakpoint::new("small", 400));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate breakpoint name: small"));
    }

    #[test]
    fn validate_rejects_zero_sized_breakpoint() {
        let mut config = UploadConfig::default();
        config.breakpoints = vec![Breakpoint::cropped("square", 100, 0)];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_nested_api_folder() {
        let mut config = UploadConfig::default();
        config.api_folder = "a/b".into();
        assert!(config.validate().is_err());

        config.api_folder = "/api-files/".into();
        config.validate().unwrap();
        assert_eq!(config.api_folder_name(), "api-files");
    }

    #[test]
    fn validate_rejects_out_of_range_encoder_options() {
        let mut config = UploadConfig::default();
        config.settings.png.compression_level = 10;
        assert!(config.validate().is_err());

        let mut config = UploadConfig::default();
        config.settings.avif.speed = 0;
        assert!(config.validate().is_err());

        let mut config = UploadConfig::default();
        config.settings.webp.quality = Some(150);
        assert!(config.validate().is_err());
    }

    #[test]
    fn upload_limit_defaults_to_250_mib_and_must_be_set() {
        let mut config = UploadConfig::default();
        assert_eq!(config.processing.max_upload_bytes, 262_144_000);

        config.processing.max_upload_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_config_reads_upload_limit() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "[processing]\nmax_upload_bytes = 1048576\n",
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.processing.max_upload_bytes, 1024 * 1024);
        assert_eq!(config.processing.max_image_dimension, 16384);
    }

    #[test]
    fn empty_breakpoints_are_allowed() {
        let mut config = UploadConfig::default();
        config.breakpoints.clear();
        config.validate().unwrap();
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config, UploadConfig::default());
    }

    #[test]
    fn load_config_merges_exceptions_table() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            r#"
[exceptions]
png = ["disable_responsive"]
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(
            config.exceptions.get("png"),
            Some(&vec![ExceptionFlag::DisableResponsive])
        );
        // Stock entries survive the merge
        assert!(config.exceptions.contains_key("svg+xml"));
        assert!(config.exceptions.contains_key("gif"));
    }

    #[test]
    fn load_config_replaces_breakpoints_wholesale() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            r#"
[[breakpoints]]
name = "hero"
width = 1600
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.breakpoints, vec![Breakpoint::new("hero", 1600)]);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "this is not valid toml [[[").unwrap();
        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_validates_merged_result() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "[settings]\nquality = 300\n",
        )
        .unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    // =========================================================================
    // Unknown key rejection tests
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let result: Result<UploadConfig, _> = toml::from_str("outputFormat = \"webp\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_nested_key_rejected() {
        let toml_str = r#"
[settings.webp]
qualty = 80
"#;
        let result: Result<UploadConfig, _> = toml::from_str(toml_str);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_output_format_rejected() {
        let result: Result<UploadConfig, _> = toml::from_str("output_format = \"bmp\"\n");
        assert!(result.is_err());
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str(r#"quality = 80"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"quality = 70"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("quality").unwrap().as_integer(), Some(70));
    }

    #[test]
    fn merge_toml_table_merge_preserves_base_keys() {
        let base: toml::Value = toml::from_str(
            r#"
[settings]
quality = 80
[settings.webp]
effort = 4
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[settings]
quality = 60
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let settings = merged.get("settings").unwrap();
        assert_eq!(settings.get("quality").unwrap().as_integer(), Some(60));
        assert_eq!(
            settings
                .get("webp")
                .unwrap()
                .get("effort")
                .unwrap()
                .as_integer(),
            Some(4)
        );
    }

    // =========================================================================
    // Processing config tests
    // =========================================================================

    #[test]
    fn effective_threads_auto() {
        let threads = effective_threads(&ProcessingConfig::default());
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(threads, cores);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
            ..ProcessingConfig::default()
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn effective_threads_zero_means_one() {
        let config = ProcessingConfig {
            max_processes: Some(0),
            ..ProcessingConfig::default()
        };
        assert_eq!(effective_threads(&config), 1);
    }
}
