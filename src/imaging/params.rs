//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which decides what images to create) and the [`backend`](super::backend)
//! (which does the actual pixel work). This separation allows swapping backends
//! (e.g. for testing with a mock) without changing operation logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 80). Clamped on construction.
//! - [`EncodeSettings`]: One variant per supported output encoding, each with its own settings.
//! - [`Breakpoint`]: A named responsive target width, optionally with a fixed crop height.
//! - [`ResizeSpec`]: Target geometry for a single resize.
//! - [`TranscodeParams`]: Full specification for a transcode: source, output, optional resize, encoder settings.

use super::format::ImageEncoding;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegSettings {
    pub quality: Quality,
}

/// PNG encoder settings.
///
/// `compression_level` follows the zlib 0-9 scale and is bucketed into the
/// encoder's fast/default/best presets. `palette` is carried for config
/// compatibility; the pure-Rust encoder always writes truecolor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PngSettings {
    pub compression_level: u8,
    pub palette: bool,
}

/// WebP encoder settings.
///
/// The `image` crate only ships a lossless WebP encoder, so `quality` and
/// `effort` are recorded but do not change the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebpSettings {
    pub quality: Quality,
    pub lossless: bool,
    pub effort: u8,
}

/// GIF encoder settings. `speed` is the NeuQuant sampling factor (1-30).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GifSettings {
    pub speed: i32,
}

/// AVIF encoder settings. `speed` is the rav1e preset (1 = slowest, 10 = fastest).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvifSettings {
    pub quality: Quality,
    pub speed: u8,
}

/// Encoder selection together with the settings that encoder understands.
///
/// Resolved once per asset from configuration; the backend matches on it
/// and never looks at format names again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeSettings {
    Jpeg(JpegSettings),
    Png(PngSettings),
    Webp(WebpSettings),
    Gif(GifSettings),
    Avif(AvifSettings),
    Tiff,
}

impl EncodeSettings {
    pub fn encoding(&self) -> ImageEncoding {
        match self {
            EncodeSettings::Jpeg(_) => ImageEncoding::Jpeg,
            EncodeSettings::Png(_) => ImageEncoding::Png,
            EncodeSettings::Webp(_) => ImageEncoding::Webp,
            EncodeSettings::Gif(_) => ImageEncoding::Gif,
            EncodeSettings::Avif(_) => ImageEncoding::Avif,
            EncodeSettings::Tiff => ImageEncoding::Tiff,
        }
    }

    /// Human-readable `key: value` summary. Shown by `check-config` and
    /// logged with each asset whose main file was transcoded.
    pub fn describe(&self) -> String {
        match self {
            EncodeSettings::Jpeg(s) => format!("quality: {}", s.quality.value()),
            EncodeSettings::Png(s) => format!(
                "compressionLevel: {}, palette: {}",
                s.compression_level, s.palette
            ),
            EncodeSettings::Webp(s) => format!(
                "quality: {}, lossless: {}, effort: {}",
                s.quality.value(),
                s.lossless,
                s.effort
            ),
            EncodeSettings::Gif(s) => format!("speed: {}", s.speed),
            EncodeSettings::Avif(s) => {
                format!("quality: {}, speed: {}", s.quality.value(), s.speed)
            }
            EncodeSettings::Tiff => String::new(),
        }
    }
}

/// A named responsive target.
///
/// Without a `height` the variant is scaled to `width` preserving aspect
/// ratio. With a `height` it is cover-cropped to exactly `width x height`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Breakpoint {
    pub name: String,
    pub width: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl Breakpoint {
    pub fn new(name: &str, width: u32) -> Self {
        Self {
            name: name.to_string(),
            width,
            height: None,
        }
    }

    pub fn cropped(name: &str, width: u32, height: u32) -> Self {
        Self {
            name: name.to_string(),
            width,
            height: Some(height),
        }
    }
}

/// Target geometry for a resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeSpec {
    /// Scale to exactly this size (aspect already accounted for by the caller).
    Scale { width: u32, height: u32 },
    /// Fill the box and center-crop the overflow.
    Cover { width: u32, height: u32 },
}

impl ResizeSpec {
    pub fn dimensions(&self) -> (u32, u32) {
        match *self {
            ResizeSpec::Scale { width, height } | ResizeSpec::Cover { width, height } => {
                (width, height)
            }
        }
    }
}

/// Parameters for a decode → (resize) → encode operation.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub resize: Option<ResizeSpec>,
    pub settings: EncodeSettings,
}
