//! Image encodings this crate can write, and MIME/extension lookups.
//!
//! [`ImageEncoding`] is the closed set of output encodings. Source files may
//! be in formats outside this set (SVG, BMP); those resolve to `None` and are
//! only ever passed through untouched.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageEncoding {
    #[serde(alias = "jpg")]
    Jpeg,
    Png,
    Webp,
    Gif,
    Avif,
    #[serde(alias = "tif")]
    Tiff,
}

impl ImageEncoding {
    pub const ALL: [ImageEncoding; 6] = [
        ImageEncoding::Jpeg,
        ImageEncoding::Png,
        ImageEncoding::Webp,
        ImageEncoding::Gif,
        ImageEncoding::Avif,
        ImageEncoding::Tiff,
    ];

    /// Extension written for files in this encoding, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ImageEncoding::Jpeg => "jpg",
            ImageEncoding::Png => "png",
            ImageEncoding::Webp => "webp",
            ImageEncoding::Gif => "gif",
            ImageEncoding::Avif => "avif",
            ImageEncoding::Tiff => "tiff",
        }
    }

    /// Every extension that denotes this encoding.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            ImageEncoding::Jpeg => &["jpg", "jpeg", "jpe"],
            ImageEncoding::Png => &["png"],
            ImageEncoding::Webp => &["webp"],
            ImageEncoding::Gif => &["gif"],
            ImageEncoding::Avif => &["avif"],
            ImageEncoding::Tiff => &["tiff", "tif"],
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            ImageEncoding::Jpeg => "image/jpeg",
            ImageEncoding::Png => "image/png",
            ImageEncoding::Webp => "image/webp",
            ImageEncoding::Gif => "image/gif",
            ImageEncoding::Avif => "image/avif",
            ImageEncoding::Tiff => "image/tiff",
        }
    }

    /// Resolve a MIME subtype such as `"jpeg"` or `"svg+xml"`.
    pub fn from_subtype(subtype: &str) -> Option<Self> {
        match subtype.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" | "pjpeg" => Some(ImageEncoding::Jpeg),
            "png" => Some(ImageEncoding::Png),
            "webp" => Some(ImageEncoding::Webp),
            "gif" => Some(ImageEncoding::Gif),
            "avif" => Some(ImageEncoding::Avif),
            "tiff" => Some(ImageEncoding::Tiff),
            _ => None,
        }
    }

    /// Resolve a full MIME type such as `"image/jpeg"`.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let (kind, subtype) = mime.split_once('/')?;
        if !kind.eq_ignore_ascii_case("image") {
            return None;
        }
        Self::from_subtype(subtype)
    }

    /// Resolve an extension, with or without the leading dot.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|enc| enc.extensions().contains(&ext.as_str()))
    }
}

impl fmt::Display for ImageEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImageEncoding::Jpeg => "jpeg",
            ImageEncoding::Png => "png",
            ImageEncoding::Webp => "webp",
            ImageEncoding::Gif => "gif",
            ImageEncoding::Avif => "avif",
            ImageEncoding::Tiff => "tiff",
        };
        f.write_str(name)
    }
}

/// MIME type for an uploaded file, judged by its extension.
///
/// Covers the writable encodings plus the common image formats that are
/// stored but never transcoded.
pub fn mime_for_extension(ext: &str) -> &'static str {
    if let Some(enc) = ImageEncoding::from_extension(ext) {
        return enc.mime();
    }
    match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "ico" => "image/x-icon",
        "heic" => "image/heic",
        _ => "application/octet-stream",
    }
}
