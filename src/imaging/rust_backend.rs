//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, TIFF, WebP) | `image` crate (pure Rust decoders, format sniffed from magic bytes) |
//! | Decode (AVIF) | `avif-parse` (container) + `rav1d` (AV1), in the `avif` module |
//! | Scale | `image::DynamicImage::resize_exact` with `Lanczos3` |
//! | Cover crop | `image::DynamicImage::resize_to_fill` |
//! | Encode → JPEG | `JpegEncoder::new_with_quality` |
//! | Encode → PNG | `PngEncoder::new_with_quality` |
//! | Encode → WebP | `WebPEncoder::new_lossless` |
//! | Encode → GIF | `GifEncoder::new_with_speed` (first frame) |
//! | Encode → AVIF | `AvifEncoder::new_with_speed_quality` (rav1e) |
//! | Encode → TIFF | `TiffEncoder` |
//!
//! Every transcode decodes into an owned [`DynamicImage`] and encodes into an
//! owned buffer. Both are dropped on every exit path, and the output file is
//! written only after encoding succeeded, so a failure never leaves a
//! truncated output behind.
//!
//! ## Truncated sources
//!
//! The JPEG decoder pads missing scan data instead of failing, so an upload
//! cut off mid-transfer would decode into a half-grey image. JPEG sources are
//! therefore walked marker by marker first and rejected unless the
//! end-of-image marker is reached.

use super::avif;
use super::backend::{BackendError, Dimensions, EncodedOutput, ImageBackend};
use super::params::{EncodeSettings, ResizeSpec, TranscodeParams};
use image::codecs::avif::AvifEncoder;
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::tiff::TiffEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, Frame, GenericImageView, ImageFormat, ImageReader, Limits};
use std::io::Cursor;
use std::path::Path;

/// Largest accepted width or height. Guards against decompression bombs:
/// a small compressed file can expand to an enormous RGBA buffer.
pub const DEFAULT_MAX_DIMENSION: u32 = 16384;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend {
    max_dimension: u32,
}

impl RustBackend {
    pub fn new() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }

    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self { max_dimension }
    }

    fn limits(&self) -> Limits {
        let mut limits = Limits::default();
        limits.max_image_width = Some(self.max_dimension);
        limits.max_image_height = Some(self.max_dimension);
        limits
    }

    /// Load and decode an image from disk.
    fn load_image(&self, path: &Path) -> Result<DynamicImage, BackendError> {
        let data = std::fs::read(path)?;
        if avif::is_avif(&data) {
            let dims = avif::identify(&data)?;
            if dims.width > self.max_dimension || dims.height > self.max_dimension {
                return Err(BackendError::Decode(format!(
                    "{} is {}x{}, over the {} pixel limit",
                    path.display(),
                    dims.width,
                    dims.height,
                    self.max_dimension
                )));
            }
            return avif::decode(&data);
        }

        let mut reader = ImageReader::new(Cursor::new(&data)).with_guessed_format()?;
        if reader.format() == Some(ImageFormat::Jpeg) {
            ensure_complete_jpeg(&data, path)?;
        }
        reader.limits(self.limits());
        reader.decode().map_err(|e| {
            BackendError::Decode(format!("Failed to decode {}: {}", path.display(), e))
        })
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Walk the JPEG marker segments and report whether the end-of-image marker
/// is reached before the data runs out.
///
/// Segments are skipped by their declared length, so thumbnails embedded in
/// APP segments (which carry their own end marker) are not mistaken for the
/// end of the main image.
fn jpeg_is_complete(data: &[u8]) -> bool {
    if !data.starts_with(&[0xFF, 0xD8]) {
        return false;
    }
    let mut i = 2;
    loop {
        if data.get(i) != Some(&0xFF) {
            return false;
        }
        // Fill bytes
        while data.get(i) == Some(&0xFF) {
            i += 1;
        }
        let Some(&marker) = data.get(i) else {
            return false;
        };
        i += 1;
        match marker {
            0xD9 => return true,
            0x01 | 0xD0..=0xD7 => continue,
            _ => {
                let Some(len) = data.get(i..i + 2) else {
                    return false;
                };
                let len = u16::from_be_bytes([len[0], len[1]]) as usize;
                if len < 2 {
                    return false;
                }
                i += len;
                if marker == 0xDA {
                    // Entropy-coded data runs until a marker other than a
                    // stuffed zero or a restart marker.
                    loop {
                        match (data.get(i), data.get(i + 1)) {
                            (Some(0xFF), Some(0x00 | 0xD0..=0xD7 | 0xFF)) => i += 1,
                            (Some(0xFF), Some(_)) => break,
                            (Some(_), _) => i += 1,
                            (None, _) => return false,
                        }
                    }
                }
            }
        }
    }
}

fn ensure_complete_jpeg(data: &[u8], path: &Path) -> Result<(), BackendError> {
    if jpeg_is_complete(data) {
        Ok(())
    } else {
        Err(BackendError::Decode(format!(
            "{} is truncated: JPEG data ends before the end-of-image marker",
            path.display()
        )))
    }
}

fn apply_resize(img: DynamicImage, resize: Option<ResizeSpec>) -> DynamicImage {
    match resize {
        None => img,
        // Never enlarge: a target at least as wide as the source keeps the source pixels
        Some(ResizeSpec::Scale { width, .. }) if width >= img.width() => img,
        Some(ResizeSpec::Scale { width, height }) => {
            img.resize_exact(width, height, FilterType::Lanczos3)
        }
        Some(ResizeSpec::Cover { width, height }) => {
            img.resize_to_fill(width, height, FilterType::Lanczos3)
        }
    }
}

fn png_compression(level: u8) -> CompressionType {
    match level {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

fn encode_failed(e: impl std::fmt::Display, settings: &EncodeSettings) -> BackendError {
    BackendError::Encode(format!("{} encode failed: {}", settings.encoding(), e))
}

/// Encode an image into a fresh buffer according to `settings`.
fn encode(img: &DynamicImage, settings: &EncodeSettings) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    match settings {
        EncodeSettings::Jpeg(s) => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            let encoder = JpegEncoder::new_with_quality(&mut buf, s.quality.value() as u8);
            rgb.write_with_encoder(encoder)
                .map_err(|e| encode_failed(e, settings))?;
        }
        EncodeSettings::Png(s) => {
            let encoder = PngEncoder::new_with_quality(
                &mut buf,
                png_compression(s.compression_level),
                PngFilter::Adaptive,
            );
            img.write_with_encoder(encoder)
                .map_err(|e| encode_failed(e, settings))?;
        }
        EncodeSettings::Webp(_) => {
            let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
            let encoder = WebPEncoder::new_lossless(&mut buf);
            rgba.write_with_encoder(encoder)
                .map_err(|e| encode_failed(e, settings))?;
        }
        EncodeSettings::Gif(s) => {
            // The encoder writes the GIF trailer when dropped, so it must go out
            // of scope before the buffer is returned.
            let mut encoder = GifEncoder::new_with_speed(&mut buf, s.speed.clamp(1, 30));
            encoder
                .encode_frame(Frame::new(img.to_rgba8()))
                .map_err(|e| encode_failed(e, settings))?;
        }
        EncodeSettings::Avif(s) => {
            let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
            let encoder = AvifEncoder::new_with_speed_quality(
                &mut buf,
                s.speed.clamp(1, 10),
                s.quality.value() as u8,
            );
            rgba.write_with_encoder(encoder)
                .map_err(|e| encode_failed(e, settings))?;
        }
        EncodeSettings::Tiff => {
            let encoder = TiffEncoder::new(Cursor::new(&mut buf));
            img.write_with_encoder(encoder)
                .map_err(|e| encode_failed(e, settings))?;
        }
    }
    Ok(buf)
}

impl ImageBackend for RustBackend {
    /// Dimensions from the header. JPEGs are also checked for truncation
    /// here, so a broken upload fails before anything is written.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let data = std::fs::read(path)?;
        if avif::is_avif(&data) {
            return avif::identify(&data);
        }
        let reader = ImageReader::new(Cursor::new(&data)).with_guessed_format()?;
        let format = reader.format();
        let (width, height) = reader.into_dimensions().map_err(|e| {
            BackendError::Decode(format!(
                "Failed to read dimensions of {}: {}",
                path.display(),
                e
            ))
        })?;
        if format == Some(ImageFormat::Jpeg) {
            ensure_complete_jpeg(&data, path)?;
        }
        Ok(Dimensions { width, height })
    }

    fn transcode(&self, params: &TranscodeParams) -> Result<EncodedOutput, BackendError> {
        let img = self.load_image(&params.source)?;
        let img = apply_resize(img, params.resize);
        let (width, height) = img.dimensions();

        let buf = encode(&img, &params.settings)?;
        drop(img);

        std::fs::write(&params.output, &buf)?;
        Ok(EncodedOutput {
            width,
            height,
            bytes: buf.len() as u64,
        })
    }
}
