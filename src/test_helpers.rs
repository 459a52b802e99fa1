//! Shared test utilities for the upload-imaging test suite.
//!
//! Writes small synthetic images to disk so backend and pipeline tests can
//! exercise real codecs without checked-in fixtures.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let path = tmp.path().join("photo.jpg");
//! create_test_jpeg(&path, 1200, 800);
//! ```

use image::codecs::avif::AvifEncoder;
use image::codecs::gif::GifEncoder;
use image::{DynamicImage, Frame, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::fs;
use std::io::Cursor;
use std::path::Path;

/// Number of leading bytes kept by [`create_truncated_jpeg`]: enough for the
/// format to be sniffed as JPEG, too few to reach the frame header.
const TRUNCATED_LEN: usize = 16;

fn gradient_rgb(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    })
}

/// Encode a gradient JPEG in memory.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    gradient_rgb(width, height)
        .write_to(&mut buf, ImageFormat::Jpeg)
        .unwrap();
    buf.into_inner()
}

/// Encode a gradient AVIF in memory (8-bit, no alpha).
pub fn avif_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    let encoder = AvifEncoder::new_with_speed_quality(&mut buf, 10, 80);
    DynamicImage::ImageRgb8(gradient_rgb(width, height))
        .write_with_encoder(encoder)
        .unwrap();
    buf
}

// =========================================================================
// Fixture writers
// =========================================================================

/// Write a gradient JPEG of the given size.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    fs::write(path, jpeg_bytes(width, height)).unwrap();
}

/// Write a gradient PNG of the given size.
pub fn create_test_png(path: &Path, width: u32, height: u32) {
    gradient_rgb(width, height)
        .save_with_format(path, ImageFormat::Png)
        .unwrap();
}

/// Write a single-frame GIF of the given size with a half-transparent stripe.
pub fn create_test_gif(path: &Path, width: u32, height: u32) {
    let img = RgbaImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgba([200, 40, 40, 255])
        } else {
            Rgba([40, 40, 200, 0])
        }
    });
    let mut buf = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut buf);
        encoder.encode_frame(Frame::new(img)).unwrap();
    }
    fs::write(path, buf).unwrap();
}

/// Write a gradient AVIF of the given size.
pub fn create_test_avif(path: &Path, width: u32, height: u32) {
    fs::write(path, avif_bytes(width, height)).unwrap();
}

/// Write the first half of a valid JPEG: headers intact, scan data cut off.
pub fn create_half_jpeg(path: &Path, width: u32, height: u32) {
    let mut bytes = jpeg_bytes(width, height);
    bytes.truncate(bytes.len() / 2);
    fs::write(path, bytes).unwrap();
}

/// Write the first few bytes of a valid JPEG, as left behind by an
/// interrupted upload. Sniffs as JPEG but cannot be decoded.
pub fn create_truncated_jpeg(path: &Path, width: u32, height: u32) {
    let mut bytes = jpeg_bytes(width, height);
    bytes.truncate(TRUNCATED_LEN);
    fs::write(path, bytes).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn fixtures_have_requested_dimensions() {
        let tmp = TempDir::new().unwrap();
        let jpeg = tmp.path().join("a.jpg");
        let png = tmp.path().join("a.png");
        let gif = tmp.path().join("a.gif");
        create_test_jpeg(&jpeg, 40, 30);
        create_test_png(&png, 20, 10);
        create_test_gif(&gif, 16, 8);

        assert_eq!(image::image_dimensions(&jpeg).unwrap(), (40, 30));
        assert_eq!(image::image_dimensions(&png).unwrap(), (20, 10));
        assert_eq!(image::image_dimensions(&gif).unwrap(), (16, 8));
    }

    #[test]
    fn half_jpeg_keeps_headers() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("half.jpg");
        create_half_jpeg(&path, 400, 300);

        // The frame header survives, so only a full decode can tell
        assert_eq!(image::image_dimensions(&path).unwrap(), (400, 300));
        let bytes = fs::read(&path).unwrap();
        assert_ne!(&bytes[bytes.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn truncated_jpeg_does_not_decode() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.jpg");
        create_truncated_jpeg(&path, 100, 100);

        assert_eq!(fs::read(&path).unwrap().len(), TRUNCATED_LEN);
        assert!(image::open(&path).is_err());
    }
}
