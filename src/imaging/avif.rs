//! AVIF decoding.
//!
//! The `image` crate's `avif` feature only provides the encoder (rav1e).
//! Decoding goes through `avif-parse` for the container and `rav1d`, a pure
//! Rust port of dav1d, for the AV1 payload. The decoded YUV planes are
//! converted to RGB8 here.
//!
//! Only the primary item is decoded. An alpha plane, if present, is dropped.

use super::backend::{BackendError, Dimensions};
use image::DynamicImage;
use std::io::Cursor;
use std::ptr::NonNull;

/// `ftyp` brands that mark an AVIF file.
const AVIF_BRANDS: [&[u8; 4]; 2] = [b"avif", b"avis"];

/// True when `data` starts with an ISO-BMFF `ftyp` box whose major or
/// compatible brands include AVIF.
pub fn is_avif(data: &[u8]) -> bool {
    if data.len() < 12 || &data[4..8] != b"ftyp" {
        return false;
    }
    let box_len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    let end = box_len.clamp(12, data.len());
    // major brand at 8..12, minor version at 12..16, compatible brands after
    std::iter::once(&data[8..12])
        .chain(data.get(16..end).unwrap_or_default().chunks_exact(4))
        .any(|brand| AVIF_BRANDS.iter().any(|b| brand == &b[..]))
}

fn parse(data: &[u8]) -> Result<avif_parse::AvifData, BackendError> {
    avif_parse::read_avif(&mut Cursor::new(data))
        .map_err(|e| BackendError::Decode(format!("invalid AVIF container: {e:?}")))
}

/// Dimensions from the container metadata, without decoding any pixels.
pub fn identify(data: &[u8]) -> Result<Dimensions, BackendError> {
    let avif = parse(data)?;
    let meta = avif
        .primary_item_metadata()
        .map_err(|e| BackendError::Decode(format!("unreadable AVIF metadata: {e:?}")))?;
    Ok(Dimensions {
        width: meta.max_frame_width.get(),
        height: meta.max_frame_height.get(),
    })
}

fn rav1d_failed(step: &str, code: i32) -> BackendError {
    BackendError::Decode(format!("rav1d {step} failed ({code})"))
}

/// Decode the primary image of an AVIF file.
pub fn decode(data: &[u8]) -> Result<DynamicImage, BackendError> {
    use rav1d::include::dav1d::dav1d::Dav1dSettings;

    let avif = parse(data)?;
    let av1_bytes: &[u8] = &avif.primary_item;

    let mut settings = std::mem::MaybeUninit::<Dav1dSettings>::uninit();
    let settings_ptr = NonNull::new(settings.as_mut_ptr())
        .ok_or_else(|| BackendError::Decode("rav1d settings unavailable".into()))?;
    unsafe { rav1d::src::lib::dav1d_default_settings(settings_ptr) };
    let mut settings = unsafe { settings.assume_init() };
    settings.n_threads = 1;
    settings.max_frame_delay = 1;

    let mut ctx = None;
    let rc =
        unsafe { rav1d::src::lib::dav1d_open(NonNull::new(&mut ctx), NonNull::new(&mut settings)) };
    if rc.0 != 0 {
        return Err(rav1d_failed("open", rc.0));
    }

    // The context is closed below whatever the frame decode returns.
    let result = (|| {
        use rav1d::include::dav1d::data::Dav1dData;
        use rav1d::include::dav1d::picture::Dav1dPicture;

        let mut av1_data = Dav1dData::default();
        let buf_ptr = unsafe {
            rav1d::src::lib::dav1d_data_create(NonNull::new(&mut av1_data), av1_bytes.len())
        };
        if buf_ptr.is_null() {
            return Err(BackendError::Decode("rav1d data_create failed".into()));
        }
        unsafe { std::ptr::copy_nonoverlapping(av1_bytes.as_ptr(), buf_ptr, av1_bytes.len()) };

        let rc = unsafe { rav1d::src::lib::dav1d_send_data(ctx, NonNull::new(&mut av1_data)) };
        if rc.0 != 0 {
            unsafe { rav1d::src::lib::dav1d_data_unref(NonNull::new(&mut av1_data)) };
            return Err(rav1d_failed("send_data", rc.0));
        }

        let mut pic: Dav1dPicture = unsafe { std::mem::zeroed() };
        let rc = unsafe { rav1d::src::lib::dav1d_get_picture(ctx, NonNull::new(&mut pic)) };
        if rc.0 != 0 {
            return Err(rav1d_failed("get_picture", rc.0));
        }

        let image = picture_to_rgb(&pic);
        unsafe { rav1d::src::lib::dav1d_picture_unref(NonNull::new(&mut pic)) };
        image
    })();

    unsafe { rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx)) };
    result
}

fn picture_to_rgb(
    pic: &rav1d::include::dav1d::picture::Dav1dPicture,
) -> Result<DynamicImage, BackendError> {
    use rav1d::include::dav1d::headers::{
        DAV1D_PIXEL_LAYOUT_I400, DAV1D_PIXEL_LAYOUT_I420, DAV1D_PIXEL_LAYOUT_I422,
        DAV1D_PIXEL_LAYOUT_I444,
    };

    let plane = |i: usize| {
        pic.data[i]
            .map(|p| p.as_ptr() as *const u8)
            .ok_or_else(|| BackendError::Decode(format!("AVIF picture has no plane {i}")))
    };

    let width = pic.p.w as u32;
    let height = pic.p.h as u32;
    let layout = pic.p.layout;
    let y_ptr = plane(0)?;

    let (u_ptr, v_ptr, ss_x, ss_y, monochrome) = match layout {
        DAV1D_PIXEL_LAYOUT_I400 => (y_ptr, y_ptr, false, false, true),
        DAV1D_PIXEL_LAYOUT_I420 => (plane(1)?, plane(2)?, true, true, false),
        DAV1D_PIXEL_LAYOUT_I422 => (plane(1)?, plane(2)?, true, false, false),
        DAV1D_PIXEL_LAYOUT_I444 => (plane(1)?, plane(2)?, false, false, false),
        other => {
            return Err(BackendError::Decode(format!(
                "unsupported AVIF pixel layout: {other}"
            )));
        }
    };

    let rgb = YuvPlanes {
        y_ptr,
        u_ptr,
        v_ptr,
        y_stride: pic.stride[0],
        uv_stride: if monochrome { 0 } else { pic.stride[1] },
        width,
        height,
        bpc: pic.p.bpc as u32,
        ss_x,
        ss_y,
        monochrome,
    }
    .to_rgb();

    image::RgbImage::from_raw(width, height, rgb)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| BackendError::Decode("decoded AVIF buffer has the wrong size".into()))
}

/// Borrowed YUV planes of a decoded picture.
struct YuvPlanes {
    y_ptr: *const u8,
    u_ptr: *const u8,
    v_ptr: *const u8,
    y_stride: isize,
    uv_stride: isize,
    width: u32,
    height: u32,
    bpc: u32,
    /// Chroma subsampling, horizontal and vertical (I420 = both)
    ss_x: bool,
    ss_y: bool,
    monochrome: bool,
}

impl YuvPlanes {
    /// Interleaved RGB8 using BT.601 coefficients.
    fn to_rgb(&self) -> Vec<u8> {
        let max_val = ((1u32 << self.bpc) - 1) as f32;
        let center = (1u32 << (self.bpc - 1)) as f32;
        let scale = 255.0 / max_val;

        let mut rgb = vec![0u8; self.width as usize * self.height as usize * 3];

        for row in 0..self.height {
            for col in 0..self.width {
                let y = read_sample(self.y_ptr, self.y_stride, col, row, self.bpc);

                let (r, g, b) = if self.monochrome {
                    let v = (y * scale).clamp(0.0, 255.0);
                    (v, v, v)
                } else {
                    let cx = if self.ss_x { col / 2 } else { col };
                    let cy = if self.ss_y { row / 2 } else { row };
                    let cb = read_sample(self.u_ptr, self.uv_stride, cx, cy, self.bpc) - center;
                    let cr = read_sample(self.v_ptr, self.uv_stride, cx, cy, self.bpc) - center;
                    (
                        ((y + 1.402 * cr) * scale).clamp(0.0, 255.0),
                        ((y - 0.344136 * cb - 0.714136 * cr) * scale).clamp(0.0, 255.0),
                        ((y + 1.772 * cb) * scale).clamp(0.0, 255.0),
                    )
                };

                let idx = (row as usize * self.width as usize + col as usize) * 3;
                rgb[idx] = r as u8;
                rgb[idx + 1] = g as u8;
                rgb[idx + 2] = b as u8;
            }
        }

        rgb
    }
}

/// One sample from a plane. 10- and 12-bit samples are stored as u16.
#[inline]
fn read_sample(ptr: *const u8, stride: isize, x: u32, y: u32, bpc: u32) -> f32 {
    if bpc <= 8 {
        (unsafe { *ptr.offset(y as isize * stride + x as isize) }) as f32
    } else {
        let byte_offset = y as isize * stride + x as isize * 2;
        (unsafe { std::ptr::read_unaligned(ptr.offset(byte_offset) as *const u16) }) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::avif_bytes;
    use image::GenericImageView;

    #[test]
    fn sniffs_avif_brand() {
        assert!(is_avif(&avif_bytes(32, 32)));
        assert!(!is_avif(b"\xFF\xD8\xFF\xE0"));
        assert!(!is_avif(b""));
    }

    #[test]
    fn identify_reads_container_dimensions() {
        let dims = identify(&avif_bytes(120, 80)).unwrap();
        assert_eq!((dims.width, dims.height), (120, 80));
    }

    #[test]
    fn decode_returns_full_size_image() {
        let img = decode(&avif_bytes(64, 48)).unwrap();
        assert_eq!(img.dimensions(), (64, 48));
    }

    #[test]
    fn garbage_is_decode_error() {
        let mut data = avif_bytes(64, 48);
        data.truncate(40);
        assert!(matches!(decode(&data), Err(BackendError::Decode(_))));
    }
}
