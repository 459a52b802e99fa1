//! Image processing on pure-Rust codecs.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader::into_dimensions`; AVIF container metadata |
//! | **Transcode** | decode + `write_with_encoder` per [`ImageEncoding`] |
//! | **Responsive variant** | Lanczos3 scale or `resize_to_fill` cover crop, then encode |
//!
//! The module is split into:
//! - **Format**: [`ImageEncoding`] and MIME/extension lookups
//! - **Calculations**: Pure functions for breakpoint planning (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

mod avif;
pub mod backend;
pub mod calculations;
pub mod format;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, EncodedOutput, ImageBackend};
pub use format::{ImageEncoding, mime_for_extension};
pub use operations::{
    GeneratedVariant, ResponsiveConfig, create_responsive_images, get_dimensions,
    transcode_image,
};
pub use params::{
    AvifSettings, Breakpoint, EncodeSettings, GifSettings, JpegSettings, PngSettings, Quality,
    ResizeSpec, TranscodeParams, WebpSettings,
};
pub use rust_backend::RustBackend;
