//! Filename and URL manipulation for stored uploads.
//!
//! Every asset has three strings that must agree on the file suffix: the
//! display `name`, the public `url`, and the stored `hash`. The helpers here
//! operate on the last path segment only, so directory components that happen
//! to contain dots (`/uploads/v1.2/photo.jpg`) are never touched.
//!
//! Stored uploads get content-addressed names:
//! - `My Holiday.JPG` with bytes hashing to `3fa9c01b2e…` → `My_Holiday_3fa9c01b2e.jpg`

use sha2::{Digest, Sha256};

/// Number of hex characters of the SHA-256 digest kept in stored names.
pub const CONTENT_HASH_LEN: usize = 10;

/// Split `value` into (everything up to and including the last `/`, last segment).
fn split_last_segment(value: &str) -> (&str, &str) {
    match value.rfind('/') {
        Some(pos) => value.split_at(pos + 1),
        None => ("", value),
    }
}

/// Byte index of the extension dot within a segment, ignoring dotfiles.
fn extension_dot(segment: &str) -> Option<usize> {
    segment.rfind('.').filter(|&pos| pos > 0)
}

/// Replace the extension of the last path segment, appending one if missing.
///
/// `new_ext` may be given with or without the leading dot.
///
/// - `photo.jpg` + `webp` → `photo.webp`
/// - `/uploads/a.b/photo.jpg` + `.webp` → `/uploads/a.b/photo.webp`
/// - `README` + `txt` → `README.txt`
pub fn replace_extension(value: &str, new_ext: &str) -> String {
    let new_ext = new_ext.trim_start_matches('.');
    let (dir, segment) = split_last_segment(value);
    let stem = match extension_dot(segment) {
        Some(pos) => &segment[..pos],
        None => segment,
    };
    format!("{dir}{stem}.{new_ext}")
}

/// Replace the extension of the last path segment only if it has one.
///
/// Used for stored hashes, which are normally bare stems and stay unchanged.
pub fn replace_existing_extension(value: &str, new_ext: &str) -> String {
    let (_, segment) = split_last_segment(value);
    if extension_dot(segment).is_some() {
        replace_extension(value, new_ext)
    } else {
        value.to_string()
    }
}

/// Extension of the last path segment, lowercased, without the dot.
pub fn extension_of(value: &str) -> Option<String> {
    let (_, segment) = split_last_segment(value);
    extension_dot(segment).map(|pos| segment[pos + 1..].to_ascii_lowercase())
}

/// Last path segment without its extension.
///
/// - `/uploads/photo_3fa9c01b2e.webp` → `photo_3fa9c01b2e`
pub fn file_stem(value: &str) -> &str {
    let (_, segment) = split_last_segment(value);
    match extension_dot(segment) {
        Some(pos) => &segment[..pos],
        None => segment,
    }
}

/// Last path segment of a URL or path.
pub fn file_name(value: &str) -> &str {
    split_last_segment(value).1
}

/// URL of a file living next to `url`.
///
/// - `/uploads/photo.webp` + `photo-small.webp` → `/uploads/photo-small.webp`
pub fn sibling_url(url: &str, file_name: &str) -> String {
    let (dir, _) = split_last_segment(url);
    format!("{dir}{file_name}")
}

/// Reduce a file stem to characters that are safe in URLs and on every
/// filesystem: ASCII alphanumerics, `-` and `_`. Runs of anything else
/// collapse to one `_`.
pub fn sanitize_stem(stem: &str) -> String {
    let mut out = String::with_capacity(stem.len());
    let mut last_was_sep = false;
    for c in stem.chars() {
        if c.is_ascii_alphanumeric() || c == '-' {
            out.push(c);
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

/// First [`CONTENT_HASH_LEN`] hex characters of the SHA-256 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut hex = format!("{:x}", digest);
    hex.truncate(CONTENT_HASH_LEN);
    hex
}

/// Stored stem for an upload: `<sanitized stem>_<content hash>`.
pub fn content_addressed_stem(original_name: &str, bytes: &[u8]) -> String {
    format!(
        "{}_{}",
        sanitize_stem(file_stem(original_name)),
        content_hash(bytes)
    )
}
