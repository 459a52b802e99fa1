//! Asset records shared by the pipeline, the store, and the CLI.
//!
//! Field names follow the media-library JSON layout, so records written by
//! [`JsonAssetStore`](crate::store::JsonAssetStore) can be read by tools that
//! already understand that format.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An uploaded file as tracked by the media library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedAsset {
    pub id: u64,
    /// Display filename, e.g. `photo.jpg`.
    pub name: String,
    pub mime: String,
    /// Extension with the leading dot, e.g. `.jpg`.
    pub ext: String,
    /// Stored file stem, e.g. `photo_3fa9c01b2e`.
    pub hash: String,
    /// Public URL, e.g. `/uploads/photo_3fa9c01b2e.jpg`.
    pub url: String,
    /// Size of the main file in bytes.
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Responsive variants keyed by breakpoint name.
    #[serde(default)]
    pub formats: BTreeMap<String, DerivedVariant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<u64>,
    #[serde(default = "root_folder_path")]
    pub folder_path: String,
}

fn root_folder_path() -> String {
    "/".to_string()
}

impl UploadedAsset {
    /// The part of an `image/*` MIME type after the slash, lowercased.
    /// `None` for everything else, which passes through the pipeline
    /// untouched.
    pub fn mime_subtype(&self) -> Option<String> {
        let (kind, subtype) = self.mime.split_once('/')?;
        if !kind.trim().eq_ignore_ascii_case("image") {
            return None;
        }
        let subtype = subtype.split(';').next().unwrap_or(subtype).trim();
        if subtype.is_empty() {
            return None;
        }
        Some(subtype.to_ascii_lowercase())
    }
}

/// A resized rendition of an image asset. Owned by its parent's `formats` map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedVariant {
    pub ext: String,
    pub url: String,
    pub hash: String,
    pub mime: String,
    pub name: String,
    /// Always `None`; present for record compatibility.
    pub path: Option<String>,
    pub size: u64,
    pub width: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Media-library folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: u64,
    pub name: String,
    /// Numeric path component, unique across folders.
    pub path_id: u64,
    /// Folder path, e.g. `/uploads-api`.
    pub path: String,
}
