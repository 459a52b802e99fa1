//! Metadata reconciliation.
//!
//! Turns the outcome of the imaging steps into a consistent asset record and
//! persists it with a single [`AssetStore::update`]. The record is computed
//! in memory first, so `ext`, `mime`, `name`, `url` and `hash` change
//! together or not at all.
//!
//! When the computed record equals the stored one, the store is not
//! written. Files on disk are outside this module.

use crate::imaging::{GeneratedVariant, ImageEncoding};
use crate::naming;
use crate::store::{AssetStore, StoreError};
use crate::types::{DerivedVariant, UploadedAsset};
use std::collections::BTreeMap;

/// The main file was rewritten in a new encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MainRewrite {
    pub encoding: ImageEncoding,
    /// Size of the written file in bytes.
    pub size: u64,
}

/// Everything the imaging steps changed about one asset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetChanges {
    pub main: Option<MainRewrite>,
    /// Replacement `formats` map. `None` leaves existing variants alone.
    pub formats: Option<BTreeMap<String, DerivedVariant>>,
    pub dimensions: Option<(u32, u32)>,
}

/// Outcome of [`persist`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub asset: UploadedAsset,
    /// Whether the store was written.
    pub written: bool,
}

/// Metadata for a generated responsive file living next to `main_url`.
pub fn variant_record(
    main_url: &str,
    generated: &GeneratedVariant,
    encoding: ImageEncoding,
) -> DerivedVariant {
    DerivedVariant {
        ext: format!(".{}", encoding.extension()),
        url: naming::sibling_url(main_url, &generated.file_name),
        hash: naming::file_stem(&generated.file_name).to_string(),
        mime: encoding.mime().to_string(),
        name: generated.file_name.clone(),
        path: None,
        size: generated.bytes,
        width: generated.width,
        height: Some(generated.height),
    }
}

/// Build the `formats` map for a set of generated variants.
pub fn variant_map(
    main_url: &str,
    generated: &[GeneratedVariant],
    encoding: ImageEncoding,
) -> BTreeMap<String, DerivedVariant> {
    generated
        .iter()
        .map(|g| (g.breakpoint.clone(), variant_record(main_url, g, encoding)))
        .collect()
}

/// Apply `changes` to a copy of `asset`. Pure; touches no storage.
///
/// A main-file rewrite substitutes the suffix of `name`, `url` and `hash` in
/// one go and sets `ext` and `mime` from the same encoding.
pub fn renamed_record(asset: &UploadedAsset, changes: &AssetChanges) -> UploadedAsset {
    let mut next = asset.clone();

    if let Some(main) = changes.main {
        let ext = main.encoding.extension();
        next.name = naming::replace_extension(&asset.name, ext);
        next.url = naming::replace_extension(&asset.url, ext);
        next.hash = naming::replace_existing_extension(&asset.hash, ext);
        next.ext = format!(".{ext}");
        next.mime = main.encoding.mime().to_string();
        next.size = main.size;
    }

    if let Some(formats) = &changes.formats {
        next.formats = formats.clone();
    }

    if let Some((width, height)) = changes.dimensions {
        next.width = Some(width);
        next.height = Some(height);
    }

    next
}

/// Write `next` in place of `original` with one update, unless the two are
/// equal. Re-running the pipeline on a finished asset therefore leaves the
/// store alone, even though its variant files are encoded again.
pub fn persist<S: AssetStore + ?Sized>(
    store: &S,
    original: &UploadedAsset,
    next: UploadedAsset,
) -> Result<Reconciled, StoreError> {
    if next == *original {
        tracing::debug!(id = original.id, name = %original.name, "metadata unchanged; skipping write");
        return Ok(Reconciled {
            asset: next,
            written: false,
        });
    }
    store.update(&next)?;
    tracing::debug!(id = next.id, url = %next.url, mime = %next.mime, "metadata reconciled");
    Ok(Reconciled {
        asset: next,
        written: true,
    })
}
