//! The upload pipeline.
//!
//! One entry point serves both upload paths. Each asset moves through:
//!
//! ```text
//! Uploaded → PolicyResolved → Transcoded | TranscodeSkipped
//!          → ResponsiveBuilt | ResponsiveSkipped → Reconciled
//! ```
//!
//! or stops with a [`PipelineError`] naming the [`Stage`] that failed.
//!
//! ## Steps
//!
//! 1. Non-image MIME types pass through untouched.
//! 2. Resolve the [`FormatPolicy`] from the exceptions table.
//! 3. Identify the source (this is where corrupt files are caught).
//! 4. Transcode the main file to the canonical encoding, unless the policy
//!    skips it or the source is already canonical.
//! 5. Build the responsive set from the original source, in the original
//!    encoding when the policy keeps it, otherwise in the canonical one.
//! 6. Reconcile: one store update, or none if nothing changed.
//!
//! Uploads that come in through the content API are additionally moved into
//! `uploads/<api_folder>/` before the record is written, so they also cost a
//! single update.
//!
//! ## Parallel Processing
//!
//! Assets are independent. [`UploadPipeline::process_batch`] fans them out
//! over the current [rayon](https://docs.rs/rayon) pool; breakpoints within
//! one asset are always processed sequentially.

use crate::config::UploadConfig;
use crate::imaging::{
    BackendError, ImageBackend, ImageEncoding, ResponsiveConfig, create_responsive_images,
    get_dimensions, mime_for_extension, transcode_image,
};
use crate::naming;
use crate::policy::FormatPolicy;
use crate::reconcile::{self, AssetChanges, MainRewrite};
use crate::storage::{FileMove, LocalStorage, StorageError};
use crate::store::{AssetStore, StoreError};
use crate::types::UploadedAsset;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use thiserror::Error;

/// Where an upload came from. API uploads are relocated into their own folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOrigin {
    Admin,
    Api,
}

/// Pipeline step, recorded in errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ingest,
    Identify,
    Transcode,
    Responsive,
    Reconcile,
    Relocate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Ingest => "ingest",
            Stage::Identify => "identify",
            Stage::Transcode => "transcode",
            Stage::Responsive => "responsive",
            Stage::Reconcile => "reconcile",
            Stage::Relocate => "relocate",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum PipelineErrorKind {
    /// Unreadable, corrupt or truncated source.
    #[error("decode error: {0}")]
    Decode(String),
    /// Unsupported target encoding or encoder failure.
    #[error("encode error: {0}")]
    Encode(String),
    /// Metadata write failed. Files written before it stay on disk.
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    /// Upload body over `processing.max_upload_bytes`.
    #[error("upload exceeds the {limit}-byte limit")]
    TooLarge { limit: u64 },
}

impl From<BackendError> for PipelineErrorKind {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Io(e) => PipelineErrorKind::Io(e),
            BackendError::Decode(msg) => PipelineErrorKind::Decode(msg),
            BackendError::Encode(msg) => PipelineErrorKind::Encode(msg),
        }
    }
}

/// A failed upload, with enough context to log which asset and which step.
#[derive(Error, Debug)]
#[error("{asset}: {stage} failed: {kind}")]
pub struct PipelineError {
    /// Display name of the asset.
    pub asset: String,
    pub stage: Stage,
    #[source]
    pub kind: PipelineErrorKind,
}

impl PipelineError {
    pub fn new(asset: &str, stage: Stage, kind: impl Into<PipelineErrorKind>) -> Self {
        Self {
            asset: asset.to_string(),
            stage,
            kind: kind.into(),
        }
    }

    fn io_error(&self) -> Option<&io::Error> {
        match &self.kind {
            PipelineErrorKind::Io(e) => Some(e),
            PipelineErrorKind::Storage(e) => e.io_error(),
            PipelineErrorKind::Persistence(StoreError::Io(e)) => Some(e),
            _ => None,
        }
    }

    /// True when the error is the client going away mid-upload rather than a
    /// genuine failure.
    pub fn is_client_disconnect(&self) -> bool {
        self.io_error().is_some_and(|e| {
            matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            )
        })
    }

    /// Log at `debug` for client disconnects and at `error` for everything else.
    pub fn log(&self) {
        if self.is_client_disconnect() {
            tracing::debug!(asset = %self.asset, stage = %self.stage, "client disconnected: {}", self.kind);
        } else {
            tracing::error!(asset = %self.asset, stage = %self.stage, "{}", self.kind);
        }
    }
}

/// What happened to one asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub asset: UploadedAsset,
    pub policy: FormatPolicy,
    /// Encoding the main file was converted to, if it was.
    pub transcoded: Option<ImageEncoding>,
    /// Breakpoint names generated, in configured order.
    pub variants: Vec<String>,
    /// Whether the store was written.
    pub written: bool,
}

impl UploadOutcome {
    fn untouched(asset: UploadedAsset, policy: FormatPolicy) -> Self {
        Self {
            asset,
            policy,
            transcoded: None,
            variants: Vec::new(),
            written: false,
        }
    }
}

/// Upload pipeline bound to one configuration, backend, store and storage.
///
/// Configuration is fixed at construction; nothing is read from global state.
pub struct UploadPipeline<B: ImageBackend, S: AssetStore> {
    config: UploadConfig,
    backend: B,
    store: S,
    storage: LocalStorage,
}

impl<B: ImageBackend, S: AssetStore> UploadPipeline<B, S> {
    pub fn new(config: UploadConfig, backend: B, store: S, storage: LocalStorage) -> Self {
        Self {
            config,
            backend,
            store,
            storage,
        }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    // =========================================================================
    // Ingest
    // =========================================================================

    /// Copy a file from disk into storage and create its asset record.
    pub fn ingest_file(&self, path: &Path) -> Result<UploadedAsset, PipelineError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let file = File::open(path).map_err(|e| PipelineError::new(&name, Stage::Ingest, e))?;
        self.ingest_reader(&name, file)
    }

    /// Store an incoming upload stream under a content-derived name and
    /// create its asset record. The record is unprocessed.
    ///
    /// At most `processing.max_upload_bytes` are buffered; a longer body is
    /// rejected without storing anything.
    pub fn ingest_reader(
        &self,
        name: &str,
        reader: impl Read,
    ) -> Result<UploadedAsset, PipelineError> {
        let fail = |kind: PipelineErrorKind| PipelineError::new(name, Stage::Ingest, kind);

        let limit = self.config.processing.max_upload_bytes;
        let mut bytes = Vec::new();
        reader
            .take(limit.saturating_add(1))
            .read_to_end(&mut bytes)
            .map_err(|e| fail(e.into()))?;
        if bytes.len() as u64 > limit {
            return Err(fail(PipelineErrorKind::TooLarge { limit }));
        }
        let stored = self
            .storage
            .store_upload(name, &bytes)
            .map_err(|e| fail(e.into()))?;
        drop(bytes);

        let ext = naming::extension_of(name)
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let asset = UploadedAsset {
            id: 0,
            name: name.to_string(),
            mime: mime_for_extension(&ext).to_string(),
            ext,
            hash: stored.hash,
            url: stored.url,
            size: stored.size,
            width: None,
            height: None,
            formats: BTreeMap::new(),
            folder: None,
            folder_path: "/".to_string(),
        };
        let asset = self.store.insert(asset).map_err(|e| fail(e.into()))?;
        tracing::debug!(id = asset.id, url = %asset.url, "stored upload");
        Ok(asset)
    }

    // =========================================================================
    // Processing
    // =========================================================================

    /// Process one asset uploaded through the admin path.
    pub fn process_upload(&self, asset: UploadedAsset) -> Result<UploadedAsset, PipelineError> {
        self.process(asset, UploadOrigin::Admin).map(|o| o.asset)
    }

    /// Process one asset uploaded through the content API, moving its files
    /// into the API folder.
    pub fn process_api_upload(&self, asset: UploadedAsset) -> Result<UploadedAsset, PipelineError> {
        self.process(asset, UploadOrigin::Api).map(|o| o.asset)
    }

    /// Upload hook: process newly stored assets in order and hand them back
    /// with their metadata updated. Stops at the first failure.
    pub fn process_uploads(
        &self,
        files: Vec<UploadedAsset>,
    ) -> Result<Vec<UploadedAsset>, PipelineError> {
        files
            .into_iter()
            .map(|asset| self.process_upload(asset))
            .collect()
    }

    /// Process independent assets in parallel. One result per asset, in input
    /// order; a failure does not stop the others.
    pub fn process_batch(
        &self,
        files: Vec<UploadedAsset>,
        origin: UploadOrigin,
    ) -> Vec<Result<UploadOutcome, PipelineError>> {
        files
            .into_par_iter()
            .map(|asset| self.process(asset, origin))
            .collect()
    }

    /// Load a stored asset by id and run it through the pipeline again.
    pub fn reprocess(&self, id: u64) -> Result<UploadOutcome, PipelineError> {
        let label = format!("asset {id}");
        let asset = self
            .store
            .get(id)
            .map_err(|e| PipelineError::new(&label, Stage::Ingest, e))?
            .ok_or_else(|| PipelineError::new(&label, Stage::Ingest, StoreError::NotFound(id)))?;
        self.process(asset, UploadOrigin::Admin)
    }

    /// Run every step for one asset.
    pub fn process(
        &self,
        asset: UploadedAsset,
        origin: UploadOrigin,
    ) -> Result<UploadOutcome, PipelineError> {
        let span = tracing::info_span!("upload", id = asset.id, name = %asset.name);
        let _enter = span.enter();

        let (next, mut outcome) = self.prepare(&asset)?;

        let mut moves = Vec::new();
        let next = match origin {
            UploadOrigin::Admin => next,
            UploadOrigin::Api => self.relocate(next, &mut moves).inspect_err(|_| {
                self.storage.rollback(&moves);
            })?,
        };

        let reconciled = reconcile::persist(&self.store, &asset, next).map_err(|e| {
            self.storage.rollback(&moves);
            PipelineError::new(&asset.name, Stage::Reconcile, e)
        })?;

        outcome.asset = reconciled.asset;
        outcome.written = reconciled.written;
        if outcome.written {
            let settings = outcome
                .transcoded
                .map(|enc| self.config.encode_settings(enc).describe())
                .unwrap_or_default();
            tracing::info!(
                url = %outcome.asset.url,
                format = %outcome.asset.mime,
                settings = %settings,
                variants = outcome.variants.len(),
                "processed"
            );
        }
        Ok(outcome)
    }

    /// Run the imaging steps and compute the new record without persisting it.
    fn prepare(
        &self,
        asset: &UploadedAsset,
    ) -> Result<(UploadedAsset, UploadOutcome), PipelineError> {
        let fail = |stage: Stage, kind: PipelineErrorKind| PipelineError::new(&asset.name, stage, kind);

        let Some(subtype) = asset.mime_subtype() else {
            tracing::debug!(mime = %asset.mime, "not an image; passing through");
            return Ok((
                asset.clone(),
                UploadOutcome::untouched(asset.clone(), FormatPolicy::default()),
            ));
        };

        let policy = FormatPolicy::resolve(&subtype, &self.config.exceptions);
        let original = ImageEncoding::from_subtype(&subtype);
        let canonical = self.config.output_format;
        let transcode = !policy.skip_transcode && original != Some(canonical);
        let responsive = !policy.skip_responsive && self.config.responsive_formats;
        tracing::debug!(?policy, transcode, responsive, "policy resolved");

        if !transcode && !responsive {
            return Ok((asset.clone(), UploadOutcome::untouched(asset.clone(), policy)));
        }

        let source = self
            .storage
            .path_for_url(&asset.url)
            .map_err(|e| fail(Stage::Identify, e.into()))?;
        let dims = get_dimensions(&self.backend, &source)
            .map_err(|e| fail(Stage::Identify, e.into()))?;

        let mut changes = AssetChanges {
            dimensions: Some(dims),
            ..AssetChanges::default()
        };
        let mut outcome = UploadOutcome::untouched(asset.clone(), policy);

        if transcode {
            let output = source.with_extension(canonical.extension());
            let encoded = transcode_image(
                &self.backend,
                &source,
                &output,
                self.config.encode_settings(canonical),
            )
            .map_err(|e| fail(Stage::Transcode, e.into()))?;
            changes.main = Some(MainRewrite {
                encoding: canonical,
                size: encoded.bytes,
            });
            outcome.transcoded = Some(canonical);
        }

        if responsive {
            let encoding = if policy.responsive_keeps_original_format {
                original.ok_or_else(|| {
                    fail(
                        Stage::Responsive,
                        PipelineErrorKind::Encode(format!("no encoder for image/{subtype}")),
                    )
                })?
            } else {
                canonical
            };
            let output_dir = source.parent().unwrap_or(self.storage.public_dir());
            let config = ResponsiveConfig {
                breakpoints: self.config.breakpoints.clone(),
                settings: self.config.encode_settings(encoding),
                extension: encoding.extension().to_string(),
            };
            let generated = create_responsive_images(
                &self.backend,
                &source,
                output_dir,
                naming::file_stem(&asset.url),
                dims,
                &config,
            )
            .map_err(|e| fail(Stage::Responsive, e.into()))?;

            outcome.variants = generated.iter().map(|g| g.breakpoint.clone()).collect();
            changes.formats = Some(reconcile::variant_map(&asset.url, &generated, encoding));
        }

        Ok((reconcile::renamed_record(asset, &changes), outcome))
    }

    // =========================================================================
    // API folder relocation
    // =========================================================================

    /// Move the main file and every variant into `uploads/<api_folder>/` and
    /// point the record at the API folder. Completed moves are appended to
    /// `moves` so the caller can undo them.
    fn relocate(
        &self,
        mut asset: UploadedAsset,
        moves: &mut Vec<FileMove>,
    ) -> Result<UploadedAsset, PipelineError> {
        let fail = |kind: PipelineErrorKind| PipelineError::new(&asset.name, Stage::Relocate, kind);
        let folder_name = self.config.api_folder_name();
        let dest_dir = self.storage.uploads_dir().join(folder_name);

        let url = self
            .move_into(&asset.url, &dest_dir, moves)
            .map_err(|e| fail(e.into()))?;
        let mut formats = asset.formats.clone();
        for variant in formats.values_mut() {
            variant.url = self
                .move_into(&variant.url, &dest_dir, moves)
                .map_err(|e| fail(e.into()))?;
        }
        let folder = self
            .store
            .ensure_folder(folder_name)
            .map_err(|e| fail(e.into()))?;

        asset.url = url;
        asset.formats = formats;
        asset.folder = Some(folder.id);
        asset.folder_path = folder.path;
        Ok(asset)
    }

    /// Move the file behind `url` into `dest_dir` and return its new URL.
    /// A file that is already gone keeps its URL.
    fn move_into(
        &self,
        url: &str,
        dest_dir: &Path,
        moves: &mut Vec<FileMove>,
    ) -> Result<String, StorageError> {
        let from = self.storage.path_for_url(url)?;
        if !from.is_file() {
            tracing::warn!(url, "file missing; leaving URL unchanged");
            return Ok(url.to_string());
        }
        let to = dest_dir.join(naming::file_name(url));
        if from == to {
            return Ok(url.to_string());
        }
        moves.push(self.storage.move_file(&from, &to)?);
        self.storage.url_for_path(&to)
    }
}
