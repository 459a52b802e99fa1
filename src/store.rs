//! Durable asset metadata.
//!
//! [`AssetStore`] is the only seam through which the pipeline persists
//! anything. [`JsonAssetStore`] keeps every record in one JSON file:
//!
//! ```json
//! {
//!   "assets": [ { "id": 1, "name": "photo.webp", "url": "/uploads/photo_3fa9c01b2e.webp", ... } ],
//!   "folders": [ { "id": 1, "name": "uploads-api", "pathId": 1, "path": "/uploads-api" } ]
//! }
//! ```
//!
//! The file is rewritten through a temp file and rename on every mutation,
//! so a crash mid-write leaves the previous contents intact.

use crate::types::{Folder, UploadedAsset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("asset {0} not found")]
    NotFound(u64),
    #[error("store lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Persistence for asset records and media-library folders.
pub trait AssetStore: Send + Sync {
    /// Store a new record. The store assigns the id; the `id` field of the
    /// argument is ignored.
    fn insert(&self, asset: UploadedAsset) -> Result<UploadedAsset>;

    fn get(&self, id: u64) -> Result<Option<UploadedAsset>>;

    /// Replace an existing record in one write.
    fn update(&self, asset: &UploadedAsset) -> Result<()>;

    /// All records, ordered by id.
    fn list(&self) -> Result<Vec<UploadedAsset>>;

    /// Find the folder called `name`, creating it when missing.
    fn ensure_folder(&self, name: &str) -> Result<Folder>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    assets: Vec<UploadedAsset>,
    #[serde(default)]
    folders: Vec<Folder>,
}

#[derive(Debug, Default)]
struct StoreState {
    assets: BTreeMap<u64, UploadedAsset>,
    folders: Vec<Folder>,
}

impl StoreState {
    fn from_data(data: StoreData) -> Self {
        Self {
            assets: data.assets.into_iter().map(|a| (a.id, a)).collect(),
            folders: data.folders,
        }
    }

    fn to_data(&self) -> StoreData {
        StoreData {
            assets: self.assets.values().cloned().collect(),
            folders: self.folders.clone(),
        }
    }

    fn next_asset_id(&self) -> u64 {
        self.assets.keys().next_back().map_or(1, |id| id + 1)
    }

    /// New folder record: next free id and `path_id = max + 1`.
    fn new_folder(&self, name: &str) -> Folder {
        let id = self.folders.iter().map(|f| f.id).max().unwrap_or(0) + 1;
        let path_id = self.folders.iter().map(|f| f.path_id).max().unwrap_or(0) + 1;
        Folder {
            id,
            name: name.to_string(),
            path_id,
            path: format!("/{name}"),
        }
    }
}

/// Asset store backed by a single JSON file.
#[derive(Debug)]
pub struct JsonAssetStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl JsonAssetStore {
    /// Open the store at `path`. A missing file is an empty store; it is
    /// created on the first write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let data: StoreData = serde_json::from_str(&content)?;
            StoreState::from_data(data)
        } else {
            StoreState::default()
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }

    fn persist(&self, state: &StoreState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&state.to_data())?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl AssetStore for JsonAssetStore {
    fn insert(&self, mut asset: UploadedAsset) -> Result<UploadedAsset> {
        let mut state = self.lock()?;
        asset.id = state.next_asset_id();
        state.assets.insert(asset.id, asset.clone());
        if let Err(e) = self.persist(&state) {
            state.assets.remove(&asset.id);
            return Err(e);
        }
        tracing::debug!(id = asset.id, url = %asset.url, "inserted asset");
        Ok(asset)
    }

    fn get(&self, id: u64) -> Result<Option<UploadedAsset>> {
        Ok(self.lock()?.assets.get(&id).cloned())
    }

    fn update(&self, asset: &UploadedAsset) -> Result<()> {
        let mut state = self.lock()?;
        let Some(previous) = state.assets.insert(asset.id, asset.clone()) else {
            state.assets.remove(&asset.id);
            return Err(StoreError::NotFound(asset.id));
        };
        if let Err(e) = self.persist(&state) {
            state.assets.insert(asset.id, previous);
            return Err(e);
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<UploadedAsset>> {
        Ok(self.lock()?.assets.values().cloned().collect())
    }

    fn ensure_folder(&self, name: &str) -> Result<Folder> {
        let mut state = self.lock()?;
        if let Some(folder) = state.folders.iter().find(|f| f.name == name) {
            return Ok(folder.clone());
        }
        let folder = state.new_folder(name);
        state.folders.push(folder.clone());
        if let Err(e) = self.persist(&state) {
            state.folders.pop();
            return Err(e);
        }
        tracing::info!(name, path_id = folder.path_id, "created media folder");
        Ok(folder)
    }
}
