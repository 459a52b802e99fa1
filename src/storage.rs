//! Local object storage for uploaded files.
//!
//! Public URLs map onto a directory tree under the public root:
//!
//! ```text
//! /uploads/photo_3fa9c01b2e.webp   ⇄   <public>/uploads/photo_3fa9c01b2e.webp
//! ```
//!
//! URLs that would escape the public root (`..`, absolute schemes) are
//! rejected rather than normalized.

use crate::imaging::ImageEncoding;
use crate::naming;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// URL prefix under which uploads are served.
pub const UPLOADS_PREFIX: &str = "/uploads";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("URL is not a local upload: {0}")]
    NotLocal(String),
    #[error("path is outside the public directory: {0}")]
    OutsideRoot(PathBuf),
    #[error("no free file name for upload {0}")]
    NoFreeName(String),
}

impl StorageError {
    /// The underlying IO error, if any.
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            StorageError::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// A completed file move, kept so it can be undone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMove {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// A file written by [`LocalStorage::store_upload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub path: PathBuf,
    pub url: String,
    /// Content-addressed stem, e.g. `photo_3fa9c01b2e`.
    pub hash: String,
    pub size: u64,
}

/// Filesystem-backed storage rooted at the public directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    public_dir: PathBuf,
}

impl LocalStorage {
    pub fn new(public_dir: impl Into<PathBuf>) -> Self {
        Self {
            public_dir: public_dir.into(),
        }
    }

    pub fn public_dir(&self) -> &Path {
        &self.public_dir
    }

    /// Directory that plain uploads are written to.
    pub fn uploads_dir(&self) -> PathBuf {
        self.public_dir.join(UPLOADS_PREFIX.trim_start_matches('/'))
    }

    /// Filesystem path for a public URL.
    pub fn path_for_url(&self, url: &str) -> Result<PathBuf, StorageError> {
        if url.contains("://") || url.contains('\\') {
            return Err(StorageError::NotLocal(url.to_string()));
        }
        let relative = Path::new(url.trim_start_matches('/'));
        let mut path = self.public_dir.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                _ => return Err(StorageError::NotLocal(url.to_string())),
            }
        }
        if path == self.public_dir {
            return Err(StorageError::NotLocal(url.to_string()));
        }
        Ok(path)
    }

    /// Public URL for a path under the public directory.
    pub fn url_for_path(&self, path: &Path) -> Result<String, StorageError> {
        let relative = path
            .strip_prefix(&self.public_dir)
            .map_err(|_| StorageError::OutsideRoot(path.to_path_buf()))?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Ok(format!("/{}", parts.join("/")))
    }

    /// Move a file, creating the destination directory as needed.
    ///
    /// Falls back to copy + remove when a plain rename fails (for example
    /// across filesystems).
    pub fn move_file(&self, from: &Path, to: &Path) -> Result<FileMove, StorageError> {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        if fs::rename(from, to).is_err() {
            fs::copy(from, to)?;
            fs::remove_file(from)?;
        }
        Ok(FileMove {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        })
    }

    /// Undo completed moves, newest first. Failures are logged and skipped so
    /// one stuck file doesn't strand the rest.
    pub fn rollback(&self, moves: &[FileMove]) {
        for m in moves.iter().rev() {
            if let Err(e) = fs::rename(&m.to, &m.from) {
                tracing::warn!(
                    from = %m.to.display(),
                    to = %m.from.display(),
                    error = %e,
                    "failed to roll back file move"
                );
            }
        }
    }

    /// Write an incoming upload under a name derived from its content.
    ///
    /// Every call gets a file of its own. When the name is taken, because the
    /// same bytes were uploaded before, a counter is appended:
    /// `photo_3fa9c01b2e_2.jpg`. A stem also counts as taken while a file in
    /// any writable encoding carries it, since processing writes converted
    /// files and variants next to the upload under the same stem.
    pub fn store_upload(&self, original_name: &str, bytes: &[u8]) -> Result<StoredFile, StorageError> {
        let base = naming::content_addressed_stem(original_name, bytes);
        let ext = naming::extension_of(original_name);
        let dir = self.uploads_dir();
        fs::create_dir_all(&dir)?;

        for n in 1..=MAX_NAME_ATTEMPTS {
            let stem = if n == 1 {
                base.clone()
            } else {
                format!("{base}_{n}")
            };
            if stem_in_use(&dir, &stem) {
                continue;
            }
            let file_name = match &ext {
                Some(ext) => format!("{stem}.{ext}"),
                None => stem.clone(),
            };
            let path = dir.join(&file_name);
            // create_new makes claiming the name atomic between concurrent uploads
            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };
            if let Err(e) = file.write_all(bytes) {
                drop(file);
                let _ = fs::remove_file(&path);
                return Err(e.into());
            }
            return Ok(StoredFile {
                url: format!("{UPLOADS_PREFIX}/{file_name}"),
                path,
                hash: stem,
                size: bytes.len() as u64,
            });
        }
        Err(StorageError::NoFreeName(base))
    }
}

/// Counter suffixes tried before an upload name is given up on.
const MAX_NAME_ATTEMPTS: u32 = 1000;

fn stem_in_use(dir: &Path, stem: &str) -> bool {
    ImageEncoding::ALL
        .iter()
        .flat_map(|enc| enc.extensions())
        .any(|ext| dir.join(format!("{stem}.{ext}")).exists())
}
