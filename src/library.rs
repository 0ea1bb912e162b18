//! Write path: create, update and delete assets.
//!
//! Every mutation follows the same order:
//!
//! 1. regenerate derived variants (create, or update with a new orientation),
//! 2. write the record store,
//! 3. rebuild the metadata cache, which also sets the dirty flag.
//!
//! Regeneration is synchronous, so a create or update returns only once both
//! variants exist on disk.

use crate::cache::{CacheSnapshot, MetadataCache};
use crate::pipeline::{ArtifactPipeline, PipelineError};
use crate::store::{AssetRecord, Orientation, RecordEdits, StoreError, PRIMARY_EXTENSION};
use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced to the caller of a write operation.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// An asset with that name is already present locally.
    #[error("asset already exists: {0}")]
    AlreadyExists(String),

    /// No record with that name exists.
    #[error("asset not found: {0}")]
    NotFound(String),

    /// The given source file name is not a usable asset name.
    #[error("invalid asset file {path}: {reason}")]
    InvalidName { path: PathBuf, reason: String },

    /// Variant regeneration failed.
    #[error("failed to generate variants for {name}: {source}")]
    Pipeline {
        name: String,
        #[source]
        source: PipelineError,
    },

    /// The record store rejected the write.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Copying or removing asset files failed.
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result alias for library operations.
pub type LibraryResult<T> = Result<T, LibraryError>;

/// Coordinates the record store, the artifact pipeline and the cache.
pub struct Library {
    images_dir: PathBuf,
    pipeline: ArtifactPipeline,
    cache: Arc<MetadataCache>,
}

impl Library {
    #[must_use]
    pub fn new(images_dir: impl Into<PathBuf>, pipeline: ArtifactPipeline, cache: Arc<MetadataCache>) -> Self {
        Self {
            images_dir: images_dir.into(),
            pipeline,
            cache,
        }
    }

    #[must_use]
    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<MetadataCache> {
        &self.cache
    }

    /// Shortcut for [`MetadataCache::snapshot_for_read`].
    #[must_use]
    pub fn snapshot(&self) -> Arc<CacheSnapshot> {
        self.cache.snapshot_for_read()
    }

    /// Add `source` as a new primary asset.
    ///
    /// The file is copied into the images directory under its own file name.
    /// If variant generation fails the copy is removed and no record is written.
    pub fn create(&self, source: &Path, orientation: Orientation) -> LibraryResult<AssetRecord> {
        let name = asset_name(source)?;
        let dest = self.images_dir.join(&name);
        // A record without its primary file still owns its variants.
        if dest.exists() || self.cache.store().find(&name)?.is_some() {
            return Err(LibraryError::AlreadyExists(name));
        }

        fs::copy(source, &dest).map_err(|source| LibraryError::Io {
            path: dest.clone(),
            source,
        })?;

        let mut record = AssetRecord::new(&name, orientation);
        if let Err(source) = self.pipeline.regenerate_into(&mut record, &self.images_dir) {
            self.discard_files(&name);
            return Err(LibraryError::Pipeline { name, source });
        }

        if let Err(e) = self.cache.store().create(&record) {
            if !matches!(e, StoreError::AlreadyExists(_)) {
                self.discard_files(&name);
            }
            return Err(e.into());
        }
        log::info!(
            "Added {} (small {}, medium {})",
            record.name,
            record.small,
            record.medium
        );

        self.cache.rebuild();
        Ok(record)
    }

    /// Apply user edits to an existing asset.
    ///
    /// Variants are regenerated only when the orientation changes.
    pub fn update(&self, name: &str, edits: &RecordEdits) -> LibraryResult<AssetRecord> {
        let store = self.cache.store();
        let mut record = store
            .find(name)?
            .ok_or_else(|| LibraryError::NotFound(name.to_string()))?;

        if record.apply(edits) {
            log::info!("Orientation of {} changed to {}, regenerating", name, record.orientation);
            self.pipeline
                .regenerate_into(&mut record, &self.images_dir)
                .map_err(|source| LibraryError::Pipeline {
                    name: name.to_string(),
                    source,
                })?;
        }

        store.update(&record)?;
        log::info!("Updated {}", name);

        self.cache.rebuild();
        Ok(record)
    }

    /// Remove an asset, its record and its derived variants.
    pub fn delete(&self, name: &str) -> LibraryResult<()> {
        let store = self.cache.store();
        if store.find(name)?.is_none() {
            return Err(LibraryError::NotFound(name.to_string()));
        }

        store.delete(name)?;
        self.discard_files(name);
        log::info!("Deleted {}", name);

        self.cache.rebuild();
        Ok(())
    }

    /// Make sure the variant directories exist, regenerating everything if
    /// one of them is empty while records exist.
    ///
    /// Per-asset regeneration failures are logged; the count of regenerated
    /// records is returned.
    pub fn init_derived_dirs(&self) -> LibraryResult<usize> {
        let mut needs_regeneration = false;
        for dir in self.pipeline.profiles().target_dirs() {
            fs::create_dir_all(dir).map_err(|source| LibraryError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            if is_empty_dir(dir).map_err(|source| LibraryError::Io {
                path: dir.to_path_buf(),
                source,
            })? {
                needs_regeneration = true;
            }
        }

        let snapshot = self.cache.snapshot_for_read();
        if snapshot.is_empty() || !needs_regeneration {
            return Ok(0);
        }

        log::info!("Variant directory empty, regenerating {} assets", snapshot.len());
        let records: Vec<AssetRecord> = snapshot.images().cloned().collect();
        let regenerated: Vec<AssetRecord> = records
            .into_par_iter()
            .filter_map(|mut record| {
                match self.pipeline.regenerate_into(&mut record, &self.images_dir) {
                    Ok(()) => Some(record),
                    Err(e) => {
                        log::warn!("Could not regenerate {}: {}", record.name, e);
                        None
                    }
                }
            })
            .collect();

        let store = self.cache.store();
        let mut written = 0;
        for record in &regenerated {
            match store.update(record) {
                Ok(()) => written += 1,
                Err(e) => log::warn!("Could not store dimensions of {}: {}", record.name, e),
            }
        }
        if written > 0 {
            self.cache.rebuild();
        }
        Ok(written)
    }

    /// Best-effort removal of the primary asset and its variants.
    fn discard_files(&self, name: &str) {
        let mut paths = vec![self.images_dir.join(name)];
        paths.extend(self.pipeline.profiles().iter().map(|p| p.target_path(name)));

        for path in paths {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    log::debug!("Nothing to remove at {}", path.display());
                }
                Err(e) => log::warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
    }
}

/// The asset name for a source file: its file name, which must carry the
/// primary extension.
fn asset_name(source: &Path) -> LibraryResult<String> {
    let invalid = |reason: &str| LibraryError::InvalidName {
        path: source.to_path_buf(),
        reason: reason.to_string(),
    };

    let name = source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| invalid("file name is missing or not valid UTF-8"))?;
    if !name.ends_with(PRIMARY_EXTENSION) || name.len() == PRIMARY_EXTENSION.len() {
        return Err(invalid(&format!("expected a {} file", PRIMARY_EXTENSION)));
    }
    Ok(name.to_string())
}

fn is_empty_dir(dir: &Path) -> io::Result<bool> {
    Ok(fs::read_dir(dir)?.next().is_none())
}
