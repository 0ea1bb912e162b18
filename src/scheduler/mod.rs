//! Dirty-flag driven offload of local assets to the remote archive.
//!
//! A [`SyncScheduler`] runs one sync pass per tick. A pass does nothing
//! unless the metadata cache is dirty; otherwise it:
//!
//! 1. lists local primary assets in the images directory,
//! 2. lists remote objects with the same extension,
//! 3. uploads every local asset missing remotely into the archive folder
//!    (resolving the folder at most once per pass),
//! 4. trashes any remote copy of the store snapshot and uploads a fresh one,
//! 5. clears the dirty flag.
//!
//! Any failure aborts the rest of the pass and leaves the flag set, so the
//! next tick retries the whole pass. Every step is idempotent: assets already
//! present remotely are skipped.
//!
//! [`SchedulerHandle`] owns the background thread that ticks on a fixed
//! interval until stopped.

pub mod ticker;

pub use ticker::SchedulerHandle;

use crate::archive::{ArchiveError, DirectoryId, NameQuery, RemoteArchive};
use crate::cache::MetadataCache;
use crate::store::{StoreError, PRIMARY_EXTENSION, PRIMARY_MEDIA_TYPE, SNAPSHOT_MEDIA_TYPE};
use bytesize::ByteSize;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use walkdir::WalkDir;

/// Errors that abort a sync pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The images directory could not be listed.
    #[error("failed to list local assets in {path}: {message}")]
    LocalList { path: PathBuf, message: String },

    /// A local asset could not be read for upload.
    #[error("failed to read local asset {path}: {source}")]
    ReadAsset {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A remote archive call failed.
    #[error(transparent)]
    Remote(#[from] ArchiveError),

    /// The record store could not be read, snapshotted or marked synced.
    #[error("record store unavailable: {0}")]
    Store(#[from] StoreError),
}

/// Where the scheduler is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Checking,
    Diffing,
    Uploading,
    ClearingFlag,
    ReportingError,
}

/// What a completed pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Local assets uploaded in this pass, in upload order.
    pub uploaded: Vec<String>,
    /// Previous snapshot copies moved to the trash.
    pub snapshots_trashed: usize,
    /// Bytes sent, assets and snapshot together.
    pub bytes_uploaded: u64,
    /// Whether the dirty flag was cleared (false if the cache changed mid-pass).
    pub flag_cleared: bool,
}

/// Result of a successful pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Nothing changed since the last successful sync.
    Clean,
    /// Local state was pushed to the archive.
    Synced(SyncReport),
}

/// Cumulative scheduler status, for logging and inspection.
#[derive(Debug, Clone)]
pub struct SyncStatus {
    pub phase: SyncPhase,
    pub passes: u64,
    pub failures: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self {
            phase: SyncPhase::Idle,
            passes: 0,
            failures: 0,
            last_success: None,
            last_error: None,
        }
    }
}

/// Static inputs of a sync pass.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Directory holding the primary assets.
    pub images_dir: PathBuf,
    /// Name of the archive folder everything is uploaded into.
    pub remote_dir: String,
}

/// Runs sync passes against a remote archive.
pub struct SyncScheduler {
    cache: Arc<MetadataCache>,
    archive: Arc<dyn RemoteArchive>,
    settings: SyncSettings,
    status: Mutex<SyncStatus>,
}

impl SyncScheduler {
    #[must_use]
    pub fn new(
        cache: Arc<MetadataCache>,
        archive: Arc<dyn RemoteArchive>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            cache,
            archive,
            settings,
            status: Mutex::new(SyncStatus::default()),
        }
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<MetadataCache> {
        &self.cache
    }

    /// A copy of the current status.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        self.lock_status().clone()
    }

    /// One scheduled tick: run a pass and log its outcome.
    ///
    /// Errors are logged and counted here; the dirty flag stays set.
    pub fn tick(&self) -> Result<SyncOutcome, SyncError> {
        let result = self.run_pass();
        match &result {
            Ok(SyncOutcome::Clean) => log::debug!("Sync tick: nothing to do"),
            Ok(SyncOutcome::Synced(report)) => log::info!(
                "Sync complete: {} assets uploaded, {} sent, {} old snapshot(s) trashed",
                report.uploaded.len(),
                ByteSize::b(report.bytes_uploaded),
                report.snapshots_trashed
            ),
            Err(e) => {
                self.enter(SyncPhase::ReportingError);
                log::error!("Sync pass failed, will retry next tick: {}", e);
                let mut status = self.lock_status();
                status.failures += 1;
                status.last_error = Some(e.to_string());
            }
        }
        self.enter(SyncPhase::Idle);
        result
    }

    /// Mark the cache dirty and run a pass right away.
    pub fn force_pass(&self) -> Result<SyncOutcome, SyncError> {
        self.cache.mark_dirty();
        self.tick()
    }

    /// Run a single pass, without the tick's logging and bookkeeping.
    pub fn run_pass(&self) -> Result<SyncOutcome, SyncError> {
        self.enter(SyncPhase::Checking);
        // Mutations may come from other processes sharing the store.
        self.cache.refresh()?;
        let Some(token) = self.cache.dirty_token() else {
            return Ok(SyncOutcome::Clean);
        };
        self.lock_status().passes += 1;

        self.enter(SyncPhase::Diffing);
        let local = list_local_assets(&self.settings.images_dir, PRIMARY_EXTENSION)?;
        let remote: HashSet<String> = self
            .archive
            .list_by_name(&NameQuery::contains(PRIMARY_EXTENSION))?
            .into_iter()
            .map(|object| object.name)
            .collect();
        let missing: Vec<String> = local
            .into_iter()
            .filter(|name| !remote.contains(name))
            .collect();
        log::debug!(
            "Sync diff: {} local asset(s) missing from {} remote",
            missing.len(),
            remote.len()
        );

        self.enter(SyncPhase::Uploading);
        let mut report = SyncReport::default();
        let mut folder: Option<DirectoryId> = None;

        for name in missing {
            let path = self.settings.images_dir.join(&name);
            let bytes = fs::read(&path).map_err(|source| SyncError::ReadAsset { path, source })?;
            let size = bytes.len() as u64;
            let parent = self.folder(&mut folder)?;
            self.archive.upload(&name, bytes, PRIMARY_MEDIA_TYPE, &parent)?;
            log::info!("Uploaded {} ({}) to archive", name, ByteSize::b(size));
            report.bytes_uploaded += size;
            report.uploaded.push(name);
        }

        let store = self.cache.store();
        let snapshot_name = store.snapshot_name();
        let snapshot = store.snapshot_bytes()?;
        let parent = self.folder(&mut folder)?;
        for previous in self.archive.list_by_name(&NameQuery::exact(&snapshot_name))? {
            self.archive.trash(&previous.id)?;
            report.snapshots_trashed += 1;
        }
        let size = snapshot.len() as u64;
        self.archive
            .upload(&snapshot_name, snapshot, SNAPSHOT_MEDIA_TYPE, &parent)?;
        log::info!("Uploaded store snapshot {} ({})", snapshot_name, ByteSize::b(size));
        report.bytes_uploaded += size;

        self.enter(SyncPhase::ClearingFlag);
        report.flag_cleared = self.cache.clear_dirty(token)?;
        self.lock_status().last_success = Some(Utc::now());

        Ok(SyncOutcome::Synced(report))
    }

    /// Resolve the archive folder, at most once per pass.
    fn folder(&self, cached: &mut Option<DirectoryId>) -> Result<DirectoryId, SyncError> {
        if let Some(id) = cached {
            return Ok(id.clone());
        }
        let id = self.archive.ensure_directory(&self.settings.remote_dir)?;
        *cached = Some(id.clone());
        Ok(id)
    }

    fn enter(&self, phase: SyncPhase) {
        let mut status = self.lock_status();
        if status.phase != phase {
            log::trace!("Sync phase {:?} -> {:?}", status.phase, phase);
            status.phase = phase;
        }
    }

    fn lock_status(&self) -> MutexGuard<'_, SyncStatus> {
        self.status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// File names directly inside `dir` ending with `extension`, sorted.
pub fn list_local_assets(dir: &Path, extension: &str) -> Result<Vec<String>, SyncError> {
    let mut names = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| SyncError::LocalList {
            path: dir.to_path_buf(),
            message: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name.ends_with(extension) {
            names.push(name.into_owned());
        }
    }
    names.sort();
    Ok(names)
}
