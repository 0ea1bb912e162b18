//! In-memory metadata cache mirroring the record store.
//!
//! The cache holds the last [`CacheSnapshot`] built from a full store read,
//! together with the dirty flag consumed by the sync scheduler.
//!
//! # Rebuild strategy
//!
//! There is no incremental patching. Every create, update or delete is
//! followed by [`MetadataCache::rebuild`], which reads every record, builds a
//! fresh name index and tag index, and swaps both in as one `Arc`. Readers
//! therefore see either the old pair or the new pair, never a mix.
//!
//! # Locking
//!
//! Two locks are involved:
//!
//! * a rebuild lock, held for the whole store read so rebuilds run one at a
//!   time and the last mutation's rebuild is the last one applied;
//! * the state lock, covering the snapshot pointer, the dirty flag and the
//!   mutation counter. It is held only to swap or copy the pointer, so
//!   readers never wait on store I/O.
//!
//! # Cross-process changes
//!
//! The store keeps a persistent revision counter and the revision covered by
//! the last successful sync. A freshly loaded cache is dirty whenever the two
//! differ, and [`MetadataCache::refresh`] rebuilds when another process (a
//! CLI `add`, say) moved the counter since the last read.

pub mod snapshot;

pub use snapshot::{CacheSnapshot, TagIndex, ALL_TAG};

use crate::store::{RecordStore, StoreResult};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug)]
struct CacheState {
    snapshot: Arc<CacheSnapshot>,
    dirty: bool,
    /// Bumped on every mutation signal (rebuild or explicit mark).
    mutations: u64,
    /// Store revision observed just before the current snapshot was read.
    store_revision: u64,
}

/// Proof that the cache was dirty at a given mutation count.
///
/// Handed to [`MetadataCache::clear_dirty`] so a sync pass only clears the
/// flag if nothing changed while it ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyToken {
    mutations: u64,
    revision: u64,
}

/// Shared, internally synchronised metadata cache.
pub struct MetadataCache {
    store: Arc<dyn RecordStore>,
    rebuild_lock: Mutex<()>,
    state: Mutex<CacheState>,
}

impl MetadataCache {
    /// Build the initial snapshot from a full store read.
    ///
    /// The dirty flag starts set only if the store holds changes that no
    /// sync has archived yet.
    pub fn load(store: Arc<dyn RecordStore>) -> StoreResult<Self> {
        let revision = store.revision()?;
        let records = store.find_all()?;
        let synced = store.synced_revision()?;
        let snapshot = CacheSnapshot::build(records, 0);
        let dirty = revision != synced;
        log::info!(
            "Metadata cache loaded: {} records, {} tags",
            snapshot.len(),
            snapshot.tags().len() - 1
        );
        if dirty {
            log::info!(
                "Store revision {} not yet archived (last synced {})",
                revision,
                synced
            );
        }

        Ok(Self {
            store,
            rebuild_lock: Mutex::new(()),
            state: Mutex::new(CacheState {
                snapshot: Arc::new(snapshot),
                dirty,
                mutations: 0,
                store_revision: revision,
            }),
        })
    }

    /// The store this cache mirrors.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Replace the snapshot with a fresh full read and mark the cache dirty.
    ///
    /// Store read failures are logged and leave the previous snapshot in
    /// place; the dirty flag is still set because the store was mutated.
    pub fn rebuild(&self) {
        if let Err(e) = self.try_rebuild() {
            log::error!("Cache rebuild failed, keeping last good snapshot: {}", e);
        }
    }

    /// Like [`rebuild`](Self::rebuild) but reports the store error.
    ///
    /// Returns the generation of the installed snapshot.
    pub fn try_rebuild(&self) -> StoreResult<u64> {
        let _rebuilding = lock_or_recover(&self.rebuild_lock, "rebuild");

        let generation = {
            let mut state = self.state();
            state.mutations += 1;
            state.dirty = true;
            state.mutations
        };

        let revision = self.store.revision()?;
        let records = self.store.find_all()?;
        let snapshot = Arc::new(CacheSnapshot::build(records, generation));
        log::debug!(
            "Cache rebuilt (generation {}): {} records, {} tags",
            generation,
            snapshot.len(),
            snapshot.tags().len() - 1
        );

        let mut state = self.state();
        state.snapshot = snapshot;
        state.store_revision = revision;
        Ok(generation)
    }

    /// Catch up with writes made through other connections to the store.
    ///
    /// Rebuilds (and so marks dirty) if the store revision moved since the
    /// last read, and marks dirty if the store still has unarchived
    /// revisions. Returns whether the cache became dirty.
    pub fn refresh(&self) -> StoreResult<bool> {
        let revision = self.store.revision()?;
        let (known, dirty) = {
            let state = self.state();
            (state.store_revision, state.dirty)
        };

        if revision != known {
            log::info!(
                "Store changed externally (revision {} -> {}), rebuilding cache",
                known,
                revision
            );
            self.try_rebuild()?;
            return Ok(true);
        }

        if !dirty && self.store.synced_revision()? != revision {
            log::debug!("Store revision {} not yet archived, marking dirty", revision);
            self.mark_dirty();
            return Ok(true);
        }
        Ok(false)
    }

    /// The current snapshot. Cheap: clones an `Arc` under the state lock.
    #[must_use]
    pub fn snapshot_for_read(&self) -> Arc<CacheSnapshot> {
        Arc::clone(&self.state().snapshot)
    }

    /// Flag local state as diverged from the remote archive.
    pub fn mark_dirty(&self) {
        let mut state = self.state();
        state.mutations += 1;
        state.dirty = true;
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.state().dirty
    }

    /// A token for the current dirty state, or `None` if the cache is clean.
    #[must_use]
    pub fn dirty_token(&self) -> Option<DirtyToken> {
        let state = self.state();
        state.dirty.then_some(DirtyToken {
            mutations: state.mutations,
            revision: state.store_revision,
        })
    }

    /// Clear the dirty flag if no mutation happened since `token` was taken.
    ///
    /// The token's store revision is first persisted as synced, so the next
    /// process to load the store knows it has nothing to push. Returns
    /// whether the flag was cleared.
    pub fn clear_dirty(&self, token: DirtyToken) -> StoreResult<bool> {
        if !self.unchanged_since(token) {
            return Ok(false);
        }
        self.store.set_synced_revision(token.revision)?;

        let mut state = self.state();
        if state.mutations != token.mutations {
            return Ok(false);
        }
        state.dirty = false;
        Ok(true)
    }

    fn unchanged_since(&self, token: DirtyToken) -> bool {
        let state = self.state();
        if state.mutations == token.mutations {
            return true;
        }
        log::debug!(
            "Cache mutated during sync ({} -> {}), keeping dirty flag",
            token.mutations,
            state.mutations
        );
        false
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        lock_or_recover(&self.state, "state")
    }
}

fn lock_or_recover<'a, T>(mutex: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        log::warn!("Cache {} lock was poisoned, recovering", what);
        poisoned.into_inner()
    })
}
