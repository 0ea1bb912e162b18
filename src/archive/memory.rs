//! In-process remote archive for the test suite.
//!
//! Behaves like the Drive client from the scheduler's point of view and
//! records every call, so sync passes can be checked without a network.
//! Failures can be injected per operation. Nothing in the binary uses it.

use crate::archive::{
    ArchiveError, ArchiveResult, DirectoryId, NameQuery, RemoteArchive, RemoteObject,
    FOLDER_MEDIA_TYPE,
};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

/// Parent id used for top-level folders.
pub const ROOT_ID: &str = "root";

#[derive(Debug, Clone)]
struct StoredObject {
    id: String,
    name: String,
    media_type: String,
    parent: String,
    bytes: Vec<u8>,
    trashed: bool,
}

#[derive(Debug, Default)]
struct State {
    objects: Vec<StoredObject>,
    next_id: u64,
    uploads: Vec<String>,
    directory_lookups: usize,
    fail_list: bool,
    fail_directory: bool,
    fail_uploads: HashSet<String>,
}

impl State {
    fn insert(&mut self, name: &str, media_type: &str, parent: &str, bytes: Vec<u8>) -> RemoteObject {
        self.next_id += 1;
        let object = StoredObject {
            id: format!("obj-{}", self.next_id),
            name: name.to_string(),
            media_type: media_type.to_string(),
            parent: parent.to_string(),
            bytes,
            trashed: false,
        };
        let remote = RemoteObject {
            id: object.id.clone(),
            name: object.name.clone(),
            media_type: object.media_type.clone(),
        };
        self.objects.push(object);
        remote
    }
}

/// Remote archive held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryArchive {
    state: Mutex<State>,
}

impl MemoryArchive {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object at the root, as if uploaded by an earlier run.
    pub fn seed(&self, name: &str, media_type: &str, bytes: Vec<u8>) -> RemoteObject {
        self.state().insert(name, media_type, ROOT_ID, bytes)
    }

    /// Names passed to successful `upload` calls, in call order.
    #[must_use]
    pub fn uploads(&self) -> Vec<String> {
        self.state().uploads.clone()
    }

    /// Names of live (non-trashed, non-folder) objects, sorted.
    #[must_use]
    pub fn live_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .state()
            .objects
            .iter()
            .filter(|o| !o.trashed && o.media_type != FOLDER_MEDIA_TYPE)
            .map(|o| o.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Names of trashed objects, in insertion order.
    #[must_use]
    pub fn trashed_names(&self) -> Vec<String> {
        self.state()
            .objects
            .iter()
            .filter(|o| o.trashed)
            .map(|o| o.name.clone())
            .collect()
    }

    /// Bytes of the live object called `name`.
    #[must_use]
    pub fn bytes_of(&self, name: &str) -> Option<Vec<u8>> {
        self.state()
            .objects
            .iter()
            .find(|o| !o.trashed && o.name == name)
            .map(|o| o.bytes.clone())
    }

    /// Parent folder name of the live object called `name`.
    #[must_use]
    pub fn parent_of(&self, name: &str) -> Option<String> {
        let state = self.state();
        let parent = state
            .objects
            .iter()
            .find(|o| !o.trashed && o.name == name)?
            .parent
            .clone();
        state
            .objects
            .iter()
            .find(|o| o.id == parent)
            .map(|o| o.name.clone())
    }

    /// Number of folders ever created.
    #[must_use]
    pub fn folder_count(&self) -> usize {
        self.state()
            .objects
            .iter()
            .filter(|o| o.media_type == FOLDER_MEDIA_TYPE)
            .count()
    }

    /// Number of `ensure_directory` calls.
    #[must_use]
    pub fn directory_lookups(&self) -> usize {
        self.state().directory_lookups
    }

    /// Make every listing fail until reset.
    pub fn fail_listing(&self, fail: bool) {
        self.state().fail_list = fail;
    }

    /// Make directory resolution fail until reset.
    pub fn fail_directory(&self, fail: bool) {
        self.state().fail_directory = fail;
    }

    /// Make uploads of `name` fail until [`MemoryArchive::heal_upload`].
    pub fn fail_upload_of(&self, name: &str) {
        self.state().fail_uploads.insert(name.to_string());
    }

    pub fn heal_upload(&self, name: &str) {
        self.state().fail_uploads.remove(name);
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RemoteArchive for MemoryArchive {
    fn list_by_name(&self, query: &NameQuery) -> ArchiveResult<Vec<RemoteObject>> {
        let state = self.state();
        if state.fail_list {
            return Err(ArchiveError::List {
                query: query.to_string(),
                message: "injected listing failure".to_string(),
            });
        }
        Ok(state
            .objects
            .iter()
            .filter(|o| !o.trashed && query.matches(&o.name))
            .map(|o| RemoteObject {
                id: o.id.clone(),
                name: o.name.clone(),
                media_type: o.media_type.clone(),
            })
            .collect())
    }

    fn ensure_directory(&self, name: &str) -> ArchiveResult<DirectoryId> {
        let mut state = self.state();
        state.directory_lookups += 1;
        if state.fail_directory {
            return Err(ArchiveError::Directory {
                name: name.to_string(),
                message: "injected directory failure".to_string(),
            });
        }

        if let Some(existing) = state
            .objects
            .iter()
            .find(|o| !o.trashed && o.media_type == FOLDER_MEDIA_TYPE && o.name == name)
        {
            return Ok(DirectoryId(existing.id.clone()));
        }
        let created = state.insert(name, FOLDER_MEDIA_TYPE, ROOT_ID, Vec::new());
        Ok(DirectoryId(created.id))
    }

    fn upload(
        &self,
        name: &str,
        bytes: Vec<u8>,
        media_type: &str,
        parent: &DirectoryId,
    ) -> ArchiveResult<RemoteObject> {
        let mut state = self.state();
        if state.fail_uploads.contains(name) {
            return Err(ArchiveError::Upload {
                name: name.to_string(),
                message: "injected upload failure".to_string(),
            });
        }
        if !state.objects.iter().any(|o| o.id == parent.0) {
            return Err(ArchiveError::Upload {
                name: name.to_string(),
                message: format!("unknown parent {}", parent),
            });
        }
        state.uploads.push(name.to_string());
        Ok(state.insert(name, media_type, &parent.0, bytes))
    }

    fn trash(&self, id: &str) -> ArchiveResult<()> {
        let mut state = self.state();
        match state.objects.iter_mut().find(|o| o.id == id) {
            Some(object) => {
                object.trashed = true;
                Ok(())
            }
            None => Err(ArchiveError::Trash {
                id: id.to_string(),
                message: "no such object".to_string(),
            }),
        }
    }
}
