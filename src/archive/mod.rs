//! Remote archive destination.
//!
//! The archive is a flat object store with folders, modelled on the Google
//! Drive v3 files API: objects are listed by a name query, uploaded with a
//! parent folder reference, and superseded objects are moved to the trash
//! rather than deleted.
//!
//! * [`drive`]: HTTP client for a Drive-compatible REST endpoint.
//! * [`memory`]: in-process archive for tests and dry runs.

pub mod drive;
pub mod memory;

pub use drive::{DriveArchive, DriveSettings};
pub use memory::MemoryArchive;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Media type the archive uses for folders.
pub const FOLDER_MEDIA_TYPE: &str = "application/vnd.google-apps.folder";

/// Identifier of a remote folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectoryId(pub String);

impl fmt::Display for DirectoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One object as reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    pub id: String,
    pub name: String,
    #[serde(default, rename = "mimeType")]
    pub media_type: String,
}

/// Name filter for [`RemoteArchive::list_by_name`]. Trashed objects never match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameQuery {
    /// Name contains the given substring (e.g. an extension).
    Contains(String),
    /// Name is exactly the given string.
    Exact(String),
}

impl NameQuery {
    #[must_use]
    pub fn contains(fragment: impl Into<String>) -> Self {
        Self::Contains(fragment.into())
    }

    #[must_use]
    pub fn exact(name: impl Into<String>) -> Self {
        Self::Exact(name.into())
    }

    /// Whether `name` satisfies this query.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Contains(fragment) => name.contains(fragment.as_str()),
            Self::Exact(exact) => name == exact,
        }
    }
}

impl fmt::Display for NameQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contains(s) => write!(f, "name contains '{}'", s),
            Self::Exact(s) => write!(f, "name = '{}'", s),
        }
    }
}

/// Errors from the remote archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Listing objects failed.
    #[error("failed to list remote objects ({query}): {message}")]
    List { query: String, message: String },

    /// Listing returned more pages than the client is willing to follow.
    #[error("remote listing ({query}) exceeded {pages} pages")]
    TooManyPages { query: String, pages: usize },

    /// Finding or creating the target folder failed.
    #[error("failed to resolve remote directory '{name}': {message}")]
    Directory { name: String, message: String },

    /// Uploading an object failed.
    #[error("failed to upload '{name}': {message}")]
    Upload { name: String, message: String },

    /// Moving an object to the trash failed.
    #[error("failed to trash remote object {id}: {message}")]
    Trash { id: String, message: String },

    /// The HTTP client could not be constructed.
    #[error("remote archive client error: {0}")]
    Client(String),
}

/// Result alias for archive operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Operations the sync scheduler needs from the archive.
///
/// Each method is one logical remote action.
pub trait RemoteArchive: Send + Sync {
    /// Non-trashed objects whose names match `query`.
    fn list_by_name(&self, query: &NameQuery) -> ArchiveResult<Vec<RemoteObject>>;

    /// Find the folder called `name`, creating it under the root if absent.
    fn ensure_directory(&self, name: &str) -> ArchiveResult<DirectoryId>;

    /// Create an object named `name` with `bytes` inside `parent`.
    fn upload(
        &self,
        name: &str,
        bytes: Vec<u8>,
        media_type: &str,
        parent: &DirectoryId,
    ) -> ArchiveResult<RemoteObject>;

    /// Move an object to the trash.
    fn trash(&self, id: &str) -> ArchiveResult<()>;
}
