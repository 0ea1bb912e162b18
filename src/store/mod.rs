//! Persistent record store for asset metadata.
//!
//! The store is the source of truth for every [`AssetRecord`]. The metadata
//! cache only ever holds read-only copies rebuilt from [`RecordStore::find_all`].
//!
//! * [`record`]: the record model, orientation and tag tokenisation.
//! * [`database`]: the [`RecordStore`] trait and its SQLite implementation.

pub mod database;
pub mod record;

pub use database::{RecordStore, SqliteStore, StoreError, StoreResult, SNAPSHOT_MEDIA_TYPE};
pub use record::{
    split_tags, AssetRecord, Dimensions, Orientation, ParseOrientationError, RecordEdits,
    PRIMARY_EXTENSION, PRIMARY_MEDIA_TYPE,
};
