//! SQLite-backed record store.

use crate::store::record::{AssetRecord, Dimensions, Orientation};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Media type of the archived database snapshot.
pub const SNAPSHOT_MEDIA_TYPE: &str = "application/x-sqlite3";

/// Errors returned by a [`RecordStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database could not be opened or migrated.
    #[error("failed to open record store at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// A query against the store failed.
    #[error("record store query failed: {0}")]
    Query(#[from] rusqlite::Error),

    /// A record with that name already exists.
    #[error("record already exists: {0}")]
    AlreadyExists(String),

    /// No record with that name exists.
    #[error("record not found: {0}")]
    NotFound(String),

    /// A stored row could not be decoded.
    #[error("corrupt row for {name}: {message}")]
    Corrupt { name: String, message: String },

    /// The snapshot blob could not be read.
    #[error("failed to read store snapshot {path}: {source}")]
    Snapshot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Key-indexed persistence for [`AssetRecord`]s.
///
/// Implementations must be safe to share between the request path and the
/// background sync thread.
pub trait RecordStore: Send + Sync {
    /// Every record in the store, in no particular order.
    fn find_all(&self) -> StoreResult<Vec<AssetRecord>>;

    /// A single record by name.
    fn find(&self, name: &str) -> StoreResult<Option<AssetRecord>>;

    /// Insert a new record. Fails if the name is taken.
    fn create(&self, record: &AssetRecord) -> StoreResult<()>;

    /// Overwrite an existing record, keyed by name.
    fn update(&self, record: &AssetRecord) -> StoreResult<()>;

    /// Remove a record by name.
    fn delete(&self, name: &str) -> StoreResult<()>;

    /// Name under which the store snapshot is archived.
    fn snapshot_name(&self) -> String;

    /// The whole store as an opaque blob.
    fn snapshot_bytes(&self) -> StoreResult<Vec<u8>>;

    /// Persistent counter bumped by every successful create, update and
    /// delete, whichever process made it.
    fn revision(&self) -> StoreResult<u64>;

    /// The revision covered by the last successful archive sync.
    fn synced_revision(&self) -> StoreResult<u64>;

    /// Record that everything up to `revision` has been archived.
    fn set_synced_revision(&self, revision: u64) -> StoreResult<()>;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS images (
    name          TEXT PRIMARY KEY NOT NULL,
    created_at    TEXT NOT NULL,
    width_small   INTEGER NOT NULL DEFAULT 0,
    height_small  INTEGER NOT NULL DEFAULT 0,
    width_medium  INTEGER NOT NULL DEFAULT 0,
    height_medium INTEGER NOT NULL DEFAULT 0,
    orientation   TEXT NOT NULL DEFAULT '',
    tags          TEXT NOT NULL DEFAULT '',
    description   TEXT NOT NULL DEFAULT '',
    hidden        INTEGER NOT NULL DEFAULT 0,
    alt           TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS sync_state (
    id              INTEGER PRIMARY KEY CHECK (id = 1),
    revision        INTEGER NOT NULL DEFAULT 0,
    synced_revision INTEGER NOT NULL DEFAULT 0
);
INSERT OR IGNORE INTO sync_state (id, revision, synced_revision) VALUES (1, 0, 0);
";

const BUMP_REVISION: &str = "UPDATE sync_state SET revision = revision + 1 WHERE id = 1";

const COLUMNS: &str = "name, created_at, width_small, height_small, width_medium, \
                       height_medium, orientation, tags, description, hidden, alt";

/// Record store persisted in a single SQLite database file.
pub struct SqliteStore {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens or creates the store at the specified path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let open_err = |source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::warn!("Could not create store directory {}: {}", parent.display(), e);
            }
        }

        let conn = Connection::open(path).map_err(open_err)?;
        conn.execute_batch(SCHEMA).map_err(open_err)?;
        log::debug!("Record store opened at {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
        })
    }

    /// Path of the backing database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sync_state(&self, column: &str) -> StoreResult<u64> {
        let conn = self.conn();
        let value: i64 = conn.query_row(
            &format!("SELECT {column} FROM sync_state WHERE id = 1"),
            [],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(value).unwrap_or(0))
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            log::warn!("Record store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl RecordStore for SqliteStore {
    fn find_all(&self) -> StoreResult<Vec<AssetRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM images"))?;
        let rows = stmt.query_map([], read_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(decode(row?)?);
        }
        Ok(records)
    }

    fn find(&self, name: &str) -> StoreResult<Option<AssetRecord>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM images WHERE name = ?1"),
                params![name],
                read_row,
            )
            .optional()?;
        row.map(decode).transpose()
    }

    fn create(&self, record: &AssetRecord) -> StoreResult<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let result = tx.execute(
            &format!("INSERT INTO images ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"),
            params![
                record.name,
                record.created_at.to_rfc3339(),
                record.small.width,
                record.small.height,
                record.medium.width,
                record.medium.height,
                record.orientation.as_str(),
                record.tags,
                record.description,
                record.hidden,
                record.alt,
            ],
        );

        match result {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(StoreError::AlreadyExists(record.name.clone()));
            }
            Err(e) => return Err(e.into()),
        }
        tx.execute(BUMP_REVISION, [])?;
        tx.commit()?;
        Ok(())
    }

    fn update(&self, record: &AssetRecord) -> StoreResult<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE images SET created_at = ?2, width_small = ?3, height_small = ?4, \
             width_medium = ?5, height_medium = ?6, orientation = ?7, tags = ?8, \
             description = ?9, hidden = ?10, alt = ?11 WHERE name = ?1",
            params![
                record.name,
                record.created_at.to_rfc3339(),
                record.small.width,
                record.small.height,
                record.medium.width,
                record.medium.height,
                record.orientation.as_str(),
                record.tags,
                record.description,
                record.hidden,
                record.alt,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(record.name.clone()));
        }
        tx.execute(BUMP_REVISION, [])?;
        tx.commit()?;
        Ok(())
    }

    fn delete(&self, name: &str) -> StoreResult<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let changed = tx.execute("DELETE FROM images WHERE name = ?1", params![name])?;
        if changed == 0 {
            return Err(StoreError::NotFound(name.to_string()));
        }
        tx.execute(BUMP_REVISION, [])?;
        tx.commit()?;
        Ok(())
    }

    fn snapshot_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "gallery.db".to_string())
    }

    fn snapshot_bytes(&self) -> StoreResult<Vec<u8>> {
        // Holding the connection lock keeps writers out while the file is read.
        let _conn = self.conn();
        std::fs::read(&self.path).map_err(|source| StoreError::Snapshot {
            path: self.path.clone(),
            source,
        })
    }

    fn revision(&self) -> StoreResult<u64> {
        self.sync_state("revision")
    }

    fn synced_revision(&self) -> StoreResult<u64> {
        self.sync_state("synced_revision")
    }

    fn set_synced_revision(&self, revision: u64) -> StoreResult<()> {
        let conn = self.conn();
        let revision = i64::try_from(revision).unwrap_or(i64::MAX);
        conn.execute(
            "UPDATE sync_state SET synced_revision = ?1 WHERE id = 1",
            params![revision],
        )?;
        Ok(())
    }
}

/// Raw column values, decoded outside of the rusqlite row callback.
struct RawRow {
    name: String,
    created_at: String,
    small: Dimensions,
    medium: Dimensions,
    orientation: String,
    tags: String,
    description: String,
    hidden: bool,
    alt: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        name: row.get(0)?,
        created_at: row.get(1)?,
        small: Dimensions::new(row.get(2)?, row.get(3)?),
        medium: Dimensions::new(row.get(4)?, row.get(5)?),
        orientation: row.get(6)?,
        tags: row.get(7)?,
        description: row.get(8)?,
        hidden: row.get(9)?,
        alt: row.get(10)?,
    })
}

fn decode(raw: RawRow) -> StoreResult<AssetRecord> {
    let created_at = DateTime::parse_from_rfc3339(&raw.created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            name: raw.name.clone(),
            message: format!("invalid created_at '{}': {}", raw.created_at, e),
        })?;

    Ok(AssetRecord {
        orientation: Orientation::from_stored(&raw.orientation),
        name: raw.name,
        created_at,
        small: raw.small,
        medium: raw.medium,
        tags: raw.tags,
        description: raw.description,
        hidden: raw.hidden,
        alt: raw.alt,
    })
}
