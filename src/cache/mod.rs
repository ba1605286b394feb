//! Namespaced memoization cache persisted in SQLite.
//!
//! Every `get_or_load` runs inside one IMMEDIATE transaction, so concurrent
//! shells starting at once serialise on the store's lock instead of racing.

pub mod rehash;
pub mod schema;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Transaction, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

pub use rehash::{Digest, HashFunc, RehashCondition, Validity};

/// How often a value is re-validated unless the loader says otherwise.
pub const DEFAULT_CHECK_FREQUENCY: Duration = Duration::from_secs(15 * 60);

const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

static NAMESPACE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid namespace pattern"));

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Namespace names become part of the persisted key space.
    #[error("invalid cache namespace name: {0:?}")]
    InvalidNamespace(String),

    /// A files-changed condition must watch at least one file.
    #[error("files-changed rehash condition needs at least one file")]
    EmptyFileSet,

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    /// A persisted record could not be decoded.
    #[error("malformed cache entry {key:?}: {reason}")]
    Deserialize { key: String, reason: String },

    #[error("failed to serialize value for {key:?}: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cache schema version {found} is not supported (newest known: {supported})")]
    UnknownSchemaVersion { found: u32, supported: u32 },

    #[error("cannot migrate cache schema backward from {from} to {to}")]
    BackwardMigration { from: u32, to: u32 },

    #[error("cache store error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// A value plus the policy deciding when it goes stale.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedValue<T> {
    pub value: T,
    pub rehash: RehashCondition,
    pub last_checked: DateTime<Utc>,
    pub check_frequency: Duration,
}

impl<T> CachedValue<T> {
    /// Checked now, rehashed always, re-validated every 15 minutes.
    pub fn new(value: T) -> Self {
        Self {
            value,
            rehash: RehashCondition::default(),
            last_checked: Utc::now(),
            check_frequency: DEFAULT_CHECK_FREQUENCY,
        }
    }

    pub fn with_rehash(mut self, rehash: RehashCondition) -> Self {
        self.rehash = rehash;
        self
    }

    pub fn with_check_frequency(mut self, check_frequency: Duration) -> Self {
        self.check_frequency = check_frequency;
        self
    }

    /// Whether the throttle window has passed. A clock that went backwards
    /// counts as expired.
    pub fn is_time_expired(&self, now: DateTime<Utc>) -> bool {
        match now.signed_duration_since(self.last_checked).to_std() {
            Ok(elapsed) => elapsed >= self.check_frequency,
            Err(_) => true,
        }
    }
}

/// Where the SQLite store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    File(PathBuf),
    /// Private to each opened namespace; used by tests and `--no-cache` style runs.
    Memory,
}

/// One namespace of the persisted store.
#[derive(Debug)]
pub struct Cache {
    conn: Connection,
    namespace_id: i64,
}

impl Cache {
    /// Open (creating and migrating if needed) the store at `path` and
    /// ensure namespace `name` exists.
    pub fn open(path: &Path, name: &str) -> Result<Self, CacheError> {
        validate_namespace(name)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| CacheError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::from_connection(conn, name)
    }

    pub fn open_in_memory(name: &str) -> Result<Self, CacheError> {
        validate_namespace(name)?;
        Self::from_connection(Connection::open_in_memory()?, name)
    }

    fn from_connection(mut conn: Connection, name: &str) -> Result<Self, CacheError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        schema::migrate(&mut conn)?;

        conn.execute(
            "INSERT OR IGNORE INTO namespaces (name, created_at) VALUES (?1, ?2)",
            params![name, format_timestamp(Utc::now())],
        )?;
        let namespace_id = conn.query_row(
            "SELECT id FROM namespaces WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        tracing::debug!("Opened cache namespace {name} (id {namespace_id})");

        Ok(Self {
            conn,
            namespace_id,
        })
    }

    /// Return the cached value for `key`, calling `loader` on a miss or
    /// after invalidation.
    ///
    /// The read, validity check and write happen in one transaction. Loader
    /// errors roll it back and are returned unchanged.
    pub fn get_or_load<T, E, F>(&mut self, key: &str, loader: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Result<CachedValue<T>, E>,
    {
        let namespace_id = self.namespace_id;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(CacheError::from)?;

        if let Some(existing) = load_entry::<T>(&tx, namespace_id, key)? {
            let now = Utc::now();
            if !existing.is_time_expired(now) {
                tracing::debug!("Cache hit for {key} (not due for a check)");
                tx.commit().map_err(CacheError::from)?;
                return Ok(existing.value);
            }
            match existing.rehash.check() {
                Validity::Valid => {
                    tracing::debug!("Cache hit for {key} (still valid)");
                    touch_entry(&tx, namespace_id, key, now)?;
                    tx.commit().map_err(CacheError::from)?;
                    return Ok(existing.value);
                }
                Validity::Invalid(reason) => {
                    tracing::info!("Invalidating {key}: {reason}");
                }
            }
        }

        tracing::info!("Loading value for {key}");
        let loaded = loader()?;
        store_entry(&tx, namespace_id, key, &loaded)?;
        tx.commit().map_err(CacheError::from)?;
        Ok(loaded.value)
    }

    /// Drop `key` from this namespace. Returns whether it existed.
    pub fn invalidate(&mut self, key: &str) -> Result<bool, CacheError> {
        let removed = self.conn.execute(
            "DELETE FROM entries WHERE namespace_id = ?1 AND key = ?2",
            params![self.namespace_id, key],
        )?;
        Ok(removed > 0)
    }
}

/// Namespaces opened so far in this process, each opened at most once.
#[derive(Debug)]
pub struct CacheRegistry {
    location: StoreLocation,
    open: HashMap<String, Cache>,
}

impl CacheRegistry {
    pub fn new(location: StoreLocation) -> Self {
        Self {
            location,
            open: HashMap::new(),
        }
    }

    pub fn namespace(&mut self, name: &str) -> Result<&mut Cache, CacheError> {
        match self.open.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let cache = match &self.location {
                    StoreLocation::File(path) => Cache::open(path, name)?,
                    StoreLocation::Memory => Cache::open_in_memory(name)?,
                };
                Ok(entry.insert(cache))
            }
        }
    }
}

pub fn validate_namespace(name: &str) -> Result<(), CacheError> {
    if NAMESPACE_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(CacheError::InvalidNamespace(name.to_string()))
    }
}

fn format_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn frequency_millis(frequency: Duration) -> i64 {
    i64::try_from(frequency.as_millis()).unwrap_or(i64::MAX)
}

struct EntryRow {
    value: String,
    rehash_kind: String,
    last_checked: String,
    check_frequency_ms: i64,
    hash_func: Option<String>,
}

fn load_entry<T: DeserializeOwned>(
    tx: &Transaction<'_>,
    namespace_id: i64,
    key: &str,
) -> Result<Option<CachedValue<T>>, CacheError> {
    let row = tx
        .query_row(
            "SELECT value, rehash_kind, last_checked, check_frequency_ms, hash_func
             FROM entries WHERE namespace_id = ?1 AND key = ?2",
            params![namespace_id, key],
            |row| {
                Ok(EntryRow {
                    value: row.get(0)?,
                    rehash_kind: row.get(1)?,
                    last_checked: row.get(2)?,
                    check_frequency_ms: row.get(3)?,
                    hash_func: row.get(4)?,
                })
            },
        )
        .optional()?;
    let Some(row) = row else {
        return Ok(None);
    };

    let malformed = |reason: String| CacheError::Deserialize {
        key: key.to_string(),
        reason,
    };

    let value = serde_json::from_str(&row.value)
        .map_err(|err| malformed(format!("bad value: {err}")))?;
    let last_checked = DateTime::parse_from_rfc3339(&row.last_checked)
        .map_err(|err| malformed(format!("bad last_checked {:?}: {err}", row.last_checked)))?
        .with_timezone(&Utc);
    let check_frequency = u64::try_from(row.check_frequency_ms)
        .map(Duration::from_millis)
        .map_err(|_| malformed(format!("negative check frequency {}", row.check_frequency_ms)))?;

    let rehash = match row.rehash_kind.as_str() {
        "always" => RehashCondition::Always,
        "never" => RehashCondition::Never,
        "files_changed" => {
            let name = row
                .hash_func
                .ok_or_else(|| malformed("missing hash function".to_string()))?;
            let hash_func = HashFunc::from_name(&name)
                .ok_or_else(|| malformed(format!("unknown hash function {name:?}")))?;

            let mut stmt = tx.prepare(
                "SELECT path, digest FROM entry_file_hashes
                 WHERE namespace_id = ?1 AND key = ?2 ORDER BY path",
            )?;
            let rows = stmt.query_map(params![namespace_id, key], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            let mut hashes = BTreeMap::new();
            for item in rows {
                let (path, digest) = item?;
                let digest = Digest::parse(&digest)
                    .ok_or_else(|| malformed(format!("unexpected hash value {digest:?}")))?;
                hashes.insert(PathBuf::from(path), digest);
            }
            RehashCondition::from_hashes(hashes, hash_func)
                .map_err(|_| malformed("files_changed entry without files".to_string()))?
        }
        other => return Err(malformed(format!("unknown rehash condition {other:?}"))),
    };

    Ok(Some(CachedValue {
        value,
        rehash,
        last_checked,
        check_frequency,
    }))
}

fn store_entry<T: Serialize>(
    tx: &Transaction<'_>,
    namespace_id: i64,
    key: &str,
    entry: &CachedValue<T>,
) -> Result<(), CacheError> {
    let value = serde_json::to_string(&entry.value).map_err(|source| CacheError::Serialize {
        key: key.to_string(),
        source,
    })?;
    let hash_func = match &entry.rehash {
        RehashCondition::FilesChanged { hash_func, .. } => Some(hash_func.as_str()),
        _ => None,
    };

    tx.execute(
        "INSERT INTO entries
             (namespace_id, key, value, rehash_kind, last_checked, check_frequency_ms, hash_func)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT (namespace_id, key) DO UPDATE SET
             value = excluded.value,
             rehash_kind = excluded.rehash_kind,
             last_checked = excluded.last_checked,
             check_frequency_ms = excluded.check_frequency_ms,
             hash_func = excluded.hash_func",
        params![
            namespace_id,
            key,
            value,
            entry.rehash.kind(),
            format_timestamp(entry.last_checked),
            frequency_millis(entry.check_frequency),
            hash_func,
        ],
    )?;
    tx.execute(
        "DELETE FROM entry_file_hashes WHERE namespace_id = ?1 AND key = ?2",
        params![namespace_id, key],
    )?;

    if let RehashCondition::FilesChanged { hashes, .. } = &entry.rehash {
        let mut insert = tx.prepare(
            "INSERT INTO entry_file_hashes (namespace_id, key, path, digest)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (path, digest) in hashes {
            insert.execute(params![
                namespace_id,
                key,
                path.to_string_lossy(),
                digest.as_str()
            ])?;
        }
    }
    Ok(())
}

fn touch_entry(
    tx: &Transaction<'_>,
    namespace_id: i64,
    key: &str,
    now: DateTime<Utc>,
) -> Result<(), CacheError> {
    tx.execute(
        "UPDATE entries SET last_checked = ?3 WHERE namespace_id = ?1 AND key = ?2",
        params![namespace_id, key, format_timestamp(now)],
    )?;
    Ok(())
}
