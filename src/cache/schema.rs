//! Versioned, strictly additive migrations for the cache store.
//!
//! The applied version lives in `PRAGMA user_version`. Each migration runs in
//! its own transaction together with the version bump.

use rusqlite::{Connection, TransactionBehavior};

use super::CacheError;

const MIGRATIONS: &[&str] = &[
    // 1: namespaces and their entries
    r#"
    CREATE TABLE namespaces (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL
    );

    CREATE TABLE entries (
        namespace_id INTEGER NOT NULL REFERENCES namespaces(id) ON DELETE CASCADE,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        rehash_kind TEXT NOT NULL,
        last_checked TEXT NOT NULL,
        check_frequency_ms INTEGER NOT NULL,
        PRIMARY KEY (namespace_id, key)
    );
    "#,
    // 2: per-file digests for files_changed entries
    r#"
    ALTER TABLE entries ADD COLUMN hash_func TEXT;

    CREATE TABLE entry_file_hashes (
        namespace_id INTEGER NOT NULL,
        key TEXT NOT NULL,
        path TEXT NOT NULL,
        digest TEXT NOT NULL,
        PRIMARY KEY (namespace_id, key, path),
        FOREIGN KEY (namespace_id, key)
            REFERENCES entries(namespace_id, key) ON DELETE CASCADE
    );
    "#,
];

/// Schema version this build reads and writes.
pub const CURRENT_VERSION: u32 = MIGRATIONS.len() as u32;

pub fn version(conn: &Connection) -> Result<u32, CacheError> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Bring the store up to [`CURRENT_VERSION`].
pub fn migrate(conn: &mut Connection) -> Result<(), CacheError> {
    migrate_to(conn, CURRENT_VERSION)
}

pub fn migrate_to(conn: &mut Connection, target: u32) -> Result<(), CacheError> {
    if target > CURRENT_VERSION {
        return Err(CacheError::UnknownSchemaVersion {
            found: target,
            supported: CURRENT_VERSION,
        });
    }

    // The version is re-read under the write lock on every step: another
    // process may have migrated the store since we last looked.
    loop {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let found = version(&tx)?;
        if found > CURRENT_VERSION {
            return Err(CacheError::UnknownSchemaVersion {
                found,
                supported: CURRENT_VERSION,
            });
        }
        if target < found {
            return Err(CacheError::BackwardMigration {
                from: found,
                to: target,
            });
        }
        if found == target {
            tx.commit()?;
            return Ok(());
        }

        let next = found + 1;
        tx.execute_batch(MIGRATIONS[(next - 1) as usize])?;
        tx.pragma_update(None, "user_version", next)?;
        tx.commit()?;
        tracing::info!("Migrated cache schema to version {next}");
    }
}
