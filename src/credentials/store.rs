//! SQLite-backed credential store.

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use super::{encryption, AuthorizationRecord};
use crate::platform::Platform;

/// Encrypted key-value store of authorization records.
///
/// # Schema
/// ```sql
/// CREATE TABLE auth_state (
///     platform TEXT NOT NULL,
///     account_id INTEGER NOT NULL,
///     state TEXT NOT NULL,       -- sealed blob
///     created_at TEXT NOT NULL,  -- ISO 8601
///     updated_at TEXT NOT NULL,  -- ISO 8601
///     PRIMARY KEY (platform, account_id)
/// );
/// ```
///
/// All operations are single-record; no transaction spans more than one
/// row. The connection is wrapped in a Mutex, and SQLite's serialized mode
/// keeps concurrent access safe.
pub struct CredentialStore {
    conn: Mutex<Connection>,
    key: Vec<u8>,
}

impl CredentialStore {
    /// Open (or create) a store at `db_path` with a base64 master key.
    pub fn new<P: AsRef<Path>>(db_path: P, key_base64: &str) -> Result<Self> {
        let key = encryption::load_key(key_base64).context("invalid master key")?;
        let conn = Connection::open(db_path).context("failed to open credential database")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS auth_state (
                platform TEXT NOT NULL,
                account_id INTEGER NOT NULL,
                state TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (platform, account_id)
            )
            "#,
            [],
        )
        .context("failed to create auth_state table")?;

        Ok(Self {
            conn: Mutex::new(conn),
            key,
        })
    }

    /// Fetch one record. `Ok(None)` when the pair was never stored.
    ///
    /// An unsealing failure surfaces as an error; callers decide whether a
    /// corrupt blob means "no prior authorization".
    pub fn get(&self, platform: Platform, account_id: i64) -> Result<Option<AuthorizationRecord>> {
        let conn = self.conn.lock().unwrap();
        let sealed: Option<String> = conn
            .query_row(
                "SELECT state FROM auth_state WHERE platform = ?1 AND account_id = ?2",
                params![platform.as_str(), account_id],
                |row| row.get(0),
            )
            .optional()
            .context("failed to query auth state")?;

        match sealed {
            Some(sealed) => {
                let state = encryption::unseal(&sealed, &self.key)
                    .context("failed to unseal stored auth state")?;
                Ok(Some(AuthorizationRecord {
                    platform,
                    account_id,
                    state,
                }))
            }
            None => Ok(None),
        }
    }

    /// Upsert one record, keyed by `(platform, account_id)`.
    pub fn put(&self, record: &AuthorizationRecord) -> Result<()> {
        let sealed = encryption::seal(&record.state, &self.key)
            .context("failed to seal auth state")?;
        let now = Utc::now().to_rfc3339();

        self.conn
            .lock()
            .unwrap()
            .execute(
                r#"
                INSERT INTO auth_state (platform, account_id, state, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?4)
                ON CONFLICT(platform, account_id) DO UPDATE SET
                    state = excluded.state,
                    updated_at = excluded.updated_at
                "#,
                params![record.platform.as_str(), record.account_id, sealed, now],
            )
            .context("failed to store auth state")?;

        Ok(())
    }

    /// Delete one record. Returns whether a row existed.
    pub fn delete(&self, platform: Platform, account_id: i64) -> Result<bool> {
        let affected = self
            .conn
            .lock()
            .unwrap()
            .execute(
                "DELETE FROM auth_state WHERE platform = ?1 AND account_id = ?2",
                params![platform.as_str(), account_id],
            )
            .context("failed to delete auth state")?;
        Ok(affected > 0)
    }

    /// All stored records, across every platform.
    ///
    /// Used once at startup to discover previously linked accounts. Rows
    /// whose blob no longer unseals are skipped with a warning rather than
    /// failing the whole listing.
    pub fn list_all(&self) -> Result<Vec<AuthorizationRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT platform, account_id, state FROM auth_state ORDER BY platform, account_id",
            )
            .context("failed to prepare listing")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .context("failed to list auth states")?;

        let mut records = Vec::new();
        for row in rows {
            let (platform_tag, account_id, sealed) = row.context("failed to read row")?;
            let Some(platform) = Platform::parse(&platform_tag) else {
                tracing::warn!(platform = %platform_tag, "skipping row with unknown platform");
                continue;
            };
            match encryption::unseal(&sealed, &self.key) {
                Ok(state) => records.push(AuthorizationRecord {
                    platform,
                    account_id,
                    state,
                }),
                Err(e) => {
                    tracing::warn!(
                        platform = %platform,
                        account_id,
                        error = %e,
                        "skipping unreadable auth state"
                    );
                }
            }
        }
        Ok(records)
    }

    /// Store a raw pre-sealed value, bypassing encryption.
    ///
    /// Only exists so tests can plant corrupt blobs.
    #[cfg(test)]
    pub(crate) fn put_raw(&self, platform: Platform, account_id: i64, sealed: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .lock()
            .unwrap()
            .execute(
                r#"
                INSERT INTO auth_state (platform, account_id, state, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?4)
                ON CONFLICT(platform, account_id) DO UPDATE SET
                    state = excluded.state,
                    updated_at = excluded.updated_at
                "#,
                params![platform.as_str(), account_id, sealed, now],
            )
            .context("failed to store raw state")?;
        Ok(())
    }
}
