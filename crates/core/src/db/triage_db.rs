use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use crate::db::{ClassificationRow, Record, Table};
use crate::model::{ClassificationResult, SessionRecord};

/// Minimum schema version we know how to handle.
///
/// `0` means "no schema yet" (fresh DB).
const MIN_SUPPORTED_SCHEMA_VERSION: i32 = 0;

/// Latest schema version this crate knows about.
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Error type for triage database operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// Underlying SQLite error.
    #[error("SQLite error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// The database was created with a newer schema version than we support.
    #[error(
        "Unsupported schema version {found}; supported range is {min_supported}..={max_supported}"
    )]
    UnsupportedSchemaVersion { found: i32, min_supported: i32, max_supported: i32 },
}

/// Convenience result type for DB operations.
pub type DbResult<T> = Result<T, DbError>;

/// Keyed record store used by discovery (skip known samples) and classification
/// (persist verdicts). Inserting a key that already exists is a no-op.
pub trait PersistenceGateway {
    fn exists(&self, table: Table, key: &str) -> DbResult<bool>;

    /// Returns `true` when a new row was written.
    fn insert(&self, record: &Record) -> DbResult<bool>;
}

/// SQLite-backed classification store.
#[derive(Debug)]
pub struct TriageDb {
    conn: Connection,
}

impl TriageDb {
    /// Open (or create) a database at the given path and ensure the schema exists.
    pub fn open(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        apply_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// In-memory database, mostly for tests.
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        apply_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Expose a reference to the underlying connection for advanced callers.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn insert_classification(&self, result: &ClassificationResult) -> DbResult<bool> {
        let recorded_at = chrono::Utc::now().to_rfc3339();
        let affected = self.conn.execute(
            r#"
            INSERT OR IGNORE INTO classifications (sample, classification, description, hash, user_comment, recorded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                result.sample_output_name,
                result.classification.as_str(),
                result.description,
                result.fault_hash,
                result.comment,
                recorded_at
            ],
        )?;
        Ok(affected > 0)
    }

    /// List all classification rows (ordered by insertion).
    pub fn list_classifications(&self) -> DbResult<Vec<ClassificationRow>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT sample, classification, description, hash, user_comment, recorded_at
            FROM classifications
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ClassificationRow {
                sample: row.get(0)?,
                classification: row.get(1)?,
                description: row.get(2)?,
                hash: row.get(3)?,
                user_comment: row.get(4)?,
                recorded_at: row.get(5)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn insert_session(&self, session: &SessionRecord) -> DbResult<bool> {
        let created_at = chrono::Utc::now().to_rfc3339();
        let affected = self.conn.execute(
            r#"
            INSERT OR IGNORE INTO sessions (session_id, process_group_id, created_at)
            VALUES (?1, ?2, ?3)
            "#,
            params![session.session_id, session.process_group_id, created_at],
        )?;
        Ok(affected > 0)
    }

    /// Look up a session by id.
    pub fn load_session(&self, session_id: &str) -> DbResult<Option<SessionRecord>> {
        let session = self
            .conn
            .query_row(
                "SELECT session_id, process_group_id FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| Ok(SessionRecord { session_id: row.get(0)?, process_group_id: row.get(1)? }),
            )
            .optional()?;
        Ok(session)
    }
}

impl PersistenceGateway for TriageDb {
    fn exists(&self, table: Table, key: &str) -> DbResult<bool> {
        let sql = match table {
            Table::Classifications => "SELECT 1 FROM classifications WHERE sample = ?1 LIMIT 1",
            Table::Sessions => "SELECT 1 FROM sessions WHERE session_id = ?1 LIMIT 1",
        };
        let found: Option<i64> =
            self.conn.query_row(sql, params![key], |row| row.get(0)).optional()?;
        Ok(found.is_some())
    }

    fn insert(&self, record: &Record) -> DbResult<bool> {
        match record {
            Record::Classification(result) => self.insert_classification(result),
            Record::Session(session) => self.insert_session(session),
        }
    }
}

/// Apply schema migrations to bring the database to the latest version.
///
/// We use `PRAGMA user_version` as the schema version indicator.
///
/// Version map:
/// - 0: no schema
/// - 1: classifications table
/// - 2: sessions table
fn apply_migrations(conn: &Connection) -> DbResult<()> {
    let mut current_version = current_schema_version(conn)?;

    if current_version > CURRENT_SCHEMA_VERSION {
        return Err(DbError::UnsupportedSchemaVersion {
            found: current_version,
            min_supported: MIN_SUPPORTED_SCHEMA_VERSION,
            max_supported: CURRENT_SCHEMA_VERSION,
        });
    }

    if current_version == 0 {
        conn.execute_batch(
            r#"
            BEGIN;
            CREATE TABLE IF NOT EXISTS classifications (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                sample         TEXT NOT NULL UNIQUE,
                classification TEXT NOT NULL,
                description    TEXT NOT NULL,
                hash           TEXT NOT NULL,
                user_comment   TEXT NOT NULL DEFAULT '',
                recorded_at    TEXT NOT NULL
            );
            PRAGMA user_version = 1;
            COMMIT;
            "#,
        )?;
        current_version = 1;
    }

    if current_version < 2 {
        conn.execute_batch(
            r#"
            BEGIN;
            CREATE TABLE IF NOT EXISTS sessions (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id       TEXT NOT NULL UNIQUE,
                process_group_id INTEGER NOT NULL,
                created_at       TEXT NOT NULL
            );
            PRAGMA user_version = 2;
            COMMIT;
            "#,
        )?;
    }

    Ok(())
}

/// Read the SQLite schema version from `PRAGMA user_version`.
fn current_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    Ok(version)
}
