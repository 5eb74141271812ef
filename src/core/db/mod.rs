//! SQLite-backed store for users, equipment, inspections and reports
//!
//! Every operation is a parameterized SQL statement on a single connection.
//! Operations touching more than one row run inside a transaction.
//! Entity-specific methods live in the submodules as `impl Database` blocks.

mod equipment;
mod inspections;
mod reports;
mod schema;
mod users;

pub use equipment::CsvImportStats;
pub use inspections::UpcomingInspection;
pub use users::EngineerSummary;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, warn};

use crate::core::error::{StoreError, StoreResult};
use crate::core::nr13::{Category, FluidClass};
use crate::entities::{EquipmentType, InspectionKind, InspectionResult, InspectionStatus, Role};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Tables reported by [`Database::statistics`]
const TABLES: &[&str] = &["usuarios", "equipamentos", "inspecoes", "relatorios"];

/// Connection wrapper for the tracker database
pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
}

/// Row counts and file size
#[derive(Debug, Clone, Serialize)]
pub struct DbStats {
    pub path: Option<PathBuf>,
    pub schema_version: i32,
    pub rows: BTreeMap<String, usize>,
    pub size_bytes: u64,
}

impl Database {
    /// Open or create the database file and bring its schema up to date
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::configure(&conn, true)?;

        let mut db = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        db.migrate()?;
        debug!(path = %path.display(), "database opened");
        Ok(db)
    }

    /// Open a private in-memory database (used by tests)
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn, false)?;
        let mut db = Self { conn, path: None };
        db.migrate()?;
        Ok(db)
    }

    fn configure(conn: &Connection, file_backed: bool) -> StoreResult<()> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        if file_backed {
            // WAL lets several nr13 processes share the file
            conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        }
        Ok(())
    }

    /// Path of the database file, `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Health check: run a trivial statement
    pub fn check(&self) -> StoreResult<()> {
        let one: i64 = self.conn.query_row("SELECT 1", [], |row| row.get(0))?;
        if one != 1 {
            return Err(StoreError::conflict("database health check returned an unexpected value"));
        }
        Ok(())
    }

    /// Verify the connection and reopen it if the check fails
    ///
    /// Returns `true` when a new connection had to be opened.
    pub fn ensure_connected(&mut self) -> StoreResult<bool> {
        match self.check() {
            Ok(()) => Ok(false),
            Err(err) => {
                let Some(path) = self.path.clone() else {
                    return Err(err);
                };
                warn!(error = %err, "database check failed, reconnecting");
                let conn = Connection::open(&path)?;
                Self::configure(&conn, true)?;
                self.conn = conn;
                self.check()?;
                Ok(true)
            }
        }
    }

    /// Row counts per table and size of the database file
    pub fn statistics(&self) -> StoreResult<DbStats> {
        let mut rows = BTreeMap::new();
        for table in TABLES {
            let count: i64 =
                self.conn
                    .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
            rows.insert((*table).to_string(), count as usize);
        }

        let size_bytes = self
            .path
            .as_ref()
            .and_then(|p| fs::metadata(p).ok())
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(DbStats {
            path: self.path.clone(),
            schema_version: self.schema_version()?,
            rows,
            size_bytes,
        })
    }

    /// Execute a read-only SQL query, rendering every value as text
    pub fn query_raw(&self, sql: &str) -> StoreResult<Vec<Vec<String>>> {
        let mut stmt = self.conn.prepare(sql)?;
        if !stmt.readonly() {
            return Err(StoreError::Permission(
                "only read-only statements are allowed".to_string(),
            ));
        }
        let column_count = stmt.column_count();

        let rows = stmt.query_map([], |row| {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                let value: String = row
                    .get::<_, rusqlite::types::Value>(i)
                    .map(|v| match v {
                        rusqlite::types::Value::Null => "NULL".to_string(),
                        rusqlite::types::Value::Integer(i) => i.to_string(),
                        rusqlite::types::Value::Real(f) => f.to_string(),
                        rusqlite::types::Value::Text(s) => s,
                        rusqlite::types::Value::Blob(_) => "<blob>".to_string(),
                    })
                    .unwrap_or_default();
                values.push(value);
            }
            Ok(values)
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Column names a query would return
    pub fn query_columns(&self, sql: &str) -> StoreResult<Vec<String>> {
        let stmt = self.conn.prepare(sql)?;
        Ok(stmt.column_names().iter().map(|s| s.to_string()).collect())
    }
}

/// Store enums as their lowercase text form
macro_rules! sql_text_enum {
    ($($ty:ty),* $(,)?) => {$(
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.to_string()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: String| FromSqlError::Other(e.into()))
            }
        }
    )*};
}

sql_text_enum!(
    Role,
    EquipmentType,
    Category,
    FluidClass,
    InspectionKind,
    InspectionResult,
    InspectionStatus,
);

/// Normalize optional text input: trim, and treat empty as absent
pub(crate) fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests;
