//! SQLite storage bootstrap, schema migrations and the backing-store contract.
//!
//! # Responsibility
//! - Open and configure SQLite connections for keystone core.
//! - Apply schema migrations in deterministic order.
//! - Define the `Backend`/`Session` contract the persistence core consumes.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Core code must not read/write item data before migrations succeed.
//! - Every session owns its own connection; nothing is shared between calls.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod backend;
pub mod migrations;
mod open;
mod sqlite;

pub use backend::{Backend, ComponentLink, FieldRow, LikeQuery, Session};
pub use open::{open_db, open_db_in_memory};
pub use sqlite::{SqliteBackend, SqliteSession};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    MissingRequiredTable(String),
    MissingRequiredColumn {
        table: String,
        column: &'static str,
    },
    InvalidIdentifier(String),
    InvalidData(String),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "required table `{table}` is missing"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "required column `{table}.{column}` is missing")
            }
            Self::InvalidIdentifier(value) => write!(f, "invalid SQL identifier `{value}`"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Returns whether `value` is safe to interpolate as a table or column name.
///
/// Only lowercase ASCII letters, digits and `_` are accepted, and the first
/// character must be a letter.
pub fn is_valid_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
