//! SQLite implementation of the backing-store contract.
//!
//! # Responsibility
//! - Hand out one freshly configured connection per session.
//! - Translate `Session` calls into SQL over registered tables and the
//!   shared `component_links` table.
//!
//! # Invariants
//! - Table and column names reach SQL only after `is_valid_identifier`.
//! - Hashed tables always receive a `hash_key` on insert.
//! - In-memory databases live as long as the backend's anchor connection.

use super::backend::{Backend, ComponentLink, FieldRow, LikeQuery, Session};
use super::open::{configure_connection, open_db, open_shared_memory, shared_memory_flags};
use super::{is_valid_identifier, DbError, DbResult};
use crate::config::DatabaseConfig;
use crate::model::item::{HashKey, ItemKey, ModelType, Record};
use crate::store::registry::StorageHandle;
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone)]
enum Target {
    File(PathBuf),
    SharedMemory(String),
}

/// Backend opening a new SQLite connection for every unit of work.
#[derive(Debug)]
pub struct SqliteBackend {
    target: Target,
    // Keeps a shared in-memory database alive between sessions.
    _anchor: Option<Mutex<Connection>>,
}

impl SqliteBackend {
    /// Uses a database file, creating and migrating it when needed.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        drop(open_db(&path)?);
        Ok(Self {
            target: Target::File(path),
            _anchor: None,
        })
    }

    /// Uses a private, named in-memory database shared by this backend's
    /// sessions only.
    pub fn in_memory() -> DbResult<Self> {
        let uri = format!("file:keystone-{}?mode=memory&cache=shared", Uuid::new_v4());
        let anchor = open_shared_memory(&uri)?;
        Ok(Self {
            target: Target::SharedMemory(uri),
            _anchor: Some(Mutex::new(anchor)),
        })
    }

    /// File database when a path is configured, in-memory otherwise.
    pub fn from_config(config: &DatabaseConfig) -> DbResult<Self> {
        match &config.path {
            Some(path) => Self::open(path),
            None => Self::in_memory(),
        }
    }

    /// Database file path; `None` for in-memory backends.
    pub fn path(&self) -> Option<&Path> {
        match &self.target {
            Target::File(path) => Some(path),
            Target::SharedMemory(_) => None,
        }
    }

    /// Opens a raw configured connection to the same database.
    pub fn connect(&self) -> DbResult<Connection> {
        let conn = match &self.target {
            Target::File(path) => Connection::open(path)?,
            Target::SharedMemory(uri) => Connection::open_with_flags(uri, shared_memory_flags())?,
        };
        configure_connection(&conn)?;
        Ok(conn)
    }
}

impl Backend for SqliteBackend {
    type Session = SqliteSession;

    fn open_session(&self) -> DbResult<SqliteSession> {
        let conn = self.connect()?;
        debug!("event=session_open module=db status=ok");
        Ok(SqliteSession { conn })
    }

    fn verify_storage(&self, storage: &StorageHandle) -> DbResult<()> {
        let conn = self.connect()?;
        let table = checked_identifier(storage.table())?;
        if !table_exists(&conn, table)? {
            return Err(DbError::MissingRequiredTable(table.to_string()));
        }

        let managed: &[&'static str] = if storage.is_hashed() {
            &["id", "hash_key"]
        } else {
            &["id"]
        };
        for column in managed.iter().chain(storage.columns()) {
            checked_identifier(column)?;
            if !table_has_column(&conn, table, column)? {
                return Err(DbError::MissingRequiredColumn {
                    table: table.to_string(),
                    column: *column,
                });
            }
        }
        Ok(())
    }
}

/// One connection scoped to a single unit of work.
#[derive(Debug)]
pub struct SqliteSession {
    conn: Connection,
}

struct StoredRow {
    key: ItemKey,
    hash: Option<String>,
    fields: FieldRow,
}

impl StoredRow {
    fn into_item<T: Record>(self) -> DbResult<T> {
        let mut item = T::from_fields(&self.fields)?;
        item.identity_mut().assign_key(self.key);
        if let Some(hash) = self.hash {
            item.identity_mut().assign_hash(HashKey::from_stored(hash));
        }
        Ok(item)
    }
}

impl Session for SqliteSession {
    fn begin(&self) -> DbResult<()> {
        self.conn.execute_batch("BEGIN IMMEDIATE;")?;
        Ok(())
    }

    fn commit(&self) -> DbResult<()> {
        self.conn.execute_batch("COMMIT;")?;
        Ok(())
    }

    fn rollback(&self) -> DbResult<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK;")?;
        }
        Ok(())
    }

    fn load_by_id<T: Record>(&self, storage: &StorageHandle, key: ItemKey) -> DbResult<Option<T>> {
        let sql = format!("{} WHERE id = ?1;", select_sql(storage)?);
        let stored = self
            .conn
            .query_row(&sql, [key], |row| read_stored_row(storage, row))
            .optional()?;
        stored.map(StoredRow::into_item).transpose()
    }

    fn load_by_hash<T: Record>(&self, storage: &StorageHandle, hash: &HashKey) -> DbResult<Vec<T>> {
        if !storage.is_hashed() {
            return Err(DbError::InvalidData(format!(
                "table `{}` does not store hash keys",
                storage.table()
            )));
        }
        let sql = format!("{} WHERE hash_key = ?1 ORDER BY id ASC;", select_sql(storage)?);
        self.load_many(storage, &sql, params![hash.as_str()])
    }

    fn insert<T: Record>(
        &self,
        storage: &StorageHandle,
        item: &T,
        hash: Option<&HashKey>,
    ) -> DbResult<ItemKey> {
        let table = checked_identifier(storage.table())?;
        let mut columns: Vec<&str> = Vec::with_capacity(storage.columns().len() + 1);
        let mut values: Vec<Value> = Vec::with_capacity(storage.columns().len() + 1);

        if storage.is_hashed() {
            let hash = hash.ok_or_else(|| {
                DbError::InvalidData(format!("insert into hashed table `{table}` without hash key"))
            })?;
            columns.push("hash_key");
            values.push(Value::Text(hash.as_str().to_string()));
        }
        columns.extend(storage.columns().iter().copied());
        values.extend(aligned_values(storage, item)?);

        if columns.is_empty() {
            self.conn
                .execute(&format!("INSERT INTO {table} DEFAULT VALUES;"), [])?;
        } else {
            for column in &columns {
                checked_identifier(column)?;
            }
            let placeholders = (1..=columns.len())
                .map(|index| format!("?{index}"))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "INSERT INTO {table} ({}) VALUES ({placeholders});",
                columns.join(", ")
            );
            self.conn.execute(&sql, params_from_iter(values))?;
        }
        Ok(self.conn.last_insert_rowid())
    }

    fn update<T: Record>(&self, storage: &StorageHandle, item: &T) -> DbResult<bool> {
        let table = checked_identifier(storage.table())?;
        if storage.is_hashed() {
            return Err(DbError::InvalidData(format!(
                "rows of hashed table `{table}` are immutable"
            )));
        }

        if storage.columns().is_empty() {
            let exists: i64 = self.conn.query_row(
                &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?1);"),
                [item.key()],
                |row| row.get(0),
            )?;
            return Ok(exists == 1);
        }

        let mut assignments = Vec::with_capacity(storage.columns().len());
        for (index, column) in storage.columns().iter().enumerate() {
            checked_identifier(column)?;
            assignments.push(format!("{column} = ?{}", index + 1));
        }
        let mut values = aligned_values(storage, item)?;
        values.push(Value::Integer(item.key()));
        let sql = format!(
            "UPDATE {table} SET {} WHERE id = ?{};",
            assignments.join(", "),
            values.len()
        );
        let changed = self.conn.execute(&sql, params_from_iter(values))?;
        Ok(changed > 0)
    }

    fn delete(&self, storage: &StorageHandle, key: ItemKey) -> DbResult<bool> {
        let table = checked_identifier(storage.table())?;
        let changed = self
            .conn
            .execute(&format!("DELETE FROM {table} WHERE id = ?1;"), [key])?;
        Ok(changed > 0)
    }

    fn count_all(&self, storage: &StorageHandle) -> DbResult<u64> {
        let table = checked_identifier(storage.table())?;
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn query_like<T: Record>(&self, storage: &StorageHandle, query: &LikeQuery) -> DbResult<Vec<T>> {
        let column = query.column();
        if !storage.columns().iter().any(|known| *known == column) {
            return Err(DbError::InvalidIdentifier(format!(
                "{}.{column}",
                storage.table()
            )));
        }
        checked_identifier(column)?;

        let mut sql = format!(
            "{} WHERE {column} LIKE ?1 ESCAPE '\\' ORDER BY id ASC",
            select_sql(storage)?
        );
        if let Some(limit) = query.limit() {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        sql.push(';');
        self.load_many(storage, &sql, params![query.pattern()])
    }

    fn replace_links(
        &self,
        owner_model: ModelType,
        owner_key: ItemKey,
        slot: &str,
        links: &[ComponentLink],
    ) -> DbResult<()> {
        self.conn.execute(
            "DELETE FROM component_links
             WHERE owner_model = ?1 AND owner_key = ?2 AND slot = ?3;",
            params![owner_model.name(), owner_key, slot],
        )?;

        let mut stmt = self.conn.prepare(
            "INSERT OR IGNORE INTO component_links (
                owner_model, owner_key, slot, discriminant, child_model, child_key
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
        )?;
        for link in links {
            stmt.execute(params![
                owner_model.name(),
                owner_key,
                slot,
                link.discriminant,
                link.child_model,
                link.child_key
            ])?;
        }
        Ok(())
    }

    fn load_links(
        &self,
        owner_model: ModelType,
        owner_key: ItemKey,
        slot: &str,
    ) -> DbResult<Vec<ComponentLink>> {
        let mut stmt = self.conn.prepare(
            "SELECT discriminant, child_model, child_key
             FROM component_links
             WHERE owner_model = ?1 AND owner_key = ?2 AND slot = ?3
             ORDER BY discriminant ASC, child_key ASC;",
        )?;
        let rows = stmt.query_map(params![owner_model.name(), owner_key, slot], |row| {
            Ok(ComponentLink {
                discriminant: row.get(0)?,
                child_model: row.get(1)?,
                child_key: row.get(2)?,
            })
        })?;

        let mut links = Vec::new();
        for link in rows {
            links.push(link?);
        }
        Ok(links)
    }

    fn delete_links(&self, owner_model: ModelType, owner_key: ItemKey) -> DbResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM component_links WHERE owner_model = ?1 AND owner_key = ?2;",
            params![owner_model.name(), owner_key],
        )?;
        Ok(removed)
    }

    fn reference_count(&self, child_model: ModelType, child_key: ItemKey) -> DbResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM component_links WHERE child_model = ?1 AND child_key = ?2;",
            params![child_model.name(), child_key],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn owners_of(
        &self,
        owner_model: ModelType,
        child_model: ModelType,
        child_key: ItemKey,
    ) -> DbResult<Vec<ItemKey>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT owner_key
             FROM component_links
             WHERE owner_model = ?1 AND child_model = ?2 AND child_key = ?3
             ORDER BY owner_key ASC;",
        )?;
        let rows = stmt.query_map(
            params![owner_model.name(), child_model.name(), child_key],
            |row| row.get::<_, ItemKey>(0),
        )?;

        let mut owners = Vec::new();
        for owner in rows {
            owners.push(owner?);
        }
        Ok(owners)
    }
}

impl SqliteSession {
    fn load_many<T: Record, P: rusqlite::Params>(
        &self,
        storage: &StorageHandle,
        sql: &str,
        params: P,
    ) -> DbResult<Vec<T>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| read_stored_row(storage, row))?;

        let mut items = Vec::new();
        for stored in rows {
            items.push(stored?.into_item()?);
        }
        Ok(items)
    }
}

fn select_sql(storage: &StorageHandle) -> DbResult<String> {
    let table = checked_identifier(storage.table())?;
    let mut columns = vec!["id"];
    if storage.is_hashed() {
        columns.push("hash_key");
    }
    for column in storage.columns() {
        columns.push(checked_identifier(column)?);
    }
    Ok(format!("SELECT {} FROM {table}", columns.join(", ")))
}

fn read_stored_row(storage: &StorageHandle, row: &Row<'_>) -> rusqlite::Result<StoredRow> {
    let key: ItemKey = row.get(0)?;
    let mut next = 1;
    let hash = if storage.is_hashed() {
        next += 1;
        Some(row.get::<_, String>(1)?)
    } else {
        None
    };

    let mut fields = FieldRow::new(storage.table());
    for (offset, column) in storage.columns().iter().enumerate() {
        fields.push(*column, row.get::<_, Value>(next + offset)?);
    }
    Ok(StoredRow { key, hash, fields })
}

fn aligned_values<T: Record>(storage: &StorageHandle, item: &T) -> DbResult<Vec<Value>> {
    let values = item.field_values();
    if values.len() != storage.columns().len() {
        return Err(DbError::InvalidData(format!(
            "model `{}` produced {} values for {} columns of `{}`",
            T::MODEL,
            values.len(),
            storage.columns().len(),
            storage.table()
        )));
    }
    Ok(values)
}

fn checked_identifier(value: &str) -> DbResult<&str> {
    if is_valid_identifier(value) {
        Ok(value)
    } else {
        Err(DbError::InvalidIdentifier(value.to_string()))
    }
}

fn table_exists(conn: &Connection, table: &str) -> DbResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> DbResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
