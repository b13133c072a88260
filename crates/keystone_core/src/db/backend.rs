//! Backing-store contract consumed by the persistence core.
//!
//! # Responsibility
//! - Define what any pluggable store must provide: keyed and hashed loads,
//!   inserts, updates, deletes, counts, like-queries and component links.
//! - Keep field values backend-neutral through `FieldRow`.
//!
//! # Invariants
//! - A `Session` is used by exactly one operation and dropped afterwards.
//! - `begin` precedes every other call on a session; `commit` or `rollback`
//!   ends it.

use crate::db::{DbError, DbResult};
use crate::model::item::{HashKey, ItemKey, ModelType, Record};
use crate::store::registry::StorageHandle;
use rusqlite::types::Value;

/// Content columns of one stored row, by column name.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRow {
    table: String,
    values: Vec<(&'static str, Value)>,
}

impl FieldRow {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            values: Vec::new(),
        }
    }

    pub fn push(&mut self, column: &'static str, value: Value) {
        self.values.push((column, value));
    }

    pub fn value(&self, column: &str) -> DbResult<&Value> {
        self.values
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
            .ok_or_else(|| {
                DbError::InvalidData(format!("column `{}.{column}` was not loaded", self.table))
            })
    }

    /// Reads a text column; `NULL` is read as an empty string.
    pub fn text(&self, column: &str) -> DbResult<String> {
        match self.value(column)? {
            Value::Text(text) => Ok(text.clone()),
            Value::Null => Ok(String::new()),
            other => Err(DbError::InvalidData(format!(
                "expected text in `{}.{column}`, found {:?}",
                self.table,
                other.data_type()
            ))),
        }
    }
}

/// One persisted entry of a composite slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentLink {
    /// Map key as text; empty for set and single-reference slots.
    pub discriminant: String,
    pub child_model: String,
    pub child_key: ItemKey,
}

impl ComponentLink {
    pub fn new(discriminant: impl Into<String>, child_model: ModelType, child_key: ItemKey) -> Self {
        Self {
            discriminant: discriminant.into(),
            child_model: child_model.name().to_string(),
            child_key,
        }
    }
}

/// `LIKE` predicate over one registered column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikeQuery {
    column: String,
    pattern: String,
    limit: Option<u32>,
}

impl LikeQuery {
    /// Uses `pattern` as-is, including any `%`/`_` wildcards.
    pub fn on(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            pattern: pattern.into(),
            limit: None,
        }
    }

    /// Matches rows whose column contains `fragment` literally.
    pub fn contains(column: impl Into<String>, fragment: &str) -> Self {
        Self::on(column, format!("%{}%", escape_like(fragment)))
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }
}

/// Escapes `LIKE` wildcards with `\`, matching `ESCAPE '\'`.
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Unit-of-work scoped connection to the backing store.
pub trait Session {
    fn begin(&self) -> DbResult<()>;
    fn commit(&self) -> DbResult<()>;
    fn rollback(&self) -> DbResult<()>;

    fn load_by_id<T: Record>(&self, storage: &StorageHandle, key: ItemKey) -> DbResult<Option<T>>;

    /// Returns every row carrying `hash`, oldest first.
    fn load_by_hash<T: Record>(&self, storage: &StorageHandle, hash: &HashKey) -> DbResult<Vec<T>>;

    /// Inserts a new row and returns its assigned key.
    ///
    /// Hashed storages require `hash`; plain storages ignore it.
    fn insert<T: Record>(
        &self,
        storage: &StorageHandle,
        item: &T,
        hash: Option<&HashKey>,
    ) -> DbResult<ItemKey>;

    /// Rewrites content columns; returns `false` when the row does not exist.
    fn update<T: Record>(&self, storage: &StorageHandle, item: &T) -> DbResult<bool>;

    fn delete(&self, storage: &StorageHandle, key: ItemKey) -> DbResult<bool>;

    fn count_all(&self, storage: &StorageHandle) -> DbResult<u64>;

    fn query_like<T: Record>(&self, storage: &StorageHandle, query: &LikeQuery) -> DbResult<Vec<T>>;

    /// Replaces all links of one owner slot.
    fn replace_links(
        &self,
        owner_model: ModelType,
        owner_key: ItemKey,
        slot: &str,
        links: &[ComponentLink],
    ) -> DbResult<()>;

    fn load_links(
        &self,
        owner_model: ModelType,
        owner_key: ItemKey,
        slot: &str,
    ) -> DbResult<Vec<ComponentLink>>;

    /// Deletes every link owned by one item; returns the number removed.
    fn delete_links(&self, owner_model: ModelType, owner_key: ItemKey) -> DbResult<usize>;

    /// Number of links, across all owners, that point at one item.
    fn reference_count(&self, child_model: ModelType, child_key: ItemKey) -> DbResult<u64>;

    /// Keys of `owner_model` items that link to one child, ascending.
    fn owners_of(
        &self,
        owner_model: ModelType,
        child_model: ModelType,
        child_key: ItemKey,
    ) -> DbResult<Vec<ItemKey>>;
}

/// Source of fresh sessions.
pub trait Backend {
    type Session: Session;

    fn open_session(&self) -> DbResult<Self::Session>;

    /// Checks that the table behind `storage` exists with every column.
    fn verify_storage(&self, storage: &StorageHandle) -> DbResult<()>;
}
