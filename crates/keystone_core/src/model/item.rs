//! Persistable item contracts.
//!
//! # Responsibility
//! - Define surrogate identity (`ItemKey`) and content identity (`HashKey`).
//! - Define the traits every stored model implements: `Item`, `Record`,
//!   `HashedItem` and `CompositeItem`.
//! - Describe composite component slots as typed `ComponentSlot` values.
//!
//! # Invariants
//! - `key == 0` means transient; a non-zero key never changes for a value.
//! - A hash key is computed at most once per value and only from semantic
//!   fields, never from the surrogate key.
//! - Content changes produce a new value with a fresh transient identity.

use crate::db::{DbResult, FieldRow};
use crate::store::{Component, StoreResult};
use once_cell::unsync::OnceCell;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

/// Surrogate identifier assigned by the backing store.
pub type ItemKey = i64;

/// Key carried by items that were never persisted.
pub const TRANSIENT_KEY: ItemKey = 0;

const HASH_FIELD_SEPARATOR: u8 = 0x1f;
const SHORT_HASH_CHARS: usize = 12;

/// Stable name of a model type, used for registry lookup and link rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModelType(&'static str);

impl ModelType {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl Display for ModelType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Lowercase hex SHA-256 digest of an item's semantic fields.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashKey(String);

impl HashKey {
    /// Digests fields in order, separated by an ASCII unit separator so that
    /// `("ab", "c")` and `("a", "bc")` never collide by concatenation.
    pub fn digest<'a>(fields: impl IntoIterator<Item = &'a str>) -> Self {
        let mut hasher = Sha256::new();
        for (index, field) in fields.into_iter().enumerate() {
            if index > 0 {
                hasher.update([HASH_FIELD_SEPARATOR]);
            }
            hasher.update(field.as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// Wraps a hash value read back from storage.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix used in diagnostics.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(SHORT_HASH_CHARS) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl Display for HashKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Surrogate key plus the lazily computed content hash of one value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Identity {
    #[serde(default)]
    key: ItemKey,
    #[serde(skip)]
    hash: OnceCell<HashKey>,
}

impl Identity {
    /// Identity of a value that was never persisted.
    pub fn transient() -> Self {
        Self::default()
    }

    pub fn key(&self) -> ItemKey {
        self.key
    }

    pub fn is_transient(&self) -> bool {
        self.key == TRANSIENT_KEY
    }

    /// Returns the cached hash without computing it.
    pub fn cached_hash(&self) -> Option<&HashKey> {
        self.hash.get()
    }

    pub(crate) fn hash_or_init(&self, compute: impl FnOnce() -> HashKey) -> &HashKey {
        self.hash.get_or_init(compute)
    }

    pub(crate) fn assign_key(&mut self, key: ItemKey) {
        self.key = key;
    }

    pub(crate) fn assign_hash(&mut self, hash: HashKey) {
        self.hash = OnceCell::with_value(hash);
    }
}

/// Base contract of every persistable unit.
pub trait Item: Clone + std::fmt::Debug {
    const MODEL: ModelType;

    fn identity(&self) -> &Identity;
    fn identity_mut(&mut self) -> &mut Identity;

    fn key(&self) -> ItemKey {
        self.identity().key()
    }

    fn was_saved(&self) -> bool {
        self.key() > TRANSIENT_KEY
    }
}

/// Static storage shape of a model type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelDescriptor {
    pub model: ModelType,
    pub default_table: &'static str,
    pub columns: &'static [&'static str],
    pub hashed: bool,
}

/// Column mapping between an item and its stored row.
///
/// `id` and `hash_key` are managed by the store and are not listed in
/// `COLUMNS`.
pub trait Record: Item {
    const DEFAULT_TABLE: &'static str;
    const COLUMNS: &'static [&'static str];
    const HASHED: bool = false;

    /// Values aligned with `COLUMNS`.
    fn field_values(&self) -> Vec<Value>;

    /// Rebuilds a transient value from stored content columns.
    fn from_fields(row: &FieldRow) -> DbResult<Self>;

    fn descriptor() -> ModelDescriptor {
        ModelDescriptor {
            model: Self::MODEL,
            default_table: Self::DEFAULT_TABLE,
            columns: Self::COLUMNS,
            hashed: Self::HASHED,
        }
    }
}

/// Value-like items deduplicated by content on save.
pub trait HashedItem: Record {
    /// Semantic fields in a fixed order; must exclude the surrogate key.
    fn hash_fields(&self) -> Vec<&str>;

    fn hash_key(&self) -> HashKey {
        self.identity()
            .hash_or_init(|| HashKey::digest(self.hash_fields()))
            .clone()
    }

    fn same_content(&self, other: &Self) -> bool {
        self.hash_fields() == other.hash_fields()
    }
}

/// Map key of a `ComponentSlot::Map`, persisted as text.
pub trait Discriminant: Ord + Clone {
    fn to_discriminant(&self) -> String;
    fn from_discriminant(value: &str) -> Option<Self>;
}

/// Discriminant of set and single-reference slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Unkeyed;

impl Discriminant for Unkeyed {
    fn to_discriminant(&self) -> String {
        String::new()
    }

    fn from_discriminant(value: &str) -> Option<Self> {
        value.is_empty().then_some(Unkeyed)
    }
}

/// Mutable view of one composite slot.
pub enum ComponentSlot<'a, D, C> {
    Map(&'a mut BTreeMap<D, C>),
    Set(&'a mut BTreeSet<C>),
    SingleRef(&'a mut C),
}

impl<'a, D, C> ComponentSlot<'a, D, C> {
    pub fn map(entries: &'a mut BTreeMap<D, C>) -> Self {
        Self::Map(entries)
    }
}

impl<'a, C> ComponentSlot<'a, Unkeyed, C> {
    pub fn set(members: &'a mut BTreeSet<C>) -> Self {
        Self::Set(members)
    }

    pub fn single(target: &'a mut C) -> Self {
        Self::SingleRef(target)
    }
}

/// Receives each slot of a composite in declaration order.
pub trait SlotVisitor {
    fn visit<D: Discriminant, C: Component>(
        &mut self,
        slot: &'static str,
        contents: ComponentSlot<'_, D, C>,
    ) -> StoreResult<()>;
}

/// Item owning nested component slots.
pub trait CompositeItem: Record {
    /// Slot names in the order `visit_slots` reports them.
    const SLOTS: &'static [&'static str];

    fn visit_slots<V: SlotVisitor>(&mut self, visitor: &mut V) -> StoreResult<()>;
}
