//! Persistence core: surrogate identity, hash dedup and composite cascades.
//!
//! # Responsibility
//! - Expose the stores that run inside one unit of work:
//!   `SurrogateStore`, `HashedStore` and `CompositeCascader`.
//! - Define the error taxonomy returned by every persistence operation.
//! - Provide `ItemRepository` as the entry point that wraps each call in
//!   its own `TransactionContext`.
//!
//! # Invariants
//! - Every public operation opens one session, runs in one transaction and
//!   closes the session before returning.
//! - Errors are values; nothing unwinds past the transaction boundary.

use crate::db::{DbError, Session};
use crate::model::item::{HashKey, ItemKey, Item, ModelType, Record};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod cascade;
pub mod hashed;
pub mod registry;
pub mod repository;
pub mod surrogate;
pub mod transaction;

pub use cascade::CompositeCascader;
pub use hashed::HashedStore;
pub use registry::{RegistryError, StorageHandle, StorageRegistry, StorageRegistryBuilder};
pub use repository::ItemRepository;
pub use surrogate::SurrogateStore;
pub use transaction::{TransactionContext, TxState};

pub type StoreResult<T> = Result<T, StoreError>;

/// Runtime switches of the persistence core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Compare full content after a hash hit before reusing a row.
    pub verify_hash_content: bool,
    /// Remove unreferenced children together with their composite.
    pub cascade_remove: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            verify_hash_content: true,
            cascade_remove: false,
        }
    }
}

/// What a failed lookup was searching for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Key(ItemKey),
    Hash(HashKey),
    Component { slot: String, discriminant: String },
}

impl Display for Lookup {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Key(key) => write!(f, "key {key}"),
            Self::Hash(hash) => write!(f, "hash {}", hash.short()),
            Self::Component { slot, discriminant } if discriminant.is_empty() => {
                write!(f, "slot `{slot}`")
            }
            Self::Component { slot, discriminant } => {
                write!(f, "slot `{slot}` entry `{discriminant}`")
            }
        }
    }
}

/// Error taxonomy of the persistence core.
#[derive(Debug)]
pub enum StoreError {
    NotFound {
        model: ModelType,
        lookup: Lookup,
    },
    Persistence(DbError),
    /// An update targeted a row that no longer exists.
    Conflict {
        model: ModelType,
        key: ItemKey,
    },
    /// Removal refused because other items still link to this one.
    StillReferenced {
        model: ModelType,
        key: ItemKey,
        references: u64,
    },
    NoSuchStorage(String),
    UnknownSlot {
        model: ModelType,
        slot: String,
    },
    InvalidState(TxState),
}

impl StoreError {
    pub fn not_found(model: ModelType, lookup: Lookup) -> Self {
        Self::NotFound { model, lookup }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Stable code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Persistence(_) => "persistence_failure",
            Self::Conflict { .. } => "concurrency_conflict",
            Self::StillReferenced { .. } => "still_referenced",
            Self::NoSuchStorage(_) => "no_such_storage",
            Self::UnknownSlot { .. } => "unknown_slot",
            Self::InvalidState(_) => "invalid_state",
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { model, lookup } => write!(f, "{model} not found by {lookup}"),
            Self::Persistence(err) => write!(f, "persistence failure: {err}"),
            Self::Conflict { model, key } => {
                write!(f, "{model} with key {key} was modified or removed concurrently")
            }
            Self::StillReferenced {
                model,
                key,
                references,
            } => write!(
                f,
                "{model} with key {key} is still referenced by {references} component link(s)"
            ),
            Self::NoSuchStorage(name) => write!(f, "no such storage configured: {name}"),
            Self::UnknownSlot { model, slot } => write!(f, "{model} has no component slot `{slot}`"),
            Self::InvalidState(state) => {
                write!(f, "transaction context already used (state: {state})")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Persistence(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Persistence(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Persistence(DbError::Sqlite(value))
    }
}

/// How one model type saves, loads and removes itself inside a unit of work.
///
/// Value objects delegate to `HashedStore`, composites to
/// `CompositeCascader`. `Ord` compares content only, so sets of components
/// stay unique by value.
pub trait Component: Record + Ord {
    fn save_within<S: Session>(self, uow: &UnitOfWork<'_, S>) -> StoreResult<Self>;
    fn load_within<S: Session>(key: ItemKey, uow: &UnitOfWork<'_, S>) -> StoreResult<Self>;
    fn remove_within<S: Session>(&self, uow: &UnitOfWork<'_, S>) -> StoreResult<bool>;
}

/// Everything a store needs while one transaction is active.
pub struct UnitOfWork<'a, S: Session> {
    session: &'a S,
    registry: &'a StorageRegistry,
    options: StoreOptions,
}

impl<'a, S: Session> Clone for UnitOfWork<'a, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, S: Session> Copy for UnitOfWork<'a, S> {}

impl<'a, S: Session> UnitOfWork<'a, S> {
    pub(crate) fn new(session: &'a S, registry: &'a StorageRegistry, options: StoreOptions) -> Self {
        Self {
            session,
            registry,
            options,
        }
    }

    pub fn session(&self) -> &'a S {
        self.session
    }

    pub fn registry(&self) -> &'a StorageRegistry {
        self.registry
    }

    pub fn options(&self) -> StoreOptions {
        self.options
    }

    /// Storage handle of `T`.
    pub fn storage<T: Item>(&self) -> StoreResult<&'a StorageHandle> {
        self.registry.storage_for(T::MODEL)
    }

    pub fn surrogates(&self) -> SurrogateStore<'a, S> {
        SurrogateStore::new(*self)
    }

    pub fn hashed(&self) -> HashedStore<'a, S> {
        HashedStore::new(*self)
    }

    pub fn cascader(&self) -> CompositeCascader<'a, S> {
        CompositeCascader::new(*self)
    }
}
