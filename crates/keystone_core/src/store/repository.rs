//! Entry point of the persistence core.
//!
//! # Responsibility
//! - Own the backend, the storage registry and the store options.
//! - Run each public operation in its own `TransactionContext`.
//!
//! # Invariants
//! - Every registered storage was verified against the backend on open.
//! - Inputs are never mutated; saves return the persisted value, so a failed
//!   save leaves the caller's item exactly as it was.

use crate::db::{Backend, LikeQuery, Session};
use crate::model::item::{
    CompositeItem, Discriminant, HashKey, HashedItem, Item, ItemKey, ModelType, Record,
    TRANSIENT_KEY,
};
use crate::store::{
    Component, StoreOptions, StoreResult, StorageRegistry, TransactionContext, UnitOfWork,
};
use log::info;

pub struct ItemRepository<B: Backend> {
    backend: B,
    registry: StorageRegistry,
    options: StoreOptions,
}

impl<B: Backend> ItemRepository<B> {
    /// Verifies every registered storage and takes ownership of the registry.
    pub fn open(backend: B, registry: StorageRegistry, options: StoreOptions) -> StoreResult<Self> {
        for handle in registry.handles() {
            backend.verify_storage(handle)?;
        }
        info!(
            "event=repository_open module=store status=ok storages={} verify_hash_content={} cascade_remove={}",
            registry.len(),
            options.verify_hash_content,
            options.cascade_remove
        );
        Ok(Self {
            backend,
            registry,
            options,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn registry(&self) -> &StorageRegistry {
        &self.registry
    }

    pub fn options(&self) -> StoreOptions {
        self.options
    }

    /// Fresh single-use transaction context.
    pub fn create_context(&self) -> TransactionContext<'_, B> {
        TransactionContext::new(&self.backend, &self.registry, self.options)
    }

    /// Runs arbitrary store work inside one transaction.
    pub fn run<T, F>(&self, operation: &'static str, model: ModelType, work: F) -> StoreResult<T>
    where
        F: FnOnce(&UnitOfWork<'_, B::Session>) -> StoreResult<T>,
    {
        self.create_context().commit_with(operation, model, work)
    }

    /// Persists `item` and everything reachable from it.
    ///
    /// The returned value carries the assigned keys; for hashed items it may
    /// be a previously stored row with identical content.
    pub fn save<T: Component>(&self, item: &T) -> StoreResult<T> {
        self.run("save", T::MODEL, |uow| item.clone().save_within(uow))
    }

    pub fn find<T: Component>(&self, key: ItemKey) -> StoreResult<T> {
        self.run("find", T::MODEL, |uow| T::load_within(key, uow))
    }

    /// Re-reads `item` by key; a miss is not logged as a failure.
    pub fn reload<T: Component>(&self, item: &T) -> StoreResult<T> {
        let key = item.key();
        self.create_context()
            .without_logging()
            .commit_with("reload", T::MODEL, |uow| T::load_within(key, uow))
    }

    /// Resolves a hashed item by hash when transient, by key otherwise.
    pub fn find_with_hash<T: HashedItem + Component>(&self, item: &T) -> StoreResult<T> {
        self.run("find_with_hash", T::MODEL, |uow| uow.hashed().find(item))
    }

    /// Speculative `find_with_hash`: a miss is `Ok(None)` and is not logged.
    pub fn lookup_with_hash<T: HashedItem + Component>(&self, item: &T) -> StoreResult<Option<T>> {
        let found = self
            .create_context()
            .without_logging()
            .commit_with("lookup_with_hash", T::MODEL, |uow| uow.hashed().find(item));
        match found {
            Ok(item) => Ok(Some(item)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Oldest row stored under `hash`.
    pub fn find_by_hash<T: HashedItem + Component>(&self, hash: &HashKey) -> StoreResult<T> {
        self.run("find_by_hash", T::MODEL, |uow| uow.hashed().find_by_hash(hash))
    }

    /// Removes `item`; `Ok(false)` for transient items without opening a session.
    pub fn remove<T: Component>(&self, item: &T) -> StoreResult<bool> {
        if item.key() == TRANSIENT_KEY {
            return Ok(false);
        }
        self.run("remove", T::MODEL, |uow| item.remove_within(uow))
    }

    /// Number of stored `T` rows; `0` on failure.
    pub fn count<T: Record>(&self) -> u64 {
        self.create_context()
            .count_with("count", T::MODEL, |uow| uow.surrogates().count::<T>())
    }

    pub fn try_count<T: Record>(&self) -> StoreResult<u64> {
        self.run("count", T::MODEL, |uow| uow.surrogates().count::<T>())
    }

    /// Number of persisted entries in one slot of `owner`.
    pub fn count_components<T: CompositeItem>(&self, owner: &T, slot: &str) -> StoreResult<u64> {
        let key = owner.key();
        self.run("count_components", T::MODEL, |uow| {
            uow.cascader().count_components::<T>(key, slot)
        })
    }

    /// Loads the child stored under `discriminant` in one slot of `owner`.
    pub fn component<T, C, D>(&self, owner: &T, slot: &str, discriminant: &D) -> StoreResult<C>
    where
        T: CompositeItem,
        C: Component,
        D: Discriminant,
    {
        let key = owner.key();
        self.run("component", T::MODEL, |uow| {
            uow.cascader().component::<T, C, D>(key, slot, discriminant)
        })
    }

    /// Loads `item` and hands it to `usage` inside the same transaction.
    pub fn use_item<T, R, F>(&self, item: &T, usage: F) -> StoreResult<R>
    where
        T: Component,
        F: FnOnce(T, &UnitOfWork<'_, B::Session>) -> StoreResult<R>,
    {
        let key = item.key();
        self.run("use_item", T::MODEL, |uow| {
            let loaded = T::load_within(key, uow)?;
            usage(loaded, uow)
        })
    }

    /// Items whose registered column matches `query`, ascending by key.
    pub fn find_like<T: Component>(&self, query: &LikeQuery) -> StoreResult<Vec<T>> {
        self.run("find_like", T::MODEL, |uow| {
            let storage = uow.storage::<T>()?;
            let rows: Vec<T> = uow.session().query_like(storage, query)?;
            rows.into_iter()
                .map(|row| T::load_within(row.key(), uow))
                .collect()
        })
    }

    /// Items of type `O` holding `child` in any slot.
    pub fn owners_of<O: Component, C: Item>(&self, child: &C) -> StoreResult<Vec<O>> {
        if child.key() == TRANSIENT_KEY {
            return Ok(Vec::new());
        }
        let key = child.key();
        self.run("owners_of", O::MODEL, |uow| {
            uow.cascader().owners_of::<O>(C::MODEL, key)
        })
    }
}
