//! Content-hash deduplication for value-like items.
//!
//! # Responsibility
//! - Give hashed items find-or-create semantics on save.
//! - Resolve transient items by hash and persisted ones by key.
//!
//! # Invariants
//! - A persisted hashed row is never rewritten; saving it returns the row.
//! - With `verify_hash_content` on, a row is reused only when its content
//!   equals the saved item, not merely its hash.

use crate::db::Session;
use crate::model::item::{HashKey, HashedItem};
use crate::store::surrogate::SurrogateStore;
use crate::store::{Lookup, StoreError, StoreResult, UnitOfWork};
use log::{debug, warn};

pub struct HashedStore<'a, S: Session> {
    uow: UnitOfWork<'a, S>,
}

impl<'a, S: Session> HashedStore<'a, S> {
    pub(crate) fn new(uow: UnitOfWork<'a, S>) -> Self {
        Self { uow }
    }

    fn surrogates(&self) -> SurrogateStore<'a, S> {
        self.uow.surrogates()
    }

    /// Find-or-create by content hash.
    ///
    /// Returns the stored row when `item` is already persisted or when a row
    /// with the same content exists; inserts `item` otherwise.
    pub fn save<T: HashedItem>(&self, item: T) -> StoreResult<T> {
        if item.was_saved() {
            return self.surrogates().find(item.key());
        }

        let hash = item.hash_key();
        if let Some(existing) = self.lookup(&item, &hash)? {
            debug!(
                "event=item_dedup module=store status=ok model={} key={} hash={}",
                T::MODEL,
                existing.key(),
                hash.short()
            );
            return Ok(existing);
        }
        self.surrogates().insert(item, Some(&hash))
    }

    /// Resolves `item` by hash when transient, by key otherwise.
    pub fn find<T: HashedItem>(&self, item: &T) -> StoreResult<T> {
        if item.was_saved() {
            return self.surrogates().find(item.key());
        }

        let hash = item.hash_key();
        self.lookup(item, &hash)?
            .ok_or_else(|| StoreError::not_found(T::MODEL, Lookup::Hash(hash)))
    }

    /// Oldest row stored under `hash`, without content verification.
    pub fn find_by_hash<T: HashedItem>(&self, hash: &HashKey) -> StoreResult<T> {
        let storage = self.uow.storage::<T>()?;
        self.uow
            .session()
            .load_by_hash::<T>(storage, hash)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found(T::MODEL, Lookup::Hash(hash.clone())))
    }

    fn lookup<T: HashedItem>(&self, item: &T, hash: &HashKey) -> StoreResult<Option<T>> {
        let storage = self.uow.storage::<T>()?;
        let candidates = self.uow.session().load_by_hash::<T>(storage, hash)?;
        if !self.uow.options().verify_hash_content {
            return Ok(candidates.into_iter().next());
        }

        let total = candidates.len();
        let matching = candidates
            .into_iter()
            .find(|candidate| candidate.same_content(item));
        if matching.is_none() && total > 0 {
            warn!(
                "event=hash_collision module=store status=ok model={} hash={} candidates={}",
                T::MODEL,
                hash.short(),
                total
            );
        }
        Ok(matching)
    }
}
