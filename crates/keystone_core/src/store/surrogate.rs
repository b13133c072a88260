//! Surrogate-key identity for single items.
//!
//! # Responsibility
//! - Insert transient items and assign their store-generated key.
//! - Update, resolve, remove and count rows by key.
//!
//! # Invariants
//! - A transient item (`key == 0`) never reaches the backend on remove.
//! - An assigned key is never rewritten.

use crate::db::Session;
use crate::model::item::{HashKey, ItemKey, Record, TRANSIENT_KEY};
use crate::store::{Lookup, StoreError, StoreResult, UnitOfWork};
use log::debug;

pub struct SurrogateStore<'a, S: Session> {
    uow: UnitOfWork<'a, S>,
}

impl<'a, S: Session> SurrogateStore<'a, S> {
    pub(crate) fn new(uow: UnitOfWork<'a, S>) -> Self {
        Self { uow }
    }

    /// Inserts a transient item or updates a persisted one.
    ///
    /// # Errors
    /// - `Conflict` when the persisted row vanished before the update.
    pub fn save<T: Record>(&self, item: T) -> StoreResult<T> {
        if item.key() == TRANSIENT_KEY {
            return self.insert(item, None);
        }

        let storage = self.uow.storage::<T>()?;
        if !self.uow.session().update(storage, &item)? {
            return Err(StoreError::Conflict {
                model: T::MODEL,
                key: item.key(),
            });
        }
        debug!(
            "event=item_update module=store status=ok model={} key={}",
            T::MODEL,
            item.key()
        );
        Ok(item)
    }

    pub(crate) fn insert<T: Record>(&self, mut item: T, hash: Option<&HashKey>) -> StoreResult<T> {
        let storage = self.uow.storage::<T>()?;
        let key = self.uow.session().insert(storage, &item, hash)?;
        item.identity_mut().assign_key(key);
        debug!(
            "event=item_insert module=store status=ok model={} key={}",
            T::MODEL,
            key
        );
        Ok(item)
    }

    pub fn find<T: Record>(&self, key: ItemKey) -> StoreResult<T> {
        let storage = self.uow.storage::<T>()?;
        self.uow
            .session()
            .load_by_id(storage, key)?
            .ok_or_else(|| StoreError::not_found(T::MODEL, Lookup::Key(key)))
    }

    /// Deletes the row behind `item`; `Ok(false)` when nothing was deleted.
    ///
    /// # Errors
    /// - `StillReferenced` when a composite still links to the item.
    pub fn remove<T: Record>(&self, item: &T) -> StoreResult<bool> {
        let key = item.key();
        if key == TRANSIENT_KEY {
            return Ok(false);
        }

        let references = self.uow.session().reference_count(T::MODEL, key)?;
        if references > 0 {
            return Err(StoreError::StillReferenced {
                model: T::MODEL,
                key,
                references,
            });
        }

        let storage = self.uow.storage::<T>()?;
        let removed = self.uow.session().delete(storage, key)?;
        debug!(
            "event=item_delete module=store status=ok model={} key={} removed={}",
            T::MODEL,
            key,
            removed
        );
        Ok(removed)
    }

    pub fn count<T: Record>(&self) -> StoreResult<u64> {
        let storage = self.uow.storage::<T>()?;
        Ok(self.uow.session().count_all(storage)?)
    }
}
