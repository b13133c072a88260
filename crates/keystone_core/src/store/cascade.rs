//! Cascading persistence for composite items.
//!
//! # Responsibility
//! - Save every component slot bottom-up and rewrite each slot with the
//!   instances the stores returned (possibly deduplicated).
//! - Persist slot entries as `component_links` rows after the owner has a key.
//! - Load slots back and remove composites, optionally with their children.
//!
//! # Invariants
//! - Children are saved before their owner; the owner is saved last.
//! - Map discriminants are never altered by a save.
//! - A cascading remove only deletes children no other owner links to.

use crate::db::{ComponentLink, DbError, Session};
use crate::model::item::{
    CompositeItem, ComponentSlot, Discriminant, ItemKey, ModelType, SlotVisitor,
    TRANSIENT_KEY,
};
use crate::store::{Component, Lookup, StoreError, StoreResult, UnitOfWork};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

pub struct CompositeCascader<'a, S: Session> {
    uow: UnitOfWork<'a, S>,
}

impl<'a, S: Session> CompositeCascader<'a, S> {
    pub(crate) fn new(uow: UnitOfWork<'a, S>) -> Self {
        Self { uow }
    }

    /// Saves all reachable children, then the owner, then its slot links.
    pub fn save<T: CompositeItem>(&self, mut owner: T) -> StoreResult<T> {
        let mut saver = SaveSlots {
            uow: self.uow,
            pending: Vec::with_capacity(T::SLOTS.len()),
        };
        owner.visit_slots(&mut saver)?;

        let owner = self.uow.surrogates().save(owner)?;
        let mut links_written = 0;
        for (slot, links) in &saver.pending {
            self.uow
                .session()
                .replace_links(T::MODEL, owner.key(), slot, links)?;
            links_written += links.len();
        }
        debug!(
            "event=composite_save module=store status=ok model={} key={} links={}",
            T::MODEL,
            owner.key(),
            links_written
        );
        Ok(owner)
    }

    /// Loads the owner row and every slot it declares.
    pub fn find<T: CompositeItem>(&self, key: ItemKey) -> StoreResult<T> {
        let mut owner: T = self.uow.surrogates().find(key)?;
        let mut loader = LoadSlots {
            uow: self.uow,
            owner_model: T::MODEL,
            owner_key: key,
        };
        owner.visit_slots(&mut loader)?;
        Ok(owner)
    }

    /// Removes the owner row and its links.
    ///
    /// With `cascade_remove` on, children left without any owner are removed
    /// as well, recursively.
    pub fn remove<T: CompositeItem>(&self, owner: &T) -> StoreResult<bool> {
        let key = owner.key();
        if key == TRANSIENT_KEY {
            return Ok(false);
        }

        let mut children = BTreeMap::new();
        if self.uow.options().cascade_remove {
            for slot in T::SLOTS {
                let links = self.uow.session().load_links(T::MODEL, key, slot)?;
                children.insert(*slot, links);
            }
        }

        let unlinked = self.uow.session().delete_links(T::MODEL, key)?;
        let removed = self.uow.surrogates().remove(owner)?;

        let mut remover = RemoveSlots {
            uow: self.uow,
            children,
            removed: 0,
        };
        if self.uow.options().cascade_remove {
            owner.clone().visit_slots(&mut remover)?;
        }
        debug!(
            "event=composite_remove module=store status=ok model={} key={} removed={} unlinked={} children_removed={}",
            T::MODEL,
            key,
            removed,
            unlinked,
            remover.removed
        );
        Ok(removed)
    }

    /// Number of persisted entries in one slot of a stored composite.
    pub fn count_components<T: CompositeItem>(&self, key: ItemKey, slot: &str) -> StoreResult<u64> {
        let slot = declared_slot::<T>(slot)?;
        let links = self.uow.session().load_links(T::MODEL, key, slot)?;
        Ok(links.len() as u64)
    }

    /// Loads the child stored under `discriminant` in one slot.
    pub fn component<T, C, D>(&self, key: ItemKey, slot: &str, discriminant: &D) -> StoreResult<C>
    where
        T: CompositeItem,
        C: Component,
        D: Discriminant,
    {
        let slot = declared_slot::<T>(slot)?;
        let wanted = discriminant.to_discriminant();
        let link = self
            .uow
            .session()
            .load_links(T::MODEL, key, slot)?
            .into_iter()
            .find(|link| link.discriminant == wanted)
            .ok_or_else(|| {
                StoreError::not_found(
                    T::MODEL,
                    Lookup::Component {
                        slot: slot.to_string(),
                        discriminant: wanted.clone(),
                    },
                )
            })?;
        ensure_child_model(&link, C::MODEL)?;
        C::load_within(link.child_key, &self.uow)
    }

    /// Owners of type `O` that link to the given child, ascending by key.
    pub fn owners_of<O: Component>(
        &self,
        child_model: ModelType,
        child_key: ItemKey,
    ) -> StoreResult<Vec<O>> {
        let keys = self
            .uow
            .session()
            .owners_of(O::MODEL, child_model, child_key)?;
        keys.into_iter()
            .map(|key| O::load_within(key, &self.uow))
            .collect()
    }
}

fn declared_slot<T: CompositeItem>(slot: &str) -> StoreResult<&'static str> {
    T::SLOTS
        .iter()
        .copied()
        .find(|declared| *declared == slot)
        .ok_or_else(|| StoreError::UnknownSlot {
            model: T::MODEL,
            slot: slot.to_string(),
        })
}

fn ensure_child_model(link: &ComponentLink, expected: ModelType) -> StoreResult<()> {
    if link.child_model == expected.name() {
        return Ok(());
    }
    Err(StoreError::Persistence(DbError::InvalidData(format!(
        "component link points at `{}` but slot holds `{expected}`",
        link.child_model
    ))))
}

struct SaveSlots<'a, S: Session> {
    uow: UnitOfWork<'a, S>,
    pending: Vec<(&'static str, Vec<ComponentLink>)>,
}

impl<'a, S: Session> SlotVisitor for SaveSlots<'a, S> {
    fn visit<D: Discriminant, C: Component>(
        &mut self,
        slot: &'static str,
        contents: ComponentSlot<'_, D, C>,
    ) -> StoreResult<()> {
        let mut links = Vec::new();
        match contents {
            ComponentSlot::Map(entries) => {
                let mut saved_entries = BTreeMap::new();
                for (discriminant, child) in std::mem::take(entries) {
                    let saved = child.save_within(&self.uow)?;
                    links.push(ComponentLink::new(
                        discriminant.to_discriminant(),
                        C::MODEL,
                        saved.key(),
                    ));
                    saved_entries.insert(discriminant, saved);
                }
                *entries = saved_entries;
            }
            ComponentSlot::Set(members) => {
                let mut saved_members = BTreeSet::new();
                for child in std::mem::take(members) {
                    let saved = child.save_within(&self.uow)?;
                    links.push(ComponentLink::new("", C::MODEL, saved.key()));
                    saved_members.insert(saved);
                }
                *members = saved_members;
            }
            ComponentSlot::SingleRef(target) => {
                let saved = target.clone().save_within(&self.uow)?;
                links.push(ComponentLink::new("", C::MODEL, saved.key()));
                *target = saved;
            }
        }
        self.pending.push((slot, links));
        Ok(())
    }
}

struct LoadSlots<'a, S: Session> {
    uow: UnitOfWork<'a, S>,
    owner_model: ModelType,
    owner_key: ItemKey,
}

impl<'a, S: Session> LoadSlots<'a, S> {
    fn load_child<C: Component>(&self, link: &ComponentLink) -> StoreResult<C> {
        ensure_child_model(link, C::MODEL)?;
        C::load_within(link.child_key, &self.uow)
    }
}

impl<'a, S: Session> SlotVisitor for LoadSlots<'a, S> {
    fn visit<D: Discriminant, C: Component>(
        &mut self,
        slot: &'static str,
        contents: ComponentSlot<'_, D, C>,
    ) -> StoreResult<()> {
        let links = self
            .uow
            .session()
            .load_links(self.owner_model, self.owner_key, slot)?;
        match contents {
            ComponentSlot::Map(entries) => {
                entries.clear();
                for link in &links {
                    let discriminant = D::from_discriminant(&link.discriminant).ok_or_else(|| {
                        DbError::InvalidData(format!(
                            "unknown discriminant `{}` in slot `{}.{slot}`",
                            link.discriminant, self.owner_model
                        ))
                    })?;
                    entries.insert(discriminant, self.load_child(link)?);
                }
            }
            ComponentSlot::Set(members) => {
                members.clear();
                for link in &links {
                    members.insert(self.load_child(link)?);
                }
            }
            ComponentSlot::SingleRef(target) => {
                let link = links.first().ok_or_else(|| {
                    StoreError::not_found(
                        self.owner_model,
                        Lookup::Component {
                            slot: slot.to_string(),
                            discriminant: String::new(),
                        },
                    )
                })?;
                *target = self.load_child(link)?;
            }
        }
        Ok(())
    }
}

struct RemoveSlots<'a, S: Session> {
    uow: UnitOfWork<'a, S>,
    children: BTreeMap<&'static str, Vec<ComponentLink>>,
    removed: usize,
}

impl<'a, S: Session> SlotVisitor for RemoveSlots<'a, S> {
    fn visit<D: Discriminant, C: Component>(
        &mut self,
        slot: &'static str,
        _contents: ComponentSlot<'_, D, C>,
    ) -> StoreResult<()> {
        let Some(links) = self.children.remove(slot) else {
            return Ok(());
        };
        let keys: BTreeSet<ItemKey> = links
            .iter()
            .filter(|link| link.child_model == C::MODEL.name())
            .map(|link| link.child_key)
            .collect();

        for key in keys {
            if self.uow.session().reference_count(C::MODEL, key)? > 0 {
                continue;
            }
            let child = match C::load_within(key, &self.uow) {
                Ok(child) => child,
                Err(err) if err.is_not_found() => continue,
                Err(err) => return Err(err),
            };
            if child.remove_within(&self.uow)? {
                self.removed += 1;
            }
        }
        Ok(())
    }
}
