//! Parties: people and businesses owning a contact.
//!
//! # Invariants
//! - Parties are plain surrogate composites: saving two parties with the
//!   same name creates two rows, while their value objects are shared.
//! - Names are normalized like address words.

use crate::db::{DbResult, FieldRow, Session};
use crate::model::contact::{Contact, ContactKind};
use crate::model::email_address::EmailAddress;
use crate::model::error::ModelError;
use crate::model::item::{
    ComponentSlot, CompositeItem, Identity, Item, ItemKey, ModelType, Record, SlotVisitor,
};
use crate::model::mail_address::MailAddress;
use crate::model::phone_number::PhoneNumber;
use crate::model::text::normalize_words;
use crate::store::{Component, StoreResult, UnitOfWork};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

pub const CONTACT_SLOT: &str = "contact";
pub const LOCATIONS_SLOT: &str = "locations";

const NAME_CHARS: std::ops::RangeInclusive<usize> = 5..=75;

fn check_name(name: &str) -> Result<(), ModelError> {
    if NAME_CHARS.contains(&name.chars().count()) {
        Ok(())
    } else {
        Err(ModelError::InvalidName(name.to_string()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Person {
    #[serde(flatten)]
    identity: Identity,
    name: String,
    #[serde(default)]
    contact: Contact,
}

impl Person {
    pub fn named(name: &str) -> Self {
        Self {
            identity: Identity::transient(),
            name: normalize_words(name),
            contact: Contact::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact(&self) -> &Contact {
        &self.contact
    }

    pub fn with_contact(mut self, contact: Contact) -> Self {
        self.contact = contact;
        self
    }

    pub fn with_address(mut self, kind: ContactKind, address: MailAddress) -> Self {
        self.contact = self.contact.with_address(kind, address);
        self
    }

    pub fn with_phone(mut self, kind: ContactKind, phone: PhoneNumber) -> Self {
        self.contact = self.contact.with_phone(kind, phone);
        self
    }

    pub fn with_email(mut self, kind: ContactKind, email: EmailAddress) -> Self {
        self.contact = self.contact.with_email(kind, email);
        self
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        check_name(&self.name)
    }
}

impl PartialEq for Person {
    fn eq(&self, other: &Self) -> bool {
        (&self.name, &self.contact) == (&other.name, &other.contact)
    }
}

impl Eq for Person {}

impl PartialOrd for Person {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Person {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.name, &self.contact).cmp(&(&other.name, &other.contact))
    }
}

impl Item for Person {
    const MODEL: ModelType = ModelType::new("person");

    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.identity
    }
}

impl Record for Person {
    const DEFAULT_TABLE: &'static str = "people";
    const COLUMNS: &'static [&'static str] = &["name"];

    fn field_values(&self) -> Vec<Value> {
        vec![Value::Text(self.name.clone())]
    }

    fn from_fields(row: &FieldRow) -> DbResult<Self> {
        Ok(Self {
            identity: Identity::transient(),
            name: row.text("name")?,
            contact: Contact::new(),
        })
    }
}

impl CompositeItem for Person {
    const SLOTS: &'static [&'static str] = &[CONTACT_SLOT];

    fn visit_slots<V: SlotVisitor>(&mut self, visitor: &mut V) -> StoreResult<()> {
        visitor.visit(CONTACT_SLOT, ComponentSlot::single(&mut self.contact))
    }
}

impl Component for Person {
    fn save_within<S: Session>(self, uow: &UnitOfWork<'_, S>) -> StoreResult<Self> {
        uow.cascader().save(self)
    }

    fn load_within<S: Session>(key: ItemKey, uow: &UnitOfWork<'_, S>) -> StoreResult<Self> {
        uow.cascader().find(key)
    }

    fn remove_within<S: Session>(&self, uow: &UnitOfWork<'_, S>) -> StoreResult<bool> {
        uow.cascader().remove(self)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Business {
    #[serde(flatten)]
    identity: Identity,
    name: String,
    #[serde(default)]
    contact: Contact,
    #[serde(default)]
    locations: BTreeSet<MailAddress>,
}

impl Business {
    pub fn named(name: &str) -> Self {
        Self {
            identity: Identity::transient(),
            name: normalize_words(name),
            contact: Contact::new(),
            locations: BTreeSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact(&self) -> &Contact {
        &self.contact
    }

    pub fn locations(&self) -> &BTreeSet<MailAddress> {
        &self.locations
    }

    pub fn with_contact(mut self, contact: Contact) -> Self {
        self.contact = contact;
        self
    }

    pub fn with_location(mut self, location: MailAddress) -> Self {
        self.locations.insert(location);
        self
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        check_name(&self.name)
    }

    fn content(&self) -> (&str, &Contact, &BTreeSet<MailAddress>) {
        (self.name.as_str(), &self.contact, &self.locations)
    }
}

impl PartialEq for Business {
    fn eq(&self, other: &Self) -> bool {
        self.content() == other.content()
    }
}

impl Eq for Business {}

impl PartialOrd for Business {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Business {
    fn cmp(&self, other: &Self) -> Ordering {
        self.content().cmp(&other.content())
    }
}

impl Item for Business {
    const MODEL: ModelType = ModelType::new("business");

    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.identity
    }
}

impl Record for Business {
    const DEFAULT_TABLE: &'static str = "businesses";
    const COLUMNS: &'static [&'static str] = &["name"];

    fn field_values(&self) -> Vec<Value> {
        vec![Value::Text(self.name.clone())]
    }

    fn from_fields(row: &FieldRow) -> DbResult<Self> {
        Ok(Self {
            name: row.text("name")?,
            ..Self::default()
        })
    }
}

impl CompositeItem for Business {
    const SLOTS: &'static [&'static str] = &[CONTACT_SLOT, LOCATIONS_SLOT];

    fn visit_slots<V: SlotVisitor>(&mut self, visitor: &mut V) -> StoreResult<()> {
        visitor.visit(CONTACT_SLOT, ComponentSlot::single(&mut self.contact))?;
        visitor.visit(LOCATIONS_SLOT, ComponentSlot::set(&mut self.locations))
    }
}

impl Component for Business {
    fn save_within<S: Session>(self, uow: &UnitOfWork<'_, S>) -> StoreResult<Self> {
        uow.cascader().save(self)
    }

    fn load_within<S: Session>(key: ItemKey, uow: &UnitOfWork<'_, S>) -> StoreResult<Self> {
        uow.cascader().find(key)
    }

    fn remove_within<S: Session>(&self, uow: &UnitOfWork<'_, S>) -> StoreResult<bool> {
        uow.cascader().remove(self)
    }
}
