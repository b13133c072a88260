//! Contact composite: addresses, phones and emails keyed by usage.
//!
//! # Invariants
//! - A contact is a plain surrogate entity; two contacts with equal content
//!   are still stored as two rows.
//! - Each `ContactKind` maps to at most one entry per mechanism.

use crate::db::{DbResult, FieldRow, Session};
use crate::model::email_address::EmailAddress;
use crate::model::item::{
    ComponentSlot, CompositeItem, Discriminant, Identity, Item, ItemKey, ModelType, Record,
    SlotVisitor,
};
use crate::model::mail_address::MailAddress;
use crate::model::phone_number::PhoneNumber;
use crate::store::{Component, StoreResult, UnitOfWork};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Usage of one contact mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactKind {
    Home,
    Work,
    Mobile,
    Billing,
    Shipping,
}

impl ContactKind {
    pub const ALL: [ContactKind; 5] = [
        Self::Home,
        Self::Work,
        Self::Mobile,
        Self::Billing,
        Self::Shipping,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Work => "work",
            Self::Mobile => "mobile",
            Self::Billing => "billing",
            Self::Shipping => "shipping",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

impl Discriminant for ContactKind {
    fn to_discriminant(&self) -> String {
        self.as_str().to_string()
    }

    fn from_discriminant(value: &str) -> Option<Self> {
        Self::parse(value)
    }
}

pub const ADDRESSES_SLOT: &str = "addresses";
pub const PHONES_SLOT: &str = "phones";
pub const EMAILS_SLOT: &str = "emails";
pub const ALTERNATE_EMAILS_SLOT: &str = "alternate_emails";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Contact {
    #[serde(flatten)]
    identity: Identity,
    #[serde(default)]
    addresses: BTreeMap<ContactKind, MailAddress>,
    #[serde(default)]
    phones: BTreeMap<ContactKind, PhoneNumber>,
    #[serde(default)]
    emails: BTreeMap<ContactKind, EmailAddress>,
    #[serde(default)]
    alternate_emails: BTreeSet<EmailAddress>,
}

impl Contact {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address(mut self, kind: ContactKind, address: MailAddress) -> Self {
        self.addresses.insert(kind, address);
        self
    }

    pub fn without_address(mut self, kind: ContactKind) -> Self {
        self.addresses.remove(&kind);
        self
    }

    pub fn with_phone(mut self, kind: ContactKind, phone: PhoneNumber) -> Self {
        self.phones.insert(kind, phone);
        self
    }

    pub fn without_phone(mut self, kind: ContactKind) -> Self {
        self.phones.remove(&kind);
        self
    }

    pub fn with_email(mut self, kind: ContactKind, email: EmailAddress) -> Self {
        self.emails.insert(kind, email);
        self
    }

    pub fn without_email(mut self, kind: ContactKind) -> Self {
        self.emails.remove(&kind);
        self
    }

    pub fn with_alternate_email(mut self, email: EmailAddress) -> Self {
        self.alternate_emails.insert(email);
        self
    }

    pub fn without_alternate_email(mut self, email: &EmailAddress) -> Self {
        self.alternate_emails.remove(email);
        self
    }

    pub fn address(&self, kind: ContactKind) -> Option<&MailAddress> {
        self.addresses.get(&kind)
    }

    pub fn phone(&self, kind: ContactKind) -> Option<&PhoneNumber> {
        self.phones.get(&kind)
    }

    pub fn email(&self, kind: ContactKind) -> Option<&EmailAddress> {
        self.emails.get(&kind)
    }

    pub fn addresses(&self) -> &BTreeMap<ContactKind, MailAddress> {
        &self.addresses
    }

    pub fn phones(&self) -> &BTreeMap<ContactKind, PhoneNumber> {
        &self.phones
    }

    pub fn emails(&self) -> &BTreeMap<ContactKind, EmailAddress> {
        &self.emails
    }

    pub fn alternate_emails(&self) -> &BTreeSet<EmailAddress> {
        &self.alternate_emails
    }

    /// Total number of mechanisms across all slots.
    pub fn mechanism_count(&self) -> usize {
        self.addresses.len() + self.phones.len() + self.emails.len() + self.alternate_emails.len()
    }

    fn content(
        &self,
    ) -> (
        &BTreeMap<ContactKind, MailAddress>,
        &BTreeMap<ContactKind, PhoneNumber>,
        &BTreeMap<ContactKind, EmailAddress>,
        &BTreeSet<EmailAddress>,
    ) {
        (
            &self.addresses,
            &self.phones,
            &self.emails,
            &self.alternate_emails,
        )
    }
}

impl PartialEq for Contact {
    fn eq(&self, other: &Self) -> bool {
        self.content() == other.content()
    }
}

impl Eq for Contact {}

impl PartialOrd for Contact {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Contact {
    fn cmp(&self, other: &Self) -> Ordering {
        self.content().cmp(&other.content())
    }
}

impl Item for Contact {
    const MODEL: ModelType = ModelType::new("contact");

    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.identity
    }
}

impl Record for Contact {
    const DEFAULT_TABLE: &'static str = "contacts";
    const COLUMNS: &'static [&'static str] = &[];

    fn field_values(&self) -> Vec<Value> {
        Vec::new()
    }

    fn from_fields(_row: &FieldRow) -> DbResult<Self> {
        Ok(Self::default())
    }
}

impl CompositeItem for Contact {
    const SLOTS: &'static [&'static str] =
        &[ADDRESSES_SLOT, PHONES_SLOT, EMAILS_SLOT, ALTERNATE_EMAILS_SLOT];

    fn visit_slots<V: SlotVisitor>(&mut self, visitor: &mut V) -> StoreResult<()> {
        visitor.visit(ADDRESSES_SLOT, ComponentSlot::map(&mut self.addresses))?;
        visitor.visit(PHONES_SLOT, ComponentSlot::map(&mut self.phones))?;
        visitor.visit(EMAILS_SLOT, ComponentSlot::map(&mut self.emails))?;
        visitor.visit(
            ALTERNATE_EMAILS_SLOT,
            ComponentSlot::set(&mut self.alternate_emails),
        )
    }
}

impl Component for Contact {
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
