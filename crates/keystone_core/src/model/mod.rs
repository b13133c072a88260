//! Persistable item contracts and the contact domain built on them.
//!
//! # Responsibility
//! - Define identity, hashing and component-slot contracts (`item`).
//! - Provide the value objects and composites stored by keystone core.
//!
//! # Invariants
//! - Value objects (`MailAddress`, `PhoneNumber`, `EmailAddress`) are hashed
//!   and deduplicated by content.
//! - Composites (`Contact`, `Person`, `Business`) keep plain surrogate keys.

pub mod contact;
pub mod email_address;
pub mod error;
pub mod item;
pub mod mail_address;
pub mod party;
pub mod phone_number;
pub mod text;

pub use contact::{Contact, ContactKind};
pub use email_address::EmailAddress;
pub use error::ModelError;
pub use mail_address::MailAddress;
pub use party::{Business, Person};
pub use phone_number::PhoneNumber;

use item::{ModelDescriptor, Record};

/// Storage shapes of every model this crate persists, leaves first.
pub fn catalog() -> Vec<ModelDescriptor> {
    vec![
        MailAddress::descriptor(),
        PhoneNumber::descriptor(),
        EmailAddress::descriptor(),
        Contact::descriptor(),
        Person::descriptor(),
        Business::descriptor(),
    ]
}

#[cfg(test)]
mod tests {
    use super::catalog;
    use crate::db::is_valid_identifier;
    use std::collections::BTreeSet;

    #[test]
    fn catalog_tables_and_models_are_unique() {
        let descriptors = catalog();
        let models: BTreeSet<_> = descriptors.iter().map(|d| d.model.name()).collect();
        let tables: BTreeSet<_> = descriptors.iter().map(|d| d.default_table).collect();
        assert_eq!(models.len(), descriptors.len());
        assert_eq!(tables.len(), descriptors.len());
        assert!(descriptors
            .iter()
            .all(|d| is_valid_identifier(d.default_table)));
    }
}
