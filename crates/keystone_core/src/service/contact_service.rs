//! Contact use-case service.
//!
//! # Responsibility
//! - Validate people before they reach the persistence core.
//! - Answer reverse lookups (who owns this phone or email) through
//!   component links.
//!
//! # Invariants
//! - Reverse lookups run in one transaction and return people ascending by key.
//! - An unknown phone or email yields an empty list, not an error.

use crate::db::{Backend, LikeQuery, Session};
use crate::model::item::{HashedItem, Item, ItemKey};
use crate::model::{Contact, EmailAddress, ModelError, Person, PhoneNumber};
use crate::store::{ItemRepository, StoreError, StoreResult, UnitOfWork};
use log::info;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

const NAME_COLUMN: &str = "name";

#[derive(Debug)]
pub enum ServiceError {
    /// Input rejected before persistence.
    Model(ModelError),
    Store(StoreError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Model(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Model(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<ModelError> for ServiceError {
    fn from(value: ModelError) -> Self {
        Self::Model(value)
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

pub struct ContactService<B: Backend> {
    repository: ItemRepository<B>,
}

impl<B: Backend> ContactService<B> {
    pub fn new(repository: ItemRepository<B>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &ItemRepository<B> {
        &self.repository
    }

    /// Validates and stores `person` with its whole contact graph.
    pub fn register_person(&self, person: &Person) -> ServiceResult<Person> {
        person.validate()?;
        let saved = self.repository.save(person)?;
        info!(
            "event=person_register module=service status=ok key={} mechanisms={}",
            saved.key(),
            saved.contact().mechanism_count()
        );
        Ok(saved)
    }

    pub fn person(&self, key: ItemKey) -> ServiceResult<Person> {
        Ok(self.repository.find(key)?)
    }

    /// People whose name contains `fragment`, case-insensitively for ASCII.
    pub fn find_people_like(&self, fragment: &str) -> ServiceResult<Vec<Person>> {
        let query = LikeQuery::contains(NAME_COLUMN, fragment.trim());
        Ok(self.repository.find_like(&query)?)
    }

    pub fn find_people_with_phone(&self, phone: &PhoneNumber) -> ServiceResult<Vec<Person>> {
        Ok(self
            .repository
            .run("find_people_with_phone", Person::MODEL, |uow| {
                people_holding(uow, phone)
            })?)
    }

    pub fn find_people_with_email(&self, email: &EmailAddress) -> ServiceResult<Vec<Person>> {
        Ok(self
            .repository
            .run("find_people_with_email", Person::MODEL, |uow| {
                people_holding(uow, email)
            })?)
    }

    /// Removes `person`; shared value objects stay in place.
    pub fn remove_person(&self, person: &Person) -> ServiceResult<bool> {
        Ok(self.repository.remove(person)?)
    }
}

fn people_holding<S, T>(uow: &UnitOfWork<'_, S>, mechanism: &T) -> StoreResult<Vec<Person>>
where
    S: Session,
    T: HashedItem,
{
    let stored = match uow.hashed().find(mechanism) {
        Ok(stored) => stored,
        Err(err) if err.is_not_found() => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };

    let cascader = uow.cascader();
    let mut people = BTreeMap::new();
    for contact in cascader.owners_of::<Contact>(T::MODEL, stored.key())? {
        for person in cascader.owners_of::<Person>(Contact::MODEL, contact.key())? {
            people.insert(person.key(), person);
        }
    }
    Ok(people.into_values().collect())
}
