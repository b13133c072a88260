//! Postal address value object.
//!
//! # Responsibility
//! - Hold one normalized postal address and its content hash.
//! - Report field format problems without rejecting construction.
//!
//! # Invariants
//! - Words are stored capitalized with punctuation other than `/` and `#`
//!   removed; state and postal codes are stored trimmed and upper-cased.
//! - Every `with_*` change yields a transient value with no cached hash.

use crate::db::{DbResult, FieldRow, Session};
use crate::model::error::ModelError;
use crate::model::item::{HashedItem, Identity, Item, ItemKey, ModelType, Record};
use crate::model::text::{normalize_code, normalize_words};
use crate::store::{Component, StoreResult, UnitOfWork};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

static STREET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+\s[\w\s/#]+)?$").expect("valid street regex"));
static OFFICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w\s/#]*$").expect("valid office regex"));
static CITY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z\s]+$").expect("valid city regex"));
static STATE_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{2}$").expect("valid state code regex"));
static POSTAL_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w\s]+$").expect("valid postal code regex"));

const MAX_LINE_CHARS: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailAddress {
    #[serde(flatten)]
    identity: Identity,
    street: String,
    #[serde(default)]
    office: String,
    city: String,
    state_code: String,
    postal_code: String,
}

impl MailAddress {
    /// Builds an address without an office or unit line.
    pub fn new(street: &str, city: &str, state_code: &str, postal_code: &str) -> Self {
        Self {
            identity: Identity::transient(),
            street: normalize_words(street),
            office: String::new(),
            city: normalize_words(city),
            state_code: normalize_code(state_code),
            postal_code: normalize_code(postal_code),
        }
    }

    pub fn street(&self) -> &str {
        &self.street
    }

    pub fn office(&self) -> &str {
        &self.office
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn state_code(&self) -> &str {
        &self.state_code
    }

    pub fn postal_code(&self) -> &str {
        &self.postal_code
    }

    pub fn with_street(self, street: &str) -> Self {
        Self {
            street: normalize_words(street),
            ..self.detached()
        }
    }

    pub fn with_office(self, office: &str) -> Self {
        Self {
            office: normalize_words(office),
            ..self.detached()
        }
    }

    pub fn with_city(self, city: &str) -> Self {
        Self {
            city: normalize_words(city),
            ..self.detached()
        }
    }

    pub fn with_state_code(self, state_code: &str) -> Self {
        Self {
            state_code: normalize_code(state_code),
            ..self.detached()
        }
    }

    pub fn with_postal_code(self, postal_code: &str) -> Self {
        Self {
            postal_code: normalize_code(postal_code),
            ..self.detached()
        }
    }

    /// `street[, office], city, state postal`
    pub fn format_address(&self) -> String {
        let mut formatted = self.street.clone();
        if !self.office.is_empty() {
            formatted.push_str(", ");
            formatted.push_str(&self.office);
        }
        formatted.push_str(&format!(
            ", {}, {} {}",
            self.city, self.state_code, self.postal_code
        ));
        formatted
    }

    /// Every field that fails its format or length rule.
    pub fn problems(&self) -> Vec<ModelError> {
        let checks: [(&'static str, &str, bool); 5] = [
            (
                "street",
                self.street.as_str(),
                self.street.chars().count() <= MAX_LINE_CHARS && STREET_RE.is_match(&self.street),
            ),
            (
                "office",
                self.office.as_str(),
                self.office.chars().count() <= MAX_LINE_CHARS && OFFICE_RE.is_match(&self.office),
            ),
            (
                "city",
                self.city.as_str(),
                (5..=MAX_LINE_CHARS).contains(&self.city.chars().count())
                    && CITY_RE.is_match(&self.city),
            ),
            (
                "state_code",
                self.state_code.as_str(),
                STATE_CODE_RE.is_match(&self.state_code),
            ),
            (
                "postal_code",
                self.postal_code.as_str(),
                (5..=15).contains(&self.postal_code.chars().count())
                    && POSTAL_CODE_RE.is_match(&self.postal_code),
            ),
        ];

        checks
            .into_iter()
            .filter(|(_, _, valid)| !valid)
            .map(|(field, value, _)| ModelError::InvalidField {
                field,
                value: value.to_string(),
            })
            .collect()
    }

    /// Returns the first field problem, if any.
    pub fn validate(&self) -> Result<(), ModelError> {
        match self.problems().into_iter().next() {
            Some(problem) => Err(problem),
            None => Ok(()),
        }
    }

    fn detached(self) -> Self {
        Self {
            identity: Identity::transient(),
            ..self
        }
    }

    fn content(&self) -> (&str, &str, &str, &str, &str) {
        (
            self.street.as_str(),
            self.office.as_str(),
            self.city.as_str(),
            self.state_code.as_str(),
            self.postal_code.as_str(),
        )
    }
}

impl Display for MailAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_address())
    }
}

impl PartialEq for MailAddress {
    fn eq(&self, other: &Self) -> bool {
        self.content() == other.content()
    }
}

impl Eq for MailAddress {}

impl PartialOrd for MailAddress {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MailAddress {
    fn cmp(&self, other: &Self) -> Ordering {
        self.content().cmp(&other.content())
    }
}

impl Item for MailAddress {
    const MODEL: ModelType = ModelType::new("mail_address");

    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.identity
    }
}

impl Record for MailAddress {
    const DEFAULT_TABLE: &'static str = "mail_addresses";
    const COLUMNS: &'static [&'static str] =
        &["street", "office", "city", "state_code", "postal_code"];
    const HASHED: bool = true;

    fn field_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.street.clone()),
            Value::Text(self.office.clone()),
            Value::Text(self.city.clone()),
            Value::Text(self.state_code.clone()),
            Value::Text(self.postal_code.clone()),
        ]
    }

    fn from_fields(row: &FieldRow) -> DbResult<Self> {
        Ok(Self {
            identity: Identity::transient(),
            street: row.text("street")?,
            office: row.text("office")?,
            city: row.text("city")?,
            state_code: row.text("state_code")?,
            postal_code: row.text("postal_code")?,
        })
    }
}

impl HashedItem for MailAddress {
    fn hash_fields(&self) -> Vec<&str> {
        let (street, office, city, state_code, postal_code) = self.content();
        vec![street, office, city, state_code, postal_code]
    }
}

impl Component for MailAddress {
    fn save_within<S: Session>(self, uow: &UnitOfWork<'_, S>) -> StoreResult<Self> {
        uow.hashed().save(self)
    }

    fn load_within<S: Session>(key: ItemKey, uow: &UnitOfWork<'_, S>) -> StoreResult<Self> {
        uow.surrogates().find(key)
    }

    fn remove_within<S: Session>(&self, uow: &UnitOfWork<'_, S>) -> StoreResult<bool> {
        uow.surrogates().remove(self)
    }
}
