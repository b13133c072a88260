//! Phone number value object in `999-999-9999` form.

use crate::db::{DbResult, FieldRow, Session};
use crate::model::error::ModelError;
use crate::model::item::{HashedItem, Identity, Item, ItemKey, ModelType, Record};
use crate::store::{Component, StoreResult, UnitOfWork};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{3})-(\d{3})-(\d{4})$").expect("valid phone regex"));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneNumber {
    #[serde(flatten)]
    identity: Identity,
    area_code: String,
    prefix: String,
    suffix: String,
}

impl PhoneNumber {
    /// Parses `999-999-9999`; surrounding whitespace is ignored.
    pub fn from(formatted: &str) -> Result<Self, ModelError> {
        let formatted = formatted.trim();
        let captures = PHONE_RE
            .captures(formatted)
            .ok_or_else(|| ModelError::InvalidPhoneNumber(formatted.to_string()))?;
        Ok(Self {
            identity: Identity::transient(),
            area_code: captures[1].to_string(),
            prefix: captures[2].to_string(),
            suffix: captures[3].to_string(),
        })
    }

    pub fn area_code(&self) -> &str {
        &self.area_code
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn format_number(&self) -> String {
        format!("{}-{}-{}", self.area_code, self.prefix, self.suffix)
    }

    fn content(&self) -> (&str, &str, &str) {
        (
            self.area_code.as_str(),
            self.prefix.as_str(),
            self.suffix.as_str(),
        )
    }
}

impl FromStr for PhoneNumber {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from(value)
    }
}

impl Display for PhoneNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_number())
    }
}

impl PartialEq for PhoneNumber {
    fn eq(&self, other: &Self) -> bool {
        self.content() == other.content()
    }
}

impl Eq for PhoneNumber {}

impl PartialOrd for PhoneNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PhoneNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        self.content().cmp(&other.content())
    }
}

impl Item for PhoneNumber {
    const MODEL: ModelType = ModelType::new("phone_number");

    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.identity
    }
}

impl Record for PhoneNumber {
    const DEFAULT_TABLE: &'static str = "phone_numbers";
    const COLUMNS: &'static [&'static str] = &["area_code", "prefix", "suffix"];
    const HASHED: bool = true;

    fn field_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.area_code.clone()),
            Value::Text(self.prefix.clone()),
            Value::Text(self.suffix.clone()),
        ]
    }

    fn from_fields(row: &FieldRow) -> DbResult<Self> {
        Ok(Self {
            identity: Identity::transient(),
            area_code: row.text("area_code")?,
            prefix: row.text("prefix")?,
            suffix: row.text("suffix")?,
        })
    }
}

impl HashedItem for PhoneNumber {
    fn hash_fields(&self) -> Vec<&str> {
        let (area_code, prefix, suffix) = self.content();
        vec![area_code, prefix, suffix]
    }
}

impl Component for PhoneNumber {
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

#[cfg(test)]
mod tests {
    use super::PhoneNumber;
    use crate::model::error::ModelError;
    use crate::model::item::HashedItem;

    #[test]
    fn parses_dashed_numbers() {
        let phone = PhoneNumber::from(" 415-888-8899 ").unwrap();
        assert_eq!(phone.area_code(), "415");
        assert_eq!(phone.prefix(), "888");
        assert_eq!(phone.suffix(), "8899");
        assert_eq!(phone.to_string(), "415-888-8899");
    }

    #[test]
    fn rejects_other_formats() {
        for bad in ["4158888899", "415 888 8899", "(415) 888-8899", "415-888-889", ""] {
            assert!(matches!(
                PhoneNumber::from(bad),
                Err(ModelError::InvalidPhoneNumber(_))
            ));
        }
    }

    #[test]
    fn equal_numbers_share_hash() {
        let first: PhoneNumber = "888-888-8888".parse().unwrap();
        let second = PhoneNumber::from("888-888-8888").unwrap();
        assert_eq!(first.hash_key(), second.hash_key());
        assert_ne!(
            first.hash_key(),
            PhoneNumber::from("888-888-8889").unwrap().hash_key()
        );
    }
}
