//! Email address value object.

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

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^@\s]+)@([^@\s]+)$").expect("valid email regex"));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailAddress {
    #[serde(flatten)]
    identity: Identity,
    account: String,
    host: String,
}

impl EmailAddress {
    /// Parses `account@host`.
    pub fn from(formatted: &str) -> Result<Self, ModelError> {
        let formatted = formatted.trim();
        let captures = EMAIL_RE
            .captures(formatted)
            .ok_or_else(|| ModelError::InvalidEmailAddress(formatted.to_string()))?;
        Ok(Self {
            identity: Identity::transient(),
            account: captures[1].to_string(),
            host: captures[2].to_string(),
        })
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn format_address(&self) -> String {
        format!("{}@{}", self.account, self.host)
    }

    fn content(&self) -> (&str, &str) {
        (self.account.as_str(), self.host.as_str())
    }
}

impl FromStr for EmailAddress {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from(value)
    }
}

impl Display for EmailAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_address())
    }
}

impl PartialEq for EmailAddress {
    fn eq(&self, other: &Self) -> bool {
        self.content() == other.content()
    }
}

impl Eq for EmailAddress {}

impl PartialOrd for EmailAddress {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EmailAddress {
    fn cmp(&self, other: &Self) -> Ordering {
        self.content().cmp(&other.content())
    }
}

impl Item for EmailAddress {
    const MODEL: ModelType = ModelType::new("email_address");

    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.identity
    }
}

impl Record for EmailAddress {
    const DEFAULT_TABLE: &'static str = "email_addresses";
    const COLUMNS: &'static [&'static str] = &["account", "host"];
    const HASHED: bool = true;

    fn field_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.account.clone()),
            Value::Text(self.host.clone()),
        ]
    }

    fn from_fields(row: &FieldRow) -> DbResult<Self> {
        Ok(Self {
            identity: Identity::transient(),
            account: row.text("account")?,
            host: row.text("host")?,
        })
    }
}

impl HashedItem for EmailAddress {
    fn hash_fields(&self) -> Vec<&str> {
        vec![self.account.as_str(), self.host.as_str()]
    }
}

impl Component for EmailAddress {
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
