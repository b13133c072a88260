//! Populate-once lookup from model type to backing table.
//!
//! # Responsibility
//! - Map every model type to exactly one storage handle.
//! - Reject invalid or duplicate table names while building.
//!
//! # Invariants
//! - A built `StorageRegistry` is read-only; it is passed by reference to
//!   every unit of work instead of living in a global.
//! - One table backs at most one model.

use crate::config::StorageConfig;
use crate::db::is_valid_identifier;
use crate::model::item::{ModelDescriptor, ModelType};
use crate::store::{StoreError, StoreResult};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Resolved storage location of one model type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageHandle {
    model: ModelType,
    table: String,
    columns: &'static [&'static str],
    hashed: bool,
}

impl StorageHandle {
    pub fn new(descriptor: ModelDescriptor, table: impl Into<String>) -> Self {
        Self {
            model: descriptor.model,
            table: table.into(),
            columns: descriptor.columns,
            hashed: descriptor.hashed,
        }
    }

    pub fn model(&self) -> ModelType {
        self.model
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &'static [&'static str] {
        self.columns
    }

    pub fn is_hashed(&self) -> bool {
        self.hashed
    }
}

/// Registry build errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    InvalidTableName(String),
    DuplicateModel(String),
    DuplicateTable(String),
    UnknownModel(String),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTableName(value) => write!(f, "table name is invalid: {value}"),
            Self::DuplicateModel(value) => write!(f, "model already registered: {value}"),
            Self::DuplicateTable(value) => write!(f, "table already registered: {value}"),
            Self::UnknownModel(value) => write!(f, "model is not known: {value}"),
        }
    }
}

impl Error for RegistryError {}

#[derive(Debug, Default)]
pub struct StorageRegistryBuilder {
    handles: BTreeMap<&'static str, StorageHandle>,
}

impl StorageRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one model on `table`.
    pub fn register(
        &mut self,
        descriptor: ModelDescriptor,
        table: impl Into<String>,
    ) -> Result<&mut Self, RegistryError> {
        let table = table.into().trim().to_string();
        if !is_valid_identifier(&table) {
            return Err(RegistryError::InvalidTableName(table));
        }

        let model = descriptor.model.name();
        if self.handles.contains_key(model) {
            return Err(RegistryError::DuplicateModel(model.to_string()));
        }
        if self.handles.values().any(|handle| handle.table == table) {
            return Err(RegistryError::DuplicateTable(table));
        }

        self.handles
            .insert(model, StorageHandle::new(descriptor, table));
        Ok(self)
    }

    /// Registers one model on its default table.
    pub fn register_default(
        &mut self,
        descriptor: ModelDescriptor,
    ) -> Result<&mut Self, RegistryError> {
        self.register(descriptor, descriptor.default_table)
    }

    pub fn build(self) -> StorageRegistry {
        let tables = self
            .handles
            .values()
            .map(|handle| (handle.table.clone(), handle.model.name()))
            .collect();
        StorageRegistry {
            handles: self.handles,
            tables,
        }
    }
}

/// Read-only model to storage map.
#[derive(Debug, Clone)]
pub struct StorageRegistry {
    handles: BTreeMap<&'static str, StorageHandle>,
    tables: BTreeMap<String, &'static str>,
}

impl StorageRegistry {
    pub fn builder() -> StorageRegistryBuilder {
        StorageRegistryBuilder::new()
    }

    /// Every known model on its default table.
    pub fn with_defaults() -> Result<Self, RegistryError> {
        Self::from_config(&StorageConfig::default())
    }

    /// Builds the registry from `[storage]` configuration.
    ///
    /// Every known model is registered; bindings only override tables.
    pub fn from_config(config: &StorageConfig) -> Result<Self, RegistryError> {
        let catalog = crate::model::catalog();
        let mut overrides: BTreeMap<&str, &str> = BTreeMap::new();
        for binding in &config.models {
            let model = binding.model.trim();
            if !catalog.iter().any(|descriptor| descriptor.model.name() == model) {
                return Err(RegistryError::UnknownModel(model.to_string()));
            }
            if overrides.insert(model, binding.table.as_str()).is_some() {
                return Err(RegistryError::DuplicateModel(model.to_string()));
            }
        }

        let mut builder = Self::builder();
        for descriptor in catalog {
            match overrides.get(descriptor.model.name()) {
                Some(table) => builder.register(descriptor, *table)?,
                None => builder.register_default(descriptor)?,
            };
        }
        Ok(builder.build())
    }

    /// Resolves the storage of `model`.
    pub fn storage_for(&self, model: ModelType) -> StoreResult<&StorageHandle> {
        self.handles
            .get(model.name())
            .ok_or_else(|| StoreError::NoSuchStorage(model.name().to_string()))
    }

    /// Resolves the storage backed by `table`.
    pub fn storage_named(&self, table: &str) -> StoreResult<&StorageHandle> {
        self.tables
            .get(table)
            .and_then(|model| self.handles.get(model))
            .ok_or_else(|| StoreError::NoSuchStorage(table.to_string()))
    }

    pub fn handles(&self) -> impl Iterator<Item = &StorageHandle> {
        self.handles.values()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{RegistryError, StorageRegistry};
    use crate::model::item::{Item, Record};
    use crate::model::{MailAddress, PhoneNumber};
    use crate::store::StoreError;

    #[test]
    fn register_rejects_invalid_and_duplicate_entries() {
        let mut builder = StorageRegistry::builder();
        assert_eq!(
            builder
                .register(PhoneNumber::descriptor(), "Phone Numbers")
                .err(),
            Some(RegistryError::InvalidTableName("Phone Numbers".to_string()))
        );

        builder
            .register(PhoneNumber::descriptor(), "phones")
            .unwrap();
        assert_eq!(
            builder.register_default(PhoneNumber::descriptor()).err(),
            Some(RegistryError::DuplicateModel("phone_number".to_string()))
        );
        assert_eq!(
            builder.register(MailAddress::descriptor(), "phones").err(),
            Some(RegistryError::DuplicateTable("phones".to_string()))
        );
    }

    #[test]
    fn defaults_cover_every_catalog_model() {
        let registry = StorageRegistry::with_defaults().unwrap();
        assert_eq!(registry.len(), crate::model::catalog().len());
        assert_eq!(
            registry.storage_for(MailAddress::MODEL).unwrap().table(),
            "mail_addresses"
        );
    }

    #[test]
    fn lookup_by_model_and_table() {
        let mut builder = StorageRegistry::builder();
        builder.register_default(PhoneNumber::descriptor()).unwrap();
        let registry = builder.build();

        let handle = registry.storage_for(PhoneNumber::MODEL).unwrap();
        assert_eq!(handle.table(), "phone_numbers");
        assert!(handle.is_hashed());
        assert_eq!(
            registry.storage_named("phone_numbers").unwrap().model(),
            PhoneNumber::MODEL
        );
        assert!(matches!(
            registry.storage_for(MailAddress::MODEL),
            Err(StoreError::NoSuchStorage(name)) if name == "mail_address"
        ));
    }
}
