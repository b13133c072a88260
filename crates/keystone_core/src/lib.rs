//! Persistence core for the keystone contact backend.
//! Items are stored under surrogate keys, value objects are deduplicated by
//! content hash and composites are saved together with their components.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;

pub use config::{ConfigError, KeystoneConfig};
pub use db::{open_db, open_db_in_memory, Backend, DbError, LikeQuery, Session, SqliteBackend};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status, LoggingError};
pub use model::item::{HashKey, HashedItem, Item, ItemKey, ModelType};
pub use model::{
    Business, Contact, ContactKind, EmailAddress, MailAddress, ModelError, Person, PhoneNumber,
};
pub use service::{ContactService, ServiceError};
pub use store::{
    ItemRepository, Lookup, StorageRegistry, StoreError, StoreOptions, StoreResult,
    TransactionContext,
};

/// Minimal health-check API for smoke binaries.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
