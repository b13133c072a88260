#![allow(dead_code)]

use keystone_core::model::{ContactKind, EmailAddress, MailAddress, Person, PhoneNumber};
use keystone_core::{ItemRepository, SqliteBackend, StorageRegistry, StoreOptions};
use rusqlite::Connection;
use std::path::Path;

pub fn repository() -> ItemRepository<SqliteBackend> {
    repository_with(StoreOptions::default())
}

pub fn repository_with(options: StoreOptions) -> ItemRepository<SqliteBackend> {
    ItemRepository::open(
        SqliteBackend::in_memory().unwrap(),
        StorageRegistry::with_defaults().unwrap(),
        options,
    )
    .unwrap()
}

pub fn file_repository(path: &Path) -> ItemRepository<SqliteBackend> {
    ItemRepository::open(
        SqliteBackend::open(path).unwrap(),
        StorageRegistry::with_defaults().unwrap(),
        StoreOptions::default(),
    )
    .unwrap()
}

pub fn anytown_address() -> MailAddress {
    MailAddress::new("1234 Main St", "Anytown", "CA", "94005")
}

pub fn phone(formatted: &str) -> PhoneNumber {
    PhoneNumber::from(formatted).unwrap()
}

pub fn email(formatted: &str) -> EmailAddress {
    EmailAddress::from(formatted).unwrap()
}

pub fn george_jungleman() -> Person {
    Person::named("George Jungleman")
        .with_address(ContactKind::Home, anytown_address())
        .with_phone(ContactKind::Home, phone("415-888-8899"))
}

/// Raw connection to the repository's database, for assertions and fault setup.
pub fn raw(repository: &ItemRepository<SqliteBackend>) -> Connection {
    repository.backend().connect().unwrap()
}

pub fn row_count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}
