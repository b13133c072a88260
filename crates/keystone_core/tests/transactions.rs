mod common;

use common::{anytown_address, file_repository, phone, raw, repository, row_count};
use keystone_core::model::item::{Item, TRANSIENT_KEY};
use keystone_core::model::{Contact, ContactKind, PhoneNumber};
use keystone_core::store::TxState;
use keystone_core::StoreError;

const FAIL_ON_SUFFIX_0000: &str = "CREATE TRIGGER fail_phone_insert
    BEFORE INSERT ON phone_numbers
    WHEN NEW.suffix = '0000'
    BEGIN
        SELECT RAISE(ABORT, 'injected failure');
    END;";

#[test]
fn a_failing_child_insert_rolls_back_the_whole_save() {
    let dir = tempfile::tempdir().unwrap();
    let repo = file_repository(&dir.path().join("atomic.db"));
    raw(&repo).execute_batch(FAIL_ON_SUFFIX_0000).unwrap();

    let contact = Contact::new()
        .with_address(ContactKind::Home, anytown_address())
        .with_phone(ContactKind::Home, phone("415-888-0001"))
        .with_phone(ContactKind::Work, phone("415-888-0000"))
        .with_phone(ContactKind::Mobile, phone("415-888-0002"));

    let err = repo.save(&contact).unwrap_err();
    assert!(matches!(err, StoreError::Persistence(_)));

    let conn = raw(&repo);
    assert_eq!(row_count(&conn, "contacts"), 0);
    assert_eq!(row_count(&conn, "phone_numbers"), 0);
    assert_eq!(row_count(&conn, "mail_addresses"), 0);
    assert_eq!(row_count(&conn, "component_links"), 0);

    assert_eq!(contact.key(), TRANSIENT_KEY);
    assert!(contact
        .phones()
        .values()
        .all(|phone| phone.key() == TRANSIENT_KEY));
}

#[test]
fn repository_stays_usable_after_a_rollback() {
    let dir = tempfile::tempdir().unwrap();
    let repo = file_repository(&dir.path().join("recover.db"));
    raw(&repo).execute_batch(FAIL_ON_SUFFIX_0000).unwrap();

    assert!(repo.save(&phone("415-888-0000")).is_err());
    let stored = repo.save(&phone("415-888-0003")).unwrap();
    assert_ne!(stored.key(), TRANSIENT_KEY);
    assert_eq!(repo.count::<PhoneNumber>(), 1);
}

#[test]
fn a_context_runs_exactly_one_operation() {
    let repo = repository();
    let mut context = repo.create_context();
    assert_eq!(context.state(), TxState::Idle);

    let stored = context
        .commit_with("save", PhoneNumber::MODEL, |uow| {
            uow.hashed().save(phone("415-888-8899"))
        })
        .unwrap();
    assert_eq!(context.state(), TxState::Committed);
    assert_ne!(stored.key(), TRANSIENT_KEY);

    let reused = context.commit_with("count", PhoneNumber::MODEL, |uow| {
        uow.surrogates().count::<PhoneNumber>()
    });
    assert!(matches!(
        reused,
        Err(StoreError::InvalidState(TxState::Committed))
    ));
}

#[test]
fn failed_work_leaves_the_context_rolled_back() {
    let repo = repository();
    let mut context = repo.create_context().without_logging();

    let result = context.commit_with("find", PhoneNumber::MODEL, |uow| {
        uow.hashed().save(phone("415-888-8899"))?;
        uow.surrogates().find::<PhoneNumber>(9999)
    });
    assert!(result.unwrap_err().is_not_found());
    assert_eq!(context.state(), TxState::RolledBack);
    assert_eq!(repo.count::<PhoneNumber>(), 0);
}

#[test]
fn committed_work_is_visible_to_later_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("durable.db");
    let key = {
        let repo = file_repository(&path);
        repo.save(&phone("415-888-8899")).unwrap().key()
    };

    let reopened = file_repository(&path);
    let loaded: PhoneNumber = reopened.find(key).unwrap();
    assert_eq!(loaded.format_number(), "415-888-8899");
}
