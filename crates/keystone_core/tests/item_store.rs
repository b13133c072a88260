mod common;

use common::{anytown_address, email, george_jungleman, phone, raw, repository, row_count};
use keystone_core::model::item::{HashedItem, Item, TRANSIENT_KEY};
use keystone_core::model::{MailAddress, Person, PhoneNumber};
use keystone_core::store::Lookup;
use keystone_core::StoreError;

#[test]
fn saved_person_round_trips_with_every_field() {
    let repo = repository();
    let saved = repo.save(&george_jungleman()).unwrap();
    assert_ne!(saved.key(), TRANSIENT_KEY);

    let loaded: Person = repo.find(saved.key()).unwrap();
    assert_eq!(loaded, saved);
    assert_eq!(loaded.key(), saved.key());
    assert_eq!(loaded.contact().key(), saved.contact().key());
    assert_eq!(loaded.name(), "George Jungleman");
}

#[test]
fn save_leaves_the_input_transient() {
    let repo = repository();
    let person = george_jungleman();
    let saved = repo.save(&person).unwrap();

    assert_eq!(person.key(), TRANSIENT_KEY);
    assert_eq!(person.contact().key(), TRANSIENT_KEY);
    assert_ne!(saved.contact().key(), TRANSIENT_KEY);
}

#[test]
fn resaving_a_persisted_person_keeps_its_key() {
    let repo = repository();
    let saved = repo.save(&george_jungleman()).unwrap();
    let again = repo.save(&saved).unwrap();

    assert_eq!(again.key(), saved.key());
    assert_eq!(repo.count::<Person>(), 1);
}

#[test]
fn updating_a_vanished_row_is_a_conflict() {
    let repo = repository();
    let saved = repo.save(&george_jungleman()).unwrap();
    raw(&repo)
        .execute("DELETE FROM people WHERE id = ?1;", [saved.key()])
        .unwrap();

    match repo.save(&saved).unwrap_err() {
        StoreError::Conflict { model, key } => {
            assert_eq!(model, Person::MODEL);
            assert_eq!(key, saved.key());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_keys_are_not_found() {
    let repo = repository();
    let err = repo.find::<Person>(4242).unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(
        err,
        StoreError::NotFound {
            lookup: Lookup::Key(4242),
            ..
        }
    ));
    assert!(matches!(
        repo.reload(&Person::named("Nobody Here")),
        Err(StoreError::NotFound { .. })
    ));
}

#[test]
fn equal_phone_numbers_share_one_row() {
    let repo = repository();
    let first = repo.save(&phone("888-888-8888")).unwrap();
    let second = repo.save(&phone("888-888-8888")).unwrap();

    assert_eq!(first.key(), second.key());
    assert_eq!(first.hash_key(), second.hash_key());
    assert_eq!(repo.count::<PhoneNumber>(), 1);

    let other = repo.save(&phone("888-888-8889")).unwrap();
    assert_ne!(other.key(), first.key());
    assert_eq!(repo.count::<PhoneNumber>(), 2);
}

#[test]
fn hashed_rows_are_resolved_by_hash_or_key() {
    let repo = repository();
    let stored = repo.save(&anytown_address()).unwrap();

    let by_hash = repo.find_with_hash(&anytown_address()).unwrap();
    assert_eq!(by_hash.key(), stored.key());

    let by_key = repo.find_with_hash(&stored).unwrap();
    assert_eq!(by_key.key(), stored.key());

    let oldest: MailAddress = repo.find_by_hash(&stored.hash_key()).unwrap();
    assert_eq!(oldest.key(), stored.key());

    let unknown = MailAddress::new("1 Nowhere Rd", "Anytown", "CA", "94005");
    assert!(matches!(
        repo.find_with_hash(&unknown),
        Err(StoreError::NotFound {
            lookup: Lookup::Hash(_),
            ..
        })
    ));
    assert!(repo.lookup_with_hash(&unknown).unwrap().is_none());
}

#[test]
fn changing_a_value_creates_a_new_row_and_keeps_the_old_one() {
    let repo = repository();
    let anytown = repo.save(&anytown_address()).unwrap();

    let uptown = anytown.clone().with_city("Uptown");
    assert_eq!(uptown.key(), TRANSIENT_KEY);
    let uptown = repo.save(&uptown).unwrap();

    assert_ne!(uptown.key(), anytown.key());
    assert_ne!(uptown.hash_key(), anytown.hash_key());
    assert_eq!(repo.count::<MailAddress>(), 2);

    let original: MailAddress = repo.find(anytown.key()).unwrap();
    assert_eq!(original.city(), "Anytown");
    assert_eq!(
        repo.find_with_hash(&anytown_address()).unwrap().key(),
        anytown.key()
    );
}

#[test]
fn normalized_inputs_hash_identically() {
    let repo = repository();
    let first = repo
        .save(&MailAddress::new("1234 main st.", "anytown", " ca ", "94005"))
        .unwrap();
    let second = repo.save(&anytown_address()).unwrap();
    assert_eq!(first.key(), second.key());
}

#[test]
fn removing_transient_items_is_a_no_op() {
    let repo = repository();
    assert!(!repo.remove(&george_jungleman()).unwrap());
    assert!(!repo.remove(&email("george@jungle.example")).unwrap());
}

#[test]
fn removed_items_are_no_longer_found() {
    let repo = repository();
    let stored = repo.save(&email("george@jungle.example")).unwrap();

    assert!(repo.remove(&stored).unwrap());
    assert!(repo.find::<keystone_core::EmailAddress>(stored.key())
        .unwrap_err()
        .is_not_found());
    assert!(repo
        .find_with_hash(&email("george@jungle.example"))
        .unwrap_err()
        .is_not_found());
    assert!(repo
        .find_by_hash::<keystone_core::EmailAddress>(&stored.hash_key())
        .unwrap_err()
        .is_not_found());
    assert!(!repo.remove(&stored).unwrap());
}

#[test]
fn referenced_value_objects_cannot_be_removed() {
    let repo = repository();
    let person = repo.save(&george_jungleman()).unwrap();
    let shared = person
        .contact()
        .phones()
        .values()
        .next()
        .cloned()
        .unwrap();

    match repo.remove(&shared).unwrap_err() {
        StoreError::StillReferenced {
            model, references, ..
        } => {
            assert_eq!(model, PhoneNumber::MODEL);
            assert_eq!(references, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(row_count(&raw(&repo), "phone_numbers"), 1);
}

#[test]
fn counts_follow_inserts_and_removals() {
    let repo = repository();
    assert_eq!(repo.count::<PhoneNumber>(), 0);

    let stored = repo.save(&phone("415-888-8899")).unwrap();
    repo.save(&phone("415-888-0001")).unwrap();
    assert_eq!(repo.try_count::<PhoneNumber>().unwrap(), 2);

    repo.remove(&stored).unwrap();
    assert_eq!(repo.count::<PhoneNumber>(), 1);
}

fn forge_phone_row(conn: &rusqlite::Connection, hash: &str) -> i64 {
    conn.execute(
        "INSERT INTO phone_numbers (hash_key, area_code, prefix, suffix)
         VALUES (?1, '000', '000', '0000');",
        [hash],
    )
    .unwrap();
    conn.last_insert_rowid()
}

#[test]
fn hash_hits_with_different_content_are_not_reused() {
    let repo = repository();
    let wanted = phone("415-888-8899");
    let forged = forge_phone_row(&raw(&repo), wanted.hash_key().as_str());

    let saved = repo.save(&wanted).unwrap();
    assert_ne!(saved.key(), forged);
    assert_eq!(saved.format_number(), "415-888-8899");
    assert_eq!(repo.count::<PhoneNumber>(), 2);
}

#[test]
fn unverified_hash_hits_trust_the_stored_row() {
    let repo = common::repository_with(keystone_core::StoreOptions {
        verify_hash_content: false,
        ..keystone_core::StoreOptions::default()
    });
    let wanted = phone("415-888-8899");
    let forged = forge_phone_row(&raw(&repo), wanted.hash_key().as_str());

    let saved = repo.save(&wanted).unwrap();
    assert_eq!(saved.key(), forged);
    assert_eq!(repo.count::<PhoneNumber>(), 1);
}
