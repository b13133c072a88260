mod common;

use common::{
    anytown_address, email, george_jungleman, phone, raw, repository, repository_with, row_count,
};
use keystone_core::model::contact::{
    ADDRESSES_SLOT, ALTERNATE_EMAILS_SLOT, EMAILS_SLOT, PHONES_SLOT,
};
use keystone_core::model::item::{Item, TRANSIENT_KEY};
use keystone_core::model::party::{CONTACT_SLOT, LOCATIONS_SLOT};
use keystone_core::model::{
    Business, Contact, ContactKind, EmailAddress, MailAddress, Person, PhoneNumber,
};
use keystone_core::store::Lookup;
use keystone_core::{StoreError, StoreOptions};

fn full_contact() -> Contact {
    Contact::new()
        .with_address(ContactKind::Home, anytown_address())
        .with_address(
            ContactKind::Work,
            MailAddress::new("500 Market St", "Anytown", "CA", "94010"),
        )
        .with_alternate_email(email("gj@alt.example"))
}

#[test]
fn every_reachable_component_gets_a_key() {
    let repo = repository();
    let saved = repo.save(&full_contact()).unwrap();

    assert_ne!(saved.key(), TRANSIENT_KEY);
    assert_eq!(saved.addresses().len(), 2);
    assert!(saved
        .addresses()
        .values()
        .all(|address| address.key() != TRANSIENT_KEY));
    assert!(saved
        .alternate_emails()
        .iter()
        .all(|email| email.key() != TRANSIENT_KEY));

    assert_eq!(repo.count_components(&saved, ADDRESSES_SLOT).unwrap(), 2);
    assert_eq!(
        repo.count_components(&saved, ALTERNATE_EMAILS_SLOT).unwrap(),
        1
    );
    assert_eq!(repo.count_components(&saved, PHONES_SLOT).unwrap(), 0);
}

#[test]
fn loaded_composites_keep_discriminants_and_members() {
    let repo = repository();
    let saved = repo.save(&full_contact()).unwrap();
    let loaded: Contact = repo.find(saved.key()).unwrap();

    assert_eq!(loaded, saved);
    assert_eq!(
        loaded.address(ContactKind::Work).map(|a| a.postal_code()),
        Some("94010")
    );
    assert_eq!(
        loaded.address(ContactKind::Home).map(|a| a.key()),
        saved.address(ContactKind::Home).map(|a| a.key())
    );
}

#[test]
fn single_components_are_fetched_by_discriminant() {
    let repo = repository();
    let saved = repo.save(&full_contact()).unwrap();

    let work: MailAddress = repo
        .component(&saved, ADDRESSES_SLOT, &ContactKind::Work)
        .unwrap();
    assert_eq!(work.street(), "500 Market St");

    let missing = repo
        .component::<_, EmailAddress, _>(&saved, EMAILS_SLOT, &ContactKind::Home)
        .unwrap_err();
    assert!(matches!(
        missing,
        StoreError::NotFound {
            lookup: Lookup::Component { .. },
            ..
        }
    ));
}

#[test]
fn undeclared_slots_are_rejected() {
    let repo = repository();
    let saved = repo.save(&full_contact()).unwrap();
    assert!(matches!(
        repo.count_components(&saved, "fax_numbers"),
        Err(StoreError::UnknownSlot { .. })
    ));
}

#[test]
fn two_people_share_value_objects_but_not_composites() {
    let repo = repository();
    let first = repo.save(&george_jungleman()).unwrap();
    let second = repo.save(&george_jungleman()).unwrap();

    assert_ne!(first.key(), second.key());
    assert_ne!(first.contact().key(), second.contact().key());
    assert_eq!(
        first.contact().address(ContactKind::Home).map(|a| a.key()),
        second.contact().address(ContactKind::Home).map(|a| a.key())
    );
    assert_eq!(
        first.contact().phone(ContactKind::Home).map(|p| p.key()),
        second.contact().phone(ContactKind::Home).map(|p| p.key())
    );

    assert_eq!(repo.count::<Person>(), 2);
    assert_eq!(repo.count::<Contact>(), 2);
    assert_eq!(repo.count::<MailAddress>(), 1);
    assert_eq!(repo.count::<PhoneNumber>(), 1);
}

#[test]
fn resaving_replaces_slot_entries() {
    let repo = repository();
    let saved = repo.save(&george_jungleman()).unwrap();

    let moved = saved
        .contact()
        .clone()
        .with_address(ContactKind::Home, anytown_address().with_city("Uptown"))
        .without_phone(ContactKind::Home)
        .with_phone(ContactKind::Mobile, phone("415-888-0001"));
    let person = saved.clone().with_contact(moved);
    let resaved = repo.save(&person).unwrap();

    let loaded: Person = repo.find(resaved.key()).unwrap();
    assert_eq!(
        loaded.contact().address(ContactKind::Home).map(|a| a.city()),
        Some("Uptown")
    );
    assert!(loaded.contact().phone(ContactKind::Home).is_none());
    assert_eq!(repo.count_components(loaded.contact(), PHONES_SLOT).unwrap(), 1);

    let anytown = repo.find_with_hash(&anytown_address()).unwrap();
    assert_eq!(anytown.city(), "Anytown");
}

#[test]
fn removing_a_person_keeps_components_by_default() {
    let repo = repository();
    let saved = repo.save(&george_jungleman()).unwrap();

    assert!(repo.remove(&saved).unwrap());
    assert!(repo.find::<Person>(saved.key()).unwrap_err().is_not_found());
    assert_eq!(repo.count::<Contact>(), 1);
    assert_eq!(repo.count::<MailAddress>(), 1);
    assert_eq!(row_count(&raw(&repo), "component_links"), 2);
}

#[test]
fn cascade_remove_deletes_only_unshared_children() {
    let repo = repository_with(StoreOptions {
        cascade_remove: true,
        ..StoreOptions::default()
    });
    let first = repo.save(&george_jungleman()).unwrap();
    let second = repo
        .save(
            &Person::named("Martha Jungleman")
                .with_address(ContactKind::Home, anytown_address())
                .with_email(ContactKind::Work, email("martha@jungle.example")),
        )
        .unwrap();

    assert!(repo.remove(&first).unwrap());
    assert_eq!(repo.count::<Person>(), 1);
    assert_eq!(repo.count::<Contact>(), 1);
    assert_eq!(repo.count::<PhoneNumber>(), 0);
    assert_eq!(repo.count::<MailAddress>(), 1);

    assert!(repo.remove(&second).unwrap());
    assert_eq!(repo.count::<Contact>(), 0);
    assert_eq!(repo.count::<MailAddress>(), 0);
    assert_eq!(repo.count::<EmailAddress>(), 0);
    assert_eq!(row_count(&raw(&repo), "component_links"), 0);
}

#[test]
fn a_contact_owned_by_a_person_cannot_be_removed_alone() {
    let repo = repository();
    let saved = repo.save(&george_jungleman()).unwrap();
    assert!(matches!(
        repo.remove(saved.contact()),
        Err(StoreError::StillReferenced { .. })
    ));
    assert_eq!(repo.count_components(&saved, CONTACT_SLOT).unwrap(), 1);
}

#[test]
fn business_locations_round_trip_as_a_set() {
    let repo = repository();
    let business = Business::named("Jungle Supplies")
        .with_contact(Contact::new().with_phone(ContactKind::Work, phone("415-555-0100")))
        .with_location(anytown_address())
        .with_location(MailAddress::new("77 Harbor Way", "Bayside", "CA", "94100"));
    let saved = repo.save(&business).unwrap();

    let loaded: Business = repo.find(saved.key()).unwrap();
    assert_eq!(loaded, saved);
    assert_eq!(loaded.locations().len(), 2);
    assert_eq!(repo.count_components(&loaded, LOCATIONS_SLOT).unwrap(), 2);

    let owners: Vec<Business> = repo
        .owners_of::<Business, _>(loaded.locations().iter().next().unwrap())
        .unwrap();
    assert_eq!(owners.len(), 1);
    assert_eq!(owners[0].key(), saved.key());
}

#[test]
fn use_item_sees_the_stored_state_in_one_transaction() {
    let repo = repository();
    let saved = repo.save(&george_jungleman()).unwrap();

    let summary = repo
        .use_item(&saved, |person: Person, uow| {
            let phones = uow.cascader().count_components::<Contact>(
                person.contact().key(),
                PHONES_SLOT,
            )?;
            Ok((person.name().to_string(), phones))
        })
        .unwrap();
    assert_eq!(summary, ("George Jungleman".to_string(), 1));
}
