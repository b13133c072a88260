//! CLI smoke entry point.
//!
//! # Responsibility
//! - Wire configuration, logging, registry and backend the way a host
//!   process does.
//! - Run a deterministic demo scenario or print per-model row counts.

use clap::{Parser, Subcommand};
use keystone_core::config::KeystoneConfig;
use keystone_core::model::item::Item;
use keystone_core::{
    Business, Contact, ContactKind, ContactService, EmailAddress, ItemRepository, MailAddress,
    Person, PhoneNumber, SqliteBackend, StorageRegistry,
};
use log::info;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "keystone", version, about = "Keystone persistence core smoke tool")]
struct Cli {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(long, short)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Store two people sharing an address and phone, then report keys.
    Demo,
    /// Print the number of stored rows per model.
    Counts,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("keystone: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = match cli.config.as_deref() {
        Some(path) => KeystoneConfig::load(path)?,
        None => KeystoneConfig::default(),
    };
    keystone_core::init_from_config(&config.logging)?;

    let registry = StorageRegistry::from_config(&config.storage)?;
    let backend = SqliteBackend::from_config(&config.database)?;
    let repository = ItemRepository::open(backend, registry, config.storage.options())?;
    info!(
        "event=cli_start module=cli status=ok version={}",
        keystone_core::core_version()
    );

    match cli.command.unwrap_or(Command::Counts) {
        Command::Demo => demo(ContactService::new(repository)),
        Command::Counts => {
            print_counts(&repository);
            Ok(())
        }
    }
}

fn demo(service: ContactService<SqliteBackend>) -> Result<(), Box<dyn Error>> {
    let address = MailAddress::new("1234 Main St", "Anytown", "CA", "94005");
    let phone = PhoneNumber::from("415-888-8899")?;

    let first = service.register_person(
        &Person::named("George Jungleman")
            .with_address(ContactKind::Home, address.clone())
            .with_phone(ContactKind::Home, phone.clone())
            .with_email(ContactKind::Work, EmailAddress::from("george@jungle.example")?),
    )?;
    let second = service.register_person(
        &Person::named("George Jungleman")
            .with_address(ContactKind::Home, address)
            .with_phone(ContactKind::Mobile, phone.clone()),
    )?;

    for person in [&first, &second] {
        let contact = person.contact();
        println!(
            "person={} contact={} address={} phone={}",
            person.key(),
            contact.key(),
            contact.address(ContactKind::Home).map_or(0, |a| a.key()),
            contact
                .phones()
                .values()
                .next()
                .map_or(0, |p| p.key()),
        );
    }

    let holders = service.find_people_with_phone(&phone)?;
    println!(
        "phone {} is held by {} people",
        phone.format_number(),
        holders.len()
    );
    print_counts(service.repository());
    Ok(())
}

fn print_counts(repository: &ItemRepository<SqliteBackend>) {
    let counts = [
        (MailAddress::MODEL.name(), repository.count::<MailAddress>()),
        (PhoneNumber::MODEL.name(), repository.count::<PhoneNumber>()),
        (EmailAddress::MODEL.name(), repository.count::<EmailAddress>()),
        (Contact::MODEL.name(), repository.count::<Contact>()),
        (Person::MODEL.name(), repository.count::<Person>()),
        (Business::MODEL.name(), repository.count::<Business>()),
    ];
    for (model, count) in counts {
        println!("{model}={count}");
    }
}
