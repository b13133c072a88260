//! Use-case services over the persistence core.
//!
//! # Responsibility
//! - Combine repository calls into contact-level operations.
//! - Keep validation and reverse lookups out of the CLI.

pub mod contact_service;

pub use contact_service::{ContactService, ServiceError, ServiceResult};
