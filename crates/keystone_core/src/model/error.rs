//! Construction and validation errors of domain value objects.

use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Phone numbers must look like `999-999-9999`.
    InvalidPhoneNumber(String),
    /// Email addresses must look like `account@host`.
    InvalidEmailAddress(String),
    /// A normalized field failed its format or length rule.
    InvalidField { field: &'static str, value: String },
    InvalidName(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPhoneNumber(value) => {
                write!(f, "phone numbers must have a format like 999-999-9999: {value}")
            }
            Self::InvalidEmailAddress(value) => write!(f, "bad email address: {value}"),
            Self::InvalidField { field, value } => write!(f, "invalid {field}: `{value}`"),
            Self::InvalidName(value) => write!(f, "name is too short or too long: `{value}`"),
        }
    }
}

impl Error for ModelError {}
