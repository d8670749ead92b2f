//! App name rules
//!
//! App names are globally unique slugs: lowercase ASCII letters and digits,
//! optionally separated by single dashes.

use std::fmt;

/// Maximum length of an app name
pub const MAX_NAME_LEN: usize = 40;

/// Validate an app name
pub fn validate_name(name: &str) -> Result<(), NameValidationError> {
    if name.is_empty() {
        return Err(NameValidationError::Empty);
    }

    if name.len() > MAX_NAME_LEN {
        return Err(NameValidationError::TooLong(name.len()));
    }

    let valid_segments = name.split('-').all(|segment| {
        !segment.is_empty()
            && segment
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    });

    if !valid_segments {
        return Err(NameValidationError::NotASlug(name.to_string()));
    }

    Ok(())
}

/// Validation errors for app names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameValidationError {
    Empty,
    TooLong(usize),
    NotASlug(String),
}

impl fmt::Display for NameValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "App name cannot be empty"),
            Self::TooLong(len) => {
                write!(f, "App name too long ({} chars, max {})", len, MAX_NAME_LEN)
            }
            Self::NotASlug(name) => write!(
                f,
                "App name '{}' must contain only lowercase letters, digits and single dashes",
                name
            ),
        }
    }
}

impl std::error::Error for NameValidationError {}
