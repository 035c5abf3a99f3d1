//! # Validation Module
//!
//! Input validation for entity names and identifiers.
//!
//! ## Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Name Validation                                    │
//! │                                                                         │
//! │  ""        → Required                                                  │
//! │  "   "     → accepted (names are stored as given, never trimmed)       │
//! │  > 255     → TooLong                                                   │
//! │  "Japan"   → accepted                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tandem_core::validation::validate_country_name;
//!
//! assert!(validate_country_name("Japan").is_ok());
//! assert!(validate_country_name("").is_err());
//! ```

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest name any entity column accepts.
pub const MAX_NAME_LEN: usize = 255;

fn validate_name(field: &str, value: &str) -> ValidationResult<()> {
    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates a country name.
pub fn validate_country_name(name: &str) -> ValidationResult<()> {
    validate_name("country name", name)
}

/// Validates a city name.
pub fn validate_city_name(name: &str) -> ValidationResult<()> {
    validate_name("city name", name)
}

/// Validates a user name.
pub fn validate_user_name(name: &str) -> ValidationResult<()> {
    validate_name("user name", name)
}

/// Validates a numeric row identifier.
///
/// ## Example
/// ```rust
/// use tandem_core::validation::validate_id;
///
/// assert!(validate_id("country_id", 1).is_ok());
/// assert!(validate_id("country_id", 0).is_err());
/// ```
pub fn validate_id(field: &str, id: i64) -> ValidationResult<()> {
    if id <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
