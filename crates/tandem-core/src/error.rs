//! # Error Types
//!
//! Domain-specific error types for tandem-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tandem-core errors (this file)                                        │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tandem-db errors (separate crate)                                     │
//! │  └── DbError          - Routing / connection / statement failures      │
//! │                                                                         │
//! │  Flow: ValidationError → DbError::Invalid → caller                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before anything reaches the database.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "country name".to_string(),
        };
        assert_eq!(err.to_string(), "country name is required");

        let err = ValidationError::TooLong {
            field: "city name".to_string(),
            max: 255,
        };
        assert_eq!(err.to_string(), "city name must be at most 255 characters");

        let err = ValidationError::MustBePositive {
            field: "country_id".to_string(),
        };
        assert_eq!(err.to_string(), "country_id must be positive");
    }
}
