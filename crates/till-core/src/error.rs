//! # Error Types
//!
//! Domain-specific error types for till-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  till-core errors (this file)                                          │
//! │  ├── CoreError        - Domain rule violations                         │
//! │  └── ValidationError  - Request shape failures                         │
//! │                                                                         │
//! │  till-db errors                                                        │
//! │  └── DbError          - Store adapter failures                         │
//! │                                                                         │
//! │  till-engine errors                                                    │
//! │  └── OrderError       - What the HTTP collaborator maps to a status    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → OrderError ← DbError              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Discount type string is not one of the known rule types.
    #[error("Unknown discount type: {0}")]
    UnknownDiscountType(String),

    /// Payment type string is not one of the known payment kinds.
    #[error("Unknown payment type: {0}")]
    UnknownPaymentType(String),

    /// Request failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before a request reaches the pricing engine.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Too many entries in a list.
    #[error("{field} cannot have more than {max} entries")]
    TooMany { field: String, max: usize },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::UnknownDiscountType("HALF_OFF".to_string());
        assert_eq!(err.to_string(), "Unknown discount type: HALF_OFF");

        let err = ValidationError::OutOfRange {
            field: "qty".to_string(),
            min: 1,
            max: 999,
        };
        assert_eq!(err.to_string(), "qty must be between 1 and 999");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "products".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
