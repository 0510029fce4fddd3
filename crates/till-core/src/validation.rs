//! # Validation Module
//!
//! Request shape validation for Till POS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP layer                                                   │
//! │  └── Type validation (deserialization)                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: OrderService (Rust)                                          │
//! │  └── THIS MODULE: required fields, ranges, list sizes                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Pricing engine                                               │
//! │  └── Unknown products and short stock skip the line                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 4: Database (SQLite)                                            │
//! │  ├── UNIQUE receipt_id                                                 │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use till_core::validation::{validate_order_lines, validate_quantity};
//! use till_core::OrderLineRequest;
//!
//! validate_quantity(5).unwrap();
//! validate_order_lines(&[OrderLineRequest::new(1, 2)]).unwrap();
//! assert!(validate_order_lines(&[]).is_err());
//! ```

use crate::error::ValidationError;
use crate::types::{AddOrderRequest, OrderLineRequest, Product};
use crate::{MAX_LINE_QUANTITY, MAX_ORDER_LINES};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "qty".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "qty".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a store identifier (`productId`, `paymentId`, ...).
pub fn validate_id(field: &str, id: i64) -> ValidationResult<()> {
    if id <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Request Validators
// =============================================================================

/// Validates the requested lines of a subtotal or order.
///
/// Duplicate product ids are allowed; the pricing engine merges them.
pub fn validate_order_lines(lines: &[OrderLineRequest]) -> ValidationResult<()> {
    if lines.is_empty() {
        return Err(ValidationError::Required {
            field: "products".to_string(),
        });
    }

    if lines.len() > MAX_ORDER_LINES {
        return Err(ValidationError::TooMany {
            field: "products".to_string(),
            max: MAX_ORDER_LINES,
        });
    }

    for line in lines {
        validate_id("productId", line.product_id)?;
        validate_quantity(line.qty)?;
    }

    Ok(())
}

/// Validates an add-order request.
///
/// Underpayment is not rejected here: the order records a negative change.
pub fn validate_add_order(request: &AddOrderRequest) -> ValidationResult<()> {
    validate_id("paymentId", request.payment_id)?;

    if let Some(cashier_id) = request.cashier_id {
        validate_id("cashierId", cashier_id)?;
    }

    if request.total_paid <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "totalPaid".to_string(),
        });
    }

    validate_order_lines(&request.products)
}

/// Validates a product before it is written to the catalog.
pub fn validate_product(product: &Product) -> ValidationResult<()> {
    if product.name.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    for (field, value) in [("price", product.price_cents), ("stock", product.stock)] {
        if value < 0 {
            return Err(ValidationError::OutOfRange {
                field: field.to_string(),
                min: 0,
                max: i64::MAX,
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
