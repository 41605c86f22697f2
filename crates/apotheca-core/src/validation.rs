//! # Validation Module
//!
//! Line-item validation for ledger mutations.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Back-office forms (out of scope)                             │
//! │  ├── Basic format checks, immediate user feedback                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - before any store I/O                           │
//! │  ├── Single ops: reject with ValidationError                           │
//! │  └── Batch ops:  skip the line with a logged warning, continue         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL constraints                                              │
//! │  └── CHECK (quantity >= 0)                                             │
//! │                                                                         │
//! │  Defense in depth: multiple layers catch different errors              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::ProductLine;
use crate::MAX_LINE_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates a product/location/actor identifier.
///
/// ## Rules
/// - Must not be empty (after trimming)
///
/// Ids are opaque strings here: the ledger does not own product or location
/// metadata and must not assume a UUID shape for ids minted elsewhere.
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a movement quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a set-mode adjustment target.
///
/// ## Rules
/// - Must be non-negative (>= 0); setting to zero is a valid stock-take
pub fn validate_set_quantity(qty: i64) -> ValidationResult<()> {
    if qty < 0 {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 0,
            max: MAX_LINE_QUANTITY,
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 0,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

// =============================================================================
// Line Validators
// =============================================================================

/// Validates one transfer product line.
///
/// Used by the engine to decide whether a line participates in the transfer
/// at all: invalid lines are skipped with a warning rather than aborting the
/// batch (insufficient stock, by contrast, aborts everything).
pub fn validate_transfer_line(line: &ProductLine) -> ValidationResult<()> {
    validate_id("product_id", &line.product_id)?;
    validate_quantity(line.quantity)?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(validate_id("product_id", "prod-123").is_ok());
        assert!(validate_id("product_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());

        assert!(validate_id("product_id", "").is_err());
        assert!(validate_id("product_id", "   ").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(100).is_ok());
        assert!(validate_quantity(MAX_LINE_QUANTITY).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(MAX_LINE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_set_quantity_allows_zero() {
        assert!(validate_set_quantity(0).is_ok());
        assert!(validate_set_quantity(500).is_ok());
        assert!(validate_set_quantity(-1).is_err());
    }

    #[test]
    fn test_validate_transfer_line() {
        let good = ProductLine {
            product_id: "prod-1".to_string(),
            quantity: 3,
            unit_price_cents: 1250,
        };
        assert!(validate_transfer_line(&good).is_ok());

        let missing_product = ProductLine {
            product_id: "".to_string(),
            ..good.clone()
        };
        assert!(validate_transfer_line(&missing_product).is_err());

        let zero_qty = ProductLine {
            quantity: 0,
            ..good.clone()
        };
        assert!(validate_transfer_line(&zero_qty).is_err());
    }
}
