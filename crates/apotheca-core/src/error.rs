//! # Error Types
//!
//! Domain-specific error types for apotheca-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  apotheca-core errors (this file)                                      │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  apotheca-ledger errors (separate crate)                               │
//! │  └── LedgerError      - Store/transaction failures                     │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → LedgerError → caller              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product id, quantities)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message in the UI layer

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised by ledger mutations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A source location lacks enough quantity for a transfer line (or for
    /// a sale under [`crate::OversellPolicy::Reject`]).
    ///
    /// ## When This Occurs
    /// ```text
    /// Transfer 5 units of product A out of location X
    ///      │
    ///      ▼
    /// Running balance for (A, X): available = 3
    ///      │
    ///      ▼
    /// InsufficientStock { product_id: "A", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// ENTIRE transfer aborts - no stock record is touched
    /// ```
    #[error("Insufficient stock for {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any store I/O runs. Batch operations (returns, adjustments,
/// transfer lines) downgrade these to a logged warning and skip the line;
/// single-item operations reject with the error.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
