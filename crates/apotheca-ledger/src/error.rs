//! # Ledger Error Types
//!
//! Error types for stock ledger operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)         Domain rule (apotheca-core)        │
//! │       │                                  │                              │
//! │       ▼                                  ▼                              │
//! │  LedgerError (this module) ← one surface for both kinds                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Caller (back-office UI, out of scope) translates kinds to messages    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Transient store failures propagate unchanged: this crate performs no
//! retries of its own.

use thiserror::Error;

use apotheca_core::{CoreError, ValidationError};

/// Stock ledger operation errors.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A business rule rejected the mutation.
    ///
    /// ## When This Occurs
    /// - `InsufficientStock` aborting a transfer (or a sale under the
    ///   `Reject` oversell policy)
    /// - Validation failure on a single-item operation
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file doesn't exist and can't be created
    /// - File permissions issue
    /// - Disk full
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A constraint rejected a write.
    ///
    /// ## When This Occurs
    /// - `CHECK (quantity >= 0)` tripping on a write the application-level
    ///   clamping should have prevented
    /// - Duplicate movement id (should never happen with UUID v4)
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

/// Convert sqlx errors to LedgerError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → LedgerError::PoolExhausted
/// sqlx::Error::PoolClosed     → LedgerError::ConnectionFailed
/// Other                       → LedgerError::Internal
/// ```
impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite constraint messages:
                // "UNIQUE constraint failed: <table>.<column>"
                // "CHECK constraint failed: <expr>"
                // "FOREIGN KEY constraint failed"
                if msg.contains("constraint failed") {
                    LedgerError::ConstraintViolation(msg.to_string())
                } else {
                    LedgerError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => LedgerError::PoolExhausted,

            sqlx::Error::PoolClosed => LedgerError::ConnectionFailed("Pool is closed".to_string()),

            _ => LedgerError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for LedgerError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        LedgerError::MigrationFailed(err.to_string())
    }
}

impl From<ValidationError> for LedgerError {
    fn from(err: ValidationError) -> Self {
        LedgerError::Domain(CoreError::Validation(err))
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// Unit Tests
// =============================================================================
