//! # apotheca-core: Pure Domain Logic for the Apotheca Stock Ledger
//!
//! This crate is the **heart** of the Apotheca back office. It contains the
//! stock-ledger domain logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Apotheca Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Back-office UI (out of scope)                   │   │
//! │  │    Receipts ──► Transfers ──► Sales ──► Returns ──► Stocktake   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             apotheca-ledger (Mutation Engine)                   │   │
//! │  │    SQLite stock records, movement log, change notifier          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ apotheca-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │ movement  │  │ validation│  │   error   │  │   │
//! │  │   │ Movement  │  │  signed   │  │   rules   │  │  typed    │  │   │
//! │  │   │ Transfer  │  │  deltas   │  │  checks   │  │  errors   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (StockRecord, StockMovement, StockTransfer, ...)
//! - [`movement`] - Movement arithmetic (signed deltas, clamping, invariants)
//! - [`error`] - Domain error types
//! - [`validation`] - Line-item validation rules
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Quantities**: All stock quantities are whole units (i64)
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use apotheca_core::movement;
//!
//! // A sale never drives stock below zero: the result is clamped
//! assert_eq!(movement::consume(5, 8), 0);
//!
//! // A goods receipt simply adds
//! assert_eq!(movement::receive(10, 4), 14);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod movement;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use apotheca_core::StockMovement` instead of
// `use apotheca_core::types::StockMovement`

pub use error::{CoreError, ValidationError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default actor id used when a mutation has no authenticated user attached
///
/// ## Why a constant?
/// Every stock record write carries an `updated_by` actor for the audit
/// trail. Scheduled jobs and seed tooling have no logged-in user, so they
/// stamp this sentinel instead of an empty string.
pub const SYSTEM_USER_ID: &str = "system";

/// Maximum quantity accepted on a single movement line
///
/// ## Business Reason
/// Prevents fat-finger entries (e.g., typing 100000 instead of 100)
/// from flowing into the ledger. Configurable per-tenant in future versions.
pub const MAX_LINE_QUANTITY: i64 = 1_000_000;
