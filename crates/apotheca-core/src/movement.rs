//! # Movement Arithmetic
//!
//! Pure quantity math for the stock ledger. Every mutation the engine
//! applies reduces to one of the functions in this module.
//!
//! ## The One Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  current stock(product, location)                                       │
//! │      == sum of every signed movement ever applied to that key           │
//! │                                                                         │
//! │  Which requires:                                                        │
//! │  • computed quantities never go negative (clamping)                    │
//! │  • the logged magnitude is the APPLIED change, not the requested one   │
//! │                                                                         │
//! │  Example: sell 8 with 5 on hand (ClampToZero policy)                   │
//! │      old = 5, requested = 8                                            │
//! │      new = consume(5, 8) = 0                                           │
//! │      logged quantity = applied_magnitude(5, 0) = 5   (not 8!)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All functions here are deterministic and total; validation of the inputs
//! (positive quantities, non-empty ids) happens in [`crate::validation`]
//! before any of this math runs.

use crate::types::{AdjustmentMode, StockDirection};

/// Inbound stock: goods receipt, transfer-in, sales return, reversal.
///
/// `new = old + quantity`
#[inline]
pub fn receive(old: i64, quantity: i64) -> i64 {
    old + quantity
}

/// Outbound stock with clamping: sale, purchase return, subtract-adjustment.
///
/// `new = max(0, old - quantity)` - the ledger never records negative stock.
#[inline]
pub fn consume(old: i64, quantity: i64) -> i64 {
    (old - quantity).max(0)
}

/// Manual adjustment in one of its three modes.
pub fn adjust(old: i64, mode: AdjustmentMode, quantity: i64) -> i64 {
    match mode {
        AdjustmentMode::Add => receive(old, quantity),
        AdjustmentMode::Subtract => consume(old, quantity),
        AdjustmentMode::Set => quantity,
    }
}

/// Unsigned magnitude of an applied change, for the movement log.
#[inline]
pub fn applied_magnitude(old: i64, new: i64) -> i64 {
    (new - old).abs()
}

/// Direction of an applied change, for snapshot bucketing.
///
/// A no-op change (old == new, e.g. selling from an empty shelf under the
/// clamping policy) is bucketed as `Out`: the business event was a
/// consumption even if nothing moved.
#[inline]
pub fn direction_of(old: i64, new: i64) -> StockDirection {
    if new > old {
        StockDirection::In
    } else {
        StockDirection::Out
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
