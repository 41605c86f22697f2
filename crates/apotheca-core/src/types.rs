//! # Domain Types
//!
//! Core domain types for the Apotheca stock ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   StockRecord   │   │  StockMovement  │   │  StockTransfer  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  product_id     │   │  action         │   │  id (UUID)      │       │
//! │  │  location_id    │   │  old_stock      │   │  groups         │       │
//! │  │  quantity       │   │  new_stock      │   │   └─ lines      │       │
//! │  │  updated_by     │   │  reference_no   │   │  user_id        │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ MovementAction  │   │ MovementContext │   │ OversellPolicy  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  GoodsReceived  │   │  one variant    │   │  ClampToZero    │       │
//! │  │  TransferIn/Out │   │  per action,    │   │  Reject         │       │
//! │  │  Sale, Returns  │   │  typed fields   │   └─────────────────┘       │
//! │  │  Adjustment ... │   └─────────────────┘                             │
//! │  └─────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Composite-Key Identity
//! A stock record is identified by `(product_id, location_id)`, never by a
//! surrogate id: the same product exists independently at every branch,
//! warehouse and dispensary shelf.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::movement;

// =============================================================================
// Stock Key
// =============================================================================

/// Composite key identifying one stock record: one product at one location.
///
/// ## Usage
/// Used as the key of the in-memory running-balance map while a transfer is
/// being staged, and as the lookup key at the stock record store boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub product_id: String,
    pub location_id: String,
}

impl StockKey {
    /// Creates a stock key from its two halves.
    pub fn new(product_id: impl Into<String>, location_id: impl Into<String>) -> Self {
        StockKey {
            product_id: product_id.into(),
            location_id: location_id.into(),
        }
    }
}

impl std::fmt::Display for StockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.product_id, self.location_id)
    }
}

// =============================================================================
// Stock Record
// =============================================================================

/// Current on-hand quantity for one product at one location.
///
/// ## Lifecycle
/// Created lazily on the first mutation referencing its key (absence reads
/// as quantity 0), updated by every mutation, never deleted.
///
/// ## Invariant
/// `quantity` is never persisted negative - consumption clamps at 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockRecord {
    /// Product half of the composite key.
    pub product_id: String,

    /// Location half of the composite key.
    pub location_id: String,

    /// Current on-hand quantity in whole units.
    pub quantity: i64,

    /// When the record was last written.
    pub last_updated: DateTime<Utc>,

    /// Actor id of the last writer (user or `SYSTEM_USER_ID`).
    pub updated_by: String,
}

// =============================================================================
// Movement Action
// =============================================================================

/// The kind of quantity change recorded by a movement log entry.
///
/// ## Signed Effect
/// Each action implies a direction for its quantity:
/// - Inbound (+): `GoodsReceived`, `TransferIn`, `SalesReturn`,
///   `InitialStock`, `Reversal`
/// - Outbound (-): `TransferOut`, `Sale`, `PurchaseReturn`
/// - Either: `Adjustment` (add/subtract/set corrections)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
pub enum MovementAction {
    /// Inbound stock from a supplier delivery.
    GoodsReceived,
    /// Inbound side of a location transfer.
    TransferIn,
    /// Outbound side of a location transfer.
    TransferOut,
    /// Consumption by a completed sale.
    Sale,
    /// Goods leaving the location back to the supplier.
    PurchaseReturn,
    /// Goods coming back in from a customer.
    SalesReturn,
    /// Manual stock-take correction (add/subtract/set).
    Adjustment,
    /// Opening balance entered when a product is first stocked.
    InitialStock,
    /// Restoration of quantity when a completed sale is voided.
    Reversal,
}

impl MovementAction {
    /// Returns true for actions whose quantity is applied as an increase.
    pub fn is_inbound(&self) -> bool {
        matches!(
            self,
            MovementAction::GoodsReceived
                | MovementAction::TransferIn
                | MovementAction::SalesReturn
                | MovementAction::InitialStock
                | MovementAction::Reversal
        )
    }

    /// Returns true for actions whose quantity is applied as a decrease.
    pub fn is_outbound(&self) -> bool {
        matches!(
            self,
            MovementAction::TransferOut | MovementAction::Sale | MovementAction::PurchaseReturn
        )
    }
}

// =============================================================================
// Return Kind / Adjustment Mode / Oversell Policy
// =============================================================================

/// Which direction a return moves goods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnKind {
    /// Goods leave the location back to the supplier (stock decreases).
    Purchase,
    /// Goods come back in from a customer (stock increases).
    Sales,
}

impl ReturnKind {
    /// The movement action a return of this kind is logged under.
    pub fn action(&self) -> MovementAction {
        match self {
            ReturnKind::Purchase => MovementAction::PurchaseReturn,
            ReturnKind::Sales => MovementAction::SalesReturn,
        }
    }
}

/// How a manual adjustment applies its quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentMode {
    /// `new = old + quantity`
    Add,
    /// `new = max(0, old - quantity)`
    Subtract,
    /// `new = quantity` outright (stock-take correction).
    Set,
}

/// Policy for sales (and subtract-style consumption) that exceed on-hand
/// quantity.
///
/// ## Background
/// The observed back-office behavior clamps oversold stock at 0 rather than
/// rejecting the sale. Whether that is an intentional "sell now, reconcile
/// later" decision is an open product question, so the choice is an explicit
/// engine configuration instead of a hardcoded branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OversellPolicy {
    /// `new = max(0, old - requested)` - the sale always succeeds.
    #[default]
    ClampToZero,
    /// Reject the mutation with an insufficient-stock error.
    Reject,
}

/// Direction of a quantity change, as reported to the daily snapshot
/// collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockDirection {
    In,
    Out,
}

// =============================================================================
// Movement Context
// =============================================================================

/// Typed, per-action context for building a movement log entry.
///
/// ## Why Not a Bag of Optionals?
/// The log row has optional columns (source/destination location, notes)
/// that only apply to some actions. Constructing rows through this closed
/// set of variants means a transfer entry cannot be missing its endpoints
/// and a sale entry cannot accidentally carry them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MovementContext {
    /// Supplier delivery; `reference_no` is the goods-receipt document id.
    GoodsReceipt {
        reference_no: String,
        notes: Option<String>,
    },
    /// Outbound side of a transfer, logged at the source location.
    TransferOut {
        transfer_id: String,
        source_location_id: String,
        destination_location_id: String,
    },
    /// Inbound side of a transfer, logged at the destination location.
    TransferIn {
        transfer_id: String,
        source_location_id: String,
        destination_location_id: String,
    },
    /// Consumption by a completed sale.
    Sale { sale_id: String },
    /// Purchase or sales return.
    Return {
        #[serde(rename = "return_kind")]
        kind: ReturnKind,
        reference_no: String,
        notes: Option<String>,
    },
    /// Manual stock-take correction.
    Adjustment {
        mode: AdjustmentMode,
        notes: Option<String>,
    },
    /// Opening balance for a newly stocked product.
    InitialStock { reference_no: String },
    /// Restoration of a voided sale's line items.
    Reversal { sale_id: String },
}

impl MovementContext {
    /// The action this context is logged under.
    pub fn action(&self) -> MovementAction {
        match self {
            MovementContext::GoodsReceipt { .. } => MovementAction::GoodsReceived,
            MovementContext::TransferOut { .. } => MovementAction::TransferOut,
            MovementContext::TransferIn { .. } => MovementAction::TransferIn,
            MovementContext::Sale { .. } => MovementAction::Sale,
            MovementContext::Return { kind, .. } => kind.action(),
            MovementContext::Adjustment { .. } => MovementAction::Adjustment,
            MovementContext::InitialStock { .. } => MovementAction::InitialStock,
            MovementContext::Reversal { .. } => MovementAction::Reversal,
        }
    }

    /// The business document this movement links back to.
    ///
    /// Adjustments have no originating document and return an empty string,
    /// which the log stores as-is (an adjustment is its own paper trail via
    /// `notes` and `user_id`).
    pub fn reference_no(&self) -> &str {
        match self {
            MovementContext::GoodsReceipt { reference_no, .. } => reference_no,
            MovementContext::TransferOut { transfer_id, .. } => transfer_id,
            MovementContext::TransferIn { transfer_id, .. } => transfer_id,
            MovementContext::Sale { sale_id } => sale_id,
            MovementContext::Return { reference_no, .. } => reference_no,
            MovementContext::Adjustment { .. } => "",
            MovementContext::InitialStock { reference_no } => reference_no,
            MovementContext::Reversal { sale_id } => sale_id,
        }
    }

    /// Free-text notes, where the action carries them.
    pub fn notes(&self) -> Option<&str> {
        match self {
            MovementContext::GoodsReceipt { notes, .. }
            | MovementContext::Return { notes, .. }
            | MovementContext::Adjustment { notes, .. } => notes.as_deref(),
            _ => None,
        }
    }

    /// Transfer endpoints `(source, destination)`; `None` for non-transfer
    /// actions.
    pub fn transfer_endpoints(&self) -> Option<(&str, &str)> {
        match self {
            MovementContext::TransferOut {
                source_location_id,
                destination_location_id,
                ..
            }
            | MovementContext::TransferIn {
                source_location_id,
                destination_location_id,
                ..
            } => Some((source_location_id, destination_location_id)),
            _ => None,
        }
    }
}

// =============================================================================
// Stock Movement (audit log entry)
// =============================================================================

/// One immutable audit log entry: a single quantity change with its
/// before/after values.
///
/// ## Invariant
/// `new_stock - old_stock` equals the signed effect of `action` and
/// `quantity`. Because consumption clamps at 0, `quantity` records the
/// magnitude of the *applied* change, which may be smaller than what the
/// caller requested (selling 8 of 5 on hand logs quantity 5).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockMovement {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Product half of the composite key.
    pub product_id: String,

    /// Human-readable product name at the time of the movement.
    /// Falls back to the raw id when metadata lookup has no match.
    pub product_name: String,

    /// Location half of the composite key.
    pub location_id: String,

    /// Human-readable location name, id-as-name fallback like the product.
    pub location_name: String,

    /// The kind of change.
    pub action: MovementAction,

    /// Unsigned magnitude of the applied change.
    pub quantity: i64,

    /// On-hand quantity before the change.
    pub old_stock: i64,

    /// On-hand quantity after the change.
    pub new_stock: i64,

    /// When the change was applied.
    pub timestamp: DateTime<Utc>,

    /// Actor who triggered the mutation.
    pub user_id: String,

    /// Originating business document (transfer id, sale id, return id, ...).
    pub reference_no: String,

    /// Source location, set on transfer entries only.
    pub source_location_id: Option<String>,

    /// Destination location, set on transfer entries only.
    pub destination_location_id: Option<String>,

    /// Optional free-text notes.
    pub notes: Option<String>,
}

impl StockMovement {
    /// Checks the per-entry ledger invariant.
    ///
    /// Inbound actions must satisfy `new == old + quantity`, outbound
    /// actions `new == old - quantity`. Adjustments may move either way, so
    /// only the magnitude is checked for them.
    pub fn is_consistent(&self) -> bool {
        if self.quantity < 0 || self.new_stock < 0 {
            return false;
        }
        if self.action.is_inbound() {
            self.new_stock - self.old_stock == self.quantity
        } else if self.action.is_outbound() {
            self.old_stock - self.new_stock == self.quantity
        } else {
            (self.new_stock - self.old_stock).abs() == self.quantity
        }
    }

    /// The signed delta this entry applied to its stock record.
    pub fn signed_delta(&self) -> i64 {
        self.new_stock - self.old_stock
    }

    /// Direction of the applied change, for snapshot bucketing.
    pub fn direction(&self) -> StockDirection {
        movement::direction_of(self.old_stock, self.new_stock)
    }
}

// =============================================================================
// Stock Transfer
// =============================================================================

/// One product line inside a transfer group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductLine {
    /// Product being moved.
    pub product_id: String,

    /// Quantity to move; must be positive to be applied.
    pub quantity: i64,

    /// Unit price in cents, carried for valuation reporting.
    pub unit_price_cents: i64,
}

/// All lines moving between one source/destination location pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferGroup {
    pub source_location_id: String,
    pub destination_location_id: String,
    pub lines: Vec<ProductLine>,
}

/// A user-initiated transfer batch: one or more location-pair groups,
/// committed all-or-nothing.
///
/// ## Relationship to the Log
/// One transfer produces exactly two movement entries per applied line
/// (`transfer_out` at the source, `transfer_in` at the destination) and one
/// pair of stock record writes per line, all under `id` as the reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTransfer {
    /// Unique identifier (UUID v4); also the movement `reference_no`.
    pub id: String,

    /// Actor submitting the transfer.
    pub user_id: String,

    /// Location-pair groups, applied strictly in the order supplied.
    pub groups: Vec<TransferGroup>,

    /// Optional free-text notes shown on the transfer document.
    pub notes: Option<String>,
}

// =============================================================================
// Returns / Adjustments / Reversals (batch line items)
// =============================================================================

/// One line of a purchase/sales return batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnLine {
    pub kind: ReturnKind,
    pub product_id: String,
    pub location_id: String,
    pub quantity: i64,
    /// The originating return document id.
    pub reference_no: String,
    pub notes: Option<String>,
}

/// One line of a manual adjustment batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentLine {
    pub product_id: String,
    pub location_id: String,
    pub quantity: i64,
    pub mode: AdjustmentMode,
    pub notes: Option<String>,
}

/// One line item of a sale being reversed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub product_id: String,
    pub quantity: i64,
}

/// A request to restore stock for a voided or edited sale.
///
/// The sale document itself lives outside the ledger; only the fields the
/// reversal needs are carried here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleReversal {
    /// Id of the original, previously committed sale.
    pub sale_id: String,

    /// Location the sale consumed stock from.
    pub location_id: String,

    /// Actor voiding the sale.
    pub user_id: String,

    /// The sale's line items, restored one movement each.
    pub lines: Vec<SaleLine>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn movement(action: MovementAction, quantity: i64, old: i64, new: i64) -> StockMovement {
        StockMovement {
            id: "m-1".to_string(),
            product_id: "p-1".to_string(),
            product_name: "Paracetamol 500mg".to_string(),
            location_id: "loc-1".to_string(),
            location_name: "Main Branch".to_string(),
            action,
            quantity,
            old_stock: old,
            new_stock: new,
            timestamp: Utc::now(),
            user_id: "u-1".to_string(),
            reference_no: "ref-1".to_string(),
            source_location_id: None,
            destination_location_id: None,
            notes: None,
        }
    }

    #[test]
    fn test_inbound_outbound_partition() {
        assert!(MovementAction::GoodsReceived.is_inbound());
        assert!(MovementAction::SalesReturn.is_inbound());
        assert!(MovementAction::Reversal.is_inbound());
        assert!(MovementAction::Sale.is_outbound());
        assert!(MovementAction::PurchaseReturn.is_outbound());
        assert!(MovementAction::TransferOut.is_outbound());

        // Adjustment is deliberately neither: it can move either way
        assert!(!MovementAction::Adjustment.is_inbound());
        assert!(!MovementAction::Adjustment.is_outbound());
    }

    #[test]
    fn test_movement_consistency() {
        assert!(movement(MovementAction::GoodsReceived, 4, 10, 14).is_consistent());
        assert!(movement(MovementAction::Sale, 5, 5, 0).is_consistent());
        assert!(movement(MovementAction::Adjustment, 3, 10, 7).is_consistent());
        assert!(movement(MovementAction::Adjustment, 3, 10, 13).is_consistent());

        // A sale that claims to remove more than the recorded delta lies
        assert!(!movement(MovementAction::Sale, 8, 5, 0).is_consistent());
        // Negative stock is never consistent
        assert!(!movement(MovementAction::Sale, 8, 5, -3).is_consistent());
    }

    #[test]
    fn test_context_maps_to_action() {
        let ctx = MovementContext::Return {
            kind: ReturnKind::Sales,
            reference_no: "ret-9".to_string(),
            notes: None,
        };
        assert_eq!(ctx.action(), MovementAction::SalesReturn);
        assert_eq!(ctx.reference_no(), "ret-9");

        let ctx = MovementContext::TransferOut {
            transfer_id: "tr-1".to_string(),
            source_location_id: "loc-x".to_string(),
            destination_location_id: "loc-y".to_string(),
        };
        assert_eq!(ctx.action(), MovementAction::TransferOut);
        assert_eq!(ctx.reference_no(), "tr-1");
        assert_eq!(ctx.transfer_endpoints(), Some(("loc-x", "loc-y")));
    }

    #[test]
    fn test_stock_key_display() {
        let key = StockKey::new("p-77", "loc-2");
        assert_eq!(key.to_string(), "p-77@loc-2");
    }
}
