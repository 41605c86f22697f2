//! # Mutation Engine
//!
//! The single write path into the stock ledger. Every stock quantity change
//! in the system - receipts, transfers, sales, returns, adjustments,
//! reversals - flows through one of the operations here.
//!
//! ## Mutation Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        One Mutation, Start to Finish                    │
//! │                                                                         │
//! │  validate inputs                                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  resolve display names (MetadataLookup, id fallback)                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌──────────────── SINGLE TRANSACTION ────────────────┐                │
//! │  │  read current quantity (absent = 0)                │                │
//! │  │  compute new quantity (pure, apotheca-core)        │                │
//! │  │  upsert stock record                               │                │
//! │  │  append movement log row(s)                        │                │
//! │  └────────────────────── COMMIT ──────────────────────┘                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  push daily-snapshot update(s)  (SnapshotSink, failure logged)         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  emit StockUpdated              (ChangeNotifier, fire-and-forget)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Atomicity
//! - Single-key operations: one transaction covering the record upsert and
//!   its audit row.
//! - Transfers: ONE transaction for the whole batch. Availability is checked
//!   through an in-memory running-balance map before any write is staged, so
//!   an insufficient source aborts with zero writes.
//!
//! ## Ordering
//! The engine imposes no cross-call ordering; concurrent mutations on
//! disjoint keys proceed in parallel on separate pool connections.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use apotheca_core::{
    movement, validation, AdjustmentLine, AdjustmentMode, CoreError, MovementAction,
    MovementContext, OversellPolicy, ReturnKind, ReturnLine, SaleReversal, StockKey, StockMovement,
    StockTransfer, SYSTEM_USER_ID,
};

use crate::collaborators::{
    MetadataLookup, NullMetadata, NullSnapshotSink, SnapshotSink, SnapshotUpdate,
};
use crate::error::{LedgerError, LedgerResult};
use crate::notifier::{ChangeNotifier, StockUpdated};
use crate::pool::Ledger;
use crate::repository::movement::MovementLogRepository;
use crate::repository::stock::StockRecordRepository;
use crate::repository::totals::ReceiptTotalsRepository;

// =============================================================================
// Engine
// =============================================================================

/// The stock ledger mutation engine.
///
/// Cloning is cheap; all clones share the pool, collaborators and notifier.
#[derive(Clone)]
pub struct MutationEngine {
    pool: SqlitePool,
    metadata: Arc<dyn MetadataLookup>,
    snapshots: Arc<dyn SnapshotSink>,
    notifier: ChangeNotifier,
    oversell_policy: OversellPolicy,
}

impl MutationEngine {
    /// Creates an engine over a ledger with no-op collaborators and the
    /// default (clamping) oversell policy.
    pub fn new(ledger: &Ledger) -> Self {
        MutationEngine {
            pool: ledger.pool().clone(),
            metadata: Arc::new(NullMetadata),
            snapshots: Arc::new(NullSnapshotSink),
            notifier: ChangeNotifier::new(),
            oversell_policy: OversellPolicy::default(),
        }
    }

    /// Attaches a product/location metadata lookup.
    pub fn with_metadata(mut self, metadata: Arc<dyn MetadataLookup>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Attaches a daily-snapshot sink.
    pub fn with_snapshot_sink(mut self, snapshots: Arc<dyn SnapshotSink>) -> Self {
        self.snapshots = snapshots;
        self
    }

    /// Sets the oversell policy for sales and subtract-style consumption.
    pub fn with_oversell_policy(mut self, policy: OversellPolicy) -> Self {
        self.oversell_policy = policy;
        self
    }

    /// The engine's change notifier.
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Convenience for `notifier().subscribe()`.
    pub fn subscribe(&self) -> broadcast::Receiver<StockUpdated> {
        self.notifier.subscribe()
    }

    // =========================================================================
    // Goods receipt
    // =========================================================================

    /// Records a supplier delivery: `new = old + quantity`.
    ///
    /// Also bumps the product's goods-received running total inside the same
    /// transaction.
    ///
    /// ## Non-idempotence
    /// Replaying the same `reference_no` credits the stock again. De-dup of
    /// receipt documents is the caller's responsibility.
    pub async fn record_goods_received(
        &self,
        product_id: &str,
        location_id: &str,
        quantity: i64,
        user_id: &str,
        reference_no: &str,
        notes: Option<String>,
    ) -> LedgerResult<StockMovement> {
        validation::validate_id("product_id", product_id)?;
        validation::validate_id("location_id", location_id)?;
        validation::validate_id("user_id", user_id)?;
        validation::validate_quantity(quantity)?;

        let movement = self
            .mutate_record(
                product_id,
                location_id,
                user_id,
                MovementContext::GoodsReceipt {
                    reference_no: reference_no.to_string(),
                    notes,
                },
                |old| Ok(movement::receive(old, quantity)),
            )
            .await?;

        info!(
            product_id = %product_id,
            location_id = %location_id,
            quantity = %quantity,
            reference_no = %reference_no,
            "Goods receipt recorded"
        );

        self.notifier.notify();
        Ok(movement)
    }

    /// Records an opening balance for a newly stocked product.
    pub async fn record_initial_stock(
        &self,
        product_id: &str,
        location_id: &str,
        quantity: i64,
        user_id: &str,
        reference_no: &str,
    ) -> LedgerResult<StockMovement> {
        validation::validate_id("product_id", product_id)?;
        validation::validate_id("location_id", location_id)?;
        validation::validate_id("user_id", user_id)?;
        validation::validate_quantity(quantity)?;

        let movement = self
            .mutate_record(
                product_id,
                location_id,
                user_id,
                MovementContext::InitialStock {
                    reference_no: reference_no.to_string(),
                },
                |old| Ok(movement::receive(old, quantity)),
            )
            .await?;

        self.notifier.notify();
        Ok(movement)
    }

    // =========================================================================
    // Transfers
    // =========================================================================

    /// Applies a location transfer as one atomic unit.
    ///
    /// ## Line Handling
    /// - Invalid lines (empty product id, non-positive quantity) are skipped
    ///   with a warning; the rest of the transfer proceeds.
    /// - Insufficient source stock aborts the ENTIRE transfer with zero
    ///   writes, including lines that were individually satisfiable.
    ///
    /// ## Running Balance
    /// Availability is evaluated against an in-memory running-balance map
    /// seeded from store reads, keyed by `(product, location)` and covering
    /// both sources and destinations. A second line draining the same source
    /// sees the first line's effect; two lines feeding the same destination
    /// accumulate instead of clobbering.
    ///
    /// Returns the movement rows in application order: out, in, per line.
    pub async fn process_transfer(
        &self,
        transfer: &StockTransfer,
    ) -> LedgerResult<Vec<StockMovement>> {
        validation::validate_id("transfer_id", &transfer.id)?;
        validation::validate_id("user_id", &transfer.user_id)?;

        struct StagedLine {
            product_id: String,
            source_location_id: String,
            destination_location_id: String,
            source_old: i64,
            source_new: i64,
            dest_old: i64,
            dest_new: i64,
        }

        let mut tx = self.pool.begin().await?;
        let mut running: HashMap<StockKey, i64> = HashMap::new();
        let mut staged: Vec<StagedLine> = Vec::new();

        for group in &transfer.groups {
            if validation::validate_id("source_location_id", &group.source_location_id).is_err()
                || validation::validate_id(
                    "destination_location_id",
                    &group.destination_location_id,
                )
                .is_err()
            {
                warn!(
                    transfer_id = %transfer.id,
                    "Skipping transfer group with missing location id"
                );
                continue;
            }

            for line in &group.lines {
                if let Err(e) = validation::validate_transfer_line(line) {
                    warn!(
                        transfer_id = %transfer.id,
                        product_id = %line.product_id,
                        quantity = %line.quantity,
                        error = %e,
                        "Skipping invalid transfer line"
                    );
                    continue;
                }

                let source_key = StockKey::new(&line.product_id, &group.source_location_id);
                let source_old = match running.get(&source_key) {
                    Some(&qty) => qty,
                    None => {
                        StockRecordRepository::quantity_in(
                            &mut tx,
                            &line.product_id,
                            &group.source_location_id,
                        )
                        .await?
                    }
                };

                if source_old < line.quantity {
                    // Whole-transfer abort: the transaction is dropped
                    // without a single write having been staged into it
                    return Err(LedgerError::Domain(CoreError::InsufficientStock {
                        product_id: line.product_id.clone(),
                        available: source_old,
                        requested: line.quantity,
                    }));
                }

                let dest_key = StockKey::new(&line.product_id, &group.destination_location_id);
                let dest_old = match running.get(&dest_key) {
                    Some(&qty) => qty,
                    None => {
                        StockRecordRepository::quantity_in(
                            &mut tx,
                            &line.product_id,
                            &group.destination_location_id,
                        )
                        .await?
                    }
                };

                let source_new = source_old - line.quantity;
                let dest_new = movement::receive(dest_old, line.quantity);
                running.insert(source_key, source_new);
                running.insert(dest_key, dest_new);

                staged.push(StagedLine {
                    product_id: line.product_id.clone(),
                    source_location_id: group.source_location_id.clone(),
                    destination_location_id: group.destination_location_id.clone(),
                    source_old,
                    source_new,
                    dest_old,
                    dest_new,
                });
            }
        }

        if staged.is_empty() {
            warn!(
                transfer_id = %transfer.id,
                "Transfer had no applicable lines; nothing written"
            );
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let mut movements = Vec::with_capacity(staged.len() * 2);

        for line in &staged {
            let product_name = self.product_name(&line.product_id).await;
            let source_name = self.location_name(&line.source_location_id).await;
            let dest_name = self.location_name(&line.destination_location_id).await;

            StockRecordRepository::set_quantity_in(
                &mut tx,
                &line.product_id,
                &line.source_location_id,
                line.source_new,
                &transfer.user_id,
                now,
            )
            .await?;
            StockRecordRepository::set_quantity_in(
                &mut tx,
                &line.product_id,
                &line.destination_location_id,
                line.dest_new,
                &transfer.user_id,
                now,
            )
            .await?;

            let out = build_movement(
                &line.product_id,
                &product_name,
                &line.source_location_id,
                &source_name,
                &MovementContext::TransferOut {
                    transfer_id: transfer.id.clone(),
                    source_location_id: line.source_location_id.clone(),
                    destination_location_id: line.destination_location_id.clone(),
                },
                line.source_old,
                line.source_new,
                &transfer.user_id,
                now,
            );
            let r#in = build_movement(
                &line.product_id,
                &product_name,
                &line.destination_location_id,
                &dest_name,
                &MovementContext::TransferIn {
                    transfer_id: transfer.id.clone(),
                    source_location_id: line.source_location_id.clone(),
                    destination_location_id: line.destination_location_id.clone(),
                },
                line.dest_old,
                line.dest_new,
                &transfer.user_id,
                now,
            );

            MovementLogRepository::append_in(&mut tx, &out).await?;
            MovementLogRepository::append_in(&mut tx, &r#in).await?;
            movements.push(out);
            movements.push(r#in);
        }

        tx.commit().await?;

        for movement in &movements {
            self.push_snapshot(movement).await;
        }

        info!(
            transfer_id = %transfer.id,
            lines = staged.len(),
            "Transfer applied"
        );

        self.notifier.notify();
        Ok(movements)
    }

    // =========================================================================
    // Sales
    // =========================================================================

    /// Consumes stock for a completed sale.
    ///
    /// Under `OversellPolicy::ClampToZero` (the default) the sale always
    /// succeeds and stock bottoms out at 0; under `Reject` an oversell fails
    /// with an insufficient-stock error and writes nothing.
    ///
    /// Sales flow in from the point of sale with no back-office actor, so
    /// the movement is stamped with the system user.
    pub async fn reduce_stock_for_sale(
        &self,
        product_id: &str,
        location_id: &str,
        quantity_sold: i64,
        sale_id: &str,
    ) -> LedgerResult<StockMovement> {
        validation::validate_id("product_id", product_id)?;
        validation::validate_id("location_id", location_id)?;
        validation::validate_id("sale_id", sale_id)?;
        validation::validate_quantity(quantity_sold)?;

        let policy = self.oversell_policy;
        let movement = self
            .mutate_record(
                product_id,
                location_id,
                SYSTEM_USER_ID,
                MovementContext::Sale {
                    sale_id: sale_id.to_string(),
                },
                |old| match policy {
                    OversellPolicy::ClampToZero => Ok(movement::consume(old, quantity_sold)),
                    OversellPolicy::Reject => {
                        if old < quantity_sold {
                            Err(CoreError::InsufficientStock {
                                product_id: product_id.to_string(),
                                available: old,
                                requested: quantity_sold,
                            })
                        } else {
                            Ok(old - quantity_sold)
                        }
                    }
                },
            )
            .await?;

        self.notifier.notify();
        Ok(movement)
    }

    /// Restores stock for every line of a voided or edited sale.
    ///
    /// Each line becomes one `reversal` movement referencing the original
    /// sale id; invalid lines are skipped with a warning.
    pub async fn reverse_sale(&self, reversal: &SaleReversal) -> LedgerResult<Vec<StockMovement>> {
        validation::validate_id("sale_id", &reversal.sale_id)?;
        validation::validate_id("location_id", &reversal.location_id)?;
        validation::validate_id("user_id", &reversal.user_id)?;

        let mut movements = Vec::with_capacity(reversal.lines.len());
        for line in &reversal.lines {
            if validation::validate_id("product_id", &line.product_id).is_err()
                || validation::validate_quantity(line.quantity).is_err()
            {
                warn!(
                    sale_id = %reversal.sale_id,
                    product_id = %line.product_id,
                    quantity = %line.quantity,
                    "Skipping invalid sale reversal line"
                );
                continue;
            }

            let quantity = line.quantity;
            let movement = self
                .mutate_record(
                    &line.product_id,
                    &reversal.location_id,
                    &reversal.user_id,
                    MovementContext::Reversal {
                        sale_id: reversal.sale_id.clone(),
                    },
                    |old| Ok(movement::receive(old, quantity)),
                )
                .await?;
            movements.push(movement);
        }

        info!(
            sale_id = %reversal.sale_id,
            lines = movements.len(),
            "Sale reversed"
        );

        self.notifier.notify();
        Ok(movements)
    }

    // =========================================================================
    // Returns
    // =========================================================================

    /// Records one purchase or sales return line.
    ///
    /// Purchase returns consume (goods go back to the supplier, clamped at
    /// 0); sales returns receive (goods come back from a customer).
    pub async fn process_return(
        &self,
        kind: ReturnKind,
        product_id: &str,
        location_id: &str,
        quantity: i64,
        user_id: &str,
        reference_no: &str,
        notes: Option<String>,
    ) -> LedgerResult<StockMovement> {
        validation::validate_id("product_id", product_id)?;
        validation::validate_id("location_id", location_id)?;
        validation::validate_id("user_id", user_id)?;
        validation::validate_quantity(quantity)?;

        let movement = self
            .mutate_record(
                product_id,
                location_id,
                user_id,
                MovementContext::Return {
                    kind,
                    reference_no: reference_no.to_string(),
                    notes,
                },
                |old| match kind {
                    ReturnKind::Purchase => Ok(movement::consume(old, quantity)),
                    ReturnKind::Sales => Ok(movement::receive(old, quantity)),
                },
            )
            .await?;

        self.notifier.notify();
        Ok(movement)
    }

    /// Applies a batch of return lines.
    ///
    /// Lines rejected by validation are skipped with a warning; store
    /// failures abort the remainder of the batch.
    pub async fn process_returns(
        &self,
        lines: &[ReturnLine],
        user_id: &str,
    ) -> LedgerResult<Vec<StockMovement>> {
        let mut movements = Vec::with_capacity(lines.len());
        for line in lines {
            let result = self
                .process_return(
                    line.kind,
                    &line.product_id,
                    &line.location_id,
                    line.quantity,
                    user_id,
                    &line.reference_no,
                    line.notes.clone(),
                )
                .await;

            match result {
                Ok(movement) => movements.push(movement),
                Err(LedgerError::Domain(CoreError::Validation(e))) => {
                    warn!(
                        product_id = %line.product_id,
                        reference_no = %line.reference_no,
                        error = %e,
                        "Skipping invalid return line"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(movements)
    }

    // =========================================================================
    // Adjustments
    // =========================================================================

    /// Applies a manual stock adjustment.
    ///
    /// - `Add`: `new = old + quantity`
    /// - `Subtract`: `new = max(0, old - quantity)` under the clamping
    ///   policy; insufficient-stock error under `Reject`
    /// - `Set`: `new = quantity` outright (stock-take; zero is valid)
    pub async fn adjust_stock(
        &self,
        product_id: &str,
        location_id: &str,
        quantity: i64,
        mode: AdjustmentMode,
        user_id: &str,
        notes: Option<String>,
    ) -> LedgerResult<StockMovement> {
        validation::validate_id("product_id", product_id)?;
        validation::validate_id("location_id", location_id)?;
        validation::validate_id("user_id", user_id)?;
        match mode {
            AdjustmentMode::Set => validation::validate_set_quantity(quantity)?,
            AdjustmentMode::Add | AdjustmentMode::Subtract => {
                validation::validate_quantity(quantity)?
            }
        }

        let policy = self.oversell_policy;
        let movement = self
            .mutate_record(
                product_id,
                location_id,
                user_id,
                MovementContext::Adjustment { mode, notes },
                |old| {
                    if mode == AdjustmentMode::Subtract
                        && policy == OversellPolicy::Reject
                        && old < quantity
                    {
                        return Err(CoreError::InsufficientStock {
                            product_id: product_id.to_string(),
                            available: old,
                            requested: quantity,
                        });
                    }
                    Ok(movement::adjust(old, mode, quantity))
                },
            )
            .await?;

        self.notifier.notify();
        Ok(movement)
    }

    /// Applies a batch of adjustment lines, skipping invalid ones with a
    /// warning.
    pub async fn adjust_stock_batch(
        &self,
        lines: &[AdjustmentLine],
        user_id: &str,
    ) -> LedgerResult<Vec<StockMovement>> {
        let mut movements = Vec::with_capacity(lines.len());
        for line in lines {
            let result = self
                .adjust_stock(
                    &line.product_id,
                    &line.location_id,
                    line.quantity,
                    line.mode,
                    user_id,
                    line.notes.clone(),
                )
                .await;

            match result {
                Ok(movement) => movements.push(movement),
                Err(LedgerError::Domain(CoreError::Validation(e))) => {
                    warn!(
                        product_id = %line.product_id,
                        mode = ?line.mode,
                        error = %e,
                        "Skipping invalid adjustment line"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(movements)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Applies one single-key mutation: read, compute, upsert, log, commit,
    /// snapshot. Callers validate inputs and emit the change notification.
    async fn mutate_record(
        &self,
        product_id: &str,
        location_id: &str,
        user_id: &str,
        context: MovementContext,
        compute: impl FnOnce(i64) -> Result<i64, CoreError>,
    ) -> LedgerResult<StockMovement> {
        let product_name = self.product_name(product_id).await;
        let location_name = self.location_name(location_id).await;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let old = StockRecordRepository::quantity_in(&mut tx, product_id, location_id).await?;
        let new = compute(old)?;

        StockRecordRepository::set_quantity_in(&mut tx, product_id, location_id, new, user_id, now)
            .await?;

        if context.action() == MovementAction::GoodsReceived {
            ReceiptTotalsRepository::bump_in(&mut tx, product_id, new - old).await?;
        }

        let movement = build_movement(
            product_id,
            &product_name,
            location_id,
            &location_name,
            &context,
            old,
            new,
            user_id,
            now,
        );
        MovementLogRepository::append_in(&mut tx, &movement).await?;

        tx.commit().await?;

        self.push_snapshot(&movement).await;
        Ok(movement)
    }

    async fn product_name(&self, product_id: &str) -> String {
        self.metadata
            .product_name(product_id)
            .await
            .unwrap_or_else(|| product_id.to_string())
    }

    async fn location_name(&self, location_id: &str) -> String {
        self.metadata
            .location_name(location_id)
            .await
            .unwrap_or_else(|| location_id.to_string())
    }

    /// Pushes one committed movement into the snapshot sink. The mutation is
    /// already durable; a sink failure is logged and swallowed.
    async fn push_snapshot(&self, movement: &StockMovement) {
        let update = SnapshotUpdate {
            product_id: movement.product_id.clone(),
            location_id: movement.location_id.clone(),
            date: movement.timestamp.date_naive(),
            resulting_quantity: movement.new_stock,
            direction: movement.direction(),
            moved_quantity: movement.quantity,
            reference_tag: movement.reference_no.clone(),
        };

        if let Err(reason) = self.snapshots.update_daily_snapshot(update).await {
            warn!(
                product_id = %movement.product_id,
                location_id = %movement.location_id,
                reason = %reason,
                "Snapshot sink rejected update"
            );
        }
    }
}

/// Builds a movement log row from a context and the observed old/new pair.
///
/// `quantity` is the magnitude of the APPLIED change, so the per-row
/// invariant holds even when clamping shrank the requested amount.
#[allow(clippy::too_many_arguments)]
fn build_movement(
    product_id: &str,
    product_name: &str,
    location_id: &str,
    location_name: &str,
    context: &MovementContext,
    old: i64,
    new: i64,
    user_id: &str,
    now: DateTime<Utc>,
) -> StockMovement {
    let (source, destination) = match context.transfer_endpoints() {
        Some((source, destination)) => (Some(source.to_string()), Some(destination.to_string())),
        None => (None, None),
    };

    StockMovement {
        id: Uuid::new_v4().to_string(),
        product_id: product_id.to_string(),
        product_name: product_name.to_string(),
        location_id: location_id.to_string(),
        location_name: location_name.to_string(),
        action: context.action(),
        quantity: movement::applied_magnitude(old, new),
        old_stock: old,
        new_stock: new,
        timestamp: now,
        user_id: user_id.to_string(),
        reference_no: context.reference_no().to_string(),
        source_location_id: source,
        destination_location_id: destination,
        notes: context.notes().map(str::to_string),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{InMemoryMetadata, RecordingSnapshotSink};
    use crate::pool::LedgerConfig;
    use apotheca_core::{ProductLine, SaleLine, StockDirection, TransferGroup};

    struct Fixture {
        ledger: Ledger,
        engine: MutationEngine,
        sink: Arc<RecordingSnapshotSink>,
    }

    async fn fixture() -> Fixture {
        let ledger = Ledger::new(LedgerConfig::in_memory()).await.unwrap();

        let metadata = InMemoryMetadata::new();
        metadata.add_product("prod-para", "Paracetamol 500mg");
        metadata.add_product("prod-ibu", "Ibuprofen 200mg");
        metadata.add_location("loc-wh", "Central Warehouse");
        metadata.add_location("loc-br", "Main Branch");

        let sink = Arc::new(RecordingSnapshotSink::new());
        let engine = MutationEngine::new(&ledger)
            .with_metadata(Arc::new(metadata))
            .with_snapshot_sink(sink.clone());

        Fixture {
            ledger,
            engine,
            sink,
        }
    }

    fn transfer(groups: Vec<TransferGroup>) -> StockTransfer {
        StockTransfer {
            id: Uuid::new_v4().to_string(),
            user_id: "user-1".to_string(),
            groups,
            notes: None,
        }
    }

    fn line(product_id: &str, quantity: i64) -> ProductLine {
        ProductLine {
            product_id: product_id.to_string(),
            quantity,
            unit_price_cents: 1250,
        }
    }

    // -------------------------------------------------------------------------
    // Goods receipt
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_goods_receipt_creates_record_and_movement() {
        let f = fixture().await;

        let movement = f
            .engine
            .record_goods_received("prod-para", "loc-wh", 50, "user-1", "grn-1", None)
            .await
            .unwrap();

        assert_eq!(movement.action, MovementAction::GoodsReceived);
        assert_eq!(movement.quantity, 50);
        assert_eq!(movement.old_stock, 0);
        assert_eq!(movement.new_stock, 50);
        assert_eq!(movement.product_name, "Paracetamol 500mg");
        assert_eq!(movement.location_name, "Central Warehouse");
        assert!(movement.is_consistent());

        assert_eq!(
            f.ledger.stock().quantity("prod-para", "loc-wh").await.unwrap(),
            50
        );
        assert_eq!(
            f.ledger.receipt_totals().total_received("prod-para").await.unwrap(),
            50
        );
    }

    #[tokio::test]
    async fn test_goods_receipt_is_not_idempotent() {
        let f = fixture().await;

        // Replaying the same document double-credits; de-dup is upstream
        for _ in 0..2 {
            f.engine
                .record_goods_received("prod-para", "loc-wh", 30, "user-1", "grn-dup", None)
                .await
                .unwrap();
        }

        assert_eq!(
            f.ledger.stock().quantity("prod-para", "loc-wh").await.unwrap(),
            60
        );
        let rows = f.ledger.movements().find_by_reference("grn-dup").await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_goods_receipt_rejects_bad_quantity() {
        let f = fixture().await;

        let err = f
            .engine
            .record_goods_received("prod-para", "loc-wh", 0, "user-1", "grn-2", None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Domain(CoreError::Validation(_))));

        // Nothing written
        assert_eq!(f.ledger.movements().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_metadata_falls_back_to_id() {
        let f = fixture().await;

        let movement = f
            .engine
            .record_goods_received("prod-mystery", "loc-mystery", 5, "user-1", "grn-3", None)
            .await
            .unwrap();

        assert_eq!(movement.product_name, "prod-mystery");
        assert_eq!(movement.location_name, "loc-mystery");
    }

    // -------------------------------------------------------------------------
    // Sales
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_sale_consumes_stock() {
        let f = fixture().await;
        f.engine
            .record_goods_received("prod-para", "loc-br", 10, "user-1", "grn-1", None)
            .await
            .unwrap();

        let movement = f
            .engine
            .reduce_stock_for_sale("prod-para", "loc-br", 4, "sale-1")
            .await
            .unwrap();

        assert_eq!(movement.action, MovementAction::Sale);
        assert_eq!(movement.user_id, SYSTEM_USER_ID);
        assert_eq!(movement.quantity, 4);
        assert_eq!(movement.new_stock, 6);
        assert_eq!(
            f.ledger.stock().quantity("prod-para", "loc-br").await.unwrap(),
            6
        );
    }

    #[tokio::test]
    async fn test_oversell_clamps_and_logs_applied_quantity() {
        let f = fixture().await;
        f.engine
            .record_goods_received("prod-para", "loc-br", 5, "user-1", "grn-1", None)
            .await
            .unwrap();

        // Sell 8 with 5 on hand: stock bottoms out at 0
        let movement = f
            .engine
            .reduce_stock_for_sale("prod-para", "loc-br", 8, "sale-over")
            .await
            .unwrap();

        assert_eq!(movement.old_stock, 5);
        assert_eq!(movement.new_stock, 0);
        // The log records the 5 units that actually left the shelf, not 8
        assert_eq!(movement.quantity, 5);
        assert!(movement.is_consistent());
    }

    #[tokio::test]
    async fn test_oversell_reject_policy() {
        let f = fixture().await;
        let engine = f.engine.clone().with_oversell_policy(OversellPolicy::Reject);

        engine
            .record_goods_received("prod-para", "loc-br", 5, "user-1", "grn-1", None)
            .await
            .unwrap();

        let err = engine
            .reduce_stock_for_sale("prod-para", "loc-br", 8, "sale-over")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Domain(CoreError::InsufficientStock {
                available: 5,
                requested: 8,
                ..
            })
        ));

        // Stock untouched, no sale row written
        assert_eq!(
            f.ledger.stock().quantity("prod-para", "loc-br").await.unwrap(),
            5
        );
        assert!(f
            .ledger
            .movements()
            .find_by_reference("sale-over")
            .await
            .unwrap()
            .is_empty());
    }

    // -------------------------------------------------------------------------
    // Transfers
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_transfer_moves_stock_and_logs_both_sides() {
        let f = fixture().await;
        f.engine
            .record_goods_received("prod-para", "loc-wh", 40, "user-1", "grn-1", None)
            .await
            .unwrap();
        f.engine
            .record_goods_received("prod-ibu", "loc-wh", 20, "user-1", "grn-2", None)
            .await
            .unwrap();

        let t = transfer(vec![TransferGroup {
            source_location_id: "loc-wh".to_string(),
            destination_location_id: "loc-br".to_string(),
            lines: vec![line("prod-para", 15), line("prod-ibu", 5)],
        }]);
        let movements = f.engine.process_transfer(&t).await.unwrap();

        assert_eq!(movements.len(), 4);
        assert_eq!(movements[0].action, MovementAction::TransferOut);
        assert_eq!(movements[1].action, MovementAction::TransferIn);
        for movement in &movements {
            assert!(movement.is_consistent());
            assert_eq!(movement.reference_no, t.id);
            assert_eq!(movement.source_location_id.as_deref(), Some("loc-wh"));
            assert_eq!(movement.destination_location_id.as_deref(), Some("loc-br"));
        }

        let stock = f.ledger.stock();
        assert_eq!(stock.quantity("prod-para", "loc-wh").await.unwrap(), 25);
        assert_eq!(stock.quantity("prod-para", "loc-br").await.unwrap(), 15);
        assert_eq!(stock.quantity("prod-ibu", "loc-wh").await.unwrap(), 15);
        assert_eq!(stock.quantity("prod-ibu", "loc-br").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_transfer_running_balance_sees_earlier_lines() {
        let f = fixture().await;
        f.engine
            .record_goods_received("prod-para", "loc-wh", 10, "user-1", "grn-1", None)
            .await
            .unwrap();

        // 7 then 7 from a source holding 10: the second line must see 3 left
        let t = transfer(vec![TransferGroup {
            source_location_id: "loc-wh".to_string(),
            destination_location_id: "loc-br".to_string(),
            lines: vec![line("prod-para", 7), line("prod-para", 7)],
        }]);
        let err = f.engine.process_transfer(&t).await.unwrap_err();

        assert!(matches!(
            err,
            LedgerError::Domain(CoreError::InsufficientStock {
                available: 3,
                requested: 7,
                ..
            })
        ));

        // All-or-nothing: the satisfiable first line was rolled back too
        let stock = f.ledger.stock();
        assert_eq!(stock.quantity("prod-para", "loc-wh").await.unwrap(), 10);
        assert_eq!(stock.quantity("prod-para", "loc-br").await.unwrap(), 0);
        assert!(f.ledger.movements().find_by_reference(&t.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transfer_accumulates_on_shared_destination() {
        let f = fixture().await;
        f.engine
            .record_goods_received("prod-para", "loc-wh", 10, "user-1", "grn-1", None)
            .await
            .unwrap();
        f.engine
            .record_goods_received("prod-para", "loc-br", 10, "user-1", "grn-2", None)
            .await
            .unwrap();

        // Two groups feeding the same destination key must accumulate
        let t = transfer(vec![
            TransferGroup {
                source_location_id: "loc-wh".to_string(),
                destination_location_id: "loc-out".to_string(),
                lines: vec![line("prod-para", 4)],
            },
            TransferGroup {
                source_location_id: "loc-br".to_string(),
                destination_location_id: "loc-out".to_string(),
                lines: vec![line("prod-para", 6)],
            },
        ]);
        f.engine.process_transfer(&t).await.unwrap();

        assert_eq!(
            f.ledger.stock().quantity("prod-para", "loc-out").await.unwrap(),
            10
        );
    }

    #[tokio::test]
    async fn test_transfer_skips_invalid_lines() {
        let f = fixture().await;
        f.engine
            .record_goods_received("prod-para", "loc-wh", 10, "user-1", "grn-1", None)
            .await
            .unwrap();

        let t = transfer(vec![TransferGroup {
            source_location_id: "loc-wh".to_string(),
            destination_location_id: "loc-br".to_string(),
            lines: vec![line("", 3), line("prod-para", 0), line("prod-para", 3)],
        }]);
        let movements = f.engine.process_transfer(&t).await.unwrap();

        // Only the one valid line applied
        assert_eq!(movements.len(), 2);
        assert_eq!(
            f.ledger.stock().quantity("prod-para", "loc-br").await.unwrap(),
            3
        );
    }

    #[tokio::test]
    async fn test_transfer_with_no_valid_lines_writes_nothing() {
        let f = fixture().await;

        let t = transfer(vec![TransferGroup {
            source_location_id: "loc-wh".to_string(),
            destination_location_id: "loc-br".to_string(),
            lines: vec![line("", 3)],
        }]);
        let movements = f.engine.process_transfer(&t).await.unwrap();

        assert!(movements.is_empty());
        assert_eq!(f.ledger.movements().count().await.unwrap(), 0);
    }

    // -------------------------------------------------------------------------
    // Returns
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_purchase_and_sales_returns() {
        let f = fixture().await;
        f.engine
            .record_goods_received("prod-para", "loc-br", 10, "user-1", "grn-1", None)
            .await
            .unwrap();

        let out = f
            .engine
            .process_return(
                ReturnKind::Purchase,
                "prod-para",
                "loc-br",
                4,
                "user-1",
                "ret-p1",
                None,
            )
            .await
            .unwrap();
        assert_eq!(out.action, MovementAction::PurchaseReturn);
        assert_eq!(out.new_stock, 6);

        let back = f
            .engine
            .process_return(
                ReturnKind::Sales,
                "prod-para",
                "loc-br",
                2,
                "user-1",
                "ret-s1",
                Some("damaged box".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(back.action, MovementAction::SalesReturn);
        assert_eq!(back.new_stock, 8);
        assert_eq!(back.notes.as_deref(), Some("damaged box"));
    }

    #[tokio::test]
    async fn test_sales_return_creates_record_lazily() {
        let f = fixture().await;

        // A customer return can land on a shelf the ledger has never seen;
        // the record is created on the spot from the implicit zero
        let movement = f
            .engine
            .process_return(
                ReturnKind::Sales,
                "prod-para",
                "loc-new",
                2,
                "user-1",
                "ret-fresh",
                None,
            )
            .await
            .unwrap();

        assert_eq!(movement.action, MovementAction::SalesReturn);
        assert_eq!(movement.old_stock, 0);
        assert_eq!(movement.new_stock, 2);
        assert!(movement.is_consistent());

        let record = f
            .ledger
            .stock()
            .get("prod-para", "loc-new")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.quantity, 2);
        assert_eq!(record.updated_by, "user-1");
    }

    #[tokio::test]
    async fn test_return_batch_skips_invalid_lines() {
        let f = fixture().await;
        f.engine
            .record_goods_received("prod-para", "loc-br", 10, "user-1", "grn-1", None)
            .await
            .unwrap();

        let lines = vec![
            ReturnLine {
                kind: ReturnKind::Purchase,
                product_id: "prod-para".to_string(),
                location_id: "loc-br".to_string(),
                quantity: 3,
                reference_no: "ret-1".to_string(),
                notes: None,
            },
            ReturnLine {
                kind: ReturnKind::Sales,
                product_id: "".to_string(),
                location_id: "loc-br".to_string(),
                quantity: 3,
                reference_no: "ret-1".to_string(),
                notes: None,
            },
        ];
        let movements = f.engine.process_returns(&lines, "user-1").await.unwrap();

        assert_eq!(movements.len(), 1);
        assert_eq!(
            f.ledger.stock().quantity("prod-para", "loc-br").await.unwrap(),
            7
        );
    }

    // -------------------------------------------------------------------------
    // Adjustments
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_adjustment_modes() {
        let f = fixture().await;
        f.engine
            .record_goods_received("prod-para", "loc-br", 10, "user-1", "grn-1", None)
            .await
            .unwrap();

        let added = f
            .engine
            .adjust_stock("prod-para", "loc-br", 3, AdjustmentMode::Add, "user-1", None)
            .await
            .unwrap();
        assert_eq!(added.new_stock, 13);

        let subtracted = f
            .engine
            .adjust_stock(
                "prod-para",
                "loc-br",
                30,
                AdjustmentMode::Subtract,
                "user-1",
                None,
            )
            .await
            .unwrap();
        // Subtract clamps like a sale
        assert_eq!(subtracted.new_stock, 0);
        assert_eq!(subtracted.quantity, 13);
        assert!(subtracted.is_consistent());

        let set = f
            .engine
            .adjust_stock(
                "prod-para",
                "loc-br",
                25,
                AdjustmentMode::Set,
                "user-1",
                Some("stock-take".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(set.new_stock, 25);
        assert_eq!(set.quantity, 25);

        // Set to zero is a valid stock-take
        let zeroed = f
            .engine
            .adjust_stock("prod-para", "loc-br", 0, AdjustmentMode::Set, "user-1", None)
            .await
            .unwrap();
        assert_eq!(zeroed.new_stock, 0);
    }

    #[tokio::test]
    async fn test_adjustment_batch_skips_invalid_lines() {
        let f = fixture().await;

        let lines = vec![
            AdjustmentLine {
                product_id: "prod-para".to_string(),
                location_id: "loc-br".to_string(),
                quantity: 12,
                mode: AdjustmentMode::Set,
                notes: None,
            },
            AdjustmentLine {
                product_id: "prod-ibu".to_string(),
                location_id: "loc-br".to_string(),
                quantity: -1,
                mode: AdjustmentMode::Add,
                notes: None,
            },
        ];
        let movements = f.engine.adjust_stock_batch(&lines, "user-1").await.unwrap();

        assert_eq!(movements.len(), 1);
        assert_eq!(
            f.ledger.stock().quantity("prod-para", "loc-br").await.unwrap(),
            12
        );
        assert_eq!(
            f.ledger.stock().quantity("prod-ibu", "loc-br").await.unwrap(),
            0
        );
    }

    // -------------------------------------------------------------------------
    // Sale reversal
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_reverse_sale_restores_lines() {
        let f = fixture().await;
        f.engine
            .record_goods_received("prod-para", "loc-br", 10, "user-1", "grn-1", None)
            .await
            .unwrap();
        f.engine
            .reduce_stock_for_sale("prod-para", "loc-br", 6, "sale-9")
            .await
            .unwrap();

        let movements = f
            .engine
            .reverse_sale(&SaleReversal {
                sale_id: "sale-9".to_string(),
                location_id: "loc-br".to_string(),
                user_id: "user-2".to_string(),
                lines: vec![SaleLine {
                    product_id: "prod-para".to_string(),
                    quantity: 6,
                }],
            })
            .await
            .unwrap();

        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].action, MovementAction::Reversal);
        assert_eq!(movements[0].reference_no, "sale-9");
        assert_eq!(
            f.ledger.stock().quantity("prod-para", "loc-br").await.unwrap(),
            10
        );

        // Both the sale and the reversal share the sale's reference
        let rows = f.ledger.movements().find_by_reference("sale-9").await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    // -------------------------------------------------------------------------
    // Collaborators and notifications
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_snapshot_updates_pushed_per_side() {
        let f = fixture().await;
        f.engine
            .record_goods_received("prod-para", "loc-wh", 10, "user-1", "grn-1", None)
            .await
            .unwrap();

        let t = transfer(vec![TransferGroup {
            source_location_id: "loc-wh".to_string(),
            destination_location_id: "loc-br".to_string(),
            lines: vec![line("prod-para", 4)],
        }]);
        f.engine.process_transfer(&t).await.unwrap();

        let updates = f.sink.recorded();
        // 1 receipt + out/in pair for the transfer
        assert_eq!(updates.len(), 3);
        assert_eq!(updates[0].direction, StockDirection::In);
        assert_eq!(updates[1].direction, StockDirection::Out);
        assert_eq!(updates[1].resulting_quantity, 6);
        assert_eq!(updates[2].direction, StockDirection::In);
        assert_eq!(updates[2].resulting_quantity, 4);
        assert_eq!(updates[1].reference_tag, t.id);
    }

    #[tokio::test]
    async fn test_notifier_fires_per_mutation() {
        let f = fixture().await;
        let mut rx = f.engine.subscribe();

        f.engine
            .record_goods_received("prod-para", "loc-wh", 10, "user-1", "grn-1", None)
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap(), StockUpdated);

        let t = transfer(vec![TransferGroup {
            source_location_id: "loc-wh".to_string(),
            destination_location_id: "loc-br".to_string(),
            lines: vec![line("prod-para", 2)],
        }]);
        f.engine.process_transfer(&t).await.unwrap();

        // A transfer is one mutation: exactly one event
        assert_eq!(rx.recv().await.unwrap(), StockUpdated);
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    // -------------------------------------------------------------------------
    // Ledger invariant
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_stock_equals_sum_of_signed_movements() {
        let f = fixture().await;
        let engine = &f.engine;

        engine
            .record_goods_received("prod-para", "loc-br", 20, "user-1", "grn-1", None)
            .await
            .unwrap();
        engine
            .reduce_stock_for_sale("prod-para", "loc-br", 7, "sale-1")
            .await
            .unwrap();
        engine
            .process_return(
                ReturnKind::Sales,
                "prod-para",
                "loc-br",
                2,
                "user-1",
                "ret-1",
                None,
            )
            .await
            .unwrap();
        engine
            .adjust_stock(
                "prod-para",
                "loc-br",
                3,
                AdjustmentMode::Subtract,
                "user-1",
                None,
            )
            .await
            .unwrap();
        // Oversell at the end clamps to zero
        engine
            .reduce_stock_for_sale("prod-para", "loc-br", 99, "sale-2")
            .await
            .unwrap();

        let history = f
            .ledger
            .movements()
            .history_for("prod-para", "loc-br", 100)
            .await
            .unwrap();
        assert_eq!(history.len(), 5);

        let mut sum = 0;
        for movement in &history {
            assert!(movement.is_consistent());
            sum += movement.signed_delta();
        }
        assert_eq!(
            sum,
            f.ledger.stock().quantity("prod-para", "loc-br").await.unwrap()
        );
        assert_eq!(sum, 0);
    }
}
