//! # Movement Log Repository
//!
//! The append-only movement audit trail.
//!
//! ## The Single Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Audit Write Guarantee                               │
//! │                                                                         │
//! │  Mutation engine                                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   SINGLE TRANSACTION                            │   │
//! │  │                                                                 │   │
//! │  │  1. UPSERT stock_records  (quantity, last_updated, updated_by) │   │
//! │  │                                                                 │   │
//! │  │  2. INSERT stock_movements (old_stock, new_stock, action, ...) │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ← Both succeed or both fail                                    │
//! │                                                                         │
//! │  A stock record can therefore never drift from the sum of its          │
//! │  movements, even across a crash between the two writes.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rows are immutable once written: this repository exposes no update or
//! delete, and the schema has no mutation path for them.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::LedgerResult;
use apotheca_core::StockMovement;

const MOVEMENT_COLUMNS: &str = r#"
    id, product_id, product_name, location_id, location_name,
    action, quantity, old_stock, new_stock, timestamp,
    user_id, reference_no, source_location_id, destination_location_id, notes
"#;

/// Repository for the stock movement audit log.
#[derive(Debug, Clone)]
pub struct MovementLogRepository {
    pool: SqlitePool,
}

impl MovementLogRepository {
    /// Creates a new MovementLogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MovementLogRepository { pool }
    }

    /// Movements for one `(product, location)` key, newest first.
    pub async fn history_for(
        &self,
        product_id: &str,
        location_id: &str,
        limit: u32,
    ) -> LedgerResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(&format!(
            r#"
            SELECT {MOVEMENT_COLUMNS}
            FROM stock_movements
            WHERE product_id = ?1 AND location_id = ?2
            ORDER BY timestamp DESC, id
            LIMIT ?3
            "#
        ))
        .bind(product_id)
        .bind(location_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// All movements produced by one business document (transfer id,
    /// sale id, return id), in the order they were applied.
    pub async fn find_by_reference(&self, reference_no: &str) -> LedgerResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(&format!(
            r#"
            SELECT {MOVEMENT_COLUMNS}
            FROM stock_movements
            WHERE reference_no = ?1
            ORDER BY timestamp, rowid
            "#
        ))
        .bind(reference_no)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Total number of movements (for diagnostics).
    pub async fn count(&self) -> LedgerResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stock_movements")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Transaction-scoped operations (used by the mutation engine)
    // =========================================================================

    /// Appends one movement on a live connection.
    ///
    /// The engine calls this inside the same transaction as the stock
    /// record write it describes.
    pub(crate) async fn append_in(
        conn: &mut SqliteConnection,
        movement: &StockMovement,
    ) -> LedgerResult<()> {
        debug!(
            product_id = %movement.product_id,
            location_id = %movement.location_id,
            action = ?movement.action,
            old_stock = %movement.old_stock,
            new_stock = %movement.new_stock,
            "Appending movement"
        );

        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, product_id, product_name, location_id, location_name,
                action, quantity, old_stock, new_stock, timestamp,
                user_id, reference_no, source_location_id, destination_location_id, notes
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14, ?15
            )
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.product_id)
        .bind(&movement.product_name)
        .bind(&movement.location_id)
        .bind(&movement.location_name)
        .bind(movement.action)
        .bind(movement.quantity)
        .bind(movement.old_stock)
        .bind(movement.new_stock)
        .bind(movement.timestamp)
        .bind(&movement.user_id)
        .bind(&movement.reference_no)
        .bind(&movement.source_location_id)
        .bind(&movement.destination_location_id)
        .bind(&movement.notes)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}
