//! # Stock Record Repository
//!
//! The Stock Record Store: current on-hand quantity per
//! `(product_id, location_id)` composite key.
//!
//! ## Absence Is Zero
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  quantity("prod-amoxicillin", "loc-warehouse")                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SELECT quantity FROM stock_records WHERE ... ── row? ──► quantity     │
//! │                                           └── no row ──► 0             │
//! │                                                                         │
//! │  A product that has never been stocked at a location is quantity 0,    │
//! │  not an error. Records are created lazily by the first mutation and    │
//! │  never deleted.                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! This is the single place where "absent record" becomes 0; callers never
//! apply their own fallback.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::LedgerResult;
use apotheca_core::StockRecord;

/// Repository for stock record reads and writes.
#[derive(Debug, Clone)]
pub struct StockRecordRepository {
    pool: SqlitePool,
}

impl StockRecordRepository {
    /// Creates a new StockRecordRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StockRecordRepository { pool }
    }

    /// Current quantity for a key; 0 when the record does not exist.
    pub async fn quantity(&self, product_id: &str, location_id: &str) -> LedgerResult<i64> {
        let mut conn = self.pool.acquire().await?;
        Self::quantity_in(&mut conn, product_id, location_id).await
    }

    /// Full record for a key, if one has been created yet.
    pub async fn get(
        &self,
        product_id: &str,
        location_id: &str,
    ) -> LedgerResult<Option<StockRecord>> {
        let record = sqlx::query_as::<_, StockRecord>(
            r#"
            SELECT product_id, location_id, quantity, last_updated, updated_by
            FROM stock_records
            WHERE product_id = ?1 AND location_id = ?2
            "#,
        )
        .bind(product_id)
        .bind(location_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// All records at one location, for stock-on-hand views.
    pub async fn list_for_location(&self, location_id: &str) -> LedgerResult<Vec<StockRecord>> {
        let records = sqlx::query_as::<_, StockRecord>(
            r#"
            SELECT product_id, location_id, quantity, last_updated, updated_by
            FROM stock_records
            WHERE location_id = ?1
            ORDER BY product_id
            "#,
        )
        .bind(location_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Writes a quantity with merge semantics (pool-backed).
    ///
    /// See [`Self::set_quantity_in`] for the merge contract.
    pub async fn set_quantity(
        &self,
        product_id: &str,
        location_id: &str,
        quantity: i64,
        actor: &str,
    ) -> LedgerResult<()> {
        let mut conn = self.pool.acquire().await?;
        Self::set_quantity_in(&mut conn, product_id, location_id, quantity, actor, Utc::now()).await
    }

    // =========================================================================
    // Transaction-scoped operations (used by the mutation engine)
    // =========================================================================

    /// Current quantity for a key on a live connection; 0 when absent.
    pub(crate) async fn quantity_in(
        conn: &mut SqliteConnection,
        product_id: &str,
        location_id: &str,
    ) -> LedgerResult<i64> {
        let quantity: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT quantity FROM stock_records
            WHERE product_id = ?1 AND location_id = ?2
            "#,
        )
        .bind(product_id)
        .bind(location_id)
        .fetch_optional(&mut *conn)
        .await?;

        // Absence is the valid "never stocked here yet" state, not an error
        Ok(quantity.unwrap_or(0))
    }

    /// Upserts a quantity with merge semantics.
    ///
    /// ## Merge Contract
    /// Only `quantity`, `last_updated` and `updated_by` are written; a
    /// record created by an earlier mutation keeps everything else intact,
    /// and a missing record is created on the spot.
    pub(crate) async fn set_quantity_in(
        conn: &mut SqliteConnection,
        product_id: &str,
        location_id: &str,
        quantity: i64,
        actor: &str,
        now: DateTime<Utc>,
    ) -> LedgerResult<()> {
        debug!(
            product_id = %product_id,
            location_id = %location_id,
            quantity = %quantity,
            "Writing stock record"
        );

        sqlx::query(
            r#"
            INSERT INTO stock_records (product_id, location_id, quantity, last_updated, updated_by)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (product_id, location_id) DO UPDATE SET
                quantity = excluded.quantity,
                last_updated = excluded.last_updated,
                updated_by = excluded.updated_by
            "#,
        )
        .bind(product_id)
        .bind(location_id)
        .bind(quantity)
        .bind(now)
        .bind(actor)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::pool::{Ledger, LedgerConfig};

    #[tokio::test]
    async fn test_absent_record_reads_as_zero() {
        let ledger = Ledger::new(LedgerConfig::in_memory()).await.unwrap();
        let stock = ledger.stock();

        assert_eq!(stock.quantity("prod-x", "loc-1").await.unwrap(), 0);
        assert!(stock.get("prod-x", "loc-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let ledger = Ledger::new(LedgerConfig::in_memory()).await.unwrap();
        let stock = ledger.stock();

        stock
            .set_quantity("prod-x", "loc-1", 25, "user-1")
            .await
            .unwrap();

        assert_eq!(stock.quantity("prod-x", "loc-1").await.unwrap(), 25);

        let record = stock.get("prod-x", "loc-1").await.unwrap().unwrap();
        assert_eq!(record.quantity, 25);
        assert_eq!(record.updated_by, "user-1");

        // Upsert overwrites quantity and actor on the same key
        stock
            .set_quantity("prod-x", "loc-1", 10, "user-2")
            .await
            .unwrap();
        let record = stock.get("prod-x", "loc-1").await.unwrap().unwrap();
        assert_eq!(record.quantity, 10);
        assert_eq!(record.updated_by, "user-2");
    }

    #[tokio::test]
    async fn test_list_for_location() {
        let ledger = Ledger::new(LedgerConfig::in_memory()).await.unwrap();
        let stock = ledger.stock();

        stock.set_quantity("prod-a", "loc-1", 5, "u").await.unwrap();
        stock.set_quantity("prod-b", "loc-1", 7, "u").await.unwrap();
        stock.set_quantity("prod-a", "loc-2", 9, "u").await.unwrap();

        let records = stock.list_for_location("loc-1").await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].product_id, "prod-a");
        assert_eq!(records[1].product_id, "prod-b");
    }
}
