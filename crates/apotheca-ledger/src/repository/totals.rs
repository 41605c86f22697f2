//! # Receipt Totals Repository
//!
//! Product-level running totals of goods received, maintained as a side
//! effect of every goods receipt and read by purchasing reports.
//!
//! The bump happens inside the goods-receipt transaction, so the total can
//! never disagree with the movement log about how much was delivered.

use sqlx::{SqliteConnection, SqlitePool};

use crate::error::LedgerResult;

/// Repository for product goods-received running totals.
#[derive(Debug, Clone)]
pub struct ReceiptTotalsRepository {
    pool: SqlitePool,
}

impl ReceiptTotalsRepository {
    /// Creates a new ReceiptTotalsRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReceiptTotalsRepository { pool }
    }

    /// Total units ever received for a product; 0 when never received.
    pub async fn total_received(&self, product_id: &str) -> LedgerResult<i64> {
        let total: Option<i64> = sqlx::query_scalar(
            "SELECT total_received FROM product_receipt_totals WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(total.unwrap_or(0))
    }

    // =========================================================================
    // Transaction-scoped operations (used by the mutation engine)
    // =========================================================================

    /// Adds `quantity` to a product's running total on a live connection.
    pub(crate) async fn bump_in(
        conn: &mut SqliteConnection,
        product_id: &str,
        quantity: i64,
    ) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO product_receipt_totals (product_id, total_received)
            VALUES (?1, ?2)
            ON CONFLICT (product_id) DO UPDATE SET
                total_received = total_received + excluded.total_received
            "#,
        )
        .bind(product_id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}
