//! # Engine Collaborators
//!
//! Trait seams for the two external systems the mutation engine talks to:
//! product/location metadata and the daily snapshot store.
//!
//! ## Boundary Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Collaborator Boundaries                             │
//! │                                                                         │
//! │  MutationEngine                                                        │
//! │       │                                                                 │
//! │       ├──► MetadataLookup ── names for denormalized log columns        │
//! │       │       (missing name? fall back to the raw id - never block     │
//! │       │        a mutation on cosmetic data)                            │
//! │       │                                                                 │
//! │       └──► SnapshotSink ── per-movement daily snapshot push            │
//! │               (called AFTER the ledger transaction commits; a sink     │
//! │                failure is logged and never rolls back the mutation)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use apotheca_core::StockDirection;

// =============================================================================
// Metadata Lookup
// =============================================================================

/// Resolves human-readable names for the denormalized columns on movement
/// log entries.
#[async_trait]
pub trait MetadataLookup: Send + Sync {
    /// Display name for a product, if known.
    async fn product_name(&self, product_id: &str) -> Option<String>;

    /// Display name for a location, if known.
    async fn location_name(&self, location_id: &str) -> Option<String>;
}

/// Metadata lookup that knows nothing; every name falls back to its id.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMetadata;

#[async_trait]
impl MetadataLookup for NullMetadata {
    async fn product_name(&self, _product_id: &str) -> Option<String> {
        None
    }

    async fn location_name(&self, _location_id: &str) -> Option<String> {
        None
    }
}

/// In-memory metadata lookup, used by tests and the seed binary.
#[derive(Debug, Default)]
pub struct InMemoryMetadata {
    products: RwLock<HashMap<String, String>>,
    locations: RwLock<HashMap<String, String>>,
}

impl InMemoryMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a product display name.
    pub fn add_product(&self, product_id: impl Into<String>, name: impl Into<String>) {
        self.products
            .write()
            .expect("metadata lock poisoned")
            .insert(product_id.into(), name.into());
    }

    /// Registers a location display name.
    pub fn add_location(&self, location_id: impl Into<String>, name: impl Into<String>) {
        self.locations
            .write()
            .expect("metadata lock poisoned")
            .insert(location_id.into(), name.into());
    }
}

#[async_trait]
impl MetadataLookup for InMemoryMetadata {
    async fn product_name(&self, product_id: &str) -> Option<String> {
        self.products
            .read()
            .expect("metadata lock poisoned")
            .get(product_id)
            .cloned()
    }

    async fn location_name(&self, location_id: &str) -> Option<String> {
        self.locations
            .read()
            .expect("metadata lock poisoned")
            .get(location_id)
            .cloned()
    }
}

// =============================================================================
// Snapshot Sink
// =============================================================================

/// One daily-snapshot contribution, derived from a committed movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotUpdate {
    pub product_id: String,
    pub location_id: String,

    /// Calendar day the movement landed on (UTC).
    pub date: NaiveDate,

    /// On-hand quantity after the movement.
    pub resulting_quantity: i64,

    /// Which side of the day's in/out tally the movement belongs to.
    pub direction: StockDirection,

    /// Magnitude of the applied change.
    pub moved_quantity: i64,

    /// The movement's `reference_no`, for snapshot drill-down.
    pub reference_tag: String,
}

/// Receives per-movement snapshot contributions after each commit.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    /// Folds one committed movement into the daily snapshot for its
    /// `(product, location, date)`.
    ///
    /// Errors are the sink's to report; the engine logs and moves on.
    async fn update_daily_snapshot(&self, update: SnapshotUpdate) -> Result<(), String>;
}

/// Snapshot sink that drops every update (no snapshot store configured).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSnapshotSink;

#[async_trait]
impl SnapshotSink for NullSnapshotSink {
    async fn update_daily_snapshot(&self, _update: SnapshotUpdate) -> Result<(), String> {
        Ok(())
    }
}

/// Snapshot sink that records every update in memory, for tests.
#[derive(Debug, Default)]
pub struct RecordingSnapshotSink {
    updates: Mutex<Vec<SnapshotUpdate>>,
}

impl RecordingSnapshotSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All updates received so far, in arrival order.
    pub fn recorded(&self) -> Vec<SnapshotUpdate> {
        self.updates.lock().expect("sink lock poisoned").clone()
    }
}

#[async_trait]
impl SnapshotSink for RecordingSnapshotSink {
    async fn update_daily_snapshot(&self, update: SnapshotUpdate) -> Result<(), String> {
        self.updates
            .lock()
            .expect("sink lock poisoned")
            .push(update);
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_metadata_lookup() {
        let metadata = InMemoryMetadata::new();
        metadata.add_product("prod-1", "Paracetamol 500mg");
        metadata.add_location("loc-1", "Main Branch");

        assert_eq!(
            metadata.product_name("prod-1").await.as_deref(),
            Some("Paracetamol 500mg")
        );
        assert_eq!(
            metadata.location_name("loc-1").await.as_deref(),
            Some("Main Branch")
        );
        assert_eq!(metadata.product_name("prod-unknown").await, None);
    }

    #[tokio::test]
    async fn test_recording_sink_keeps_arrival_order() {
        let sink = RecordingSnapshotSink::new();

        for quantity in [3, 7] {
            sink.update_daily_snapshot(SnapshotUpdate {
                product_id: "prod-1".to_string(),
                location_id: "loc-1".to_string(),
                date: NaiveDate::from_ymd_opt(2026, 8, 30).unwrap(),
                resulting_quantity: quantity,
                direction: StockDirection::In,
                moved_quantity: quantity,
                reference_tag: "grn-1".to_string(),
            })
            .await
            .unwrap();
        }

        let recorded = sink.recorded();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].moved_quantity, 3);
        assert_eq!(recorded[1].moved_quantity, 7);
    }
}
