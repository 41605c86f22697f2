//! # apotheca-ledger: SQLite Persistence and Mutation Engine
//!
//! The database layer of the Apotheca stock ledger: pooled SQLite access,
//! embedded migrations, table repositories, the mutation engine that owns
//! every stock write, and the collaborator seams around it.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Apotheca Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Back-office UI (out of scope)                   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ apotheca-ledger (THIS CRATE) ★                   │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌────────────┐ ┌───────────────┐  │   │
//! │  │   │   pool   │ │  engine  │ │ repository │ │   notifier    │  │   │
//! │  │   │  Ledger  │ │ mutation │ │ stock, log │ │  broadcast    │  │   │
//! │  │   │  config  │ │ pipeline │ │   totals   │ │ StockUpdated  │  │   │
//! │  │   └──────────┘ └──────────┘ └────────────┘ └───────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────────┐ ┌────────────┐ ┌───────────────────────┐   │   │
//! │  │   │ collaborators│ │ migrations │ │        error          │   │   │
//! │  │   │ traits/seams │ │  embedded  │ │     LedgerError       │   │   │
//! │  │   └──────────────┘ └────────────┘ └───────────────────────┘   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            apotheca-core (pure domain logic)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//! ```rust,ignore
//! use apotheca_ledger::{Ledger, LedgerConfig, MutationEngine};
//!
//! let ledger = Ledger::new(LedgerConfig::new("/var/lib/apotheca.db")).await?;
//! let engine = MutationEngine::new(&ledger);
//!
//! let mut updates = engine.subscribe();
//! engine
//!     .record_goods_received("prod-1", "loc-1", 50, "user-1", "grn-1", None)
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod collaborators;
pub mod engine;
pub mod error;
pub mod migrations;
pub mod notifier;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use collaborators::{
    InMemoryMetadata, MetadataLookup, NullMetadata, NullSnapshotSink, RecordingSnapshotSink,
    SnapshotSink, SnapshotUpdate,
};
pub use engine::MutationEngine;
pub use error::{LedgerError, LedgerResult};
pub use notifier::{ChangeNotifier, StockUpdated};
pub use pool::{Ledger, LedgerConfig};
pub use repository::movement::MovementLogRepository;
pub use repository::stock::StockRecordRepository;
pub use repository::totals::ReceiptTotalsRepository;
