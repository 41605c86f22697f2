//! # Repository Layer
//!
//! One repository per ledger table:
//!
//! - [`stock`] - current quantity per `(product, location)` key
//! - [`movement`] - the append-only movement audit log
//! - [`totals`] - product-level goods-received running totals
//!
//! Repositories own the SQL. Reads come in two flavors: pool-backed methods
//! for the read side, and `*_in` associated functions taking a live
//! connection so the mutation engine can group writes into one transaction.

pub mod movement;
pub mod stock;
pub mod totals;
