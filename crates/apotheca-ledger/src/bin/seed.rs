//! # Seed Data Generator
//!
//! Populates a ledger database with demo stock for development: opening
//! balances at a warehouse, a transfer out to a branch, and a handful of
//! sales, so the movement log and stock views have something to show.
//!
//! ## Usage
//! ```bash
//! # Seed the default database
//! cargo run -p apotheca-ledger --bin seed
//!
//! # Specify database path
//! cargo run -p apotheca-ledger --bin seed -- --db ./data/apotheca.db
//! ```

use std::env;
use std::sync::Arc;

use apotheca_core::{ProductLine, StockTransfer, TransferGroup, SYSTEM_USER_ID};
use apotheca_ledger::{InMemoryMetadata, Ledger, LedgerConfig, MutationEngine};
use uuid::Uuid;

/// Demo catalog: (product id, display name, opening quantity at the
/// warehouse).
const PRODUCTS: &[(&str, &str, i64)] = &[
    ("prod-para-500", "Paracetamol 500mg", 400),
    ("prod-ibu-200", "Ibuprofen 200mg", 250),
    ("prod-amox-250", "Amoxicillin 250mg", 120),
    ("prod-cetr-10", "Cetirizine 10mg", 180),
    ("prod-omep-20", "Omeprazole 20mg", 90),
    ("prod-orsa", "ORS Sachet", 500),
    ("prod-vitc", "Vitamin C 500mg", 300),
    ("prod-bandage", "Elastic Bandage 7.5cm", 60),
];

const WAREHOUSE: (&str, &str) = ("loc-warehouse", "Central Warehouse");
const BRANCH: (&str, &str) = ("loc-branch-1", "Main Branch");

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./apotheca_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Apotheca Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./apotheca_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Apotheca Seed Data Generator");
    println!("===============================");
    println!("Database: {}", db_path);
    println!();

    // Connect to database
    let config = LedgerConfig::new(&db_path);
    let ledger = Ledger::new(config).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    // Skip if the ledger already has history
    let existing = ledger.movements().count().await?;
    if existing > 0 {
        println!("⚠ Ledger already has {} movements", existing);
        println!("  Skipping seed to avoid double-crediting stock.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let metadata = InMemoryMetadata::new();
    for (product_id, name, _) in PRODUCTS {
        metadata.add_product(*product_id, *name);
    }
    metadata.add_location(WAREHOUSE.0, WAREHOUSE.1);
    metadata.add_location(BRANCH.0, BRANCH.1);

    let engine = MutationEngine::new(&ledger).with_metadata(Arc::new(metadata));

    // Opening balances at the warehouse
    println!();
    println!("Recording opening stock at {}...", WAREHOUSE.1);
    for (product_id, name, quantity) in PRODUCTS {
        engine
            .record_initial_stock(product_id, WAREHOUSE.0, *quantity, SYSTEM_USER_ID, "seed-open")
            .await?;
        println!("  {} x{}", name, quantity);
    }

    // Move a third of each product to the branch
    println!();
    println!("Transferring stock to {}...", BRANCH.1);
    let transfer = StockTransfer {
        id: Uuid::new_v4().to_string(),
        user_id: SYSTEM_USER_ID.to_string(),
        groups: vec![TransferGroup {
            source_location_id: WAREHOUSE.0.to_string(),
            destination_location_id: BRANCH.0.to_string(),
            lines: PRODUCTS
                .iter()
                .map(|(product_id, _, quantity)| ProductLine {
                    product_id: product_id.to_string(),
                    quantity: quantity / 3,
                    unit_price_cents: 0,
                })
                .collect(),
        }],
        notes: Some("Initial branch allocation".to_string()),
    };
    let movements = engine.process_transfer(&transfer).await?;
    println!("  {} movement rows written", movements.len());

    // A few sales off the branch shelf
    println!();
    println!("Recording sample sales...");
    for (n, (product_id, name, _)) in PRODUCTS.iter().take(3).enumerate() {
        let sale_id = format!("seed-sale-{}", n + 1);
        let movement = engine
            .reduce_stock_for_sale(product_id, BRANCH.0, 2, &sale_id)
            .await?;
        println!("  {} x2 → {} left", name, movement.new_stock);
    }

    // Summary
    println!();
    println!("✓ Seed complete!");
    println!("  Movements: {}", ledger.movements().count().await?);
    for location_id in [WAREHOUSE.0, BRANCH.0] {
        let records = ledger.stock().list_for_location(location_id).await?;
        let total: i64 = records.iter().map(|r| r.quantity).sum();
        println!("  {}: {} products, {} units", location_id, records.len(), total);
    }

    Ok(())
}
