//! # Seed Data Generator
//!
//! Populates a database with a small café catalog for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./till_dev.db
//! cargo run -p till-db --bin seed
//!
//! # Specify database path and stock level
//! cargo run -p till-db --bin seed -- --db ./data/till.db --stock 50
//! ```
//!
//! ## Generated Data
//! - Categories: drinks, food, snacks
//! - Discounts: 10% off, buy-3 (500 off each), and an expired 50% off
//! - Products: every catalog entry below, some carrying a discount
//! - Cashiers: two
//! - Payments: one per kind (CASH, E-WALLET, EDC)

use anyhow::Context;
use chrono::{Duration, Utc};
use std::env;
use till_core::{Discount, DiscountKind, PaymentKind, Product};
use till_db::{Database, DbConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// (category, [(name, sku, price_cents, discount slot)])
///
/// Discount slot indexes into the seeded discounts: 0 = 10% off,
/// 1 = buy-3, 2 = expired.
const CATALOG: &[(&str, &[(&str, &str, i64, Option<usize>)])] = &[
    (
        "Minuman",
        &[
            ("Kopi Susu", "DRK-KOPSUS", 18_000, Some(0)),
            ("Es Teh Manis", "DRK-ESTEH", 6_000, Some(1)),
            ("Es Jeruk", "DRK-ESJRK", 8_000, None),
            ("Air Mineral", "DRK-AIR", 4_000, None),
            ("Cokelat Panas", "DRK-COKLAT", 15_000, Some(2)),
        ],
    ),
    (
        "Makanan",
        &[
            ("Nasi Goreng", "FOD-NASGOR", 25_000, None),
            ("Mie Ayam", "FOD-MIEAYM", 20_000, Some(0)),
            ("Roti Bakar", "FOD-ROTI", 12_000, Some(1)),
        ],
    ),
    (
        "Camilan",
        &[
            ("Pisang Goreng", "SNK-PISGOR", 10_000, Some(1)),
            ("Kentang Goreng", "SNK-KTG", 14_000, None),
        ],
    ),
];

const CASHIERS: &[&str] = &["Budi", "Sari"];

const PAYMENTS: &[(&str, PaymentKind, &str)] = &[
    ("Tunai", PaymentKind::Cash, "cash.png"),
    ("GoPay", PaymentKind::EWallet, "gopay.png"),
    ("Kartu Debit", PaymentKind::Edc, "edc.png"),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./till_dev.db");
    let mut stock: i64 = 100;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--stock" | "-s" => {
                if i + 1 < args.len() {
                    stock = args[i + 1].parse().context("--stock must be a number")?;
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Till POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>     Database file path (default: ./till_dev.db)");
                println!("  -s, --stock <N>     Starting stock per product (default: 100)");
                println!("  -h, --help          Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let db = Database::new(DbConfig::new(&db_path))
        .await
        .with_context(|| format!("opening {db_path}"))?;

    let existing = db.products().count().await?;
    if existing > 0 {
        warn!(existing, "Database already has products, skipping seed");
        return Ok(());
    }

    let now = Utc::now();
    let discount_specs = [
        (DiscountKind::Percent, 1, 10, None),
        (DiscountKind::BuyN, 3, 500, None),
        (DiscountKind::Percent, 1, 50, Some(now - Duration::days(1))),
    ];

    let mut discount_ids = Vec::with_capacity(discount_specs.len());
    for (kind, qty, result, expired_at) in discount_specs {
        let stored = db
            .discounts()
            .insert(&Discount {
                id: 0,
                kind,
                qty,
                result,
                expired_at,
            })
            .await?;
        discount_ids.push(stored.id);
    }
    info!(count = discount_ids.len(), "Seeded discounts");

    let mut generated = 0;
    for (category_name, products) in CATALOG {
        let category = db.categories().insert(category_name).await?;

        for (name, sku, price_cents, slot) in products.iter() {
            let product = Product {
                id: 0,
                name: name.to_string(),
                sku: sku.to_string(),
                image: String::new(),
                price_cents: *price_cents,
                stock,
                discount_id: slot.map(|s| discount_ids[s]),
                category_id: Some(category.id),
                discount: None,
                created_at: now,
                updated_at: now,
            };

            if let Err(e) = db.products().insert(&product).await {
                warn!(sku = %sku, error = %e, "Failed to insert product");
                continue;
            }
            generated += 1;
        }
    }
    info!(count = generated, "Seeded products");

    for name in CASHIERS {
        db.cashiers().insert(name).await?;
    }
    for (name, kind, logo) in PAYMENTS {
        db.payments().insert(name, *kind, logo).await?;
    }
    info!(
        cashiers = CASHIERS.len(),
        payments = PAYMENTS.len(),
        "Seeded cashiers and payments"
    );

    info!(path = %db_path, "Seed complete");
    db.close().await;
    Ok(())
}
