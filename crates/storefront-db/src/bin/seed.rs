//! # Seed Data Generator
//!
//! Populates a development database with jerseys, a few coupons and a
//! funded demo wallet.
//!
//! ## Usage
//! ```bash
//! cargo run -p storefront-db --bin seed
//! cargo run -p storefront-db --bin seed -- --db ./data/storefront.db
//! RUST_LOG=debug cargo run -p storefront-db --bin seed
//! ```

use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use storefront_core::{
    Coupon, CouponScope, DiscountRule, Money, ProductSnapshot, ProductStatus, SizeStock,
    WalletTransaction,
};
use storefront_db::{Database, DbConfig};

/// (team id, team name) pairs.
const TEAMS: &[(&str, &str)] = &[
    ("blues", "Blues"),
    ("reds", "Reds"),
    ("greens", "Greens"),
    ("golds", "Golds"),
];

/// (category id, kit name, price in major units)
const KITS: &[(&str, &str, i64)] = &[
    ("jerseys", "Home Jersey", 500),
    ("jerseys", "Away Jersey", 450),
    ("training", "Training Top", 300),
    ("accessories", "Scarf", 150),
];

const SIZES: &[&str] = &["S", "M", "L", "XL"];

const DEMO_USER: &str = "demo-user";

fn products() -> Vec<ProductSnapshot> {
    let mut products = Vec::new();
    for (team_idx, (team_id, team_name)) in TEAMS.iter().enumerate() {
        for (kit_idx, (category, kit, price)) in KITS.iter().enumerate() {
            let per_size = 5 + ((team_idx * 3 + kit_idx * 7) % 10) as i64;
            let sizes: Vec<SizeStock> = SIZES
                .iter()
                .map(|size| SizeStock {
                    size: size.to_string(),
                    stock: per_size,
                })
                .collect();
            products.push(ProductSnapshot {
                id: format!("{team_id}-{}", kit.to_lowercase().replace(' ', "-")),
                name: format!("{team_name} {kit}"),
                price: Money::from_major(*price),
                status: ProductStatus::Active,
                stock_quantity: per_size * SIZES.len() as i64,
                sizes,
                category_id: Some(category.to_string()),
                team_id: Some(team_id.to_string()),
                image: Some(format!("/images/{team_id}/{kit_idx}.jpg")),
            });
        }
    }
    products
}

fn coupons() -> Vec<Coupon> {
    let save10 = Coupon::new("SAVE10", DiscountRule::Percentage { bps: 1000 });

    let mut duo = Coupon::new("DUO15", DiscountRule::Percentage { bps: 1500 });
    duo.min_quantity = 2;

    let mut flat = Coupon::new("FLAT100", DiscountRule::Fixed {
        amount: Money::from_major(100),
    });
    flat.min_order_value = Money::from_major(800);
    flat.usage_limit = Some(50);

    let mut blues = Coupon::new("BLUES20", DiscountRule::Percentage { bps: 2000 });
    blues.scope = CouponScope::Team(vec!["blues".to_string()]);

    let ship = Coupon::new("SHIPFREE", DiscountRule::FreeShipping);

    vec![save10, duo, flat, blues, ship]
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./storefront_dev.db");

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
                println!("Storefront Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./storefront_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let db = Database::new(DbConfig::new(&db_path)).await?;
    info!(path = %db_path, "Connected, migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        warn!(existing, "Database already has products, skipping seed");
        return Ok(());
    }

    let mut inserted = 0;
    for product in products() {
        if let Err(e) = db.products().insert(&product).await {
            warn!(id = %product.id, error = %e, "Failed to insert product");
            continue;
        }
        inserted += 1;
    }
    info!(inserted, "Products seeded");

    for coupon in coupons() {
        db.coupons().insert(&coupon).await?;
        info!(code = %coupon.code, "Coupon seeded");
    }

    let balance = db
        .wallets()
        .post(&WalletTransaction::credit(
            DEMO_USER,
            Money::from_major(5000),
            "Welcome credit",
        ))
        .await?;
    info!(user_id = DEMO_USER, balance = %balance, "Demo wallet funded");

    db.close().await;
    Ok(())
}
