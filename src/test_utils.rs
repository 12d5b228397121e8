//! Shared test utilities for `BasketBuddy`.
//!
//! This module provides common helper functions for setting up test databases
//! and creating catalog products and sales with sensible defaults.

use crate::{
    core::{
        product,
        sales::{self, NewSale, SaleLineInput},
    },
    entities,
    errors::Result,
};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use tracing_subscriber::EnvFilter;

/// Routes tracing output to the test harness. Safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a test product with sensible defaults.
///
/// # Defaults
/// * price: 10.0
/// * description: None
pub async fn create_test_product(
    db: &DatabaseConnection,
    name: &str,
) -> Result<entities::product::Model> {
    product::create_product(db, name.to_string(), 10.0, None).await
}

/// Creates a test product with custom price.
pub async fn create_custom_product(
    db: &DatabaseConnection,
    name: &str,
    price: f64,
) -> Result<entities::product::Model> {
    product::create_product(db, name.to_string(), price, None).await
}

/// Creates `count` products named "Product 1", "Product 2", ... and returns their ids in
/// creation order.
pub async fn create_numbered_products(db: &DatabaseConnection, count: usize) -> Result<Vec<i64>> {
    let mut ids = Vec::with_capacity(count);
    for n in 1..=count {
        ids.push(create_test_product(db, &format!("Product {n}")).await?.id);
    }
    Ok(ids)
}

/// Records a sale happening now with one unit of each product.
pub async fn record_basket(
    db: &DatabaseConnection,
    product_ids: &[i64],
) -> Result<entities::sale_note::Model> {
    record_basket_at(db, product_ids, Utc::now()).await
}

/// Records a sale at a given time with one unit of each product.
pub async fn record_basket_at(
    db: &DatabaseConnection,
    product_ids: &[i64],
    sold_at: DateTime<Utc>,
) -> Result<entities::sale_note::Model> {
    let lines = product_ids
        .iter()
        .map(|&product_id| SaleLineInput {
            product_id,
            quantity: 1,
        })
        .collect();
    sales::record_sale(
        db,
        NewSale {
            customer_id: None,
            sold_at,
            lines,
        },
    )
    .await
}
