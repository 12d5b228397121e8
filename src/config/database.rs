//! Database configuration module for `BasketBuddy`.
//!
//! This module handles the database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs without hand-written SQL. Creation is
//! idempotent and safe to run on every start.

use crate::entities::{AssociationRule, Product, RecommendationConfig, SaleLine, SaleNote};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use std::path::Path;
use tracing::{debug, info};

/// Default `SQLite` file used when neither the environment nor config.toml set a URL.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/basket_buddy.sqlite?mode=rwc";

/// Opens a connection to the database at `database_url`.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    debug!("Connecting to database at {}", database_url);
    Database::connect(database_url).await.map_err(Into::into)
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    db.execute(builder.build(statement.if_not_exists())).await?;
    Ok(())
}

/// Creates all tables that do not exist yet.
///
/// Parents are created before children so foreign keys resolve: products and sale notes
/// first, then sale lines, rules, and the config singleton.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, Product).await?;
    create_table(db, &schema, SaleNote).await?;
    create_table(db, &schema, SaleLine).await?;
    create_table(db, &schema, AssociationRule).await?;
    create_table(db, &schema, RecommendationConfig).await?;

    info!("Database tables ensured");
    Ok(())
}

/// Creates the directory holding a file-backed `SQLite` database.
fn ensure_parent_dir(database_url: &str) -> Result<()> {
    let Some(path) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or(path);
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Connects and makes sure the schema exists.
pub async fn init_database(database_url: &str) -> Result<DatabaseConnection> {
    ensure_parent_dir(database_url)?;
    let db = create_connection(database_url).await?;
    create_tables(&db).await?;
    Ok(db)
}
