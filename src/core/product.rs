//! Product catalog - Lookup and maintenance of catalog products.
//!
//! The catalog is owned by the store front; this module covers what the recommendation
//! engine needs from it: creating products (for seeding and tests), fetching details to
//! enrich recommendations, and soft deletion. All functions are async and return Result
//! types for proper error handling throughout the system.

use crate::{
    entities::{Product, product},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use std::collections::HashMap;

/// Retrieves all active (non-deleted) products, ordered alphabetically by name.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_all_active_products(db: &DatabaseConnection) -> Result<Vec<product::Model>> {
    Product::find()
        .filter(product::Column::IsDeleted.eq(false))
        .order_by_asc(product::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Fetches the active products among `product_ids`, keyed by id.
///
/// Ids that do not exist or belong to deleted products are simply absent from the map.
/// Used to attach product details to recommendation results in a single query.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_products_by_ids<C>(
    db: &C,
    product_ids: &[i64],
) -> Result<HashMap<i64, product::Model>>
where
    C: ConnectionTrait,
{
    if product_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let products = Product::find()
        .filter(product::Column::Id.is_in(product_ids.iter().copied()))
        .filter(product::Column::IsDeleted.eq(false))
        .all(db)
        .await?;

    Ok(products.into_iter().map(|p| (p.id, p)).collect())
}

/// Creates a new product, performing input validation.
///
/// The name is trimmed and must not be empty; the price must be finite and non-negative.
///
/// # Errors
/// Returns an error if:
/// - The product name is empty or whitespace-only
/// - The price is negative or not finite (NaN, infinity)
/// - The database insert operation fails
pub async fn create_product(
    db: &DatabaseConnection,
    name: String,
    price: f64,
    description: Option<String>,
) -> Result<product::Model> {
    if name.trim().is_empty() {
        return Err(Error::Config {
            message: "Product name cannot be empty".to_string(),
        });
    }

    if price < 0.0 || !price.is_finite() {
        return Err(Error::InvalidAmount { amount: price });
    }

    let now = chrono::Utc::now().naive_utc();

    let product = product::ActiveModel {
        name: Set(name.trim().to_string()),
        price: Set(price),
        description: Set(description),
        is_deleted: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    product.insert(db).await.map_err(Into::into)
}

/// Soft deletes a product. Sales history and existing rules keep referencing it, but it
/// is no longer attached to recommendation results.
///
/// # Errors
/// Returns an error if:
/// - The product does not exist or is already deleted
/// - The database update operation fails
pub async fn delete_product(db: &DatabaseConnection, product_id: i64) -> Result<product::Model> {
    let mut product: product::ActiveModel = Product::find_by_id(product_id)
        .one(db)
        .await?
        .ok_or(Error::ProductNotFound { id: product_id })?
        .into();

    if *product.is_deleted.as_ref() {
        return Err(Error::ProductNotFound { id: product_id });
    }

    product.is_deleted = Set(true);
    product.updated_at = Set(chrono::Utc::now().naive_utc());

    product.update(db).await.map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_create_product_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = create_product(&db, String::new(), 10.0, None).await;
        assert!(matches!(result.unwrap_err(), Error::Config { message: _ }));

        let result = create_product(&db, "   ".to_string(), 10.0, None).await;
        assert!(matches!(result.unwrap_err(), Error::Config { message: _ }));

        let result = create_product(&db, "Cable".to_string(), -10.0, None).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InvalidAmount { amount: -10.0 }
        ));

        let result = create_product(&db, "Cable".to_string(), f64::NAN, None).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InvalidAmount { amount: _ }
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_product_integration() -> Result<()> {
        let db = setup_test_db().await?;

        let product = create_product(
            &db,
            "  Phone Case ".to_string(),
            15.50,
            Some("Silicone".to_string()),
        )
        .await?;

        assert_eq!(product.name, "Phone Case");
        assert_eq!(product.price, 15.50);
        assert_eq!(product.description.as_deref(), Some("Silicone"));
        assert!(!product.is_deleted);

        Ok(())
    }

    #[tokio::test]
    async fn test_get_products_by_ids_skips_missing_and_deleted() -> Result<()> {
        let db = setup_test_db().await?;
        let phone = create_test_product(&db, "Phone").await?;
        let charger = create_test_product(&db, "Charger").await?;
        let old = create_test_product(&db, "Old Model").await?;
        delete_product(&db, old.id).await?;

        let found = get_products_by_ids(&db, &[phone.id, charger.id, old.id, 999]).await?;
        assert_eq!(found.len(), 2);
        assert_eq!(found[&phone.id].name, "Phone");
        assert_eq!(found[&charger.id].name, "Charger");

        let none = get_products_by_ids(&db, &[]).await?;
        assert!(none.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_get_all_active_products_excludes_deleted() -> Result<()> {
        let db = setup_test_db().await?;

        let active = create_test_product(&db, "Active Product").await?;
        let deleted = create_test_product(&db, "Deleted Product").await?;
        delete_product(&db, deleted.id).await?;

        let products = get_all_active_products(&db).await?;
        assert_eq!(products.len(), 1);
        assert_eq!(products[0], active);

        // Deleted products are still reachable by id
        let found = Product::find_by_id(deleted.id).one(&db).await?.unwrap();
        assert!(found.is_deleted);

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_product_not_found() -> Result<()> {
        let db = setup_test_db().await?;

        let result = delete_product(&db, 999).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::ProductNotFound { id: 999 }
        ));

        Ok(())
    }
}
