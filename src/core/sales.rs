//! Sales - Recording sale notes and reading sales activity.
//!
//! Sale notes and their lines are the raw input of the mining pipeline. Recording a sale
//! writes the note and all its lines in one database transaction so the miner never sees
//! a half-written basket.

use crate::{
    entities::{Product, SaleLine, SaleNote, product, sale_line, sale_note},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QuerySelect, Set, TransactionTrait, prelude::*, sea_query::Expr};
use std::collections::HashMap;
use tracing::{debug, info};

/// Status written on sale notes created by [`record_sale`].
pub const STATUS_COMPLETED: &str = "completed";

/// One product on a sale being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleLineInput {
    /// Product sold
    pub product_id: i64,
    /// Units sold, must be positive
    pub quantity: i32,
}

/// A sale to record.
#[derive(Debug, Clone)]
pub struct NewSale {
    /// Customer id from the external customer service
    pub customer_id: Option<i64>,
    /// When the sale happened
    pub sold_at: DateTime<Utc>,
    /// Products on the sale
    pub lines: Vec<SaleLineInput>,
}

impl NewSale {
    /// Walk-in sale happening now.
    #[must_use]
    pub fn now(lines: Vec<SaleLineInput>) -> Self {
        Self {
            customer_id: None,
            sold_at: Utc::now(),
            lines,
        }
    }
}

/// Records a completed sale with its lines.
///
/// Unit prices are taken from the catalog at the time of the sale and the note total is
/// the sum of the line subtotals. The note and every line are inserted atomically.
///
/// # Errors
/// Returns an error if:
/// - The sale has no lines (`EmptySale`)
/// - A quantity is zero or negative (`InvalidQuantity`)
/// - A product does not exist or is deleted (`ProductNotFound`)
/// - Any database operation fails
pub async fn record_sale(db: &DatabaseConnection, sale: NewSale) -> Result<sale_note::Model> {
    if sale.lines.is_empty() {
        return Err(Error::EmptySale);
    }
    if let Some(line) = sale.lines.iter().find(|l| l.quantity <= 0) {
        return Err(Error::InvalidQuantity {
            quantity: line.quantity,
        });
    }

    let txn = db.begin().await?;

    let product_ids: Vec<i64> = sale.lines.iter().map(|l| l.product_id).collect();
    let prices: HashMap<i64, f64> = Product::find()
        .filter(product::Column::Id.is_in(product_ids))
        .filter(product::Column::IsDeleted.eq(false))
        .all(&txn)
        .await?
        .into_iter()
        .map(|p| (p.id, p.price))
        .collect();

    let mut lines = Vec::with_capacity(sale.lines.len());
    let mut total = 0.0;
    for line in &sale.lines {
        let unit_price = *prices
            .get(&line.product_id)
            .ok_or(Error::ProductNotFound {
                id: line.product_id,
            })?;
        let subtotal = unit_price * f64::from(line.quantity);
        total += subtotal;
        lines.push((line, unit_price, subtotal));
    }

    let note = sale_note::ActiveModel {
        customer_id: Set(sale.customer_id),
        total_amount: Set(total),
        status: Set(STATUS_COMPLETED.to_string()),
        created_at: Set(sale.sold_at),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    for (line, unit_price, subtotal) in lines {
        sale_line::ActiveModel {
            sale_note_id: Set(note.id),
            product_id: Set(line.product_id),
            quantity: Set(line.quantity),
            unit_price: Set(unit_price),
            subtotal: Set(subtotal),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }

    txn.commit().await?;

    debug!(
        sale_note_id = note.id,
        lines = sale.lines.len(),
        total = note.total_amount,
        "Recorded sale"
    );
    Ok(note)
}

/// Ranks products by number of sale lines on notes created at or after `since`.
///
/// Returns `(product_id, line_count)` pairs, most sold first, ties broken by product id,
/// truncated to `limit`.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn top_selling_products<C>(
    db: &C,
    since: DateTime<Utc>,
    limit: u64,
) -> Result<Vec<(i64, i64)>>
where
    C: ConnectionTrait,
{
    let mut counts: Vec<(i64, i64)> = SaleLine::find()
        .select_only()
        .column(sale_line::Column::ProductId)
        .column_as(
            Expr::col((SaleLine, sale_line::Column::Id)).count(),
            "line_count",
        )
        .inner_join(SaleNote)
        .filter(sale_note::Column::CreatedAt.gte(since))
        .group_by(sale_line::Column::ProductId)
        .into_tuple::<(i64, i64)>()
        .all(db)
        .await?;

    counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    counts.truncate(usize::try_from(limit).unwrap_or(usize::MAX));

    info!(
        products = counts.len(),
        since = %since,
        "Ranked top selling products"
    );
    Ok(counts)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_record_sale_writes_note_and_lines() -> Result<()> {
        let db = setup_test_db().await?;
        let phone = create_custom_product(&db, "Phone", 300.0).await?;
        let case = create_custom_product(&db, "Case", 20.0).await?;

        let note = record_sale(
            &db,
            NewSale::now(vec![
                SaleLineInput {
                    product_id: phone.id,
                    quantity: 1,
                },
                SaleLineInput {
                    product_id: case.id,
                    quantity: 2,
                },
            ]),
        )
        .await?;

        assert_eq!(note.total_amount, 340.0);
        assert_eq!(note.status, STATUS_COMPLETED);

        let lines = SaleLine::find()
            .filter(sale_line::Column::SaleNoteId.eq(note.id))
            .all(&db)
            .await?;
        assert_eq!(lines.len(), 2);
        let case_line = lines.iter().find(|l| l.product_id == case.id).unwrap();
        assert_eq!(case_line.unit_price, 20.0);
        assert_eq!(case_line.subtotal, 40.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_record_sale_validation() -> Result<()> {
        let db = setup_test_db().await?;
        let phone = create_test_product(&db, "Phone").await?;

        let result = record_sale(&db, NewSale::now(vec![])).await;
        assert!(matches!(result.unwrap_err(), Error::EmptySale));

        let result = record_sale(
            &db,
            NewSale::now(vec![SaleLineInput {
                product_id: phone.id,
                quantity: 0,
            }]),
        )
        .await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InvalidQuantity { quantity: 0 }
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_record_sale_unknown_product_writes_nothing() -> Result<()> {
        let db = setup_test_db().await?;
        let phone = create_test_product(&db, "Phone").await?;

        let result = record_sale(
            &db,
            NewSale::now(vec![
                SaleLineInput {
                    product_id: phone.id,
                    quantity: 1,
                },
                SaleLineInput {
                    product_id: 999,
                    quantity: 1,
                },
            ]),
        )
        .await;
        assert!(matches!(
            result.unwrap_err(),
            Error::ProductNotFound { id: 999 }
        ));

        let lines = SaleLine::find().all(&db).await?;
        assert!(lines.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_top_selling_products_respects_window() -> Result<()> {
        let db = setup_test_db().await?;
        let ids = create_numbered_products(&db, 3).await?;
        let now = Utc::now();

        // Product 3 was a best seller, but only long ago
        for _ in 0..5 {
            record_basket_at(&db, &[ids[2]], now - Duration::days(60)).await?;
        }
        record_basket_at(&db, &[ids[0], ids[1]], now - Duration::days(2)).await?;
        record_basket_at(&db, &[ids[1]], now - Duration::days(1)).await?;

        let top = top_selling_products(&db, now - Duration::days(30), 50).await?;
        assert_eq!(top, vec![(ids[1], 2), (ids[0], 1)]);

        let top_one = top_selling_products(&db, now - Duration::days(30), 1).await?;
        assert_eq!(top_one, vec![(ids[1], 2)]);

        Ok(())
    }
}
