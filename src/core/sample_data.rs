//! Demo data - Synthetic sales with planted co-purchase patterns.
//!
//! Most generated baskets are one of a few fixed product combinations, sometimes with a
//! couple of random extras, so a mining run over the result finds obvious rules. The rest
//! are uniformly random baskets acting as noise.

use crate::{
    core::{
        product,
        sales::{self, NewSale, SaleLineInput},
    },
    entities::product::Model as ProductModel,
    errors::{Error, Result},
};
use chrono::{Duration, Utc};
use rand::{Rng, seq::SliceRandom};
use sea_orm::DatabaseConnection;
use tracing::{debug, info};

/// Catalog positions bought together in planted baskets.
const FREQUENT_COMBOS: [&[usize]; 5] = [&[0, 1, 2], &[3, 4], &[5, 6, 7], &[8, 9], &[10, 11, 12]];

/// Share of baskets drawn from [`FREQUENT_COMBOS`].
const COMBO_PROBABILITY: f64 = 0.7;

/// Share of planted baskets that get random extra products.
const EXTRAS_PROBABILITY: f64 = 0.3;

/// Oldest generated sale, in days before now.
const MAX_DAYS_AGO: i64 = 90;

/// Size of a demo data set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoOptions {
    /// Number of sales to generate
    pub sales: usize,
    /// Upper bound on products in a random basket
    pub max_products_per_sale: usize,
    /// Minimum number of active products; missing ones are created
    pub products: usize,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            sales: 100,
            max_products_per_sale: 5,
            products: 15,
        }
    }
}

/// A generated basket, as positions in the product list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSale {
    /// Distinct product positions
    pub items: Vec<usize>,
    /// Units per item, same order as `items`
    pub quantities: Vec<i32>,
    /// Age of the sale in days
    pub days_ago: i64,
}

fn plan_sale<R: Rng>(rng: &mut R, product_count: usize, max_per_sale: usize) -> PlannedSale {
    let combos: Vec<&[usize]> = FREQUENT_COMBOS
        .iter()
        .copied()
        .filter(|combo| combo.iter().all(|&i| i < product_count))
        .collect();

    let combo = if rng.gen_bool(COMBO_PROBABILITY) {
        combos.choose(rng).copied()
    } else {
        None
    };

    let items = match combo {
        Some(combo) => {
            let mut items = combo.to_vec();
            if max_per_sale > items.len() && rng.gen_bool(EXTRAS_PROBABILITY) {
                let extras = rng.gen_range(1..=max_per_sale - items.len());
                for _ in 0..extras {
                    let extra = rng.gen_range(0..product_count);
                    if !items.contains(&extra) {
                        items.push(extra);
                    }
                }
            }
            items
        }
        None => {
            let count = rng.gen_range(1..=max_per_sale.min(product_count));
            rand::seq::index::sample(rng, product_count, count).into_vec()
        }
    };

    let quantities = items.iter().map(|_| rng.gen_range(1..=3)).collect();
    PlannedSale {
        items,
        quantities,
        days_ago: rng.gen_range(1..=MAX_DAYS_AGO),
    }
}

/// Plans `options.sales` baskets over `product_count` products.
///
/// # Errors
/// Returns `Config` if there are no products or `max_products_per_sale` is zero.
pub fn plan_sales<R: Rng>(
    rng: &mut R,
    product_count: usize,
    options: &DemoOptions,
) -> Result<Vec<PlannedSale>> {
    if product_count == 0 || options.max_products_per_sale == 0 {
        return Err(Error::Config {
            message: "Demo data needs at least one product and one product per sale".to_string(),
        });
    }
    Ok((0..options.sales)
        .map(|_| plan_sale(rng, product_count, options.max_products_per_sale))
        .collect())
}

/// Returns at least `count` active products in id order, creating numbered demo products
/// as needed.
async fn ensure_products(db: &DatabaseConnection, count: usize) -> Result<Vec<ProductModel>> {
    let mut products = product::get_all_active_products(db).await?;
    products.sort_by_key(|p| p.id);
    let missing = count.saturating_sub(products.len());
    for i in 0..missing {
        let n = products.len() + 1;
        let price = f64::from(u32::try_from(10 + i * 5).unwrap_or(u32::MAX));
        let created = product::create_product(db, format!("Demo product {n}"), price, None).await?;
        products.push(created);
    }
    if missing > 0 {
        info!(created = missing, "Demo products created");
    }
    Ok(products)
}

/// Writes a demo data set and returns the number of sales recorded.
///
/// # Errors
/// Returns an error if the options are unusable or a database write fails.
pub async fn seed_demo_sales<R: Rng>(
    db: &DatabaseConnection,
    rng: &mut R,
    options: &DemoOptions,
) -> Result<usize> {
    let products = ensure_products(db, options.products.max(1)).await?;
    let plan = plan_sales(rng, products.len(), options)?;
    let now = Utc::now();

    for (i, planned) in plan.iter().enumerate() {
        let lines = planned
            .items
            .iter()
            .zip(&planned.quantities)
            .map(|(&item, &quantity)| SaleLineInput {
                product_id: products[item].id,
                quantity,
            })
            .collect();
        sales::record_sale(
            db,
            NewSale {
                customer_id: None,
                sold_at: now - Duration::days(planned.days_ago),
                lines,
            },
        )
        .await?;
        if (i + 1) % 50 == 0 {
            debug!(recorded = i + 1, total = plan.len(), "Demo sales progress");
        }
    }

    info!(sales = plan.len(), products = products.len(), "Demo sales recorded");
    Ok(plan.len())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::pipeline::{MiningOutcome, run_mining};
    use crate::core::rule_store;
    use crate::test_utils::*;
    use rand::{SeedableRng, rngs::StdRng};
    use std::collections::HashSet;

    #[test]
    fn test_planned_baskets_are_valid() {
        let mut rng = StdRng::seed_from_u64(7);
        let options = DemoOptions {
            sales: 500,
            ..DemoOptions::default()
        };
        let plan = plan_sales(&mut rng, 15, &options).unwrap();

        assert_eq!(plan.len(), 500);
        for sale in &plan {
            assert!(!sale.items.is_empty());
            assert_eq!(sale.items.len(), sale.quantities.len());
            let distinct: HashSet<usize> = sale.items.iter().copied().collect();
            assert_eq!(distinct.len(), sale.items.len());
            assert!(sale.items.iter().all(|&i| i < 15));
            assert!(sale.quantities.iter().all(|q| (1..=3).contains(q)));
            assert!((1..=MAX_DAYS_AGO).contains(&sale.days_ago));
        }

        // Planted pairs dominate
        let together = plan
            .iter()
            .filter(|s| s.items.contains(&3) && s.items.contains(&4))
            .count();
        assert!(together > 40);
    }

    #[test]
    fn test_small_catalog_skips_combos_out_of_range() {
        let mut rng = StdRng::seed_from_u64(1);
        let plan = plan_sales(&mut rng, 2, &DemoOptions::default()).unwrap();
        assert!(plan.iter().all(|s| s.items.iter().all(|&i| i < 2)));

        assert!(plan_sales(&mut rng, 0, &DemoOptions::default()).is_err());
    }

    #[tokio::test]
    async fn test_seeded_sales_produce_planted_rules() -> Result<()> {
        let db = setup_test_db().await?;
        let mut rng = StdRng::seed_from_u64(42);
        let options = DemoOptions {
            sales: 200,
            ..DemoOptions::default()
        };

        let recorded = seed_demo_sales(&db, &mut rng, &options).await?;
        assert_eq!(recorded, 200);

        let mut products = product::get_all_active_products(&db).await?;
        products.sort_by_key(|p| p.id);
        assert_eq!(products.len(), 15);

        let outcome = run_mining(&db).await?;
        assert!(matches!(outcome, MiningOutcome::Completed { .. }));

        let rules = rule_store::query_by_origin(&db, products[8].id, 10).await?;
        assert!(rules.iter().any(|r| r.recommended_product_id == products[9].id));
        Ok(())
    }
}
