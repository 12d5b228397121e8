//! Transaction extraction - Reshapes sale lines into per-sale product sets.
//!
//! Each sale note becomes one transaction holding the distinct products bought on it.
//! Quantities are irrelevant to association mining and are dropped here.

use crate::{
    entities::{SaleLine, sale_line},
    errors::Result,
};
use sea_orm::{QueryOrder, QuerySelect, prelude::*};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Sale note id → distinct product ids on that note.
///
/// Ordered maps keep every downstream step deterministic.
pub type Transactions = BTreeMap<i64, BTreeSet<i64>>;

/// Minimal view of a sale line used by the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleLineRecord {
    /// Sale note the line belongs to
    pub sale_note_id: i64,
    /// Product on the line
    pub product_id: i64,
    /// Units sold (ignored)
    pub quantity: i32,
}

/// Groups sale lines by sale note, keeping product presence only.
///
/// Returns `None` when there are no sale lines at all, which callers treat as
/// "nothing to mine" rather than an error.
pub fn build_transactions<I>(lines: I) -> Option<Transactions>
where
    I: IntoIterator<Item = SaleLineRecord>,
{
    let mut transactions = Transactions::new();
    for line in lines {
        transactions
            .entry(line.sale_note_id)
            .or_default()
            .insert(line.product_id);
    }

    if transactions.is_empty() {
        None
    } else {
        Some(transactions)
    }
}

/// Reads every sale line from the database and builds the transaction map.
///
/// Only the id and quantity columns are selected; product and note rows are not loaded.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn load_transactions<C>(db: &C) -> Result<Option<Transactions>>
where
    C: ConnectionTrait,
{
    debug!("Loading sale lines for mining");
    let rows: Vec<(i64, i64, i32)> = SaleLine::find()
        .select_only()
        .column(sale_line::Column::SaleNoteId)
        .column(sale_line::Column::ProductId)
        .column(sale_line::Column::Quantity)
        .order_by_asc(sale_line::Column::Id)
        .into_tuple()
        .all(db)
        .await?;
    let line_count = rows.len();

    let transactions = build_transactions(rows.into_iter().map(
        |(sale_note_id, product_id, quantity)| SaleLineRecord {
            sale_note_id,
            product_id,
            quantity,
        },
    ));

    match &transactions {
        Some(t) => info!(
            sale_lines = line_count,
            transactions = t.len(),
            "Transactions extracted"
        ),
        None => info!("No sale lines available"),
    }
    Ok(transactions)
}
