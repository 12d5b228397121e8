//! Rule store - The authoritative set of association rules.
//!
//! Rules are replaced wholesale: delete everything, insert the new set, advance
//! `last_run_at`, all inside one database transaction. Readers therefore see either the
//! complete old set or the complete new set, never an empty or mixed table.

use crate::{
    core::{rules::CandidateRule, settings},
    entities::{AssociationRule, association_rule},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use tracing::{debug, error, info};

/// Rows per INSERT statement, kept well under `SQLite`'s bound-parameter limit.
pub const INSERT_CHUNK_SIZE: usize = 100;

fn validate_rule(rule: &CandidateRule) -> Result<()> {
    let reason = if rule.origin_product_id == rule.recommended_product_id {
        Some("origin and recommended product are the same")
    } else if !(0.0..=1.0).contains(&rule.support) {
        Some("support outside [0, 1]")
    } else if !(0.0..=1.0).contains(&rule.confidence) {
        Some("confidence outside [0, 1]")
    } else if !rule.lift.is_finite() || rule.lift < 0.0 {
        Some("lift negative or not finite")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(Error::InvalidRule {
            origin: rule.origin_product_id,
            recommended: rule.recommended_product_id,
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

async fn write_rules<C>(txn: &C, rules: &[CandidateRule], now: DateTime<Utc>) -> Result<usize>
where
    C: ConnectionTrait,
{
    let deleted = AssociationRule::delete_many().exec(txn).await?;
    debug!(deleted = deleted.rows_affected, "Previous rules removed");

    let mut inserted = 0;
    for chunk in rules.chunks(INSERT_CHUNK_SIZE) {
        let models = chunk.iter().map(|rule| association_rule::ActiveModel {
            origin_product_id: Set(rule.origin_product_id),
            recommended_product_id: Set(rule.recommended_product_id),
            support: Set(rule.support),
            confidence: Set(rule.confidence),
            lift: Set(rule.lift),
            last_updated: Set(now),
        });
        AssociationRule::insert_many(models)
            .exec_without_returning(txn)
            .await?;
        inserted += chunk.len();
    }

    settings::set_last_run_at(txn, now).await?;
    Ok(inserted)
}

/// Atomically replaces every stored rule with `rules` and stamps `last_run_at`.
///
/// Returns the number of rules written.
///
/// # Errors
/// - `InvalidRule` if any rule breaks the rule invariants; nothing is written.
/// - `StoreWrite` if the transaction cannot be opened, or if it fails part way; it is
///   then rolled back, so the previous rules and the previous `last_run_at` stay in place.
pub async fn replace_all<C>(db: &C, rules: &[CandidateRule]) -> Result<usize>
where
    C: ConnectionTrait + TransactionTrait,
{
    rules.iter().try_for_each(validate_rule)?;

    let now = Utc::now();
    let txn = db.begin().await.map_err(|e| Error::StoreWrite {
        message: e.to_string(),
    })?;

    match write_rules(&txn, rules, now).await {
        Ok(count) => {
            txn.commit().await.map_err(|e| Error::StoreWrite {
                message: e.to_string(),
            })?;
            info!(rules = count, "Rule set replaced");
            Ok(count)
        }
        Err(e) => {
            error!("Rule replacement failed, rolling back: {}", e);
            if let Err(rollback_err) = txn.rollback().await {
                error!("Rollback reported an error: {}", rollback_err);
            }
            Err(Error::StoreWrite {
                message: e.to_string(),
            })
        }
    }
}

/// Rules whose origin is `product_id`, strongest first (lift, then confidence).
///
/// An unknown product simply has no rules and yields an empty list.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn query_by_origin<C>(
    db: &C,
    product_id: i64,
    limit: u64,
) -> Result<Vec<association_rule::Model>>
where
    C: ConnectionTrait,
{
    query_by_origin_excluding(db, product_id, &[], limit).await
}

/// Like [`query_by_origin`], but never returns rules recommending a product in `exclude`.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn query_by_origin_excluding<C>(
    db: &C,
    product_id: i64,
    exclude: &[i64],
    limit: u64,
) -> Result<Vec<association_rule::Model>>
where
    C: ConnectionTrait,
{
    let mut query = AssociationRule::find()
        .filter(association_rule::Column::OriginProductId.eq(product_id));
    if !exclude.is_empty() {
        query = query.filter(
            association_rule::Column::RecommendedProductId.is_not_in(exclude.iter().copied()),
        );
    }

    let rules = query
        .order_by_desc(association_rule::Column::Lift)
        .order_by_desc(association_rule::Column::Confidence)
        .order_by_asc(association_rule::Column::RecommendedProductId)
        .limit(limit)
        .all(db)
        .await?;

    debug!(
        product_id,
        excluded = exclude.len(),
        found = rules.len(),
        "Rules queried by origin"
    );
    Ok(rules)
}

/// Number of stored rules.
pub async fn count_rules<C>(db: &C) -> Result<u64>
where
    C: ConnectionTrait,
{
    AssociationRule::find().count(db).await.map_err(Into::into)
}
