//! Mining pipeline - One full run from sale lines to a replaced rule set.
//!
//! Extract → count pairs → generate rules → atomic replace. The run stops early, leaving
//! the stored rules untouched, whenever a stage has nothing to hand on.

use crate::{
    core::{extract, itemsets::ItemsetCounts, rule_store, rules, rules::MiningParams, settings},
    errors::Result,
};
use sea_orm::{ConnectionTrait, TransactionTrait};
use std::fmt;
use tracing::{error, info, warn};

/// How a mining run ended.
///
/// Only `Completed` touches the rule store; the other variants are normal outcomes on
/// thin data, not failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiningOutcome {
    /// The rule set was replaced with `rules` rules
    Completed {
        /// Number of rules written
        rules: usize,
    },
    /// There are no sale lines at all
    NoData,
    /// No product pair reached the minimum support
    NoFrequentItemsets,
    /// Frequent pairs exist but no rule met the confidence and lift thresholds
    NoRulesMeetThreshold,
}

impl fmt::Display for MiningOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed { rules } => write!(f, "completed, {rules} rules written"),
            Self::NoData => write!(f, "no sales data to mine"),
            Self::NoFrequentItemsets => write!(f, "no frequent itemsets at current support"),
            Self::NoRulesMeetThreshold => write!(f, "no rules meet confidence and lift thresholds"),
        }
    }
}

/// Runs every stage with explicit thresholds.
async fn mine_with<C>(db: &C, params: &MiningParams) -> Result<MiningOutcome>
where
    C: ConnectionTrait + TransactionTrait,
{
    let Some(transactions) = extract::load_transactions(db).await? else {
        warn!("No sale lines found, nothing to mine");
        return Ok(MiningOutcome::NoData);
    };

    let counts = ItemsetCounts::from_transactions(&transactions);
    let frequent = counts.frequent_pairs(params.min_support);
    if frequent.is_empty() {
        warn!(
            min_support = params.min_support,
            "No frequent itemsets, keeping existing rules"
        );
        return Ok(MiningOutcome::NoFrequentItemsets);
    }

    let candidates = rules::generate_rules(&counts, &frequent, params);
    if candidates.is_empty() {
        warn!(
            min_confidence = params.min_confidence,
            min_lift = params.min_lift,
            "No rules meet thresholds, keeping existing rules"
        );
        return Ok(MiningOutcome::NoRulesMeetThreshold);
    }

    let written = rule_store::replace_all(db, &candidates).await?;
    Ok(MiningOutcome::Completed { rules: written })
}

/// Runs the full mining pipeline with the thresholds currently stored in the database.
///
/// The configuration row is read once and its thresholds are passed down explicitly.
///
/// # Errors
/// Returns an error if reading sale lines or the configuration fails, or if the rule
/// store cannot be replaced. Previous rules are kept in every error case.
pub async fn run_mining<C>(db: &C) -> Result<MiningOutcome>
where
    C: ConnectionTrait + TransactionTrait,
{
    let config = settings::get_or_create_config(db).await?;
    let params = MiningParams::from(&config);
    info!(
        min_support = params.min_support,
        min_confidence = params.min_confidence,
        min_lift = params.min_lift,
        "Starting mining run"
    );

    match mine_with(db, &params).await {
        Ok(outcome) => {
            info!(%outcome, "Mining run finished");
            Ok(outcome)
        }
        Err(e) => {
            error!("Mining run failed: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::settings::{ConfigUpdate, get_or_create_config, update_config};
    use crate::test_utils::*;
    use sea_orm::DatabaseConnection;

    async fn set_thresholds(
        db: &DatabaseConnection,
        support: f64,
        confidence: f64,
        lift: f64,
    ) -> Result<()> {
        update_config(
            db,
            ConfigUpdate {
                min_support: Some(support),
                min_confidence: Some(confidence),
                min_lift: Some(lift),
                ..ConfigUpdate::default()
            },
        )
        .await?;
        Ok(())
    }

    /// T1[1,2] T2[1,2] T3[1,3] T4[1,2,3] over three fresh products.
    async fn seed_scenario(db: &DatabaseConnection) -> Result<Vec<i64>> {
        let ids = create_numbered_products(db, 3).await?;
        record_basket(db, &[ids[0], ids[1]]).await?;
        record_basket(db, &[ids[0], ids[1]]).await?;
        record_basket(db, &[ids[0], ids[2]]).await?;
        record_basket(db, &[ids[0], ids[1], ids[2]]).await?;
        Ok(ids)
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() -> Result<()> {
        init_test_tracing();
        let db = setup_test_db().await?;
        let ids = seed_scenario(&db).await?;
        set_thresholds(&db, 0.5, 0.5, 1.0).await?;

        let outcome = run_mining(&db).await?;
        assert_eq!(outcome, MiningOutcome::Completed { rules: 4 });

        let from_first = rule_store::query_by_origin(&db, ids[0], 10).await?;
        assert_eq!(from_first.len(), 2);
        assert!(from_first.iter().all(|r| r.lift == 1.0));
        // Equal lift, so higher confidence wins: 0.75 before 0.5
        assert_eq!(from_first[0].recommended_product_id, ids[1]);
        assert_eq!(from_first[0].confidence, 0.75);

        let back = rule_store::query_by_origin(&db, ids[2], 10).await?;
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].confidence, 1.0);

        assert!(get_or_create_config(&db).await?.last_run_at.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_mining_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        let ids = seed_scenario(&db).await?;
        set_thresholds(&db, 0.5, 0.5, 1.0).await?;

        run_mining(&db).await?;
        let first = rule_store::query_by_origin(&db, ids[0], 10).await?;
        run_mining(&db).await?;
        let second = rule_store::query_by_origin(&db, ids[0], 10).await?;

        assert_eq!(rule_store::count_rules(&db).await?, 4);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.recommended_product_id, b.recommended_product_id);
            assert_eq!(a.support, b.support);
            assert_eq!(a.confidence, b.confidence);
            assert_eq!(a.lift, b.lift);
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_no_data_leaves_store_untouched() -> Result<()> {
        let db = setup_test_db().await?;
        let outcome = run_mining(&db).await?;
        assert_eq!(outcome, MiningOutcome::NoData);
        assert!(get_or_create_config(&db).await?.last_run_at.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_sentinels_keep_previous_rules() -> Result<()> {
        let db = setup_test_db().await?;
        seed_scenario(&db).await?;
        set_thresholds(&db, 0.5, 0.5, 1.0).await?;
        run_mining(&db).await?;
        let stamp = get_or_create_config(&db).await?.last_run_at;

        // Nothing co-occurs in 90% of baskets
        set_thresholds(&db, 0.9, 0.5, 1.0).await?;
        assert_eq!(run_mining(&db).await?, MiningOutcome::NoFrequentItemsets);
        assert_eq!(rule_store::count_rules(&db).await?, 4);

        // Pairs are frequent but every lift is 1.0
        set_thresholds(&db, 0.5, 0.5, 1.5).await?;
        assert_eq!(run_mining(&db).await?, MiningOutcome::NoRulesMeetThreshold);
        assert_eq!(rule_store::count_rules(&db).await?, 4);

        assert_eq!(get_or_create_config(&db).await?.last_run_at, stamp);
        Ok(())
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(
            MiningOutcome::Completed { rules: 3 }.to_string(),
            "completed, 3 rules written"
        );
        assert_eq!(MiningOutcome::NoData.to_string(), "no sales data to mine");
    }
}
