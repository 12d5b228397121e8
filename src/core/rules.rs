//! Rule generation - Turns frequent pairs into directional association rules.
//!
//! Every frequent pair `{A, B}` yields two candidates, `A → B` and `B → A`, each judged
//! on its own confidence. Lift is the same in both directions.

use crate::core::itemsets::{FrequentItemset, ItemsetCounts};
use tracing::info;

/// Thresholds applied during one mining run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MiningParams {
    /// Minimum pair support
    pub min_support: f64,
    /// Minimum rule confidence
    pub min_confidence: f64,
    /// Minimum rule lift
    pub min_lift: f64,
}

impl Default for MiningParams {
    fn default() -> Self {
        Self {
            min_support: 0.01,
            min_confidence: 0.2,
            min_lift: 1.0,
        }
    }
}

/// A rule produced by the generator, not yet persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateRule {
    /// Product that triggers the recommendation
    pub origin_product_id: i64,
    /// Product being recommended
    pub recommended_product_id: i64,
    /// Support of the pair
    pub support: f64,
    /// `support(origin, recommended) / support(origin)`
    pub confidence: f64,
    /// `confidence / support(recommended)`
    pub lift: f64,
}

/// Builds the rule `origin → recommended` from raw counts.
///
/// Working from integer counts keeps lift bit-identical in both directions, since
/// `lift = pair · T / (count(origin) · count(recommended))`.
#[allow(clippy::cast_precision_loss)]
fn directional_rule(
    counts: &ItemsetCounts,
    itemset: &FrequentItemset,
    origin: i64,
    recommended: i64,
) -> Option<CandidateRule> {
    let origin_count = *counts.item_counts.get(&origin)?;
    let recommended_count = *counts.item_counts.get(&recommended)?;
    if origin_count == 0 || recommended_count == 0 {
        return None;
    }

    let pair = itemset.count as f64;
    let confidence = pair / origin_count as f64;
    let lift = pair * counts.transaction_count as f64
        / (origin_count as f64 * recommended_count as f64);

    Some(CandidateRule {
        origin_product_id: origin,
        recommended_product_id: recommended,
        support: itemset.support,
        confidence,
        lift,
    })
}

/// Derives both directional rules from every frequent pair and keeps those meeting
/// the confidence and lift thresholds. An empty result is valid.
#[must_use]
pub fn generate_rules(
    counts: &ItemsetCounts,
    frequent: &[FrequentItemset],
    params: &MiningParams,
) -> Vec<CandidateRule> {
    let rules: Vec<CandidateRule> = frequent
        .iter()
        .flat_map(|itemset| {
            let (a, b) = itemset.pair;
            [
                directional_rule(counts, itemset, a, b),
                directional_rule(counts, itemset, b, a),
            ]
        })
        .flatten()
        .filter(|rule| rule.confidence >= params.min_confidence && rule.lift >= params.min_lift)
        .collect();

    info!(
        min_confidence = params.min_confidence,
        min_lift = params.min_lift,
        frequent_pairs = frequent.len(),
        rules = rules.len(),
        "Rules generated"
    );
    rules
}
