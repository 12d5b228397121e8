//! Frequent itemset mining, restricted to product pairs.
//!
//! A single pass over the transactions counts how many transactions contain each product
//! and each unordered product pair. Pairs whose support reaches the threshold are
//! frequent. Itemsets larger than two products are never generated, and the per-product
//! counts are kept so the rule generator can compute confidence and lift.

use crate::core::extract::Transactions;
use std::collections::HashMap;
use tracing::{debug, info};

/// Unordered product pair, always stored with the smaller id first.
pub type ProductPair = (i64, i64);

/// A frequent pair of products.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequentItemset {
    /// The two products, smaller id first
    pub pair: ProductPair,
    /// Number of transactions containing both products
    pub count: u64,
    /// Fraction of all transactions containing both products
    pub support: f64,
}

/// Occurrence counts gathered from one pass over the transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemsetCounts {
    /// Total number of transactions
    pub transaction_count: u64,
    /// Product id → number of transactions containing it
    pub item_counts: HashMap<i64, u64>,
    /// Pair → number of transactions containing both products
    pub pair_counts: HashMap<ProductPair, u64>,
}

impl ItemsetCounts {
    /// Counts products and pairs over all transactions.
    ///
    /// Products within a transaction are already distinct and sorted, so every pair is
    /// visited once with `a < b`.
    #[must_use]
    pub fn from_transactions(transactions: &Transactions) -> Self {
        let mut counts = Self::default();

        for products in transactions.values() {
            counts.transaction_count += 1;
            let items: Vec<i64> = products.iter().copied().collect();
            for (i, &a) in items.iter().enumerate() {
                *counts.item_counts.entry(a).or_insert(0) += 1;
                for &b in &items[i + 1..] {
                    *counts.pair_counts.entry((a, b)).or_insert(0) += 1;
                }
            }
        }

        debug!(
            transactions = counts.transaction_count,
            products = counts.item_counts.len(),
            pairs = counts.pair_counts.len(),
            "Itemset counts built"
        );
        counts
    }

    /// Support of a single product, 0.0 if it never occurs.
    #[must_use]
    pub fn item_support(&self, product_id: i64) -> f64 {
        self.support_of(self.item_counts.get(&product_id).copied().unwrap_or(0))
    }

    /// Support of an unordered pair, 0.0 if the products never co-occur.
    #[must_use]
    pub fn pair_support(&self, a: i64, b: i64) -> f64 {
        let key = if a < b { (a, b) } else { (b, a) };
        self.support_of(self.pair_counts.get(&key).copied().unwrap_or(0))
    }

    #[allow(clippy::cast_precision_loss)]
    fn support_of(&self, count: u64) -> f64 {
        if self.transaction_count == 0 {
            0.0
        } else {
            count as f64 / self.transaction_count as f64
        }
    }

    /// Pairs with support at or above `min_support`.
    ///
    /// Sorted by support descending, then by pair, so repeated runs on the same data
    /// produce identical output. An empty result means no association is strong enough.
    #[must_use]
    pub fn frequent_pairs(&self, min_support: f64) -> Vec<FrequentItemset> {
        let mut frequent: Vec<FrequentItemset> = self
            .pair_counts
            .iter()
            .map(|(&pair, &count)| FrequentItemset {
                pair,
                count,
                support: self.support_of(count),
            })
            .filter(|itemset| itemset.support >= min_support)
            .collect();

        frequent.sort_by(|a, b| {
            b.support
                .total_cmp(&a.support)
                .then_with(|| a.pair.cmp(&b.pair))
        });

        info!(
            min_support,
            candidates = self.pair_counts.len(),
            frequent = frequent.len(),
            "Frequent pairs computed"
        );
        frequent
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use std::collections::BTreeSet;

    fn scenario_transactions() -> Transactions {
        Transactions::from([
            (1, BTreeSet::from([1, 2])),
            (2, BTreeSet::from([1, 2])),
            (3, BTreeSet::from([1, 3])),
            (4, BTreeSet::from([1, 2, 3])),
        ])
    }

    #[test]
    fn test_counts_single_pass() {
        let counts = ItemsetCounts::from_transactions(&scenario_transactions());

        assert_eq!(counts.transaction_count, 4);
        assert_eq!(counts.item_counts[&1], 4);
        assert_eq!(counts.item_counts[&2], 3);
        assert_eq!(counts.item_counts[&3], 2);
        assert_eq!(counts.pair_counts[&(1, 2)], 3);
        assert_eq!(counts.pair_counts[&(1, 3)], 2);
        assert_eq!(counts.pair_counts[&(2, 3)], 1);
        assert_eq!(counts.pair_counts.len(), 3);
    }

    #[test]
    fn test_supports() {
        let counts = ItemsetCounts::from_transactions(&scenario_transactions());

        assert_eq!(counts.item_support(1), 1.0);
        assert_eq!(counts.item_support(2), 0.75);
        assert_eq!(counts.item_support(3), 0.5);
        assert_eq!(counts.item_support(42), 0.0);
        assert_eq!(counts.pair_support(2, 1), 0.75);
        assert_eq!(counts.pair_support(2, 3), 0.25);
    }

    #[test]
    fn test_frequent_pairs_threshold_is_inclusive() {
        let counts = ItemsetCounts::from_transactions(&scenario_transactions());
        let frequent = counts.frequent_pairs(0.5);

        let pairs: Vec<ProductPair> = frequent.iter().map(|f| f.pair).collect();
        assert_eq!(pairs, vec![(1, 2), (1, 3)]);
        assert_eq!(frequent[0].support, 0.75);
        assert_eq!(frequent[1].support, 0.5);
    }

    #[test]
    fn test_frequent_pairs_can_be_empty() {
        let counts = ItemsetCounts::from_transactions(&scenario_transactions());
        assert!(counts.frequent_pairs(0.9).is_empty());

        let single_items = Transactions::from([(1, BTreeSet::from([1])), (2, BTreeSet::from([2]))]);
        let counts = ItemsetCounts::from_transactions(&single_items);
        assert!(counts.pair_counts.is_empty());
        assert!(counts.frequent_pairs(0.0).is_empty());
    }
}
