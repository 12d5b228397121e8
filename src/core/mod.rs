/// Per-product and per-cart recommendation cache
pub mod cache;
/// Sale lines to per-sale product sets
pub mod extract;
/// Pair counting and frequent itemsets
pub mod itemsets;
/// One full mining run
pub mod pipeline;
/// Catalog lookups
pub mod product;
/// Association rule generation
pub mod rules;
/// Persisted rule set
pub mod rule_store;
/// Sale recording and popularity
pub mod sales;
/// Synthetic demo sales
pub mod sample_data;
/// Periodic remine and precompute jobs
pub mod scheduler;
/// Mining thresholds stored in the database
pub mod settings;
