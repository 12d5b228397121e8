//! Recommendation config entity - Singleton row with the mining thresholds.
//!
//! There is exactly one row (id 1). It is created with defaults on first access and
//! its `last_run_at` is advanced by every successful rule replacement.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Recommendation config database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "recommendation_config")]
pub struct Model {
    /// Always 1
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    /// Minimum pair support for a pair to be frequent
    pub min_support: f64,
    /// Minimum confidence for a rule to be kept
    pub min_confidence: f64,
    /// Minimum lift for a rule to be kept
    pub min_lift: f64,
    /// Default number of recommendations returned to callers
    pub max_recommendations: i32,
    /// Days that must pass between scheduled remines
    pub refresh_interval_days: i32,
    /// When rules were last replaced, None if mining never completed
    pub last_run_at: Option<DateTimeUtc>,
}

/// `RecommendationConfig` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
