//! Association rule entity - A directional "bought A, also buys B" rule.
//!
//! The composite primary key makes each `(origin, recommended)` pair unique. Rules are
//! never edited in place: every mining run replaces the whole table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Association rule database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "association_rules")]
pub struct Model {
    /// Product that triggers the recommendation
    #[sea_orm(primary_key, auto_increment = false)]
    pub origin_product_id: i64,
    /// Product being recommended
    #[sea_orm(primary_key, auto_increment = false)]
    pub recommended_product_id: i64,
    /// Fraction of transactions containing both products
    pub support: f64,
    /// Estimated P(recommended | origin)
    pub confidence: f64,
    /// Confidence relative to the recommended product's own support
    pub lift: f64,
    /// When the mining run that produced this rule finished
    pub last_updated: DateTimeUtc,
}

/// Both ends of a rule point at the product catalog
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Product on the left-hand side
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::OriginProductId",
        to = "super::product::Column::Id"
    )]
    OriginProduct,
    /// Product on the right-hand side
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::RecommendedProductId",
        to = "super::product::Column::Id"
    )]
    RecommendedProduct,
}

impl ActiveModelBehavior for ActiveModel {}
