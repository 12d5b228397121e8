//! Sale note entity - One completed (or pending) sale.
//!
//! A sale note groups the sale lines bought together. For mining purposes each note
//! is one transaction.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Sale note database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sale_notes")]
pub struct Model {
    /// Unique identifier for the sale note
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Customer id from the external customer service, None for walk-in sales
    pub customer_id: Option<i64>,
    /// Sum of all line subtotals
    pub total_amount: f64,
    /// Sale status: `"pending"`, `"completed"` or `"cancelled"`
    pub status: String,
    /// When the sale happened
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `SaleNote` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One sale note has many lines
    #[sea_orm(has_many = "super::sale_line::Entity")]
    SaleLines,
}

impl Related<super::sale_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SaleLines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
