//! Sale line entity - One product on a sale note.
//!
//! Quantity and prices are kept for bookkeeping; the miner only looks at which
//! products are present on a note.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Sale line database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sale_lines")]
pub struct Model {
    /// Unique identifier for the line
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Sale note this line belongs to
    pub sale_note_id: i64,
    /// Product sold on this line
    pub product_id: i64,
    /// Units sold, always positive
    pub quantity: i32,
    /// Product price at the time of the sale
    pub unit_price: f64,
    /// `quantity * unit_price`
    pub subtotal: f64,
}

/// Defines relationships between `SaleLine` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each line belongs to one sale note
    #[sea_orm(
        belongs_to = "super::sale_note::Entity",
        from = "Column::SaleNoteId",
        to = "super::sale_note::Column::Id"
    )]
    SaleNote,
    /// Each line references one product
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::sale_note::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SaleNote.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
