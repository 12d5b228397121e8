//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod association_rule;
pub mod product;
pub mod recommendation_config;
pub mod sale_line;
pub mod sale_note;

// Re-export specific types to avoid conflicts
pub use association_rule::{
    Column as AssociationRuleColumn, Entity as AssociationRule, Model as AssociationRuleModel,
};
pub use product::{Column as ProductColumn, Entity as Product, Model as ProductModel};
pub use recommendation_config::{
    Column as RecommendationConfigColumn, Entity as RecommendationConfig,
    Model as RecommendationConfigModel,
};
pub use sale_line::{Column as SaleLineColumn, Entity as SaleLine, Model as SaleLineModel};
pub use sale_note::{Column as SaleNoteColumn, Entity as SaleNote, Model as SaleNoteModel};
