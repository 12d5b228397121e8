//! Unified error type for `BasketBuddy`.
//!
//! Mining runs that find nothing to do are not errors; they are reported through
//! [`crate::core::pipeline::MiningOutcome`]. Everything here is a genuine failure.

use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying database failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Configuration could not be read, parsed or validated
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// A mining threshold or config value is outside its allowed range
    #[error("Invalid value for {name}: {value}")]
    InvalidThreshold {
        /// Name of the offending setting
        name: String,
        /// Rejected value
        value: f64,
    },

    /// An association rule violates the rule invariants
    #[error("Invalid rule {origin} -> {recommended}: {reason}")]
    InvalidRule {
        /// Origin product id
        origin: i64,
        /// Recommended product id
        recommended: i64,
        /// Which invariant was broken
        reason: String,
    },

    /// Product referenced by id does not exist or was deleted
    #[error("Product not found: {id}")]
    ProductNotFound {
        /// Missing product id
        id: i64,
    },

    /// Price or amount that is negative or not finite
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// Rejected amount
        amount: f64,
    },

    /// Sale line with a non-positive quantity
    #[error("Invalid quantity: {quantity}")]
    InvalidQuantity {
        /// Rejected quantity
        quantity: i32,
    },

    /// Sale recorded without any lines
    #[error("A sale must contain at least one line")]
    EmptySale,

    /// Atomic rule replacement failed and was rolled back
    #[error("Rule store write failed (previous rules kept): {message}")]
    StoreWrite {
        /// Failure reported by the database
        message: String,
    },

    /// Cache backend could not serve the request
    #[error("Cache backend unavailable: {message}")]
    CacheUnavailable {
        /// Failure reported by the backend
        message: String,
    },

    /// JSON encoding or decoding failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
