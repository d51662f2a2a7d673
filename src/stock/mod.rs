//! Stock aggregation module
//!
//! Computes, for one product, the current and cumulative stock at every
//! store location visible to a person, per reference unit, for unitless
//! storages and for consumables.

pub mod aggregator;
pub mod coordinator;
pub mod error;
pub mod store;
pub mod tree;
pub mod units;

pub use aggregator::{Aggregator, Measure, StockContext};
pub use coordinator::{compute_stock, StockOptions};
pub use error::{StockError, StockResult};
pub use store::{SqliteStockStore, StockStore};
pub use tree::{Stock, StockKind, StockTree, StoreLocationStock};
pub use units::UnitFamilies;

#[cfg(test)]
mod tests;
