//! Data access port for stock aggregation
//!
//! The aggregators only talk to a `StockStore`. `SqliteStockStore` is the
//! production implementation over the connection pool.

use std::sync::Arc;

use crate::db::Database;
use crate::models::{Storage, StoreLocation, Unit};

use super::error::StockResult;
use super::units::UnitFamilies;

pub trait StockStore: Send + Sync + 'static {
    /// Parentless store locations of the entities the person may read
    fn visible_roots(&self, person_id: i64) -> StockResult<Vec<StoreLocation>>;

    /// One root unit per quantity family
    fn reference_axes(&self) -> StockResult<Vec<Unit>>;

    fn children_of(&self, location_id: i64) -> StockResult<Vec<StoreLocation>>;

    /// Quantity of the product stored directly at the location, in `axis` units
    fn sum_measured(&self, location_id: i64, product_id: i64, axis: &Unit) -> StockResult<f64>;

    /// Quantity of the product stored directly at the location without a unit
    fn sum_unitless(&self, location_id: i64, product_id: i64) -> StockResult<f64>;

    /// Discrete units of the product stored directly at the location
    fn sum_consumable(&self, location_id: i64, product_id: i64) -> StockResult<f64>;
}

#[derive(Clone)]
pub struct SqliteStockStore {
    database: Database,
    families: Arc<UnitFamilies>,
}

impl SqliteStockStore {
    pub fn new(database: Database, families: Arc<UnitFamilies>) -> Self {
        Self { database, families }
    }

    /// Build unit families from the units table and validate them
    pub fn load(database: Database) -> StockResult<Self> {
        let units = database.with_conn(Unit::list)?;
        let families = UnitFamilies::build(&units)?;
        families.validate()?;
        Ok(Self::new(database, Arc::new(families)))
    }

    pub fn families(&self) -> &UnitFamilies {
        &self.families
    }
}

impl StockStore for SqliteStockStore {
    fn visible_roots(&self, person_id: i64) -> StockResult<Vec<StoreLocation>> {
        Ok(self
            .database
            .with_conn(|conn| StoreLocation::get_visible_roots(conn, person_id))?)
    }

    fn reference_axes(&self) -> StockResult<Vec<Unit>> {
        Ok(self.families.reference_axes().to_vec())
    }

    fn children_of(&self, location_id: i64) -> StockResult<Vec<StoreLocation>> {
        Ok(self
            .database
            .with_conn(|conn| StoreLocation::get_children(conn, location_id))?)
    }

    fn sum_measured(&self, location_id: i64, product_id: i64, axis: &Unit) -> StockResult<f64> {
        let sums = self
            .database
            .with_conn(|conn| Storage::sum_by_unit(conn, location_id, product_id))?;
        Ok(self.families.convert_sum(&sums, axis.id))
    }

    fn sum_unitless(&self, location_id: i64, product_id: i64) -> StockResult<f64> {
        Ok(self
            .database
            .with_conn(|conn| Storage::sum_unitless(conn, location_id, product_id))?)
    }

    fn sum_consumable(&self, location_id: i64, product_id: i64) -> StockResult<f64> {
        Ok(self
            .database
            .with_conn(|conn| Storage::sum_consumable(conn, location_id, product_id))?)
    }
}

impl<S: StockStore> StockStore for Arc<S> {
    fn visible_roots(&self, person_id: i64) -> StockResult<Vec<StoreLocation>> {
        (**self).visible_roots(person_id)
    }

    fn reference_axes(&self) -> StockResult<Vec<Unit>> {
        (**self).reference_axes()
    }

    fn children_of(&self, location_id: i64) -> StockResult<Vec<StoreLocation>> {
        (**self).children_of(location_id)
    }

    fn sum_measured(&self, location_id: i64, product_id: i64, axis: &Unit) -> StockResult<f64> {
        (**self).sum_measured(location_id, product_id, axis)
    }

    fn sum_unitless(&self, location_id: i64, product_id: i64) -> StockResult<f64> {
        (**self).sum_unitless(location_id, product_id)
    }

    fn sum_consumable(&self, location_id: i64, product_id: i64) -> StockResult<f64> {
        (**self).sum_consumable(location_id, product_id)
    }
}
