//! Storage model
//!
//! A storage records a quantity of one product at one store location.
//! Archived rows and history rows (those pointing at a parent storage)
//! never count toward stock.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Storage {
    pub id: i64,
    pub product_id: i64,
    pub store_location_id: i64,
    pub quantity: Option<f64>,
    pub unit_id: Option<i64>,
    pub number_of_unit: Option<i64>,
    pub number_of_bag: Option<i64>,
    pub number_of_carton: Option<i64>,
    pub archive: bool,
    /// Set on history rows; points at the storage they snapshot
    pub parent_storage_id: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageCreate {
    pub product_id: i64,
    pub store_location_id: i64,
    pub quantity: Option<f64>,
    pub unit_id: Option<i64>,
    pub number_of_unit: Option<i64>,
    pub number_of_bag: Option<i64>,
    pub number_of_carton: Option<i64>,
    pub parent_storage_id: Option<i64>,
}

/// Filter shared by every stock query: live, top-level rows of one product at one location
const LIVE_ROWS: &str = "s.store_location_id = ?1 AND s.product_id = ?2 \
     AND s.archive = 0 AND s.parent_storage_id IS NULL";

impl Storage {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            product_id: row.get("product_id")?,
            store_location_id: row.get("store_location_id")?,
            quantity: row.get("quantity")?,
            unit_id: row.get("unit_id")?,
            number_of_unit: row.get("number_of_unit")?,
            number_of_bag: row.get("number_of_bag")?,
            number_of_carton: row.get("number_of_carton")?,
            archive: row.get::<_, i64>("archive")? != 0,
            parent_storage_id: row.get("parent_storage_id")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn create(conn: &Connection, data: &StorageCreate) -> DbResult<Self> {
        conn.execute(
            r#"
            INSERT INTO storages (
                product_id, store_location_id, quantity, unit_id,
                number_of_unit, number_of_bag, number_of_carton, parent_storage_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                data.product_id,
                data.store_location_id,
                data.quantity,
                data.unit_id,
                data.number_of_unit,
                data.number_of_bag,
                data.number_of_carton,
                data.parent_storage_id,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or_else(|| DbError::NotFound(format!("storage {}", id)))
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM storages WHERE id = ?1")?;
        Ok(stmt.query_row([id], Self::from_row).optional()?)
    }

    /// Mark a storage archived. Seeding helper; archived rows drop out of every stock sum.
    pub fn archive(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute(
            "UPDATE storages SET archive = 1, updated_at = datetime('now') WHERE id = ?1",
            [id],
        )?;
        Ok(rows > 0)
    }

    /// Raw quantity per unit of live unit-bearing storages at one location
    pub fn sum_by_unit(
        conn: &Connection,
        location_id: i64,
        product_id: i64,
    ) -> DbResult<Vec<(i64, f64)>> {
        let sql = format!(
            r#"
            SELECT s.unit_id, SUM(s.quantity)
            FROM storages s
            WHERE {} AND s.quantity IS NOT NULL AND s.unit_id IS NOT NULL
            GROUP BY s.unit_id
            ORDER BY s.unit_id
            "#,
            LIVE_ROWS
        );
        let mut stmt = conn.prepare(&sql)?;

        let sums = stmt
            .query_map([location_id, product_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(sums)
    }

    /// Quantity of live storages recorded without a unit at one location
    pub fn sum_unitless(conn: &Connection, location_id: i64, product_id: i64) -> DbResult<f64> {
        let sql = format!(
            r#"
            SELECT COALESCE(SUM(s.quantity), 0.0)
            FROM storages s
            WHERE {} AND s.quantity IS NOT NULL AND s.unit_id IS NULL
            "#,
            LIVE_ROWS
        );
        Ok(conn.query_row(&sql, [location_id, product_id], |row| row.get(0))?)
    }

    /// Discrete units of live consumable storages at one location.
    ///
    /// Bag and carton counts only contribute when the product defines how
    /// many units a bag or carton holds. A row filling several count fields
    /// contributes each of them.
    pub fn sum_consumable(conn: &Connection, location_id: i64, product_id: i64) -> DbResult<f64> {
        let sql = format!(
            r#"
            SELECT
                COALESCE(SUM(p.number_per_bag * s.number_of_bag), 0),
                COALESCE(SUM(p.number_per_carton * s.number_of_carton), 0),
                COALESCE(SUM(s.number_of_unit), 0)
            FROM storages s
            INNER JOIN products p ON p.id = s.product_id
            WHERE {}
            "#,
            LIVE_ROWS
        );

        let (bag, carton, unit): (i64, i64, i64) =
            conn.query_row(&sql, [location_id, product_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?;

        // Negative aggregates are data-entry noise and never reduce stock
        Ok((bag.max(0) + carton.max(0) + unit.max(0)) as f64)
    }
}
